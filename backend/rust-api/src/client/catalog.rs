//! Typed repositories over the catalog collections.

use serde::Serialize;
use serde_json::{json, Value};

use super::{builders::search_text, ClientError, Page, QueryClient, SortDirection};
use crate::{
    models::{
        catalog::{Answer, Category, Question, TestAttempt},
        query::{Operation, QueryOptions, QueryRequest},
        write::{DeleteSummary, InsertManySummary, InsertOneSummary, UpdateSummary},
    },
    schema::CollectionName,
};

fn request(collection: CollectionName, operation: Operation) -> QueryRequest {
    QueryRequest::new(collection, operation)
}

fn by_id(id: &str) -> Value {
    json!({ "_id": id })
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, ClientError> {
    Ok(serde_json::to_value(value)?)
}

/// Hex form of the id the server assigned.
fn inserted_id(summary: InsertOneSummary) -> String {
    match summary.inserted_id {
        Value::String(id) => id,
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct CategoriesApi {
    client: QueryClient,
}

impl CategoriesApi {
    const COLLECTION: CollectionName = CollectionName::Categories;

    pub fn new(client: QueryClient) -> Self {
        Self { client }
    }

    /// Older documents carry `title`/`title_hy` instead of `name`/`name_hy`.
    const SEARCH_FIELDS: &'static [&'static str] =
        &["name", "title", "name_hy", "title_hy", "description"];

    fn listing() -> QueryOptions {
        QueryOptions::default()
            .sort_by("order_index", SortDirection::Ascending)
            .sort_by("name", SortDirection::Ascending)
            .sort_by("title", SortDirection::Ascending)
    }

    pub async fn all(&self) -> Result<Vec<Category>, ClientError> {
        self.client
            .fetch(request(Self::COLLECTION, Operation::Find).with_options(Self::listing()))
            .await
    }

    pub async fn active(&self) -> Result<Vec<Category>, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::Find)
                    .with_query(json!({ "is_active": true }))
                    .with_options(Self::listing()),
            )
            .await
    }

    pub async fn by_id(&self, id: &str) -> Result<Option<Category>, ClientError> {
        self.client
            .fetch(request(Self::COLLECTION, Operation::FindById).with_query(by_id(id)))
            .await
    }

    /// Matches either language's name.
    pub async fn search(&self, term: &str) -> Result<Vec<Category>, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::Find)
                    .with_query(search_text(Self::SEARCH_FIELDS, term)),
            )
            .await
    }

    pub async fn create(&self, category: &Category) -> Result<String, ClientError> {
        let summary: InsertOneSummary = self
            .client
            .fetch(request(Self::COLLECTION, Operation::Insert).with_data(to_payload(category)?))
            .await?;
        Ok(inserted_id(summary))
    }

    pub async fn update(&self, id: &str, changes: Value) -> Result<UpdateSummary, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::Update)
                    .with_query(by_id(id))
                    .with_update(changes),
            )
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteSummary, ClientError> {
        self.client
            .fetch(request(Self::COLLECTION, Operation::Delete).with_query(by_id(id)))
            .await
    }
}

#[derive(Clone)]
pub struct QuestionsApi {
    client: QueryClient,
}

impl QuestionsApi {
    const COLLECTION: CollectionName = CollectionName::Questions;

    pub fn new(client: QueryClient) -> Self {
        Self { client }
    }

    /// Newest first, answers attached.
    pub async fn by_category(&self, category_id: &str) -> Result<Vec<Question>, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::GetQuestionsByCategory)
                    .with_query(json!({ "category_id": category_id })),
            )
            .await
    }

    /// Without answers; use [`QuestionsApi::by_category`] to get them.
    pub async fn page(
        &self,
        category_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<Page<Question>, ClientError> {
        self.client
            .execute_page(
                request(Self::COLLECTION, Operation::Find)
                    .with_query(json!({ "category_id": category_id }))
                    .with_options(
                        QueryOptions::paginate(page, limit)
                            .sort_by("created_at", SortDirection::Descending),
                    ),
            )
            .await
    }

    pub async fn by_id(&self, id: &str) -> Result<Option<Question>, ClientError> {
        self.client
            .fetch(request(Self::COLLECTION, Operation::FindById).with_query(by_id(id)))
            .await
    }

    /// Up to `count` questions drawn uniformly from the category.
    pub async fn random(&self, category_id: &str, count: usize) -> Result<Vec<Question>, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::GetRandomQuestions)
                    .with_query(json!({ "category_id": category_id, "count": count })),
            )
            .await
    }

    pub async fn search(
        &self,
        term: &str,
        category_id: Option<&str>,
    ) -> Result<Vec<Question>, ClientError> {
        let mut query = json!({ "searchTerm": term });
        if let Some(category_id) = category_id {
            query["category_id"] = Value::from(category_id);
        }
        self.client
            .fetch(request(Self::COLLECTION, Operation::Search).with_query(query))
            .await
    }

    pub async fn count(&self, category_id: Option<&str>) -> Result<u64, ClientError> {
        let query = match category_id {
            Some(category_id) => json!({ "category_id": category_id }),
            None => json!({}),
        };
        self.client
            .fetch(request(Self::COLLECTION, Operation::Count).with_query(query))
            .await
    }

    /// Stores the question without its nested answers.
    pub async fn create(&self, question: &Question) -> Result<String, ClientError> {
        let mut payload = to_payload(question)?;
        if let Some(fields) = payload.as_object_mut() {
            fields.remove("answers");
        }
        let summary: InsertOneSummary = self
            .client
            .fetch(request(Self::COLLECTION, Operation::Insert).with_data(payload))
            .await?;
        Ok(inserted_id(summary))
    }

    pub async fn update(&self, id: &str, changes: Value) -> Result<UpdateSummary, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::Update)
                    .with_query(by_id(id))
                    .with_update(changes),
            )
            .await
    }

    /// Dependent answers go with it when the server cascades.
    pub async fn delete(&self, id: &str) -> Result<DeleteSummary, ClientError> {
        self.client
            .fetch(request(Self::COLLECTION, Operation::Delete).with_query(by_id(id)))
            .await
    }
}

#[derive(Clone)]
pub struct AnswersApi {
    client: QueryClient,
}

impl AnswersApi {
    const COLLECTION: CollectionName = CollectionName::Answers;

    pub fn new(client: QueryClient) -> Self {
        Self { client }
    }

    pub async fn by_question(&self, question_id: &str) -> Result<Vec<Answer>, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::Find)
                    .with_query(json!({ "question_id": question_id }))
                    .with_options(
                        QueryOptions::default().sort_by("order_index", SortDirection::Ascending),
                    ),
            )
            .await
    }

    pub async fn create(&self, answer: &Answer) -> Result<String, ClientError> {
        let summary: InsertOneSummary = self
            .client
            .fetch(request(Self::COLLECTION, Operation::Insert).with_data(to_payload(answer)?))
            .await?;
        Ok(inserted_id(summary))
    }

    pub async fn create_many(&self, answers: &[Answer]) -> Result<InsertManySummary, ClientError> {
        self.client
            .fetch(request(Self::COLLECTION, Operation::InsertMany).with_data(to_payload(&answers)?))
            .await
    }

    pub async fn update(&self, id: &str, changes: Value) -> Result<UpdateSummary, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::Update)
                    .with_query(by_id(id))
                    .with_update(changes),
            )
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteSummary, ClientError> {
        self.client
            .fetch(request(Self::COLLECTION, Operation::Delete).with_query(by_id(id)))
            .await
    }

    pub async fn delete_by_question(&self, question_id: &str) -> Result<DeleteSummary, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::DeleteMany)
                    .with_query(json!({ "question_id": question_id })),
            )
            .await
    }
}

#[derive(Clone)]
pub struct TestResultsApi {
    client: QueryClient,
}

impl TestResultsApi {
    const COLLECTION: CollectionName = CollectionName::TestResults;

    pub fn new(client: QueryClient) -> Self {
        Self { client }
    }

    pub async fn record(&self, attempt: &TestAttempt) -> Result<String, ClientError> {
        let summary: InsertOneSummary = self
            .client
            .fetch(request(Self::COLLECTION, Operation::Insert).with_data(to_payload(attempt)?))
            .await?;
        Ok(inserted_id(summary))
    }

    /// The user's latest `limit` attempts, newest first.
    pub async fn recent(&self, user_id: &str, limit: u64) -> Result<Vec<TestAttempt>, ClientError> {
        self.client
            .fetch(
                request(Self::COLLECTION, Operation::Find)
                    .with_query(json!({ "user_id": user_id }))
                    .with_options(
                        QueryOptions::default()
                            .sort_by("completed_at", SortDirection::Descending)
                            .limit(limit),
                    ),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::testing::FakeTransport, models::envelope::Envelope};

    const QID: &str = "64b7f0c2a1b2c3d4e5f60718";

    #[tokio::test]
    async fn test_random_questions_request_shape() {
        let transport = FakeTransport::replying(vec![Envelope::success(
            json!([{
                "_id": QID,
                "question": "<p>Which sign?</p><img src=\"/signs/2.1.png\">",
                "answers": [
                    { "_id": "a1", "answer": "Stop", "is_right": "1", "sort": 1 },
                    { "_id": "a2", "answer": "Yield", "is_right": "0", "sort": 2 }
                ]
            }]),
            None,
        )]);
        let api = QuestionsApi::new(QueryClient::with_transport(transport.clone()));

        let questions = api.random("cat-1", 20).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].image(), Some("/signs/2.1.png"));
        assert_eq!(
            questions[0].correct_answer().and_then(|a| a.id.as_deref()),
            Some("a1")
        );

        let sent = transport.sent();
        assert_eq!(sent[0].collection, "questions");
        assert_eq!(sent[0].operation, "getRandomQuestions");
        assert_eq!(sent[0].query, Some(json!({ "category_id": "cat-1", "count": 20 })));
    }

    #[tokio::test]
    async fn test_question_create_drops_nested_answers() {
        let transport = FakeTransport::replying(vec![Envelope::success(
            json!({ "acknowledged": true, "insertedId": QID }),
            None,
        )]);
        let api = QuestionsApi::new(QueryClient::with_transport(transport.clone()));

        let question = Question {
            id: None,
            category_id: Some("cat-1".into()),
            question_text: "Speed limit in town?".into(),
            question_text_hy: None,
            question_image: None,
            explanation: None,
            explanation_hy: None,
            difficulty_level: None,
            is_active: Some(true),
            created_at: None,
            answers: vec![Answer {
                id: None,
                question_id: None,
                answer_text: "60".into(),
                answer_text_hy: None,
                is_correct: true,
                order_index: 1,
            }],
        };

        assert_eq!(api.create(&question).await.unwrap(), QID);
        let data = transport.sent()[0].data.clone().unwrap();
        assert!(data.get("answers").is_none());
        assert_eq!(data["question_text"], json!("Speed limit in town?"));
    }

    #[tokio::test]
    async fn test_categories_listing_is_sorted() {
        let transport = FakeTransport::replying(vec![Envelope::success(
            json!([{ "_id": "c1", "title": "Road signs", "is_active": "1" }]),
            None,
        )]);
        let api = CategoriesApi::new(QueryClient::with_transport(transport.clone()));

        let categories = api.active().await.unwrap();
        assert_eq!(categories[0].name, "Road signs");
        assert_eq!(categories[0].is_active, Some(true));

        let options = transport.sent()[0].options.clone().unwrap();
        assert_eq!(
            Value::Object(options.sort.unwrap()),
            json!({ "order_index": 1, "name": 1, "title": 1 })
        );
    }

    #[tokio::test]
    async fn test_category_search_covers_title_keys() {
        let transport = FakeTransport::replying(vec![Envelope::success(
            json!([{ "_id": "c1", "title": "Road signs", "title_hy": "Նշաններ" }]),
            None,
        )]);
        let api = CategoriesApi::new(QueryClient::with_transport(transport.clone()));

        let hits = api.search("sign").await.unwrap();
        assert_eq!(hits[0].name, "Road signs");
        assert_eq!(hits[0].name_hy.as_deref(), Some("Նշաններ"));

        let query = transport.sent()[0].query.clone().unwrap();
        let fields: Vec<&str> = query["$or"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|clause| clause.as_object())
            .flat_map(|clause| clause.keys())
            .map(String::as_str)
            .collect();
        assert!(fields.contains(&"title"));
        assert!(fields.contains(&"title_hy"));
        assert!(fields.contains(&"name"));
    }

    #[tokio::test]
    async fn test_recent_results_are_capped_and_newest_first() {
        let transport = FakeTransport::replying(vec![
            Envelope::success(json!({ "acknowledged": true, "insertedId": QID }), None),
            Envelope::success(
                json!([{
                    "_id": QID,
                    "user_id": "u1",
                    "score": 85,
                    "correct_answers": 17,
                    "total_questions": 20,
                    "time_spent_seconds": 600,
                    "passed": true,
                    "completed_at": "2024-05-01T10:10:00Z"
                }]),
                None,
            ),
        ]);
        let api = TestResultsApi::new(QueryClient::with_transport(transport.clone()));

        let attempt = TestAttempt {
            id: None,
            user_id: Some("u1".into()),
            test_id: None,
            category_id: None,
            score: 85,
            correct_answers: 17,
            total_questions: 20,
            time_spent_seconds: 600,
            passed: true,
            started_at: None,
            completed_at: None,
        };
        assert_eq!(api.record(&attempt).await.unwrap(), QID);

        let recent = api.recent("u1", 5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert!(recent[0].passed);
        assert!(recent[0].completed_at.is_some());

        let sent = transport.sent();
        assert_eq!(sent[0].collection, "test_results");
        assert_eq!(sent[0].data.as_ref().unwrap()["score"], json!(85));
        let options = sent[1].options.clone().unwrap();
        assert_eq!(options.limit, Some(5));
        assert_eq!(
            Value::Object(options.sort.unwrap()),
            json!({ "completed_at": -1 })
        );
    }

    #[tokio::test]
    async fn test_delete_by_question_uses_delete_many() {
        let transport = FakeTransport::replying(vec![Envelope::success(
            json!({ "acknowledged": true, "deletedCount": 4 }),
            None,
        )]);
        let api = AnswersApi::new(QueryClient::with_transport(transport.clone()));

        let summary = api.delete_by_question(QID).await.unwrap();
        assert_eq!(summary.deleted_count, 4);
        assert_eq!(summary.cascaded_answers, None);
        assert_eq!(transport.sent()[0].operation, "deleteMany");
    }

    #[tokio::test]
    async fn test_missing_question_is_none() {
        let transport = FakeTransport::replying(vec![Envelope::success(Value::Null, None)]);
        let api = QuestionsApi::new(QueryClient::with_transport(transport));
        assert_eq!(api.by_id(QID).await.unwrap(), None);
    }
}
