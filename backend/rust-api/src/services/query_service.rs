use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashMap, str::FromStr};

use crate::{
    error::QueryError,
    metrics,
    models::{
        envelope::Pagination,
        query::{Operation, QueryRequest},
        write::{DeleteSummary, IndexSummary, InsertManySummary, InsertOneSummary, UpdateSummary},
    },
    schema::CollectionName,
    services::{
        coercion::{bson_to_json, document_to_json, documents_to_json, looks_like_object_id},
        command::{FindSpec, QueryCommand},
        AppState,
    },
};

/// Answers come back in the order the quiz renders them. Both ordering
/// field names exist in stored data.
fn answer_order() -> Document {
    doc! { "order_index": 1, "sort": 1, "_id": 1 }
}

#[derive(Debug)]
pub struct QueryOutcome {
    pub data: Value,
    pub pagination: Option<Pagination>,
}

impl QueryOutcome {
    fn data(data: Value) -> Self {
        Self {
            data,
            pagination: None,
        }
    }
}

pub struct QueryService {
    mongo: Database,
    default_page_limit: u64,
    cascade_delete_answers: bool,
}

impl QueryService {
    pub fn new(state: &AppState) -> Self {
        Self {
            mongo: state.mongo.clone(),
            default_page_limit: state.config.default_page_limit,
            cascade_delete_answers: state.config.cascade_delete_answers,
        }
    }

    /// Validates and runs one forwarded query.
    ///
    /// Order: collection allow-list, operation name, operation-specific
    /// fields, then the store.
    pub async fn execute(&self, request: QueryRequest) -> Result<QueryOutcome, QueryError> {
        let collection = CollectionName::from_str(&request.collection)
            .map_err(|_| QueryError::InvalidCollection(request.collection.clone()))?;
        let operation = Operation::from_str(&request.operation)
            .map_err(|_| QueryError::UnknownOperation(request.operation.clone()))?;
        let command = QueryCommand::parse(operation, &request, collection.schema())?;

        let outcome = metrics::track_db_operation(
            operation.as_str(),
            collection.as_str(),
            self.dispatch(collection, command),
        )
        .await?;

        tracing::debug!(
            "Result: {} documents",
            outcome.data.as_array().map(Vec::len).unwrap_or(1)
        );

        Ok(outcome)
    }

    async fn dispatch(
        &self,
        name: CollectionName,
        command: QueryCommand,
    ) -> Result<QueryOutcome, QueryError> {
        let collection = self.collection(name);

        let outcome = match command {
            QueryCommand::Find { filter, spec } => self.find(&collection, filter, spec).await?,
            QueryCommand::FindOne { filter } => {
                let found = collection.find_one(filter).await?;
                QueryOutcome::data(found.map(document_to_json).unwrap_or(Value::Null))
            }
            QueryCommand::FindById { id } => {
                let found = collection.find_one(doc! { "_id": id }).await?;
                QueryOutcome::data(found.map(document_to_json).unwrap_or(Value::Null))
            }
            QueryCommand::Count { filter } => {
                let count = collection.count_documents(filter).await?;
                QueryOutcome::data(Value::from(count))
            }
            QueryCommand::Insert { document } => {
                let result = collection.insert_one(document).await?;
                QueryOutcome::data(to_json(InsertOneSummary {
                    acknowledged: true,
                    inserted_id: bson_to_json(result.inserted_id),
                })?)
            }
            QueryCommand::InsertMany { documents } => {
                let result = collection.insert_many(documents).await?;
                let inserted_ids = result
                    .inserted_ids
                    .into_iter()
                    .map(|(index, id)| (index, bson_to_json(id)))
                    .collect::<std::collections::BTreeMap<_, _>>();
                QueryOutcome::data(to_json(InsertManySummary {
                    acknowledged: true,
                    inserted_count: inserted_ids.len() as u64,
                    inserted_ids,
                })?)
            }
            QueryCommand::Update {
                filter,
                changes,
                upsert,
                multi,
            } => {
                let update = doc! { "$set": changes };
                let result = if multi {
                    collection.update_many(filter, update).upsert(upsert).await?
                } else {
                    collection.update_one(filter, update).upsert(upsert).await?
                };
                QueryOutcome::data(to_json(update_summary(
                    result.matched_count,
                    result.modified_count,
                    result.upserted_id,
                ))?)
            }
            QueryCommand::Replace {
                filter,
                replacement,
                upsert,
            } => {
                let result = collection
                    .replace_one(filter, replacement)
                    .upsert(upsert)
                    .await?;
                QueryOutcome::data(to_json(update_summary(
                    result.matched_count,
                    result.modified_count,
                    result.upserted_id,
                ))?)
            }
            QueryCommand::Delete { filter, many } => {
                let summary = if name == CollectionName::Questions && self.cascade_delete_answers {
                    self.delete_questions_with_answers(&collection, filter, many)
                        .await?
                } else {
                    let result = if many {
                        collection.delete_many(filter).await?
                    } else {
                        collection.delete_one(filter).await?
                    };
                    DeleteSummary {
                        acknowledged: true,
                        deleted_count: result.deleted_count,
                        cascaded_answers: None,
                    }
                };
                QueryOutcome::data(to_json(summary)?)
            }
            QueryCommand::Aggregate { pipeline } => {
                let docs: Vec<Document> = collection.aggregate(pipeline).await?.try_collect().await?;
                QueryOutcome::data(documents_to_json(docs))
            }
            QueryCommand::Distinct { field, filter } => {
                let values = collection.distinct(field, filter).await?;
                QueryOutcome::data(Value::Array(values.into_iter().map(bson_to_json).collect()))
            }
            QueryCommand::CreateIndex { keys, unique, name } => {
                let options = IndexOptions::builder().unique(unique).name(name).build();
                let model = IndexModel::builder().keys(keys).options(options).build();
                let result = collection.create_index(model).await?;
                QueryOutcome::data(to_json(IndexSummary {
                    acknowledged: true,
                    index_name: result.index_name,
                })?)
            }
            QueryCommand::ListIndexes => {
                let names = collection.list_index_names().await?;
                QueryOutcome::data(Value::from(names))
            }
            QueryCommand::DropIndex { name } => {
                collection.drop_index(&name).await?;
                QueryOutcome::data(to_json(IndexSummary {
                    acknowledged: true,
                    index_name: name,
                })?)
            }
            QueryCommand::QuestionsByCategory { category_id } => {
                let questions: Vec<Document> = collection
                    .find(doc! { "category_id": category_id })
                    .sort(doc! { "created_at": -1 })
                    .await?
                    .try_collect()
                    .await?;
                let questions = self
                    .attach_answers(Operation::GetQuestionsByCategory, questions)
                    .await?;
                QueryOutcome::data(documents_to_json(questions))
            }
            QueryCommand::RandomQuestions { category_id, count } => {
                let questions: Vec<Document> = collection
                    .find(doc! { "category_id": category_id })
                    .await?
                    .try_collect()
                    .await?;
                let drawn = sample(questions, count, &mut rand::rng());
                let drawn = self
                    .attach_answers(Operation::GetRandomQuestions, drawn)
                    .await?;
                QueryOutcome::data(documents_to_json(drawn))
            }
            QueryCommand::Search { term, category_id } => {
                let filter = search_filter(&term, name.schema().search_fields, category_id);
                let docs: Vec<Document> = collection.find(filter).await?.try_collect().await?;
                QueryOutcome::data(documents_to_json(docs))
            }
        };

        Ok(outcome)
    }

    fn collection(&self, name: CollectionName) -> Collection<Document> {
        self.mongo.collection::<Document>(name.as_str())
    }

    async fn find(
        &self,
        collection: &Collection<Document>,
        filter: Document,
        spec: FindSpec,
    ) -> Result<QueryOutcome, QueryError> {
        let mut action = collection.find(filter.clone());
        if let Some(projection) = spec.projection.clone() {
            action = action.projection(projection);
        }
        if let Some(sort) = spec.sort.clone() {
            action = action.sort(sort);
        }
        if let Some(skip) = spec.skip.filter(|skip| *skip > 0) {
            action = action.skip(skip);
        }
        if let Some(limit) = spec.limit.filter(|limit| *limit > 0) {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let docs: Vec<Document> = action.await?.try_collect().await?;

        let pagination = if spec.wants_pagination() {
            let total = collection.count_documents(filter).await?;
            Some(Pagination::compute(
                total,
                spec.skip,
                spec.limit,
                self.default_page_limit,
            ))
        } else {
            None
        };

        Ok(QueryOutcome {
            data: documents_to_json(docs),
            pagination,
        })
    }

    /// Attaches each question's answers under `answers`, fetched with one
    /// batched query and grouped in memory. Order within a question follows
    /// [`answer_order`].
    async fn attach_answers(
        &self,
        operation: Operation,
        mut questions: Vec<Document>,
    ) -> Result<Vec<Document>, QueryError> {
        let ids: Vec<Bson> = questions
            .iter()
            .filter_map(|question| question.get("_id").cloned())
            .collect();

        let mut grouped: HashMap<String, Vec<Bson>> = HashMap::new();
        if !ids.is_empty() {
            let answers: Vec<Document> = self
                .collection(CollectionName::Answers)
                .find(doc! { "question_id": { "$in": match_any_form(&ids) } })
                .sort(answer_order())
                .await?
                .try_collect()
                .await?;
            metrics::record_answers_attached(operation.as_str(), answers.len());

            for answer in answers {
                if let Some(key) = answer.get("question_id").map(id_key) {
                    grouped.entry(key).or_default().push(Bson::Document(answer));
                }
            }
        }

        for question in questions.iter_mut() {
            let answers = question
                .get("_id")
                .map(id_key)
                .and_then(|key| grouped.remove(&key))
                .unwrap_or_default();
            question.insert("answers", Bson::Array(answers));
        }

        Ok(questions)
    }

    /// Deletes matching questions and the answers that reference them.
    async fn delete_questions_with_answers(
        &self,
        questions: &Collection<Document>,
        filter: Document,
        many: bool,
    ) -> Result<DeleteSummary, QueryError> {
        let ids: Vec<Bson> = if many {
            questions
                .find(filter)
                .projection(doc! { "_id": 1 })
                .await?
                .try_collect::<Vec<Document>>()
                .await?
                .into_iter()
                .filter_map(|doc| doc.get("_id").cloned())
                .collect()
        } else {
            questions
                .find_one(filter)
                .projection(doc! { "_id": 1 })
                .await?
                .and_then(|doc| doc.get("_id").cloned())
                .into_iter()
                .collect()
        };

        if ids.is_empty() {
            return Ok(DeleteSummary {
                acknowledged: true,
                deleted_count: 0,
                cascaded_answers: Some(0),
            });
        }

        let deleted = questions
            .delete_many(doc! { "_id": { "$in": ids.clone() } })
            .await?;
        let cascaded = self
            .collection(CollectionName::Answers)
            .delete_many(doc! { "question_id": { "$in": match_any_form(&ids) } })
            .await?;

        tracing::info!(
            "Deleted {} questions and {} dependent answers",
            deleted.deleted_count,
            cascaded.deleted_count
        );

        Ok(DeleteSummary {
            acknowledged: true,
            deleted_count: deleted.deleted_count,
            cascaded_answers: Some(cascaded.deleted_count),
        })
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, QueryError> {
    serde_json::to_value(value)
        .map_err(|e| QueryError::Conversion(format!("Failed to render result: {}", e)))
}

fn update_summary(matched: u64, modified: u64, upserted_id: Option<Bson>) -> UpdateSummary {
    UpdateSummary {
        acknowledged: true,
        matched_count: matched,
        modified_count: modified,
        upserted_count: u64::from(upserted_id.is_some()),
        upserted_id: upserted_id.map(bson_to_json).unwrap_or(Value::Null),
    }
}

/// Grouping key shared by an `ObjectId` and its hex string form.
fn id_key(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(text) => text.to_ascii_lowercase(),
        other => other.to_string(),
    }
}

/// Identifier values plus their twin in the other form: the hex string of an
/// `ObjectId`, and the `ObjectId` of a hex string. Answers stored under either
/// form of their question's id then still match.
fn match_any_form(ids: &[Bson]) -> Vec<Bson> {
    let mut values = Vec::with_capacity(ids.len() * 2);
    for id in ids {
        values.push(id.clone());
        match id {
            Bson::ObjectId(oid) => values.push(Bson::String(oid.to_hex())),
            Bson::String(text) if looks_like_object_id(text) => {
                if let Ok(oid) = ObjectId::parse_str(text) {
                    values.push(Bson::ObjectId(oid));
                }
            }
            _ => {}
        }
    }
    values
}

/// Uniform draw of `min(count, len)` items without replacement (partial
/// Fisher-Yates).
pub(crate) fn sample<T: Clone, R: Rng + ?Sized>(
    mut items: Vec<T>,
    count: usize,
    rng: &mut R,
) -> Vec<T> {
    let amount = count.min(items.len());
    let (drawn, _) = items.partial_shuffle(rng, amount);
    drawn.to_vec()
}

/// Case-insensitive literal substring match over `fields`, optionally
/// restricted to one category.
pub(crate) fn search_filter(term: &str, fields: &[&str], category_id: Option<Bson>) -> Document {
    let pattern = regex::escape(term);
    let clauses: Vec<Document> = fields
        .iter()
        .map(|field| {
            let mut clause = Document::new();
            clause.insert(*field, doc! { "$regex": pattern.as_str(), "$options": "i" });
            clause
        })
        .collect();

    let mut filter = doc! { "$or": clauses };
    if let Some(category_id) = category_id {
        filter.insert("category_id", category_id);
    }
    filter
}
