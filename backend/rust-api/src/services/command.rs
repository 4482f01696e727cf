//! Validated form of a forwarded query.
//!
//! [`QueryCommand::parse`] performs the operation-specific required-field
//! checks; once a command exists, dispatch never has to re-validate.

use mongodb::bson::{Bson, Document};
use serde_json::Value;

use crate::{
    error::QueryError,
    models::query::{Operation, QueryRequest},
    schema::CollectionSchema,
    services::coercion::{
        coerce_identifier_value, json_to_bson, json_to_document, prepare_filter, prepare_payload,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct FindSpec {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindSpec {
    /// Pagination metadata is attached when the caller asked for a window.
    pub fn wants_pagination(&self) -> bool {
        self.skip.is_some() || self.limit.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryCommand {
    Find {
        filter: Document,
        spec: FindSpec,
    },
    FindOne {
        filter: Document,
    },
    FindById {
        id: Bson,
    },
    Count {
        filter: Document,
    },
    Insert {
        document: Document,
    },
    InsertMany {
        documents: Vec<Document>,
    },
    Update {
        filter: Document,
        changes: Document,
        upsert: bool,
        multi: bool,
    },
    Replace {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },
    Delete {
        filter: Document,
        many: bool,
    },
    Aggregate {
        pipeline: Vec<Document>,
    },
    Distinct {
        field: String,
        filter: Document,
    },
    CreateIndex {
        keys: Document,
        unique: Option<bool>,
        name: Option<String>,
    },
    ListIndexes,
    DropIndex {
        name: String,
    },
    QuestionsByCategory {
        category_id: Bson,
    },
    RandomQuestions {
        category_id: Bson,
        count: usize,
    },
    Search {
        term: String,
        category_id: Option<Bson>,
    },
}

impl QueryCommand {
    pub fn parse(
        operation: Operation,
        request: &QueryRequest,
        schema: &CollectionSchema,
    ) -> Result<Self, QueryError> {
        let command = match operation {
            Operation::Find => {
                let options = request.options.clone().unwrap_or_default();
                QueryCommand::Find {
                    filter: optional_filter(request, schema)?,
                    spec: FindSpec {
                        sort: options
                            .sort
                            .map(|sort| json_to_document(&Value::Object(sort), "Sort"))
                            .transpose()?,
                        projection: options
                            .projection
                            .map(|fields| json_to_document(&Value::Object(fields), "Projection"))
                            .transpose()?,
                        skip: options.skip,
                        limit: options.limit,
                    },
                }
            }
            Operation::FindOne => QueryCommand::FindOne {
                filter: optional_filter(request, schema)?,
            },
            Operation::FindById => {
                let raw = request
                    .query_field("_id")
                    .ok_or_else(|| QueryError::validation("_id is required for findById operation"))?;
                QueryCommand::FindById {
                    id: identifier(raw)?,
                }
            }
            Operation::Count => QueryCommand::Count {
                filter: optional_filter(request, schema)?,
            },
            Operation::Insert => {
                let data = present(request.data.as_ref())
                    .ok_or_else(|| QueryError::validation("Data is required for insert operation"))?;
                QueryCommand::Insert {
                    document: prepare_payload(data, "Data", schema)?,
                }
            }
            Operation::InsertMany => {
                let items = request
                    .data
                    .as_ref()
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        QueryError::validation("Data must be an array for insertMany operation")
                    })?;
                let documents = items
                    .iter()
                    .map(|item| prepare_payload(item, "Each insertMany item", schema))
                    .collect::<Result<Vec<_>, _>>()?;
                QueryCommand::InsertMany { documents }
            }
            Operation::Update => {
                // older clients send the changes under `data`
                let changes = present(request.update.as_ref()).or(present(request.data.as_ref()));
                let (query, changes) = request.query_value().zip(changes).ok_or_else(|| {
                    QueryError::validation("Query and update data are required for update operation")
                })?;
                QueryCommand::Update {
                    filter: prepare_filter(query, schema)?,
                    changes: prepare_payload(changes, "Update", schema)?,
                    upsert: request.upsert.unwrap_or(false),
                    multi: request.multi.unwrap_or(false),
                }
            }
            Operation::Replace => {
                let (query, data) = request
                    .query_value()
                    .zip(present(request.data.as_ref()))
                    .ok_or_else(|| {
                        QueryError::validation("Query and data are required for replace operation")
                    })?;
                QueryCommand::Replace {
                    filter: prepare_filter(query, schema)?,
                    replacement: prepare_payload(data, "Data", schema)?,
                    upsert: request.upsert.unwrap_or(false),
                }
            }
            Operation::Delete | Operation::DeleteMany => {
                let query = request.query_value().ok_or_else(|| {
                    QueryError::validation(format!("Query is required for {} operation", operation))
                })?;
                QueryCommand::Delete {
                    filter: prepare_filter(query, schema)?,
                    many: operation == Operation::DeleteMany,
                }
            }
            Operation::Aggregate => {
                let stages = request
                    .pipeline
                    .as_ref()
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        QueryError::validation("Pipeline must be an array for aggregate operation")
                    })?;
                // stages are passed through verbatim, no coercion
                let pipeline = stages
                    .iter()
                    .map(|stage| json_to_document(stage, "Each pipeline stage"))
                    .collect::<Result<Vec<_>, _>>()?;
                QueryCommand::Aggregate { pipeline }
            }
            Operation::Distinct => {
                let field = request
                    .query_field("field")
                    .and_then(Value::as_str)
                    .filter(|field| !field.is_empty())
                    .ok_or_else(|| QueryError::validation("Field is required for distinct operation"))?
                    .to_string();
                let mut filter = optional_filter(request, schema)?;
                filter.remove("field");
                QueryCommand::Distinct { field, filter }
            }
            Operation::CreateIndex => {
                let keys = present(request.data.as_ref())
                    .map(|data| json_to_document(data, "Index keys"))
                    .transpose()?
                    .filter(|keys| !keys.is_empty())
                    .ok_or_else(|| {
                        QueryError::validation("Index keys are required for createIndex operation")
                    })?;
                let options = request.options.clone().unwrap_or_default();
                QueryCommand::CreateIndex {
                    keys,
                    unique: options.unique,
                    name: options.name,
                }
            }
            Operation::ListIndexes => QueryCommand::ListIndexes,
            Operation::DropIndex => {
                let name = request
                    .query_field("name")
                    .and_then(Value::as_str)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| {
                        QueryError::validation("Index name is required for dropIndex operation")
                    })?;
                QueryCommand::DropIndex {
                    name: name.to_string(),
                }
            }
            Operation::GetQuestionsByCategory => {
                let raw = category_id(request).ok_or_else(|| {
                    QueryError::validation(
                        "category_id is required for getQuestionsByCategory operation",
                    )
                })?;
                QueryCommand::QuestionsByCategory {
                    category_id: identifier(raw)?,
                }
            }
            Operation::GetRandomQuestions => {
                let (raw, count) = category_id(request)
                    .zip(request.query_field("count").and_then(positive_count))
                    .ok_or_else(|| {
                        QueryError::validation(
                            "category_id and count are required for getRandomQuestions operation",
                        )
                    })?;
                QueryCommand::RandomQuestions {
                    category_id: identifier(raw)?,
                    count,
                }
            }
            Operation::Search => {
                let term = request
                    .query_field("searchTerm")
                    .and_then(Value::as_str)
                    .filter(|term| !term.is_empty())
                    .ok_or_else(|| QueryError::validation("searchTerm is required for search operation"))?
                    .to_string();
                let category_id = category_id(request).map(identifier).transpose()?;
                QueryCommand::Search { term, category_id }
            }
        };

        Ok(command)
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

fn optional_filter(request: &QueryRequest, schema: &CollectionSchema) -> Result<Document, QueryError> {
    match request.query_value() {
        Some(query) => prepare_filter(query, schema),
        None => Ok(Document::new()),
    }
}

/// `query.category_id`, with empty strings treated as absent.
fn category_id(request: &QueryRequest) -> Option<&Value> {
    request
        .query_field("category_id")
        .filter(|value| value.as_str() != Some(""))
}

fn identifier(raw: &Value) -> Result<Bson, QueryError> {
    let mut id = json_to_bson(raw)?;
    coerce_identifier_value(&mut id);
    Ok(id)
}

/// Accepts a positive integer, or a string holding one.
fn positive_count(value: &Value) -> Option<usize> {
    let count = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    usize::try_from(count).ok().filter(|count| *count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::query::QueryOptions, schema::CollectionName};
    use mongodb::bson::{doc, oid::ObjectId};
    use serde_json::json;

    const HEX: &str = "64b7f0c2a1b2c3d4e5f60718";

    fn parse(collection: CollectionName, request: QueryRequest) -> Result<QueryCommand, QueryError> {
        let operation: Operation = request.operation.parse().unwrap();
        QueryCommand::parse(operation, &request, collection.schema())
    }

    fn message(result: Result<QueryCommand, QueryError>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_find_collects_window_and_sort() {
        let request = QueryRequest::new(CollectionName::Questions, Operation::Find)
            .with_query(json!({ "category_id": HEX }))
            .with_options(QueryOptions {
                skip: Some(10),
                limit: Some(5),
                sort: Some(json!({ "created_at": -1 }).as_object().unwrap().clone()),
                ..Default::default()
            });

        let QueryCommand::Find { filter, spec } = parse(CollectionName::Questions, request).unwrap()
        else {
            panic!("expected find");
        };
        assert_eq!(
            filter,
            doc! { "category_id": ObjectId::parse_str(HEX).unwrap() }
        );
        assert!(spec.wants_pagination());
        assert_eq!(spec.skip, Some(10));
        assert_eq!(spec.sort, Some(doc! { "created_at": -1_i64 }));
    }

    #[test]
    fn test_plain_find_has_no_window() {
        let request = QueryRequest::new(CollectionName::Categories, Operation::Find);
        let QueryCommand::Find { filter, spec } = parse(CollectionName::Categories, request).unwrap()
        else {
            panic!("expected find");
        };
        assert!(filter.is_empty());
        assert!(!spec.wants_pagination());
    }

    #[test]
    fn test_find_by_id_requires_id() {
        let request = QueryRequest::new(CollectionName::Questions, Operation::FindById)
            .with_query(json!({}));
        assert_eq!(
            message(parse(CollectionName::Questions, request)),
            "_id is required for findById operation"
        );

        let request = QueryRequest::new(CollectionName::Questions, Operation::FindById)
            .with_query(json!({ "_id": HEX }));
        assert_eq!(
            parse(CollectionName::Questions, request).unwrap(),
            QueryCommand::FindById {
                id: Bson::ObjectId(ObjectId::parse_str(HEX).unwrap())
            }
        );
    }

    #[test]
    fn test_required_payloads() {
        let cases = [
            (Operation::Insert, "Data is required for insert operation"),
            (
                Operation::InsertMany,
                "Data must be an array for insertMany operation",
            ),
            (
                Operation::Update,
                "Query and update data are required for update operation",
            ),
            (
                Operation::Replace,
                "Query and data are required for replace operation",
            ),
            (Operation::Delete, "Query is required for delete operation"),
            (
                Operation::DeleteMany,
                "Query is required for deleteMany operation",
            ),
            (
                Operation::Aggregate,
                "Pipeline must be an array for aggregate operation",
            ),
            (Operation::Distinct, "Field is required for distinct operation"),
            (
                Operation::CreateIndex,
                "Index keys are required for createIndex operation",
            ),
            (
                Operation::DropIndex,
                "Index name is required for dropIndex operation",
            ),
            (
                Operation::GetQuestionsByCategory,
                "category_id is required for getQuestionsByCategory operation",
            ),
            (
                Operation::GetRandomQuestions,
                "category_id and count are required for getRandomQuestions operation",
            ),
            (Operation::Search, "searchTerm is required for search operation"),
        ];

        for (operation, expected) in cases {
            let request = QueryRequest::new(CollectionName::Questions, operation);
            assert_eq!(
                message(parse(CollectionName::Questions, request)),
                expected,
                "{}",
                operation
            );
        }
    }

    #[test]
    fn test_update_falls_back_to_data_payload() {
        let request = QueryRequest::new(CollectionName::Answers, Operation::Update)
            .with_query(json!({ "_id": HEX }))
            .with_data(json!({ "is_correct": "1" }));

        let command = parse(CollectionName::Answers, request).unwrap();
        assert_eq!(
            command,
            QueryCommand::Update {
                filter: doc! { "_id": ObjectId::parse_str(HEX).unwrap() },
                changes: doc! { "is_correct": true },
                upsert: false,
                multi: false,
            }
        );
    }

    #[test]
    fn test_update_needs_filter_even_with_changes() {
        let request = QueryRequest::new(CollectionName::Answers, Operation::Update)
            .with_update(json!({ "answer_text": "x" }));
        assert_eq!(
            message(parse(CollectionName::Answers, request)),
            "Query and update data are required for update operation"
        );
    }

    #[test]
    fn test_distinct_strips_field_from_filter() {
        let request = QueryRequest::new(CollectionName::Questions, Operation::Distinct)
            .with_query(json!({ "field": "category_id", "is_active": true }));
        assert_eq!(
            parse(CollectionName::Questions, request).unwrap(),
            QueryCommand::Distinct {
                field: "category_id".into(),
                filter: doc! { "is_active": true },
            }
        );
    }

    #[test]
    fn test_random_questions_count_rules() {
        let zero = QueryRequest::new(CollectionName::Questions, Operation::GetRandomQuestions)
            .with_query(json!({ "category_id": HEX, "count": 0 }));
        assert!(parse(CollectionName::Questions, zero).is_err());

        let text = QueryRequest::new(CollectionName::Questions, Operation::GetRandomQuestions)
            .with_query(json!({ "category_id": HEX, "count": "20" }));
        assert!(matches!(
            parse(CollectionName::Questions, text).unwrap(),
            QueryCommand::RandomQuestions { count: 20, .. }
        ));
    }

    #[test]
    fn test_search_ignores_empty_category() {
        let request = QueryRequest::new(CollectionName::Questions, Operation::Search)
            .with_query(json!({ "searchTerm": "sign", "category_id": "" }));
        assert_eq!(
            parse(CollectionName::Questions, request).unwrap(),
            QueryCommand::Search {
                term: "sign".into(),
                category_id: None
            }
        );
    }

    #[test]
    fn test_aggregate_pipeline_is_verbatim() {
        let request = QueryRequest::new(CollectionName::Questions, Operation::Aggregate)
            .with_pipeline(vec![json!({ "$match": { "category_id": HEX } })]);
        assert_eq!(
            parse(CollectionName::Questions, request).unwrap(),
            QueryCommand::Aggregate {
                pipeline: vec![doc! { "$match": { "category_id": HEX } }]
            }
        );
    }

    #[test]
    fn test_insert_many_rejects_scalar_items() {
        let request = QueryRequest::new(CollectionName::Answers, Operation::InsertMany)
            .with_data(json!([{ "answer_text": "a" }, 3]));
        assert_eq!(
            message(parse(CollectionName::Answers, request)),
            "Each insertMany item must be an object"
        );
    }
}
