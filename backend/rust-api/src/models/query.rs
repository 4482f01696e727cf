use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

use crate::schema::CollectionName;

/// Operation names accepted by `POST /mongodb-query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Find,
    FindOne,
    FindById,
    Count,
    Insert,
    InsertMany,
    Update,
    Replace,
    Delete,
    DeleteMany,
    Aggregate,
    Distinct,
    CreateIndex,
    ListIndexes,
    DropIndex,
    GetQuestionsByCategory,
    GetRandomQuestions,
    Search,
}

impl Operation {
    pub const ALL: [Operation; 18] = [
        Operation::Find,
        Operation::FindOne,
        Operation::FindById,
        Operation::Count,
        Operation::Insert,
        Operation::InsertMany,
        Operation::Update,
        Operation::Replace,
        Operation::Delete,
        Operation::DeleteMany,
        Operation::Aggregate,
        Operation::Distinct,
        Operation::CreateIndex,
        Operation::ListIndexes,
        Operation::DropIndex,
        Operation::GetQuestionsByCategory,
        Operation::GetRandomQuestions,
        Operation::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::FindById => "findById",
            Operation::Count => "count",
            Operation::Insert => "insert",
            Operation::InsertMany => "insertMany",
            Operation::Update => "update",
            Operation::Replace => "replace",
            Operation::Delete => "delete",
            Operation::DeleteMany => "deleteMany",
            Operation::Aggregate => "aggregate",
            Operation::Distinct => "distinct",
            Operation::CreateIndex => "createIndex",
            Operation::ListIndexes => "listIndexes",
            Operation::DropIndex => "dropIndex",
            Operation::GetQuestionsByCategory => "getQuestionsByCategory",
            Operation::GetRandomQuestions => "getRandomQuestions",
            Operation::Search => "search",
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == value)
            .ok_or_else(|| format!("Unknown operation: {}", value))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape of a forwarded query.
///
/// `collection` and `operation` stay plain strings here so that the
/// forwarder can reject them with its own messages, in allow-list order,
/// instead of failing JSON deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<QueryOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upsert: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi: Option<bool>,
}

impl QueryRequest {
    pub fn new(collection: CollectionName, operation: Operation) -> Self {
        Self {
            collection: collection.as_str().to_string(),
            operation: operation.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_update(mut self, update: Value) -> Self {
        self.update = Some(update);
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_pipeline(mut self, stages: Vec<Value>) -> Self {
        self.pipeline = Some(Value::Array(stages));
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = Some(upsert);
        self
    }

    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = Some(multi);
        self
    }

    /// `query` with JSON `null` treated as absent.
    pub fn query_value(&self) -> Option<&Value> {
        self.query.as_ref().filter(|value| !value.is_null())
    }

    /// Field lookup inside `query`, ignoring `null`.
    pub fn query_field(&self, field: &str) -> Option<&Value> {
        self.query_value()
            .and_then(|query| query.get(field))
            .filter(|value| !value.is_null())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Map<String, Value>>,
    /// `createIndex` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    /// `createIndex` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_names_match_wire_contract() {
        assert_eq!(Operation::from_str("findById"), Ok(Operation::FindById));
        assert_eq!(
            Operation::from_str("getRandomQuestions"),
            Ok(Operation::GetRandomQuestions)
        );
        assert_eq!(
            Operation::from_str("drop").unwrap_err(),
            "Unknown operation: drop"
        );
        for op in Operation::ALL {
            assert_eq!(Operation::from_str(op.as_str()), Ok(op));
        }
    }

    #[test]
    fn test_request_tolerates_missing_fields() {
        let request: QueryRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.collection, "");
        assert_eq!(request.operation, "");
        assert!(request.query.is_none());
    }

    #[test]
    fn test_null_query_is_absent() {
        let request: QueryRequest = serde_json::from_value(json!({
            "collection": "questions",
            "operation": "find",
            "query": null
        }))
        .unwrap();
        assert!(request.query_value().is_none());
    }

    #[test]
    fn test_query_field_skips_nulls() {
        let request = QueryRequest::new(CollectionName::Questions, Operation::Search)
            .with_query(json!({ "searchTerm": "stop", "category_id": null }));
        assert_eq!(request.query_field("searchTerm"), Some(&json!("stop")));
        assert!(request.query_field("category_id").is_none());
    }

    #[test]
    fn test_builder_serializes_compactly() {
        let request = QueryRequest::new(CollectionName::Answers, Operation::Update)
            .with_query(json!({ "_id": "64b7f0c2a1b2c3d4e5f60718" }))
            .with_update(json!({ "is_correct": true }))
            .multi(false);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "collection": "answers",
                "operation": "update",
                "query": { "_id": "64b7f0c2a1b2c3d4e5f60718" },
                "update": { "is_correct": true },
                "multi": false
            })
        );
    }
}
