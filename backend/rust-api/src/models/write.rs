use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// Write results mirror the camelCase shapes the admin console already reads.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneSummary {
    pub acknowledged: bool,
    pub inserted_id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertManySummary {
    pub acknowledged: bool,
    pub inserted_count: u64,
    pub inserted_ids: BTreeMap<usize, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    #[serde(default)]
    pub upserted_id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub acknowledged: bool,
    pub deleted_count: u64,
    /// Answers removed along with deleted questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascaded_answers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub acknowledged: bool,
    pub index_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_many_ids_keyed_by_position() {
        let mut ids = BTreeMap::new();
        ids.insert(0, json!("64b7f0c2a1b2c3d4e5f60718"));
        ids.insert(1, json!("64b7f0c2a1b2c3d4e5f60719"));
        let summary = InsertManySummary {
            acknowledged: true,
            inserted_count: 2,
            inserted_ids: ids,
        };

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["insertedIds"]["1"], json!("64b7f0c2a1b2c3d4e5f60719"));
        assert_eq!(value["insertedCount"], json!(2));

        let parsed: InsertManySummary = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, summary);
    }

    #[test]
    fn test_plain_delete_omits_cascade_count() {
        let value = serde_json::to_value(DeleteSummary {
            acknowledged: true,
            deleted_count: 1,
            cascaded_answers: None,
        })
        .unwrap();
        assert_eq!(value, json!({ "acknowledged": true, "deletedCount": 1 }));
    }
}
