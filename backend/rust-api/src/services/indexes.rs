use mongodb::{bson::Document, Database, IndexModel};

use crate::schema::CollectionName;

/// Lookup keys the quiz filters on. Creation is idempotent.
pub const STARTUP_INDEXES: &[(CollectionName, &str)] = &[
    (CollectionName::Questions, "category_id"),
    (CollectionName::Answers, "question_id"),
    (CollectionName::Tests, "category_id"),
    (CollectionName::Resources, "category_id"),
];

/// Best effort: a failed index is logged and startup continues.
pub async fn ensure_indexes(db: &Database) {
    for (collection, field) in STARTUP_INDEXES {
        let mut keys = Document::new();
        keys.insert(*field, 1);
        let model = IndexModel::builder().keys(keys).build();

        match db
            .collection::<Document>(collection.as_str())
            .create_index(model)
            .await
        {
            Ok(result) => tracing::info!(
                "Index {} ensured on {}",
                result.index_name,
                collection.as_str()
            ),
            Err(e) => tracing::warn!(
                "Failed to create index on {}.{}: {}",
                collection.as_str(),
                field,
                e
            ),
        }
    }
}
