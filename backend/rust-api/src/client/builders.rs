use serde_json::{json, Map, Value};

use crate::models::query::QueryOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

impl QueryOptions {
    /// 1-based page window. Page 0 is treated as page 1.
    pub fn paginate(page: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        Self {
            skip: Some(page.saturating_sub(1) * limit),
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Appends a sort key; earlier keys take precedence.
    pub fn sort_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort
            .get_or_insert_with(Map::new)
            .insert(field.to_string(), Value::from(direction.as_i32()));
        self
    }

    /// Inclusion projection over `fields`.
    pub fn select(mut self, fields: &[&str]) -> Self {
        let projection = self.projection.get_or_insert_with(Map::new);
        for field in fields {
            projection.insert(field.to_string(), Value::from(1));
        }
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Case-insensitive literal substring filter over several fields, for plain
/// `find` calls on collections the server-side `search` does not suit.
pub fn search_text(fields: &[&str], term: &str) -> Value {
    let pattern = regex::escape(term);
    let clauses: Vec<Value> = fields
        .iter()
        .map(|field| json!({ *field: { "$regex": pattern, "$options": "i" } }))
        .collect();
    json!({ "$or": clauses })
}
