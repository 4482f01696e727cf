use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform `{success, data | error}` wrapper returned by the forwarder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl Envelope {
    pub fn success(data: Value, pagination: Option<Pagination>) -> Self {
        Self {
            success: true,
            // Some(Null) keeps `"data": null` on the wire for empty lookups
            data: Some(data),
            error: None,
            pagination,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            pagination: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

impl Pagination {
    /// `limit` of `None` or `0` (driver's "no limit") falls back to
    /// `default_limit` for the arithmetic.
    pub fn compute(total: u64, skip: Option<u64>, limit: Option<u64>, default_limit: u64) -> Self {
        let limit = limit
            .filter(|limit| *limit > 0)
            .unwrap_or(default_limit)
            .max(1);
        let page = skip.unwrap_or(0) / limit + 1;

        Self {
            total,
            page,
            limit,
            pages: total.div_ceil(limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_third_page_of_five() {
        let pagination = Pagination::compute(23, Some(10), Some(5), 10);
        assert_eq!(
            pagination,
            Pagination {
                total: 23,
                page: 3,
                limit: 5,
                pages: 5
            }
        );
    }

    #[test]
    fn test_partial_offsets_round_down() {
        assert_eq!(Pagination::compute(40, Some(14), Some(5), 10).page, 3);
        assert_eq!(Pagination::compute(40, Some(4), Some(5), 10).page, 1);
    }

    #[test]
    fn test_default_limit_applies_without_limit() {
        let pagination = Pagination::compute(31, Some(20), None, 10);
        assert_eq!(pagination.limit, 10);
        assert_eq!(pagination.page, 3);
        assert_eq!(pagination.pages, 4);
    }

    #[test]
    fn test_zero_limit_means_unbounded() {
        let pagination = Pagination::compute(7, None, Some(0), 10);
        assert_eq!(pagination.limit, 10);
        assert_eq!(pagination.pages, 1);
    }

    #[test]
    fn test_empty_result_has_no_pages() {
        let pagination = Pagination::compute(0, Some(0), Some(5), 10);
        assert_eq!(pagination.pages, 0);
        assert_eq!(pagination.page, 1);
    }

    #[test]
    fn test_success_keeps_null_data() {
        let body = serde_json::to_value(Envelope::success(Value::Null, None)).unwrap();
        assert_eq!(body, json!({ "success": true, "data": null }));
    }

    #[test]
    fn test_failure_shape() {
        let body = serde_json::to_value(Envelope::failure("Invalid collection: users")).unwrap();
        assert_eq!(
            body,
            json!({ "success": false, "error": "Invalid collection: users" })
        );
    }
}
