use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::{metrics, models::envelope::Envelope};

/// Per-request failures of the query forwarder.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid collection: {0}")]
    InvalidCollection(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Missing or malformed operation-specific field.
    #[error("{0}")]
    Validation(String),

    /// Payload that cannot be represented as BSON.
    #[error("{0}")]
    Conversion(String),

    #[error("{0}")]
    Store(#[from] mongodb::error::Error),
}

impl QueryError {
    pub fn validation(message: impl Into<String>) -> Self {
        QueryError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Metric label for the failure class.
    pub fn reason(&self) -> &'static str {
        match self {
            QueryError::InvalidCollection(_) => "invalid_collection",
            QueryError::UnknownOperation(_) => "unknown_operation",
            QueryError::Validation(_) => "validation",
            QueryError::Conversion(_) => "conversion",
            QueryError::Store(_) => "store",
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            QueryError::Store(err) => tracing::error!("MongoDB error: {}", err),
            other => tracing::warn!("Rejected query: {}", other),
        }
        metrics::record_query_failure(self.reason());

        (status, Json(Envelope::failure(self.to_string()))).into_response()
    }
}
