use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::metrics;

pub mod query;

pub use query::forward_query;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "drivetheory-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}
