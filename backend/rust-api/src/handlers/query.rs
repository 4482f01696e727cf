use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    error::QueryError,
    extractors::AppJson,
    models::{envelope::Envelope, query::QueryRequest},
    services::{query_service::QueryService, AppState},
};

/// POST /mongodb-query
pub async fn forward_query(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<QueryRequest>,
) -> Result<Json<Envelope>, QueryError> {
    tracing::info!(
        collection = %request.collection,
        operation = %request.operation,
        has_query = request.query_value().is_some(),
        "MongoDB Query"
    );

    let service = QueryService::new(&state);
    let outcome = service.execute(request).await?;

    Ok(Json(Envelope::success(outcome.data, outcome.pagination)))
}
