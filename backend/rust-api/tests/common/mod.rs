#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use drivetheory_api::{config::Config, create_router, services::AppState};
use mongodb::Database;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Nothing listens on port 1, so any request that reaches the store fails
/// fast with a server selection error.
pub const UNREACHABLE_MONGO_URI: &str = "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

async fn build_app(config: Config) -> (Router, Database) {
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to create MongoDB client");
    let app_state = Arc::new(AppState::new(config, mongo_client));
    let db = app_state.mongo.clone();
    (create_router(app_state), db)
}

/// Router whose store is unreachable. The driver connects lazily, so every
/// request rejected before dispatch behaves exactly as in production.
pub async fn validation_app() -> Router {
    validation_app_with(Config::new(UNREACHABLE_MONGO_URI)).await
}

pub async fn validation_app_with(config: Config) -> Router {
    init_tracing();
    build_app(config).await.0
}

/// Router over a fresh database on `TEST_MONGODB_URI`; `None` when the
/// variable is unset so the caller can skip.
pub async fn live_app() -> Option<(Router, Database)> {
    live_app_with(|_| {}).await
}

pub async fn live_app_with(configure: impl FnOnce(&mut Config)) -> Option<(Router, Database)> {
    init_tracing();
    dotenvy::from_filename(".env.test").ok();

    let Ok(uri) = std::env::var("TEST_MONGODB_URI") else {
        eprintln!("TEST_MONGODB_URI not set, skipping live MongoDB test");
        return None;
    };

    let mut config = Config::new(uri);
    config.mongo_database = Some(format!("drivetheory_test_{}", Uuid::new_v4().simple()));
    configure(&mut config);

    Some(build_app(config).await)
}

pub async fn post_query(app: &Router, body: Value) -> (StatusCode, Value) {
    post_raw(app, serde_json::to_string(&body).unwrap()).await
}

pub async fn post_raw(app: &Router, body: String) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mongodb-query")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Runs a query that must succeed and returns its `data`.
pub async fn expect_data(app: &Router, body: Value) -> Value {
    let (status, json) = post_query(app, body).await;
    assert_eq!(status, StatusCode::OK, "unexpected failure: {}", json);
    assert_eq!(json["success"], Value::Bool(true));
    json["data"].clone()
}
