//! Client side of the query forwarder: the HTTP transport, option builders,
//! typed repositories over the catalog collections, and test grading.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use url::Url;

use crate::models::{
    envelope::{Envelope, Pagination},
    query::QueryRequest,
};

pub mod builders;
pub mod catalog;
pub mod grading;

pub use builders::{search_text, SortDirection};
pub use catalog::{AnswersApi, CategoriesApi, QuestionsApi, TestResultsApi};
pub use grading::{grade, TestOutcome, PASSING_SCORE};

pub const QUERY_PATH: &str = "/mongodb-query";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with {status}: {message}")]
    Status { status: u16, message: String },

    /// The server answered with `success: false`.
    #[error("{0}")]
    Api(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Delivers one query and returns the raw envelope.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn send(&self, request: &QueryRequest) -> Result<Envelope, ClientError>;
}

pub struct HttpTransport {
    http: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let endpoint = Url::parse(base_url)?.join(QUERY_PATH)?;
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn send(&self, request: &QueryRequest) -> Result<Envelope, ClientError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // failure envelopes carry the useful message
            let message = serde_json::from_str::<Envelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error)
                .unwrap_or(body);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// One page of a paginated `find`.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

#[derive(Clone)]
pub struct QueryClient {
    transport: Arc<dyn QueryTransport>,
}

impl QueryClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(base_url)?)))
    }

    pub fn with_transport(transport: Arc<dyn QueryTransport>) -> Self {
        Self { transport }
    }

    async fn envelope(&self, request: &QueryRequest) -> Result<Envelope, ClientError> {
        let envelope = self.transport.send(request).await?;
        if !envelope.success {
            let message = envelope
                .error
                .unwrap_or_else(|| "Query failed without an error message".to_string());
            tracing::warn!(
                "Query {}.{} failed: {}",
                request.collection,
                request.operation,
                message
            );
            return Err(ClientError::Api(message));
        }
        Ok(envelope)
    }

    /// Returns `data`, `Null` when the server sent none.
    pub async fn execute(&self, request: QueryRequest) -> Result<Value, ClientError> {
        let envelope = self.envelope(&request).await?;
        Ok(envelope.data.unwrap_or(Value::Null))
    }

    pub async fn fetch<T: DeserializeOwned>(&self, request: QueryRequest) -> Result<T, ClientError> {
        let data = self.execute(request).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn execute_page<T: DeserializeOwned>(
        &self,
        request: QueryRequest,
    ) -> Result<Page<T>, ClientError> {
        let envelope = self.envelope(&request).await?;
        let items = match envelope.data {
            Some(data) if !data.is_null() => serde_json::from_value(data)?,
            _ => Vec::new(),
        };
        Ok(Page {
            items,
            pagination: envelope.pagination,
        })
    }
}
