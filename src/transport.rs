//! Network transport abstraction and the HTTP implementation.
//!
//! A search session talks to the server through [`SearchTransport`]:
//!
//! - **[`SearchTransport::open_stream`]**: issues the streaming request and
//!   returns the response body as a [`ChunkSource`] of raw bytes.
//! - **[`SearchTransport::fetch_results`]**: issues the non-streaming
//!   request and returns the decoded `complete` payload.
//!
//! [`HttpTransport`] implements both over `reqwest`. Tests and embedders can
//! substitute their own implementation.
//!
//! # Failure classes
//!
//! | Condition | Error |
//! |-----------|-------|
//! | Connection refused, reset, or dropped mid-body | [`TransportError::Network`] |
//! | Non-2xx status before the body starts | [`TransportError::Status`] |
//! | Non-streaming body is not the expected JSON | [`TransportError::Decode`] |
//!
//! Cancellation is not represented here: the session drops the in-flight
//! future, which aborts the request.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::models::{SearchRequest, SearchResults};

/// A failure of the underlying request, as opposed to a malformed event line.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// An asynchronous sequence of body chunks. `Ok(None)` marks the end.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// The two ways a session can reach the search server.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn open_stream(
        &self,
        request: &SearchRequest,
    ) -> Result<Box<dyn ChunkSource>, TransportError>;

    async fn fetch_results(&self, request: &SearchRequest)
        -> Result<SearchResults, TransportError>;
}

// ============ HTTP Transport ============

/// `reqwest`-backed transport posting the request as JSON.
pub struct HttpTransport {
    client: reqwest::Client,
    stream_url: String,
    semantic_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from the `[server]` and `[search]` config sections.
    pub fn new(config: &Config) -> Result<Self> {
        let base = config.server.base_url.trim_end_matches('/');
        if base.is_empty() {
            bail!("server.base_url must not be empty");
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.search.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            stream_url: format!("{}{}", base, config.search.stream_path),
            semantic_url: format!("{}{}", base, config.search.semantic_path),
            timeout: Duration::from_secs(config.search.timeout_secs),
        })
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn open_stream(
        &self,
        request: &SearchRequest,
    ) -> Result<Box<dyn ChunkSource>, TransportError> {
        tracing::debug!(url = %self.stream_url, source = %request.source, target = %request.target, "opening search stream");

        let response = self
            .client
            .post(&self.stream_url)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(Box::new(HttpChunks { response }))
    }

    async fn fetch_results(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResults, TransportError> {
        tracing::debug!(url = %self.semantic_url, source = %request.source, target = %request.target, "requesting non-streaming search");

        let response = self
            .client
            .post(&self.semantic_url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

struct HttpChunks {
    response: reqwest::Response,
}

#[async_trait]
impl ChunkSource for HttpChunks {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let chunk = self.response.chunk().await?;
        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}
