//! Client for the remote embedding provider.
//!
//! The provider exposes `POST /embed` taking `{"text": [..]}` and answering
//! `{"embeddings": [[..]], "dimensions": n, "model": ".."}`. Calls are never
//! retried: a failed call aborts the operation that issued it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("expected {expected} embeddings, provider returned {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Whether the provider answers its health probe.
    async fn ping(&self) -> bool;

    /// Human readable location of the provider, for health reports.
    fn endpoint(&self) -> String;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default)]
    pub model: Option<String>,
}

pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(
        base_url: &str,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, dimensions))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, dimensions: usize) -> Self {
        Self {
            client,
            base_url: base_url.strip_suffix('/').unwrap_or(base_url).to_string(),
            dimensions,
        }
    }
}

/// Check that the provider answered one vector of the expected size per text.
pub fn check_embeddings(
    expected_count: usize,
    dimensions: usize,
    embeddings: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if embeddings.len() != expected_count {
        return Err(EmbeddingError::CountMismatch {
            expected: expected_count,
            got: embeddings.len(),
        });
    }

    if let Some(bad) = embeddings.iter().find(|v| v.len() != dimensions) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimensions,
            got: bad.len(),
        });
    }

    Ok(embeddings)
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/embed", self.base_url);
        log::debug!("embedding {} texts via {url}", texts.len());

        let resp = self
            .client
            .post(&url)
            .json(&EmbedRequest { text: texts })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: EmbedResponse = resp.json().await?;
        log::trace!(
            "embedded with model {:?} ({:?} dimensions)",
            body.model,
            body.dimensions
        );

        check_embeddings(texts.len(), self.dimensions, body.embeddings)
    }

    async fn ping(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                log::warn!("embedding provider health check failed: {err}");
                false
            }
        }
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}
