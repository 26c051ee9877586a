//! Optional web-search augmentation.
//!
//! When native results fall short, the search orchestrator can ask an
//! external web-search provider for more. Failures here never fail a search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder score given to augmented results. The provider does not
/// report a similarity comparable to the store's.
pub const AUGMENTED_SCORE: f32 = 0.9;

/// Augmented text is cut to this many characters before it is indexed.
pub const AUGMENTED_TEXT_CHARS: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum AugmentError {
    #[error("web search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("web search returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub text: String,
    pub url: String,
    pub title: String,
}

#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search_and_contents(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<WebResult>, AugmentError>;
}

pub struct ExaSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaRequest<'a> {
    query: &'a str,
    num_results: usize,
    contents: ExaContents,
}

#[derive(Debug, Serialize)]
struct ExaContents {
    text: bool,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaHit>,
}

#[derive(Debug, Deserialize)]
struct ExaHit {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl From<ExaHit> for WebResult {
    fn from(hit: ExaHit) -> Self {
        WebResult {
            text: hit.text.unwrap_or_default(),
            url: hit.url,
            title: hit.title.unwrap_or_default(),
        }
    }
}

impl ExaSearch {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AugmentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.strip_suffix('/').unwrap_or(base_url).to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl WebSearchProvider for ExaSearch {
    async fn search_and_contents(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<WebResult>, AugmentError> {
        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&ExaRequest {
                query,
                num_results,
                contents: ExaContents { text: true },
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AugmentError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let body: ExaResponse = resp.json().await?;
        log::debug!("web search returned {} results", body.results.len());
        Ok(body.results.into_iter().map(Into::into).collect())
    }
}
