//! Semantic search with optional web augmentation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::documents::{truncate_chars, Document, Metadata, ValidationError};
use crate::eid::PointId;
use crate::errors::AppError;
use crate::semantic::augment::{WebSearchProvider, AUGMENTED_SCORE, AUGMENTED_TEXT_CHARS};
use crate::semantic::filter::MetadataFilter;
use crate::semantic::service::SemanticService;
use crate::semantic::store::{QueryRequest, ScoredPoint};

pub const MAX_SEARCH_LIMIT: usize = 100;

fn default_limit() -> usize {
    10
}

fn default_score_threshold() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default)]
    pub filter_metadata: Option<Metadata>,
    #[serde(default)]
    pub use_exa: bool,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        SearchQuery {
            query: query.into(),
            limit: default_limit(),
            score_threshold: default_score_threshold(),
            filter_metadata: None,
            use_exa: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.query.trim().is_empty() {
            return Err(ValidationError::field("query", "must not be empty"));
        }
        if !(1..=MAX_SEARCH_LIMIT).contains(&self.limit) {
            return Err(ValidationError::field(
                "limit",
                format!("must be between 1 and {MAX_SEARCH_LIMIT}"),
            ));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(ValidationError::field(
                "score_threshold",
                "must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub url: String,
    pub title: String,
    pub score: f32,
    /// Everything stored next to the vector except the document fields.
    pub metadata: Metadata,
}

impl From<ScoredPoint> for SearchResult {
    fn from(point: ScoredPoint) -> Self {
        let mut result = SearchResult {
            id: point.id,
            text: String::new(),
            url: String::new(),
            title: String::new(),
            score: point.score,
            metadata: Metadata::new(),
        };

        for (key, value) in point.payload {
            let slot = match key.as_str() {
                "text" => &mut result.text,
                "url" => &mut result.url,
                "title" => &mut result.title,
                _ => {
                    result.metadata.insert(key, value);
                    continue;
                }
            };
            if let Value::String(s) = value {
                *slot = s;
            }
        }

        result
    }
}

impl SemanticService {
    pub async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>, AppError> {
        query.validate()?;
        let filter = MetadataFilter::from_metadata(query.filter_metadata.as_ref())?;

        let vector = self.embed_query(&query.query).await?;
        let hits = self
            .store
            .query(
                &self.collection,
                QueryRequest {
                    vector,
                    limit: query.limit,
                    score_threshold: Some(query.score_threshold),
                    filter,
                    with_vectors: false,
                },
            )
            .await?;

        let mut results: Vec<SearchResult> = hits.into_iter().map(SearchResult::from).collect();
        log::debug!("{} native results for {:?}", results.len(), query.query);

        if query.use_exa && results.len() < query.limit {
            match &self.web_search {
                Some(provider) => {
                    let wanted = query.limit - results.len();
                    let augmented = self.augment(provider.as_ref(), &query, wanted).await;
                    results.extend(augmented);
                }
                None => log::debug!("augmentation requested but no web search is configured"),
            }
        }

        results.truncate(query.limit);
        Ok(results)
    }

    /// Fetch extra results from the web and index them so later searches
    /// find them natively. Never fails: problems are logged.
    async fn augment(
        &self,
        provider: &dyn WebSearchProvider,
        query: &SearchQuery,
        wanted: usize,
    ) -> Vec<SearchResult> {
        if AUGMENTED_SCORE < query.score_threshold {
            log::debug!(
                "skipping augmentation: threshold {} above placeholder score",
                query.score_threshold
            );
            return vec![];
        }

        let items = match provider.search_and_contents(&query.query, wanted).await {
            Ok(items) => items,
            Err(err) => {
                log::warn!("web search augmentation failed: {err}");
                return vec![];
            }
        };

        let usable = items
            .into_iter()
            .filter(|item| !item.text.trim().is_empty())
            .take(wanted);

        let mut results = Vec::with_capacity(wanted);
        for item in usable {
            let text = truncate_chars(&item.text, AUGMENTED_TEXT_CHARS);
            let document = Document::new(text)
                .with_url(item.url)
                .with_title(item.title)
                .with_meta("source", "exa");

            let id = match self.index_one(document.clone()).await {
                Ok(indexed) => indexed.id,
                Err(err) => {
                    log::warn!("failed to persist augmented result: {err}");
                    PointId::new().into()
                }
            };

            results.push(SearchResult {
                id,
                text: document.text,
                url: document.url.unwrap_or_default(),
                title: document.title.unwrap_or_default(),
                score: AUGMENTED_SCORE,
                metadata: document.metadata,
            });
        }

        log::info!("added {} augmented results", results.len());
        results
    }
}
