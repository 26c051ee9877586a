//! Semantic service facade.
//!
//! Owns the handles to the embedding provider, the vector store and the
//! optional web search, plus the collection they operate on. Indexing and
//! search live in their own modules as further `impl` blocks.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::eid::PointId;
use crate::errors::AppError;
use crate::semantic::augment::WebSearchProvider;
use crate::semantic::embeddings::{check_embeddings, EmbeddingError, EmbeddingProvider};
use crate::semantic::filter::MetadataFilter;
use crate::semantic::graph::{build_graph, GraphPoint, GraphQuery, GraphResponse};
use crate::semantic::store::{Distance, QueryRequest, VectorStore};

pub const STATUS_DELETED: &str = "deleted";
pub const STATUS_HEALTHY: &str = "healthy";
pub const STATUS_DEGRADED: &str = "degraded";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_documents: u64,
    pub collection_name: String,
    pub embedding_dimension: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub store_connected: bool,
    pub embedding_service: String,
    pub embedding_connected: bool,
    pub augmentation_enabled: bool,
}

pub struct SemanticService {
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) store: Arc<dyn VectorStore>,
    pub(crate) web_search: Option<Arc<dyn WebSearchProvider>>,
    pub(crate) collection: String,
    pub(crate) dimension: usize,
}

impl SemanticService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: &str,
        dimension: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            web_search: None,
            collection: collection.to_string(),
            dimension,
        }
    }

    pub fn with_web_search(mut self, provider: Arc<dyn WebSearchProvider>) -> Self {
        self.web_search = Some(provider);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Make sure the collection exists. Called once before serving.
    pub async fn init(&self) -> Result<(), AppError> {
        self.store
            .ensure_collection(&self.collection, self.dimension, Distance::Cosine)
            .await?;
        log::info!(
            "collection {:?} ready ({} dimensions)",
            self.collection,
            self.dimension
        );
        Ok(())
    }

    /// Embed and check every vector against the collection dimension.
    pub(crate) async fn embed_checked(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let vectors = self.embedder.embed(texts).await?;
        check_embeddings(texts.len(), self.dimension, vectors)
    }

    pub(crate) async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_checked(&[text.to_string()]).await?;
        Ok(vectors.remove(0))
    }

    pub async fn stats(&self) -> Result<Stats, AppError> {
        let total_documents = self.store.count(&self.collection).await?;
        Ok(Stats {
            total_documents,
            collection_name: self.collection.clone(),
            embedding_dimension: self.dimension,
        })
    }

    /// Deleting an id that is not stored succeeds.
    pub async fn delete(&self, id: &str) -> Result<DeleteResponse, AppError> {
        let id: PointId = id.parse()?;
        self.store
            .delete(&self.collection, std::slice::from_ref(&id))
            .await?;
        log::info!("deleted document {id}");

        Ok(DeleteResponse {
            status: STATUS_DELETED.to_string(),
            id: id.into(),
        })
    }

    pub async fn health(&self) -> HealthReport {
        let (store_connected, embedding_connected) =
            tokio::join!(self.store.ping(), self.embedder.ping());

        let status = if store_connected && embedding_connected {
            STATUS_HEALTHY
        } else {
            STATUS_DEGRADED
        };

        HealthReport {
            status: status.to_string(),
            store_connected,
            embedding_service: self.embedder.endpoint(),
            embedding_connected,
            augmentation_enabled: self.web_search.is_some(),
        }
    }

    pub async fn graph(&self, query: GraphQuery) -> Result<GraphResponse, AppError> {
        query.validate()?;
        let filter = MetadataFilter::from_metadata(query.filter_metadata.as_ref())?;

        let points: Vec<GraphPoint> = match query.query_text() {
            Some(text) => {
                let vector = self.embed_query(text).await?;
                self.store
                    .query(
                        &self.collection,
                        QueryRequest {
                            vector,
                            limit: query.limit,
                            score_threshold: None,
                            filter,
                            with_vectors: true,
                        },
                    )
                    .await?
                    .into_iter()
                    .map(GraphPoint::from)
                    .collect()
            }
            None => self
                .store
                .scroll(&self.collection, filter.as_ref(), query.limit, true)
                .await?
                .into_iter()
                .map(GraphPoint::from)
                .collect(),
        };

        Ok(build_graph(&points, query.similarity_threshold))
    }
}
