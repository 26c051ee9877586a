//! Vector store abstraction.
//!
//! Collections hold points of one fixed dimension and distance metric. Two
//! implementations exist: [`QdrantStore`](super::qdrant::QdrantStore) talks to
//! a remote Qdrant over REST, [`MemoryStore`](super::memory::MemoryStore) keeps
//! everything in process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::documents::Payload;
use crate::eid::PointId;
use crate::semantic::filter::MetadataFilter;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("collection {0:?} does not exist")]
    MissingCollection(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("malformed store response: {0}")]
    Malformed(String),

    #[error("store state poisoned: {0}")]
    Poisoned(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A point returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
    pub vector: Option<Vec<f32>>,
}

/// A point returned by a scroll.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPoint {
    pub id: String,
    pub payload: Payload,
    pub vector: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub limit: usize,
    /// Inclusive lower bound on the similarity score.
    pub score_threshold: Option<f32>,
    pub filter: Option<MetadataFilter>,
    pub with_vectors: bool,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection unless it already exists.
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError>;

    /// Insert or replace points by id. Either every point is written or the
    /// call fails.
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), StoreError>;

    /// Up to `limit` points ordered by descending score. Tie order is not
    /// guaranteed.
    async fn query(
        &self,
        collection: &str,
        request: QueryRequest,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// An arbitrary subset of up to `limit` points matching the filter.
    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<RetrievedPoint>, StoreError>;

    /// Remove points by id. Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[PointId]) -> Result<(), StoreError>;

    async fn count(&self, collection: &str) -> Result<u64, StoreError>;

    async fn ping(&self) -> bool;
}
