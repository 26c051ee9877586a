//! In-process stand-ins for the external collaborators.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::eid::PointId;
use crate::semantic::augment::{AugmentError, WebResult, WebSearchProvider};
use crate::semantic::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::semantic::filter::MetadataFilter;
use crate::semantic::store::{
    Distance, Point, QueryRequest, RetrievedPoint, ScoredPoint, StoreError, VectorStore,
};
use crate::semantic::{MemoryStore, SemanticService};

pub const DIM: usize = 3;
pub const COLLECTION: &str = "test_docs";

/// Maps texts to fixed vectors by keyword: the first keyword contained in the
/// text wins, anything else gets the fallback vector.
pub struct FakeEmbedder {
    rules: Vec<(&'static str, Vec<f32>)>,
    fallback: Vec<f32>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub healthy: AtomicBool,
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self {
            rules: vec![
                ("fungi", vec![1.0, 0.0, 0.0]),
                ("mycelium", vec![0.9, 0.1, 0.0]),
                ("ocean", vec![0.0, 1.0, 0.0]),
                ("stars", vec![0.0, 0.0, 1.0]),
            ],
            fallback: vec![0.5, 0.5, 0.5],
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
        }
    }
}

impl FakeEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| text.contains(keyword))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Status {
                status: 503,
                body: "model not loaded".into(),
            });
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    async fn ping(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> String {
        "fake://embedder".into()
    }
}

/// A memory store that counts calls and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub upserts: AtomicUsize,
    pub queries: AtomicUsize,
    pub fail: AtomicBool,
    pub down: AtomicBool,
}

impl CountingStore {
    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 500,
                body: "disk full".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        self.inner.ensure_collection(name, dimension, distance).await
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.upsert(collection, points).await
    }

    async fn query(
        &self,
        collection: &str,
        request: QueryRequest,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.query(collection, request).await
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<RetrievedPoint>, StoreError> {
        self.check()?;
        self.inner
            .scroll(collection, filter, limit, with_vectors)
            .await
    }

    async fn delete(&self, collection: &str, ids: &[PointId]) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(collection, ids).await
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.count(collection).await
    }

    async fn ping(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }
}

/// Returns every canned result regardless of how many were asked for, the
/// way a provider that over-fetches would.
#[derive(Default)]
pub struct FakeWebSearch {
    pub results: Vec<WebResult>,
    pub calls: AtomicUsize,
    pub requested: AtomicUsize,
    pub fail: bool,
}

impl FakeWebSearch {
    pub fn with_results(results: Vec<WebResult>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearchProvider for FakeWebSearch {
    async fn search_and_contents(
        &self,
        _query: &str,
        num_results: usize,
    ) -> Result<Vec<WebResult>, AugmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.store(num_results, Ordering::SeqCst);
        if self.fail {
            return Err(AugmentError::Status {
                status: 429,
                body: "rate limited".into(),
            });
        }
        Ok(self.results.clone())
    }
}

pub fn web_result(title: &str, text: &str) -> WebResult {
    WebResult {
        text: text.to_string(),
        url: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
        title: title.to_string(),
    }
}

pub struct Harness {
    pub service: Arc<SemanticService>,
    pub embedder: Arc<FakeEmbedder>,
    pub store: Arc<CountingStore>,
    pub web: Option<Arc<FakeWebSearch>>,
}

impl Harness {
    pub async fn new() -> Harness {
        Self::build(None).await
    }

    pub async fn with_web(web: FakeWebSearch) -> Harness {
        Self::build(Some(Arc::new(web))).await
    }

    async fn build(web: Option<Arc<FakeWebSearch>>) -> Harness {
        let embedder = Arc::new(FakeEmbedder::default());
        let store = Arc::new(CountingStore::default());

        let mut service = SemanticService::new(embedder.clone(), store.clone(), COLLECTION, DIM);
        if let Some(web) = &web {
            service = service.with_web_search(web.clone());
        }
        service.init().await.unwrap();

        Harness {
            service: Arc::new(service),
            embedder,
            store,
            web,
        }
    }
}
