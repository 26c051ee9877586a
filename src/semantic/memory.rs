//! In-process vector store.
//!
//! Keeps collections in memory behind a `RwLock`. Query scores are computed
//! by brute force, which is fine for tests and small corpora.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::eid::PointId;
use crate::semantic::filter::MetadataFilter;
use crate::semantic::graph::cosine_similarity;
use crate::semantic::store::{
    Distance, Point, QueryRequest, RetrievedPoint, ScoredPoint, StoreError, VectorStore,
};

/// An entry in a collection.
#[derive(Debug, Clone)]
struct StoredPoint {
    /// Upsert sequence number, used for recency ordering
    seq: u64,
    point: Point,
}

struct Collection {
    dimension: usize,
    distance: Distance,
    entries: HashMap<String, StoredPoint>,
}

impl Collection {
    /// Entries ordered by insertion, oldest first.
    fn ordered(&self) -> Vec<&StoredPoint> {
        let mut entries: Vec<&StoredPoint> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }

    fn check_dimension(&self, got: usize) -> Result<(), StoreError> {
        if got != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got,
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Collection>,
    next_seq: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Score two vectors; higher is more similar. Zero-norm vectors have no
/// cosine similarity and score `None`.
fn score(distance: Distance, query: &[f32], target: &[f32]) -> Option<f32> {
    match distance {
        // accumulated in f64 so a vector scores exactly 1.0 against itself
        Distance::Cosine => {
            cosine_similarity(query, target).map(|sim| sim.clamp(-1.0, 1.0) as f32)
        }
        Distance::Dot => Some(dot(query, target)),
        Distance::Euclid => {
            let dist = query
                .iter()
                .zip(target.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt();
            Some(-dist)
        }
    }
}

fn passes(filter: Option<&MetadataFilter>, point: &Point) -> bool {
    filter.map(|f| f.matches(&point.payload)).unwrap_or(true)
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.collections.contains_key(name) {
            log::info!("creating in-memory collection {name} ({dimension} dims, {distance:?})");
            state.collections.insert(
                name.to_string(),
                Collection {
                    dimension,
                    distance,
                    entries: HashMap::new(),
                },
            );
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let mut seq = state.next_seq;

        let coll = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;

        // validate the whole batch before touching anything
        for point in &points {
            coll.check_dimension(point.vector.len())?;
        }

        for point in points {
            seq += 1;
            coll.entries
                .insert(point.id.to_string(), StoredPoint { seq, point });
        }

        state.next_seq = seq;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        request: QueryRequest,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let state = self.read()?;
        let coll = state
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;
        coll.check_dimension(request.vector.len())?;

        let mut scored: Vec<(u64, ScoredPoint)> = coll
            .entries
            .values()
            .filter(|e| passes(request.filter.as_ref(), &e.point))
            .filter_map(|e| {
                let score = score(coll.distance, &request.vector, &e.point.vector)?;
                if request.score_threshold.is_some_and(|t| score < t) {
                    return None;
                }
                Some((
                    e.seq,
                    ScoredPoint {
                        id: e.point.id.to_string(),
                        score,
                        payload: e.point.payload.clone(),
                        vector: request.with_vectors.then(|| e.point.vector.clone()),
                    },
                ))
            })
            .collect();

        // Sort by score descending, most recent first on ties
        scored.sort_by(|(seq_a, a), (seq_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(seq_b.cmp(seq_a))
        });
        scored.truncate(request.limit);

        Ok(scored.into_iter().map(|(_, p)| p).collect())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<RetrievedPoint>, StoreError> {
        let state = self.read()?;
        let coll = state
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;

        Ok(coll
            .ordered()
            .into_iter()
            .filter(|e| passes(filter, &e.point))
            .take(limit)
            .map(|e| RetrievedPoint {
                id: e.point.id.to_string(),
                payload: e.point.payload.clone(),
                vector: with_vectors.then(|| e.point.vector.clone()),
            })
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[PointId]) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let coll = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;

        for id in ids {
            coll.entries.remove(id.as_str());
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let state = self.read()?;
        state
            .collections
            .get(collection)
            .map(|c| c.entries.len() as u64)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))
    }

    async fn ping(&self) -> bool {
        self.state.read().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Payload;
    use serde_json::json;

    const COLL: &str = "test";

    fn point(vector: Vec<f32>, category: &str) -> Point {
        let mut payload = Payload::new();
        payload.insert("category".into(), json!(category));
        Point {
            id: PointId::new(),
            vector,
            payload,
        }
    }

    fn request(vector: Vec<f32>, limit: usize, threshold: Option<f32>) -> QueryRequest {
        QueryRequest {
            vector,
            limit,
            score_threshold: threshold,
            filter: None,
            with_vectors: false,
        }
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .ensure_collection(COLL, 3, Distance::Cosine)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_ensure_collection_is_idempotent() {
        let store = store().await;
        store.upsert(COLL, vec![point(vec![1.0, 0.0, 0.0], "a")]).await.unwrap();
        store
            .ensure_collection(COLL, 3, Distance::Cosine)
            .await
            .unwrap();
        assert_eq!(store.count(COLL).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_dimension_mismatch_writes_nothing() {
        let store = store().await;
        let result = store
            .upsert(
                COLL,
                vec![point(vec![1.0, 0.0, 0.0], "a"), point(vec![1.0, 0.0], "b")],
            )
            .await;

        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
        assert_eq!(store.count(COLL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = store().await;
        let mut p = point(vec![1.0, 0.0, 0.0], "a");
        store.upsert(COLL, vec![p.clone()]).await.unwrap();
        p.vector = vec![0.0, 1.0, 0.0];
        store.upsert(COLL, vec![p]).await.unwrap();

        assert_eq!(store.count(COLL).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_orders_by_score() {
        let store = store().await;
        store
            .upsert(
                COLL,
                vec![
                    point(vec![0.0, 1.0, 0.0], "far"),
                    point(vec![1.0, 0.1, 0.0], "near"),
                ],
            )
            .await
            .unwrap();

        let results = store.query(COLL, request(vec![1.0, 0.0, 0.0], 10, None)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].payload["category"], json!("near"));
        assert!(results[0].score > results[1].score);
        assert!(results[0].vector.is_none());
    }

    #[tokio::test]
    async fn test_query_threshold_is_inclusive() {
        let store = store().await;
        store
            .upsert(
                COLL,
                vec![point(vec![1.0, 0.0, 0.0], "same"), point(vec![0.0, 1.0, 0.0], "orth")],
            )
            .await
            .unwrap();

        let results = store
            .query(COLL, request(vec![1.0, 0.0, 0.0], 10, Some(1.0)))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-6);

        let results = store
            .query(COLL, request(vec![1.0, 0.0, 0.0], 10, Some(0.0)))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_query_limit_and_filter() {
        let store = store().await;
        let points = (0..10)
            .map(|i| point(vec![1.0, i as f32 * 0.1, 0.0], if i % 2 == 0 { "even" } else { "odd" }))
            .collect();
        store.upsert(COLL, points).await.unwrap();

        let mut req = request(vec![1.0, 0.0, 0.0], 3, None);
        req.filter = Some(MetadataFilter::default().and("category", json!("odd")).unwrap());
        let results = store.query(COLL, req).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.payload["category"] == json!("odd")));
    }

    #[tokio::test]
    async fn test_query_ties_prefer_recent() {
        let store = store().await;
        store.upsert(COLL, vec![point(vec![1.0, 0.0, 0.0], "old")]).await.unwrap();
        store.upsert(COLL, vec![point(vec![2.0, 0.0, 0.0], "new")]).await.unwrap();

        let results = store.query(COLL, request(vec![1.0, 0.0, 0.0], 10, None)).await.unwrap();
        assert_eq!(results[0].payload["category"], json!("new"));
    }

    #[tokio::test]
    async fn test_scroll_in_insertion_order_with_vectors() {
        let store = store().await;
        for name in ["a", "b", "c"] {
            store.upsert(COLL, vec![point(vec![1.0, 1.0, 0.0], name)]).await.unwrap();
        }

        let points = store.scroll(COLL, None, 2, true).await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].payload["category"], json!("a"));
        assert_eq!(points[1].vector, Some(vec![1.0, 1.0, 0.0]));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = store().await;
        let p = point(vec![1.0, 0.0, 0.0], "a");
        let id = p.id.clone();
        store.upsert(COLL, vec![p]).await.unwrap();

        store.delete(COLL, &[id.clone()]).await.unwrap();
        store.delete(COLL, &[id]).await.unwrap();
        assert_eq!(store.count(COLL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.count("nope").await,
            Err(StoreError::MissingCollection(_))
        ));
    }

    #[test]
    fn test_score_zero_norm_is_none() {
        assert_eq!(score(Distance::Cosine, &[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(score(Distance::Dot, &[2.0, 0.0], &[3.0, 1.0]), Some(6.0));
        assert_eq!(score(Distance::Euclid, &[0.0, 0.0], &[3.0, 4.0]), Some(-5.0));
    }

    #[tokio::test]
    async fn test_self_match_passes_threshold_one() {
        let store = store().await;
        let vectors: Vec<Vec<f32>> = (1..40)
            .map(|i| {
                let i = i as f32;
                vec![0.1 * i, 0.37 + 0.013 * i, 1.0 / i]
            })
            .collect();

        for vector in &vectors {
            store.upsert(COLL, vec![point(vector.clone(), "a")]).await.unwrap();
        }

        for vector in vectors {
            let hits = store.query(COLL, request(vector, 1, Some(1.0))).await.unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].score, 1.0);
        }
    }
}
