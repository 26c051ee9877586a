//! Qdrant REST adapter.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::eid::PointId;
use crate::semantic::filter::MetadataFilter;
use crate::semantic::store::{
    Distance, Point, QueryRequest, RetrievedPoint, ScoredPoint, StoreError, VectorStore,
};

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
}

/// Every Qdrant response wraps its data in `result`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    id: Value,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
    #[serde(default)]
    vector: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<RawPoint>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

impl RawPoint {
    fn id_string(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Only a single unnamed dense vector is understood; anything else is
    /// treated as absent.
    fn dense_vector(&self) -> Option<Vec<f32>> {
        self.vector
            .clone()
            .and_then(|v| serde_json::from_value::<Vec<f32>>(v).ok())
    }

    fn into_scored(self) -> ScoredPoint {
        ScoredPoint {
            id: self.id_string(),
            score: self.score.unwrap_or_default(),
            vector: self.dense_vector(),
            payload: self.payload.unwrap_or_default(),
        }
    }

    fn into_retrieved(self) -> RetrievedPoint {
        RetrievedPoint {
            id: self.id_string(),
            vector: self.dense_vector(),
            payload: self.payload.unwrap_or_default(),
        }
    }
}

fn distance_name(distance: Distance) -> &'static str {
    match distance {
        Distance::Cosine => "Cosine",
        Distance::Dot => "Dot",
        Distance::Euclid => "Euclid",
    }
}

pub fn collection_body(dimension: usize, distance: Distance) -> Value {
    json!({ "vectors": { "size": dimension, "distance": distance_name(distance) } })
}

pub fn upsert_body(points: &[Point]) -> Value {
    let points: Vec<Value> = points
        .iter()
        .map(|p| json!({ "id": p.id.as_str(), "vector": p.vector, "payload": p.payload }))
        .collect();
    json!({ "points": points })
}

pub fn search_body(request: &QueryRequest) -> Value {
    let mut body = json!({
        "vector": request.vector,
        "limit": request.limit,
        "with_payload": true,
        "with_vector": request.with_vectors,
    });
    if let Some(threshold) = request.score_threshold {
        body["score_threshold"] = json!(threshold);
    }
    if let Some(filter) = &request.filter {
        body["filter"] = filter.to_store_filter();
    }
    body
}

pub fn scroll_body(filter: Option<&MetadataFilter>, limit: usize, with_vectors: bool) -> Value {
    let mut body = json!({
        "limit": limit,
        "with_payload": true,
        "with_vector": with_vectors,
    });
    if let Some(filter) = filter {
        body["filter"] = filter.to_store_filter();
    }
    body
}

impl QdrantStore {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, &format!("http://{host}:{port}")))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.strip_suffix('/').unwrap_or(base_url).to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T>(&self, req: reqwest::RequestBuilder) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        serde_json::from_str::<Envelope<T>>(&text)
            .map(|envelope| envelope.result)
            .map_err(|err| {
                log::error!("{err}. tried to parse: {text:?}");
                StoreError::Malformed(err.to_string())
            })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        let resp = self
            .client
            .get(self.url(&format!("/collections/{name}")))
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => {
                log::info!("collection {name} already exists");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                log::info!("creating collection {name} ({dimension} dims)");
                let req = self
                    .client
                    .put(self.url(&format!("/collections/{name}")))
                    .json(&collection_body(dimension, distance));
                self.send::<Value>(req).await.map(|_| ())
            }
            status => Err(StoreError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), StoreError> {
        let req = self
            .client
            .put(self.url(&format!("/collections/{collection}/points?wait=true")))
            .json(&upsert_body(&points));
        self.send::<Value>(req).await.map(|_| ())
    }

    async fn query(
        &self,
        collection: &str,
        request: QueryRequest,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let req = self
            .client
            .post(self.url(&format!("/collections/{collection}/points/search")))
            .json(&search_body(&request));
        let points: Vec<RawPoint> = self.send(req).await?;
        Ok(points.into_iter().map(RawPoint::into_scored).collect())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<RetrievedPoint>, StoreError> {
        let req = self
            .client
            .post(self.url(&format!("/collections/{collection}/points/scroll")))
            .json(&scroll_body(filter, limit, with_vectors));
        let result: ScrollResult = self.send(req).await?;
        Ok(result
            .points
            .into_iter()
            .map(RawPoint::into_retrieved)
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[PointId]) -> Result<(), StoreError> {
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        let req = self
            .client
            .post(self.url(&format!("/collections/{collection}/points/delete?wait=true")))
            .json(&json!({ "points": ids }));
        self.send::<Value>(req).await.map(|_| ())
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let req = self
            .client
            .post(self.url(&format!("/collections/{collection}/points/count")))
            .json(&json!({ "exact": true }));
        let result: CountResult = self.send(req).await?;
        Ok(result.count)
    }

    async fn ping(&self) -> bool {
        match self.client.get(self.url("/collections")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                log::warn!("vector store health check failed: {err}");
                false
            }
        }
    }
}
