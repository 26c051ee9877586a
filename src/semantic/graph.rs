//! Similarity graph over stored points.
//!
//! Every pair of points with comparable vectors is scored by cosine
//! similarity; pairs at or above the threshold become edges. The cost is
//! quadratic in the number of points, which is bounded by the graph query
//! limit.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::documents::{truncate_chars, Metadata, Payload, ValidationError};
use crate::semantic::store::{RetrievedPoint, ScoredPoint};

const PREVIEW_CHARS: usize = 200;
const UNTITLED: &str = "Untitled";
const UNCATEGORIZED: &str = "uncategorized";

fn default_graph_limit() -> usize {
    100
}

fn default_similarity_threshold() -> f64 {
    0.6
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQuery {
    /// Restrict the graph to the neighborhood of this text. Without it an
    /// arbitrary sample of the collection is used.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_graph_limit")]
    pub limit: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub filter_metadata: Option<Metadata>,
}

impl Default for GraphQuery {
    fn default() -> Self {
        GraphQuery {
            query: None,
            limit: default_graph_limit(),
            similarity_threshold: default_similarity_threshold(),
            filter_metadata: None,
        }
    }
}

impl GraphQuery {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(10..=300).contains(&self.limit) {
            return Err(ValidationError::field("limit", "must be between 10 and 300"));
        }
        if !(0.3..=0.95).contains(&self.similarity_threshold) {
            return Err(ValidationError::field(
                "similarity_threshold",
                "must be between 0.3 and 0.95",
            ));
        }
        Ok(())
    }

    /// The query text, unless it is blank.
    pub fn query_text(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }
}

/// Input to the builder: a stored point with its vector, if the store
/// returned one.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphPoint {
    pub id: String,
    pub vector: Option<Vec<f32>>,
    pub payload: Payload,
}

impl From<ScoredPoint> for GraphPoint {
    fn from(point: ScoredPoint) -> Self {
        GraphPoint {
            id: point.id,
            vector: point.vector,
            payload: point.payload,
        }
    }
}

impl From<RetrievedPoint> for GraphPoint {
    fn from(point: RetrievedPoint) -> Self {
        GraphPoint {
            id: point.id,
            vector: point.vector,
            payload: point.payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    pub text: String,
    pub url: String,
    pub tags: Vec<String>,
    pub category: String,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphResponse {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub node_count: usize,
    pub edge_count: usize,
}

fn payload_str<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

impl GraphNode {
    fn from_point(point: &GraphPoint) -> Self {
        let payload = &point.payload;

        let tags: Vec<String> = match payload.get("tags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => vec![],
        };

        let title = payload_str(payload, "title")
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED);

        GraphNode {
            id: point.id.clone(),
            title: title.to_string(),
            text: truncate_chars(payload_str(payload, "text").unwrap_or_default(), PREVIEW_CHARS),
            url: payload_str(payload, "url").unwrap_or_default().to_string(),
            category: tags
                .first()
                .cloned()
                .unwrap_or_else(|| UNCATEGORIZED.to_string()),
            tags,
            file_path: payload_str(payload, "file_path")
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Cosine similarity accumulated in f64. `None` when the vectors have
/// different lengths or either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Build nodes for every point and edges for every pair `(i, j)`, `i < j`,
/// whose similarity is at least `threshold`. Edges come out in `(i, j)` order.
pub fn build_graph(points: &[GraphPoint], threshold: f64) -> GraphResponse {
    let nodes: Vec<GraphNode> = points.iter().map(GraphNode::from_point).collect();

    let rows: Vec<Vec<GraphEdge>> = (0..points.len())
        .into_par_iter()
        .map(|i| {
            let Some(a) = points[i].vector.as_deref() else {
                return vec![];
            };

            points[i + 1..]
                .iter()
                .filter_map(|other| {
                    let b = other.vector.as_deref()?;
                    let similarity = cosine_similarity(a, b)?;
                    (similarity >= threshold).then(|| GraphEdge {
                        source: points[i].id.clone(),
                        target: other.id.clone(),
                        similarity,
                    })
                })
                .collect()
        })
        .collect();

    let edges: Vec<GraphEdge> = rows.into_iter().flatten().collect();
    log::debug!("graph: {} nodes, {} edges", nodes.len(), edges.len());

    GraphResponse {
        node_count: nodes.len(),
        edge_count: edges.len(),
        nodes,
        edges,
    }
}
