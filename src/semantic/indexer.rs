//! Indexing: normalize, embed, upsert.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::documents::{Document, ValidationError};
use crate::eid::PointId;
use crate::errors::AppError;
use crate::semantic::service::SemanticService;
use crate::semantic::store::Point;

pub const STATUS_INDEXED: &str = "indexed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexResponse {
    pub id: String,
    pub status: String,
    pub indexed_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchIndexResponse {
    pub indexed_count: usize,
    pub ids: Vec<String>,
}

/// RFC 3339 UTC timestamp with microseconds.
pub fn indexed_at_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SemanticService {
    pub async fn index_one(&self, document: Document) -> Result<IndexResponse, AppError> {
        let document = document.normalize()?;

        let mut vectors = self.embed_checked(std::slice::from_ref(&document.text)).await?;
        let vector = vectors.remove(0);

        let id = PointId::new();
        let indexed_at = indexed_at_now();
        let point = Point {
            id: id.clone(),
            vector,
            payload: document.into_payload(&indexed_at),
        };

        self.store.upsert(&self.collection, vec![point]).await?;
        log::info!("indexed document {id}");

        Ok(IndexResponse {
            id: id.into(),
            status: STATUS_INDEXED.to_string(),
            indexed_at,
        })
    }

    /// All documents are validated before anything is sent anywhere; the
    /// first invalid one rejects the whole batch.
    pub async fn index_batch(
        &self,
        documents: Vec<Document>,
    ) -> Result<BatchIndexResponse, AppError> {
        if documents.is_empty() {
            return Ok(BatchIndexResponse::default());
        }

        let documents = documents
            .into_iter()
            .enumerate()
            .map(|(index, doc)| doc.normalize().map_err(|e| ValidationError::in_batch(index, e)))
            .collect::<Result<Vec<_>, _>>()?;

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embed_checked(&texts).await?;

        let indexed_at = indexed_at_now();
        let points: Vec<Point> = documents
            .into_iter()
            .zip(vectors)
            .map(|(document, vector)| Point {
                id: PointId::new(),
                vector,
                payload: document.into_payload(&indexed_at),
            })
            .collect();
        let ids: Vec<String> = points.iter().map(|p| p.id.to_string()).collect();

        self.store.upsert(&self.collection, points).await?;
        log::info!("indexed batch of {} documents", ids.len());

        Ok(BatchIndexResponse {
            indexed_count: ids.len(),
            ids,
        })
    }
}
