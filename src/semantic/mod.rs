//! Semantic indexing and search over a remote vector store.
//!
//! # Architecture
//!
//! - `embeddings`: client for the remote embedding provider
//! - `store`: vector store trait, with `qdrant` (REST) and `memory` backends
//! - `filter`: equality-AND metadata filters
//! - `indexer`: normalize, embed and upsert documents
//! - `search`: filtered nearest-neighbor search with optional augmentation
//! - `augment`: external web search used by augmentation
//! - `graph`: pairwise similarity graph over stored points
//! - `service`: facade owning the collaborators

pub mod augment;
pub mod embeddings;
pub mod filter;
pub mod graph;
mod indexer;
pub mod memory;
pub mod qdrant;
mod search;
mod service;
pub mod store;

pub use augment::ExaSearch;
pub use embeddings::{EmbeddingProvider, RemoteEmbedder};
pub use graph::{GraphQuery, GraphResponse};
pub use indexer::{BatchIndexResponse, IndexResponse};
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;
pub use search::{SearchQuery, SearchResult};
pub use service::{DeleteResponse, HealthReport, SemanticService, Stats};
pub use store::VectorStore;
