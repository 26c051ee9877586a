use crate::documents::ValidationError;
use crate::semantic::embeddings::EmbeddingError;
use crate::semantic::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(#[from] EmbeddingError),

    #[error("vector store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl AppError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}
