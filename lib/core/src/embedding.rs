//! Embedding provider capability.
//!
//! Long-text scoring only ever needs `embed(text) -> vector`. The provider is
//! injected into the scorer at construction; there is no process-wide default.

use std::sync::Arc;
use thiserror::Error;

/// Errors raised by an embedding provider.
///
/// These are propagated verbatim through scoring and aggregation and are
/// never retried inside Concord.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("embedding model unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("embedding inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A synchronous, local source of dense text embeddings.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one piece of text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Dimension of the vectors this provider produces.
    fn dim(&self) -> usize;
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<P> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }
}
