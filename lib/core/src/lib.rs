//! # Concord Core
//!
//! Shared building blocks for the Concord consensus engine.
//!
//! - [`Record`] - a flat, order-preserving JSON mapping (candidate, reference or consensus)
//! - [`EmbeddingProvider`] - the `embed(text) -> vector` capability long-text scoring consumes
//! - [`HashEmbedder`] - a deterministic, local feature-hashing provider
//! - [`CachedEmbedder`] - a process-lifetime embedding cache keyed by normalized text
//! - [`vector`] - dense vector kernels (dot product, norm, cosine)
//!
//! ## Example
//!
//! ```rust
//! use concord_core::{CachedEmbedder, EmbeddingProvider, HashEmbedder, vector};
//!
//! let embedder = CachedEmbedder::new(HashEmbedder::new(64));
//! let a = embedder.embed("The council approved the budget").unwrap();
//! let b = embedder.embed("the council   approved the budget").unwrap();
//!
//! // Both texts normalize to the same cache key
//! assert_eq!(embedder.len(), 1);
//! assert!((vector::cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
//! ```

pub mod cache;
pub mod embedding;
pub mod hash_embedder;
pub mod record;
pub mod vector;

pub use cache::CachedEmbedder;
pub use embedding::{EmbeddingError, EmbeddingProvider};
pub use hash_embedder::{HashEmbedder, DEFAULT_EMBEDDING_DIM};
pub use record::{normalize_text, Record};
