//! Process-lifetime embedding cache
//!
//! Wraps any [`EmbeddingProvider`] and memoizes vectors by normalized text.
//! There is no eviction: callers that need a bound should `clear()` the cache
//! or drop the wrapper.

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::record::normalize_text;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

pub struct CachedEmbedder<P> {
    inner: P,
    entries: RwLock<AHashMap<String, Arc<[f32]>>>,
}

impl<P: EmbeddingProvider> CachedEmbedder<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            entries: RwLock::new(AHashMap::new()),
        }
    }

    /// Embed through the cache, returning a shared handle to the vector.
    ///
    /// The wrapped provider sees the normalized text, so every cache hit
    /// returns exactly what a miss would have computed.
    pub fn embed_shared(&self, text: &str) -> Result<Arc<[f32]>, EmbeddingError> {
        let key = normalize_text(text);

        if let Some(hit) = self.entries.read().get(&key) {
            return Ok(Arc::clone(hit));
        }

        // Computed outside the lock; a racing writer for the same key
        // produces an identical vector, so the first insert wins.
        let vector: Arc<[f32]> = self.inner.embed(&key)?.into();
        let mut entries = self.entries.write();
        let stored = entries.entry(key).or_insert(vector);
        Ok(Arc::clone(stored))
    }

    /// Number of cached vectors
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every cached vector
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// The wrapped provider
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbedder<P> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_shared(text).map(|v| v.to_vec())
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }
}
