//! Feature-hashing embedder
//!
//! A deterministic, dependency-free [`EmbeddingProvider`]. Character trigrams
//! and whole words are hashed into a fixed number of buckets and the result is
//! L2-normalized, so cosine similarity tracks lexical overlap. It stands in for
//! a learned model wherever one is not available (CLI runs, tests, benches).

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::vector;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIM: usize = 256;

/// Word features weigh more than trigram features
const WORD_WEIGHT: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    /// Create an embedder producing `dim`-dimensional vectors.
    /// A zero dimension is bumped to 1.
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket<T: Hash + ?Sized>(&self, feature: &T) -> usize {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        (hasher.finish() % self.dim as u64) as usize
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = vec![0.0f32; self.dim];
        let normalized = text.to_lowercase();

        for trigram in trigrams(&normalized) {
            out[self.bucket(trigram.as_str())] += 1.0;
        }
        for word in normalized.split_whitespace() {
            out[self.bucket(word)] += WORD_WEIGHT;
        }

        vector::normalize(&mut out);
        Ok(out)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Character trigrams over the text padded with two spaces on each side.
fn trigrams(s: &str) -> HashSet<String> {
    if s.trim().is_empty() {
        return HashSet::new();
    }
    let padded = format!("  {}  ", s);
    let chars: Vec<char> = padded.chars().collect();
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{cosine_similarity, norm};

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("hello world").unwrap();
        let b = embedder.embed("hello world").unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert!((norm(&a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_overlap_tracks_similarity() {
        let embedder = HashEmbedder::default();
        let base = embedder.embed("senate passes the annual budget bill").unwrap();
        let close = embedder.embed("senate passes annual budget bill").unwrap();
        let far = embedder.embed("quarterback injured in overtime loss").unwrap();

        assert!(cosine_similarity(&base, &close) > cosine_similarity(&base, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("   ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_trigram_generation() {
        let grams = trigrams("cat");
        assert!(grams.contains("cat"));
        assert!(grams.contains("  c"));
        assert!(grams.contains("at "));
    }

    #[test]
    fn test_zero_dimension_clamped() {
        assert_eq!(HashEmbedder::new(0).dim(), 1);
    }
}
