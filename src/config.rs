//! File-backed configuration
//!
//! One JSON document configures the whole engine. Every section and field is
//! optional; anything left out takes its default.
//!
//! ```json
//! {
//!   "embedding": { "dim": 256, "cache": true },
//!   "scorer": { "short_text_max_chars": 40, "date_scale_days": 30.0 },
//!   "consensus": { "cutoffs": { "numeric": 0.85 }, "list_dedup_cutoff": 0.8 }
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use concord_consensus::{ConsensusAggregator, ConsensusConfig};
use concord_core::{CachedEmbedder, EmbeddingProvider, HashEmbedder, DEFAULT_EMBEDDING_DIM};
use concord_similarity::{Schema, SchemaDefinition, ScorerConfig, SimilarityScorer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Local embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Dimension of the feature-hashing embedder
    pub dim: usize,
    /// Memoize embeddings by normalized text for the process lifetime
    pub cache: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dim: DEFAULT_EMBEDDING_DIM,
            cache: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConcordConfig {
    pub embedding: EmbeddingConfig,
    pub scorer: ScorerConfig,
    pub consensus: ConsensusConfig,
}

impl ConcordConfig {
    /// Load and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.dim == 0 {
            return Err(anyhow!("embedding.dim must be positive"));
        }
        self.scorer
            .validate()
            .map_err(|e| anyhow!("Invalid scorer config: {}", e))?;
        self.consensus
            .validate()
            .map_err(|e| anyhow!("Invalid consensus config: {}", e))?;
        Ok(())
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        let base = HashEmbedder::new(self.embedding.dim);
        if self.embedding.cache {
            Arc::new(CachedEmbedder::new(base))
        } else {
            Arc::new(base)
        }
    }

    pub fn scorer(&self) -> SimilarityScorer {
        SimilarityScorer::with_config(self.scorer.clone(), self.embedder())
    }

    pub fn aggregator(&self) -> ConsensusAggregator {
        ConsensusAggregator::with_config(self.scorer(), self.consensus.clone())
    }
}

/// Read a JSON schema definition and resolve it with the given skip list.
pub fn load_schema<P: AsRef<Path>, S: AsRef<str>>(path: P, skip: &[S]) -> Result<Schema> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {:?}", path))?;
    let definition: SchemaDefinition = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse schema file {:?}", path))?;
    Schema::resolve(&definition, skip).with_context(|| format!("Invalid schema in {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_config() {
        let file = write_temp(r#"{"scorer": {"date_scale_days": 7.0}, "consensus": {"parallel": false}}"#);
        let config = ConcordConfig::load(file.path()).unwrap();
        assert_eq!(config.scorer.date_scale_days, 7.0);
        assert_eq!(config.scorer.short_text_max_chars, 40);
        assert!(!config.consensus.parallel);
        assert_eq!(config.embedding, EmbeddingConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let file = write_temp(r#"{"consensus": {"cutoffs": {"literal": 2.0}}}"#);
        let err = ConcordConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("consensus"));

        let file = write_temp(r#"{"embedding": {"dim": 0}}"#);
        assert!(ConcordConfig::load(file.path()).is_err());

        let file = write_temp("not json");
        assert!(ConcordConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = ConcordConfig::load_or_default(None::<&Path>).unwrap();
        assert_eq!(config, ConcordConfig::default());
    }

    #[test]
    fn test_load_schema() {
        let file = write_temp(
            r#"{"fields": [
                {"name": "title", "type": "string"},
                {"name": "kind", "type": {"literal": ["a", "b"]}},
                {"name": "raw", "type": "object"}
            ]}"#,
        );
        let schema = load_schema(file.path(), &["raw"]).unwrap();
        assert_eq!(schema.len(), 3);
        assert!(schema.get("raw").unwrap().skip);

        // Unmappable type without a skip
        assert!(load_schema::<_, &str>(file.path(), &[]).is_err());
    }
}
