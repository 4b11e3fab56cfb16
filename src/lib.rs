//! # Concord
//!
//! Best-of-N consensus for structured language-model outputs.
//!
//! Sample a model N times for the same input, hand the N structured records
//! to Concord, and get one reconciled record back, along with a per-field
//! report of how strongly the samples agreed. The same type-aware similarity
//! scorer doubles as an evaluation metric against a gold record.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! concord aggregate --schema schema.json --input samples.jsonl --output consensus/ --threshold 2
//! concord score --schema schema.json --prediction pred.json --reference gold.json
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use concord::prelude::*;
//! use serde_json::json;
//!
//! let definition = SchemaDefinition::new(vec![
//!     FieldDefinition::string("headline"),
//!     FieldDefinition::integer("casualties").with_scale(10.0),
//!     FieldDefinition::string_list("locations"),
//! ]);
//! let schema = Schema::resolve::<&str>(&definition, &[]).unwrap();
//! let aggregator = ConcordConfig::default().aggregator();
//!
//! let candidates: Vec<Record> = serde_json::from_value(json!([
//!     {"headline": "Flood hits river town", "casualties": 3, "locations": ["Riverton"]},
//!     {"headline": "Flood hits the river town", "casualties": 3, "locations": ["Riverton", "Hill County"]},
//!     {"headline": "Markets rally", "casualties": 40, "locations": ["riverton"]}
//! ])).unwrap();
//!
//! let consensus = aggregator.aggregate(&schema, &candidates, 2).unwrap();
//! assert_eq!(consensus.record["casualties"], json!(3));
//! assert_eq!(consensus.record["locations"], json!(["Riverton"]));
//! ```
//!
//! ## Crate Structure
//!
//! - [`concord-core`](concord_core) - records, embedding providers, embedding cache, vector kernels
//! - [`concord-similarity`](concord_similarity) - schema introspection, similarity scorer, evaluation metric
//! - [`concord-consensus`](concord_consensus) - clustering, list voting, the consensus aggregator

pub mod config;
pub mod pipeline;

// Re-export core types
pub use concord_core::{
    CachedEmbedder, EmbeddingError, EmbeddingProvider, HashEmbedder, Record,
};

// Re-export scoring
pub use concord_similarity::{
    evaluate, DeclaredType, EvaluationMetric, FieldDefinition, FieldSpec, Schema,
    SchemaDefinition, SchemaError, ScoreError, ScorerConfig, SimilarityScorer, TypeTag,
};

// Re-export aggregation
pub use concord_consensus::{
    AggregationError, AgreementCutoffs, Consensus, ConsensusAggregator, ConsensusConfig,
    FieldReport,
};

pub use config::ConcordConfig;
pub use pipeline::{BatchAggregator, BatchSummary};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BatchAggregator, ConcordConfig, Consensus, ConsensusAggregator, ConsensusConfig,
        DeclaredType, EmbeddingProvider, EvaluationMetric, FieldDefinition, FieldReport,
        HashEmbedder, Record, Schema, SchemaDefinition, SimilarityScorer,
    };
}
