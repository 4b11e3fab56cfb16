//! # Concord Consensus
//!
//! Best-of-N aggregation: reconcile N independently sampled structured
//! records for one input into a single consensus record.
//!
//! Scalar fields are clustered by pairwise agreement and resolved to the
//! medoid of the largest cluster. List fields are pooled, fuzzily
//! deduplicated and kept when enough distinct candidates mention them.
//! Fields where nothing agreed fall back to the first candidate and are
//! flagged in the returned [`FieldReport`]s.
//!
//! ## Example
//!
//! ```rust
//! use concord_consensus::ConsensusAggregator;
//! use concord_core::{HashEmbedder, Record};
//! use concord_similarity::{FieldDefinition, Schema, SchemaDefinition, SimilarityScorer};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let definition = SchemaDefinition::new(vec![
//!     FieldDefinition::literal("sentiment", ["positive", "negative"]),
//!     FieldDefinition::string_list("topics"),
//! ]);
//! let schema = Schema::resolve::<&str>(&definition, &[]).unwrap();
//! let aggregator = ConsensusAggregator::new(SimilarityScorer::new(Arc::new(HashEmbedder::default())));
//!
//! let candidates: Vec<Record> = vec![
//!     serde_json::from_value(json!({"sentiment": "positive", "topics": ["rust", "cli"]})).unwrap(),
//!     serde_json::from_value(json!({"sentiment": "positive", "topics": ["Rust"]})).unwrap(),
//!     serde_json::from_value(json!({"sentiment": "negative", "topics": ["cli"]})).unwrap(),
//! ];
//!
//! let consensus = aggregator.aggregate(&schema, &candidates, 2).unwrap();
//! assert_eq!(consensus.record["sentiment"], json!("positive"));
//! assert_eq!(consensus.record["topics"], json!(["rust", "cli"]));
//! assert!(consensus.is_confident());
//! ```

pub mod aggregator;
pub mod cluster;
pub mod config;
pub mod error;
pub mod vote;

pub use aggregator::{Consensus, ConsensusAggregator, FieldReport};
pub use cluster::{ClusterOutcome, Component, SimilarityMatrix};
pub use config::{AgreementCutoffs, ConsensusConfig};
pub use error::{AggregationError, Result};
pub use vote::{vote_lists, VotedClass};
