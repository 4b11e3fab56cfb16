//! # Concord Similarity
//!
//! Schema introspection and type-dispatched similarity scoring for
//! structured language-model outputs.
//!
//! ## Features
//!
//! - **Schema Introspection**: declarative field definitions resolve once into a closed set of type tags
//! - **Similarity Scoring**: per-tag agreement scores in [0, 1] (token Jaccard, embedding cosine, linear decay, exact match, greedy list matching)
//! - **Evaluation Metric**: mean per-field agreement against a gold record, usable as an optimizer objective
//!
//! ## Example
//!
//! ```rust
//! use concord_core::{HashEmbedder, Record};
//! use concord_similarity::{EvaluationMetric, FieldDefinition, Schema, SchemaDefinition, SimilarityScorer};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let definition = SchemaDefinition::new(vec![
//!     FieldDefinition::string("title"),
//!     FieldDefinition::literal("category", ["news", "blog"]),
//!     FieldDefinition::string_list("tags"),
//! ]);
//! let schema = Arc::new(Schema::resolve::<&str>(&definition, &[]).unwrap());
//! let scorer = SimilarityScorer::new(Arc::new(HashEmbedder::default()));
//!
//! let title = schema.get("title").unwrap();
//! assert_eq!(scorer.score(title, &json!("Red fox"), &json!("red fox")).unwrap(), 1.0);
//!
//! let metric = EvaluationMetric::new(schema, scorer);
//! let gold: Record = serde_json::from_value(json!({
//!     "title": "Red fox", "category": "news", "tags": ["fox", "wildlife"]
//! })).unwrap();
//! assert_eq!(metric.score(&gold, &gold).unwrap(), 1.0);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Definition  │────>│ Introspector │────>│    Schema    │
//! │ (declared)   │     │ (resolve)    │     │ (type tags)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                                                  │
//!       ┌──────────────┐     ┌──────────────┐      │
//!       │  Embedding   │────>│    Scorer    │<─────┘
//!       │  Provider    │     │ (dispatch)   │
//!       └──────────────┘     └──────────────┘
//!                                   │
//!                            ┌──────────────┐
//!                            │    Metric    │
//!                            └──────────────┘
//! ```

pub mod distance;
pub mod metric;
pub mod schema;
pub mod scorer;

// Re-export main types for convenience
pub use metric::{evaluate, EvaluationMetric, FieldScore};
pub use schema::{
    DeclaredType,
    FieldDefinition,
    FieldSpec,
    NumericKind,
    Schema,
    SchemaDefinition,
    SchemaError,
    SchemaIntrospector,
    TextMode,
    TypeTag,
};
pub use scorer::{
    parse_date,
    Decoded,
    ScoreError,
    ScorerConfig,
    SimilarityScorer,
    DEFAULT_DATE_SCALE_DAYS,
    DEFAULT_SHORT_TEXT_MAX_CHARS,
};
