//! Evaluation metric for structured predictions
//!
//! Scores one prediction against one gold reference as the mean per-field
//! similarity over the schema's non-skip fields. Pure and deterministic, so an
//! external optimizer can call it as an objective as often as it likes.

use crate::schema::Schema;
use crate::scorer::{ScoreError, SimilarityScorer};
use concord_core::Record;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// Similarity of one field between prediction and reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldScore {
    pub name: String,
    pub score: f32,
}

/// Mean per-field agreement between a prediction and a reference record.
#[derive(Debug, Clone)]
pub struct EvaluationMetric {
    schema: Arc<Schema>,
    scorer: SimilarityScorer,
}

impl EvaluationMetric {
    pub fn new(schema: Arc<Schema>, scorer: SimilarityScorer) -> Self {
        Self { schema, scorer }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Score `prediction` against `reference`.
    ///
    /// A field absent from either record is read as `null`. A schema with no
    /// scored fields yields 0.0. Malformed values are errors, never zeros.
    pub fn score(&self, prediction: &Record, reference: &Record) -> Result<f32, ScoreError> {
        evaluate(&self.schema, &self.scorer, prediction, reference)
    }

    /// Per-field breakdown in schema order
    pub fn score_fields(
        &self,
        prediction: &Record,
        reference: &Record,
    ) -> Result<Vec<FieldScore>, ScoreError> {
        self.schema
            .scored_fields()
            .map(|field| {
                let pred = prediction.get(&field.name).unwrap_or(&NULL);
                let gold = reference.get(&field.name).unwrap_or(&NULL);
                Ok(FieldScore {
                    name: field.name.clone(),
                    score: self.scorer.score(field, pred, gold)?,
                })
            })
            .collect()
    }
}

/// Mean of per-field similarity over the non-skip fields of `schema`.
pub fn evaluate(
    schema: &Schema,
    scorer: &SimilarityScorer,
    prediction: &Record,
    reference: &Record,
) -> Result<f32, ScoreError> {
    let mut total = 0.0f64;
    let mut count = 0usize;

    for field in schema.scored_fields() {
        let pred = prediction.get(&field.name).unwrap_or(&NULL);
        let gold = reference.get(&field.name).unwrap_or(&NULL);
        total += scorer.score(field, pred, gold)? as f64;
        count += 1;
    }

    if count == 0 {
        return Ok(0.0);
    }
    Ok((total / count as f64) as f32)
}
