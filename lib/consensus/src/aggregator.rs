//! Consensus aggregation over a batch of candidate records
//!
//! Fields are reconciled independently. Scalar fields cluster their candidate
//! values by pairwise agreement and take the medoid of the largest cluster;
//! list fields vote element by element; skip fields pass through from the
//! first candidate.

use crate::cluster::{self, SimilarityMatrix};
use crate::config::ConsensusConfig;
use crate::error::{AggregationError, Result};
use crate::vote::vote_lists;
use concord_core::Record;
use concord_similarity::{Decoded, FieldSpec, Schema, SimilarityScorer, TextMode, TypeTag};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How one field of the consensus record was decided
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub name: String,
    /// Size of the winning cluster, number of contributing candidates for
    /// lists, or the candidate count for skip fields
    pub support: usize,
    /// Candidate indices backing the consensus value, ascending
    pub candidates: Vec<usize>,
    /// No two candidates agreed; the first candidate's value was used
    pub low_confidence: bool,
}

/// Aggregation output: the reconciled record plus per-field confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub record: Record,
    pub fields: Vec<FieldReport>,
}

impl Consensus {
    /// True when no field fell back to the first candidate
    pub fn is_confident(&self) -> bool {
        self.fields.iter().all(|f| !f.low_confidence)
    }

    pub fn low_confidence_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.low_confidence)
            .map(|f| f.name.as_str())
    }

    pub fn report(&self, name: &str) -> Option<&FieldReport> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

/// Reconciles N candidate records into one.
#[derive(Debug, Clone)]
pub struct ConsensusAggregator {
    scorer: SimilarityScorer,
    config: ConsensusConfig,
}

impl ConsensusAggregator {
    pub fn new(scorer: SimilarityScorer) -> Self {
        Self::with_config(scorer, ConsensusConfig::default())
    }

    pub fn with_config(scorer: SimilarityScorer, config: ConsensusConfig) -> Self {
        Self { scorer, config }
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Aggregate `candidates` into one consensus record.
    ///
    /// `threshold` is the number of distinct candidates a list element needs
    /// to be kept. Output fields follow schema order.
    pub fn aggregate(&self, schema: &Schema, candidates: &[Record], threshold: usize) -> Result<Consensus> {
        if candidates.is_empty() {
            return Err(AggregationError::EmptyCandidateSet);
        }

        for field in schema.scored_fields() {
            if let Some(candidate) = candidates.iter().position(|c| !c.contains_key(&field.name)) {
                return Err(AggregationError::MissingField {
                    candidate,
                    field: field.name.clone(),
                });
            }
        }

        tracing::debug!(
            fields = schema.len(),
            candidates = candidates.len(),
            threshold,
            "Aggregating candidate set"
        );

        let resolved: Vec<(Value, FieldReport)> = if self.config.parallel {
            schema
                .fields()
                .par_iter()
                .map(|field| self.aggregate_field(field, candidates, threshold))
                .collect::<Result<_>>()?
        } else {
            schema
                .fields()
                .iter()
                .map(|field| self.aggregate_field(field, candidates, threshold))
                .collect::<Result<_>>()?
        };

        let mut record = Record::new();
        let mut fields = Vec::with_capacity(resolved.len());
        for (value, report) in resolved {
            if report.low_confidence {
                tracing::warn!(
                    field = %report.name,
                    candidates = candidates.len(),
                    "No agreement between candidates, using first candidate"
                );
            }
            record.insert(report.name.clone(), value);
            fields.push(report);
        }

        Ok(Consensus { record, fields })
    }

    fn aggregate_field(
        &self,
        field: &FieldSpec,
        candidates: &[Record],
        threshold: usize,
    ) -> Result<(Value, FieldReport)> {
        if field.skip {
            let value = candidates[0].get(&field.name).cloned().unwrap_or(Value::Null);
            let report = FieldReport {
                name: field.name.clone(),
                support: candidates.len(),
                candidates: (0..candidates.len()).collect(),
                low_confidence: false,
            };
            return Ok((value, report));
        }

        // Presence was checked up front
        let values: Vec<&Value> = candidates
            .iter()
            .map(|c| c.get(&field.name).unwrap_or(&Value::Null))
            .collect();
        for value in &values {
            self.scorer.check(field, value)?;
        }

        if field.tag.is_list() {
            self.vote_field(field, &values, threshold)
        } else {
            self.cluster_field(field, &values)
        }
    }

    fn cluster_field(&self, field: &FieldSpec, values: &[&Value]) -> Result<(Value, FieldReport)> {
        let matrix = SimilarityMatrix::build(values.len(), |i, j| {
            self.scorer.score(field, values[i], values[j])
        })?;

        let cutoff = self.config.cutoffs.for_tag(&field.tag, self.text_mode(field, values));
        let outcome = cluster::resolve(&matrix, cutoff).ok_or(AggregationError::EmptyCandidateSet)?;

        tracing::debug!(
            field = %field.name,
            cutoff,
            support = outcome.support,
            representative = outcome.representative,
            "Resolved scalar field"
        );

        let report = FieldReport {
            name: field.name.clone(),
            support: outcome.support,
            candidates: outcome.members,
            low_confidence: outcome.low_confidence,
        };
        Ok((values[outcome.representative].clone(), report))
    }

    fn vote_field(&self, field: &FieldSpec, values: &[&Value], threshold: usize) -> Result<(Value, FieldReport)> {
        if values.iter().all(|v| v.is_null()) {
            let report = FieldReport {
                name: field.name.clone(),
                support: values.len(),
                candidates: (0..values.len()).collect(),
                low_confidence: false,
            };
            return Ok((Value::Null, report));
        }

        let mut lists: Vec<Vec<&str>> = Vec::with_capacity(values.len());
        for value in values {
            if value.is_null() {
                lists.push(Vec::new());
                continue;
            }
            match self.scorer.decode(field, value)? {
                Decoded::List(items) => lists.push(items),
                _ => lists.push(Vec::new()),
            }
        }

        let classes = vote_lists(&lists, threshold, self.config.list_dedup_cutoff);

        let mut contributors: Vec<usize> = classes
            .iter()
            .flat_map(|c| c.candidates.iter().copied())
            .collect();
        contributors.sort_unstable();
        contributors.dedup();

        tracing::debug!(
            field = %field.name,
            threshold,
            kept = classes.len(),
            "Voted list field"
        );

        let value = Value::Array(classes.into_iter().map(|c| Value::String(c.label)).collect());
        let report = FieldReport {
            name: field.name.clone(),
            support: contributors.len(),
            candidates: contributors,
            low_confidence: false,
        };
        Ok((value, report))
    }

    /// Text mode deciding the cutoff: pinned modes win, `Auto` goes long when
    /// any candidate value is long.
    fn text_mode(&self, field: &FieldSpec, values: &[&Value]) -> TextMode {
        match field.tag {
            TypeTag::Text(TextMode::Auto) => {
                let any_long = values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .any(|s| self.scorer.is_long_text(s));
                if any_long {
                    TextMode::Long
                } else {
                    TextMode::Short
                }
            }
            TypeTag::Text(mode) => mode,
            _ => TextMode::Short,
        }
    }
}
