//! Type-dispatched similarity scorer
//!
//! [`SimilarityScorer::score`] compares two values of one field and returns a
//! normalized agreement score in [0, 1]. Dispatch is on the field's resolved
//! [`TypeTag`]; the scorer never inspects raw declared types.

use crate::distance::{
    clip_cosine, date_similarity, greedy_match, jaccard_tokens, number_similarity,
};
use crate::schema::{FieldSpec, NumericKind, TextMode, TypeTag};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use concord_core::record::value_kind;
use concord_core::{vector, EmbeddingError, EmbeddingProvider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Default character cutoff between short and long text
pub const DEFAULT_SHORT_TEXT_MAX_CHARS: usize = 40;

/// Default distance, in days, at which date similarity reaches zero
pub const DEFAULT_DATE_SCALE_DAYS: f64 = 30.0;

/// Floor for the default numeric scale
pub const DEFAULT_NUMERIC_EPSILON: f64 = 1e-9;

/// Scorer tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScorerConfig {
    /// Text longer than this many characters is compared by embeddings
    pub short_text_max_chars: usize,

    /// Date distance at which similarity reaches zero, unless a field sets its own scale
    pub date_scale_days: f64,

    /// Lower bound of the default numeric scale `max(|a|, |b|, epsilon)`
    pub numeric_epsilon: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            short_text_max_chars: DEFAULT_SHORT_TEXT_MAX_CHARS,
            date_scale_days: DEFAULT_DATE_SCALE_DAYS,
            numeric_epsilon: DEFAULT_NUMERIC_EPSILON,
        }
    }
}

impl ScorerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.date_scale_days.is_finite() && self.date_scale_days > 0.0) {
            return Err(format!(
                "date_scale_days must be finite and positive, got {}",
                self.date_scale_days
            ));
        }
        if !(self.numeric_epsilon.is_finite() && self.numeric_epsilon > 0.0) {
            return Err(format!(
                "numeric_epsilon must be finite and positive, got {}",
                self.numeric_epsilon
            ));
        }
        Ok(())
    }
}

/// Scoring failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScoreError {
    #[error("Field '{field}' has no scoring strategy for type {tag}")]
    UnsupportedType { field: String, tag: String },

    #[error("Field '{0}' is marked skip and is never scored")]
    SkippedField(String),

    #[error("Field '{field}' has an invalid value: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl ScoreError {
    fn invalid(field: &FieldSpec, reason: impl Into<String>) -> Self {
        ScoreError::InvalidValue {
            field: field.name.clone(),
            reason: reason.into(),
        }
    }
}

/// A field value decoded against its tag
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<'a> {
    Text(&'a str),
    Number(f64),
    Date(NaiveDate),
    Literal(&'a Value),
    List(Vec<&'a str>),
}

/// Compares field values by their resolved type.
///
/// Holds the injected [`EmbeddingProvider`]; cloning shares it.
#[derive(Clone)]
pub struct SimilarityScorer {
    config: ScorerConfig,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl fmt::Debug for SimilarityScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimilarityScorer")
            .field("config", &self.config)
            .field("embedding_dim", &self.embedder.dim())
            .finish()
    }
}

impl SimilarityScorer {
    /// Create a scorer with default configuration
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_config(ScorerConfig::default(), embedder)
    }

    pub fn with_config(config: ScorerConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { config, embedder }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score two values of `field`.
    ///
    /// `null` is legal only for optional fields: both null scores 1.0 and
    /// exactly one null scores 0.0. Everything else is decoded against the
    /// field's tag and delegated to the matching strategy.
    pub fn score(&self, field: &FieldSpec, a: &Value, b: &Value) -> Result<f32, ScoreError> {
        if field.skip {
            return Err(ScoreError::SkippedField(field.name.clone()));
        }

        match (a.is_null(), b.is_null()) {
            (true, true) => {
                self.check_nullable(field)?;
                Ok(1.0)
            }
            (true, false) | (false, true) => {
                self.check_nullable(field)?;
                let present = if a.is_null() { b } else { a };
                self.decode(field, present)?;
                Ok(0.0)
            }
            (false, false) => {
                let da = self.decode(field, a)?;
                let db = self.decode(field, b)?;
                self.score_decoded(field, &da, &db)
            }
        }
    }

    /// Check that `value` is legal for `field` without comparing it to anything.
    pub fn check(&self, field: &FieldSpec, value: &Value) -> Result<(), ScoreError> {
        if field.skip {
            return Err(ScoreError::SkippedField(field.name.clone()));
        }
        if value.is_null() {
            return self.check_nullable(field);
        }
        self.decode(field, value).map(|_| ())
    }

    /// Decode a non-null value against the field's tag.
    pub fn decode<'a>(&self, field: &FieldSpec, value: &'a Value) -> Result<Decoded<'a>, ScoreError> {
        let mismatch = |expected: &str| {
            ScoreError::invalid(field, format!("expected {}, got {}", expected, value_kind(value)))
        };

        match &field.tag {
            TypeTag::Text(_) => value.as_str().map(Decoded::Text).ok_or_else(|| mismatch("string")),
            TypeTag::Numeric(kind) => {
                let number = value.as_f64().ok_or_else(|| mismatch("number"))?;
                if *kind == NumericKind::Integer && number.fract() != 0.0 {
                    return Err(ScoreError::invalid(
                        field,
                        format!("expected integer, got {}", number),
                    ));
                }
                Ok(Decoded::Number(number))
            }
            TypeTag::Date => {
                let raw = value.as_str().ok_or_else(|| mismatch("ISO-8601 date string"))?;
                parse_date(raw)
                    .map(Decoded::Date)
                    .ok_or_else(|| ScoreError::invalid(field, format!("unparseable date '{}'", raw)))
            }
            TypeTag::Literal(allowed) => {
                if allowed.iter().any(|v| literal_eq(v, value)) {
                    Ok(Decoded::Literal(value))
                } else {
                    Err(ScoreError::invalid(field, format!("{} is not an allowed literal", value)))
                }
            }
            TypeTag::ListOfString => {
                let items = value.as_array().ok_or_else(|| mismatch("array of strings"))?;
                items
                    .iter()
                    .map(|item| {
                        item.as_str().ok_or_else(|| {
                            ScoreError::invalid(
                                field,
                                format!("list element is {}, expected string", value_kind(item)),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Decoded::List)
            }
            TypeTag::Opaque => Err(ScoreError::UnsupportedType {
                field: field.name.clone(),
                tag: field.tag.to_string(),
            }),
        }
    }

    fn score_decoded(
        &self,
        field: &FieldSpec,
        a: &Decoded<'_>,
        b: &Decoded<'_>,
    ) -> Result<f32, ScoreError> {
        let score = match (&field.tag, a, b) {
            (TypeTag::Text(mode), Decoded::Text(x), Decoded::Text(y)) => {
                self.text_similarity(*mode, x, y)?
            }
            (TypeTag::Numeric(_), Decoded::Number(x), Decoded::Number(y)) => {
                number_similarity(*x, *y, field.scale, self.config.numeric_epsilon)
            }
            (TypeTag::Date, Decoded::Date(x), Decoded::Date(y)) => {
                date_similarity(*x, *y, field.scale.unwrap_or(self.config.date_scale_days))
            }
            (TypeTag::Literal(_), Decoded::Literal(x), Decoded::Literal(y)) => {
                if literal_eq(x, y) {
                    1.0
                } else {
                    0.0
                }
            }
            (TypeTag::ListOfString, Decoded::List(x), Decoded::List(y)) => {
                self.list_similarity(x, y)?
            }
            _ => {
                return Err(ScoreError::UnsupportedType {
                    field: field.name.clone(),
                    tag: field.tag.to_string(),
                })
            }
        };
        Ok(score)
    }

    /// Resolve `Auto` for one pair: long if either side exceeds the cutoff.
    pub fn effective_text_mode(&self, mode: TextMode, a: &str, b: &str) -> TextMode {
        match mode {
            TextMode::Auto if self.is_long_text(a) || self.is_long_text(b) => TextMode::Long,
            TextMode::Auto => TextMode::Short,
            fixed => fixed,
        }
    }

    pub fn is_long_text(&self, text: &str) -> bool {
        text.chars().count() > self.config.short_text_max_chars
    }

    /// Text similarity under `mode`. Identical strings always score 1.0.
    pub fn text_similarity(&self, mode: TextMode, a: &str, b: &str) -> Result<f32, ScoreError> {
        if a == b {
            return Ok(1.0);
        }
        match self.effective_text_mode(mode, a, b) {
            TextMode::Long => self.embedding_similarity(a, b),
            _ => Ok(jaccard_tokens(a, b)),
        }
    }

    /// Cosine between the two embeddings, clipped to [0, 1]
    pub fn embedding_similarity(&self, a: &str, b: &str) -> Result<f32, ScoreError> {
        let va = self.embedder.embed(a)?;
        let vb = self.embedder.embed(b)?;
        if va.len() != vb.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: va.len(),
                actual: vb.len(),
            }
            .into());
        }
        Ok(clip_cosine(vector::cosine_similarity(&va, &vb)))
    }

    /// Greedy best-match similarity between two string lists
    pub fn list_similarity(&self, a: &[&str], b: &[&str]) -> Result<f32, ScoreError> {
        greedy_match(a, b, |x, y| self.text_similarity(TextMode::Auto, x, y))
    }

    fn check_nullable(&self, field: &FieldSpec) -> Result<(), ScoreError> {
        if field.optional {
            Ok(())
        } else {
            Err(ScoreError::invalid(field, "null in a non-optional field"))
        }
    }
}

/// Literal equality; numbers compare by value so `1` matches `1.0`.
pub fn literal_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

/// Local ISO-8601 date-time layouts, without an offset
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse `YYYY-MM-DD`, an RFC 3339 date-time, or an offset-less ISO-8601
/// date-time. Only the date part is kept.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NAIVE_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}
