//! Aggregation configuration

use concord_similarity::{TextMode, TypeTag};
use serde::{Deserialize, Serialize};

/// Per-type similarity level at or above which two values count as "the same"
/// when forming clusters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgreementCutoffs {
    pub short_text: f32,
    pub long_text: f32,
    pub numeric: f32,
    pub date: f32,
    pub literal: f32,
}

impl Default for AgreementCutoffs {
    fn default() -> Self {
        Self {
            short_text: 0.6,
            long_text: 0.7,
            numeric: 0.9,
            date: 1.0,
            literal: 1.0,
        }
    }
}

impl AgreementCutoffs {
    /// Cutoff for a scalar tag. `mode` is the field's effective text mode.
    pub fn for_tag(&self, tag: &TypeTag, mode: TextMode) -> f32 {
        match tag {
            TypeTag::Text(_) if mode == TextMode::Long => self.long_text,
            TypeTag::Text(_) => self.short_text,
            TypeTag::Numeric(_) => self.numeric,
            TypeTag::Date => self.date,
            // Lists and opaque fields never cluster; exact agreement only
            TypeTag::Literal(_) | TypeTag::ListOfString | TypeTag::Opaque => self.literal,
        }
    }

    fn iter(&self) -> [(&'static str, f32); 5] {
        [
            ("short_text", self.short_text),
            ("long_text", self.long_text),
            ("numeric", self.numeric),
            ("date", self.date),
            ("literal", self.literal),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsensusConfig {
    pub cutoffs: AgreementCutoffs,

    /// Token-Jaccard level at which list elements merge into one class
    pub list_dedup_cutoff: f32,

    /// Process fields on the rayon pool
    pub parallel: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            cutoffs: AgreementCutoffs::default(),
            list_dedup_cutoff: 0.8,
            parallel: true,
        }
    }
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<(), String> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        for (name, value) in self.cutoffs.iter() {
            if !in_unit(value) {
                return Err(format!("cutoff '{}' must be within [0, 1], got {}", name, value));
            }
        }
        if !in_unit(self.list_dedup_cutoff) {
            return Err(format!(
                "list_dedup_cutoff must be within [0, 1], got {}",
                self.list_dedup_cutoff
            ));
        }
        Ok(())
    }
}
