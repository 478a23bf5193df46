//! Pre-computed audio analysis results consumed by conditions.
//!
//! Language detection and original/dubbed classification run outside
//! trackforge; their results arrive keyed by track id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Whether a track carries one spoken language or several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageClassification {
    SingleLanguage,
    MultiLanguage,
}

/// Share of a track's speech in one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageShare {
    pub language: String,
    /// Fraction in `[0, 1]`.
    pub percentage: f64,
}

/// Language analysis of one audio track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageAnalysis {
    pub primary_language: String,
    pub primary_percentage: f64,
    #[serde(default)]
    pub secondary_languages: Vec<LanguageShare>,
    pub classification: LanguageClassification,
}

impl LanguageAnalysis {
    pub fn is_multi_language(&self) -> bool {
        self.classification == LanguageClassification::MultiLanguage
    }

    /// Whether any secondary language reaches `threshold`.
    pub fn has_secondary_above(&self, threshold: f64) -> bool {
        self.secondary_languages
            .iter()
            .any(|s| s.percentage >= threshold)
    }
}

/// Original versus dubbed audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginalDubbedStatus {
    Original,
    Dubbed,
    Unknown,
}

impl OriginalDubbedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Dubbed => "dubbed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OriginalDubbedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Original/dubbed classification of one audio track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackClassification {
    pub status: OriginalDubbedStatus,
    pub confidence: f64,
    #[serde(default)]
    pub language: Option<String>,
}

/// Language analysis keyed by track id.
pub type LanguageResults = HashMap<i64, LanguageAnalysis>;

/// Classifications keyed by track id.
pub type ClassificationResults = HashMap<i64, TrackClassification>;
