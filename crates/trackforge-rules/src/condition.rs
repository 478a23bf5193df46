//! Typed condition tree produced by the expression parser.
//!
//! Every condition answers a yes/no question about one file: its tracks,
//! container tags, plugin metadata, or pre-computed audio analysis. Trees are
//! immutable once built and safe to share across threads.

use serde::{Deserialize, Serialize};
use std::fmt;
use trackforge_common::TrackType;

use crate::pattern::TitlePattern;

/// Default secondary-language share for `multi_language()`.
pub const DEFAULT_MULTI_LANGUAGE_THRESHOLD: f64 = 0.05;

/// Default minimum confidence for `is_original()` / `is_dubbed()`.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// Operator for numeric track comparisons and `count()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    pub fn compare(&self, actual: i64, expected: i64) -> bool {
        match self {
            Self::Eq => actual == expected,
            Self::Lt => actual < expected,
            Self::Lte => actual <= expected,
            Self::Gt => actual > expected,
            Self::Gte => actual >= expected,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `operator value` applied to an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub operator: ComparisonOp,
    pub value: i64,
}

impl Comparison {
    pub fn new(operator: ComparisonOp, value: i64) -> Self {
        Self { operator, value }
    }

    pub fn matches(&self, actual: i64) -> bool {
        self.operator.compare(actual, self.value)
    }
}

/// Numeric track filter: an exact value or a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericFilter {
    Exact(i64),
    Compare(Comparison),
}

impl NumericFilter {
    /// A track without the property never matches.
    pub fn matches(&self, actual: Option<u32>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let actual = i64::from(actual);
        match self {
            Self::Exact(expected) => actual == *expected,
            Self::Compare(comparison) => comparison.matches(actual),
        }
    }
}

/// A single expected string or a set of alternatives (`in [...]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringMatch {
    One(String),
    AnyOf(Vec<String>),
}

impl StringMatch {
    pub fn values(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::AnyOf(values) => values,
        }
    }
}

/// How a track title is matched.
#[derive(Debug, Clone, PartialEq)]
pub enum TitleMatch {
    /// Case-insensitive substring.
    Contains(String),
    /// Case-insensitive regex search.
    Regex(TitlePattern),
}

impl TitleMatch {
    pub fn matches(&self, title: Option<&str>) -> bool {
        let Some(title) = title else {
            return false;
        };
        match self {
            Self::Contains(needle) => title.to_lowercase().contains(&needle.to_lowercase()),
            Self::Regex(pattern) => pattern.is_match(title),
        }
    }
}

/// Per-track predicates. Unset fields match every track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackFilters {
    pub language: Option<StringMatch>,
    pub codec: Option<StringMatch>,
    pub is_default: Option<bool>,
    pub is_forced: Option<bool>,
    pub channels: Option<NumericFilter>,
    pub width: Option<NumericFilter>,
    pub height: Option<NumericFilter>,
    pub title: Option<TitleMatch>,
    pub not_commentary: Option<bool>,
}

impl TrackFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Operator for plugin and container metadata comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Exists,
}

impl MetadataOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Exists => "exists",
        }
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }
}

/// Literal on the right-hand side of a metadata comparison.
///
/// Size literals are stored as integer bytes, durations as float seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Debug-style rendering used in traces: strings in single quotes,
    /// booleans capitalized.
    pub fn repr(&self) -> String {
        match self {
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::String(s) => format!("'{}'", s),
        }
    }
}

/// Render a float so it always reads back as a float (`1.0`, not `1`).
pub(crate) fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// `exists(track_type, filters...)`
#[derive(Debug, Clone, PartialEq)]
pub struct ExistsCondition {
    pub track_type: TrackType,
    pub filters: TrackFilters,
}

/// `count(track_type, filters...) op value`
#[derive(Debug, Clone, PartialEq)]
pub struct CountCondition {
    pub track_type: TrackType,
    pub filters: TrackFilters,
    pub operator: ComparisonOp,
    pub value: i64,
}

/// `multi_language(...)`: an audio track mixes languages.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiLanguageCondition {
    /// Restrict the check to the audio track with this container index.
    pub track_index: Option<u32>,
    /// Require this primary language.
    pub primary_language: Option<String>,
    /// Minimum share of any secondary language.
    pub threshold: f64,
}

impl Default for MultiLanguageCondition {
    fn default() -> Self {
        Self {
            track_index: None,
            primary_language: None,
            threshold: DEFAULT_MULTI_LANGUAGE_THRESHOLD,
        }
    }
}

/// `plugin(name, field) [op value]`
#[derive(Debug, Clone, PartialEq)]
pub struct PluginMetadataCondition {
    pub plugin: String,
    pub field: String,
    pub operator: MetadataOp,
    /// Absent for [`MetadataOp::Exists`].
    pub value: Option<MetadataValue>,
}

/// `container_meta(field) [op value]`
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerMetadataCondition {
    pub field: String,
    pub operator: MetadataOp,
    pub value: Option<MetadataValue>,
}

/// Arguments shared by `is_original()` and `is_dubbed()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationCondition {
    pub language: Option<String>,
    pub min_confidence: f64,
    /// Expected answer; `false` asks for a track that is *not* of the status.
    pub value: bool,
}

impl Default for ClassificationCondition {
    fn default() -> Self {
        Self {
            language: None,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            value: true,
        }
    }
}

/// A boolean question about a media file.
///
/// `Serialize`/`Deserialize` go through the canonical expression text, see
/// [`crate::serialize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Exists(ExistsCondition),
    Count(CountCondition),
    AudioMultiLanguage(MultiLanguageCondition),
    PluginMetadata(PluginMetadataCondition),
    ContainerMetadata(ContainerMetadataCondition),
    IsOriginal(ClassificationCondition),
    IsDubbed(ClassificationCondition),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Conjunction; a single child is returned unchanged.
    pub fn and(mut conditions: Vec<Condition>) -> Self {
        if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Self::And(conditions)
        }
    }

    /// Disjunction; a single child is returned unchanged.
    pub fn or(mut conditions: Vec<Condition>) -> Self {
        if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Self::Or(conditions)
        }
    }

    pub fn not(inner: Condition) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn exists(track_type: TrackType, filters: TrackFilters) -> Self {
        Self::Exists(ExistsCondition {
            track_type,
            filters,
        })
    }

    pub fn count(
        track_type: TrackType,
        filters: TrackFilters,
        operator: ComparisonOp,
        value: i64,
    ) -> Self {
        Self::Count(CountCondition {
            track_type,
            filters,
            operator,
            value,
        })
    }

    /// Nesting depth of boolean operators; leaves are depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                1 + children.iter().map(Condition::depth).max().unwrap_or(0)
            }
            Self::Not(inner) => 1 + inner.depth(),
            _ => 1,
        }
    }
}
