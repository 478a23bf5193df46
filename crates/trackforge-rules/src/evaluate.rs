//! Explainable evaluation of conditions against one file.
//!
//! [`evaluate`] returns the boolean outcome together with a one-line trace of
//! why, e.g. `count(subtitle) >= 3 → False (count=2)`. Trace wording is stable
//! and is shown verbatim in dry-run output.

use std::sync::LazyLock;
use trackforge_common::{
    format_percentage, languages_match, ContainerTags, FileSnapshot, PluginMetadata, Track,
    TrackType,
};

use crate::analysis::{ClassificationResults, LanguageResults, OriginalDubbedStatus};
use crate::condition::{
    ClassificationCondition, Condition, ContainerMetadataCondition, CountCondition,
    ExistsCondition, MetadataOp, MetadataValue, MultiLanguageCondition,
    PluginMetadataCondition, StringMatch, TrackFilters,
};
use crate::pattern::CommentaryPatterns;

static DEFAULT_COMMENTARY: LazyLock<CommentaryPatterns> = LazyLock::new(CommentaryPatterns::default);

/// Everything a condition may inspect.
///
/// Optional sources that are absent make the conditions that need them
/// evaluate to false with an explanatory trace.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub tracks: &'a [Track],
    pub language_results: Option<&'a LanguageResults>,
    pub classification_results: Option<&'a ClassificationResults>,
    pub plugin_metadata: Option<&'a PluginMetadata>,
    pub container_tags: Option<&'a ContainerTags>,
    /// Falls back to the default commentary patterns when unset.
    pub commentary: Option<&'a CommentaryPatterns>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(tracks: &'a [Track]) -> Self {
        Self {
            tracks,
            language_results: None,
            classification_results: None,
            plugin_metadata: None,
            container_tags: None,
            commentary: None,
        }
    }

    /// Context over a snapshot's tracks, container tags, and plugin metadata.
    pub fn from_snapshot(snapshot: &'a FileSnapshot) -> Self {
        Self {
            plugin_metadata: snapshot.plugin_metadata.as_ref(),
            container_tags: snapshot.container_tags.as_ref(),
            ..Self::new(&snapshot.tracks)
        }
    }

    pub fn with_language_results(mut self, results: &'a LanguageResults) -> Self {
        self.language_results = Some(results);
        self
    }

    pub fn with_classification_results(mut self, results: &'a ClassificationResults) -> Self {
        self.classification_results = Some(results);
        self
    }

    pub fn with_plugin_metadata(mut self, metadata: &'a PluginMetadata) -> Self {
        self.plugin_metadata = Some(metadata);
        self
    }

    pub fn with_container_tags(mut self, tags: &'a ContainerTags) -> Self {
        self.container_tags = Some(tags);
        self
    }

    pub fn with_commentary(mut self, patterns: &'a CommentaryPatterns) -> Self {
        self.commentary = Some(patterns);
        self
    }

    fn commentary_patterns(&self) -> &CommentaryPatterns {
        self.commentary.unwrap_or(&DEFAULT_COMMENTARY)
    }
}

fn tf(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn string_matches(actual: Option<&str>, expected: &StringMatch, language: bool) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    expected.values().iter().any(|value| {
        if language {
            languages_match(Some(actual), Some(value))
        } else {
            actual.to_lowercase() == value.to_lowercase()
        }
    })
}

/// Whether one track satisfies every set filter.
pub fn matches_track(track: &Track, filters: &TrackFilters, commentary: &CommentaryPatterns) -> bool {
    if let Some(language) = &filters.language {
        if !string_matches(track.language.as_deref(), language, true) {
            return false;
        }
    }
    if let Some(codec) = &filters.codec {
        if !string_matches(track.codec.as_deref(), codec, false) {
            return false;
        }
    }
    if filters.is_default.is_some_and(|d| d != track.is_default) {
        return false;
    }
    if filters.is_forced.is_some_and(|f| f != track.is_forced) {
        return false;
    }
    if filters.channels.is_some_and(|f| !f.matches(track.channels)) {
        return false;
    }
    if filters.width.is_some_and(|f| !f.matches(track.width)) {
        return false;
    }
    if filters.height.is_some_and(|f| !f.matches(track.height)) {
        return false;
    }
    if let Some(title) = &filters.title {
        if !title.matches(track.title.as_deref()) {
            return false;
        }
    }
    if filters.not_commentary == Some(true) && commentary.is_commentary(track.title.as_deref()) {
        return false;
    }
    true
}

fn matching_tracks<'t>(
    tracks: &'t [Track],
    track_type: TrackType,
    filters: &'t TrackFilters,
    commentary: &'t CommentaryPatterns,
) -> impl Iterator<Item = &'t Track> {
    tracks
        .iter()
        .filter(move |t| t.track_type == track_type && matches_track(t, filters, commentary))
}

fn evaluate_exists(condition: &ExistsCondition, ctx: &EvaluationContext<'_>) -> (bool, String) {
    let track_type = condition.track_type;
    let first = matching_tracks(
        ctx.tracks,
        track_type,
        &condition.filters,
        ctx.commentary_patterns(),
    )
    .next();

    match first {
        Some(track) => {
            let mut detail = format!("track[{}]", track.index);
            if let Some(codec) = track.codec.as_deref().filter(|c| !c.is_empty()) {
                detail.push(' ');
                detail.push_str(codec);
            }
            if let Some(language) = track.language.as_deref().filter(|l| !l.is_empty()) {
                detail.push(' ');
                detail.push_str(language);
            }
            (true, format!("exists({}) → True ({})", track_type, detail))
        }
        None => (
            false,
            format!("exists({}) → False (no matching tracks)", track_type),
        ),
    }
}

fn evaluate_count(condition: &CountCondition, ctx: &EvaluationContext<'_>) -> (bool, String) {
    let count = matching_tracks(
        ctx.tracks,
        condition.track_type,
        &condition.filters,
        ctx.commentary_patterns(),
    )
    .count() as i64;
    let result = condition.operator.compare(count, condition.value);
    (
        result,
        format!(
            "count({}) {} {} → {} (count={})",
            condition.track_type,
            condition.operator,
            condition.value,
            tf(result),
            count
        ),
    )
}

fn evaluate_multi_language(
    condition: &MultiLanguageCondition,
    ctx: &EvaluationContext<'_>,
) -> (bool, String) {
    const LABEL: &str = "audio_is_multi_language";

    let Some(results) = ctx.language_results else {
        return (
            false,
            format!("{} → False (no language analysis available)", LABEL),
        );
    };

    let audio: Vec<&Track> = ctx
        .tracks
        .iter()
        .filter(|t| t.track_type == TrackType::Audio)
        .filter(|t| condition.track_index.map_or(true, |i| t.index == i))
        .collect();

    if let Some(index) = condition.track_index {
        if audio.is_empty() {
            return (false, format!("{} → False (track {} not found)", LABEL, index));
        }
    }

    for track in audio {
        let Some(analysis) = track.id.and_then(|id| results.get(&id)) else {
            continue;
        };
        if !analysis.is_multi_language() {
            continue;
        }
        if let Some(primary) = &condition.primary_language {
            if !languages_match(Some(&analysis.primary_language), Some(primary)) {
                continue;
            }
        }
        if analysis.has_secondary_above(condition.threshold) {
            return (
                true,
                format!(
                    "{} → True (track[{}] {} {}, secondary above {})",
                    LABEL,
                    track.index,
                    analysis.primary_language,
                    format_percentage(analysis.primary_percentage),
                    format_percentage(condition.threshold)
                ),
            );
        }
    }

    let reason = match condition.track_index {
        Some(index) => format!("{} → False (track {} not multi-language)", LABEL, index),
        None => format!("{} → False (no multi-language audio tracks)", LABEL),
    };
    (false, reason)
}

fn evaluate_classification(
    label: &str,
    target: OriginalDubbedStatus,
    condition: &ClassificationCondition,
    ctx: &EvaluationContext<'_>,
) -> (bool, String) {
    let Some(results) = ctx.classification_results else {
        return (
            false,
            format!("{} → False (no classification results available)", label),
        );
    };

    for track in ctx.tracks.iter().filter(|t| t.track_type == TrackType::Audio) {
        let Some(classification) = track.id.and_then(|id| results.get(&id)) else {
            continue;
        };
        if classification.confidence < condition.min_confidence {
            continue;
        }
        if let Some(language) = &condition.language {
            let Some(detected) = classification.language.as_deref() else {
                continue;
            };
            if !languages_match(Some(detected), Some(language)) {
                continue;
            }
        }
        if condition.value == (classification.status == target) {
            return (
                true,
                format!(
                    "{} → True (track[{}] is {}, confidence={})",
                    label,
                    track.index,
                    classification.status,
                    format_percentage(classification.confidence)
                ),
            );
        }
    }

    let expected = if condition.value {
        target.to_string()
    } else {
        format!("not {}", target)
    };
    (false, format!("{} → False (no {} tracks found)", label, expected))
}

/// Convert a JSON metadata value into a comparable literal. Null has no
/// counterpart.
fn json_to_metadata(value: &serde_json::Value) -> Option<MetadataValue> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(MetadataValue::Bool(*b)),
        serde_json::Value::Number(n) => Some(match n.as_i64() {
            Some(i) => MetadataValue::Integer(i),
            None => MetadataValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        }),
        serde_json::Value::String(s) => Some(MetadataValue::String(s.clone())),
        other => Some(MetadataValue::String(other.to_string())),
    }
}

fn values_equal(actual: &MetadataValue, expected: &MetadataValue) -> bool {
    match (actual, expected) {
        (MetadataValue::String(a), MetadataValue::String(b)) => a.to_lowercase() == b.to_lowercase(),
        (MetadataValue::Bool(a), MetadataValue::Bool(b)) => a == b,
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn compare_metadata(actual: &MetadataValue, expected: &MetadataValue, op: MetadataOp) -> bool {
    match op {
        MetadataOp::Exists => true,
        MetadataOp::Eq => values_equal(actual, expected),
        MetadataOp::Neq => !values_equal(actual, expected),
        MetadataOp::Lt | MetadataOp::Lte | MetadataOp::Gt | MetadataOp::Gte => {
            let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) else {
                return false;
            };
            match op {
                MetadataOp::Lt => a < b,
                MetadataOp::Lte => a <= b,
                MetadataOp::Gt => a > b,
                _ => a >= b,
            }
        }
    }
}

/// Shared tail of plugin and container metadata checks once the field was found.
fn evaluate_metadata_value(
    label: &str,
    actual: Option<MetadataValue>,
    operator: MetadataOp,
    expected: Option<&MetadataValue>,
    coerce_text: bool,
) -> (bool, String) {
    if operator == MetadataOp::Exists {
        return (true, format!("{} exists → True", label));
    }
    let Some(actual) = actual else {
        return (false, format!("{} → False (field value is null)", label));
    };
    let Some(expected) = expected else {
        return (false, format!("{} {} → False (no value to compare)", label, operator.symbol()));
    };

    // Container tags are always text; numeric comparisons parse them first.
    let compared = match (&actual, coerce_text) {
        (MetadataValue::String(text), true)
            if operator.is_ordering() || expected.as_f64().is_some() =>
        {
            match text.trim().parse::<f64>() {
                Ok(number) => MetadataValue::Float(number),
                Err(_) if operator.is_ordering() => {
                    return (
                        false,
                        format!(
                            "{} {} {} → False (actual={} is not numeric)",
                            label,
                            operator.symbol(),
                            expected.repr(),
                            actual.repr()
                        ),
                    );
                }
                Err(_) => actual.clone(),
            }
        }
        _ => actual.clone(),
    };

    let result = compare_metadata(&compared, expected, operator);
    (
        result,
        format!(
            "{} {} {} → {} (actual={})",
            label,
            operator.symbol(),
            expected.repr(),
            tf(result),
            actual.repr()
        ),
    )
}

fn evaluate_plugin_metadata(
    condition: &PluginMetadataCondition,
    ctx: &EvaluationContext<'_>,
) -> (bool, String) {
    let plugin = condition.plugin.to_lowercase();
    let field = condition.field.to_lowercase();
    let label = format!("plugin_metadata({}.{})", plugin, field);

    let Some(metadata) = ctx.plugin_metadata else {
        return (false, format!("{} → False (no plugin metadata available)", label));
    };
    let Some(fields) = metadata
        .iter()
        .find(|(name, _)| name.to_lowercase() == plugin)
        .map(|(_, fields)| fields)
    else {
        return (
            false,
            format!("{} → False (plugin '{}' not in metadata)", label, plugin),
        );
    };
    let Some(value) = fields
        .iter()
        .find(|(name, _)| name.to_lowercase() == field)
        .map(|(_, value)| value)
    else {
        return (false, format!("{} → False (field '{}' not found)", label, field));
    };

    evaluate_metadata_value(
        &label,
        json_to_metadata(value),
        condition.operator,
        condition.value.as_ref(),
        false,
    )
}

fn evaluate_container_metadata(
    condition: &ContainerMetadataCondition,
    ctx: &EvaluationContext<'_>,
) -> (bool, String) {
    let field = condition.field.to_lowercase();
    let label = format!("container_metadata({})", field);

    let Some(tags) = ctx.container_tags else {
        return (false, format!("{} → False (no container tags available)", label));
    };
    let Some(value) = tags.get(&field) else {
        return (false, format!("{} → False (tag '{}' not found)", label, field));
    };

    evaluate_metadata_value(
        &label,
        Some(MetadataValue::String(value.clone())),
        condition.operator,
        condition.value.as_ref(),
        true,
    )
}

/// Evaluate a condition, returning the outcome and a human-readable trace.
///
/// `and`/`or` short-circuit; a `not` trace wraps its child's.
///
/// ```
/// use trackforge_common::{Track, TrackType};
/// use trackforge_rules::{evaluate, parse_expression, EvaluationContext};
///
/// let tracks = vec![Track::new(1, TrackType::Audio).with_language("eng")];
/// let condition = parse_expression("exists(audio, lang == en)").unwrap();
/// let (result, trace) = evaluate(&condition, &EvaluationContext::new(&tracks));
/// assert!(result);
/// assert_eq!(trace, "exists(audio) → True (track[1] eng)");
/// ```
pub fn evaluate(condition: &Condition, ctx: &EvaluationContext<'_>) -> (bool, String) {
    match condition {
        Condition::Exists(c) => evaluate_exists(c, ctx),
        Condition::Count(c) => evaluate_count(c, ctx),
        Condition::AudioMultiLanguage(c) => evaluate_multi_language(c, ctx),
        Condition::PluginMetadata(c) => evaluate_plugin_metadata(c, ctx),
        Condition::ContainerMetadata(c) => evaluate_container_metadata(c, ctx),
        Condition::IsOriginal(c) => {
            evaluate_classification("is_original", OriginalDubbedStatus::Original, c, ctx)
        }
        Condition::IsDubbed(c) => {
            evaluate_classification("is_dubbed", OriginalDubbedStatus::Dubbed, c, ctx)
        }
        Condition::And(children) => {
            for child in children {
                let (result, reason) = evaluate(child, ctx);
                if !result {
                    return (false, format!("and → False ({})", reason));
                }
            }
            (true, format!("and → True ({} conditions)", children.len()))
        }
        Condition::Or(children) => {
            for child in children {
                let (result, reason) = evaluate(child, ctx);
                if result {
                    return (true, format!("or → True ({})", reason));
                }
            }
            (
                false,
                format!("or → False ({} conditions failed)", children.len()),
            )
        }
        Condition::Not(inner) => {
            let (result, reason) = evaluate(inner, ctx);
            (!result, format!("not({}) → {}", reason, tf(!result)))
        }
    }
}

impl Condition {
    /// Outcome of [`evaluate`] without the trace.
    pub fn is_satisfied(&self, ctx: &EvaluationContext<'_>) -> bool {
        evaluate(self, ctx).0
    }
}
