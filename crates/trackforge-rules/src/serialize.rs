//! Canonical expression text for conditions.
//!
//! `Display` renders the shortest text that parses back to an equal tree:
//! default arguments are omitted and parentheses only appear where operator
//! precedence (`or` < `and` < `not`) or grouping requires them.
//!
//! `Serialize`/`Deserialize` reuse the same text, so a condition stored in JSON
//! or TOML is just its expression string.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Write};

use crate::condition::{
    format_float, ClassificationCondition, Condition, ContainerMetadataCondition, MetadataOp,
    MetadataValue, MultiLanguageCondition, NumericFilter, PluginMetadataCondition, StringMatch,
    TitleMatch, TrackFilters, DEFAULT_MIN_CONFIDENCE, DEFAULT_MULTI_LANGUAGE_THRESHOLD,
};
use crate::parser::parse_expression;

const KEYWORDS: [&str; 6] = ["and", "or", "not", "in", "true", "false"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Top,
    Or,
    And,
    Not,
}

fn is_bare_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !KEYWORDS.contains(&s)
}

fn quoted(s: &str) -> String {
    if s.contains('"') {
        format!("'{}'", s)
    } else {
        format!("\"{}\"", s)
    }
}

/// Identifier-shaped strings stay bare, everything else is quoted.
fn text(s: &str) -> String {
    if is_bare_identifier(s) {
        s.to_string()
    } else {
        quoted(s)
    }
}

fn metadata_value(value: &MetadataValue) -> String {
    match value {
        MetadataValue::String(s) => text(s),
        MetadataValue::Integer(i) => i.to_string(),
        MetadataValue::Float(f) => format_float(*f),
        MetadataValue::Bool(b) => b.to_string(),
    }
}

fn string_match(name: &str, matcher: &StringMatch) -> String {
    match matcher {
        StringMatch::One(value) => format!("{} == {}", name, text(value)),
        StringMatch::AnyOf(values) => {
            let values: Vec<String> = values.iter().map(|v| text(v)).collect();
            format!("{} in [{}]", name, values.join(", "))
        }
    }
}

fn numeric(name: &str, filter: &NumericFilter) -> String {
    match filter {
        NumericFilter::Exact(value) => format!("{} == {}", name, value),
        NumericFilter::Compare(c) => format!("{} {} {}", name, c.operator, c.value),
    }
}

fn filter_args(filters: &TrackFilters) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(language) = &filters.language {
        parts.push(string_match("lang", language));
    }
    if let Some(codec) = &filters.codec {
        parts.push(string_match("codec", codec));
    }
    if let Some(channels) = &filters.channels {
        parts.push(numeric("channels", channels));
    }
    if let Some(height) = &filters.height {
        parts.push(numeric("height", height));
    }
    if let Some(width) = &filters.width {
        parts.push(numeric("width", width));
    }
    if let Some(flag) = filters.is_default {
        parts.push(format!("default == {}", flag));
    }
    if let Some(flag) = filters.is_forced {
        parts.push(format!("forced == {}", flag));
    }
    match &filters.title {
        Some(TitleMatch::Contains(s)) => parts.push(format!("title == {}", quoted(s))),
        Some(TitleMatch::Regex(p)) => parts.push(format!("title_regex == {}", quoted(p.as_str()))),
        None => {}
    }
    if let Some(flag) = filters.not_commentary {
        parts.push(format!("not_commentary == {}", flag));
    }
    parts
}

fn multi_language_args(c: &MultiLanguageCondition) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(index) = c.track_index {
        parts.push(format!("track_index == {}", index));
    }
    if c.threshold != DEFAULT_MULTI_LANGUAGE_THRESHOLD {
        parts.push(format!("threshold == {}", format_float(c.threshold)));
    }
    if let Some(language) = &c.primary_language {
        parts.push(format!("primary_language == {}", text(language)));
    }
    parts
}

fn classification_args(c: &ClassificationCondition) -> Vec<String> {
    let mut parts = Vec::new();
    if !c.value {
        parts.push("value == false".to_string());
    }
    if c.min_confidence != DEFAULT_MIN_CONFIDENCE {
        parts.push(format!("confidence == {}", format_float(c.min_confidence)));
    }
    if let Some(language) = &c.language {
        parts.push(format!("lang == {}", text(language)));
    }
    parts
}

fn metadata_suffix(operator: MetadataOp, value: Option<&MetadataValue>) -> String {
    match (operator, value) {
        (MetadataOp::Exists, _) | (_, None) => String::new(),
        (op, Some(value)) => format!(" {} {}", op.symbol(), metadata_value(value)),
    }
}

fn write_condition(
    f: &mut fmt::Formatter<'_>,
    condition: &Condition,
    parent: Precedence,
) -> fmt::Result {
    match condition {
        Condition::Or(children) => write_joined(f, children, " or ", Precedence::Or, parent),
        Condition::And(children) => write_joined(f, children, " and ", Precedence::And, parent),
        Condition::Not(inner) => {
            f.write_str("not ")?;
            write_condition(f, inner, Precedence::Not)
        }
        Condition::Exists(e) => {
            let mut args = vec![e.track_type.to_string()];
            args.extend(filter_args(&e.filters));
            write!(f, "exists({})", args.join(", "))
        }
        Condition::Count(c) => {
            let mut args = vec![c.track_type.to_string()];
            args.extend(filter_args(&c.filters));
            write!(f, "count({}) {} {}", args.join(", "), c.operator, c.value)
        }
        Condition::AudioMultiLanguage(c) => {
            write!(f, "multi_language({})", multi_language_args(c).join(", "))
        }
        Condition::PluginMetadata(PluginMetadataCondition {
            plugin,
            field,
            operator,
            value,
        }) => write!(
            f,
            "plugin({}, {}){}",
            text(plugin),
            text(field),
            metadata_suffix(*operator, value.as_ref())
        ),
        Condition::ContainerMetadata(ContainerMetadataCondition {
            field,
            operator,
            value,
        }) => write!(
            f,
            "container_meta({}){}",
            text(field),
            metadata_suffix(*operator, value.as_ref())
        ),
        Condition::IsOriginal(c) => write!(f, "is_original({})", classification_args(c).join(", ")),
        Condition::IsDubbed(c) => write!(f, "is_dubbed({})", classification_args(c).join(", ")),
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[Condition],
    separator: &str,
    own: Precedence,
    parent: Precedence,
) -> fmt::Result {
    // A same-level child is grouped explicitly so the tree shape survives.
    let grouped = parent >= own;
    if grouped {
        f.write_char('(')?;
    }
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write_condition(f, child, own)?;
    }
    if grouped {
        f.write_char(')')?;
    }
    Ok(())
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_condition(f, self, Precedence::Top)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        parse_expression(&source).map_err(serde::de::Error::custom)
    }
}
