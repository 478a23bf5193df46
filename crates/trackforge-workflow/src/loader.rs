//! TOML policy loading.
//!
//! Documents deserialize into the private `*File` structs below, which mirror
//! the on-disk layout. Conversion into the model types does all field
//! validation, so a [`Policy`] returned from here never needs rechecking:
//! expressions are parsed, regexes compiled, and thresholds converted.

use std::path::Path;

use serde::Deserialize;
use trackforge_common::language::is_language_code;
use trackforge_common::{
    normalize_container_format, parse_duration, parse_file_size, resolution_height, TrackType,
};
use trackforge_rules::{parse_expression, CommentaryPatterns, Condition};

use crate::error::{Result, ValidationError, WorkflowError};
use crate::phase::{
    AttachmentFilterConfig, AudioFilterConfig, ConditionalRule, ContainerConfig,
    DefaultFlagsConfig, FallbackMode, MatchMode, PhaseDefinition, RuleAction, RunIf, SkipMode,
    SkipTarget, SkipWhen, SubtitleFilterConfig, SynthesisDefinition, Threshold, TrackActions,
    TrackCategory, TranscodeConfig, TranscriptionConfig, ValueSource,
};
use crate::policy::{GlobalConfig, OnErrorMode, Policy};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    config: ConfigFile,
    #[serde(default)]
    phases: Vec<PhaseFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    audio_languages: Option<Vec<String>>,
    subtitle_languages: Option<Vec<String>>,
    commentary_patterns: Option<Vec<String>>,
    on_error: OnErrorMode,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PhaseFile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    depends_on: Vec<String>,
    run_if: Option<RunIfFile>,
    skip_when: Option<SkipWhenFile>,
    on_error: Option<OnErrorMode>,
    container: Option<ContainerFile>,
    audio_filter: Option<AudioFilterFile>,
    subtitle_filter: Option<SubtitleFilterFile>,
    attachment_filter: Option<AttachmentFilterFile>,
    track_order: Option<Vec<TrackCategory>>,
    default_flags: Option<DefaultFlagsFile>,
    #[serde(default)]
    conditional: Vec<RuleFile>,
    #[serde(default)]
    conditional_match: MatchMode,
    #[serde(default)]
    audio_synthesis: Vec<SynthesisFile>,
    transcode: Option<TranscodeFile>,
    transcription: Option<TranscriptionFile>,
    audio_actions: Option<TrackActionsFile>,
    subtitle_actions: Option<TrackActionsFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RunIfFile {
    phase_modified: Option<String>,
    phase_completed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SkipWhenFile {
    video_codec: Option<Vec<String>>,
    audio_codec_exists: Option<String>,
    subtitle_language_exists: Option<String>,
    container: Option<Vec<String>>,
    resolution: Option<String>,
    resolution_under: Option<String>,
    file_size_under: Option<String>,
    file_size_over: Option<String>,
    duration_under: Option<String>,
    duration_over: Option<String>,
    mode: SkipMode,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContainerFile {
    target: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AudioFilterFile {
    languages: Vec<String>,
    #[serde(default = "default_minimum")]
    minimum: usize,
    #[serde(default)]
    fallback: FallbackMode,
}

fn default_minimum() -> usize {
    1
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SubtitleFilterFile {
    languages: Vec<String>,
    preserve_forced: bool,
    remove_all: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AttachmentFilterFile {
    remove_all: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DefaultFlagsFile {
    set_first_video_default: bool,
    set_preferred_audio_default: bool,
    set_preferred_subtitle_default: bool,
    clear_other_defaults: bool,
    set_subtitle_default_when_audio_differs: bool,
}

impl Default for DefaultFlagsFile {
    fn default() -> Self {
        Self {
            set_first_video_default: true,
            set_preferred_audio_default: true,
            set_preferred_subtitle_default: false,
            clear_other_defaults: true,
            set_subtitle_default_when_audio_differs: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TrackActionsFile {
    clear_all_forced: bool,
    clear_all_default: bool,
    clear_all_titles: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TranscodeFile {
    video_codec: String,
    #[serde(default)]
    skip_if_codec_matches: Vec<String>,
    max_height: Option<u32>,
    max_resolution: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TranscriptionFile {
    #[serde(default)]
    update_language: bool,
    #[serde(default = "default_confidence_threshold")]
    confidence_threshold: f64,
}

fn default_confidence_threshold() -> f64 {
    0.8
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default)]
    name: String,
    when: String,
    #[serde(default)]
    then: Vec<ActionFile>,
    #[serde(default, rename = "else")]
    otherwise: Vec<ActionFile>,
}

/// One rule action; exactly one key may be set.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ActionFile {
    skip_video_transcode: Option<bool>,
    skip_audio_transcode: Option<bool>,
    skip_track_filter: Option<bool>,
    warn: Option<String>,
    fail: Option<String>,
    set_forced: Option<FlagActionFile>,
    set_default: Option<FlagActionFile>,
    set_language: Option<SetLanguageFile>,
    set_container_metadata: Option<SetContainerMetadataFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlagActionFile {
    track_type: Option<TrackType>,
    language: Option<String>,
    #[serde(default = "default_true")]
    value: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PluginRefFile {
    plugin: String,
    field: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetLanguageFile {
    track_type: TrackType,
    new_language: Option<String>,
    from_plugin_metadata: Option<PluginRefFile>,
    match_language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetContainerMetadataFile {
    field: String,
    value: Option<String>,
    from_plugin_metadata: Option<PluginRefFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SynthesisFile {
    name: String,
    codec: String,
    channels: u32,
    bitrate: Option<String>,
    title: Option<String>,
    language: Option<String>,
    create_if: Option<String>,
}

/// Load and validate a policy file.
pub fn load_policy(path: &Path) -> Result<Policy> {
    let content = std::fs::read_to_string(path).map_err(|source| WorkflowError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let policy = parse_policy(&content)?;
    tracing::debug!(
        "Loaded policy '{}' with {} phase(s) from {:?}",
        policy.name,
        policy.phases().len(),
        path
    );
    Ok(policy)
}

/// Parse and validate a policy from TOML text.
pub fn parse_policy(content: &str) -> Result<Policy> {
    let file: PolicyFile = toml::from_str(content)?;
    Ok(convert_policy(file)?)
}

fn convert_policy(file: PolicyFile) -> std::result::Result<Policy, ValidationError> {
    let config = convert_config(file.config)?;
    let phases = file
        .phases
        .into_iter()
        .map(convert_phase)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let policy = Policy::new(file.name.unwrap_or_else(|| "policy".to_string()), config, phases)?;
    Ok(match file.description {
        Some(description) => policy.with_description(description),
        None => policy,
    })
}

fn convert_languages(
    field: &str,
    languages: Option<Vec<String>>,
    default: Vec<String>,
) -> std::result::Result<Vec<String>, ValidationError> {
    let Some(languages) = languages else {
        return Ok(default);
    };
    if languages.is_empty() {
        return Err(ValidationError::invalid_config(field, "must not be empty"));
    }
    if let Some(bad) = languages.iter().find(|l| !is_language_code(l)) {
        return Err(ValidationError::invalid_config(
            field,
            format!("'{}' is not a 2-3 letter lowercase language code", bad),
        ));
    }
    Ok(languages)
}

fn convert_config(file: ConfigFile) -> std::result::Result<GlobalConfig, ValidationError> {
    let defaults = GlobalConfig::default();
    let commentary = match file.commentary_patterns {
        Some(patterns) => CommentaryPatterns::new(&patterns).map_err(|e| {
            ValidationError::invalid_config("commentary_patterns", e.to_string())
        })?,
        None => defaults.commentary,
    };

    Ok(GlobalConfig {
        audio_languages: convert_languages(
            "audio_languages",
            file.audio_languages,
            defaults.audio_languages,
        )?,
        subtitle_languages: convert_languages(
            "subtitle_languages",
            file.subtitle_languages,
            defaults.subtitle_languages,
        )?,
        commentary,
        on_error: file.on_error,
    })
}

fn convert_phase(file: PhaseFile) -> std::result::Result<PhaseDefinition, ValidationError> {
    let name = file.name;
    let mut phase = PhaseDefinition::new(name.clone());

    phase.depends_on = file.depends_on;
    phase.on_error = file.on_error;
    phase.run_if = file
        .run_if
        .map(|run_if| convert_run_if(&name, run_if))
        .transpose()?;
    phase.skip_when = file
        .skip_when
        .map(|skip| convert_skip_when(&name, skip))
        .transpose()?;

    phase.container = file
        .container
        .map(|c| {
            let target = normalize_container_format(&c.target);
            match target.as_str() {
                "mkv" | "mp4" => Ok(ContainerConfig { target }),
                _ => Err(ValidationError::invalid_field(
                    &name,
                    "container.target",
                    format!("'{}' is not mkv or mp4", c.target),
                )),
            }
        })
        .transpose()?;

    if let Some(filter) = file.audio_filter {
        if filter.minimum < 1 {
            return Err(ValidationError::invalid_field(
                &name,
                "audio_filter.minimum",
                "must be at least 1",
            ));
        }
        check_languages(&name, "audio_filter.languages", &filter.languages)?;
        phase.audio_filter = Some(AudioFilterConfig {
            languages: filter.languages,
            minimum: filter.minimum,
            fallback: filter.fallback,
        });
    }
    if let Some(filter) = file.subtitle_filter {
        check_languages(&name, "subtitle_filter.languages", &filter.languages)?;
        phase.subtitle_filter = Some(SubtitleFilterConfig {
            languages: filter.languages,
            preserve_forced: filter.preserve_forced,
            remove_all: filter.remove_all,
        });
    }
    phase.attachment_filter = file.attachment_filter.map(|f| AttachmentFilterConfig {
        remove_all: f.remove_all,
    });

    phase.track_order = file.track_order.map(|order| {
        if order.is_empty() {
            TrackCategory::DEFAULT_ORDER.to_vec()
        } else {
            order
        }
    });
    phase.default_flags = file.default_flags.map(|f| DefaultFlagsConfig {
        set_first_video_default: f.set_first_video_default,
        set_preferred_audio_default: f.set_preferred_audio_default,
        set_preferred_subtitle_default: f.set_preferred_subtitle_default,
        clear_other_defaults: f.clear_other_defaults,
        set_subtitle_default_when_audio_differs: f.set_subtitle_default_when_audio_differs,
    });

    phase.conditional = file
        .conditional
        .into_iter()
        .enumerate()
        .map(|(i, rule)| convert_rule(&name, i, rule))
        .collect::<std::result::Result<_, _>>()?;
    phase.conditional_match = file.conditional_match;

    phase.audio_synthesis = file
        .audio_synthesis
        .into_iter()
        .map(|s| convert_synthesis(&name, s))
        .collect::<std::result::Result<_, _>>()?;

    phase.transcode = file
        .transcode
        .map(|t| convert_transcode(&name, t))
        .transpose()?;

    if let Some(t) = file.transcription {
        if !(0.0..=1.0).contains(&t.confidence_threshold) {
            return Err(ValidationError::invalid_field(
                &name,
                "transcription.confidence_threshold",
                format!("{} is outside 0.0..=1.0", t.confidence_threshold),
            ));
        }
        phase.transcription = Some(TranscriptionConfig {
            update_language: t.update_language,
            confidence_threshold: t.confidence_threshold,
        });
    }

    phase.audio_actions = file.audio_actions.map(convert_track_actions);
    phase.subtitle_actions = file.subtitle_actions.map(convert_track_actions);

    Ok(phase)
}

fn check_languages(
    phase: &str,
    field: &str,
    languages: &[String],
) -> std::result::Result<(), ValidationError> {
    match languages.iter().find(|l| !is_language_code(l)) {
        Some(bad) => Err(ValidationError::invalid_field(
            phase,
            field,
            format!("'{}' is not a 2-3 letter lowercase language code", bad),
        )),
        None => Ok(()),
    }
}

fn convert_track_actions(file: TrackActionsFile) -> TrackActions {
    TrackActions {
        clear_all_forced: file.clear_all_forced,
        clear_all_default: file.clear_all_default,
        clear_all_titles: file.clear_all_titles,
    }
}

fn convert_run_if(phase: &str, file: RunIfFile) -> std::result::Result<RunIf, ValidationError> {
    match (file.phase_modified, file.phase_completed) {
        (Some(name), None) => Ok(RunIf::PhaseModified(name)),
        (None, Some(name)) => Ok(RunIf::PhaseCompleted(name)),
        (None, None) => Err(ValidationError::EmptyRunIf {
            phase: phase.to_string(),
        }),
        (Some(_), Some(_)) => Err(ValidationError::ConflictingRunIf {
            phase: phase.to_string(),
        }),
    }
}

fn size_threshold(
    phase: &str,
    field: &str,
    text: Option<String>,
) -> std::result::Result<Option<Threshold<u64>>, ValidationError> {
    text.map(|text| {
        parse_file_size(&text)
            .map(|value| Threshold { value, text })
            .map_err(|e| ValidationError::invalid_field(phase, field, e.to_string()))
    })
    .transpose()
}

fn duration_threshold(
    phase: &str,
    field: &str,
    text: Option<String>,
) -> std::result::Result<Option<Threshold<f64>>, ValidationError> {
    text.map(|text| {
        parse_duration(&text)
            .map(|value| Threshold { value, text })
            .map_err(|e| ValidationError::invalid_field(phase, field, e.to_string()))
    })
    .transpose()
}

fn check_resolution(phase: &str, field: &str, label: &str) -> std::result::Result<u32, ValidationError> {
    resolution_height(label).ok_or_else(|| {
        ValidationError::invalid_field(
            phase,
            field,
            format!(
                "unknown resolution '{}' (expected 480p, 720p, 1080p, 1440p, 2160p, 4k or 8k)",
                label
            ),
        )
    })
}

fn convert_skip_when(phase: &str, file: SkipWhenFile) -> std::result::Result<SkipWhen, ValidationError> {
    if let Some(label) = &file.resolution {
        check_resolution(phase, "skip_when.resolution", label)?;
    }
    let resolution_under = file
        .resolution_under
        .map(|text| {
            check_resolution(phase, "skip_when.resolution_under", &text)
                .map(|value| Threshold { value, text })
        })
        .transpose()?;

    let skip = SkipWhen {
        video_codec: file.video_codec.unwrap_or_default(),
        audio_codec_exists: file.audio_codec_exists,
        subtitle_language_exists: file.subtitle_language_exists,
        container: file.container.unwrap_or_default(),
        resolution: file.resolution,
        resolution_under,
        file_size_under: size_threshold(phase, "skip_when.file_size_under", file.file_size_under)?,
        file_size_over: size_threshold(phase, "skip_when.file_size_over", file.file_size_over)?,
        duration_under: duration_threshold(phase, "skip_when.duration_under", file.duration_under)?,
        duration_over: duration_threshold(phase, "skip_when.duration_over", file.duration_over)?,
        mode: file.mode,
    };

    if skip.active_conditions() == 0 {
        return Err(ValidationError::EmptySkipWhen {
            phase: phase.to_string(),
        });
    }
    Ok(skip)
}

fn compile_expression(
    phase: &str,
    field: String,
    source: &str,
) -> std::result::Result<Condition, ValidationError> {
    parse_expression(source).map_err(|source| ValidationError::Expression {
        phase: phase.to_string(),
        field,
        source,
    })
}

fn convert_rule(
    phase: &str,
    index: usize,
    file: RuleFile,
) -> std::result::Result<ConditionalRule, ValidationError> {
    let name = if file.name.trim().is_empty() {
        format!("rule-{}", index + 1)
    } else {
        file.name
    };
    let field = format!("conditional '{}'", name);
    let when = compile_expression(phase, format!("{} when", field), &file.when)?;

    if file.then.is_empty() && file.otherwise.is_empty() {
        return Err(ValidationError::invalid_field(
            phase,
            field,
            "rule must define at least one then or else action",
        ));
    }

    let then_actions = file
        .then
        .into_iter()
        .map(|a| convert_action(phase, &field, a))
        .collect::<std::result::Result<_, _>>()?;
    let else_actions = file
        .otherwise
        .into_iter()
        .map(|a| convert_action(phase, &field, a))
        .collect::<std::result::Result<_, _>>()?;

    Ok(ConditionalRule {
        name,
        when,
        then_actions,
        else_actions,
    })
}

fn value_source(
    phase: &str,
    field: &str,
    literal: Option<String>,
    plugin: Option<PluginRefFile>,
    literal_key: &str,
) -> std::result::Result<ValueSource, ValidationError> {
    match (literal, plugin) {
        (Some(value), None) => Ok(ValueSource::Literal(value)),
        (None, Some(r)) => Ok(ValueSource::PluginMetadata {
            plugin: r.plugin.to_lowercase(),
            field: r.field.to_lowercase(),
        }),
        _ => Err(ValidationError::invalid_field(
            phase,
            field,
            format!("exactly one of {} and from_plugin_metadata is required", literal_key),
        )),
    }
}

fn convert_action(
    phase: &str,
    field: &str,
    file: ActionFile,
) -> std::result::Result<RuleAction, ValidationError> {
    let mut actions = Vec::new();

    for (flag, target) in [
        (file.skip_video_transcode, SkipTarget::VideoTranscode),
        (file.skip_audio_transcode, SkipTarget::AudioTranscode),
        (file.skip_track_filter, SkipTarget::TrackFilter),
    ] {
        if let Some(set) = flag {
            if !set {
                return Err(ValidationError::invalid_field(
                    phase,
                    field,
                    "skip actions only accept true",
                ));
            }
            actions.push(RuleAction::Skip(target));
        }
    }
    if let Some(message) = file.warn {
        actions.push(RuleAction::Warn(message));
    }
    if let Some(message) = file.fail {
        actions.push(RuleAction::Fail(message));
    }
    if let Some(a) = file.set_forced {
        actions.push(RuleAction::SetForced {
            track_type: a.track_type.unwrap_or(TrackType::Subtitle),
            language: a.language,
            value: a.value,
        });
    }
    if let Some(a) = file.set_default {
        let Some(track_type) = a.track_type else {
            return Err(ValidationError::invalid_field(
                phase,
                field,
                "set_default requires track_type",
            ));
        };
        actions.push(RuleAction::SetDefault {
            track_type,
            language: a.language,
            value: a.value,
        });
    }
    if let Some(a) = file.set_language {
        if let Some(lang) = &a.new_language {
            if !is_language_code(lang) {
                return Err(ValidationError::invalid_field(
                    phase,
                    field,
                    format!("'{}' is not a 2-3 letter lowercase language code", lang),
                ));
            }
        }
        actions.push(RuleAction::SetLanguage {
            track_type: a.track_type,
            source: value_source(phase, field, a.new_language, a.from_plugin_metadata, "new_language")?,
            match_language: a.match_language,
        });
    }
    if let Some(a) = file.set_container_metadata {
        if a.field.trim().is_empty() {
            return Err(ValidationError::invalid_field(
                phase,
                field,
                "set_container_metadata requires a field name",
            ));
        }
        actions.push(RuleAction::SetContainerMetadata {
            field: a.field.to_lowercase(),
            source: value_source(phase, field, a.value, a.from_plugin_metadata, "value")?,
        });
    }

    match actions.len() {
        1 => Ok(actions.remove(0)),
        0 => Err(ValidationError::invalid_field(phase, field, "empty action")),
        n => Err(ValidationError::invalid_field(
            phase,
            field,
            format!("an action entry must set exactly one action, found {}", n),
        )),
    }
}

fn convert_synthesis(
    phase: &str,
    file: SynthesisFile,
) -> std::result::Result<SynthesisDefinition, ValidationError> {
    if file.channels == 0 {
        return Err(ValidationError::invalid_field(
            phase,
            format!("audio_synthesis '{}' channels", file.name),
            "must be at least 1",
        ));
    }
    let create_if = file
        .create_if
        .map(|source| {
            compile_expression(
                phase,
                format!("audio_synthesis '{}' create_if", file.name),
                &source,
            )
        })
        .transpose()?;

    Ok(SynthesisDefinition {
        name: file.name,
        codec: file.codec.to_lowercase(),
        channels: file.channels,
        bitrate: file.bitrate,
        title: file.title,
        language: file.language,
        create_if,
    })
}

fn convert_transcode(
    phase: &str,
    file: TranscodeFile,
) -> std::result::Result<TranscodeConfig, ValidationError> {
    let max_height = match (file.max_height, file.max_resolution) {
        (Some(_), Some(_)) => {
            return Err(ValidationError::invalid_field(
                phase,
                "transcode",
                "set only one of max_height and max_resolution",
            ))
        }
        (Some(height), None) => Some(height),
        (None, Some(label)) => Some(check_resolution(phase, "transcode.max_resolution", &label)?),
        (None, None) => None,
    };

    Ok(TranscodeConfig {
        video_codec: file.video_codec.to_lowercase(),
        skip_if_codec_matches: file.skip_if_codec_matches,
        max_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::OperationType;
    use assert_matches::assert_matches;

    const FULL_POLICY: &str = r#"
name = "normalize"
description = "Tidy up tracks"

[config]
audio_languages = ["eng", "und"]
subtitle_languages = ["eng"]
commentary_patterns = ["commentary", "director"]
on_error = "fail"

[[phases]]
name = "normalize"
container = { target = "matroska" }
audio_filter = { languages = ["eng", "jpn"], minimum = 1 }
subtitle_filter = { languages = ["eng"], preserve_forced = true }
attachment_filter = { remove_all = true }
track_order = []
default_flags = { set_first_video_default = true, set_preferred_audio_default = true }

[[phases]]
name = "transcode"
depends_on = ["normalize"]
on_error = "skip"
run_if = { phase_modified = "normalize" }
skip_when = { video_codec = ["hevc"], file_size_under = "500MB", duration_under = "30min", mode = "all" }
transcode = { video_codec = "HEVC", skip_if_codec_matches = ["hevc", "av1"], max_resolution = "1080p" }
transcription = { update_language = true, confidence_threshold = 0.9 }
audio_actions = { clear_all_titles = true }

[[phases.conditional]]
name = "warn-no-english"
when = "not exists(audio, lang == eng)"
then = [{ warn = "no english audio in {filename}" }, { skip_video_transcode = true }]
else = [{ set_language = { track_type = "audio", from_plugin_metadata = { plugin = "Radarr", field = "Original_Language" } } }]

[[phases.audio_synthesis]]
name = "stereo"
codec = "aac"
channels = 2
create_if = "not exists(audio, channels == 2)"
"#;

    #[test]
    fn test_parse_full_policy() {
        let policy = parse_policy(FULL_POLICY).unwrap();
        assert_eq!(policy.name, "normalize");
        assert_eq!(policy.description.as_deref(), Some("Tidy up tracks"));
        assert_eq!(policy.config.on_error, OnErrorMode::Fail);
        assert_eq!(policy.config.subtitle_languages, vec!["eng"]);
        assert_eq!(policy.config.commentary.sources(), vec!["commentary", "director"]);
        assert_eq!(policy.phase_names(), vec!["normalize", "transcode"]);

        let normalize = &policy.phases()[0];
        assert_eq!(normalize.container.as_ref().unwrap().target, "mkv");
        assert_eq!(
            normalize.track_order.as_deref(),
            Some(&TrackCategory::DEFAULT_ORDER[..])
        );
        assert!(normalize.default_flags.unwrap().clear_other_defaults);
        assert_eq!(
            normalize.operations(),
            vec![
                OperationType::Container,
                OperationType::AudioFilter,
                OperationType::SubtitleFilter,
                OperationType::AttachmentFilter,
                OperationType::TrackOrder,
                OperationType::DefaultFlags,
            ]
        );

        let transcode = &policy.phases()[1];
        assert_eq!(transcode.on_error, Some(OnErrorMode::Skip));
        assert_eq!(
            transcode.run_if,
            Some(RunIf::PhaseModified("normalize".into()))
        );
        let skip = transcode.skip_when.as_ref().unwrap();
        assert_eq!(skip.mode, SkipMode::All);
        assert_eq!(skip.file_size_under.as_ref().unwrap().value, 500 * 1024 * 1024);
        assert_eq!(skip.duration_under.as_ref().unwrap().value, 1800.0);

        let tc = transcode.transcode.as_ref().unwrap();
        assert_eq!(tc.video_codec, "hevc");
        assert_eq!(tc.max_height, Some(1080));

        let rule = &transcode.conditional[0];
        assert_eq!(rule.name, "warn-no-english");
        assert_eq!(rule.when.to_string(), "not exists(audio, lang == eng)");
        assert_eq!(
            rule.then_actions,
            vec![
                RuleAction::Warn("no english audio in {filename}".into()),
                RuleAction::Skip(SkipTarget::VideoTranscode),
            ]
        );
        assert_matches!(
            &rule.else_actions[0],
            RuleAction::SetLanguage { source: ValueSource::PluginMetadata { plugin, field }, .. }
                if plugin == "radarr" && field == "original_language"
        );

        let synth = &transcode.audio_synthesis[0];
        assert_eq!(synth.channels, 2);
        assert!(synth.create_if.is_some());
    }

    #[test]
    fn test_defaults_when_config_missing() {
        let policy = parse_policy("[[phases]]\nname = \"only\"\n").unwrap();
        assert_eq!(policy.config.audio_languages, vec!["eng", "und"]);
        assert_eq!(policy.config.on_error, OnErrorMode::Continue);
        assert!(policy.phases()[0].operations().is_empty());
    }

    #[test]
    fn test_no_phases() {
        assert_matches!(
            parse_policy("name = \"empty\""),
            Err(WorkflowError::Validation(ValidationError::NoPhases))
        );
    }

    #[test]
    fn test_invalid_expression_names_phase_and_field() {
        let toml = r#"
[[phases]]
name = "check"
[[phases.conditional]]
name = "broken"
when = "exists(audio"
then = [{ warn = "x" }]
"#;
        let err = parse_policy(toml).unwrap_err();
        assert_matches!(
            &err,
            WorkflowError::Validation(ValidationError::Expression { phase, field, .. })
                if phase == "check" && field == "conditional 'broken' when"
        );
    }

    #[test]
    fn test_run_if_requires_exactly_one() {
        let empty = r#"
[[phases]]
name = "a"
[[phases]]
name = "b"
run_if = {}
"#;
        assert_matches!(
            parse_policy(empty),
            Err(WorkflowError::Validation(ValidationError::EmptyRunIf { .. }))
        );

        let both = r#"
[[phases]]
name = "a"
[[phases]]
name = "b"
run_if = { phase_modified = "a", phase_completed = "a" }
"#;
        assert_matches!(
            parse_policy(both),
            Err(WorkflowError::Validation(ValidationError::ConflictingRunIf { .. }))
        );
    }

    #[test]
    fn test_skip_when_validation() {
        let empty = "[[phases]]\nname = \"a\"\nskip_when = { mode = \"all\" }\n";
        assert_matches!(
            parse_policy(empty),
            Err(WorkflowError::Validation(ValidationError::EmptySkipWhen { .. }))
        );

        let bad_res = "[[phases]]\nname = \"a\"\nskip_when = { resolution_under = \"900p\" }\n";
        assert_matches!(
            parse_policy(bad_res),
            Err(WorkflowError::Validation(ValidationError::InvalidField { field, .. }))
                if field == "skip_when.resolution_under"
        );

        let bad_size = "[[phases]]\nname = \"a\"\nskip_when = { file_size_under = \"5XB\" }\n";
        assert_matches!(
            parse_policy(bad_size),
            Err(WorkflowError::Validation(ValidationError::InvalidField { .. }))
        );
    }

    #[test]
    fn test_invalid_commentary_pattern() {
        let toml = "[config]\ncommentary_patterns = [\"(unclosed\"]\n[[phases]]\nname = \"a\"\n";
        assert_matches!(
            parse_policy(toml),
            Err(WorkflowError::Validation(ValidationError::InvalidConfig { field, .. }))
                if field == "commentary_patterns"
        );
    }

    #[test]
    fn test_invalid_language_code() {
        let toml = "[config]\naudio_languages = [\"English\"]\n[[phases]]\nname = \"a\"\n";
        assert_matches!(
            parse_policy(toml),
            Err(WorkflowError::Validation(ValidationError::InvalidConfig { .. }))
        );
    }

    #[test]
    fn test_action_entry_must_hold_one_action() {
        let toml = r#"
[[phases]]
name = "a"
[[phases.conditional]]
name = "r"
when = "exists(audio)"
then = [{ warn = "x", fail = "y" }]
"#;
        assert_matches!(
            parse_policy(toml),
            Err(WorkflowError::Validation(ValidationError::InvalidField { message, .. }))
                if message.contains("exactly one action")
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let toml = "[[phases]]\nname = \"a\"\naudio_filtr = { languages = [\"eng\"] }\n";
        assert_matches!(parse_policy(toml), Err(WorkflowError::Toml(_)));
    }

    #[test]
    fn test_out_of_range_transcription_threshold() {
        let toml = "[[phases]]\nname = \"a\"\ntranscription = { confidence_threshold = 1.5 }\n";
        assert_matches!(
            parse_policy(toml),
            Err(WorkflowError::Validation(ValidationError::InvalidField { field, .. }))
                if field == "transcription.confidence_threshold"
        );
    }

    #[test]
    fn test_audio_filter_minimum() {
        let toml = "[[phases]]\nname = \"a\"\naudio_filter = { languages = [\"eng\"], minimum = 0 }\n";
        assert_matches!(
            parse_policy(toml),
            Err(WorkflowError::Validation(ValidationError::InvalidField { field, .. }))
                if field == "audio_filter.minimum"
        );
    }

    #[test]
    fn test_load_policy_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(&path, FULL_POLICY).unwrap();
        let policy = load_policy(&path).unwrap();
        assert_eq!(policy.phases().len(), 2);

        let missing = dir.path().join("missing.toml");
        assert_matches!(load_policy(&missing), Err(WorkflowError::Io { .. }));
    }
}
