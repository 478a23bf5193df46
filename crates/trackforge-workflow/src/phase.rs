//! Phase definition model.
//!
//! A [`PhaseDefinition`] is immutable once the loader has produced it: every
//! expression is parsed, every regex compiled, and every size or duration
//! threshold converted to a number. Operations are optional sections; a phase
//! with none of them is valid and completes without work.

use std::fmt;

use serde::{Deserialize, Serialize};
use trackforge_common::TrackType;
use trackforge_rules::Condition;

use crate::policy::OnErrorMode;

/// Kinds of work a phase can perform, in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Container,
    AudioFilter,
    SubtitleFilter,
    AttachmentFilter,
    TrackOrder,
    DefaultFlags,
    Conditional,
    AudioSynthesis,
    Transcode,
    Transcription,
    AudioActions,
    SubtitleActions,
}

impl OperationType {
    /// Every operation in execution order.
    pub const ALL: [OperationType; 12] = [
        Self::Container,
        Self::AudioFilter,
        Self::SubtitleFilter,
        Self::AttachmentFilter,
        Self::TrackOrder,
        Self::DefaultFlags,
        Self::Conditional,
        Self::AudioSynthesis,
        Self::Transcode,
        Self::Transcription,
        Self::AudioActions,
        Self::SubtitleActions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::AudioFilter => "audio_filter",
            Self::SubtitleFilter => "subtitle_filter",
            Self::AttachmentFilter => "attachment_filter",
            Self::TrackOrder => "track_order",
            Self::DefaultFlags => "default_flags",
            Self::Conditional => "conditional",
            Self::AudioSynthesis => "audio_synthesis",
            Self::Transcode => "transcode",
            Self::Transcription => "transcription",
            Self::AudioActions => "audio_actions",
            Self::SubtitleActions => "subtitle_actions",
        }
    }

    /// The three filter operations share a single planning pass.
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            Self::AudioFilter | Self::SubtitleFilter | Self::AttachmentFilter
        )
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positive run condition on an earlier phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunIf {
    /// Run only if the named phase changed the file.
    PhaseModified(String),
    /// Run only if the named phase completed.
    PhaseCompleted(String),
}

impl RunIf {
    pub fn phase_name(&self) -> &str {
        match self {
            Self::PhaseModified(name) | Self::PhaseCompleted(name) => name,
        }
    }
}

/// How the configured skip conditions combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipMode {
    /// Skip when any configured condition matches.
    #[default]
    Any,
    /// Skip only when every configured condition matches.
    All,
}

/// A parsed threshold that remembers how the author wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold<T> {
    pub value: T,
    pub text: String,
}

/// Conditions under which a phase is skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkipWhen {
    pub video_codec: Vec<String>,
    pub audio_codec_exists: Option<String>,
    pub subtitle_language_exists: Option<String>,
    pub container: Vec<String>,
    pub resolution: Option<String>,
    pub resolution_under: Option<Threshold<u32>>,
    pub file_size_under: Option<Threshold<u64>>,
    pub file_size_over: Option<Threshold<u64>>,
    pub duration_under: Option<Threshold<f64>>,
    pub duration_over: Option<Threshold<f64>>,
    pub mode: SkipMode,
}

impl SkipWhen {
    /// Number of configured sub-conditions.
    pub fn active_conditions(&self) -> usize {
        [
            !self.video_codec.is_empty(),
            self.audio_codec_exists.is_some(),
            self.subtitle_language_exists.is_some(),
            !self.container.is_empty(),
            self.resolution.is_some(),
            self.resolution_under.is_some(),
            self.file_size_under.is_some(),
            self.file_size_over.is_some(),
            self.duration_under.is_some(),
            self.duration_over.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Target container of a conversion, already normalized (`mkv`, `mp4`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    pub target: String,
}

/// What to do when the audio filter would keep fewer than `minimum` tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Report a policy constraint and change nothing.
    #[default]
    None,
    /// Keep every audio track.
    KeepAll,
    /// Keep the first audio tracks up to the minimum.
    KeepFirst,
    /// Keep tracks in the language of the first audio track.
    ContentLanguage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioFilterConfig {
    pub languages: Vec<String>,
    pub minimum: usize,
    pub fallback: FallbackMode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleFilterConfig {
    pub languages: Vec<String>,
    pub preserve_forced: bool,
    pub remove_all: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentFilterConfig {
    pub remove_all: bool,
}

/// Ordering bucket a track falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackCategory {
    Video,
    AudioMain,
    AudioAlternate,
    AudioCommentary,
    SubtitleMain,
    SubtitleForced,
    SubtitleCommentary,
    Attachment,
}

impl TrackCategory {
    /// Order used when a phase lists `track_order` without values.
    pub const DEFAULT_ORDER: [TrackCategory; 8] = [
        Self::Video,
        Self::AudioMain,
        Self::AudioAlternate,
        Self::SubtitleMain,
        Self::SubtitleForced,
        Self::AudioCommentary,
        Self::SubtitleCommentary,
        Self::Attachment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::AudioMain => "audio_main",
            Self::AudioAlternate => "audio_alternate",
            Self::AudioCommentary => "audio_commentary",
            Self::SubtitleMain => "subtitle_main",
            Self::SubtitleForced => "subtitle_forced",
            Self::SubtitleCommentary => "subtitle_commentary",
            Self::Attachment => "attachment",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultFlagsConfig {
    pub set_first_video_default: bool,
    pub set_preferred_audio_default: bool,
    pub set_preferred_subtitle_default: bool,
    pub clear_other_defaults: bool,
    pub set_subtitle_default_when_audio_differs: bool,
}

/// Flag clearing applied to every track of one type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackActions {
    pub clear_all_forced: bool,
    pub clear_all_default: bool,
    pub clear_all_titles: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeConfig {
    pub video_codec: String,
    pub skip_if_codec_matches: Vec<String>,
    pub max_height: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscriptionConfig {
    pub update_language: bool,
    pub confidence_threshold: f64,
}

/// Whether conditional evaluation stops at the first matching rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    First,
    All,
}

/// Processing step a `skip_*` rule action turns off for the rest of the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipTarget {
    VideoTranscode,
    AudioTranscode,
    TrackFilter,
}

/// Where a rule action takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    Literal(String),
    PluginMetadata { plugin: String, field: String },
}

/// One action in a rule's `then` or `else` branch.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    Skip(SkipTarget),
    /// Message template; `{filename}`, `{path}` and `{rule_name}` are substituted.
    Warn(String),
    Fail(String),
    SetForced {
        track_type: TrackType,
        language: Option<String>,
        value: bool,
    },
    SetDefault {
        track_type: TrackType,
        language: Option<String>,
        value: bool,
    },
    SetLanguage {
        track_type: TrackType,
        source: ValueSource,
        match_language: Option<String>,
    },
    SetContainerMetadata {
        field: String,
        source: ValueSource,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalRule {
    pub name: String,
    pub when: Condition,
    pub then_actions: Vec<RuleAction>,
    pub else_actions: Vec<RuleAction>,
}

/// A new audio track to derive from an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisDefinition {
    pub name: String,
    pub codec: String,
    pub channels: u32,
    pub bitrate: Option<String>,
    pub title: Option<String>,
    /// Language of the created track; defaults to the source's.
    pub language: Option<String>,
    /// Create only when this holds. Always created when unset.
    pub create_if: Option<Condition>,
}

/// One named, gated step of a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseDefinition {
    pub name: String,
    pub depends_on: Vec<String>,
    pub run_if: Option<RunIf>,
    pub skip_when: Option<SkipWhen>,
    /// Overrides the policy-wide error mode.
    pub on_error: Option<OnErrorMode>,

    pub container: Option<ContainerConfig>,
    pub audio_filter: Option<AudioFilterConfig>,
    pub subtitle_filter: Option<SubtitleFilterConfig>,
    pub attachment_filter: Option<AttachmentFilterConfig>,
    pub track_order: Option<Vec<TrackCategory>>,
    pub default_flags: Option<DefaultFlagsConfig>,
    pub conditional: Vec<ConditionalRule>,
    pub conditional_match: MatchMode,
    pub audio_synthesis: Vec<SynthesisDefinition>,
    pub transcode: Option<TranscodeConfig>,
    pub transcription: Option<TranscriptionConfig>,
    pub audio_actions: Option<TrackActions>,
    pub subtitle_actions: Option<TrackActions>,
}

impl PhaseDefinition {
    /// A phase with no gates and no operations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            run_if: None,
            skip_when: None,
            on_error: None,
            container: None,
            audio_filter: None,
            subtitle_filter: None,
            attachment_filter: None,
            track_order: None,
            default_flags: None,
            conditional: Vec::new(),
            conditional_match: MatchMode::First,
            audio_synthesis: Vec::new(),
            transcode: None,
            transcription: None,
            audio_actions: None,
            subtitle_actions: None,
        }
    }

    /// Operations this phase defines, in canonical order.
    pub fn operations(&self) -> Vec<OperationType> {
        OperationType::ALL
            .into_iter()
            .filter(|op| self.defines(*op))
            .collect()
    }

    fn defines(&self, op: OperationType) -> bool {
        match op {
            OperationType::Container => self.container.is_some(),
            OperationType::AudioFilter => self.audio_filter.is_some(),
            OperationType::SubtitleFilter => self.subtitle_filter.is_some(),
            OperationType::AttachmentFilter => self.attachment_filter.is_some(),
            OperationType::TrackOrder => self.track_order.is_some(),
            OperationType::DefaultFlags => self.default_flags.is_some(),
            OperationType::Conditional => !self.conditional.is_empty(),
            OperationType::AudioSynthesis => !self.audio_synthesis.is_empty(),
            OperationType::Transcode => self.transcode.is_some(),
            OperationType::Transcription => self.transcription.is_some(),
            OperationType::AudioActions => self.audio_actions.is_some(),
            OperationType::SubtitleActions => self.subtitle_actions.is_some(),
        }
    }

    /// Phases this one refers to through `depends_on` or `run_if`.
    pub fn references(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.depends_on
            .iter()
            .map(|name| ("depends_on", name.as_str()))
            .chain(self.run_if.iter().map(|r| ("run_if", r.phase_name())))
    }
}
