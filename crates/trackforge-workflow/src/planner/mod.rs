//! Operation planning.
//!
//! Every operation type has a planner that turns the current snapshot and
//! the phase's configuration into a [`Plan`]. Planners never touch the file
//! and never fail, with one exception: a conditional rule's `fail` action
//! yields a [`RuleFailure`].

mod conditional;
mod filters;
mod flags;
mod order;
mod synthesis;
mod transcode;
mod transcription;

use std::collections::HashSet;

use thiserror::Error;
use trackforge_common::{FileSnapshot, Track, TrackType};
use trackforge_rules::{ClassificationResults, EvaluationContext, LanguageResults};

pub use conditional::plan_conditional;
pub use filters::{is_font_attachment, plan_filters};
pub use flags::{plan_default_flags, plan_track_actions};
pub use order::{classify_track, desired_order, plan_track_order};
pub use synthesis::plan_audio_synthesis;
pub use transcode::{plan_container, plan_transcode};
pub use transcription::plan_transcription;

use crate::phase::{OperationType, PhaseDefinition};
use crate::plan::{Plan, SkipFlags};
use crate::policy::GlobalConfig;

/// A conditional rule asked for the phase to fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule '{rule}' failed: {message}")]
pub struct RuleFailure {
    pub rule: String,
    pub message: String,
}

/// Result of planning one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Planned(Plan),
    /// The policy cannot be satisfied for this file; nothing is changed.
    Constraint(String),
}

impl PlanOutcome {
    pub fn changes(&self) -> usize {
        match self {
            Self::Planned(plan) => plan.changes(),
            Self::Constraint(_) => 0,
        }
    }
}

/// Inputs shared by all planners for one operation.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub snapshot: &'a FileSnapshot,
    pub config: &'a GlobalConfig,
    pub language_results: Option<&'a LanguageResults>,
    pub classification_results: Option<&'a ClassificationResults>,
    /// Tracks already planned for removal earlier in the phase.
    pub removed: &'a HashSet<u32>,
    /// Flags set by conditional rules earlier in the run.
    pub skip_flags: SkipFlags,
}

impl<'a> PlanContext<'a> {
    /// Tracks still present once earlier removals apply, in container order.
    pub fn tracks(&self) -> impl Iterator<Item = &'a Track> {
        let removed = self.removed;
        self.snapshot
            .tracks
            .iter()
            .filter(move |t| !removed.contains(&t.index))
    }

    pub fn tracks_of(&self, track_type: TrackType) -> impl Iterator<Item = &'a Track> {
        self.tracks().filter(move |t| t.track_type == track_type)
    }

    /// Condition context over the full snapshot plus analysis results.
    pub fn evaluation_context(&self) -> EvaluationContext<'a> {
        let mut ctx =
            EvaluationContext::from_snapshot(self.snapshot).with_commentary(&self.config.commentary);
        ctx.language_results = self.language_results;
        ctx.classification_results = self.classification_results;
        ctx
    }

    pub fn is_commentary(&self, track: &Track) -> bool {
        self.config.commentary.is_commentary(track.title.as_deref())
    }
}

/// Plan one operation of a phase.
///
/// Any filter operation plans all three filters in one pass.
pub fn plan_operation(
    op: OperationType,
    phase: &PhaseDefinition,
    ctx: &PlanContext<'_>,
) -> Result<PlanOutcome, RuleFailure> {
    let planned = |plan: Option<Plan>| PlanOutcome::Planned(plan.unwrap_or_default());

    Ok(match op {
        OperationType::Container => planned(phase.container.as_ref().map(|c| plan_container(c, ctx))),
        OperationType::AudioFilter | OperationType::SubtitleFilter | OperationType::AttachmentFilter => {
            plan_filters(phase, ctx)
        }
        OperationType::TrackOrder => planned(
            phase
                .track_order
                .as_deref()
                .map(|order| plan_track_order(order, ctx)),
        ),
        OperationType::DefaultFlags => planned(
            phase
                .default_flags
                .as_ref()
                .map(|flags| plan_default_flags(flags, ctx)),
        ),
        OperationType::Conditional => {
            planned(Some(plan_conditional(&phase.conditional, phase.conditional_match, ctx)?))
        }
        OperationType::AudioSynthesis => planned(Some(plan_audio_synthesis(&phase.audio_synthesis, ctx))),
        OperationType::Transcode => planned(phase.transcode.as_ref().map(|t| plan_transcode(t, ctx))),
        OperationType::Transcription => planned(
            phase
                .transcription
                .as_ref()
                .map(|t| plan_transcription(t, ctx)),
        ),
        OperationType::AudioActions => planned(
            phase
                .audio_actions
                .as_ref()
                .map(|a| plan_track_actions(TrackType::Audio, a, ctx)),
        ),
        OperationType::SubtitleActions => planned(
            phase
                .subtitle_actions
                .as_ref()
                .map(|a| plan_track_actions(TrackType::Subtitle, a, ctx)),
        ),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn make_snapshot(tracks: Vec<Track>) -> FileSnapshot {
        let mut snapshot = FileSnapshot::new("/media/movie.mkv", tracks);
        snapshot.container_format = Some("matroska,webm".into());
        snapshot
    }

    pub fn make_context<'a>(
        snapshot: &'a FileSnapshot,
        config: &'a GlobalConfig,
        removed: &'a HashSet<u32>,
    ) -> PlanContext<'a> {
        PlanContext {
            snapshot,
            config,
            language_results: None,
            classification_results: None,
            removed,
            skip_flags: SkipFlags::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::phase::{ContainerConfig, SubtitleFilterConfig};

    #[test]
    fn test_tracks_excludes_removed() {
        let snapshot = make_snapshot(vec![
            Track::new(0, TrackType::Video),
            Track::new(1, TrackType::Audio),
            Track::new(2, TrackType::Audio),
        ]);
        let config = GlobalConfig::default();
        let removed = HashSet::from([1]);
        let ctx = make_context(&snapshot, &config, &removed);
        let indices: Vec<u32> = ctx.tracks_of(TrackType::Audio).map(|t| t.index).collect();
        assert_eq!(indices, vec![2]);
    }

    #[test]
    fn test_plan_operation_dispatch() {
        let snapshot = make_snapshot(vec![
            Track::new(0, TrackType::Video),
            Track::new(1, TrackType::Subtitle).with_language("fre"),
        ]);
        let config = GlobalConfig::default();
        let removed = HashSet::new();
        let ctx = make_context(&snapshot, &config, &removed);

        let mut phase = PhaseDefinition::new("p");
        phase.container = Some(ContainerConfig {
            target: "mp4".into(),
        });
        phase.subtitle_filter = Some(SubtitleFilterConfig {
            languages: vec!["eng".into()],
            ..Default::default()
        });

        let outcome = plan_operation(OperationType::Container, &phase, &ctx).unwrap();
        assert_eq!(outcome.changes(), 1);

        // every filter op runs the combined pass
        let outcome = plan_operation(OperationType::SubtitleFilter, &phase, &ctx).unwrap();
        assert_eq!(outcome.changes(), 1);

        // unconfigured operation plans nothing
        let outcome = plan_operation(OperationType::Transcode, &phase, &ctx).unwrap();
        assert_eq!(outcome.changes(), 0);
    }
}
