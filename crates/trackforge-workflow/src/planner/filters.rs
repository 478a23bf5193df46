//! Track filtering: which audio, subtitle, and attachment tracks survive.

use tracing::debug;
use trackforge_common::{languages_match, Track, TrackType};

use super::{PlanContext, PlanOutcome};
use crate::phase::{
    AttachmentFilterConfig, AudioFilterConfig, FallbackMode, PhaseDefinition, SubtitleFilterConfig,
};
use crate::plan::{Disposition, Plan, TrackDisposition};

const STYLED_SUBTITLE_CODECS: [&str; 4] = ["ass", "ssa", "ass_subtitle", "ssa_subtitle"];
const FONT_CODECS: [&str; 5] = ["ttf", "otf", "ttc", "woff", "woff2"];
const FONT_MIME_TYPES: [&str; 3] = [
    "application/x-truetype-font",
    "application/x-font-ttf",
    "application/font-sfnt",
];

type Verdict = (Disposition, String);

fn keep(reason: &str) -> Verdict {
    (Disposition::Keep, reason.to_string())
}

fn remove(reason: &str) -> Verdict {
    (Disposition::Remove, reason.to_string())
}

fn disposition(track: &Track, (disposition, reason): Verdict) -> TrackDisposition {
    TrackDisposition {
        index: track.index,
        track_type: track.track_type,
        language: track.language.clone(),
        disposition,
        reason,
    }
}

fn language_listed(track: &Track, languages: &[String]) -> bool {
    let lang = track.language.as_deref().unwrap_or("und");
    languages
        .iter()
        .any(|keep| languages_match(Some(lang), Some(keep)))
}

/// Whether an attachment carries a font, judged by codec or MIME type.
pub fn is_font_attachment(track: &Track) -> bool {
    let codec = track.codec.as_deref().unwrap_or_default().to_lowercase();
    FONT_CODECS.contains(&codec.as_str())
        || codec.starts_with("font/")
        || FONT_MIME_TYPES.contains(&codec.as_str())
}

fn is_styled_subtitle(track: &Track) -> bool {
    let codec = track.codec.as_deref().unwrap_or_default().to_lowercase();
    STYLED_SUBTITLE_CODECS.contains(&codec.as_str())
}

fn audio_verdicts(
    tracks: &[&Track],
    config: &AudioFilterConfig,
) -> Result<Vec<Verdict>, String> {
    let mut verdicts: Vec<Verdict> = tracks
        .iter()
        .map(|t| {
            if language_listed(t, &config.languages) {
                keep("language in keep list")
            } else {
                remove("language not in keep list")
            }
        })
        .collect();

    let kept = verdicts
        .iter()
        .filter(|(d, _)| *d == Disposition::Keep)
        .count();
    if tracks.is_empty() || kept >= config.minimum {
        return Ok(verdicts);
    }

    match config.fallback {
        FallbackMode::None => {
            let file_languages: Vec<&str> = tracks
                .iter()
                .map(|t| t.language.as_deref().unwrap_or("und"))
                .collect();
            Err(format!(
                "Insufficient audio tracks: policy requires {}, only {} would remain \
                 (policy languages: {}; file languages: {})",
                config.minimum,
                kept,
                config.languages.join(", "),
                file_languages.join(", ")
            ))
        }
        FallbackMode::KeepAll => {
            for verdict in &mut verdicts {
                *verdict = keep("fallback: keep_all applied");
            }
            Ok(verdicts)
        }
        FallbackMode::KeepFirst => {
            let mut needed = config.minimum - kept;
            for verdict in &mut verdicts {
                if needed == 0 {
                    break;
                }
                if verdict.0 == Disposition::Remove {
                    *verdict = keep("fallback: keep_first applied");
                    needed -= 1;
                }
            }
            Ok(verdicts)
        }
        FallbackMode::ContentLanguage => {
            let content = tracks[0].language.as_deref().unwrap_or("und");
            for (track, verdict) in tracks.iter().zip(verdicts.iter_mut()) {
                let lang = track.language.as_deref().unwrap_or("und");
                if languages_match(Some(lang), Some(content)) {
                    *verdict = keep("fallback: content language match");
                }
            }
            Ok(verdicts)
        }
    }
}

fn subtitle_verdict(track: &Track, config: &SubtitleFilterConfig, forced_cleared: bool) -> Verdict {
    if config.remove_all {
        remove("remove_all enabled")
    } else if config.preserve_forced && !forced_cleared && track.is_forced {
        keep("forced subtitle preserved")
    } else if config.languages.is_empty() {
        keep("no language filter applied")
    } else if language_listed(track, &config.languages) {
        keep("language in keep list")
    } else {
        remove("language not in keep list")
    }
}

fn attachment_verdict(track: &Track, config: &AttachmentFilterConfig, styled_subs: bool) -> Verdict {
    if !config.remove_all {
        keep("no filter applied")
    } else if styled_subs && is_font_attachment(track) {
        remove("remove_all enabled (font removed, styled subtitles may be affected)")
    } else {
        remove("remove_all enabled")
    }
}

/// Plan the audio, subtitle, and attachment filters of a phase together.
///
/// An audio filter that would keep fewer than `minimum` tracks, with no
/// fallback configured, is reported as a [`PlanOutcome::Constraint`].
pub fn plan_filters(phase: &PhaseDefinition, ctx: &PlanContext<'_>) -> PlanOutcome {
    let mut plan = Plan::default();
    if ctx.skip_flags.skip_track_filter {
        debug!("Track filtering skipped by conditional rule");
        return PlanOutcome::Planned(plan);
    }

    if let Some(config) = &phase.audio_filter {
        let audio: Vec<&Track> = ctx.tracks_of(TrackType::Audio).collect();
        match audio_verdicts(&audio, config) {
            Ok(verdicts) => {
                for (track, verdict) in audio.iter().zip(verdicts) {
                    plan.record(disposition(track, verdict));
                }
            }
            Err(message) => return PlanOutcome::Constraint(message),
        }
    }

    if let Some(config) = &phase.subtitle_filter {
        let forced_cleared = phase
            .subtitle_actions
            .is_some_and(|actions| actions.clear_all_forced);
        for track in ctx.tracks_of(TrackType::Subtitle) {
            plan.record(disposition(track, subtitle_verdict(track, config, forced_cleared)));
        }
    }

    if let Some(config) = &phase.attachment_filter {
        let styled_subs = ctx
            .tracks_of(TrackType::Subtitle)
            .filter(|t| !plan.removed_indices().any(|i| i == t.index))
            .any(is_styled_subtitle);
        let mut fonts_removed = 0;
        for track in ctx.tracks_of(TrackType::Attachment) {
            let verdict = attachment_verdict(track, config, styled_subs);
            if verdict.0 == Disposition::Remove && styled_subs && is_font_attachment(track) {
                fonts_removed += 1;
            }
            plan.record(disposition(track, verdict));
        }
        if fonts_removed > 0 {
            plan.warnings.push(format!(
                "Removing {} font attachment(s) while styled subtitles remain; rendering may be affected",
                fonts_removed
            ));
        }
    }

    PlanOutcome::Planned(plan)
}
