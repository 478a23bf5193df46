use trackforge_common::{languages_match, Track, TrackType};

use super::PlanContext;
use crate::phase::TrackCategory;
use crate::plan::{Plan, PlannedAction};
use crate::policy::GlobalConfig;

/// Assign a track to the category used for ordering.
pub fn classify_track(track: &Track, config: &GlobalConfig) -> TrackCategory {
    let commentary = config.commentary.is_commentary(track.title.as_deref());
    match track.track_type {
        TrackType::Video => TrackCategory::Video,
        TrackType::Audio if commentary => TrackCategory::AudioCommentary,
        TrackType::Audio => {
            if preference_rank(track, &config.audio_languages).is_some() {
                TrackCategory::AudioMain
            } else {
                TrackCategory::AudioAlternate
            }
        }
        TrackType::Subtitle if commentary => TrackCategory::SubtitleCommentary,
        TrackType::Subtitle if track.is_forced => TrackCategory::SubtitleForced,
        TrackType::Subtitle => TrackCategory::SubtitleMain,
        TrackType::Attachment => TrackCategory::Attachment,
    }
}

fn preference_rank(track: &Track, languages: &[String]) -> Option<usize> {
    let lang = track.language.as_deref().unwrap_or("und");
    languages
        .iter()
        .position(|pref| languages_match(Some(lang), Some(pref)))
}

/// Track indices sorted by category, then language preference, then
/// original position.
///
/// Categories missing from `order` sort after every listed one.
pub fn desired_order(tracks: &[&Track], order: &[TrackCategory], config: &GlobalConfig) -> Vec<u32> {
    let mut keyed: Vec<((usize, usize, usize), u32)> = tracks
        .iter()
        .enumerate()
        .map(|(position, track)| {
            let category = classify_track(track, config);
            let slot = order
                .iter()
                .position(|c| *c == category)
                .unwrap_or(order.len());
            let rank = match category {
                TrackCategory::AudioMain => preference_rank(track, &config.audio_languages),
                TrackCategory::SubtitleMain => preference_rank(track, &config.subtitle_languages),
                _ => None,
            }
            .unwrap_or(999);
            ((slot, rank, position), track.index)
        })
        .collect();
    keyed.sort_by_key(|(key, _)| *key);
    keyed.into_iter().map(|(_, index)| index).collect()
}

pub fn plan_track_order(order: &[TrackCategory], ctx: &PlanContext<'_>) -> Plan {
    let tracks: Vec<&Track> = ctx.tracks().collect();
    let current: Vec<u32> = tracks.iter().map(|t| t.index).collect();
    let desired = desired_order(&tracks, order, ctx.config);

    let mut plan = Plan::default();
    if desired != current {
        plan.push(PlannedAction::Reorder {
            from: current,
            to: desired,
        });
    }
    plan
}
