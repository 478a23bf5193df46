//! Default and forced flag planning.

use std::collections::BTreeMap;

use trackforge_common::{languages_match, Track, TrackType};

use super::PlanContext;
use crate::phase::{DefaultFlagsConfig, TrackActions};
use crate::plan::{Plan, PlannedAction};

/// First non-commentary track in preference order, else the first
/// non-commentary track, else the first track.
fn preferred_track<'a>(
    tracks: &[&'a Track],
    languages: &[String],
    ctx: &PlanContext<'_>,
) -> Option<&'a Track> {
    let main: Vec<&Track> = tracks
        .iter()
        .copied()
        .filter(|t| !ctx.is_commentary(t))
        .collect();
    if main.is_empty() {
        return tracks.first().copied();
    }

    languages
        .iter()
        .find_map(|pref| {
            main.iter().copied().find(|t| {
                languages_match(Some(t.language.as_deref().unwrap_or("und")), Some(pref))
            })
        })
        .or_else(|| main.first().copied())
}

fn audio_matches_preference(audio: &[&Track], ctx: &PlanContext<'_>) -> bool {
    audio.iter().filter(|t| !ctx.is_commentary(t)).any(|t| {
        let lang = t.language.as_deref().unwrap_or("und");
        ctx.config
            .audio_languages
            .iter()
            .any(|pref| languages_match(Some(lang), Some(pref)))
    })
}

/// Mark `chosen` as default and, optionally, every other track as not.
fn assign(
    desired: &mut BTreeMap<u32, bool>,
    tracks: &[&Track],
    chosen: Option<&Track>,
    clear_others: bool,
) {
    if let Some(track) = chosen {
        desired.insert(track.index, true);
    }
    if clear_others {
        for track in tracks {
            desired.entry(track.index).or_insert(false);
        }
    }
}

fn desired_defaults(config: &DefaultFlagsConfig, ctx: &PlanContext<'_>) -> BTreeMap<u32, bool> {
    let video: Vec<&Track> = ctx.tracks_of(TrackType::Video).collect();
    let audio: Vec<&Track> = ctx.tracks_of(TrackType::Audio).collect();
    let subtitles: Vec<&Track> = ctx.tracks_of(TrackType::Subtitle).collect();
    let mut desired = BTreeMap::new();

    if config.set_first_video_default && !video.is_empty() {
        assign(&mut desired, &video, video.first().copied(), config.clear_other_defaults);
    }

    if config.set_preferred_audio_default && !audio.is_empty() {
        let chosen = preferred_track(&audio, &ctx.config.audio_languages, ctx);
        assign(&mut desired, &audio, chosen, config.clear_other_defaults);
    }

    if config.set_preferred_subtitle_default && !subtitles.is_empty() {
        let chosen = preferred_track(&subtitles, &ctx.config.subtitle_languages, ctx);
        assign(&mut desired, &subtitles, chosen, config.clear_other_defaults);
    } else if config.clear_other_defaults {
        for track in &subtitles {
            desired.insert(track.index, false);
        }
    }

    if config.set_subtitle_default_when_audio_differs
        && !subtitles.is_empty()
        && !audio_matches_preference(&audio, ctx)
    {
        let already_set = subtitles
            .iter()
            .any(|t| desired.get(&t.index).copied().unwrap_or(false));
        if !already_set {
            let chosen = preferred_track(&subtitles, &ctx.config.subtitle_languages, ctx);
            assign(&mut desired, &subtitles, chosen, config.clear_other_defaults);
        }
    }

    desired
}

/// Plan default-flag changes; tracks already in the desired state are left alone.
pub fn plan_default_flags(config: &DefaultFlagsConfig, ctx: &PlanContext<'_>) -> Plan {
    let desired = desired_defaults(config, ctx);
    let mut plan = Plan::default();
    for track in ctx.tracks() {
        if let Some(&value) = desired.get(&track.index) {
            if track.is_default != value {
                plan.push(PlannedAction::SetDefault {
                    index: track.index,
                    value,
                });
            }
        }
    }
    plan
}

/// Plan flag and title clearing for every track of one type.
pub fn plan_track_actions(
    track_type: TrackType,
    actions: &TrackActions,
    ctx: &PlanContext<'_>,
) -> Plan {
    let mut plan = Plan::default();
    for track in ctx.tracks_of(track_type) {
        if actions.clear_all_forced && track.is_forced {
            plan.push(PlannedAction::SetForced {
                index: track.index,
                value: false,
            });
        }
        if actions.clear_all_default && track.is_default {
            plan.push(PlannedAction::SetDefault {
                index: track.index,
                value: false,
            });
        }
        if actions.clear_all_titles && track.title.as_deref().is_some_and(|t| !t.is_empty()) {
            plan.push(PlannedAction::ClearTitle { index: track.index });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::test_support::{make_context, make_snapshot};
    use crate::policy::GlobalConfig;
    use std::collections::HashSet;

    fn all_flags() -> DefaultFlagsConfig {
        DefaultFlagsConfig {
            set_first_video_default: true,
            set_preferred_audio_default: true,
            set_preferred_subtitle_default: false,
            clear_other_defaults: true,
            set_subtitle_default_when_audio_differs: false,
        }
    }

    fn plan_for(config: &DefaultFlagsConfig, global: &GlobalConfig, tracks: Vec<Track>) -> Plan {
        let snapshot = make_snapshot(tracks);
        let removed = HashSet::new();
        plan_default_flags(config, &make_context(&snapshot, global, &removed))
    }

    #[test]
    fn test_preferred_audio_becomes_default() {
        let plan = plan_for(
            &all_flags(),
            &GlobalConfig::default(),
            vec![
                Track::new(0, TrackType::Video).as_default(),
                Track::new(1, TrackType::Audio).with_language("fre").as_default(),
                Track::new(2, TrackType::Audio)
                    .with_language("eng")
                    .with_title("Commentary"),
                Track::new(3, TrackType::Audio).with_language("eng"),
            ],
        );
        assert_eq!(
            plan.actions,
            vec![
                PlannedAction::SetDefault {
                    index: 1,
                    value: false
                },
                PlannedAction::SetDefault {
                    index: 3,
                    value: true
                },
            ]
        );
    }

    #[test]
    fn test_all_commentary_falls_back_to_first() {
        let plan = plan_for(
            &all_flags(),
            &GlobalConfig::default(),
            vec![
                Track::new(1, TrackType::Audio).with_title("Commentary"),
                Track::new(2, TrackType::Audio).with_title("Director commentary"),
            ],
        );
        assert_eq!(
            plan.actions,
            vec![PlannedAction::SetDefault {
                index: 1,
                value: true
            }]
        );
    }

    #[test]
    fn test_clear_other_defaults_clears_subtitles() {
        let plan = plan_for(
            &all_flags(),
            &GlobalConfig::default(),
            vec![
                Track::new(1, TrackType::Audio).with_language("eng").as_default(),
                Track::new(2, TrackType::Subtitle).with_language("eng").as_default(),
            ],
        );
        assert_eq!(
            plan.actions,
            vec![PlannedAction::SetDefault {
                index: 2,
                value: false
            }]
        );
    }

    #[test]
    fn test_subtitle_default_when_audio_differs() {
        let config = DefaultFlagsConfig {
            set_subtitle_default_when_audio_differs: true,
            ..all_flags()
        };
        let tracks = || {
            vec![
                Track::new(1, TrackType::Audio).with_language("jpn").as_default(),
                Track::new(2, TrackType::Subtitle).with_language("fre"),
                Track::new(3, TrackType::Subtitle).with_language("eng"),
            ]
        };
        let global = GlobalConfig {
            audio_languages: vec!["eng".into()],
            ..Default::default()
        };
        let plan = plan_for(&config, &global, tracks());
        assert_eq!(
            plan.actions,
            vec![PlannedAction::SetDefault {
                index: 3,
                value: true
            }]
        );

        // audio in a preferred language: subtitles stay off
        let global = GlobalConfig {
            audio_languages: vec!["jpn".into()],
            ..Default::default()
        };
        assert!(plan_for(&config, &global, tracks()).is_empty());
    }

    #[test]
    fn test_track_actions() {
        let snapshot = make_snapshot(vec![
            Track::new(1, TrackType::Subtitle)
                .as_forced()
                .as_default()
                .with_title("Signs"),
            Track::new(2, TrackType::Subtitle).with_title(""),
            Track::new(3, TrackType::Audio).as_default(),
        ]);
        let config = GlobalConfig::default();
        let removed = HashSet::new();
        let actions = TrackActions {
            clear_all_forced: true,
            clear_all_default: true,
            clear_all_titles: true,
        };
        let plan = plan_track_actions(
            TrackType::Subtitle,
            &actions,
            &make_context(&snapshot, &config, &removed),
        );
        assert_eq!(
            plan.actions,
            vec![
                PlannedAction::SetForced {
                    index: 1,
                    value: false
                },
                PlannedAction::SetDefault {
                    index: 1,
                    value: false
                },
                PlannedAction::ClearTitle { index: 1 },
            ]
        );
    }
}
