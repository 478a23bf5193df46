use tracing::debug;
use trackforge_common::{codecs_match, languages_match, Track, TrackType};
use trackforge_rules::evaluate;

use super::PlanContext;
use crate::phase::SynthesisDefinition;
use crate::plan::{Plan, PlannedAction};

/// Best source for a synthesized track: non-commentary audio, preferring the
/// requested language, then enough channels, then the most channels.
fn select_source<'a>(
    audio: &[&'a Track],
    definition: &SynthesisDefinition,
    ctx: &PlanContext<'_>,
) -> Option<&'a Track> {
    let language = definition
        .language
        .as_deref()
        .filter(|lang| !lang.eq_ignore_ascii_case("inherit"));
    audio
        .iter()
        .copied()
        .filter(|t| !ctx.is_commentary(t))
        .enumerate()
        .max_by_key(|(position, t)| {
            let lang_match = language.is_some_and(|lang| {
                t.language.is_some() && languages_match(t.language.as_deref(), Some(lang))
            });
            let channels = t.channels.unwrap_or(2);
            (
                lang_match,
                channels >= definition.channels,
                channels,
                std::cmp::Reverse(*position),
            )
        })
        .map(|(_, t)| t)
}

pub fn plan_audio_synthesis(definitions: &[SynthesisDefinition], ctx: &PlanContext<'_>) -> Plan {
    let mut plan = Plan::default();
    if ctx.skip_flags.skip_audio_transcode {
        debug!("Audio synthesis skipped by conditional rule");
        return plan;
    }

    let audio: Vec<&Track> = ctx.tracks_of(TrackType::Audio).collect();
    let eval_ctx = ctx.evaluation_context();

    for definition in definitions {
        if let Some(condition) = &definition.create_if {
            let (create, trace) = evaluate(condition, &eval_ctx);
            if !create {
                debug!("Synthesis '{}' not needed: {}", definition.name, trace);
                continue;
            }
        }

        let exists = audio.iter().any(|t| {
            codecs_match(t.codec.as_deref(), &definition.codec)
                && t.channels == Some(definition.channels)
        });
        if exists {
            debug!(
                "Synthesis '{}' skipped: {} {}ch track already present",
                definition.name, definition.codec, definition.channels
            );
            continue;
        }

        let Some(source) = select_source(&audio, definition, ctx) else {
            plan.warnings.push(format!(
                "Synthesis '{}' skipped: no suitable source audio track",
                definition.name
            ));
            continue;
        };

        let source_channels = source.channels.unwrap_or(2);
        if source_channels < definition.channels {
            plan.warnings.push(format!(
                "Synthesis '{}' skipped: cannot upmix {}ch source track[{}] to {}ch",
                definition.name, source_channels, source.index, definition.channels
            ));
            continue;
        }

        let language = match definition.language.as_deref() {
            None => source.language.clone(),
            Some(lang) if lang.eq_ignore_ascii_case("inherit") => source.language.clone(),
            Some(lang) => Some(lang.to_string()),
        };
        plan.push(PlannedAction::SynthesizeAudio {
            name: definition.name.clone(),
            source_index: source.index,
            codec: definition.codec.clone(),
            channels: definition.channels,
            bitrate: definition.bitrate.clone(),
            title: definition.title.clone(),
            language,
        });
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::test_support::{make_context, make_snapshot};
    use crate::policy::GlobalConfig;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use trackforge_rules::parse_expression;

    fn stereo_aac() -> SynthesisDefinition {
        SynthesisDefinition {
            name: "stereo".into(),
            codec: "aac".into(),
            channels: 2,
            bitrate: Some("192k".into()),
            title: Some("Stereo".into()),
            language: None,
            create_if: None,
        }
    }

    fn run(definitions: &[SynthesisDefinition], tracks: Vec<Track>) -> Plan {
        let snapshot = make_snapshot(tracks);
        let config = GlobalConfig::default();
        let removed = HashSet::new();
        plan_audio_synthesis(definitions, &make_context(&snapshot, &config, &removed))
    }

    #[test]
    fn test_synthesizes_from_best_source() {
        let plan = run(
            &[SynthesisDefinition {
                language: Some("eng".into()),
                ..stereo_aac()
            }],
            vec![
                Track::new(1, TrackType::Audio)
                    .with_codec("truehd")
                    .with_language("eng")
                    .with_channels(8),
                Track::new(2, TrackType::Audio)
                    .with_codec("ac3")
                    .with_language("eng")
                    .with_channels(6)
                    .with_title("Commentary"),
                Track::new(3, TrackType::Audio)
                    .with_codec("dts")
                    .with_language("jpn")
                    .with_channels(8),
            ],
        );
        assert_matches!(
            plan.actions.as_slice(),
            [PlannedAction::SynthesizeAudio { source_index: 1, channels: 2, language: Some(lang), .. }] if lang == "eng"
        );
        assert!(plan.requires_remux);
    }

    #[test]
    fn test_equivalent_track_exists() {
        let plan = run(
            &[stereo_aac()],
            vec![Track::new(1, TrackType::Audio).with_codec("AAC").with_channels(2)],
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_create_if_false() {
        let definition = SynthesisDefinition {
            create_if: Some(parse_expression("not exists(audio, channels == 2)").unwrap()),
            ..stereo_aac()
        };
        let plan = run(
            &[definition],
            vec![Track::new(1, TrackType::Audio).with_codec("flac").with_channels(2)],
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_no_source_warns() {
        let plan = run(&[stereo_aac()], vec![Track::new(0, TrackType::Video)]);
        assert!(plan.actions.is_empty());
        assert_eq!(
            plan.warnings,
            vec!["Synthesis 'stereo' skipped: no suitable source audio track".to_string()]
        );
    }

    #[test]
    fn test_no_upmix() {
        let definition = SynthesisDefinition {
            codec: "eac3".into(),
            channels: 6,
            ..stereo_aac()
        };
        let plan = run(
            &[definition],
            vec![Track::new(1, TrackType::Audio).with_codec("aac").with_channels(2)],
        );
        assert!(plan.actions.is_empty());
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn test_inherit_language() {
        let definition = SynthesisDefinition {
            language: Some("inherit".into()),
            ..stereo_aac()
        };
        let plan = run(
            &[definition],
            vec![Track::new(4, TrackType::Audio)
                .with_codec("dts")
                .with_language("fre")
                .with_channels(6)],
        );
        assert_matches!(
            plan.actions.as_slice(),
            [PlannedAction::SynthesizeAudio { source_index: 4, language: Some(lang), .. }] if lang == "fre"
        );
    }
}
