use tracing::debug;
use trackforge_common::{languages_match, normalize_language, TrackType};

use super::PlanContext;
use crate::phase::TranscriptionConfig;
use crate::plan::{Plan, PlannedAction};

/// Retag audio tracks whose detected language is confident enough and
/// differs from the current tag.
///
/// Results are keyed by track id; tracks without an id are looked up by
/// their index.
pub fn plan_transcription(config: &TranscriptionConfig, ctx: &PlanContext<'_>) -> Plan {
    let mut plan = Plan::default();
    if !config.update_language {
        return plan;
    }
    let Some(results) = ctx.language_results.filter(|r| !r.is_empty()) else {
        plan.warnings
            .push("No language analysis results available; transcription skipped".into());
        return plan;
    };

    for track in ctx.tracks_of(TrackType::Audio) {
        let key = track.id.unwrap_or(i64::from(track.index));
        let Some(analysis) = results.get(&key) else {
            continue;
        };
        if analysis.primary_percentage < config.confidence_threshold {
            debug!(
                "track[{}]: detected {} below threshold ({:.2} < {:.2})",
                track.index,
                analysis.primary_language,
                analysis.primary_percentage,
                config.confidence_threshold
            );
            continue;
        }
        let current = track.language.as_deref().unwrap_or("und");
        if languages_match(Some(current), Some(&analysis.primary_language)) {
            continue;
        }
        plan.push(PlannedAction::SetLanguage {
            index: track.index,
            from: track.language.clone(),
            to: normalize_language(Some(&analysis.primary_language)),
        });
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::test_support::{make_context, make_snapshot};
    use crate::policy::GlobalConfig;
    use std::collections::HashSet;
    use trackforge_common::Track;
    use trackforge_rules::{LanguageAnalysis, LanguageClassification, LanguageResults};

    fn analysis(language: &str, percentage: f64) -> LanguageAnalysis {
        LanguageAnalysis {
            primary_language: language.into(),
            primary_percentage: percentage,
            secondary_languages: Vec::new(),
            classification: LanguageClassification::SingleLanguage,
        }
    }

    const CONFIG: TranscriptionConfig = TranscriptionConfig {
        update_language: true,
        confidence_threshold: 0.8,
    };

    #[test]
    fn test_updates_confident_mismatches() {
        let snapshot = make_snapshot(vec![
            Track::new(1, TrackType::Audio).with_language("und").with_id(10),
            Track::new(2, TrackType::Audio).with_language("eng").with_id(11),
            Track::new(3, TrackType::Audio).with_language("und").with_id(12),
            Track::new(4, TrackType::Audio).with_language("ger"),
        ]);
        let results: LanguageResults = [
            (10, analysis("ja", 0.95)),
            (11, analysis("en", 0.99)),
            (12, analysis("fre", 0.5)),
            (4, analysis("deu", 0.9)),
        ]
        .into_iter()
        .collect();
        let config = GlobalConfig::default();
        let removed = HashSet::new();
        let mut ctx = make_context(&snapshot, &config, &removed);
        ctx.language_results = Some(&results);

        let plan = plan_transcription(&CONFIG, &ctx);
        assert_eq!(
            plan.actions,
            vec![PlannedAction::SetLanguage {
                index: 1,
                from: Some("und".into()),
                to: "jpn".into(),
            }]
        );
    }

    #[test]
    fn test_no_results_warns() {
        let snapshot = make_snapshot(vec![Track::new(1, TrackType::Audio)]);
        let config = GlobalConfig::default();
        let removed = HashSet::new();
        let plan = plan_transcription(&CONFIG, &make_context(&snapshot, &config, &removed));
        assert!(plan.actions.is_empty());
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn test_disabled() {
        let snapshot = make_snapshot(vec![Track::new(1, TrackType::Audio)]);
        let config = GlobalConfig::default();
        let removed = HashSet::new();
        let disabled = TranscriptionConfig {
            update_language: false,
            ..CONFIG
        };
        let plan = plan_transcription(&disabled, &make_context(&snapshot, &config, &removed));
        assert!(plan.is_empty() && plan.warnings.is_empty());
    }
}
