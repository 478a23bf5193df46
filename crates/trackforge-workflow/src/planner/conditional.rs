//! Conditional rules: evaluate `when`, then plan the chosen branch.

use tracing::{debug, warn};
use trackforge_common::{languages_match, FileSnapshot, Track, TrackType};
use trackforge_rules::evaluate;

use super::{PlanContext, RuleFailure};
use crate::phase::{ConditionalRule, MatchMode, RuleAction, SkipTarget, ValueSource};
use crate::plan::{Branch, ConditionalSummary, Plan, PlannedAction, RuleEvaluation};

fn substitute(template: &str, snapshot: &FileSnapshot, rule_name: &str) -> String {
    template
        .replace("{filename}", &snapshot.file_name())
        .replace("{path}", &snapshot.path.display().to_string())
        .replace("{rule_name}", rule_name)
}

/// Look up a plugin field, ignoring case in both plugin and field names.
fn plugin_value(snapshot: &FileSnapshot, plugin: &str, field: &str) -> Option<String> {
    let metadata = snapshot.plugin_metadata.as_ref()?;
    let fields = metadata
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(plugin))
        .map(|(_, fields)| fields)?;
    let value = fields
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(field))
        .map(|(_, value)| value)?;
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn resolve(source: &ValueSource, snapshot: &FileSnapshot) -> Option<String> {
    match source {
        ValueSource::Literal(value) => Some(value.clone()),
        ValueSource::PluginMetadata { plugin, field } => {
            let value = plugin_value(snapshot, plugin, field);
            if value.is_none() {
                warn!(
                    "Plugin metadata {}.{} not available for {}",
                    plugin,
                    field,
                    snapshot.path.display()
                );
            }
            value
        }
    }
}

/// Tracks of a type, optionally restricted to a language. Tracks without a
/// language never match a language filter.
fn matching_tracks<'a>(
    ctx: &PlanContext<'a>,
    track_type: TrackType,
    language: Option<&str>,
) -> Vec<&'a Track> {
    ctx.tracks_of(track_type)
        .filter(|t| match language {
            Some(lang) => t.language.is_some() && languages_match(t.language.as_deref(), Some(lang)),
            None => true,
        })
        .collect()
}

fn apply_actions(
    rule: &ConditionalRule,
    actions: &[RuleAction],
    ctx: &PlanContext<'_>,
    plan: &mut Plan,
) -> Result<(), RuleFailure> {
    let snapshot = ctx.snapshot;
    for action in actions {
        match action {
            RuleAction::Skip(target) => match target {
                SkipTarget::VideoTranscode => plan.skip_flags.skip_video_transcode = true,
                SkipTarget::AudioTranscode => plan.skip_flags.skip_audio_transcode = true,
                SkipTarget::TrackFilter => plan.skip_flags.skip_track_filter = true,
            },
            RuleAction::Warn(template) => {
                plan.warnings.push(substitute(template, snapshot, &rule.name));
            }
            RuleAction::Fail(template) => {
                return Err(RuleFailure {
                    rule: rule.name.clone(),
                    message: substitute(template, snapshot, &rule.name),
                });
            }
            RuleAction::SetForced {
                track_type,
                language,
                value,
            } => {
                let targets: Vec<u32> = matching_tracks(ctx, *track_type, language.as_deref())
                    .into_iter()
                    .filter(|t| t.is_forced != *value)
                    .map(|t| t.index)
                    .collect();
                for index in targets {
                    plan.push(PlannedAction::SetForced {
                        index,
                        value: *value,
                    });
                }
            }
            RuleAction::SetDefault {
                track_type,
                language,
                value,
            } => {
                // only one track of a type can be default
                let first = matching_tracks(ctx, *track_type, language.as_deref())
                    .into_iter()
                    .next();
                if let Some(track) = first.filter(|t| t.is_default != *value) {
                    plan.push(PlannedAction::SetDefault {
                        index: track.index,
                        value: *value,
                    });
                }
            }
            RuleAction::SetLanguage {
                track_type,
                source,
                match_language,
            } => {
                let Some(language) = resolve(source, snapshot) else {
                    continue;
                };
                let changes: Vec<(u32, Option<String>)> =
                    matching_tracks(ctx, *track_type, match_language.as_deref())
                        .into_iter()
                        .filter(|t| !languages_match(t.language.as_deref(), Some(&language)))
                        .map(|t| (t.index, t.language.clone()))
                        .collect();
                for (index, from) in changes {
                    plan.push(PlannedAction::SetLanguage {
                        index,
                        from,
                        to: language.clone(),
                    });
                }
            }
            RuleAction::SetContainerMetadata { field, source } => {
                let Some(value) = resolve(source, snapshot) else {
                    continue;
                };
                let current = snapshot
                    .container_tags
                    .as_ref()
                    .and_then(|tags| {
                        tags.iter()
                            .find(|(key, _)| key.eq_ignore_ascii_case(field))
                            .map(|(_, v)| v.as_str())
                    })
                    .unwrap_or_default();
                if current != value {
                    plan.push(PlannedAction::SetContainerTag {
                        field: field.clone(),
                        value,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Evaluate rules in order and plan the actions of the branches that run.
///
/// In [`MatchMode::First`] the first rule whose `when` holds runs its `then`
/// branch and evaluation stops; when no rule holds, the last rule's `else`
/// branch runs. In [`MatchMode::All`] every rule runs one branch.
pub fn plan_conditional(
    rules: &[ConditionalRule],
    mode: MatchMode,
    ctx: &PlanContext<'_>,
) -> Result<Plan, RuleFailure> {
    let eval_ctx = ctx.evaluation_context();
    let mut plan = Plan::default();
    let mut summary = ConditionalSummary::default();

    for rule in rules {
        let (matched, trace) = evaluate(&rule.when, &eval_ctx);
        debug!("Rule '{}': {}", rule.name, trace);
        summary.evaluations.push(RuleEvaluation {
            rule_name: rule.name.clone(),
            matched,
            trace,
        });

        match (mode, matched) {
            (_, true) => {
                summary.applied.push((rule.name.clone(), Branch::Then));
                apply_actions(rule, &rule.then_actions, ctx, &mut plan)?;
                if mode == MatchMode::First {
                    break;
                }
            }
            (MatchMode::All, false) => {
                if !rule.else_actions.is_empty() {
                    summary.applied.push((rule.name.clone(), Branch::Else));
                    apply_actions(rule, &rule.else_actions, ctx, &mut plan)?;
                }
            }
            (MatchMode::First, false) => {}
        }
    }

    if mode == MatchMode::First && summary.applied.is_empty() {
        if let Some(rule) = rules.last().filter(|r| !r.else_actions.is_empty()) {
            summary.applied.push((rule.name.clone(), Branch::Else));
            apply_actions(rule, &rule.else_actions, ctx, &mut plan)?;
        }
    }

    plan.conditional = Some(summary);
    Ok(plan)
}
