//! Planned changes for one operation.
//!
//! Planning is pure: it looks at a snapshot and produces a [`Plan`]. Applying
//! the plan is an executor's job.

use std::fmt;

use serde::{Deserialize, Serialize};
use trackforge_common::TrackType;

/// Whether a track survives filtering, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Keep,
    Remove,
}

/// Filter verdict for one track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDisposition {
    pub index: u32,
    pub track_type: TrackType,
    pub language: Option<String>,
    pub disposition: Disposition,
    pub reason: String,
}

/// One change an executor is asked to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannedAction {
    ConvertContainer {
        from: String,
        to: String,
    },
    Reorder {
        from: Vec<u32>,
        to: Vec<u32>,
    },
    SetDefault {
        index: u32,
        value: bool,
    },
    SetForced {
        index: u32,
        value: bool,
    },
    ClearTitle {
        index: u32,
    },
    SetLanguage {
        index: u32,
        from: Option<String>,
        to: String,
    },
    SetContainerTag {
        field: String,
        value: String,
    },
    SynthesizeAudio {
        name: String,
        source_index: u32,
        codec: String,
        channels: u32,
        bitrate: Option<String>,
        title: Option<String>,
        language: Option<String>,
    },
    TranscodeVideo {
        index: u32,
        from: Option<String>,
        to: String,
        max_height: Option<u32>,
    },
}

impl PlannedAction {
    /// Whether applying this action rewrites the file's streams.
    pub fn requires_remux(&self) -> bool {
        matches!(
            self,
            Self::Reorder { .. } | Self::SynthesizeAudio { .. } | Self::TranscodeVideo { .. }
        )
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConvertContainer { from, to } => write!(f, "convert container {} -> {}", from, to),
            Self::Reorder { from, to } => write!(f, "reorder tracks {:?} -> {:?}", from, to),
            Self::SetDefault { index, value } => write!(f, "track[{}] default={}", index, value),
            Self::SetForced { index, value } => write!(f, "track[{}] forced={}", index, value),
            Self::ClearTitle { index } => write!(f, "track[{}] clear title", index),
            Self::SetLanguage { index, from, to } => write!(
                f,
                "track[{}] language {} -> {}",
                index,
                from.as_deref().unwrap_or("und"),
                to
            ),
            Self::SetContainerTag { field, value } if value.is_empty() => {
                write!(f, "clear container tag '{}'", field)
            }
            Self::SetContainerTag { field, value } => {
                write!(f, "container tag '{}' = '{}'", field, value)
            }
            Self::SynthesizeAudio {
                name,
                source_index,
                codec,
                channels,
                ..
            } => write!(
                f,
                "synthesize '{}' from track[{}] ({} {}ch)",
                name, source_index, codec, channels
            ),
            Self::TranscodeVideo {
                index,
                from,
                to,
                max_height,
            } => {
                write!(
                    f,
                    "transcode track[{}] {} -> {}",
                    index,
                    from.as_deref().unwrap_or("unknown"),
                    to
                )?;
                if let Some(height) = max_height {
                    write!(f, " (max {}p)", height)?;
                }
                Ok(())
            }
        }
    }
}

/// Processing steps turned off by conditional rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipFlags {
    pub skip_video_transcode: bool,
    pub skip_audio_transcode: bool,
    pub skip_track_filter: bool,
}

impl SkipFlags {
    pub fn merge(&mut self, other: SkipFlags) {
        self.skip_video_transcode |= other.skip_video_transcode;
        self.skip_audio_transcode |= other.skip_audio_transcode;
        self.skip_track_filter |= other.skip_track_filter;
    }
}

/// Container conversion requested by a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerChange {
    pub from: String,
    pub to: String,
}

/// Outcome of one conditional rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_name: String,
    pub matched: bool,
    pub trace: String,
}

/// Which branch of a rule ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Then,
    Else,
}

/// Summary of a conditional operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalSummary {
    /// Rules whose branch ran, with the branch taken.
    pub applied: Vec<(String, Branch)>,
    pub evaluations: Vec<RuleEvaluation>,
}

impl ConditionalSummary {
    /// Name of the first rule whose `when` held.
    pub fn matched_rule(&self) -> Option<&str> {
        self.applied
            .iter()
            .find(|(_, branch)| *branch == Branch::Then)
            .map(|(name, _)| name.as_str())
    }
}

/// Changes planned by one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<PlannedAction>,
    pub dispositions: Vec<TrackDisposition>,
    pub tracks_removed: usize,
    pub container_change: Option<ContainerChange>,
    pub requires_remux: bool,
    pub warnings: Vec<String>,
    pub skip_flags: SkipFlags,
    pub conditional: Option<ConditionalSummary>,
}

/// Capability an executor needs to apply a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ConvertContainer,
    Remux,
    EditMetadata,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ConvertContainer => "container conversion",
            Self::Remux => "remux",
            Self::EditMetadata => "metadata edit",
        })
    }
}

impl Plan {
    pub fn push(&mut self, action: PlannedAction) {
        if action.requires_remux() {
            self.requires_remux = true;
        }
        if let PlannedAction::ConvertContainer { from, to } = &action {
            self.container_change = Some(ContainerChange {
                from: from.clone(),
                to: to.clone(),
            });
        }
        self.actions.push(action);
    }

    /// Record a filter verdict; removals count as changes.
    pub fn record(&mut self, disposition: TrackDisposition) {
        if disposition.disposition == Disposition::Remove {
            self.tracks_removed += 1;
        }
        self.dispositions.push(disposition);
    }

    /// Number of changes this plan makes to the file.
    pub fn changes(&self) -> usize {
        self.actions.len() + self.tracks_removed
    }

    pub fn is_empty(&self) -> bool {
        self.changes() == 0
    }

    /// Indices of tracks this plan removes.
    pub fn removed_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.dispositions
            .iter()
            .filter(|d| d.disposition == Disposition::Remove)
            .map(|d| d.index)
    }

    /// Strongest capability needed, or `None` for a plan with no changes.
    ///
    /// Container conversion outranks remuxing, which outranks metadata edits.
    pub fn capability(&self) -> Option<Capability> {
        if self.container_change.is_some() {
            Some(Capability::ConvertContainer)
        } else if self.tracks_removed > 0 || self.requires_remux {
            Some(Capability::Remux)
        } else if !self.actions.is_empty() {
            Some(Capability::EditMetadata)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removal(index: u32) -> TrackDisposition {
        TrackDisposition {
            index,
            track_type: TrackType::Audio,
            language: Some("fre".into()),
            disposition: Disposition::Remove,
            reason: "language not in keep list".into(),
        }
    }

    #[test]
    fn test_changes_count_actions_and_removals() {
        let mut plan = Plan::default();
        assert!(plan.is_empty());
        assert_eq!(plan.capability(), None);

        plan.push(PlannedAction::SetDefault {
            index: 1,
            value: true,
        });
        assert_eq!(plan.capability(), Some(Capability::EditMetadata));

        plan.record(removal(2));
        assert_eq!(plan.changes(), 2);
        assert_eq!(plan.capability(), Some(Capability::Remux));
        assert_eq!(plan.removed_indices().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_container_change_outranks_remux() {
        let mut plan = Plan::default();
        plan.push(PlannedAction::Reorder {
            from: vec![0, 2, 1],
            to: vec![0, 1, 2],
        });
        assert!(plan.requires_remux);
        plan.push(PlannedAction::ConvertContainer {
            from: "avi".into(),
            to: "mkv".into(),
        });
        assert_eq!(plan.capability(), Some(Capability::ConvertContainer));
        assert_eq!(plan.container_change.as_ref().unwrap().to, "mkv");
    }

    #[test]
    fn test_action_descriptions() {
        assert_eq!(
            PlannedAction::SetLanguage {
                index: 1,
                from: None,
                to: "jpn".into()
            }
            .to_string(),
            "track[1] language und -> jpn"
        );
        assert_eq!(
            PlannedAction::TranscodeVideo {
                index: 0,
                from: Some("h264".into()),
                to: "hevc".into(),
                max_height: Some(1080),
            }
            .to_string(),
            "transcode track[0] h264 -> hevc (max 1080p)"
        );
        assert_eq!(
            PlannedAction::SetContainerTag {
                field: "title".into(),
                value: String::new()
            }
            .to_string(),
            "clear container tag 'title'"
        );
    }

    #[test]
    fn test_action_serializes_tagged() {
        let json = serde_json::to_value(PlannedAction::ClearTitle { index: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "clear_title", "index": 3}));
    }
}
