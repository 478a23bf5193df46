//! Policy model: global settings plus an ordered list of phases.

use std::fmt;

use serde::{Deserialize, Serialize};
use trackforge_rules::CommentaryPatterns;

use crate::error::ValidationError;
use crate::phase::PhaseDefinition;
use crate::validation::validate_phases;

/// What happens to the rest of a file's phases after one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnErrorMode {
    /// Carry on with the next phase.
    #[default]
    Continue,
    /// Mark the remaining phases skipped and stop.
    Skip,
    /// Stop immediately, leaving the remaining phases pending.
    Fail,
}

impl OnErrorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Skip => "skip",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for OnErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every phase.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Preferred audio languages, most preferred first.
    pub audio_languages: Vec<String>,
    /// Preferred subtitle languages, most preferred first.
    pub subtitle_languages: Vec<String>,
    pub commentary: CommentaryPatterns,
    pub on_error: OnErrorMode,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            audio_languages: vec!["eng".into(), "und".into()],
            subtitle_languages: vec!["eng".into(), "und".into()],
            commentary: CommentaryPatterns::default(),
            on_error: OnErrorMode::Continue,
        }
    }
}

/// A validated policy.
#[derive(Debug, Clone)]
pub struct Policy {
    pub name: String,
    pub description: Option<String>,
    pub config: GlobalConfig,
    phases: Vec<PhaseDefinition>,
}

impl Policy {
    /// Build a policy, checking phase names and the phase reference graph.
    pub fn new(
        name: impl Into<String>,
        config: GlobalConfig,
        phases: Vec<PhaseDefinition>,
    ) -> Result<Self, ValidationError> {
        validate_phases(&phases)?;
        Ok(Self {
            name: name.into(),
            description: None,
            config,
            phases,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn phases(&self) -> &[PhaseDefinition] {
        &self.phases
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Error mode for a phase: its own override, else the global one.
    pub fn on_error_for(&self, phase: &PhaseDefinition) -> OnErrorMode {
        phase.on_error.unwrap_or(self.config.on_error)
    }
}
