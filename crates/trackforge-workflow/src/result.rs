//! Per-phase and per-file results of a workflow run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use trackforge_common::{RunId, StatsId};

use crate::error::PhaseExecutionError;
use crate::phase::OperationType;
use crate::plan::{ConditionalSummary, PlannedAction, TrackDisposition};
use crate::policy::OnErrorMode;

/// Where a phase ended up for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    Pending,
    Skipped,
    Completed,
    Failed,
}

impl PhaseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Skipped => "skipped",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate that caused a phase to be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReasonKind {
    Dependency,
    SkipWhen,
    RunIf,
    ErrorMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReason {
    pub kind: SkipReasonKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_value: Option<String>,
    /// Phase the reason refers to, for dependency and run-if skips.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency: Option<String>,
}

impl SkipReason {
    pub fn dependency(name: &str, outcome: PhaseOutcome) -> Self {
        Self {
            kind: SkipReasonKind::Dependency,
            message: format!("dependency '{}' did not complete (outcome: {})", name, outcome),
            condition_name: None,
            condition_value: None,
            dependency: Some(name.to_string()),
        }
    }

    pub fn skip_when(
        message: impl Into<String>,
        condition_name: impl Into<String>,
        condition_value: impl Into<String>,
    ) -> Self {
        Self {
            kind: SkipReasonKind::SkipWhen,
            message: message.into(),
            condition_name: Some(condition_name.into()),
            condition_value: Some(condition_value.into()),
            dependency: None,
        }
    }

    pub fn not_modified(name: &str) -> Self {
        Self {
            kind: SkipReasonKind::RunIf,
            message: format!("'{}' made no modifications", name),
            condition_name: Some("phase_modified".into()),
            condition_value: Some(name.to_string()),
            dependency: Some(name.to_string()),
        }
    }

    pub fn not_completed(name: &str, outcome: PhaseOutcome) -> Self {
        Self {
            kind: SkipReasonKind::RunIf,
            message: format!("'{}' did not complete (outcome: {})", name, outcome),
            condition_name: Some("phase_completed".into()),
            condition_value: Some(name.to_string()),
            dependency: Some(name.to_string()),
        }
    }

    pub fn error_mode(failed_phase: &str) -> Self {
        Self {
            kind: SkipReasonKind::ErrorMode,
            message: format!("phase '{}' failed (on_error='skip')", failed_phase),
            condition_name: None,
            condition_value: None,
            dependency: Some(failed_phase.to_string()),
        }
    }
}

/// What one phase did (or would do, in a dry run) to one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_name: String,
    pub success: bool,
    pub duration_seconds: f64,
    pub operations_executed: Vec<OperationType>,
    pub changes_made: usize,
    pub message: Option<String>,
    pub error: Option<String>,
    pub outcome: PhaseOutcome,
    pub skip_reason: Option<SkipReason>,
    pub file_modified: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planned_actions: Vec<PlannedAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dispositions: Vec<TrackDisposition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<ConditionalSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PhaseResult {
    /// Completed result with nothing attached yet.
    pub fn completed(phase_name: impl Into<String>) -> Self {
        Self {
            phase_name: phase_name.into(),
            success: true,
            duration_seconds: 0.0,
            operations_executed: Vec::new(),
            changes_made: 0,
            message: None,
            error: None,
            outcome: PhaseOutcome::Completed,
            skip_reason: None,
            file_modified: false,
            planned_actions: Vec::new(),
            dispositions: Vec::new(),
            conditional: None,
            warnings: Vec::new(),
        }
    }

    /// Skipped phases count as successful and never modify the file.
    pub fn skipped(phase_name: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            message: Some(format!("Skipped: {}", reason.message)),
            outcome: PhaseOutcome::Skipped,
            skip_reason: Some(reason),
            ..Self::completed(phase_name)
        }
    }

    pub fn failed(error: &PhaseExecutionError, duration_seconds: f64) -> Self {
        Self {
            success: false,
            duration_seconds,
            message: Some(error.message.clone()),
            error: Some(error.to_string()),
            outcome: PhaseOutcome::Failed,
            ..Self::completed(error.phase.clone())
        }
    }
}

/// Why a file's run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A phase failed and the error mode stopped the run.
    PhaseError,
    /// The file could not be re-read after a modification.
    Reintrospection,
}

/// Structured description of an aborted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFailure {
    pub phase: String,
    pub mode: OnErrorMode,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of running a policy against one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProcessingResult {
    pub run_id: RunId,
    pub file_path: PathBuf,
    pub success: bool,
    pub dry_run: bool,
    pub phase_results: Vec<PhaseResult>,
    pub total_duration_seconds: f64,
    pub total_changes: usize,
    pub phases_completed: usize,
    pub phases_failed: usize,
    pub phases_skipped: usize,
    pub failed_phase: Option<String>,
    pub error_message: Option<String>,
    pub failure: Option<WorkflowFailure>,
    /// Final outcome of every phase in scope, including ones never reached.
    pub outcomes: BTreeMap<String, PhaseOutcome>,
    pub stats_id: Option<StatsId>,
    /// Backup left behind because the run did not succeed.
    pub backup_path: Option<PathBuf>,
}

impl FileProcessingResult {
    /// Result for a file whose phases finished, tallying phase results.
    pub fn from_phases(
        run_id: RunId,
        file_path: PathBuf,
        dry_run: bool,
        phase_results: Vec<PhaseResult>,
        outcomes: BTreeMap<String, PhaseOutcome>,
        total_duration_seconds: f64,
    ) -> Self {
        let count = |outcome: PhaseOutcome| {
            phase_results
                .iter()
                .filter(|r| r.outcome == outcome)
                .count()
        };
        let phases_completed = count(PhaseOutcome::Completed);
        let phases_failed = count(PhaseOutcome::Failed);
        let phases_skipped = count(PhaseOutcome::Skipped);
        let total_changes = phase_results.iter().map(|r| r.changes_made).sum();
        let first_failure = phase_results
            .iter()
            .find(|r| r.outcome == PhaseOutcome::Failed);
        let failed_phase = first_failure.map(|r| r.phase_name.clone());
        let error_message = first_failure.and_then(|r| r.message.clone());

        Self {
            run_id,
            file_path,
            success: phases_failed == 0,
            dry_run,
            total_duration_seconds,
            total_changes,
            phases_completed,
            phases_failed,
            phases_skipped,
            failed_phase,
            error_message,
            failure: None,
            outcomes,
            stats_id: None,
            backup_path: None,
            phase_results,
        }
    }

    /// Attach the reason the run stopped; the file is then unsuccessful.
    pub fn with_failure(mut self, failure: WorkflowFailure) -> Self {
        self.success = false;
        if self.failed_phase.is_none() {
            self.failed_phase = Some(failure.phase.clone());
        }
        self.error_message = Some(failure.message.clone());
        self.failure = Some(failure);
        self
    }
}
