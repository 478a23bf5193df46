//! Runs the operations of one phase against one file.
//!
//! Operations are planned in canonical order from the snapshot taken at the
//! start of the phase. Tracks removed by an earlier operation are invisible
//! to later ones. Each non-empty plan goes to the first capable executor,
//! unless this is a dry run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use trackforge_common::{normalize_container_format, FileSnapshot};
use trackforge_rules::{ClassificationResults, LanguageResults};

use crate::backup::{FileBackup, DEFAULT_BACKUP_SUFFIX};
use crate::error::PhaseExecutionError;
use crate::executor::{select_executor, Executor};
use crate::phase::{OperationType, PhaseDefinition};
use crate::plan::{Plan, SkipFlags};
use crate::planner::{plan_operation, PlanContext, PlanOutcome};
use crate::policy::GlobalConfig;
use crate::result::PhaseResult;

/// Read-only inputs for one phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInput<'a> {
    pub snapshot: &'a FileSnapshot,
    pub config: &'a GlobalConfig,
    pub language_results: Option<&'a LanguageResults>,
    pub classification_results: Option<&'a ClassificationResults>,
}

/// Per-file state carried from one phase to the next.
#[derive(Debug)]
pub struct FileState {
    /// Where the file currently lives; executors may move it.
    pub path: PathBuf,
    /// Taken before the first executor call of a non-dry run.
    pub backup: Option<FileBackup>,
    /// Flags set by conditional rules; they stay set for the rest of the file.
    pub skip_flags: SkipFlags,
}

impl FileState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup: None,
            skip_flags: SkipFlags::default(),
        }
    }
}

/// Executes phases, delegating file changes to executors.
pub struct PhaseExecutor {
    executors: Vec<Arc<dyn Executor>>,
    dry_run: bool,
    backup_suffix: String,
}

impl PhaseExecutor {
    pub fn new(executors: Vec<Arc<dyn Executor>>) -> Self {
        Self {
            executors,
            dry_run: false,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
        }
    }

    /// Builder: plan only, never call an executor.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run every operation the phase defines.
    ///
    /// # Errors
    ///
    /// Returns the first operation failure: a conditional `fail` action, a
    /// plan no executor can apply, a failed backup, or an executor error.
    pub fn execute(
        &self,
        phase: &PhaseDefinition,
        input: &PhaseInput<'_>,
        state: &mut FileState,
    ) -> Result<PhaseResult, PhaseExecutionError> {
        let started = Instant::now();
        let operations = phase.operations();
        let mut result = PhaseResult::completed(&phase.name);

        if operations.is_empty() {
            result.message = Some("Phase has no operations defined".into());
            return Ok(result);
        }

        let names: Vec<&str> = operations.iter().map(|op| op.as_str()).collect();
        info!(
            "Executing phase '{}' with {} operation(s): {}",
            phase.name,
            operations.len(),
            names.join(", ")
        );

        let mut container = normalize_container_format(&input.snapshot.container());
        let mut removed: HashSet<u32> = HashSet::new();
        let mut filters_planned = false;

        for op in operations {
            if op.is_filter() {
                if filters_planned {
                    result.operations_executed.push(op);
                    continue;
                }
                filters_planned = true;
            }

            let ctx = PlanContext {
                snapshot: input.snapshot,
                config: input.config,
                language_results: input.language_results,
                classification_results: input.classification_results,
                removed: &removed,
                skip_flags: state.skip_flags,
            };
            let outcome = plan_operation(op, phase, &ctx)
                .map_err(|failure| PhaseExecutionError::in_operation(&phase.name, op, failure.to_string()))?;

            let plan = match outcome {
                PlanOutcome::Constraint(message) => {
                    warn!(phase = %phase.name, "{}: {}", op, message);
                    result.warnings.push(message);
                    result.operations_executed.push(op);
                    continue;
                }
                PlanOutcome::Planned(plan) => plan,
            };

            state.skip_flags.merge(plan.skip_flags);
            removed.extend(plan.removed_indices());

            let changes = plan.changes();
            if changes > 0 {
                self.apply(phase, op, &plan, &container, state)?;
                if let Some(change) = &plan.container_change {
                    container = change.to.clone();
                }
            } else {
                debug!(phase = %phase.name, "{}: no changes needed", op);
            }

            result.changes_made += changes;
            result.planned_actions.extend(plan.actions);
            result.dispositions.extend(plan.dispositions);
            result.warnings.extend(plan.warnings);
            if plan.conditional.is_some() {
                result.conditional = plan.conditional;
            }
            result.operations_executed.push(op);
        }

        result.file_modified = result.changes_made > 0;
        result.duration_seconds = started.elapsed().as_secs_f64();
        result.message = Some(format!(
            "Completed {} operation(s)",
            result.operations_executed.len()
        ));
        Ok(result)
    }

    fn apply(
        &self,
        phase: &PhaseDefinition,
        op: OperationType,
        plan: &Plan,
        container: &str,
        state: &mut FileState,
    ) -> Result<(), PhaseExecutionError> {
        if self.dry_run {
            info!("[DRY-RUN] Would apply {} changes for {}", plan.changes(), op);
            return Ok(());
        }

        let executor = select_executor(&self.executors, plan, container).ok_or_else(|| {
            PhaseExecutionError::in_operation(
                &phase.name,
                op,
                format!("No executor available for {} (container={})", op, container),
            )
        })?;

        if state.backup.is_none() {
            let backup = FileBackup::create(&state.path, &self.backup_suffix).map_err(|e| {
                error!("Backup of {} failed: {}", state.path.display(), e);
                PhaseExecutionError::in_operation(
                    &phase.name,
                    op,
                    "Cannot proceed: backup creation failed (check disk space/permissions)",
                )
            })?;
            state.backup = Some(backup);
        }

        info!("Applying {} change(s) for {} with {}", plan.changes(), op, executor.name());
        let report = executor
            .execute(&state.path, plan)
            .map_err(|e| PhaseExecutionError::in_operation(&phase.name, op, e.to_string()))?;
        if let Some(output) = report.output_path {
            debug!("{} moved file to {}", executor.name(), output.display());
            state.path = output;
        }
        Ok(())
    }
}
