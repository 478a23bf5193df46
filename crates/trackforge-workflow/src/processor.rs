//! The workflow orchestrator: runs a policy's phases against files.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use trackforge_common::{FileSnapshot, RunId, TrackType};
use trackforge_rules::{ClassificationResults, LanguageResults};

use crate::backup::DEFAULT_BACKUP_SUFFIX;
use crate::error::{ReintrospectionError, Result, WorkflowError};
use crate::executor::Executor;
use crate::phase::{PhaseDefinition, RunIf};
use crate::phase_executor::{FileState, PhaseExecutor, PhaseInput};
use crate::policy::{OnErrorMode, Policy};
use crate::provider::MetadataProvider;
use crate::result::{
    FailureKind, FileProcessingResult, PhaseOutcome, PhaseResult, SkipReason, WorkflowFailure,
};
use crate::skip::evaluate_skip_when;
use crate::stats::{ProcessingStats, StatsSink};

/// Progress report sent before each phase starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowProgress {
    pub file_path: PathBuf,
    pub current_phase: String,
    /// 0-based index among the phases in scope.
    pub phase_index: usize,
    pub total_phases: usize,
}

/// Sender for workflow progress reports.
pub struct ProgressSender {
    callback: Box<dyn Fn(&WorkflowProgress) + Send + Sync>,
}

impl ProgressSender {
    pub fn new(callback: impl Fn(&WorkflowProgress) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A sender that discards all reports.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn send(&self, progress: &WorkflowProgress) {
        (self.callback)(progress);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Everything one `process_file` call tracks for its file.
struct WorkflowRun {
    run_id: RunId,
    file_path: PathBuf,
    started: Instant,
    started_at: DateTime<Utc>,
    state: FileState,
    snapshot: FileSnapshot,
    before: (Option<u64>, usize),
    language_results: Option<LanguageResults>,
    classification_results: Option<ClassificationResults>,
    outcomes: BTreeMap<String, PhaseOutcome>,
    modified: HashMap<String, bool>,
    results: Vec<PhaseResult>,
    failure: Option<WorkflowFailure>,
}

impl WorkflowRun {
    fn new(file_path: &Path, snapshot: FileSnapshot, phases: &[&PhaseDefinition]) -> Self {
        Self {
            run_id: RunId::new(),
            file_path: file_path.to_path_buf(),
            started: Instant::now(),
            started_at: Utc::now(),
            state: FileState::new(file_path),
            before: (snapshot.size_bytes, snapshot.tracks.len()),
            snapshot,
            language_results: None,
            classification_results: None,
            outcomes: phases
                .iter()
                .map(|p| (p.name.clone(), PhaseOutcome::Pending))
                .collect(),
            modified: HashMap::new(),
            results: Vec::new(),
            failure: None,
        }
    }

    fn outcome(&self, phase: &str) -> PhaseOutcome {
        self.outcomes
            .get(phase)
            .copied()
            .unwrap_or(PhaseOutcome::Pending)
    }

    fn record(&mut self, result: PhaseResult) {
        self.outcomes
            .insert(result.phase_name.clone(), result.outcome);
        self.modified
            .insert(result.phase_name.clone(), result.file_modified);
        self.results.push(result);
    }
}

/// Runs a validated policy against files.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trackforge_common::{FileSnapshot, Track, TrackType};
/// use trackforge_workflow::{parse_policy, InMemoryProvider, WorkflowProcessor};
///
/// let policy = parse_policy(r#"
///     [[phases]]
///     name = "clean"
///     [phases.audio_filter]
///     languages = ["eng"]
/// "#).unwrap();
///
/// let provider = InMemoryProvider::new().with_snapshot(FileSnapshot::new(
///     "/media/movie.mkv",
///     vec![
///         Track::new(0, TrackType::Audio).with_language("eng"),
///         Track::new(1, TrackType::Audio).with_language("fre"),
///     ],
/// ));
///
/// let processor = WorkflowProcessor::new(policy, Arc::new(provider)).with_dry_run(true);
/// let result = processor.process_file("/media/movie.mkv").unwrap();
/// assert!(result.success);
/// assert_eq!(result.total_changes, 1);
/// ```
pub struct WorkflowProcessor {
    policy: Policy,
    provider: Arc<dyn MetadataProvider>,
    executors: Vec<Arc<dyn Executor>>,
    stats_sink: Option<Arc<dyn StatsSink>>,
    dry_run: bool,
    backup_suffix: String,
    selected: Option<Vec<String>>,
    progress: ProgressSender,
}

impl WorkflowProcessor {
    pub fn new(policy: Policy, provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            policy,
            provider,
            executors: Vec::new(),
            stats_sink: None,
            dry_run: false,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            selected: None,
            progress: ProgressSender::noop(),
        }
    }

    /// Builder: register an executor. Earlier executors are preferred.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executors.push(executor);
        self
    }

    pub fn with_stats_sink(mut self, sink: Arc<dyn StatsSink>) -> Self {
        self.stats_sink = Some(sink);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = progress;
        self
    }

    /// Restrict processing to the named phases, keeping policy order.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::UnknownPhase`] for a name the policy does not
    /// define. An empty list selects every phase.
    pub fn with_phases<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            self.selected = None;
            return Ok(self);
        }
        for name in &names {
            if self.policy.phase(name).is_none() {
                return Err(WorkflowError::UnknownPhase {
                    name: name.clone(),
                    valid: self
                        .policy
                        .phase_names()
                        .into_iter()
                        .map(String::from)
                        .collect(),
                });
            }
        }
        self.selected = Some(names);
        Ok(self)
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    fn phases_in_scope(&self) -> Vec<&PhaseDefinition> {
        self.policy
            .phases()
            .iter()
            .filter(|p| match &self.selected {
                Some(names) => names.iter().any(|n| *n == p.name),
                None => true,
            })
            .collect()
    }

    fn load_analysis(&self, run: &mut WorkflowRun) {
        let track_ids: Vec<i64> = run
            .snapshot
            .tracks_of(TrackType::Audio)
            .map(|t| t.id.unwrap_or(i64::from(t.index)))
            .collect();
        run.language_results = self.provider.language_results(&run.state.path, &track_ids);
        run.classification_results = self
            .provider
            .classification_results(&run.state.path, &track_ids);
    }

    /// Reason to skip `phase`, checking dependencies, then `skip_when`,
    /// then `run_if`.
    fn gate(&self, phase: &PhaseDefinition, run: &WorkflowRun) -> Option<SkipReason> {
        for dependency in &phase.depends_on {
            let outcome = run.outcome(dependency);
            if outcome != PhaseOutcome::Completed {
                return Some(SkipReason::dependency(dependency, outcome));
            }
        }

        if let Some(skip_when) = &phase.skip_when {
            if let Some(reason) = evaluate_skip_when(skip_when, &run.snapshot) {
                return Some(reason);
            }
        }

        match &phase.run_if {
            Some(RunIf::PhaseModified(name)) => {
                let modified = run.modified.get(name).copied().unwrap_or(false);
                (!modified).then(|| SkipReason::not_modified(name))
            }
            Some(RunIf::PhaseCompleted(name)) => {
                let outcome = run.outcome(name);
                (outcome != PhaseOutcome::Completed)
                    .then(|| SkipReason::not_completed(name, outcome))
            }
            None => None,
        }
    }

    /// Run every phase in scope against one file.
    ///
    /// Phase failures are reported in the result, not as errors. A run that
    /// stopped early carries `failure`. `failure.mode == OnErrorMode::Fail`
    /// means the remaining phases were left pending, and
    /// `failure.kind == FailureKind::Reintrospection` means the file could
    /// not be re-read after a change.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Metadata`] when the initial snapshot cannot be
    /// read.
    pub fn process_file(&self, path: impl AsRef<Path>) -> Result<FileProcessingResult> {
        let path = path.as_ref();
        let snapshot = self
            .provider
            .snapshot(path)
            .map_err(|source| WorkflowError::Metadata {
                path: path.to_path_buf(),
                source,
            })?;

        let phases = self.phases_in_scope();
        let total = phases.len();
        info!("Processing {} with {} phase(s)", snapshot.file_name(), total);

        let mut run = WorkflowRun::new(path, snapshot, &phases);
        self.load_analysis(&mut run);

        let executor = PhaseExecutor::new(self.executors.clone())
            .with_dry_run(self.dry_run)
            .with_backup_suffix(self.backup_suffix.clone());

        for (index, phase) in phases.iter().enumerate() {
            let label = format!("Phase {}/{} [{}]", index + 1, total, phase.name);
            self.progress.send(&WorkflowProgress {
                file_path: run.file_path.clone(),
                current_phase: phase.name.clone(),
                phase_index: index,
                total_phases: total,
            });
            info!("{}: Starting...", label);

            if let Some(reason) = self.gate(phase, &run) {
                info!("{}: Skipped - {}", label, reason.message);
                run.record(PhaseResult::skipped(&phase.name, reason));
                continue;
            }

            let input = PhaseInput {
                snapshot: &run.snapshot,
                config: &self.policy.config,
                language_results: run.language_results.as_ref(),
                classification_results: run.classification_results.as_ref(),
            };
            let started = Instant::now();
            match executor.execute(phase, &input, &mut run.state) {
                Ok(result) => {
                    info!("{}: Completed ({} changes)", label, result.changes_made);
                    let reintrospect = result.changes_made > 0 && !self.dry_run;
                    run.record(result);
                    if reintrospect {
                        if let Err(err) = self.reintrospect(&mut run) {
                            error!("{}: {}", label, err);
                            run.failure = Some(WorkflowFailure {
                                phase: phase.name.clone(),
                                mode: self.policy.on_error_for(phase),
                                kind: FailureKind::Reintrospection,
                                message: err.to_string(),
                            });
                            break;
                        }
                    }
                }
                Err(err) => {
                    warn!("{}: Failed - {}", label, err.message);
                    run.record(PhaseResult::failed(&err, started.elapsed().as_secs_f64()));
                    let mode = self.policy.on_error_for(phase);
                    if mode == OnErrorMode::Continue {
                        continue;
                    }
                    if mode == OnErrorMode::Skip {
                        for remaining in &phases[index + 1..] {
                            run.record(PhaseResult::skipped(
                                &remaining.name,
                                SkipReason::error_mode(&phase.name),
                            ));
                        }
                    }
                    run.failure = Some(WorkflowFailure {
                        phase: phase.name.clone(),
                        mode,
                        kind: FailureKind::PhaseError,
                        message: err.message.clone(),
                    });
                    break;
                }
            }
        }

        Ok(self.finish(run))
    }

    fn reintrospect(&self, run: &mut WorkflowRun) -> std::result::Result<(), ReintrospectionError> {
        let snapshot = self
            .provider
            .reintrospect(&run.state.path)
            .map_err(|e| ReintrospectionError {
                path: run.state.path.clone(),
                message: e.message,
            })?;
        run.snapshot = snapshot;
        self.load_analysis(run);
        Ok(())
    }

    fn finish(&self, mut run: WorkflowRun) -> FileProcessingResult {
        let mut result = FileProcessingResult::from_phases(
            run.run_id,
            run.file_path.clone(),
            self.dry_run,
            std::mem::take(&mut run.results),
            std::mem::take(&mut run.outcomes),
            run.started.elapsed().as_secs_f64(),
        );
        if let Some(failure) = run.failure.take() {
            result = result.with_failure(failure);
        }

        if let Some(backup) = run.state.backup.take() {
            if result.success {
                if let Err(e) = backup.release() {
                    warn!("Failed to remove backup for {}: {}", run.file_path.display(), e);
                }
            } else {
                let kept = backup.keep();
                warn!("Backup kept at {}", kept.display());
                result.backup_path = Some(kept);
            }
        }

        if let Some(sink) = &self.stats_sink {
            let stats = ProcessingStats::from_result(
                &result,
                &self.policy.name,
                run.started_at,
                run.before,
                (run.snapshot.size_bytes, run.snapshot.tracks.len()),
            );
            match sink.record(&stats) {
                Ok(id) => result.stats_id = Some(id),
                Err(e) => warn!(
                    "Failed to persist processing stats for {}: {}",
                    run.file_path.display(),
                    e
                ),
            }
        }

        result
    }

    /// Process files in order.
    ///
    /// With a global `on_error = "fail"`, the batch stops after the first file
    /// that did not succeed.
    pub fn process_files<I, P>(&self, paths: I) -> Vec<Result<FileProcessingResult>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let stop_on_failure = self.policy.config.on_error == OnErrorMode::Fail;
        let mut results = Vec::new();
        for path in paths {
            let result = self.process_file(path);
            let failed = match &result {
                Ok(r) => (!r.success).then(|| r.error_message.clone().unwrap_or_default()),
                Err(e) => Some(e.to_string()),
            };
            results.push(result);
            if let Some(message) = failed {
                if stop_on_failure {
                    warn!("Stopping batch due to error (on_error='fail'): {}", message);
                    break;
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::executor::ExecutionReport;
    use crate::loader::parse_policy;
    use crate::plan::{Capability, Plan};
    use crate::provider::InMemoryProvider;
    use crate::result::SkipReasonKind;
    use crate::stats::MemoryStatsSink;
    use crate::error::ExecutorError;
    use assert_matches::assert_matches;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use trackforge_common::Track;

    struct AcceptAll;

    impl Executor for AcceptAll {
        fn name(&self) -> &str {
            "accept-all"
        }

        fn supports(&self, _capability: Capability, _container: &str) -> bool {
            true
        }

        fn execute(&self, _path: &Path, _plan: &Plan) -> std::result::Result<ExecutionReport, ExecutorError> {
            Ok(ExecutionReport::in_place())
        }
    }

    /// Provider whose re-introspection always fails.
    struct Flaky(InMemoryProvider);

    impl MetadataProvider for Flaky {
        fn snapshot(&self, path: &Path) -> std::result::Result<FileSnapshot, ProviderError> {
            self.0.snapshot(path)
        }

        fn reintrospect(&self, _path: &Path) -> std::result::Result<FileSnapshot, ProviderError> {
            Err(ProviderError::new("probe crashed"))
        }
    }

    fn make_snapshot(path: &Path) -> FileSnapshot {
        FileSnapshot::new(
            path,
            vec![
                Track::new(0, TrackType::Video).with_codec("h264"),
                Track::new(1, TrackType::Audio).with_language("eng"),
                Track::new(2, TrackType::Audio).with_language("fre"),
            ],
        )
    }

    fn provider(path: &Path) -> Arc<InMemoryProvider> {
        Arc::new(InMemoryProvider::new().with_snapshot(make_snapshot(path)))
    }

    const THREE_PHASES: &str = r#"
        [[phases]]
        name = "clean"
        [phases.audio_filter]
        languages = ["eng"]

        [[phases]]
        name = "guard"
        [[phases.conditional]]
        name = "no-h264"
        when = "exists(video, codec == h264)"
        then = [{ fail = "h264 not allowed" }]

        [[phases]]
        name = "tidy"
        [phases.audio_actions]
        clear_all_titles = true
    "#;

    fn policy_with_mode(mode: &str) -> Policy {
        parse_policy(&format!("[config]\non_error = \"{}\"\n{}", mode, THREE_PHASES)).unwrap()
    }

    #[test]
    fn test_on_error_fail_leaves_pending() {
        let path = Path::new("/m/a.mkv");
        let processor = WorkflowProcessor::new(policy_with_mode("fail"), provider(path)).with_dry_run(true);
        let result = processor.process_file(path).unwrap();

        assert!(!result.success);
        assert_eq!(result.outcomes["clean"], PhaseOutcome::Completed);
        assert_eq!(result.outcomes["guard"], PhaseOutcome::Failed);
        assert_eq!(result.outcomes["tidy"], PhaseOutcome::Pending);
        assert_eq!(result.phase_results.len(), 2);
        let failure = result.failure.unwrap();
        assert_eq!(failure.mode, OnErrorMode::Fail);
        assert_eq!(failure.kind, FailureKind::PhaseError);
        assert_eq!(failure.message, "rule 'no-h264' failed: h264 not allowed");
    }

    #[test]
    fn test_on_error_skip_marks_rest_skipped() {
        let path = Path::new("/m/a.mkv");
        let processor = WorkflowProcessor::new(policy_with_mode("skip"), provider(path)).with_dry_run(true);
        let result = processor.process_file(path).unwrap();

        assert_eq!(result.outcomes["tidy"], PhaseOutcome::Skipped);
        let tidy = &result.phase_results[2];
        assert_eq!(tidy.skip_reason.as_ref().unwrap().kind, SkipReasonKind::ErrorMode);
        assert_eq!(tidy.message.as_deref(), Some("Skipped: phase 'guard' failed (on_error='skip')"));
        assert_eq!(result.failed_phase.as_deref(), Some("guard"));
    }

    #[test]
    fn test_on_error_continue_attempts_rest() {
        let path = Path::new("/m/a.mkv");
        let processor =
            WorkflowProcessor::new(policy_with_mode("continue"), provider(path)).with_dry_run(true);
        let result = processor.process_file(path).unwrap();

        assert!(!result.success);
        assert_eq!(result.outcomes["tidy"], PhaseOutcome::Completed);
        assert_eq!(result.phases_completed, 2);
        assert_eq!(result.phases_failed, 1);
        assert!(result.failure.is_none());
    }

    #[test]
    fn test_dependency_and_run_if_gates() {
        let policy = parse_policy(
            r#"
            [[phases]]
            name = "A"
            [phases.audio_filter]
            languages = ["jpn"]
            fallback = "keep_all"

            [[phases]]
            name = "B"
            run_if = { phase_modified = "A" }
            [phases.audio_actions]
            clear_all_titles = true

            [[phases]]
            name = "C"
            depends_on = ["B"]
            [phases.audio_actions]
            clear_all_default = true
            "#,
        )
        .unwrap();
        let path = Path::new("/m/a.mkv");
        let result = WorkflowProcessor::new(policy, provider(path))
            .with_dry_run(true)
            .process_file(path)
            .unwrap();

        assert!(result.success);
        let b = &result.phase_results[1];
        assert_eq!(b.outcome, PhaseOutcome::Skipped);
        assert_eq!(b.message.as_deref(), Some("Skipped: 'A' made no modifications"));
        let c = &result.phase_results[2];
        assert_eq!(c.skip_reason.as_ref().unwrap().kind, SkipReasonKind::Dependency);
        assert_eq!(
            c.skip_reason.as_ref().unwrap().message,
            "dependency 'B' did not complete (outcome: skipped)"
        );
    }

    #[test]
    fn test_phase_selection() {
        let path = Path::new("/m/a.mkv");
        let processor = WorkflowProcessor::new(policy_with_mode("continue"), provider(path))
            .with_dry_run(true)
            .with_phases(["tidy"])
            .unwrap();
        let result = processor.process_file(path).unwrap();
        assert_eq!(result.phase_results.len(), 1);
        assert_eq!(result.outcomes.len(), 1);

        let err = WorkflowProcessor::new(policy_with_mode("continue"), provider(path))
            .with_phases(["nope"])
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Unknown phase 'nope'. Valid phases: clean, guard, tidy");
    }

    #[test]
    fn test_missing_snapshot_is_error() {
        let processor = WorkflowProcessor::new(
            policy_with_mode("continue"),
            Arc::new(InMemoryProvider::new()),
        );
        assert_matches!(
            processor.process_file("/m/none.mkv"),
            Err(WorkflowError::Metadata { .. })
        );
    }

    #[test]
    fn test_success_releases_backup_and_records_stats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("movie.mkv");
        std::fs::write(&path, b"media").unwrap();
        let policy = parse_policy(
            r#"
            [[phases]]
            name = "clean"
            [phases.audio_filter]
            languages = ["eng"]
            "#,
        )
        .unwrap();
        let sink = Arc::new(MemoryStatsSink::new());
        let result = WorkflowProcessor::new(policy, provider(&path))
            .with_executor(Arc::new(AcceptAll))
            .with_stats_sink(sink.clone())
            .process_file(&path)
            .unwrap();

        assert!(result.success);
        assert!(result.backup_path.is_none());
        assert!(!dir.path().join("movie.mkv.tf-backup").exists());
        assert_eq!(result.stats_id, Some(sink.records()[0].0));
        assert_eq!(sink.records()[0].1.phases[0].changes_made, 1);
    }

    #[test]
    fn test_reintrospection_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("movie.mkv");
        std::fs::write(&path, b"media").unwrap();
        let provider = Flaky(InMemoryProvider::new().with_snapshot(make_snapshot(&path)));
        let result = WorkflowProcessor::new(policy_with_mode("continue"), Arc::new(provider))
            .with_executor(Arc::new(AcceptAll))
            .process_file(&path)
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.outcomes["guard"], PhaseOutcome::Pending);
        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Reintrospection);
        assert!(failure.message.contains("probe crashed"));
        assert_eq!(result.backup_path, Some(dir.path().join("movie.mkv.tf-backup")));
    }

    #[test]
    fn test_progress_reports() {
        let path = Path::new("/m/a.mkv");
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let processor = WorkflowProcessor::new(policy_with_mode("continue"), provider(path))
            .with_dry_run(true)
            .with_progress(ProgressSender::new(move |p| {
                sink.lock().unwrap().push((p.phase_index, p.current_phase.clone()));
            }));
        processor.process_file(path).unwrap();
        assert_eq!(
            *reports.lock().unwrap(),
            vec![(0, "clean".to_string()), (1, "guard".to_string()), (2, "tidy".to_string())]
        );
    }

    #[test]
    fn test_batch_stops_on_fail_mode() {
        let a = Path::new("/m/a.mkv");
        let b = Path::new("/m/b.mkv");
        let provider = Arc::new(
            InMemoryProvider::new()
                .with_snapshot(make_snapshot(a))
                .with_snapshot(make_snapshot(b)),
        );
        let results = WorkflowProcessor::new(policy_with_mode("fail"), provider.clone())
            .with_dry_run(true)
            .process_files([a, b]);
        assert_eq!(results.len(), 1);

        let results = WorkflowProcessor::new(policy_with_mode("continue"), provider)
            .with_dry_run(true)
            .process_files([a, b]);
        assert_eq!(results.len(), 2);
    }
}
