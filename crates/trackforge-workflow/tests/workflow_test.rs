//! Workflow integration tests
//!
//! End-to-end runs of policies loaded from TOML against in-memory snapshots.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use assert_matches::assert_matches;
use tempfile::TempDir;
use trackforge_rules::{LanguageAnalysis, LanguageClassification, LanguageResults};
use trackforge_workflow::{
    load_policy, parse_policy, InMemoryProvider, MemoryStatsSink, OnErrorMode, PhaseOutcome,
    PlannedAction, SkipReasonKind, ValidationError, WorkflowError, WorkflowProcessor,
};

use common::{make_movie, SnapshotExecutor};

const MOVIE: &str = "/library/Movie (2020)/Movie (2020).mkv";

fn dry_run(policy: &str) -> trackforge_workflow::FileProcessingResult {
    let provider = InMemoryProvider::new().with_snapshot(make_movie(MOVIE));
    WorkflowProcessor::new(parse_policy(policy).unwrap(), Arc::new(provider))
        .with_dry_run(true)
        .process_file(MOVIE)
        .unwrap()
}

#[test]
fn test_run_if_phase_modified_skips_untouched() {
    // Every audio track is already kept, so "normalize" changes nothing.
    let result = dry_run(
        r#"
        [[phases]]
        name = "normalize"
        audio_filter = { languages = ["eng", "fre"] }

        [[phases]]
        name = "transcode"
        run_if = { phase_modified = "normalize" }
        transcode = { video_codec = "hevc" }
        "#,
    );

    assert!(result.success);
    assert_eq!(result.total_changes, 0);
    let transcode = &result.phase_results[1];
    assert_eq!(transcode.outcome, PhaseOutcome::Skipped);
    assert!(transcode.success);
    assert!(!transcode.file_modified);
    assert_eq!(
        transcode.message.as_deref(),
        Some("Skipped: 'normalize' made no modifications")
    );
}

#[test]
fn test_run_if_phase_modified_runs_after_change() {
    let result = dry_run(
        r#"
        [[phases]]
        name = "normalize"
        audio_filter = { languages = ["eng"] }

        [[phases]]
        name = "transcode"
        run_if = { phase_modified = "normalize" }
        transcode = { video_codec = "hevc" }
        "#,
    );

    assert_eq!(result.outcomes["transcode"], PhaseOutcome::Completed);
    assert_matches!(
        result.phase_results[1].planned_actions[..],
        [PlannedAction::TranscodeVideo { index: 0, .. }]
    );
}

#[test]
fn test_continue_after_failure() {
    let result = dry_run(
        r#"
        [config]
        on_error = "continue"

        [[phases]]
        name = "guard"
        [[phases.conditional]]
        name = "reject-h264"
        when = "exists(video, codec == h264)"
        then = [{ fail = "{filename} is still h264" }]

        [[phases]]
        name = "tidy"
        subtitle_filter = { languages = ["eng"] }
        "#,
    );

    assert!(!result.success);
    assert_eq!(result.outcomes["guard"], PhaseOutcome::Failed);
    assert_eq!(result.outcomes["tidy"], PhaseOutcome::Completed);
    assert_eq!(result.phase_results[1].changes_made, 1);
    assert_eq!(
        result.error_message.as_deref(),
        Some("rule 'reject-h264' failed: Movie (2020).mkv is still h264")
    );
}

#[test]
fn test_dependency_on_failed_phase() {
    let result = dry_run(
        r#"
        [config]
        on_error = "continue"

        [[phases]]
        name = "guard"
        [[phases.conditional]]
        name = "reject-h264"
        when = "exists(video, codec == h264)"
        then = [{ fail = "h264" }]

        [[phases]]
        name = "transcode"
        depends_on = ["guard"]
        transcode = { video_codec = "hevc" }
        "#,
    );

    let transcode = &result.phase_results[1];
    let reason = transcode.skip_reason.as_ref().unwrap();
    assert_eq!(reason.kind, SkipReasonKind::Dependency);
    assert_eq!(
        reason.message,
        "dependency 'guard' did not complete (outcome: failed)"
    );
}

#[test]
fn test_phase_override_beats_global_mode() {
    let result = dry_run(
        r#"
        [config]
        on_error = "continue"

        [[phases]]
        name = "guard"
        on_error = "fail"
        [[phases.conditional]]
        name = "reject-h264"
        when = "exists(video, codec == h264)"
        then = [{ fail = "h264" }]

        [[phases]]
        name = "tidy"
        subtitle_filter = { languages = ["eng"] }
        "#,
    );

    assert_eq!(result.outcomes["tidy"], PhaseOutcome::Pending);
    assert_eq!(result.failure.unwrap().mode, OnErrorMode::Fail);
}

#[test]
fn test_skip_when_gate() {
    let result = dry_run(
        r#"
        [[phases]]
        name = "transcode"
        skip_when = { video_codec = ["h264", "avc"] }
        transcode = { video_codec = "hevc" }
        "#,
    );

    let reason = result.phase_results[0].skip_reason.as_ref().unwrap();
    assert_eq!(reason.kind, SkipReasonKind::SkipWhen);
    assert_eq!(reason.condition_name.as_deref(), Some("video_codec"));
}

#[test]
fn test_missing_language_analysis() {
    let result = dry_run(
        r#"
        [[phases]]
        name = "detect"
        transcription = { update_language = true }
        "#,
    );

    assert!(result.success);
    assert_eq!(result.total_changes, 0);
    assert_eq!(
        result.phase_results[0].warnings,
        vec!["No language analysis results available; transcription skipped".to_string()]
    );
}

#[test]
fn test_language_analysis_retags_tracks() {
    let analysis = |lang: &str, share: f64| LanguageAnalysis {
        primary_language: lang.into(),
        primary_percentage: share,
        secondary_languages: Vec::new(),
        classification: LanguageClassification::SingleLanguage,
    };
    // tracks carry no ids, so results are keyed by index
    let results: LanguageResults = [(2, analysis("ja", 0.95)), (3, analysis("deu", 0.4))]
        .into_iter()
        .collect();
    let provider = InMemoryProvider::new()
        .with_snapshot(make_movie(MOVIE))
        .with_language_results(MOVIE, results);
    let policy = parse_policy(
        r#"
        [[phases]]
        name = "detect"
        transcription = { update_language = true, confidence_threshold = 0.9 }
        "#,
    )
    .unwrap();

    let result = WorkflowProcessor::new(policy, Arc::new(provider))
        .with_dry_run(true)
        .process_file(MOVIE)
        .unwrap();

    assert_eq!(
        result.phase_results[0].planned_actions,
        vec![PlannedAction::SetLanguage {
            index: 2,
            from: Some("fre".into()),
            to: "jpn".into(),
        }]
    );
}

#[test]
fn test_reintrospection_feeds_later_phases() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("movie.mkv");
    fs::write(&path, b"not really a movie").unwrap();

    let provider = Arc::new(InMemoryProvider::new().with_snapshot(make_movie(&path)));
    let executor = Arc::new(SnapshotExecutor::new(provider.clone()));
    let sink = Arc::new(MemoryStatsSink::new());
    let policy = parse_policy(
        r#"
        [[phases]]
        name = "normalize"
        audio_filter = { languages = ["eng"] }
        subtitle_filter = { languages = ["eng"] }

        [[phases]]
        name = "report"
        [[phases.conditional]]
        name = "two-audio"
        when = "count(audio) == 2"
        then = [{ warn = "two audio tracks left in {filename}" }]
        "#,
    )
    .unwrap();

    let result = WorkflowProcessor::new(policy, provider.clone())
        .with_executor(executor.clone())
        .with_stats_sink(sink.clone())
        .process_file(&path)
        .unwrap();

    assert!(result.success);
    assert_eq!(executor.call_count(), 1);
    assert!(result.phase_results[0].file_modified);
    assert_eq!(
        result.phase_results[1].warnings,
        vec!["two audio tracks left in movie.mkv".to_string()]
    );
    assert!(result.backup_path.is_none());
    assert!(!dir.path().join("movie.mkv.tf-backup").exists());

    let (_, stats) = &sink.records()[0];
    assert_eq!(stats.tracks_before, 6);
    assert_eq!(stats.tracks_after, 4);
}

#[test]
fn test_load_policy_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policy.toml");
    fs::write(
        &path,
        r#"
        name = "anime"

        [[phases]]
        name = "clean"
        audio_filter = { languages = ["jpn", "eng"] }
        "#,
    )
    .unwrap();

    let policy = load_policy(&path).unwrap();
    assert_eq!(policy.name, "anime");
    assert_eq!(policy.phase_names(), vec!["clean"]);

    assert_matches!(
        load_policy(&dir.path().join("missing.toml")),
        Err(WorkflowError::Io { .. })
    );
}

#[test]
fn test_forward_and_self_dependencies_rejected() {
    let forward = parse_policy(
        r#"
        [[phases]]
        name = "first"
        depends_on = ["second"]

        [[phases]]
        name = "second"
        "#,
    );
    assert_matches!(
        forward,
        Err(WorkflowError::Validation(ValidationError::ForwardReference { .. }))
    );

    let own = parse_policy(
        r#"
        [[phases]]
        name = "only"
        run_if = { phase_completed = "only" }
        "#,
    );
    assert_matches!(
        own,
        Err(WorkflowError::Validation(ValidationError::ForwardReference { .. }))
    );
}

#[test]
fn test_batch_continues_by_default() {
    let other = "/library/Other.mkv";
    let provider = InMemoryProvider::new()
        .with_snapshot(make_movie(MOVIE))
        .with_snapshot(make_movie(other));
    let policy = parse_policy(
        r#"
        [[phases]]
        name = "tidy"
        subtitle_filter = { languages = ["eng"] }
        "#,
    )
    .unwrap();

    let results = WorkflowProcessor::new(policy, Arc::new(provider))
        .with_dry_run(true)
        .process_files([Path::new("/library/missing.mkv"), Path::new(other)]);

    assert_eq!(results.len(), 2);
    assert_matches!(results[0], Err(WorkflowError::Metadata { .. }));
    assert!(results[1].as_ref().unwrap().success);
}
