mod cli;

use trackforge::{config, snapshot};
use trackforge_rules::{evaluate, parse_expression, EvaluationContext};
use trackforge_workflow::{
    load_policy, FileProcessingResult, PhaseOutcome, Policy, RunIf, WorkflowError,
    WorkflowProcessor,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config_or_default(cli.config.as_deref())?;

    // Respect RUST_LOG if set, then the config file, then the verbose flag
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| config.logging.filter.clone())
        .unwrap_or_else(|| {
            if cli.verbose {
                "trackforge=trace,trackforge_workflow=trace,trackforge_rules=debug".to_string()
            } else {
                "trackforge=info,trackforge_workflow=info,trackforge_rules=warn".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate { policy } => {
            let path = policy.or_else(|| config.defaults.policy.clone());
            validate_policy(path.as_deref())
        }
        Commands::Check { expression, tracks } => check_expression(&expression, tracks.as_deref()),
        Commands::Plan {
            policy,
            files,
            snapshots,
            phases,
            json,
        } => {
            let snapshots = snapshots
                .or_else(|| config.defaults.snapshots.clone())
                .context("No snapshot file given (use --snapshots or set [defaults] snapshots)")?;
            plan_files(&config, &policy, &snapshots, files, phases, json)
        }
        Commands::Version => {
            println!("trackforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_policy(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        anyhow::bail!("No policy specified (pass a path or set [defaults] policy)");
    };

    println!("Validating policy: {:?}", path);
    let policy = load_policy(path)?;
    println!("✓ Policy '{}' is valid", policy.name);
    if let Some(description) = &policy.description {
        println!("  {}", description);
    }
    print_policy(&policy);

    Ok(())
}

fn print_policy(policy: &Policy) {
    println!("  On error: {}", policy.config.on_error);
    println!("  Phases: {}", policy.phases().len());
    for (i, phase) in policy.phases().iter().enumerate() {
        let operations: Vec<&str> = phase.operations().iter().map(|op| op.as_str()).collect();
        if operations.is_empty() {
            println!("    {}. {} (no operations)", i + 1, phase.name);
        } else {
            println!("    {}. {}: {}", i + 1, phase.name, operations.join(", "));
        }
        if !phase.depends_on.is_empty() {
            println!("       depends on: {}", phase.depends_on.join(", "));
        }
        match &phase.run_if {
            Some(RunIf::PhaseModified(name)) => println!("       runs if '{}' modified the file", name),
            Some(RunIf::PhaseCompleted(name)) => println!("       runs if '{}' completed", name),
            None => {}
        }
        if phase.skip_when.is_some() {
            println!("       has skip_when conditions");
        }
        if let Some(mode) = phase.on_error {
            println!("       on error: {}", mode);
        }
    }
}

fn check_expression(expression: &str, tracks: Option<&Path>) -> Result<()> {
    let condition = parse_expression(expression)
        .with_context(|| format!("Invalid expression: {}", expression))?;
    println!("Parsed: {}", condition);

    if let Some(path) = tracks {
        let snapshot = snapshot::load_tracks(path)
            .with_context(|| format!("Failed to load tracks from {:?}", path))?;
        let (result, trace) = evaluate(&condition, &EvaluationContext::from_snapshot(&snapshot));
        println!("Result: {}", result);
        println!("Trace: {}", trace);
    }

    Ok(())
}

fn plan_files(
    config: &config::Config,
    policy_path: &Path,
    snapshots_path: &Path,
    files: Vec<PathBuf>,
    phases: Vec<String>,
    json: bool,
) -> Result<()> {
    let policy = load_policy(policy_path)?;
    let snapshots = snapshot::SnapshotFile::load(snapshots_path)
        .with_context(|| format!("Failed to load snapshots from {:?}", snapshots_path))?;
    let provider = snapshots.into_provider();

    let files = if files.is_empty() {
        provider.paths()
    } else {
        files
    };
    if files.is_empty() {
        anyhow::bail!("Snapshot file {:?} describes no files", snapshots_path);
    }

    if !config.processing.dry_run {
        tracing::warn!("No executors are registered; phases that change files will fail");
    }

    let processor = WorkflowProcessor::new(policy, Arc::new(provider))
        .with_dry_run(config.processing.dry_run)
        .with_backup_suffix(config.processing.backup_suffix.clone())
        .with_phases(phases)?;

    let results = processor.process_files(&files);

    let failed = results
        .iter()
        .filter(|r| !matches!(r, Ok(result) if result.success))
        .count();

    if json {
        let values = results
            .iter()
            .zip(&files)
            .map(|(result, path)| match result {
                Ok(result) => serde_json::to_value(result),
                Err(e) => Ok(serde_json::json!({
                    "file_path": path,
                    "success": false,
                    "error": e.to_string(),
                })),
            })
            .collect::<Result<Vec<_>, _>>()?;
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else {
        for (result, path) in results.iter().zip(&files) {
            print_result(path, result);
        }
        println!(
            "Planned {} file(s): {} succeeded, {} failed",
            results.len(),
            results.len() - failed,
            failed
        );
        if results.len() < files.len() {
            println!(
                "Stopped after {} of {} file(s) (on_error = fail)",
                results.len(),
                files.len()
            );
        }
    }

    if failed > 0 {
        anyhow::bail!("{} file(s) failed", failed);
    }
    Ok(())
}

fn print_result(path: &Path, result: &Result<FileProcessingResult, WorkflowError>) {
    println!("File: {}", path.display());
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            println!("  ✗ {}", e);
            println!();
            return;
        }
    };

    for phase in &result.phase_results {
        let status = match phase.outcome {
            PhaseOutcome::Completed => "✓",
            PhaseOutcome::Skipped => "-",
            PhaseOutcome::Failed => "✗",
            PhaseOutcome::Pending => " ",
        };
        print!("  {} {}", status, phase.phase_name);
        if phase.outcome == PhaseOutcome::Completed {
            print!(" ({} changes)", phase.changes_made);
        }
        if let Some(message) = &phase.message {
            print!(": {}", message);
        }
        println!();

        for action in &phase.planned_actions {
            println!("      {}", action);
        }
        if let Some(rule) = phase.conditional.as_ref().and_then(|c| c.matched_rule()) {
            println!("      matched rule: {}", rule);
        }
        for warning in &phase.warnings {
            println!("      ! {}", warning);
        }
    }

    for (name, outcome) in &result.outcomes {
        if *outcome == PhaseOutcome::Pending {
            println!("    {} (not run)", name);
        }
    }

    if result.success {
        println!("  Result: {} change(s) planned", result.total_changes);
    } else {
        println!(
            "  Result: failed in phase '{}': {}",
            result.failed_phase.as_deref().unwrap_or("?"),
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    println!();
}
