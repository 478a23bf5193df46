//! # trackforge-workflow
//!
//! Phase-based media policies: loading, planning, and orchestration.
//!
//! ## Overview
//!
//! - [`load_policy`] / [`parse_policy`]: TOML to a validated [`Policy`].
//! - [`planner`]: per-operation planning against a [`FileSnapshot`](trackforge_common::FileSnapshot).
//! - [`PhaseExecutor`]: runs one phase's operations and hands plans to an [`Executor`].
//! - [`WorkflowProcessor`]: runs every phase against files, honoring
//!   dependencies, `skip_when`, `run_if`, and `on_error`.
//!
//! Probing and file modification live behind the [`MetadataProvider`] and
//! [`Executor`] traits. In dry-run mode no executor is called.
//!
//! ```
//! use std::sync::Arc;
//! use trackforge_common::{FileSnapshot, Track, TrackType};
//! use trackforge_workflow::{parse_policy, InMemoryProvider, PhaseOutcome, WorkflowProcessor};
//!
//! let policy = parse_policy(r#"
//!     [[phases]]
//!     name = "normalize"
//!     [phases.subtitle_filter]
//!     languages = ["eng"]
//!
//!     [[phases]]
//!     name = "transcode"
//!     run_if = { phase_modified = "normalize" }
//!     [phases.transcode]
//!     video_codec = "hevc"
//! "#).unwrap();
//!
//! let provider = InMemoryProvider::new().with_snapshot(FileSnapshot::new(
//!     "/media/show.mkv",
//!     vec![
//!         Track::new(0, TrackType::Video).with_codec("hevc"),
//!         Track::new(1, TrackType::Subtitle).with_language("eng"),
//!     ],
//! ));
//!
//! let result = WorkflowProcessor::new(policy, Arc::new(provider))
//!     .with_dry_run(true)
//!     .process_file("/media/show.mkv")
//!     .unwrap();
//! assert_eq!(result.outcomes["transcode"], PhaseOutcome::Skipped);
//! ```

pub mod backup;
pub mod error;
pub mod executor;
pub mod loader;
pub mod phase;
pub mod phase_executor;
pub mod plan;
pub mod planner;
pub mod policy;
pub mod processor;
pub mod provider;
pub mod result;
pub mod skip;
pub mod stats;
pub mod validation;

pub use backup::{FileBackup, DEFAULT_BACKUP_SUFFIX};
pub use error::{
    ExecutorError, PhaseExecutionError, ProviderError, ReintrospectionError, Result, StatsError,
    ValidationError, WorkflowError,
};
pub use executor::{select_executor, ExecutionReport, Executor};
pub use loader::{load_policy, parse_policy};
pub use phase::{
    ConditionalRule, FallbackMode, MatchMode, OperationType, PhaseDefinition, RuleAction, RunIf,
    SkipMode, SkipTarget, SkipWhen, SynthesisDefinition, TrackCategory,
};
pub use phase_executor::{FileState, PhaseExecutor, PhaseInput};
pub use plan::{
    Capability, ConditionalSummary, Disposition, Plan, PlannedAction, SkipFlags, TrackDisposition,
};
pub use policy::{GlobalConfig, OnErrorMode, Policy};
pub use processor::{ProgressSender, WorkflowProcessor, WorkflowProgress};
pub use provider::{InMemoryProvider, MetadataProvider};
pub use result::{
    FailureKind, FileProcessingResult, PhaseOutcome, PhaseResult, SkipReason, SkipReasonKind,
    WorkflowFailure,
};
pub use skip::evaluate_skip_when;
pub use stats::{MemoryStatsSink, PhaseMetrics, ProcessingStats, StatsSink};
