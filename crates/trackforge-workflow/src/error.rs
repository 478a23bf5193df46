//! Error types for policy loading and workflow execution.
//!
//! Load-time problems are [`ValidationError`]s and always name the phase and
//! field involved. Run-time problems split into [`PhaseExecutionError`]
//! (converted into a failed phase result plus `on_error` handling) and
//! [`ReintrospectionError`] (fatal for the rest of the file).

use std::path::PathBuf;

use thiserror::Error;
use trackforge_rules::ExpressionError;

use crate::phase::OperationType;

/// A policy document that parsed as TOML but does not describe a runnable
/// policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("policy must define at least one phase")]
    NoPhases,

    #[error("phase #{index} has an empty name")]
    EmptyPhaseName { index: usize },

    #[error("phase name '{name}' may only contain letters, digits, '-' and '_'")]
    InvalidPhaseName { name: String },

    #[error("duplicate phase name '{name}'")]
    DuplicatePhase { name: String },

    #[error("phase '{phase}': {field} references unknown phase '{reference}'")]
    UnknownPhaseReference {
        phase: String,
        field: &'static str,
        reference: String,
    },

    #[error("phase '{phase}': {field} references '{reference}', which does not run before it")]
    ForwardReference {
        phase: String,
        field: &'static str,
        reference: String,
    },

    #[error("phase '{phase}': run_if must set phase_modified or phase_completed")]
    EmptyRunIf { phase: String },

    #[error("phase '{phase}': run_if may set only one of phase_modified and phase_completed")]
    ConflictingRunIf { phase: String },

    #[error("phase '{phase}': skip_when must set at least one condition")]
    EmptySkipWhen { phase: String },

    #[error("phase '{phase}': invalid {field}: {message}")]
    InvalidField {
        phase: String,
        field: String,
        message: String,
    },

    #[error("phase '{phase}': {field}: {source}")]
    Expression {
        phase: String,
        field: String,
        #[source]
        source: ExpressionError,
    },

    #[error("invalid config.{field}: {message}")]
    InvalidConfig { field: String, message: String },
}

impl ValidationError {
    pub fn invalid_field(
        phase: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            phase: phase.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A phase could not run to completion.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("phase '{phase}' failed: {message}")]
pub struct PhaseExecutionError {
    pub phase: String,
    /// Operation that was running, if the failure belongs to one.
    pub operation: Option<OperationType>,
    pub message: String,
}

impl PhaseExecutionError {
    pub fn new(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            operation: None,
            message: message.into(),
        }
    }

    pub fn in_operation(
        phase: impl Into<String>,
        operation: OperationType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase: phase.into(),
            operation: Some(operation),
            message: message.into(),
        }
    }
}

/// The file could not be re-read after a phase modified it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot re-introspect file after modification: {message}. File may be corrupted.")]
pub struct ReintrospectionError {
    pub path: PathBuf,
    pub message: String,
}

/// Failure reported by a metadata provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by an executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutorError {
    pub message: String,
}

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by a stats sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StatsError {
    pub message: String,
}

impl StatsError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced to callers of the loader and the processor.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("failed to read policy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid policy: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unknown phase '{name}'. Valid phases: {}", valid.join(", "))]
    UnknownPhase { name: String, valid: Vec<String> },

    #[error("failed to read metadata for {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: ProviderError,
    },
}

/// Result alias for loader and processor entry points.
pub type Result<T> = std::result::Result<T, WorkflowError>;
