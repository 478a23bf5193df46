//! The [`Executor`] trait applies planned changes to a file.
//!
//! Executors are external tools (remuxers, tag editors, transcoders) wrapped
//! behind a common interface. Each declares which kinds of plans it can apply
//! for which containers; the phase executor picks the first capable one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ExecutorError;
use crate::plan::{Capability, Plan};

/// Result of applying one plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// New location of the file when the executor wrote it elsewhere
    /// (for example after a container conversion changed the extension).
    pub output_path: Option<PathBuf>,
}

impl ExecutionReport {
    /// The file was modified in place.
    pub fn in_place() -> Self {
        Self::default()
    }

    pub fn moved_to(path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: Some(path.into()),
        }
    }
}

/// A tool that applies plans to media files.
pub trait Executor: Send + Sync {
    /// A short, human-readable name (e.g. "mkvpropedit").
    fn name(&self) -> &str;

    /// Whether this executor can provide `capability` for a file whose
    /// container is `container` (normalized, e.g. `mkv`).
    fn supports(&self, capability: Capability, container: &str) -> bool;

    /// Apply `plan` to the file at `path`.
    fn execute(&self, path: &Path, plan: &Plan) -> Result<ExecutionReport, ExecutorError>;
}

/// First executor able to apply `plan`, or `None` for a plan with no
/// changes or no capable executor.
///
/// Container conversions are matched against the target container;
/// everything else against the file's current container.
pub fn select_executor<'a>(
    executors: &'a [Arc<dyn Executor>],
    plan: &Plan,
    container: &str,
) -> Option<&'a Arc<dyn Executor>> {
    let capability = plan.capability()?;
    let container = match (&plan.container_change, capability) {
        (Some(change), Capability::ConvertContainer) => change.to.as_str(),
        _ => container,
    };
    executors
        .iter()
        .find(|executor| executor.supports(capability, container))
}
