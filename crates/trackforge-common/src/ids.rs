//! Typed ID wrappers.
//!
//! Newtypes around UUIDs so a workflow run id cannot be passed where a stats
//! record id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one `process_file` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a persisted processing-statistics record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsId(Uuid);

impl StatsId {
    /// Generate a new random stats ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StatsId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for StatsId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<StatsId> for Uuid {
    fn from(id: StatsId) -> Self {
        id.0
    }
}

impl std::fmt::Display for StatsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
