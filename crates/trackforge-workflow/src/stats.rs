//! Processing statistics handed to an optional sink after each file.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trackforge_common::{RunId, StatsId};

use crate::error::StatsError;
use crate::result::{FileProcessingResult, PhaseOutcome};

/// Per-phase timing and change counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
    pub phase_name: String,
    pub outcome: PhaseOutcome,
    pub duration_seconds: f64,
    pub changes_made: usize,
}

/// What processing one file did, for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub run_id: RunId,
    pub file_path: PathBuf,
    pub policy_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub size_before: Option<u64>,
    pub size_after: Option<u64>,
    pub tracks_before: usize,
    pub tracks_after: usize,
    pub phases: Vec<PhaseMetrics>,
}

impl ProcessingStats {
    /// Collect metrics from a finished file result.
    pub fn from_result(
        result: &FileProcessingResult,
        policy_name: &str,
        started_at: DateTime<Utc>,
        before: (Option<u64>, usize),
        after: (Option<u64>, usize),
    ) -> Self {
        Self {
            run_id: result.run_id,
            file_path: result.file_path.clone(),
            policy_name: policy_name.to_string(),
            started_at,
            finished_at: Utc::now(),
            success: result.success,
            size_before: before.0,
            size_after: after.0,
            tracks_before: before.1,
            tracks_after: after.1,
            phases: result
                .phase_results
                .iter()
                .map(|r| PhaseMetrics {
                    phase_name: r.phase_name.clone(),
                    outcome: r.outcome,
                    duration_seconds: r.duration_seconds,
                    changes_made: r.changes_made,
                })
                .collect(),
        }
    }

    /// Bytes saved by processing, negative when the file grew.
    pub fn size_delta(&self) -> Option<i64> {
        let before = i64::try_from(self.size_before?).ok()?;
        let after = i64::try_from(self.size_after?).ok()?;
        Some(before - after)
    }
}

/// Persists processing statistics.
pub trait StatsSink: Send + Sync {
    fn record(&self, stats: &ProcessingStats) -> Result<StatsId, StatsError>;
}

/// Sink that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryStatsSink {
    records: Mutex<Vec<(StatsId, ProcessingStats)>>,
}

impl MemoryStatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(StatsId, ProcessingStats)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatsSink for MemoryStatsSink {
    fn record(&self, stats: &ProcessingStats) -> Result<StatsId, StatsError> {
        let id = StatsId::new();
        self.records
            .lock()
            .map_err(|_| StatsError::new("stats store poisoned"))?
            .push((id, stats.clone()));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::PhaseResult;
    use std::collections::BTreeMap;

    fn make_result() -> FileProcessingResult {
        let mut phase = PhaseResult::completed("normalize");
        phase.changes_made = 2;
        phase.duration_seconds = 0.25;
        FileProcessingResult::from_phases(
            RunId::new(),
            PathBuf::from("/m/a.mkv"),
            false,
            vec![phase],
            BTreeMap::new(),
            0.25,
        )
    }

    #[test]
    fn test_from_result() {
        let result = make_result();
        let stats = ProcessingStats::from_result(
            &result,
            "default",
            Utc::now(),
            (Some(1000), 5),
            (Some(800), 3),
        );
        assert_eq!(stats.run_id, result.run_id);
        assert_eq!(stats.size_delta(), Some(200));
        assert_eq!(stats.phases.len(), 1);
        assert_eq!(stats.phases[0].changes_made, 2);
        assert!(stats.finished_at >= stats.started_at);
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryStatsSink::new();
        assert!(sink.is_empty());
        let stats =
            ProcessingStats::from_result(&make_result(), "default", Utc::now(), (None, 1), (None, 1));
        let id = sink.record(&stats).unwrap();
        assert_eq!(sink.records()[0].0, id);
        assert_eq!(stats.size_delta(), None);
    }
}
