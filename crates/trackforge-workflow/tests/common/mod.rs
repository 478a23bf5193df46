//! Shared fixtures for workflow integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use trackforge_common::{FileSnapshot, Track, TrackType};
use trackforge_workflow::{
    Capability, Disposition, ExecutionReport, Executor, ExecutorError, InMemoryProvider,
    MetadataProvider, Plan, PlannedAction,
};

/// A movie with one video, three audio and two subtitle tracks.
pub fn make_movie(path: impl AsRef<Path>) -> FileSnapshot {
    let mut snapshot = FileSnapshot::new(
        path.as_ref(),
        vec![
            Track::new(0, TrackType::Video)
                .with_codec("h264")
                .with_dimensions(1920, 1080),
            Track::new(1, TrackType::Audio)
                .with_codec("truehd")
                .with_language("eng")
                .with_channels(8)
                .as_default(),
            Track::new(2, TrackType::Audio)
                .with_codec("ac3")
                .with_language("fre")
                .with_channels(6),
            Track::new(3, TrackType::Audio)
                .with_codec("aac")
                .with_language("eng")
                .with_channels(2)
                .with_title("Director's Commentary"),
            Track::new(4, TrackType::Subtitle)
                .with_codec("subrip")
                .with_language("eng"),
            Track::new(5, TrackType::Subtitle)
                .with_codec("subrip")
                .with_language("fre"),
        ],
    );
    snapshot.container_format = Some("matroska,webm".into());
    snapshot.size_bytes = Some(4_000_000_000);
    snapshot
}

/// Executor that applies plans to the snapshots held by an in-memory
/// provider, so re-introspection sees the modified file.
pub struct SnapshotExecutor {
    provider: Arc<InMemoryProvider>,
    pub calls: Mutex<Vec<usize>>,
}

impl SnapshotExecutor {
    pub fn new(provider: Arc<InMemoryProvider>) -> Self {
        Self {
            provider,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Executor for SnapshotExecutor {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn supports(&self, _capability: Capability, _container: &str) -> bool {
        true
    }

    fn execute(&self, path: &Path, plan: &Plan) -> Result<ExecutionReport, ExecutorError> {
        let mut snapshot = self
            .provider
            .snapshot(path)
            .map_err(|e| ExecutorError::new(e.message))?;

        let removed: Vec<u32> = plan
            .dispositions
            .iter()
            .filter(|d| d.disposition == Disposition::Remove)
            .map(|d| d.index)
            .collect();
        snapshot.tracks.retain(|t| !removed.contains(&t.index));

        for action in &plan.actions {
            match action {
                PlannedAction::SetDefault { index, value } => {
                    if let Some(track) = snapshot.tracks.iter_mut().find(|t| t.index == *index) {
                        track.is_default = *value;
                    }
                }
                PlannedAction::ClearTitle { index } => {
                    if let Some(track) = snapshot.tracks.iter_mut().find(|t| t.index == *index) {
                        track.title = None;
                    }
                }
                _ => {}
            }
        }

        self.provider.insert(snapshot);
        self.calls.lock().unwrap().push(plan.actions.len());
        Ok(ExecutionReport::in_place())
    }
}
