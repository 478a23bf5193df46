//! Where file snapshots and analysis results come from.
//!
//! Probing and audio analysis run outside trackforge. A [`MetadataProvider`]
//! hands the orchestrator what they produced: the initial snapshot, a fresh
//! one after each modifying phase, and any language or classification
//! results keyed by track id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use trackforge_common::FileSnapshot;
use trackforge_rules::{ClassificationResults, LanguageResults};

use crate::error::ProviderError;

pub trait MetadataProvider: Send + Sync {
    /// Current snapshot of the file at `path`.
    fn snapshot(&self, path: &Path) -> Result<FileSnapshot, ProviderError>;

    /// Snapshot taken after a phase modified the file.
    fn reintrospect(&self, path: &Path) -> Result<FileSnapshot, ProviderError> {
        self.snapshot(path)
    }

    /// Language analysis for the given audio track ids, if any was run.
    fn language_results(&self, _path: &Path, _track_ids: &[i64]) -> Option<LanguageResults> {
        None
    }

    fn classification_results(
        &self,
        _path: &Path,
        _track_ids: &[i64],
    ) -> Option<ClassificationResults> {
        None
    }
}

fn restrict<V: Clone>(results: &HashMap<i64, V>, track_ids: &[i64]) -> HashMap<i64, V> {
    results
        .iter()
        .filter(|(id, _)| track_ids.contains(id))
        .map(|(id, v)| (*id, v.clone()))
        .collect()
}

#[derive(Debug, Default)]
struct Entry {
    snapshot: Option<FileSnapshot>,
    language: Option<LanguageResults>,
    classification: Option<ClassificationResults>,
}

/// Provider backed by snapshots held in memory.
///
/// Used for planning from recorded snapshots and in tests. Snapshots can be
/// replaced while a run is in progress to model a file that changed on disk.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    entries: RwLock<HashMap<PathBuf, Entry>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the snapshot for its own path.
    pub fn insert(&self, snapshot: FileSnapshot) {
        if let Ok(mut entries) = self.entries.write() {
            let path = snapshot.path.clone();
            entries.entry(path).or_default().snapshot = Some(snapshot);
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_snapshot(self, snapshot: FileSnapshot) -> Self {
        self.insert(snapshot);
        self
    }

    pub fn with_language_results(self, path: impl Into<PathBuf>, results: LanguageResults) -> Self {
        if let Ok(mut entries) = self.entries.write() {
            entries.entry(path.into()).or_default().language = Some(results);
        }
        self
    }

    pub fn with_classification_results(
        self,
        path: impl Into<PathBuf>,
        results: ClassificationResults,
    ) -> Self {
        if let Ok(mut entries) = self.entries.write() {
            entries.entry(path.into()).or_default().classification = Some(results);
        }
        self
    }

    /// Forget the snapshot for `path`; later lookups fail.
    pub fn remove(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.write() {
            if let Some(entry) = entries.get_mut(path) {
                entry.snapshot = None;
            }
        }
    }

    /// Paths with a stored snapshot, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .read()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, e)| e.snapshot.is_some())
                    .map(|(p, _)| p.clone())
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths
    }
}

impl MetadataProvider for InMemoryProvider {
    fn snapshot(&self, path: &Path) -> Result<FileSnapshot, ProviderError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ProviderError::new("snapshot store poisoned"))?;
        entries
            .get(path)
            .and_then(|e| e.snapshot.clone())
            .ok_or_else(|| ProviderError::new(format!("no snapshot for {}", path.display())))
    }

    fn language_results(&self, path: &Path, track_ids: &[i64]) -> Option<LanguageResults> {
        let entries = self.entries.read().ok()?;
        let results = entries.get(path)?.language.as_ref()?;
        Some(restrict(results, track_ids))
    }

    fn classification_results(
        &self,
        path: &Path,
        track_ids: &[i64],
    ) -> Option<ClassificationResults> {
        let entries = self.entries.read().ok()?;
        let results = entries.get(path)?.classification.as_ref()?;
        Some(restrict(results, track_ids))
    }
}
