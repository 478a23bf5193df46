//! JSON snapshot files.
//!
//! A snapshot file records what a prober reported about a set of media files,
//! optionally with language analysis and original/dubbed classification keyed
//! by track id:
//!
//! ```json
//! {
//!   "files": [
//!     {
//!       "snapshot": {
//!         "path": "/media/movie.mkv",
//!         "container_format": "matroska,webm",
//!         "tracks": [
//!           { "index": 0, "track_type": "video", "codec": "h264" },
//!           { "index": 1, "track_type": "audio", "codec": "aac", "language": "eng", "id": 11 }
//!         ]
//!       },
//!       "language_results": {
//!         "11": { "primary_language": "eng", "primary_percentage": 0.97, "classification": "single_language" }
//!       }
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trackforge_common::{FileSnapshot, Track};
use trackforge_rules::{ClassificationResults, LanguageResults};
use trackforge_workflow::InMemoryProvider;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate snapshot for {0}")]
    Duplicate(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub files: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub snapshot: FileSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_results: Option<LanguageResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_results: Option<ClassificationResults>,
}

impl SnapshotFile {
    pub fn parse(content: &str) -> Result<Self, SnapshotError> {
        let file: SnapshotFile = serde_json::from_str(content)?;
        let mut seen = HashSet::new();
        for entry in &file.files {
            if !seen.insert(entry.snapshot.path.as_path()) {
                return Err(SnapshotError::Duplicate(entry.snapshot.path.clone()));
            }
        }
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Move every entry into a provider the workflow can read from.
    pub fn into_provider(self) -> InMemoryProvider {
        self.files
            .into_iter()
            .fold(InMemoryProvider::new(), |provider, entry| {
                let path = entry.snapshot.path.clone();
                let mut provider = provider.with_snapshot(entry.snapshot);
                if let Some(results) = entry.language_results {
                    provider = provider.with_language_results(&path, results);
                }
                if let Some(results) = entry.classification_results {
                    provider = provider.with_classification_results(&path, results);
                }
                provider
            })
    }
}

/// Tracks to evaluate an expression against: either a full snapshot or a
/// bare list of tracks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum TracksInput {
    Snapshot(FileSnapshot),
    Tracks(Vec<Track>),
}

/// Read a snapshot (or a bare JSON array of tracks) for expression checks.
pub fn load_tracks(path: &Path) -> Result<FileSnapshot, SnapshotError> {
    let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match serde_json::from_str(&content)? {
        TracksInput::Snapshot(snapshot) => snapshot,
        TracksInput::Tracks(tracks) => FileSnapshot::new(path, tracks),
    })
}
