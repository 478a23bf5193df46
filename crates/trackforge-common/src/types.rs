//! Track and file snapshot types.
//!
//! These are read-only inputs to condition evaluation and phase planning. A
//! metadata provider produces a [`FileSnapshot`]; nothing in trackforge mutates
//! one in place, a fresh snapshot replaces it after re-introspection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

/// Kind of media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    /// Video stream.
    Video,
    /// Audio stream.
    Audio,
    /// Subtitle stream.
    Subtitle,
    /// Attachment (fonts, cover art).
    Attachment,
}

impl TrackType {
    /// All track types in canonical order.
    pub const ALL: [TrackType; 4] = [
        TrackType::Video,
        TrackType::Audio,
        TrackType::Subtitle,
        TrackType::Attachment,
    ];

    /// Lowercase name used in expressions and policy files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
            Self::Attachment => "attachment",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "subtitle" => Ok(Self::Subtitle),
            "attachment" => Ok(Self::Attachment),
            other => Err(Error::invalid_value(
                "track_type",
                format!("'{}' is not one of video, audio, subtitle, attachment", other),
            )),
        }
    }
}

/// A single track inside a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Stream index within the container.
    pub index: u32,
    /// Track kind.
    pub track_type: TrackType,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_forced: bool,
    #[serde(default)]
    pub channels: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Persistent identifier used to look up analysis results.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

impl Track {
    /// Create a track with only its index and type set.
    pub fn new(index: u32, track_type: TrackType) -> Self {
        Self {
            index,
            track_type,
            codec: None,
            language: None,
            title: None,
            is_default: false,
            is_forced: false,
            channels: None,
            width: None,
            height: None,
            id: None,
            duration_seconds: None,
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn as_forced(mut self) -> Self {
        self.is_forced = true;
        self
    }
}

/// Container-level tags, keys lower-cased.
pub type ContainerTags = HashMap<String, String>;

/// External metadata keyed by plugin name, then field name.
pub type PluginMetadata = HashMap<String, HashMap<String, serde_json::Value>>;

/// Current state of a file as reported by a metadata provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: PathBuf,
    #[serde(default)]
    pub container_format: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub container_tags: Option<ContainerTags>,
    #[serde(default)]
    pub plugin_metadata: Option<PluginMetadata>,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>, tracks: Vec<Track>) -> Self {
        Self {
            path: path.into(),
            tracks,
            ..Default::default()
        }
    }

    /// First video track, if any.
    pub fn video_track(&self) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|t| t.track_type == TrackType::Video)
    }

    /// Tracks of the given kind, in container order.
    pub fn tracks_of(&self, track_type: TrackType) -> impl Iterator<Item = &Track> {
        self.tracks
            .iter()
            .filter(move |t| t.track_type == track_type)
    }

    /// Container name, falling back to the file extension.
    pub fn container(&self) -> String {
        self.container_format.clone().unwrap_or_else(|| {
            self.path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default()
        })
    }

    /// File name component for messages.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_type_parse() {
        assert_eq!("audio".parse::<TrackType>().unwrap(), TrackType::Audio);
        assert_eq!("Video".parse::<TrackType>().unwrap(), TrackType::Video);
        assert!("chapter".parse::<TrackType>().is_err());
    }

    #[test]
    fn test_track_type_display() {
        for track_type in TrackType::ALL {
            assert_eq!(
                track_type.to_string().parse::<TrackType>().unwrap(),
                track_type
            );
        }
    }

    #[test]
    fn test_track_builder() {
        let track = Track::new(1, TrackType::Audio)
            .with_codec("aac")
            .with_language("eng")
            .with_channels(2)
            .as_default();
        assert_eq!(track.codec.as_deref(), Some("aac"));
        assert_eq!(track.channels, Some(2));
        assert!(track.is_default);
        assert!(!track.is_forced);
    }

    #[test]
    fn test_track_deserialize_defaults() {
        let track: Track =
            serde_json::from_str(r#"{"index": 2, "track_type": "subtitle"}"#).unwrap();
        assert_eq!(track.track_type, TrackType::Subtitle);
        assert!(track.language.is_none());
        assert!(!track.is_default);
    }

    #[test]
    fn test_snapshot_helpers() {
        let snapshot = FileSnapshot::new(
            "/media/Movie.mkv",
            vec![
                Track::new(0, TrackType::Video).with_dimensions(1920, 1080),
                Track::new(1, TrackType::Audio),
                Track::new(2, TrackType::Audio),
            ],
        );
        assert_eq!(snapshot.video_track().unwrap().height, Some(1080));
        assert_eq!(snapshot.tracks_of(TrackType::Audio).count(), 2);
        assert_eq!(snapshot.container(), "mkv");
        assert_eq!(snapshot.file_name(), "Movie.mkv");
    }
}
