//! Shared fixtures for root integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

pub const POLICY: &str = r#"
name = "library"
description = "Keep English, prefer HEVC"

[config]
audio_languages = ["eng"]
on_error = "continue"

[[phases]]
name = "normalize"
audio_filter = { languages = ["eng"] }
subtitle_filter = { languages = ["eng"], preserve_forced = true }

[[phases]]
name = "transcode"
run_if = { phase_modified = "normalize" }
skip_when = { video_codec = ["hevc"] }
transcode = { video_codec = "hevc" }

[[phases]]
name = "guard"
[[phases.conditional]]
name = "needs-english"
when = "not exists(audio, lang == eng)"
then = [{ fail = "no English audio in {filename}" }]
"#;

pub const SNAPSHOTS: &str = r#"{
    "files": [
        {
            "snapshot": {
                "path": "/media/movie.mkv",
                "container_format": "matroska,webm",
                "tracks": [
                    { "index": 0, "track_type": "video", "codec": "h264", "width": 1920, "height": 1080 },
                    { "index": 1, "track_type": "audio", "codec": "ac3", "language": "eng", "channels": 6 },
                    { "index": 2, "track_type": "audio", "codec": "ac3", "language": "fre", "channels": 6 },
                    { "index": 3, "track_type": "subtitle", "codec": "subrip", "language": "fre" }
                ]
            }
        },
        {
            "snapshot": {
                "path": "/media/anime.mkv",
                "tracks": [
                    { "index": 0, "track_type": "video", "codec": "hevc" },
                    { "index": 1, "track_type": "audio", "codec": "flac", "language": "jpn" }
                ]
            }
        }
    ]
}"#;

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn policy(&self) -> PathBuf {
        self.write("policy.toml", POLICY)
    }

    pub fn snapshots(&self) -> PathBuf {
        self.write("snapshots.json", SNAPSHOTS)
    }
}
