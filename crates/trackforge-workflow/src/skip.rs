//! Evaluation of a phase's `skip_when` conditions.
//!
//! Each checker returns a [`SkipReason`] when its condition matches and
//! `None` otherwise, including when the value it needs is unknown.

use tracing::debug;
use trackforge_common::{
    normalize_container_format, resolution_height, resolution_label, video_codec_matches,
    FileSnapshot, Track, TrackType,
};

use crate::phase::{SkipMode, SkipWhen};
use crate::result::SkipReason;

type Checker = fn(&SkipWhen, &Facts<'_>) -> Option<Option<SkipReason>>;

/// Values the checkers look at, gathered once.
struct Facts<'a> {
    snapshot: &'a FileSnapshot,
    video: Option<&'a Track>,
    file_size: Option<u64>,
}

/// Checkers in evaluation order. The outer `Option` is `None` when the
/// condition is not configured.
const CHECKERS: [(&str, Checker); 10] = [
    ("video_codec", check_video_codec),
    ("audio_codec_exists", check_audio_codec_exists),
    ("subtitle_language_exists", check_subtitle_language_exists),
    ("container", check_container),
    ("resolution", check_resolution),
    ("resolution_under", check_resolution_under),
    ("file_size_under", check_file_size_under),
    ("file_size_over", check_file_size_over),
    ("duration_under", check_duration_under),
    ("duration_over", check_duration_over),
];

/// Decide whether a phase should be skipped for this file.
///
/// Only the snapshot is consulted. A snapshot without `size_bytes` never
/// matches the file size conditions.
pub fn evaluate_skip_when(skip: &SkipWhen, snapshot: &FileSnapshot) -> Option<SkipReason> {
    let facts = Facts {
        snapshot,
        video: snapshot.video_track(),
        file_size: snapshot.size_bytes,
    };

    match skip.mode {
        SkipMode::Any => CHECKERS
            .iter()
            .find_map(|(_, check)| check(skip, &facts).flatten()),
        SkipMode::All => {
            let mut matched = Vec::new();
            for (name, check) in CHECKERS {
                match check(skip, &facts) {
                    None => continue,
                    Some(Some(_)) => matched.push(name),
                    Some(None) => return None,
                }
            }
            if matched.is_empty() {
                return None;
            }
            let names = matched.join(", ");
            Some(SkipReason::skip_when(
                format!("all conditions matched: {}", names),
                "skip_when(all)",
                names,
            ))
        }
    }
}

fn check_video_codec(skip: &SkipWhen, facts: &Facts<'_>) -> Option<Option<SkipReason>> {
    if skip.video_codec.is_empty() {
        return None;
    }
    let Some(codec) = facts.video.and_then(|v| v.codec.as_deref()) else {
        debug!("Cannot evaluate video_codec condition: no video codec known");
        return Some(None);
    };
    let matched = skip
        .video_codec
        .iter()
        .any(|target| video_codec_matches(Some(codec), target));
    Some(matched.then(|| {
        SkipReason::skip_when(
            format!("video_codec matches [{}]", skip.video_codec.join(", ")),
            "video_codec",
            codec,
        )
    }))
}

fn check_audio_codec_exists(skip: &SkipWhen, facts: &Facts<'_>) -> Option<Option<SkipReason>> {
    let target = skip.audio_codec_exists.as_deref()?.to_lowercase();
    Some(
        facts
            .snapshot
            .tracks_of(TrackType::Audio)
            .filter_map(|t| t.codec.as_deref())
            .find(|codec| codec.to_lowercase() == target)
            .map(|codec| {
                SkipReason::skip_when(
                    format!("audio_codec_exists: {}", target),
                    "audio_codec_exists",
                    codec,
                )
            }),
    )
}

fn check_subtitle_language_exists(
    skip: &SkipWhen,
    facts: &Facts<'_>,
) -> Option<Option<SkipReason>> {
    let target = skip.subtitle_language_exists.as_deref()?.to_lowercase();
    Some(
        facts
            .snapshot
            .tracks_of(TrackType::Subtitle)
            .filter_map(|t| t.language.as_deref())
            .find(|lang| lang.to_lowercase() == target)
            .map(|lang| {
                SkipReason::skip_when(
                    format!("subtitle_language_exists: {}", target),
                    "subtitle_language_exists",
                    lang,
                )
            }),
    )
}

fn check_container(skip: &SkipWhen, facts: &Facts<'_>) -> Option<Option<SkipReason>> {
    if skip.container.is_empty() {
        return None;
    }
    let actual = facts.snapshot.container();
    if actual.is_empty() {
        return Some(None);
    }
    let normalized = normalize_container_format(&actual);
    let matched = skip
        .container
        .iter()
        .any(|target| normalize_container_format(target) == normalized);
    Some(matched.then(|| {
        SkipReason::skip_when(
            format!("container matches [{}]", skip.container.join(", ")),
            "container",
            actual.clone(),
        )
    }))
}

fn video_height(facts: &Facts<'_>, condition: &str) -> Option<u32> {
    let height = facts.video.and_then(|v| v.height);
    if height.is_none() {
        debug!("Cannot evaluate {} condition: video height unknown", condition);
    }
    height
}

fn check_resolution(skip: &SkipWhen, facts: &Facts<'_>) -> Option<Option<SkipReason>> {
    let target = skip.resolution.as_deref()?;
    let Some(height) = video_height(facts, "resolution") else {
        return Some(None);
    };
    let actual = resolution_label(height);
    let matched = resolution_height(target)
        .map(resolution_label)
        .is_some_and(|wanted| wanted == actual);
    Some(matched.then(|| {
        SkipReason::skip_when(
            format!("resolution matches {}", target),
            "resolution",
            actual,
        )
    }))
}

fn check_resolution_under(skip: &SkipWhen, facts: &Facts<'_>) -> Option<Option<SkipReason>> {
    let threshold = skip.resolution_under.as_ref()?;
    let Some(height) = video_height(facts, "resolution_under") else {
        return Some(None);
    };
    let actual = resolution_label(height);
    Some((height < threshold.value).then(|| {
        SkipReason::skip_when(
            format!("resolution ({}) under {}", actual, threshold.text),
            "resolution_under",
            actual,
        )
    }))
}

fn check_file_size_under(skip: &SkipWhen, facts: &Facts<'_>) -> Option<Option<SkipReason>> {
    let threshold = skip.file_size_under.as_ref()?;
    Some(
        facts
            .file_size
            .filter(|size| *size < threshold.value)
            .map(|size| {
                SkipReason::skip_when(
                    format!("file_size ({} bytes) under {}", size, threshold.text),
                    "file_size_under",
                    size.to_string(),
                )
            }),
    )
}

fn check_file_size_over(skip: &SkipWhen, facts: &Facts<'_>) -> Option<Option<SkipReason>> {
    let threshold = skip.file_size_over.as_ref()?;
    Some(
        facts
            .file_size
            .filter(|size| *size > threshold.value)
            .map(|size| {
                SkipReason::skip_when(
                    format!("file_size ({} bytes) over {}", size, threshold.text),
                    "file_size_over",
                    size.to_string(),
                )
            }),
    )
}

fn video_duration(facts: &Facts<'_>) -> Option<f64> {
    let duration = facts.video.and_then(|v| v.duration_seconds);
    if duration.is_none() {
        debug!("Cannot evaluate duration condition: duration unknown");
    }
    duration
}

fn check_duration_under(skip: &SkipWhen, facts: &Facts<'_>) -> Option<Option<SkipReason>> {
    let threshold = skip.duration_under.as_ref()?;
    Some(
        video_duration(facts)
            .filter(|d| *d < threshold.value)
            .map(|d| {
                SkipReason::skip_when(
                    format!("duration ({:.1}s) under {}", d, threshold.text),
                    "duration_under",
                    format!("{:.1}s", d),
                )
            }),
    )
}

fn check_duration_over(skip: &SkipWhen, facts: &Facts<'_>) -> Option<Option<SkipReason>> {
    let threshold = skip.duration_over.as_ref()?;
    Some(
        video_duration(facts)
            .filter(|d| *d > threshold.value)
            .map(|d| {
                SkipReason::skip_when(
                    format!("duration ({:.1}s) over {}", d, threshold.text),
                    "duration_over",
                    format!("{:.1}s", d),
                )
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Threshold;
    use crate::result::SkipReasonKind;

    fn make_snapshot(codec: &str, height: u32, size: u64, duration: f64) -> FileSnapshot {
        let mut snapshot = FileSnapshot::new(
            "/nonexistent/movie.mkv",
            vec![
                Track::new(0, TrackType::Video)
                    .with_codec(codec)
                    .with_dimensions(height * 16 / 9, height)
                    .with_duration(duration),
                Track::new(1, TrackType::Audio)
                    .with_codec("aac")
                    .with_language("eng"),
                Track::new(2, TrackType::Subtitle).with_language("eng"),
            ],
        );
        snapshot.container_format = Some("matroska,webm".into());
        snapshot.size_bytes = Some(size);
        snapshot
    }

    #[test]
    fn test_video_codec_alias_match() {
        let skip = SkipWhen {
            video_codec: vec!["hevc".into(), "av1".into()],
            ..Default::default()
        };
        let reason = evaluate_skip_when(&skip, &make_snapshot("h265", 1080, 1, 1.0)).unwrap();
        assert_eq!(reason.kind, SkipReasonKind::SkipWhen);
        assert_eq!(reason.message, "video_codec matches [hevc, av1]");
        assert_eq!(reason.condition_value.as_deref(), Some("h265"));

        assert!(evaluate_skip_when(&skip, &make_snapshot("h264", 1080, 1, 1.0)).is_none());
    }

    #[test]
    fn test_resolution_under() {
        let skip = SkipWhen {
            resolution_under: Some(Threshold {
                value: 1080,
                text: "1080p".into(),
            }),
            ..Default::default()
        };
        let reason = evaluate_skip_when(&skip, &make_snapshot("h264", 720, 1, 1.0)).unwrap();
        assert_eq!(reason.message, "resolution (720p) under 1080p");
        assert!(evaluate_skip_when(&skip, &make_snapshot("h264", 1080, 1, 1.0)).is_none());
    }

    #[test]
    fn test_resolution_exact_accepts_4k_alias() {
        let skip = SkipWhen {
            resolution: Some("4k".into()),
            ..Default::default()
        };
        let reason = evaluate_skip_when(&skip, &make_snapshot("h264", 2160, 1, 1.0)).unwrap();
        assert_eq!(reason.message, "resolution matches 4k");
    }

    #[test]
    fn test_file_size_unknown_does_not_touch_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("movie.mkv");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let mut snapshot = make_snapshot("h264", 1080, 0, 1.0);
        snapshot.path = path;
        snapshot.size_bytes = None;

        let skip = SkipWhen {
            file_size_over: Some(Threshold {
                value: 1024,
                text: "1KB".into(),
            }),
            ..Default::default()
        };
        assert!(evaluate_skip_when(&skip, &snapshot).is_none());

        snapshot.size_bytes = Some(4096);
        let reason = evaluate_skip_when(&skip, &snapshot).unwrap();
        assert_eq!(reason.condition_name.as_deref(), Some("file_size_over"));
    }

    #[test]
    fn test_file_size_and_duration() {
        let skip = SkipWhen {
            file_size_under: Some(Threshold {
                value: 500 * 1024 * 1024,
                text: "500MB".into(),
            }),
            ..Default::default()
        };
        let reason = evaluate_skip_when(&skip, &make_snapshot("h264", 1080, 1000, 1.0)).unwrap();
        assert_eq!(reason.message, "file_size (1000 bytes) under 500MB");

        let skip = SkipWhen {
            duration_under: Some(Threshold {
                value: 1800.0,
                text: "30min".into(),
            }),
            ..Default::default()
        };
        let reason = evaluate_skip_when(&skip, &make_snapshot("h264", 1080, 1, 12.0)).unwrap();
        assert_eq!(reason.message, "duration (12.0s) under 30min");
    }

    #[test]
    fn test_container_normalized() {
        let skip = SkipWhen {
            container: vec!["mkv".into()],
            ..Default::default()
        };
        let reason = evaluate_skip_when(&skip, &make_snapshot("h264", 1080, 1, 1.0)).unwrap();
        assert_eq!(reason.message, "container matches [mkv]");
    }

    #[test]
    fn test_track_existence_checks() {
        let skip = SkipWhen {
            audio_codec_exists: Some("AAC".into()),
            ..Default::default()
        };
        let reason = evaluate_skip_when(&skip, &make_snapshot("h264", 1080, 1, 1.0)).unwrap();
        assert_eq!(reason.message, "audio_codec_exists: aac");

        let skip = SkipWhen {
            subtitle_language_exists: Some("jpn".into()),
            ..Default::default()
        };
        assert!(evaluate_skip_when(&skip, &make_snapshot("h264", 1080, 1, 1.0)).is_none());
    }

    #[test]
    fn test_all_mode_requires_every_condition() {
        let mut skip = SkipWhen {
            video_codec: vec!["hevc".into()],
            file_size_under: Some(Threshold {
                value: 2048,
                text: "2k".into(),
            }),
            mode: SkipMode::All,
            ..Default::default()
        };
        let reason = evaluate_skip_when(&skip, &make_snapshot("hevc", 1080, 1000, 1.0)).unwrap();
        assert_eq!(
            reason.message,
            "all conditions matched: video_codec, file_size_under"
        );

        // codec matches but size does not
        assert!(evaluate_skip_when(&skip, &make_snapshot("hevc", 1080, 4096, 1.0)).is_none());

        skip.mode = SkipMode::Any;
        assert!(evaluate_skip_when(&skip, &make_snapshot("hevc", 1080, 4096, 1.0)).is_some());
    }

    #[test]
    fn test_unknown_values_never_match() {
        let skip = SkipWhen {
            video_codec: vec!["hevc".into()],
            file_size_under: Some(Threshold {
                value: u64::MAX,
                text: "huge".into(),
            }),
            ..Default::default()
        };
        let snapshot = FileSnapshot::new("/nonexistent/audio-only.mka", vec![]);
        assert!(evaluate_skip_when(&skip, &snapshot).is_none());
    }
}
