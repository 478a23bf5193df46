//! Codec alias groups and container name normalization.

/// Groups of identifiers that name the same video codec.
const VIDEO_CODEC_GROUPS: &[&[&str]] = &[
    &["hevc", "h265", "h.265", "x265", "hvc1", "hev1"],
    &["h264", "h.264", "avc", "avc1", "x264"],
    &["vp9", "vp09"],
    &["av1", "av01", "libaom-av1"],
    &["mpeg4", "mp4v"],
];

/// Groups of identifiers that name the same audio codec.
const AUDIO_CODEC_GROUPS: &[&[&str]] = &[
    &["truehd", "dolby truehd", "mlp"],
    &["dts-hd", "dts-hd ma", "dtshd", "dts_hd", "dts-hd.ma"],
    &["dts", "dca"],
    &["pcm", "pcm_s16le", "pcm_s24le", "pcm_s32le", "pcm_f32le"],
    &["aac", "aac_latm", "mp4a"],
    &["ac3", "ac-3", "a52"],
    &["eac3", "e-ac-3", "ec3"],
    &["mp3", "mp3float"],
];

/// Groups of identifiers that name the same subtitle codec.
const SUBTITLE_CODEC_GROUPS: &[&[&str]] = &[
    &["subrip", "srt"],
    &["ass", "ssa"],
    &["pgs", "hdmv_pgs_subtitle", "pgssub"],
    &["dvdsub", "dvd_subtitle", "vobsub"],
    &["mov_text", "tx3g"],
];

fn same_group(groups: &[&[&str]], a: &str, b: &str) -> bool {
    groups
        .iter()
        .any(|group| group.contains(&a) && group.contains(&b))
}

/// Whether a video codec matches a target, honoring aliases (`h265` == `hevc`).
pub fn video_codec_matches(actual: Option<&str>, target: &str) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    let actual = actual.trim().to_lowercase();
    let target = target.trim().to_lowercase();
    actual == target || same_group(VIDEO_CODEC_GROUPS, &actual, &target)
}

/// Whether two codec names identify the same codec of any track kind.
pub fn codecs_match(actual: Option<&str>, target: &str) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    let actual = actual.trim().to_lowercase();
    let target = target.trim().to_lowercase();
    actual == target
        || same_group(VIDEO_CODEC_GROUPS, &actual, &target)
        || same_group(AUDIO_CODEC_GROUPS, &actual, &target)
        || same_group(SUBTITLE_CODEC_GROUPS, &actual, &target)
}

/// Normalize a container name as reported by probing tools.
///
/// `matroska,webm` becomes `mkv`, `mov,mp4,m4a,3gp,3g2,mj2` becomes `mp4`.
/// Unrecognized names are returned lower-cased.
pub fn normalize_container_format(container: &str) -> String {
    let container = container.trim().to_lowercase();

    match container.as_str() {
        "matroska" | "matroska,webm" => return "mkv".to_string(),
        "mov,mp4,m4a,3gp,3g2,mj2" => return "mp4".to_string(),
        "quicktime" => return "mov".to_string(),
        _ => {}
    }

    if container.contains("matroska") || container == "webm" {
        "mkv".to_string()
    } else if ["mp4", "m4a", "m4v"].iter().any(|x| container.contains(x)) {
        "mp4".to_string()
    } else if container.contains("mov") {
        "mov".to_string()
    } else if container.contains("avi") {
        "avi".to_string()
    } else {
        container
    }
}
