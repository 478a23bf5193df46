//! Container conversion and video transcode planning.

use tracing::debug;
use trackforge_common::{normalize_container_format, video_codec_matches, TrackType};

use super::PlanContext;
use crate::phase::{ContainerConfig, TranscodeConfig};
use crate::plan::{Plan, PlannedAction};

pub fn plan_container(config: &ContainerConfig, ctx: &PlanContext<'_>) -> Plan {
    let current = normalize_container_format(&ctx.snapshot.container());
    let mut plan = Plan::default();
    if current != config.target {
        plan.push(PlannedAction::ConvertContainer {
            from: current,
            to: config.target.clone(),
        });
    }
    plan
}

/// Plan a transcode of the first video track when its codec is not already
/// acceptable or it exceeds the height limit.
pub fn plan_transcode(config: &TranscodeConfig, ctx: &PlanContext<'_>) -> Plan {
    let mut plan = Plan::default();
    if ctx.skip_flags.skip_video_transcode {
        debug!("Video transcode skipped by conditional rule");
        return plan;
    }
    let Some(video) = ctx.tracks_of(TrackType::Video).next() else {
        return plan;
    };

    let codec = video.codec.as_deref();
    let codec_ok = video_codec_matches(codec, &config.video_codec)
        || config
            .skip_if_codec_matches
            .iter()
            .any(|c| video_codec_matches(codec, c));
    let too_tall = match (config.max_height, video.height) {
        (Some(max), Some(height)) => height > max,
        _ => false,
    };

    if codec_ok && !too_tall {
        debug!(
            "Video track[{}] already {} within limits",
            video.index,
            codec.unwrap_or("unknown")
        );
        return plan;
    }

    plan.push(PlannedAction::TranscodeVideo {
        index: video.index,
        from: video.codec.clone(),
        to: config.video_codec.clone(),
        max_height: if too_tall { config.max_height } else { None },
    });
    plan
}
