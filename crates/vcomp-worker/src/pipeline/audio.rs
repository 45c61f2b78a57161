//! Guarantee every clip carries an audio stream.
//!
//! Concatenation pairs one video and one audio stream per clip. A clip without
//! audio gets a silent track as long as its video stream, and the result is
//! probed again before it is handed on.

use std::time::Instant;
use tracing::info;

use vcomp_media::RenderDirective;
use vcomp_models::ClipSpec;

use super::StageContext;
use crate::error::{ComposeError, ComposeResult, Stage};
use crate::metrics;

pub async fn ensure_audio(ctx: &StageContext, clip: &ClipSpec) -> ComposeResult<ClipSpec> {
    let index = clip.sequence_index;

    let info = ctx
        .probe
        .probe(&clip.source_path)
        .await
        .map_err(|source| ComposeError::Probe {
            sequence_index: Some(index),
            path: clip.source_path.clone(),
            source,
        })?;

    if info.has_audio_stream {
        return Ok(clip.clone());
    }

    // Silence follows the video stream, not the requested play duration
    let duration = info
        .video_length()
        .filter(|d| *d > 0.0)
        .ok_or_else(|| ComposeError::audio_injection(index, "clip has no measurable video stream"))?;

    let started = Instant::now();
    let directive = RenderDirective::SilenceInject { duration };
    let output = ctx.temp.clip_path(index, "audio");

    let written = ctx
        .transcoder
        .transcode(&[clip.source_path.clone()], &directive, &output, &ctx.cancel)
        .await
        .map_err(|source| ComposeError::AudioInjection {
            sequence_index: index,
            reason: format!("{} failed", directive),
            source: Some(source),
        })?;

    let verified = ctx
        .probe
        .probe(&written)
        .await
        .map_err(|source| ComposeError::AudioInjection {
            sequence_index: index,
            reason: "could not probe injected output".to_string(),
            source: Some(source),
        })?;

    if !verified.has_audio_stream {
        return Err(ComposeError::audio_injection(
            index,
            format!("{} still has no audio stream", written.display()),
        ));
    }

    metrics::record_silence_injected();
    metrics::record_stage_duration(Stage::AudioPresence.as_str(), started.elapsed().as_secs_f64());
    info!(
        job_id = %ctx.job_id,
        sequence_index = index,
        silence_secs = duration,
        "Injected silent audio track"
    );

    Ok(clip.with_source(written))
}
