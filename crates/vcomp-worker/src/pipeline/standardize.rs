//! Fit each clip onto the job canvas.

use std::time::Instant;
use tracing::{debug, info};

use vcomp_media::{fit_policy, RenderDirective};
use vcomp_models::{CanvasSpec, ClipSpec};

use super::StageContext;
use crate::error::{ComposeError, ComposeResult, Stage};
use crate::metrics;

/// Standardize `clip` to `canvas`.
///
/// A clip whose probed resolution already equals the canvas (compared as
/// `WxH`) is returned unchanged and never re-encoded. Everything else goes
/// through the fit chosen by [`fit_policy`].
pub async fn standardize(
    ctx: &StageContext,
    clip: &ClipSpec,
    canvas: CanvasSpec,
) -> ComposeResult<ClipSpec> {
    let index = clip.sequence_index;
    let target = canvas.resolution();

    let info = ctx
        .probe
        .probe(&clip.source_path)
        .await
        .map_err(|source| ComposeError::Probe {
            sequence_index: Some(index),
            path: clip.source_path.clone(),
            source,
        })?;

    if info.resolution().to_string() == target.to_string() {
        debug!(
            job_id = %ctx.job_id,
            sequence_index = index,
            resolution = %target,
            "Clip already at canvas resolution"
        );
        metrics::record_standardize_skipped();
        return Ok(clip.clone());
    }

    let fit = fit_policy(clip.orientation, canvas.orientation, clip.blur_edges);
    let directive = RenderDirective::CanvasFit {
        fit,
        canvas: target,
    };
    let output = ctx.temp.clip_path(index, "standardized");
    let started = Instant::now();

    let written = ctx
        .transcoder
        .transcode(&[clip.source_path.clone()], &directive, &output, &ctx.cancel)
        .await
        .map_err(|source| ComposeError::Standardize {
            sequence_index: index,
            source,
        })?;

    metrics::record_stage_duration(Stage::Standardize.as_str(), started.elapsed().as_secs_f64());
    info!(
        job_id = %ctx.job_id,
        sequence_index = index,
        from = %info.resolution(),
        to = %target,
        fit = fit.as_str(),
        "Standardized clip"
    );

    Ok(clip.with_source(written))
}
