//! Job orchestration.
//!
//! Per-clip work (probe, splice, audio presence, standardization) runs
//! concurrently under a semaphore. The first real failure cancels the
//! siblings' in-flight transcodes. Sequencing, concatenation and alignment
//! then run one after another over the full set of ready clips.

use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn, Instrument};

use vcomp_media::fs_utils::move_file;
use vcomp_media::{CancelHandle, FfmpegTranscoder, FfprobeProbe, MediaProbe, MediaTranscoder};
use vcomp_models::{CanvasSpec, ClipRequest, ClipSpec, CompositionJob};

use crate::config::ComposerConfig;
use crate::error::{ComposeError, ComposeResult, Stage};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::{
    align_and_merge, check_audio_track, concatenate, ensure_audio, sequence, splice, standardize,
    validate_requests, StageContext, TempArtifact, TempLifecycle,
};

/// Composes clip jobs into single output files.
pub struct Composer {
    probe: Arc<dyn MediaProbe>,
    transcoder: Arc<dyn MediaTranscoder>,
    config: ComposerConfig,
}

impl Composer {
    pub fn new(
        probe: Arc<dyn MediaProbe>,
        transcoder: Arc<dyn MediaTranscoder>,
        config: ComposerConfig,
    ) -> Self {
        Self {
            probe,
            transcoder,
            config,
        }
    }

    /// Composer backed by the `ffprobe` and `ffmpeg` binaries.
    pub fn with_ffmpeg(config: ComposerConfig) -> Self {
        let transcoder = FfmpegTranscoder::new(config.encoding.clone())
            .with_timeout(config.ffmpeg_timeout.as_secs());
        Self::new(Arc::new(FfprobeProbe::new()), Arc::new(transcoder), config)
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Run a job to completion.
    ///
    /// Returns the delivered output path, or the first fatal error with its
    /// stage and clip. Intermediates are removed on success and kept on
    /// failure.
    pub async fn compose(&self, job: CompositionJob) -> ComposeResult<PathBuf> {
        let logger = JobLogger::new(&job.id);
        let started = Instant::now();

        let result = self.run(&job, &logger).instrument(logger.span()).await;

        match &result {
            Ok(path) => {
                metrics::record_job_completed(started.elapsed().as_secs_f64());
                logger.completed(path, started.elapsed());
            }
            Err(e) => {
                metrics::record_job_failed(e.stage().as_str());
                logger.failed(e);
            }
        }

        result
    }

    async fn run(&self, job: &CompositionJob, logger: &JobLogger) -> ComposeResult<PathBuf> {
        let indices = validate_requests(&job.clips)?;

        if !job.id.is_path_safe() {
            return Err(ComposeError::invalid_job(format!(
                "job id {:?} may only contain ASCII letters, digits, '-' and '_'",
                job.id.as_str()
            )));
        }

        let temp = TempLifecycle::new(&self.config.work_dir, &job.id);
        let output = job.output_file();
        if temp.is_temp(&output) || output.starts_with(&self.config.work_dir) {
            return Err(ComposeError::invalid_job(format!(
                "output {} must be outside the scratch root",
                output.display()
            )));
        }

        logger.started(job.clips.len(), job.canvas().resolution(), job.standard);

        // Audio track format is checked before any clip work
        check_audio_track(self.probe.as_ref(), &job.audio_track).await?;

        temp.prepare().await?;

        let cancel = CancelHandle::new();
        let ctx = StageContext::new(
            job.id.clone(),
            self.probe.clone(),
            self.transcoder.clone(),
            temp.clone(),
            cancel.token(),
        );

        let ready = self.process_clips(&ctx, job, &indices, &cancel).await?;
        let ordered = sequence(ready)?;

        let concatenated = concatenate(&ctx, &ordered, &temp.job_path("concatenated.mp4")).await?;
        logger.stage(Stage::Concatenation, "Clips concatenated");

        let consumed: Vec<TempArtifact> = ordered
            .iter()
            .filter_map(|c| temp.artifact(&c.source_path, Stage::Standardize, Some(c.sequence_index)))
            .collect();
        temp.cleanup(&consumed).await;

        let outcome = align_and_merge(
            &ctx,
            &concatenated,
            &job.audio_track,
            &job.policy(),
            &temp.job_path("merged.mp4"),
        )
        .await?;
        logger.stage(Stage::Alignment, &format!("Audio aligned: {}", outcome.action));

        let mut consumed: Vec<TempArtifact> = temp
            .artifact(&concatenated, Stage::Concatenation, None)
            .into_iter()
            .collect();
        if let Some(adjusted) = &outcome.adjusted {
            consumed.extend(temp.artifact(adjusted, Stage::Alignment, None));
        }
        temp.cleanup(&consumed).await;

        move_file(&outcome.output, &output)
            .await
            .map_err(|source| ComposeError::Delivery {
                path: output.clone(),
                source,
            })?;

        temp.remove_scratch().await;
        Ok(output)
    }

    /// Run the per-clip stages for every clip.
    async fn process_clips(
        &self,
        ctx: &StageContext,
        job: &CompositionJob,
        indices: &[u32],
        cancel: &CancelHandle,
    ) -> ComposeResult<Vec<ClipSpec>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_clip_parallel));
        let canvas = job.canvas();

        let mut tasks: FuturesUnordered<_> = job
            .clips
            .iter()
            .zip(indices.iter().copied())
            .map(|(request, index)| {
                let semaphore = semaphore.clone();
                async move {
                    match semaphore.acquire().await {
                        Ok(_permit) => process_clip(ctx, index, request, canvas).await,
                        Err(_) => Err(ComposeError::invalid_job("clip semaphore closed")),
                    }
                }
            })
            .collect();

        let mut ready = Vec::with_capacity(job.clips.len());
        let mut first_error: Option<ComposeError> = None;

        while let Some(result) = tasks.next().await {
            match result {
                Ok(clip) => ready.push(clip),
                Err(e) => {
                    if !cancel.is_cancelled() {
                        warn!(
                            job_id = %ctx.job_id,
                            stage = %e.stage(),
                            sequence_index = ?e.sequence_index(),
                            "Clip failed, cancelling remaining clips"
                        );
                        cancel.cancel();
                    }
                    let replace = match &first_error {
                        None => true,
                        Some(current) => current.is_cancelled() && !e.is_cancelled(),
                    };
                    if replace {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => {
                // Finished siblings are not needed anymore; the failed clip's files stay
                let extra: Vec<TempArtifact> = ready
                    .iter()
                    .filter_map(|c| {
                        ctx.temp
                            .artifact(&c.source_path, Stage::Standardize, Some(c.sequence_index))
                    })
                    .collect();
                ctx.temp.cleanup(&extra).await;
                Err(e)
            }
            None => Ok(ready),
        }
    }
}

/// Probe, splice, ensure audio and standardize one clip.
///
/// Each consumed intermediate is deleted as soon as the next stage has
/// produced its replacement.
async fn process_clip(
    ctx: &StageContext,
    index: u32,
    request: &ClipRequest,
    canvas: CanvasSpec,
) -> ComposeResult<ClipSpec> {
    if ctx.cancel.is_cancelled() {
        return Err(ComposeError::Probe {
            sequence_index: Some(index),
            path: request.source_path.clone(),
            source: vcomp_media::MediaError::Cancelled,
        });
    }

    let info = ctx
        .probe
        .probe(&request.source_path)
        .await
        .map_err(|source| ComposeError::Probe {
            sequence_index: Some(index),
            path: request.source_path.clone(),
            source,
        })?;

    let duration = info.video_length().ok_or_else(|| ComposeError::Probe {
        sequence_index: Some(index),
        path: request.source_path.clone(),
        source: vcomp_media::MediaError::invalid_media("source has no video stream"),
    })?;

    let clip = ClipSpec::from_request(index, request, info.orientation(), duration);
    ctx.logger.clip(
        index,
        &format!("Probed {} {}, {:.3}s", clip.orientation, info.resolution(), duration),
    );

    let spliced = splice(ctx, &clip).await?;

    let with_audio = ensure_audio(ctx, &spliced).await?;
    release(ctx, &spliced, &with_audio, Stage::Splice).await;

    let standardized = standardize(ctx, &with_audio, canvas).await?;
    release(ctx, &with_audio, &standardized, Stage::AudioPresence).await;

    metrics::record_clip_processed();
    info!(
        job_id = %ctx.job_id,
        sequence_index = index,
        path = %standardized.source_path.display(),
        "Clip ready"
    );

    Ok(standardized)
}

/// Delete `previous` once `next` superseded it with a different file.
async fn release(ctx: &StageContext, previous: &ClipSpec, next: &ClipSpec, stage: Stage) {
    if previous.source_path == next.source_path {
        return;
    }
    if let Some(artifact) = ctx
        .temp
        .artifact(&previous.source_path, stage, Some(previous.sequence_index))
    {
        ctx.temp.cleanup(&[artifact]).await;
    }
}
