//! Media transcoder capability and its FFmpeg implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use vcomp_models::EncodingConfig;

use crate::cancel::CancelToken;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::directive::RenderDirective;
use crate::error::{MediaError, MediaResult};
use crate::filters::{
    canvas_filter_graph, concat_filter_graph, pad_audio_filter, pad_video_filter,
    silence_source, AUDIO_OUT_LABEL, VIDEO_OUT_LABEL,
};
use crate::fs_utils::ensure_parent_dir;

/// Histogram of wall-clock transcode time, labelled by directive.
pub const FFMPEG_DURATION_SECONDS: &str = "vcomp_ffmpeg_duration_seconds";

/// Capability to render inputs into an output file.
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Render `inputs` according to `directive` into `output`.
    ///
    /// Returns the written path. Implementations stop early when `cancel`
    /// fires and return [`MediaError::Cancelled`].
    async fn transcode(
        &self,
        inputs: &[PathBuf],
        directive: &RenderDirective,
        output: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf>;
}

/// [`MediaTranscoder`] that shells out to `ffmpeg`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    encoding: EncodingConfig,
    timeout_secs: u64,
}

impl FfmpegTranscoder {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            timeout_secs: 0,
        }
    }

    /// Per-invocation timeout. Zero disables it.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }

    /// Translate a directive into an FFmpeg command.
    pub fn build_command(
        &self,
        inputs: &[PathBuf],
        directive: &RenderDirective,
        output: &Path,
    ) -> MediaResult<FfmpegCommand> {
        directive.validate(inputs)?;

        let enc = &self.encoding;
        let first = &inputs[0];

        let cmd = match *directive {
            RenderDirective::Trim { start, duration } => {
                let mut cmd = FfmpegCommand::new(first, output).seek(start);
                if let Some(duration) = duration {
                    cmd = cmd.duration(duration);
                }
                cmd.output_args(enc.video_args())
                    .audio_codec("copy")
                    .output_args(enc.extra_args.clone())
            }
            RenderDirective::TrimAudio { duration } => FfmpegCommand::new(first, output)
                .duration(duration)
                .no_video()
                .output_args(enc.audio_args()),
            RenderDirective::SilenceInject { duration } => FfmpegCommand::new(first, output)
                .lavfi_input(silence_source())
                .duration(duration)
                .map("0:v:0")
                .map("1:a:0")
                .video_codec("copy")
                .output_args(enc.audio_args())
                .faststart(),
            RenderDirective::CanvasFit { fit, canvas } => FfmpegCommand::new(first, output)
                .filter_complex(canvas_filter_graph(fit, canvas))
                .map(VIDEO_OUT_LABEL)
                .map("0:a?")
                .output_args(enc.to_ffmpeg_args())
                .faststart(),
            RenderDirective::Concat => {
                let cmd = inputs
                    .iter()
                    .fold(FfmpegCommand::to_output(output), |cmd, input| cmd.input(input));
                cmd.filter_complex(concat_filter_graph(inputs.len()))
                    .map(VIDEO_OUT_LABEL)
                    .map(AUDIO_OUT_LABEL)
                    .output_args(enc.to_ffmpeg_args())
                    .faststart()
            }
            RenderDirective::PadVideo { extend_by } => FfmpegCommand::new(first, output)
                .video_filter(pad_video_filter(extend_by))
                .no_audio()
                .output_args(enc.video_args())
                .output_args(enc.extra_args.clone()),
            RenderDirective::PadAudio { total } => FfmpegCommand::new(first, output)
                .audio_filter(pad_audio_filter(total))
                .no_video()
                .output_args(enc.audio_args()),
            RenderDirective::Mux => FfmpegCommand::new(first, output)
                .input(&inputs[1])
                .map("0:v:0")
                .map("1:a:0")
                .video_codec("copy")
                .output_args(enc.audio_args())
                .faststart(),
        };

        Ok(cmd)
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        inputs: &[PathBuf],
        directive: &RenderDirective,
        output: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf> {
        for input in inputs {
            if !input.exists() {
                return Err(MediaError::FileNotFound(input.clone()));
            }
        }

        let cmd = self.build_command(inputs, directive, output)?;
        ensure_parent_dir(output).await?;

        let runner = FfmpegRunner::new()
            .with_cancel(cancel.clone())
            .with_timeout(self.timeout_secs);

        let name = directive.name();
        let expected = directive.expected_duration();
        let started = Instant::now();

        info!(directive = %directive, output = %output.display(), "Starting transcode");

        runner
            .run_with_progress(&cmd, move |progress| match expected {
                Some(total) => debug!(
                    directive = name,
                    "Transcode progress: {:.1}% at {:.1}x",
                    progress.percentage_of(total),
                    progress.speed
                ),
                None => debug!(
                    directive = name,
                    "Transcode progress: {:.1}s written at {:.1}x",
                    progress.out_time_secs(),
                    progress.speed
                ),
            })
            .await?;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!(FFMPEG_DURATION_SECONDS, "directive" => name).record(elapsed);

        if !output.exists() {
            return Err(MediaError::ffmpeg_failed(
                format!("{} produced no output at {}", name, output.display()),
                None,
                None,
            ));
        }

        info!(directive = name, elapsed_secs = elapsed, "Transcode complete");
        Ok(output.to_path_buf())
    }
}
