//! Join ordered clips into one continuous file.

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use vcomp_media::fs_utils::remove_file_if_exists;
use vcomp_media::RenderDirective;
use vcomp_models::{ClipSpec, ALIGNMENT_TOLERANCE_SECS};

use super::StageContext;
use crate::error::{ComposeError, ComposeResult, Stage};
use crate::metrics;

/// Concatenate `ordered` clips, in the given order, into `output`.
///
/// Always re-encodes. A failed run leaves no file at `output`.
pub async fn concatenate(
    ctx: &StageContext,
    ordered: &[ClipSpec],
    output: &Path,
) -> ComposeResult<PathBuf> {
    let inputs: Vec<PathBuf> = ordered.iter().map(|c| c.source_path.clone()).collect();
    let started = Instant::now();

    let written = match ctx
        .transcoder
        .transcode(&inputs, &RenderDirective::Concat, output, &ctx.cancel)
        .await
    {
        Ok(path) => path,
        Err(source) => {
            if let Err(e) = remove_file_if_exists(output).await {
                warn!(path = %output.display(), error = %e, "Failed to discard partial concatenation");
            }
            return Err(ComposeError::Concatenation { source });
        }
    };

    metrics::record_stage_duration(Stage::Concatenation.as_str(), started.elapsed().as_secs_f64());

    let expected: f64 = ordered.iter().map(ClipSpec::expected_duration).sum();
    match ctx.probe.probe(&written).await {
        Ok(info) => {
            let actual = info.video_length().unwrap_or(0.0);
            if (actual - expected).abs() >= ALIGNMENT_TOLERANCE_SECS {
                warn!(
                    job_id = %ctx.job_id,
                    expected_secs = expected,
                    actual_secs = actual,
                    "Concatenated duration differs from the sum of its clips"
                );
            }
        }
        Err(e) => warn!(job_id = %ctx.job_id, error = %e, "Could not verify concatenated duration"),
    }

    info!(
        job_id = %ctx.job_id,
        clips = ordered.len(),
        order = ?ordered.iter().map(|c| c.sequence_index).collect::<Vec<_>>(),
        "Concatenated clips"
    );

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{context, MockProbe, MockTranscoder};
    use tempfile::TempDir;
    use vcomp_media::{MediaError, MediaStreamInfo};
    use vcomp_models::{ClipRequest, Orientation};

    fn spec(index: u32) -> ClipSpec {
        let request = ClipRequest::new(index, format!("/scratch/job-test/clip-{index:03}-standardized.mp4"));
        ClipSpec::from_request(index, &request, Orientation::Landscape, 4.0)
    }

    #[tokio::test]
    async fn test_inputs_follow_given_order() {
        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_transcode()
            .withf(|inputs, directive, _, _| {
                *directive == RenderDirective::Concat
                    && inputs.len() == 3
                    && inputs[0].ends_with("clip-000-standardized.mp4")
                    && inputs[1].ends_with("clip-001-standardized.mp4")
                    && inputs[2].ends_with("clip-005-standardized.mp4")
            })
            .times(1)
            .returning(|_, _, output, _| Ok(output.to_path_buf()));
        let mut probe = MockProbe::new();
        probe
            .expect_probe()
            .returning(|_| Ok(MediaStreamInfo::video(1920, 1080, 12.0).with_audio(12.0)));
        let ctx = context(probe, transcoder);

        let out = concatenate(&ctx, &[spec(0), spec(1), spec(5)], Path::new("/scratch/job-test/concatenated.mp4"))
            .await
            .unwrap();
        assert_eq!(out, PathBuf::from("/scratch/job-test/concatenated.mp4"));
    }

    #[tokio::test]
    async fn test_partial_output_discarded_on_failure() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("concatenated.mp4");

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_transcode().returning(|_, _, output, _| {
            std::fs::write(output, b"half a file").unwrap();
            Err(MediaError::ffmpeg_failed("concat failed", None, Some(1)))
        });
        let ctx = context(MockProbe::new(), transcoder);

        let err = concatenate(&ctx, &[spec(0), spec(1)], &output).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Concatenation);
        assert!(!output.exists());
    }
}
