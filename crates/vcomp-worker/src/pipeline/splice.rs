//! Cut each clip to its requested sub-range.

use std::time::Instant;
use tracing::info;

use vcomp_media::RenderDirective;
use vcomp_models::ClipSpec;

use super::StageContext;
use crate::error::{ComposeError, ComposeResult, Stage};
use crate::metrics;

/// Splice `clip` to `[splice_start, splice_start + play_duration)`.
///
/// A clip with neither bound set is returned unchanged. Otherwise the result
/// points at `clip-{index}-spliced.mp4` in the job's scratch directory; the
/// original source is left alone.
pub async fn splice(ctx: &StageContext, clip: &ClipSpec) -> ComposeResult<ClipSpec> {
    if !clip.needs_splice() {
        return Ok(clip.clone());
    }

    let index = clip.sequence_index;
    let start = clip.splice_start.unwrap_or(0.0);

    if !start.is_finite() || start < 0.0 {
        return Err(ComposeError::splice(
            index,
            format!("splice start must be >= 0, got {}", start),
        ));
    }
    if let Some(duration) = clip.play_duration {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ComposeError::splice(
                index,
                format!("play duration must be > 0, got {}", duration),
            ));
        }
    }
    if clip.duration_seconds > 0.0 && start >= clip.duration_seconds {
        return Err(ComposeError::splice(
            index,
            format!(
                "splice start {:.3}s is past the end of a {:.3}s clip",
                start, clip.duration_seconds
            ),
        ));
    }

    let directive = RenderDirective::Trim {
        start,
        duration: clip.play_duration,
    };
    let output = ctx.temp.clip_path(index, "spliced");
    let started = Instant::now();

    let written = ctx
        .transcoder
        .transcode(&[clip.source_path.clone()], &directive, &output, &ctx.cancel)
        .await
        .map_err(|source| ComposeError::Splice {
            sequence_index: index,
            reason: format!("{} failed", directive),
            source: Some(source),
        })?;

    metrics::record_stage_duration(Stage::Splice.as_str(), started.elapsed().as_secs_f64());
    info!(
        job_id = %ctx.job_id,
        sequence_index = index,
        directive = %directive,
        expected_secs = clip.expected_duration(),
        "Spliced clip"
    );

    Ok(clip.with_source(written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{context, MockProbe, MockTranscoder};
    use std::path::PathBuf;
    use vcomp_media::MediaError;
    use vcomp_models::{ClipRequest, Orientation};

    fn clip(start: Option<f64>, duration: Option<f64>) -> ClipSpec {
        let request = ClipRequest::new(4, "/media/beach.mp4").with_splice(start, duration);
        ClipSpec::from_request(4, &request, Orientation::Landscape, 60.0)
    }

    #[tokio::test]
    async fn test_no_bounds_is_noop() {
        let mut transcoder = MockTranscoder::new();
        transcoder.expect_transcode().never();
        let ctx = context(MockProbe::new(), transcoder);

        let original = clip(None, None);
        let result = splice(&ctx, &original).await.unwrap();
        assert_eq!(result, original);
    }

    #[tokio::test]
    async fn test_trim_directive_and_deterministic_path() {
        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_transcode()
            .withf(|inputs, directive, output, _| {
                inputs == [PathBuf::from("/media/beach.mp4")]
                    && *directive
                        == RenderDirective::Trim {
                            start: 5.0,
                            duration: Some(10.0),
                        }
                    && output == PathBuf::from("/scratch/job-test/clip-004-spliced.mp4")
            })
            .times(1)
            .returning(|_, _, output, _| Ok(output.to_path_buf()));
        let ctx = context(MockProbe::new(), transcoder);

        let result = splice(&ctx, &clip(Some(5.0), Some(10.0))).await.unwrap();
        assert_eq!(
            result.source_path,
            PathBuf::from("/scratch/job-test/clip-004-spliced.mp4")
        );
        assert_eq!(result.sequence_index, 4);
    }

    #[tokio::test]
    async fn test_duration_only_starts_at_zero() {
        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_transcode()
            .withf(|_, directive, _, _| {
                *directive
                    == RenderDirective::Trim {
                        start: 0.0,
                        duration: Some(4.0),
                    }
            })
            .returning(|_, _, output, _| Ok(output.to_path_buf()));
        let ctx = context(MockProbe::new(), transcoder);

        splice(&ctx, &clip(None, Some(4.0))).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_bounds_rejected_without_transcoding() {
        let mut transcoder = MockTranscoder::new();
        transcoder.expect_transcode().never();
        let ctx = context(MockProbe::new(), transcoder);

        for bad in [clip(Some(-1.0), None), clip(None, Some(0.0)), clip(Some(60.0), None)] {
            let err = splice(&ctx, &bad).await.unwrap_err();
            assert_eq!(err.stage(), Stage::Splice);
            assert_eq!(err.sequence_index(), Some(4));
        }
    }

    #[tokio::test]
    async fn test_transcoder_failure_is_splice_error() {
        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_transcode()
            .returning(|_, _, _, _| Err(MediaError::ffmpeg_failed("boom", None, Some(1))));
        let ctx = context(MockProbe::new(), transcoder);

        let err = splice(&ctx, &clip(Some(1.0), None)).await.unwrap_err();
        assert!(matches!(err, ComposeError::Splice { sequence_index: 4, .. }));
    }
}
