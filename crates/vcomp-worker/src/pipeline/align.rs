//! Reconcile the external audio track with the concatenated video.
//!
//! The duration difference decides the action. Under the tolerance the two
//! are merged as they are. Beyond it, whichever track is not authoritative is
//! padded or trimmed to the authoritative length first:
//!
//! | longer | standard | action |
//! |---|---|---|
//! | audio | `Audio` | extend video with black frames |
//! | audio | `Video` | cut audio at the video length |
//! | video | `Audio` | cut video at the audio length |
//! | video | `Video` | extend audio with silence |
//!
//! The merged file is probed afterwards and rejected if it is still out of
//! sync.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use vcomp_media::{MediaProbe, MediaStreamInfo, RenderDirective};
use vcomp_models::{AlignmentPolicy, AlignmentStandard};

use super::StageContext;
use crate::error::{AlignmentError, Stage};
use crate::metrics;

/// What to do before merging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignmentAction {
    /// Lengths agree within tolerance
    Direct,
    /// Append `by` seconds of black frames to the video
    PadVideo { by: f64 },
    /// Cut the video at `to` seconds
    TrimVideo { to: f64 },
    /// Extend the audio with silence to `to` seconds
    PadAudio { to: f64 },
    /// Cut the audio at `to` seconds
    TrimAudio { to: f64 },
}

impl AlignmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentAction::Direct => "direct",
            AlignmentAction::PadVideo { .. } => "pad_video",
            AlignmentAction::TrimVideo { .. } => "trim_video",
            AlignmentAction::PadAudio { .. } => "pad_audio",
            AlignmentAction::TrimAudio { .. } => "trim_audio",
        }
    }
}

impl fmt::Display for AlignmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentAction::Direct => write!(f, "direct merge"),
            AlignmentAction::PadVideo { by } => write!(f, "pad video by {:.3}s", by),
            AlignmentAction::TrimVideo { to } => write!(f, "trim video to {:.3}s", to),
            AlignmentAction::PadAudio { to } => write!(f, "pad audio to {:.3}s", to),
            AlignmentAction::TrimAudio { to } => write!(f, "trim audio to {:.3}s", to),
        }
    }
}

/// Result of a successful alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentOutcome {
    /// Merged file
    pub output: PathBuf,
    pub action: AlignmentAction,
    /// Padded or trimmed intermediate, when one was written
    pub adjusted: Option<PathBuf>,
}

/// Decide how to reconcile `audio_len` with `video_len`.
pub fn plan_alignment(audio_len: f64, video_len: f64, policy: &AlignmentPolicy) -> AlignmentAction {
    let diff = (audio_len - video_len).abs();
    if diff < policy.tolerance_secs {
        return AlignmentAction::Direct;
    }

    let audio_longer = audio_len > video_len;
    match (audio_longer, policy.standard) {
        (true, AlignmentStandard::Audio) => AlignmentAction::PadVideo { by: diff },
        (true, AlignmentStandard::Video) => AlignmentAction::TrimAudio { to: video_len },
        (false, AlignmentStandard::Audio) => AlignmentAction::TrimVideo { to: audio_len },
        (false, AlignmentStandard::Video) => AlignmentAction::PadAudio { to: video_len },
    }
}

/// Check that `path` is a pure audio file: an audio stream and no video.
///
/// Cover art attached to an audio file does not count as video.
pub async fn check_audio_track(
    probe: &dyn MediaProbe,
    path: &Path,
) -> Result<MediaStreamInfo, AlignmentError> {
    let info = probe_path(probe, path).await?;
    if !info.has_audio_stream {
        return Err(AlignmentError::AudioTrackMissingAudio(path.to_path_buf()));
    }
    if info.has_video_stream {
        return Err(AlignmentError::AudioTrackHasVideo(path.to_path_buf()));
    }
    Ok(info)
}

async fn probe_path(probe: &dyn MediaProbe, path: &Path) -> Result<MediaStreamInfo, AlignmentError> {
    probe
        .probe(path)
        .await
        .map_err(|source| AlignmentError::Probe {
            path: path.to_path_buf(),
            source,
        })
}

/// Align `audio_track` to `video` under `policy` and merge them into `output`.
pub async fn align_and_merge(
    ctx: &StageContext,
    video: &Path,
    audio_track: &Path,
    policy: &AlignmentPolicy,
    output: &Path,
) -> Result<AlignmentOutcome, AlignmentError> {
    let started = Instant::now();

    let audio_info = check_audio_track(ctx.probe.as_ref(), audio_track).await?;
    let video_info = probe_path(ctx.probe.as_ref(), video).await?;
    if !video_info.has_video_stream {
        return Err(AlignmentError::VideoMissingVideo(video.to_path_buf()));
    }

    let audio_len = audio_info
        .audio_length()
        .ok_or_else(|| AlignmentError::UnknownDuration(audio_track.to_path_buf()))?;
    let video_len = video_info
        .video_length()
        .ok_or_else(|| AlignmentError::UnknownDuration(video.to_path_buf()))?;

    let action = plan_alignment(audio_len, video_len, policy);
    info!(
        job_id = %ctx.job_id,
        audio_secs = audio_len,
        video_secs = video_len,
        standard = %policy.standard,
        action = %action,
        "Planned audio alignment"
    );

    let adjust = |directive: RenderDirective, source: &Path, file_name: &str| {
        let output = ctx.temp.job_path(file_name);
        let source = source.to_path_buf();
        async move {
            let step = directive.name();
            ctx.transcoder
                .transcode(&[source], &directive, &output, &ctx.cancel)
                .await
                .map_err(|source| AlignmentError::Transcode { step, source })
        }
    };

    let (merge_video, merge_audio, adjusted) = match action {
        AlignmentAction::Direct => (video.to_path_buf(), audio_track.to_path_buf(), None),
        AlignmentAction::PadVideo { by } => {
            let padded = adjust(RenderDirective::PadVideo { extend_by: by }, video, "video-padded.mp4").await?;
            (padded.clone(), audio_track.to_path_buf(), Some(padded))
        }
        AlignmentAction::TrimVideo { to } => {
            let trimmed = adjust(
                RenderDirective::Trim {
                    start: 0.0,
                    duration: Some(to),
                },
                video,
                "video-trimmed.mp4",
            )
            .await?;
            (trimmed.clone(), audio_track.to_path_buf(), Some(trimmed))
        }
        AlignmentAction::PadAudio { to } => {
            let padded = adjust(RenderDirective::PadAudio { total: to }, audio_track, "audio-padded.m4a").await?;
            (video.to_path_buf(), padded.clone(), Some(padded))
        }
        AlignmentAction::TrimAudio { to } => {
            let trimmed = adjust(RenderDirective::TrimAudio { duration: to }, audio_track, "audio-trimmed.m4a").await?;
            (video.to_path_buf(), trimmed.clone(), Some(trimmed))
        }
    };

    let merged = ctx
        .transcoder
        .transcode(&[merge_video, merge_audio], &RenderDirective::Mux, output, &ctx.cancel)
        .await
        .map_err(|source| AlignmentError::Transcode { step: "mux", source })?;

    verify_merged(ctx.probe.as_ref(), &merged, policy).await?;

    metrics::record_alignment_action(action.as_str());
    metrics::record_stage_duration(Stage::Alignment.as_str(), started.elapsed().as_secs_f64());

    Ok(AlignmentOutcome {
        output: merged,
        action,
        adjusted,
    })
}

/// The merged file must carry both streams with lengths within tolerance.
async fn verify_merged(
    probe: &dyn MediaProbe,
    merged: &Path,
    policy: &AlignmentPolicy,
) -> Result<(), AlignmentError> {
    let info = probe_path(probe, merged).await?;
    let (Some(video), Some(audio)) = (info.video_length(), info.audio_length()) else {
        return Err(AlignmentError::Unsynchronized {
            video: info.video_length().unwrap_or(0.0),
            audio: info.audio_length().unwrap_or(0.0),
        });
    };

    if (video - audio).abs() >= policy.tolerance_secs {
        return Err(AlignmentError::Unsynchronized { video, audio });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{context, MockProbe, MockTranscoder};
    use std::sync::{Arc, Mutex};
    use vcomp_media::MediaError;

    const VIDEO: &str = "/scratch/job-test/concatenated.mp4";
    const AUDIO: &str = "/music/track.mp3";
    const MERGED: &str = "/scratch/job-test/merged.mp4";

    fn policy(standard: AlignmentStandard) -> AlignmentPolicy {
        AlignmentPolicy::new(standard)
    }

    #[test]
    fn test_within_tolerance_is_direct() {
        for standard in [AlignmentStandard::Audio, AlignmentStandard::Video] {
            assert_eq!(plan_alignment(20.0, 19.6, &policy(standard)), AlignmentAction::Direct);
            assert_eq!(plan_alignment(19.6, 20.0, &policy(standard)), AlignmentAction::Direct);
        }
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(
            plan_alignment(20.0, 19.3, &policy(AlignmentStandard::Video)),
            AlignmentAction::TrimAudio { to: 19.3 }
        );
        assert_eq!(
            plan_alignment(15.0, 30.0, &policy(AlignmentStandard::Audio)),
            AlignmentAction::TrimVideo { to: 15.0 }
        );
        assert_eq!(
            plan_alignment(15.0, 30.0, &policy(AlignmentStandard::Video)),
            AlignmentAction::PadAudio { to: 30.0 }
        );
        match plan_alignment(20.0, 19.3, &policy(AlignmentStandard::Audio)) {
            AlignmentAction::PadVideo { by } => assert!((by - 0.7).abs() < 1e-9),
            other => panic!("expected PadVideo, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_tolerance_is_not_direct() {
        assert_ne!(
            plan_alignment(10.5, 10.0, &policy(AlignmentStandard::Video)),
            AlignmentAction::Direct
        );
    }

    /// Probe answering from a fixed table of known paths.
    fn probe_with(entries: Vec<(&'static str, MediaStreamInfo)>) -> MockProbe {
        let mut probe = MockProbe::new();
        probe.expect_probe().returning(move |path: &Path| {
            entries
                .iter()
                .find(|(p, _)| Path::new(p) == path)
                .map(|(_, info)| info.clone())
                .ok_or_else(|| MediaError::FileNotFound(path.to_path_buf()))
        });
        probe
    }

    fn recording_transcoder(calls: Arc<Mutex<Vec<RenderDirective>>>) -> MockTranscoder {
        let mut transcoder = MockTranscoder::new();
        transcoder.expect_transcode().returning(move |_, directive, output, _| {
            calls.lock().unwrap().push(RenderDirective::clone(directive));
            Ok(output.to_path_buf())
        });
        transcoder
    }

    #[tokio::test]
    async fn test_scenario_trim_audio_under_video_standard() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = probe_with(vec![
            (AUDIO, MediaStreamInfo::audio_only(20.0)),
            (VIDEO, MediaStreamInfo::video(1920, 1080, 19.3).with_audio(19.3)),
            (MERGED, MediaStreamInfo::video(1920, 1080, 19.3).with_audio(19.3)),
        ]);
        let ctx = context(probe, recording_transcoder(calls.clone()));

        let outcome = align_and_merge(
            &ctx,
            Path::new(VIDEO),
            Path::new(AUDIO),
            &policy(AlignmentStandard::Video),
            Path::new(MERGED),
        )
        .await
        .unwrap();

        assert_eq!(outcome.action, AlignmentAction::TrimAudio { to: 19.3 });
        assert_eq!(
            outcome.adjusted,
            Some(PathBuf::from("/scratch/job-test/audio-trimmed.m4a"))
        );
        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                RenderDirective::TrimAudio { duration: 19.3 },
                RenderDirective::Mux
            ]
        );
    }

    #[tokio::test]
    async fn test_direct_merge_issues_no_adjustment() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = probe_with(vec![
            (AUDIO, MediaStreamInfo::audio_only(20.2)),
            (VIDEO, MediaStreamInfo::video(1920, 1080, 20.0).with_audio(20.0)),
            (MERGED, MediaStreamInfo::video(1920, 1080, 20.0).with_audio(20.2)),
        ]);
        let ctx = context(probe, recording_transcoder(calls.clone()));

        let outcome = align_and_merge(
            &ctx,
            Path::new(VIDEO),
            Path::new(AUDIO),
            &policy(AlignmentStandard::Audio),
            Path::new(MERGED),
        )
        .await
        .unwrap();

        assert_eq!(outcome.action, AlignmentAction::Direct);
        assert!(outcome.adjusted.is_none());
        assert_eq!(*calls.lock().unwrap(), vec![RenderDirective::Mux]);
    }

    #[tokio::test]
    async fn test_pad_branches_are_executed() {
        // Audio longer under Audio standard: black frames appended to video
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = probe_with(vec![
            (AUDIO, MediaStreamInfo::audio_only(30.0)),
            (VIDEO, MediaStreamInfo::video(1080, 1920, 25.0).with_audio(25.0)),
            (MERGED, MediaStreamInfo::video(1080, 1920, 30.0).with_audio(30.0)),
        ]);
        let ctx = context(probe, recording_transcoder(calls.clone()));
        align_and_merge(
            &ctx,
            Path::new(VIDEO),
            Path::new(AUDIO),
            &policy(AlignmentStandard::Audio),
            Path::new(MERGED),
        )
        .await
        .unwrap();
        assert_eq!(calls.lock().unwrap()[0], RenderDirective::PadVideo { extend_by: 5.0 });

        // Video longer under Video standard: silence appended to audio
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = probe_with(vec![
            (AUDIO, MediaStreamInfo::audio_only(25.0)),
            (VIDEO, MediaStreamInfo::video(1080, 1920, 30.0).with_audio(30.0)),
            (MERGED, MediaStreamInfo::video(1080, 1920, 30.0).with_audio(30.0)),
        ]);
        let ctx = context(probe, recording_transcoder(calls.clone()));
        align_and_merge(
            &ctx,
            Path::new(VIDEO),
            Path::new(AUDIO),
            &policy(AlignmentStandard::Video),
            Path::new(MERGED),
        )
        .await
        .unwrap();
        assert_eq!(calls.lock().unwrap()[0], RenderDirective::PadAudio { total: 30.0 });
    }

    #[tokio::test]
    async fn test_audio_track_with_video_rejected() {
        let probe = probe_with(vec![(AUDIO, MediaStreamInfo::video(640, 360, 20.0).with_audio(20.0))]);
        let mut transcoder = MockTranscoder::new();
        transcoder.expect_transcode().never();
        let ctx = context(probe, transcoder);

        let err = align_and_merge(
            &ctx,
            Path::new(VIDEO),
            Path::new(AUDIO),
            &policy(AlignmentStandard::Audio),
            Path::new(MERGED),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AlignmentError::AudioTrackHasVideo(_)));
    }

    #[tokio::test]
    async fn test_audio_track_without_audio_rejected() {
        let probe = probe_with(vec![(AUDIO, MediaStreamInfo::default())]);
        let err = check_audio_track(&probe, Path::new(AUDIO)).await.unwrap_err();
        assert!(matches!(err, AlignmentError::AudioTrackMissingAudio(_)));
    }

    #[tokio::test]
    async fn test_video_without_video_rejected() {
        let probe = probe_with(vec![
            (AUDIO, MediaStreamInfo::audio_only(20.0)),
            (VIDEO, MediaStreamInfo::audio_only(20.0)),
        ]);
        let ctx = context(probe, MockTranscoder::new());

        let err = align_and_merge(
            &ctx,
            Path::new(VIDEO),
            Path::new(AUDIO),
            &policy(AlignmentStandard::Audio),
            Path::new(MERGED),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AlignmentError::VideoMissingVideo(_)));
    }

    #[tokio::test]
    async fn test_unsynchronized_merge_rejected() {
        let probe = probe_with(vec![
            (AUDIO, MediaStreamInfo::audio_only(20.0)),
            (VIDEO, MediaStreamInfo::video(1920, 1080, 20.0).with_audio(20.0)),
            (MERGED, MediaStreamInfo::video(1920, 1080, 20.0).with_audio(12.0)),
        ]);
        let ctx = context(probe, recording_transcoder(Arc::new(Mutex::new(Vec::new()))));

        let err = align_and_merge(
            &ctx,
            Path::new(VIDEO),
            Path::new(AUDIO),
            &policy(AlignmentStandard::Audio),
            Path::new(MERGED),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AlignmentError::Unsynchronized { .. }));
    }
}
