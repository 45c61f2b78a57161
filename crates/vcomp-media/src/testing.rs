//! In-memory probe and transcoder for pipeline tests.
//!
//! [`FakeMedia`] keeps a table of stream facts per path. Every transcode
//! writes an empty file at the output path, records the call, and registers
//! the stream facts the real directive would have produced, so later probes
//! see a consistent world.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::cancel::CancelToken;
use crate::directive::RenderDirective;
use crate::error::{MediaError, MediaResult};
use crate::probe::{MediaProbe, MediaStreamInfo};
use crate::transcoder::MediaTranscoder;

/// A recorded [`MediaTranscoder::transcode`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeCall {
    pub inputs: Vec<PathBuf>,
    pub directive: RenderDirective,
    pub output: PathBuf,
}

#[derive(Debug, Default)]
struct FakeState {
    media: HashMap<PathBuf, MediaStreamInfo>,
    calls: Vec<TranscodeCall>,
    probes: Vec<PathBuf>,
    fail_inputs: Vec<PathBuf>,
    fail_directives: Vec<&'static str>,
    overrides: HashMap<&'static str, MediaStreamInfo>,
}

/// Fake implementation of both media capabilities.
#[derive(Debug, Default)]
pub struct FakeMedia {
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Counts one running transcode for as long as it lives.
struct InFlight<'a>(&'a FakeMedia);

impl<'a> InFlight<'a> {
    fn enter(media: &'a FakeMedia) -> Self {
        let now = media.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        media.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(media)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the stream facts for a path.
    pub fn insert(&self, path: impl Into<PathBuf>, info: MediaStreamInfo) {
        self.lock().media.insert(path.into(), info);
    }

    /// Fail every transcode that reads `path`.
    pub fn fail_on_input(&self, path: impl Into<PathBuf>) {
        self.lock().fail_inputs.push(path.into());
    }

    /// Fail every transcode with the given directive name.
    pub fn fail_directive(&self, name: &'static str) {
        self.lock().fail_directives.push(name);
    }

    /// Make outputs of the named directive report `info` instead of the
    /// simulated result.
    pub fn override_output(&self, name: &'static str, info: MediaStreamInfo) {
        self.lock().overrides.insert(name, info);
    }

    pub fn calls(&self) -> Vec<TranscodeCall> {
        self.lock().calls.clone()
    }

    /// Calls whose directive has the given name.
    pub fn calls_named(&self, name: &str) -> Vec<TranscodeCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.directive.name() == name)
            .cloned()
            .collect()
    }

    /// Highest number of transcodes that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn probed_paths(&self) -> Vec<PathBuf> {
        self.lock().probes.clone()
    }

    pub fn info(&self, path: &Path) -> Option<MediaStreamInfo> {
        self.lock().media.get(path).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Stream facts a real transcode would produce.
fn simulate(directive: &RenderDirective, inputs: &[MediaStreamInfo]) -> MediaStreamInfo {
    let first = inputs.first().cloned().unwrap_or_default();

    match *directive {
        RenderDirective::Trim { start, duration } => {
            let clip = |len: Option<f64>| {
                len.map(|l| {
                    let remaining = (l - start).max(0.0);
                    duration.map_or(remaining, |d| d.min(remaining))
                })
            };
            let mut out = first.clone();
            out.video_duration = clip(first.video_length());
            out.audio_duration = clip(first.audio_length());
            out.format_duration = out.video_duration.or(out.audio_duration);
            out
        }
        RenderDirective::TrimAudio { duration } => {
            MediaStreamInfo::audio_only(first.audio_length().unwrap_or(0.0).min(duration))
        }
        RenderDirective::SilenceInject { duration } => first.with_audio(duration),
        RenderDirective::CanvasFit { canvas, .. } => MediaStreamInfo {
            width: canvas.width,
            height: canvas.height,
            ..first
        },
        RenderDirective::Concat => {
            let video: f64 = inputs.iter().filter_map(MediaStreamInfo::video_length).sum();
            let audio: f64 = inputs.iter().filter_map(MediaStreamInfo::audio_length).sum();
            MediaStreamInfo::video(first.width, first.height, video).with_audio(audio)
        }
        RenderDirective::PadVideo { extend_by } => MediaStreamInfo::video(
            first.width,
            first.height,
            first.video_length().unwrap_or(0.0) + extend_by,
        ),
        RenderDirective::PadAudio { total } => {
            MediaStreamInfo::audio_only(first.audio_length().unwrap_or(0.0).max(total))
        }
        RenderDirective::Mux => {
            let audio = inputs.get(1).and_then(MediaStreamInfo::audio_length).unwrap_or(0.0);
            MediaStreamInfo::video(first.width, first.height, first.video_length().unwrap_or(0.0))
                .with_audio(audio)
        }
    }
}

#[async_trait]
impl MediaProbe for FakeMedia {
    async fn probe(&self, path: &Path) -> MediaResult<MediaStreamInfo> {
        let mut state = self.lock();
        state.probes.push(path.to_path_buf());
        state
            .media
            .get(path)
            .cloned()
            .ok_or_else(|| MediaError::FileNotFound(path.to_path_buf()))
    }
}

#[async_trait]
impl MediaTranscoder for FakeMedia {
    async fn transcode(
        &self,
        inputs: &[PathBuf],
        directive: &RenderDirective,
        output: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        directive.validate(inputs)?;
        let _running = InFlight::enter(self);

        let info = {
            let mut state = self.lock();
            state.calls.push(TranscodeCall {
                inputs: inputs.to_vec(),
                directive: directive.clone(),
                output: output.to_path_buf(),
            });

            if state.fail_directives.contains(&directive.name())
                || inputs.iter().any(|i| state.fail_inputs.contains(i))
            {
                return Err(MediaError::ffmpeg_failed(
                    format!("simulated {} failure", directive.name()),
                    Some("fake stderr".to_string()),
                    Some(1),
                ));
            }

            let mut facts = Vec::with_capacity(inputs.len());
            for input in inputs {
                let info = state
                    .media
                    .get(input)
                    .cloned()
                    .ok_or_else(|| MediaError::FileNotFound(input.clone()))?;
                facts.push(info);
            }

            match state.overrides.get(directive.name()) {
                Some(info) => info.clone(),
                None => simulate(directive, &facts),
            }
        };

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"").await?;

        self.insert(output, info);
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_trim_then_probe() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let src = dir.path().join("src.mp4");
        fake.insert(&src, MediaStreamInfo::video(1920, 1080, 30.0).with_audio(30.0));

        let out = dir.path().join("trimmed.mp4");
        fake.transcode(
            &[src],
            &RenderDirective::Trim {
                start: 25.0,
                duration: Some(10.0),
            },
            &out,
            &CancelToken::none(),
        )
        .await
        .unwrap();

        assert!(out.exists());
        let info = fake.probe(&out).await.unwrap();
        assert_eq!(info.video_length(), Some(5.0));
        assert_eq!(fake.calls_named("trim").len(), 1);
    }

    #[tokio::test]
    async fn test_failure_rules() {
        let dir = TempDir::new().unwrap();
        let fake = FakeMedia::new();
        let src = dir.path().join("src.mp4");
        fake.insert(&src, MediaStreamInfo::video(1920, 1080, 3.0));
        fake.fail_directive("silence_inject");

        let result = fake
            .transcode(
                &[src],
                &RenderDirective::SilenceInject { duration: 3.0 },
                &dir.path().join("out.mp4"),
                &CancelToken::none(),
            )
            .await;
        assert!(matches!(result, Err(MediaError::FfmpegFailed { .. })));
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let fake = FakeMedia::new();
        let result = fake.probe(Path::new("/nowhere.mp4")).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
