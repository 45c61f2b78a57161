//! FFmpeg CLI wrapper for clip composition.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multi-input support
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts for running processes
//! - The [`MediaProbe`] and [`MediaTranscoder`] capabilities with FFmpeg backends
//! - Canvas fitting policy and filter graphs
//! - An in-memory fake backend for tests (`testing` feature)

pub mod cancel;
pub mod command;
pub mod directive;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transcoder;

pub use cancel::{CancelHandle, CancelToken};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use directive::RenderDirective;
pub use error::{MediaError, MediaResult};
pub use filters::{canvas_filter_graph, fit_policy, Background, CanvasFit};
pub use probe::{probe_media, FfprobeProbe, MediaProbe, MediaStreamInfo};
pub use progress::FfmpegProgress;
pub use transcoder::{FfmpegTranscoder, MediaTranscoder};
