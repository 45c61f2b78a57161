//! Media error types.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// Failures of the probe and transcode backends.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    /// Non-zero exit or abnormal termination of ffmpeg. `stderr` holds the
    /// last non-progress lines it printed.
    #[error("FFmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Probe of {} failed: {stderr}", path.display())]
    ProbeFailed { path: PathBuf, stderr: String },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Cancelled")]
    Cancelled,

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Process {0} pipe was not captured")]
    MissingPipe(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Unreadable ffprobe output: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    #[error("Invalid render directive: {0}")]
    InvalidDirective(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    pub fn invalid_directive(message: impl Into<String>) -> Self {
        Self::InvalidDirective(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MediaError::Cancelled)
    }

    /// Captured stderr, when the failing process produced any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::FfmpegFailed { stderr, .. } => stderr.as_deref(),
            MediaError::ProbeFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
