//! Composer error types.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use vcomp_media::MediaError;

pub type ComposeResult<T> = Result<T, ComposeError>;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validation,
    Probe,
    Splice,
    AudioPresence,
    Standardize,
    Sequencing,
    Concatenation,
    Alignment,
    Delivery,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Probe => "probe",
            Stage::Splice => "splice",
            Stage::AudioPresence => "audio_presence",
            Stage::Standardize => "standardize",
            Stage::Sequencing => "sequencing",
            Stage::Concatenation => "concatenation",
            Stage::Alignment => "alignment",
            Stage::Delivery => "delivery",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a composition job.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Probe of {} failed: {source}", path.display())]
    Probe {
        sequence_index: Option<u32>,
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("Splice of clip {sequence_index} failed: {reason}")]
    Splice {
        sequence_index: u32,
        reason: String,
        #[source]
        source: Option<MediaError>,
    },

    #[error("Audio injection for clip {sequence_index} failed: {reason}")]
    AudioInjection {
        sequence_index: u32,
        reason: String,
        #[source]
        source: Option<MediaError>,
    },

    #[error("Standardization of clip {sequence_index} failed: {source}")]
    Standardize {
        sequence_index: u32,
        #[source]
        source: MediaError,
    },

    #[error(transparent)]
    Sequencing(#[from] SequencingError),

    #[error("Concatenation failed: {source}")]
    Concatenation {
        #[source]
        source: MediaError,
    },

    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error("Failed to deliver output to {}: {source}", path.display())]
    Delivery {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposeError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    pub fn splice(sequence_index: u32, reason: impl Into<String>) -> Self {
        Self::Splice {
            sequence_index,
            reason: reason.into(),
            source: None,
        }
    }

    pub fn audio_injection(sequence_index: u32, reason: impl Into<String>) -> Self {
        Self::AudioInjection {
            sequence_index,
            reason: reason.into(),
            source: None,
        }
    }

    /// Stage the failure belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            ComposeError::InvalidJob(_) | ComposeError::Io(_) => Stage::Validation,
            ComposeError::Probe { .. } => Stage::Probe,
            ComposeError::Splice { .. } => Stage::Splice,
            ComposeError::AudioInjection { .. } => Stage::AudioPresence,
            ComposeError::Standardize { .. } => Stage::Standardize,
            ComposeError::Sequencing(_) => Stage::Sequencing,
            ComposeError::Concatenation { .. } => Stage::Concatenation,
            ComposeError::Alignment(_) => Stage::Alignment,
            ComposeError::Delivery { .. } => Stage::Delivery,
        }
    }

    /// Offending clip, when the failure is attributable to one.
    pub fn sequence_index(&self) -> Option<u32> {
        match self {
            ComposeError::Probe { sequence_index, .. } => *sequence_index,
            ComposeError::Splice { sequence_index, .. }
            | ComposeError::AudioInjection { sequence_index, .. }
            | ComposeError::Standardize { sequence_index, .. } => Some(*sequence_index),
            ComposeError::Sequencing(SequencingError::DuplicateIndex(index)) => Some(*index),
            _ => None,
        }
    }

    /// Whether this failure is only the echo of a sibling's cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            ComposeError::Probe { source, .. }
            | ComposeError::Standardize { source, .. }
            | ComposeError::Concatenation { source } => source.is_cancelled(),
            ComposeError::Splice { source, .. } | ComposeError::AudioInjection { source, .. } => {
                source.as_ref().is_some_and(MediaError::is_cancelled)
            }
            _ => false,
        }
    }
}

/// Ordering and clip-count violations.
#[derive(Debug, Error, PartialEq)]
pub enum SequencingError {
    #[error("Sequence index {0} is used by more than one clip")]
    DuplicateIndex(u32),

    #[error("Clip at position {position} has no sequence index")]
    MissingIndex { position: usize },

    #[error("A composition needs at least 2 clips, got {count}")]
    InsufficientClips { count: usize },
}

/// Audio alignment precondition and merge failures.
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("Audio track {} has no audio stream", .0.display())]
    AudioTrackMissingAudio(PathBuf),

    #[error("Audio track {} contains a video stream", .0.display())]
    AudioTrackHasVideo(PathBuf),

    #[error("Concatenated file {} has no video stream", .0.display())]
    VideoMissingVideo(PathBuf),

    #[error("Could not determine the duration of {}", .0.display())]
    UnknownDuration(PathBuf),

    #[error("Probe of {} failed: {source}", path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("{step} failed: {source}")]
    Transcode {
        step: &'static str,
        #[source]
        source: MediaError,
    },

    #[error("Merged output is out of sync: video {video:.3}s, audio {audio:.3}s")]
    Unsynchronized { video: f64, audio: f64 },
}

/// Failure to delete an intermediate. Logged, never returned from a job.
#[derive(Debug, Error)]
#[error("Failed to remove {}: {source}", path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: MediaError,
}
