//! Composition job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{AlignmentPolicy, AlignmentStandard, CanvasSpec, ClipRequest, Orientation};

/// Extension of every composed output.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Longest accepted job id.
pub const MAX_JOB_ID_LEN: usize = 128;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can name a single directory.
    ///
    /// Only ASCII letters, digits, `-` and `_` are allowed, which rules out
    /// separators, `.`/`..` and absolute paths.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= MAX_JOB_ID_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to compose several clips and one audio track into a single file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompositionJob {
    /// Unique job ID (generated when absent)
    #[serde(default)]
    pub id: JobId,

    /// Clips in submission order; final order comes from `sequence_index`
    pub clips: Vec<ClipRequest>,

    /// External audio track merged over the concatenated video
    pub audio_track: PathBuf,

    /// Canvas orientation (landscape when unspecified)
    #[serde(default)]
    pub orientation: Orientation,

    /// Which track's duration is authoritative
    pub standard: AlignmentStandard,

    /// Caller-chosen output location
    pub output_path: PathBuf,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl CompositionJob {
    pub fn new(
        clips: Vec<ClipRequest>,
        audio_track: impl Into<PathBuf>,
        orientation: Orientation,
        standard: AlignmentStandard,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: JobId::new(),
            clips,
            audio_track: audio_track.into(),
            orientation,
            standard,
            output_path: output_path.into(),
            created_at: Utc::now(),
        }
    }

    pub fn canvas(&self) -> CanvasSpec {
        CanvasSpec::new(self.orientation)
    }

    pub fn policy(&self) -> AlignmentPolicy {
        AlignmentPolicy::new(self.standard)
    }

    /// Final output path: the caller's directory and stem, always `.mp4`.
    pub fn output_file(&self) -> PathBuf {
        self.output_path.with_extension(OUTPUT_EXTENSION)
    }
}
