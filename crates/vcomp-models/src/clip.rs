//! Clip request and clip spec models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Orientation;

/// One clip as submitted with a composition job.
///
/// `sequence_index` is optional on the wire so that a missing index can be
/// reported as a validation error instead of a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipRequest {
    /// Position in the final composition (not array position)
    #[serde(default)]
    pub sequence_index: Option<u32>,

    /// Location of the source clip
    pub source_path: PathBuf,

    /// Start offset in seconds (absent = from start)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splice_start: Option<f64>,

    /// Play duration in seconds (absent = to natural end)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_duration: Option<f64>,

    /// Use a blurred copy of the frame as background when padding
    #[serde(default)]
    pub blur_edges: bool,
}

impl ClipRequest {
    pub fn new(sequence_index: u32, source_path: impl Into<PathBuf>) -> Self {
        Self {
            sequence_index: Some(sequence_index),
            source_path: source_path.into(),
            splice_start: None,
            play_duration: None,
            blur_edges: false,
        }
    }

    pub fn with_splice(mut self, start: Option<f64>, duration: Option<f64>) -> Self {
        self.splice_start = start;
        self.play_duration = duration;
        self
    }

    pub fn with_blur_edges(mut self, blur_edges: bool) -> Self {
        self.blur_edges = blur_edges;
        self
    }
}

/// A clip flowing through the composition pipeline.
///
/// Stages never mutate a shared clip; each returns an updated copy whose
/// `source_path` points at the stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipSpec {
    pub sequence_index: u32,
    /// Current location of the clip's bytes
    pub source_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splice_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_duration: Option<f64>,
    pub orientation: Orientation,
    /// Probed duration of the original source
    pub duration_seconds: f64,
    #[serde(default)]
    pub blur_edges: bool,
}

impl ClipSpec {
    /// Build a clip from its request and the probed facts of the original source.
    pub fn from_request(
        sequence_index: u32,
        request: &ClipRequest,
        orientation: Orientation,
        duration_seconds: f64,
    ) -> Self {
        Self {
            sequence_index,
            source_path: request.source_path.clone(),
            splice_start: request.splice_start,
            play_duration: request.play_duration,
            orientation,
            duration_seconds,
            blur_edges: request.blur_edges,
        }
    }

    /// Returns a copy of this clip pointing at a new file.
    pub fn with_source(&self, path: impl AsRef<Path>) -> Self {
        Self {
            source_path: path.as_ref().to_path_buf(),
            ..self.clone()
        }
    }

    /// Whether a sub-range was requested at all.
    pub fn needs_splice(&self) -> bool {
        self.splice_start.is_some() || self.play_duration.is_some()
    }

    /// Expected length after splicing, based on the original duration.
    pub fn expected_duration(&self) -> f64 {
        let start = self.splice_start.unwrap_or(0.0).max(0.0);
        let remaining = (self.duration_seconds - start).max(0.0);
        match self.play_duration {
            Some(d) => d.min(remaining),
            None => remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(start: Option<f64>, duration: Option<f64>) -> ClipSpec {
        let request = ClipRequest::new(2, "/media/c.mp4").with_splice(start, duration);
        ClipSpec::from_request(2, &request, Orientation::Landscape, 30.0)
    }

    #[test]
    fn test_needs_splice() {
        assert!(!clip(None, None).needs_splice());
        assert!(clip(Some(1.0), None).needs_splice());
        assert!(clip(None, Some(4.0)).needs_splice());
    }

    #[test]
    fn test_expected_duration() {
        assert!((clip(None, None).expected_duration() - 30.0).abs() < 1e-9);
        assert!((clip(Some(14.0), None).expected_duration() - 16.0).abs() < 1e-9);
        assert!((clip(Some(5.0), Some(10.0)).expected_duration() - 10.0).abs() < 1e-9);
        assert!((clip(Some(25.0), Some(10.0)).expected_duration() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_with_source_keeps_identity() {
        let original = clip(Some(1.0), Some(2.0));
        let moved = original.with_source("/tmp/vcomp/job/clip-002-spliced.mp4");
        assert_eq!(moved.sequence_index, 2);
        assert_eq!(moved.splice_start, Some(1.0));
        assert_eq!(original.source_path, PathBuf::from("/media/c.mp4"));
    }

    #[test]
    fn test_request_missing_index_deserializes() {
        let request: ClipRequest =
            serde_json::from_str(r#"{"source_path": "/media/a.mp4", "blur_edges": true}"#).unwrap();
        assert!(request.sequence_index.is_none());
        assert!(request.blur_edges);
        assert!(request.splice_start.is_none());
    }
}
