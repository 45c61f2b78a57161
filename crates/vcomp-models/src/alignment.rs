//! Audio/video alignment policy.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Duration difference (seconds) under which audio and video count as aligned.
pub const ALIGNMENT_TOLERANCE_SECS: f64 = 0.5;

/// Which track's duration is authoritative when they disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum AlignmentStandard {
    /// The audio track's length wins; video is padded or trimmed
    #[serde(alias = "audio")]
    Audio,
    /// The concatenated video's length wins; audio is padded or trimmed
    #[serde(alias = "video")]
    Video,
}

impl AlignmentStandard {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentStandard::Audio => "Audio",
            AlignmentStandard::Video => "Video",
        }
    }
}

impl fmt::Display for AlignmentStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the final duration mismatch is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlignmentPolicy {
    pub standard: AlignmentStandard,
    /// Tolerance in seconds; defaults to [`ALIGNMENT_TOLERANCE_SECS`]
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: f64,
}

fn default_tolerance() -> f64 {
    ALIGNMENT_TOLERANCE_SECS
}

impl AlignmentPolicy {
    pub fn new(standard: AlignmentStandard) -> Self {
        Self {
            standard,
            tolerance_secs: ALIGNMENT_TOLERANCE_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_serde_accepts_both_cases() {
        let a: AlignmentStandard = serde_json::from_str("\"Audio\"").unwrap();
        let v: AlignmentStandard = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(a, AlignmentStandard::Audio);
        assert_eq!(v, AlignmentStandard::Video);
    }

    #[test]
    fn test_policy_default_tolerance() {
        let policy: AlignmentPolicy = serde_json::from_str(r#"{"standard": "Video"}"#).unwrap();
        assert!((policy.tolerance_secs - 0.5).abs() < f64::EPSILON);
    }
}
