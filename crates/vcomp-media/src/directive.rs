//! Declarative render directives understood by a [`MediaTranscoder`].
//!
//! [`MediaTranscoder`]: crate::transcoder::MediaTranscoder

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use vcomp_models::Resolution;

use crate::error::{MediaError, MediaResult};
use crate::filters::CanvasFit;

/// One transcode operation, independent of how it is executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum RenderDirective {
    /// Cut `[start, start + duration)` out of a clip (to the end when
    /// `duration` is absent). Video is re-encoded, audio copied.
    Trim { start: f64, duration: Option<f64> },
    /// Cut an audio-only file to `duration` seconds.
    TrimAudio { duration: f64 },
    /// Add a silent audio track of `duration` seconds to a video-only clip.
    SilenceInject { duration: f64 },
    /// Fit the clip onto a canvas of the given resolution.
    CanvasFit { fit: CanvasFit, canvas: Resolution },
    /// Join all inputs, in order, into one audio+video stream.
    Concat,
    /// Extend video with `extend_by` seconds of black frames.
    PadVideo { extend_by: f64 },
    /// Extend an audio-only file with silence to `total` seconds.
    PadAudio { total: f64 },
    /// Video from the first input, audio from the second.
    Mux,
}

impl RenderDirective {
    /// Short name used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            RenderDirective::Trim { .. } => "trim",
            RenderDirective::TrimAudio { .. } => "trim_audio",
            RenderDirective::SilenceInject { .. } => "silence_inject",
            RenderDirective::CanvasFit { .. } => "canvas_fit",
            RenderDirective::Concat => "concat",
            RenderDirective::PadVideo { .. } => "pad_video",
            RenderDirective::PadAudio { .. } => "pad_audio",
            RenderDirective::Mux => "mux",
        }
    }

    /// Check input count and numeric arguments before anything is spawned.
    pub fn validate(&self, inputs: &[PathBuf]) -> MediaResult<()> {
        let count = inputs.len();
        let arity_ok = match self {
            RenderDirective::Concat => count >= 2,
            RenderDirective::Mux => count == 2,
            _ => count == 1,
        };
        if !arity_ok {
            return Err(MediaError::invalid_directive(format!(
                "{} does not accept {} input(s)",
                self.name(),
                count
            )));
        }

        let positive = |label: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(MediaError::invalid_directive(format!(
                    "{} {} must be positive, got {}",
                    self.name(),
                    label,
                    value
                )))
            }
        };

        match *self {
            RenderDirective::Trim { start, duration } => {
                if !start.is_finite() || start < 0.0 {
                    return Err(MediaError::invalid_directive(format!(
                        "trim start must be >= 0, got {}",
                        start
                    )));
                }
                if let Some(duration) = duration {
                    positive("duration", duration)?;
                }
                Ok(())
            }
            RenderDirective::TrimAudio { duration } => positive("duration", duration),
            RenderDirective::SilenceInject { duration } => positive("duration", duration),
            RenderDirective::PadVideo { extend_by } => positive("extension", extend_by),
            RenderDirective::PadAudio { total } => positive("total", total),
            RenderDirective::CanvasFit { canvas, .. } => {
                if canvas.width == 0 || canvas.height == 0 {
                    return Err(MediaError::invalid_directive(format!(
                        "canvas {} has a zero dimension",
                        canvas
                    )));
                }
                Ok(())
            }
            RenderDirective::Concat | RenderDirective::Mux => Ok(()),
        }
    }

    /// Output duration known up front, used for progress percentages.
    pub fn expected_duration(&self) -> Option<f64> {
        match *self {
            RenderDirective::Trim { duration, .. } => duration,
            RenderDirective::TrimAudio { duration } => Some(duration),
            RenderDirective::SilenceInject { duration } => Some(duration),
            RenderDirective::PadAudio { total } => Some(total),
            _ => None,
        }
    }
}

impl fmt::Display for RenderDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderDirective::Trim { start, duration } => match duration {
                Some(d) => write!(f, "trim({:.3}s +{:.3}s)", start, d),
                None => write!(f, "trim({:.3}s to end)", start),
            },
            RenderDirective::TrimAudio { duration } => write!(f, "trim_audio({:.3}s)", duration),
            RenderDirective::SilenceInject { duration } => {
                write!(f, "silence_inject({:.3}s)", duration)
            }
            RenderDirective::CanvasFit { fit, canvas } => {
                write!(f, "canvas_fit({}, {})", fit.as_str(), canvas)
            }
            RenderDirective::Concat => write!(f, "concat"),
            RenderDirective::PadVideo { extend_by } => write!(f, "pad_video(+{:.3}s)", extend_by),
            RenderDirective::PadAudio { total } => write!(f, "pad_audio({:.3}s)", total),
            RenderDirective::Mux => write!(f, "mux"),
        }
    }
}
