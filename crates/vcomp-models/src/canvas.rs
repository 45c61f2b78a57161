//! Orientation and canvas definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Frame orientation of a clip or of the composition canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Taller than wide
    Portrait,
    /// Wider than tall (or square)
    #[default]
    Landscape,
}

impl Orientation {
    pub const ALL: &'static [Orientation] = &[Orientation::Portrait, Orientation::Landscape];

    /// Derive orientation from frame dimensions. Square frames count as landscape.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if height > width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = OrientationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            _ => Err(OrientationParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown orientation: {0}")]
pub struct OrientationParseError(String);

/// Pixel resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Full HD portrait (9:16)
    pub const PORTRAIT_HD: Resolution = Resolution {
        width: 1080,
        height: 1920,
    };

    /// Full HD landscape (16:9)
    pub const LANDSCAPE_HD: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::from_dimensions(self.width, self.height)
    }
}

/// Formats as `WxH`, the form used for resolution equality checks.
impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Job-wide composition target.
///
/// The resolution is not free-form: each orientation maps to exactly one
/// supported target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct CanvasSpec {
    #[serde(default)]
    pub orientation: Orientation,
}

impl CanvasSpec {
    pub const fn new(orientation: Orientation) -> Self {
        Self { orientation }
    }

    pub fn resolution(&self) -> Resolution {
        match self.orientation {
            Orientation::Portrait => Resolution::PORTRAIT_HD,
            Orientation::Landscape => Resolution::LANDSCAPE_HD,
        }
    }

    pub fn width(&self) -> u32 {
        self.resolution().width
    }

    pub fn height(&self) -> u32 {
        self.resolution().height
    }
}
