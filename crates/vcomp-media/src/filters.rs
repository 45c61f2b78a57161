//! FFmpeg filter graph definitions.
//!
//! Canvas fitting is decided by [`fit_policy`] and rendered by
//! [`canvas_filter_graph`]. Every graph reads `[0:v]` and labels its video
//! output `[v]`.

use serde::{Deserialize, Serialize};
use vcomp_models::encoding::{SILENCE_CHANNEL_LAYOUT, SILENCE_SAMPLE_RATE};
use vcomp_models::{Orientation, Resolution};

use crate::command::format_seconds;

/// Soft blur applied to the background layer (radius relative to frame size).
pub const FILTER_BLUR_BACKGROUND: &str = concat!(
    "boxblur=luma_radius=min(h\\,w)/20:luma_power=1:",
    "chroma_radius=min(cw\\,ch)/20:chroma_power=1"
);

/// Paint the background layer solid black.
pub const FILTER_BLACK_BACKGROUND: &str = "drawbox=c=black:t=fill";

/// Output label of the fitted video stream.
pub const VIDEO_OUT_LABEL: &str = "[v]";

/// Output label of the concatenated audio stream.
pub const AUDIO_OUT_LABEL: &str = "[a]";

/// Background layer for composed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Background {
    /// Enlarged, cropped and blurred copy of the clip itself
    Blurred,
    /// Solid black
    Black,
}

/// How a clip is fitted onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CanvasFit {
    /// Scale to cover the canvas, center-crop the overflow
    FillCrop,
    /// Scale to fit inside the canvas, pad with black bars
    Letterbox,
    /// Scale to fit inside the canvas, centered over a background layer
    Compose { background: Background },
}

impl CanvasFit {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanvasFit::FillCrop => "fill_crop",
            CanvasFit::Letterbox => "letterbox",
            CanvasFit::Compose {
                background: Background::Blurred,
            } => "compose_blurred",
            CanvasFit::Compose {
                background: Background::Black,
            } => "compose_black",
        }
    }
}

/// Decide how a clip of `source` orientation is fitted onto a `canvas`.
///
/// `blur_edges` only affects landscape clips on a portrait canvas; a portrait
/// clip on a landscape canvas always gets a black background.
pub fn fit_policy(source: Orientation, canvas: Orientation, blur_edges: bool) -> CanvasFit {
    match (source, canvas) {
        (Orientation::Portrait, Orientation::Portrait) => CanvasFit::FillCrop,
        (Orientation::Landscape, Orientation::Portrait) if blur_edges => CanvasFit::Compose {
            background: Background::Blurred,
        },
        (Orientation::Landscape, Orientation::Portrait) => CanvasFit::Compose {
            background: Background::Black,
        },
        (Orientation::Landscape, Orientation::Landscape) => CanvasFit::Letterbox,
        (Orientation::Portrait, Orientation::Landscape) => CanvasFit::Compose {
            background: Background::Black,
        },
    }
}

/// Build the `-filter_complex` graph that fits `[0:v]` onto the canvas.
pub fn canvas_filter_graph(fit: CanvasFit, canvas: Resolution) -> String {
    let (w, h) = (canvas.width, canvas.height);

    match fit {
        CanvasFit::FillCrop => format!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1{VIDEO_OUT_LABEL}"
        ),
        CanvasFit::Letterbox => format!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,setsar=1{VIDEO_OUT_LABEL}"
        ),
        CanvasFit::Compose { background } => {
            let paint = match background {
                Background::Blurred => FILTER_BLUR_BACKGROUND,
                Background::Black => FILTER_BLACK_BACKGROUND,
            };
            format!(
                "[0:v]split=2[fg][bg];\
                 [bg]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},{paint}[canvas];\
                 [fg]scale={w}:{h}:force_original_aspect_ratio=decrease[front];\
                 [canvas][front]overlay=({w}-w)/2:({h}-h)/2,crop={w}:{h},setsar=1{VIDEO_OUT_LABEL}"
            )
        }
    }
}

/// Build the concat graph for `inputs` clips that each carry video and audio.
///
/// Audio is normalized to one sample rate and layout so that clips whose
/// tracks differ (e.g. injected silence next to camera audio) concatenate.
pub fn concat_filter_graph(inputs: usize) -> String {
    let mut graph = String::new();
    let mut pairs = String::new();

    for i in 0..inputs {
        graph.push_str(&format!(
            "[{i}:v]setsar=1[v{i}];[{i}:a]aresample={SILENCE_SAMPLE_RATE},\
             aformat=channel_layouts={SILENCE_CHANNEL_LAYOUT}[a{i}];"
        ));
        pairs.push_str(&format!("[v{i}][a{i}]"));
    }

    graph.push_str(&pairs);
    graph.push_str(&format!(
        "concat=n={inputs}:v=1:a=1{VIDEO_OUT_LABEL}{AUDIO_OUT_LABEL}"
    ));
    graph
}

/// Silent audio source for `-f lavfi`.
pub fn silence_source() -> String {
    format!("anullsrc=r={SILENCE_SAMPLE_RATE}:cl={SILENCE_CHANNEL_LAYOUT}")
}

/// Append `extend_by` seconds of black frames to the video.
pub fn pad_video_filter(extend_by: f64) -> String {
    format!(
        "tpad=stop_mode=add:stop_duration={}:color=black",
        format_seconds(extend_by)
    )
}

/// Extend audio with silence until it is `total` seconds long.
pub fn pad_audio_filter(total: f64) -> String {
    format!("apad=whole_dur={}", format_seconds(total))
}
