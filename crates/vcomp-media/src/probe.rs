//! FFprobe stream information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use vcomp_models::{Orientation, Resolution};

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Stream-level facts about a media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaStreamInfo {
    pub has_video_stream: bool,
    pub has_audio_stream: bool,
    /// Width of the first video stream (0 without video)
    pub width: u32,
    /// Height of the first video stream (0 without video)
    pub height: u32,
    /// Duration of the first video stream in seconds
    pub video_duration: Option<f64>,
    /// Start offset of the first video stream in seconds
    pub video_start_offset: f64,
    /// Duration of the first audio stream in seconds
    pub audio_duration: Option<f64>,
    /// Start offset of the first audio stream in seconds
    pub audio_start_offset: f64,
    /// Container duration in seconds
    pub format_duration: Option<f64>,
}

impl MediaStreamInfo {
    /// A video-only file.
    pub fn video(width: u32, height: u32, duration: f64) -> Self {
        Self {
            has_video_stream: true,
            width,
            height,
            video_duration: Some(duration),
            format_duration: Some(duration),
            ..Default::default()
        }
    }

    /// An audio-only file.
    pub fn audio_only(duration: f64) -> Self {
        Self {
            has_audio_stream: true,
            audio_duration: Some(duration),
            format_duration: Some(duration),
            ..Default::default()
        }
    }

    /// Adds an audio stream of the given duration.
    pub fn with_audio(mut self, duration: f64) -> Self {
        self.has_audio_stream = true;
        self.audio_duration = Some(duration);
        self.format_duration = Some(self.format_duration.unwrap_or(0.0).max(duration));
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::from_dimensions(self.width, self.height)
    }

    /// Video length: stream duration, falling back to the container duration.
    pub fn video_length(&self) -> Option<f64> {
        if !self.has_video_stream {
            return None;
        }
        self.video_duration.or(self.format_duration)
    }

    /// Audio length: stream duration, falling back to the container duration.
    pub fn audio_length(&self) -> Option<f64> {
        if !self.has_audio_stream {
            return None;
        }
        self.audio_duration.or(self.format_duration)
    }
}

/// Capability to read stream facts from a file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<MediaStreamInfo>;
}

/// [`MediaProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProbe;

impl FfprobeProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> MediaResult<MediaStreamInfo> {
        probe_media(path).await
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    start_time: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    /// Matroska stores stream durations as a tag (HH:MM:SS.nnnnnnnnn)
    #[serde(rename = "DURATION")]
    duration: Option<String>,
}

impl FfprobeStream {
    fn kind(&self) -> Option<&str> {
        self.codec_type.as_deref()
    }

    fn duration_secs(&self) -> Option<f64> {
        self.duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .or_else(|| self.tags.duration.as_deref().and_then(|d| parse_timestamp(d).ok()))
            .filter(|d| d.is_finite() && *d >= 0.0)
    }

    fn start_secs(&self) -> f64 {
        self.start_time
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|s| s.is_finite())
            .unwrap_or(0.0)
    }
}

/// Probe a media file for stream information.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaStreamInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ProbeFailed {
            path: path.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_ffprobe_json(&output.stdout)
}

/// Convert raw ffprobe JSON into [`MediaStreamInfo`].
///
/// Attached pictures (cover art in audio files) are not counted as video.
pub fn parse_ffprobe_json(bytes: &[u8]) -> MediaResult<MediaStreamInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(bytes)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.kind() == Some("video") && s.disposition.attached_pic == 0);
    let audio = probe.streams.iter().find(|s| s.kind() == Some("audio"));

    let format_duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    Ok(MediaStreamInfo {
        has_video_stream: video.is_some(),
        has_audio_stream: audio.is_some(),
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        video_duration: video.and_then(FfprobeStream::duration_secs),
        video_start_offset: video.map(FfprobeStream::start_secs).unwrap_or(0.0),
        audio_duration: audio.and_then(FfprobeStream::duration_secs),
        audio_start_offset: audio.map(FfprobeStream::start_secs).unwrap_or(0.0),
        format_duration,
    })
}

/// Parse timestamp string (HH:MM:SS or HH:MM:SS.fraction) to seconds.
pub fn parse_timestamp(ts: &str) -> MediaResult<f64> {
    let parts: Vec<&str> = ts.trim().split(':').collect();
    if parts.len() != 3 {
        return Err(MediaError::InvalidTimestamp(ts.to_string()));
    }

    let parse = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| MediaError::InvalidTimestamp(ts.to_string()))
    };

    Ok(parse(parts[0])? * 3600.0 + parse(parts[1])? * 60.0 + parse(parts[2])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MP4_WITH_AUDIO: &str = r#"{
        "streams": [
            {"codec_type": "video", "width": 1920, "height": 1080, "duration": "12.500000", "start_time": "0.000000"},
            {"codec_type": "audio", "duration": "12.480000", "start_time": "0.021333"}
        ],
        "format": {"duration": "12.500000"}
    }"#;

    #[test]
    fn test_parse_video_with_audio() {
        let info = parse_ffprobe_json(MP4_WITH_AUDIO.as_bytes()).unwrap();
        assert!(info.has_video_stream);
        assert!(info.has_audio_stream);
        assert_eq!(info.resolution().to_string(), "1920x1080");
        assert_eq!(info.orientation(), Orientation::Landscape);
        assert!((info.video_length().unwrap() - 12.5).abs() < 1e-9);
        assert!((info.audio_length().unwrap() - 12.48).abs() < 1e-9);
        assert!((info.audio_start_offset - 0.021333).abs() < 1e-9);
    }

    #[test]
    fn test_parse_audio_with_cover_art() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "duration": "20.000000"},
                {"codec_type": "video", "width": 600, "height": 600, "disposition": {"attached_pic": 1}}
            ],
            "format": {"duration": "20.000000"}
        }"#;

        let info = parse_ffprobe_json(json.as_bytes()).unwrap();
        assert!(info.has_audio_stream);
        assert!(!info.has_video_stream);
        assert!(info.video_length().is_none());
    }

    #[test]
    fn test_parse_matroska_duration_tag() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1080, "height": 1920, "tags": {"DURATION": "00:02:23.070000000"}}
            ],
            "format": {"duration": "143.100000"}
        }"#;

        let info = parse_ffprobe_json(json.as_bytes()).unwrap();
        assert!(!info.has_audio_stream);
        assert_eq!(info.orientation(), Orientation::Portrait);
        assert!((info.video_duration.unwrap() - 143.07).abs() < 1e-6);
    }

    #[test]
    fn test_length_falls_back_to_format() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 480}], "format": {"duration": "7.0"}}"#;
        let info = parse_ffprobe_json(json.as_bytes()).unwrap();
        assert!((info.video_length().unwrap() - 7.0).abs() < 1e-9);
        assert!(info.audio_length().is_none());
    }

    #[test]
    fn test_parse_timestamp() {
        assert!((parse_timestamp("00:00:00").unwrap()).abs() < 0.001);
        assert!((parse_timestamp("00:01:00").unwrap() - 60.0).abs() < 0.001);
        assert!((parse_timestamp("01:00:00").unwrap() - 3600.0).abs() < 0.001);
        assert!((parse_timestamp("00:00:30.500").unwrap() - 30.5).abs() < 0.001);
        assert!(parse_timestamp("30.5").is_err());
    }

    #[test]
    fn test_builders() {
        let info = MediaStreamInfo::video(1080, 1920, 10.0).with_audio(10.0);
        assert!(info.has_video_stream && info.has_audio_stream);
        let audio = MediaStreamInfo::audio_only(20.0);
        assert!(!audio.has_video_stream);
        assert_eq!(audio.audio_length(), Some(20.0));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let result = probe_media("/nonexistent/clip.mp4").await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
