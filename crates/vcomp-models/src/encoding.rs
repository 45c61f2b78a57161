//! Encoder settings shared by every re-encoding directive.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sample rate of generated silence and of the normalized concat audio
pub const SILENCE_SAMPLE_RATE: u32 = 48_000;
/// Channel layout of generated silence
pub const SILENCE_CHANNEL_LAYOUT: &str = "stereo";

/// Encoder settings. Missing fields in a job file take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    /// Video encoder, `libx264` by default
    pub codec: String,
    pub preset: String,
    /// Constant rate factor, 0-51
    pub crf: u8,
    /// Output pixel format; `yuv420p` keeps files playable everywhere
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Appended after the encoder arguments of every re-encode
    pub extra_args: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".into(),
            preset: "fast".into(),
            crf: 20,
            pixel_format: "yuv420p".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    pub fn video_args(&self) -> Vec<String> {
        let crf = self.crf.to_string();
        [
            "-c:v",
            self.codec.as_str(),
            "-preset",
            self.preset.as_str(),
            "-crf",
            crf.as_str(),
            "-pix_fmt",
            self.pixel_format.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn audio_args(&self) -> Vec<String> {
        ["-c:a", self.audio_codec.as_str(), "-b:a", self.audio_bitrate.as_str()]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Video and audio encoder arguments followed by `extra_args`.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_args_order() {
        let config = EncodingConfig {
            crf: 23,
            extra_args: vec!["-threads".into(), "2".into()],
            ..EncodingConfig::default()
        };
        assert_eq!(
            config.to_ffmpeg_args(),
            vec![
                "-c:v", "libx264", "-preset", "fast", "-crf", "23", "-pix_fmt", "yuv420p", "-c:a",
                "aac", "-b:a", "192k", "-threads", "2",
            ]
        );
    }

    #[test]
    fn test_partial_job_file_uses_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"crf": 18}"#).unwrap();
        assert_eq!(config.crf, 18);
        assert_eq!(config.preset, "fast");
        assert_eq!(config.audio_codec, "aac");
    }
}
