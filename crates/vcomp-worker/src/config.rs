//! Composer configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use vcomp_models::EncodingConfig;

/// Composer configuration.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Scratch root; each job gets its own subdirectory
    pub work_dir: PathBuf,
    /// Maximum clips running splice/audio/standardize at once
    pub max_clip_parallel: usize,
    /// Per-transcode timeout (zero disables)
    pub ffmpeg_timeout: Duration,
    /// Whole-job timeout enforced by the binary
    pub job_timeout: Duration,
    /// Encoder settings for every re-encode
    pub encoding: EncodingConfig,
    /// Prometheus listener; metrics are only exported when set
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vcomp"),
            max_clip_parallel: 4,
            ffmpeg_timeout: Duration::from_secs(1800), // 30 minutes
            job_timeout: Duration::from_secs(7200),    // 2 hours
            encoding: EncodingConfig::default(),
            metrics_addr: None,
        }
    }
}

impl ComposerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_u64 = |key: &str, default: u64| {
            get(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };

        let mut encoding = defaults.encoding.clone();
        if let Some(codec) = get("COMPOSER_VIDEO_CODEC") {
            encoding.codec = codec;
        }
        if let Some(preset) = get("COMPOSER_PRESET") {
            encoding.preset = preset;
        }
        if let Some(crf) = get("COMPOSER_CRF").and_then(|s| s.trim().parse().ok()) {
            encoding.crf = crf;
        }
        if let Some(codec) = get("COMPOSER_AUDIO_CODEC") {
            encoding.audio_codec = codec;
        }
        if let Some(bitrate) = get("COMPOSER_AUDIO_BITRATE") {
            encoding.audio_bitrate = bitrate;
        }

        Self {
            work_dir: get("COMPOSER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_clip_parallel: (parse_u64(
                "COMPOSER_MAX_CLIP_PARALLEL",
                defaults.max_clip_parallel as u64,
            ) as usize)
                .max(1),
            ffmpeg_timeout: Duration::from_secs(parse_u64(
                "COMPOSER_FFMPEG_TIMEOUT_SECS",
                defaults.ffmpeg_timeout.as_secs(),
            )),
            job_timeout: Duration::from_secs(parse_u64(
                "COMPOSER_JOB_TIMEOUT_SECS",
                defaults.job_timeout.as_secs(),
            )),
            encoding,
            metrics_addr: get("COMPOSER_METRICS_ADDR").and_then(|s| s.trim().parse().ok()),
        }
    }
}
