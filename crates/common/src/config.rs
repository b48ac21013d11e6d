//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ClipmixError, ClipmixResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory rendered variants are written into. Cleared at batch start.
    pub export_dir: PathBuf,

    /// Prefix used to build the access URL of each rendered variant.
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,

    /// External tool locations and supervision limits.
    #[serde(default)]
    pub tools: ToolConfig,

    /// Output encoding parameters.
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// Background mixing defaults.
    #[serde(default)]
    pub mixing: MixingDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Transcoder binary (name on PATH or absolute path).
    pub ffmpeg: String,

    /// Prober binary.
    pub ffprobe: String,

    /// Kill a single transcode after this many seconds. `None` waits forever.
    #[serde(default)]
    pub transcode_timeout_secs: Option<u64>,
}

/// Encoding parameters passed to the transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video encoder name.
    pub video_codec: String,

    /// Encoder speed preset.
    pub preset: String,

    /// Audio encoder name.
    pub audio_codec: String,

    /// Container extension for rendered files (without dot).
    pub container: String,

    /// Pixel format every clip is normalized to.
    pub pixel_format: String,

    /// Sample rate every audio stream is resampled to.
    pub audio_sample_rate: u32,
}

/// Defaults for background track mixing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixingDefaults {
    /// Background gain in decibels when none is given.
    pub default_volume_db: f64,

    /// Whether a short background track is looped by default.
    pub loop_background: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipmix=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("static").join("exports"),
            url_prefix: default_url_prefix(),
            tools: ToolConfig::default(),
            encoding: EncodingConfig::default(),
            mixing: MixingDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            transcode_timeout_secs: None,
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec().to_string(),
            preset: "fast".to_string(),
            audio_codec: "aac".to_string(),
            container: "mp4".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_sample_rate: 48000,
        }
    }
}

impl Default for MixingDefaults {
    fn default() -> Self {
        Self {
            default_volume_db: -15.0,
            loop_background: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit file. Errors are returned, not swallowed.
    pub fn load_from(path: &Path) -> ClipmixResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ClipmixError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => ClipmixError::config(format!("Failed to read {}: {e}", path.display())),
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Reject values the transcoder cannot work with.
    pub fn validate(&self) -> ClipmixResult<()> {
        if self.encoding.container.trim().is_empty() {
            return Err(ClipmixError::config("encoding.container must not be empty"));
        }
        if self.encoding.audio_sample_rate == 0 {
            return Err(ClipmixError::config(
                "encoding.audio_sample_rate must be positive",
            ));
        }
        if !self.mixing.default_volume_db.is_finite() {
            return Err(ClipmixError::config(
                "mixing.default_volume_db must be a finite number",
            ));
        }
        if self.tools.transcode_timeout_secs == Some(0) {
            return Err(ClipmixError::config(
                "tools.transcode_timeout_secs must be positive when set",
            ));
        }
        Ok(())
    }
}

/// Best-available hardware video encoder for the current platform.
pub fn default_video_codec() -> &'static str {
    if cfg!(target_os = "macos") {
        "h264_videotoolbox"
    } else {
        "libx264"
    }
}

fn default_url_prefix() -> String {
    "/download/".to_string()
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipmix").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_mixing_behavior() {
        let config = AppConfig::default();
        assert!((config.mixing.default_volume_db + 15.0).abs() < 1e-9);
        assert_eq!(config.encoding.preset, "fast");
        assert_eq!(config.encoding.container, "mp4");
        assert_eq!(config.encoding.audio_sample_rate, 48000);
        assert_eq!(config.url_prefix, "/download/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.tools.transcode_timeout_secs = Some(600);
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.tools.transcode_timeout_secs, Some(600));
        assert_eq!(loaded.encoding.video_codec, config.encoding.video_codec);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "export_dir": "/srv/exports" }"#).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.export_dir, PathBuf::from("/srv/exports"));
        assert_eq!(loaded.tools.ffmpeg, "ffmpeg");
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.tools.transcode_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        match AppConfig::load_from(&path) {
            Err(ClipmixError::FileNotFound { path: reported }) => assert_eq!(reported, path),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }
}
