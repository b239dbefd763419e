use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::video::time::MediaTime;

/// Main configuration for clipveil
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trim range rules
    pub trim: TrimConfig,

    /// Face blur settings
    pub blur: BlurConfig,

    /// Encoder settings for exported files
    pub export: ExportConfig,

    /// Preview and thumbnail settings
    pub preview: PreviewConfig,

    /// External tool locations
    pub ffmpeg: FfmpegConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.trim.validate()?;
        self.blur.validate()?;
        self.export.validate()?;
        self.preview.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Trim configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Shortest selectable range in seconds
    pub min_duration_secs: f64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self { min_duration_secs: 0.1 }
    }
}

impl TrimConfig {
    pub fn min_duration(&self) -> MediaTime {
        MediaTime::from_secs(self.min_duration_secs)
    }

    fn validate(&self) -> Result<()> {
        if !self.min_duration_secs.is_finite() || self.min_duration_secs <= 0.0 {
            return Err(invalid("trim.min_duration_secs", self.min_duration_secs).into());
        }
        Ok(())
    }
}

/// Face blur configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Margin added on every side of a detected face, in pixels
    pub padding_px: u32,

    /// Gaussian standard deviation in pixels
    pub sigma: f32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            padding_px: 100,
            sigma: 50.0,
        }
    }
}

impl BlurConfig {
    fn validate(&self) -> Result<()> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(invalid("blur.sigma", self.sigma).into());
        }
        Ok(())
    }
}

/// Export encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Video bitrate in bits per second when the source does not report one
    pub bitrate: u64,

    /// ffmpeg video encoder name
    pub codec: String,

    /// Encoder profile
    pub profile: String,

    /// ffmpeg audio codec, `copy` passes the source audio through
    pub audio_codec: String,

    /// Container extension, `mov` or `mp4`
    pub container: String,

    /// Where session exports are written
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            bitrate: 2_000_000,
            codec: "libx264".to_string(),
            profile: "high".to_string(),
            audio_codec: "copy".to_string(),
            container: "mov".to_string(),
            output_dir: std::env::temp_dir(),
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<()> {
        if self.bitrate == 0 {
            return Err(invalid("export.bitrate", self.bitrate).into());
        }
        if !matches!(self.container.as_str(), "mov" | "mp4") {
            return Err(invalid("export.container", &self.container).into());
        }
        if self.codec.trim().is_empty() {
            return Err(invalid("export.codec", &self.codec).into());
        }
        Ok(())
    }
}

/// Preview configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Longest edge of a filter-strip thumbnail in pixels
    pub thumbnail_edge: u32,

    /// Frames shown along the trim timeline
    pub timeline_count: usize,

    /// Number of parallel pixel-processing threads
    pub threads: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            thumbnail_edge: 160,
            timeline_count: 10,
            threads: num_cpus::get(),
        }
    }
}

impl PreviewConfig {
    fn validate(&self) -> Result<()> {
        if self.thumbnail_edge == 0 {
            return Err(invalid("preview.thumbnail_edge", self.thumbnail_edge).into());
        }
        if self.timeline_count == 0 {
            return Err(invalid("preview.timeline_count", self.timeline_count).into());
        }
        if self.threads == 0 {
            return Err(invalid("preview.threads", self.threads).into());
        }
        Ok(())
    }
}

/// External tool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClipError;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.blur.padding_px, 100);
        assert_eq!(config.export.bitrate, 2_000_000);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("clipveil.toml");

        let mut original = Config::default();
        original.export.container = "mp4".to_string();
        original.save_to_file(&file_path).unwrap();

        let loaded = Config::from_file(&file_path).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[blur]\nsigma = 20.0\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.blur.sigma, 20.0);
        assert_eq!(config.blur.padding_px, 100);
        assert_eq!(config.trim.min_duration_secs, 0.1);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/no/such/clipveil.toml");
        assert!(matches!(result, Err(ClipError::Config(ConfigError::FileNotFound { .. }))));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.trim.min_duration_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.container = "avi".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.preview.timeline_count = 0;
        assert!(config.validate().is_err());
    }
}
