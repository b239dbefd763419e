use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::OpenError;
use crate::video::time::{FrameRate, MediaTime};
use crate::video::types::Size;

/// Where an asset's frames come from
#[derive(Debug, Clone, PartialEq)]
pub enum AssetSource {
    /// A container on the local filesystem
    File(PathBuf),
    /// Generated test pattern, no backing file
    Synthetic,
}

/// Immutable description of a decodable video
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub source: AssetSource,
    pub duration: MediaTime,
    /// Coded frame size before the display rotation is applied
    pub natural_size: Size,
    /// Display rotation in degrees, as carried by the container's display matrix
    pub rotation: i32,
    pub frame_rate: FrameRate,
    pub video_codec: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
    /// Video bitrate in bits per second when the container reports it
    pub bitrate: Option<u64>,
}

impl MediaAsset {
    /// Probe a container with ffprobe
    pub fn probe<P: AsRef<Path>>(path: P, ffprobe_bin: &str) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        if !path.is_file() {
            return Err(OpenError::Unreadable {
                path: path_str,
                reason: "file does not exist".to_string(),
            });
        }

        let output = Command::new(ffprobe_bin)
            .args([
                "-v", "error",
                "-print_format", "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| OpenError::Unreadable {
                path: path_str.clone(),
                reason: format!("{} could not be started: {}", ffprobe_bin, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OpenError::Unreadable {
                path: path_str,
                reason: stderr.trim().to_string(),
            });
        }

        let json: Value = serde_json::from_slice(&output.stdout).map_err(|e| OpenError::Unreadable {
            path: path_str.clone(),
            reason: format!("invalid ffprobe output: {}", e),
        })?;

        let asset = Self::from_probe_json(path, &json)?;
        info!(
            "Probed {}: {} @ {} fps, {}, rotation {}°, audio: {}",
            path_str,
            asset.natural_size,
            asset.frame_rate,
            asset.duration,
            asset.rotation,
            asset.has_audio
        );
        Ok(asset)
    }

    /// Build an asset from ffprobe's `-show_streams -show_format` JSON
    pub fn from_probe_json(path: &Path, json: &Value) -> Result<Self, OpenError> {
        let path_str = path.display().to_string();
        let streams = json
            .get("streams")
            .and_then(|s| s.as_array())
            .cloned()
            .unwrap_or_default();

        let codec_type = |s: &Value| s.get("codec_type").and_then(|v| v.as_str()).map(str::to_owned);
        let video = streams.iter().find(|s| codec_type(s).as_deref() == Some("video"));
        let has_audio = streams.iter().any(|s| codec_type(s).as_deref() == Some("audio"));

        let video = video.ok_or_else(|| OpenError::NoVideoTrack { path: path_str.clone() })?;

        let video_codec = video.get("codec_name").and_then(|v| v.as_str()).map(str::to_owned);
        if video_codec.is_none() {
            let tag = video
                .get("codec_tag_string")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            return Err(OpenError::UnsupportedFormat { format: tag.to_string() });
        }

        let width = video.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        let height = video.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if width == 0 || height == 0 {
            return Err(OpenError::UnsupportedFormat {
                format: video_codec.unwrap_or_default(),
            });
        }

        let frame_rate = ["avg_frame_rate", "r_frame_rate"]
            .iter()
            .filter_map(|key| video.get(*key).and_then(|v| v.as_str()))
            .find_map(FrameRate::parse)
            .unwrap_or_else(|| {
                warn!("No usable frame rate for {}, assuming 30 fps", path_str);
                FrameRate::FPS_30
            });

        let duration_secs = video
            .get("duration")
            .and_then(parse_number)
            .or_else(|| json.get("format").and_then(|f| f.get("duration")).and_then(parse_number))
            .ok_or_else(|| OpenError::Unreadable {
                path: path_str.clone(),
                reason: "duration unknown".to_string(),
            })?;

        let bitrate = video
            .get("bit_rate")
            .and_then(parse_number)
            .map(|b| b as u64);

        let rotation = Self::rotation_of(video);
        debug!("{}: codec {:?}, rotation {}", path_str, video_codec, rotation);

        Ok(Self {
            source: AssetSource::File(path.to_path_buf()),
            duration: MediaTime::from_secs(duration_secs),
            natural_size: Size::new(width, height),
            rotation,
            frame_rate,
            video_codec,
            has_video: true,
            has_audio,
            bitrate,
        })
    }

    /// A generated test-pattern asset with no backing file
    pub fn synthetic(natural_size: Size, frame_rate: FrameRate, duration: MediaTime) -> Self {
        Self {
            source: AssetSource::Synthetic,
            duration,
            natural_size,
            rotation: 0,
            frame_rate,
            video_codec: Some("synthetic".to_string()),
            has_video: true,
            has_audio: false,
            bitrate: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            AssetSource::File(path) => Some(path),
            AssetSource::Synthetic => None,
        }
    }

    /// Human-readable label used in logs and error messages
    pub fn label(&self) -> String {
        match &self.source {
            AssetSource::File(path) => path.display().to_string(),
            AssetSource::Synthetic => "<synthetic>".to_string(),
        }
    }

    /// Size after the display rotation is applied
    pub fn display_size(&self) -> Size {
        if self.rotation.rem_euclid(180) == 90 {
            Size::new(self.natural_size.height, self.natural_size.width)
        } else {
            self.natural_size
        }
    }

    /// Rotation from the display matrix side data, falling back to the legacy `rotate` tag.
    fn rotation_of(video: &Value) -> i32 {
        let from_side_data = video
            .get("side_data_list")
            .and_then(|l| l.as_array())
            .and_then(|list| list.iter().find_map(|d| d.get("rotation").and_then(parse_number)));

        let from_tag = || {
            video
                .get("tags")
                .and_then(|t| t.get("rotate"))
                .and_then(parse_number)
                // The legacy tag is clockwise, the display matrix counter-clockwise
                .map(|deg| -deg)
        };

        from_side_data.or_else(from_tag).map(|deg| deg.round() as i32).unwrap_or(0)
    }
}

/// ffprobe emits numbers both as JSON numbers and as strings
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn probe_json() -> Value {
        json!({
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "avg_frame_rate": "30000/1001",
                    "r_frame_rate": "30000/1001",
                    "duration": "10.010000",
                    "bit_rate": "8000000",
                    "side_data_list": [{ "side_data_type": "Display Matrix", "rotation": -90 }]
                },
                { "codec_type": "audio", "codec_name": "aac" }
            ],
            "format": { "duration": "10.050000" }
        })
    }

    #[test]
    fn test_from_probe_json() {
        let asset = MediaAsset::from_probe_json(Path::new("clip.mov"), &probe_json()).unwrap();
        assert_eq!(asset.natural_size, Size::new(1920, 1080));
        assert_eq!(asset.display_size(), Size::new(1080, 1920));
        assert_eq!(asset.frame_rate, FrameRate::NTSC_30);
        assert_eq!(asset.rotation, -90);
        assert_eq!(asset.duration, MediaTime::from_secs(10.01));
        assert_eq!(asset.bitrate, Some(8_000_000));
        assert!(asset.has_audio);
    }

    #[test]
    fn test_legacy_rotate_tag() {
        let mut json = probe_json();
        json["streams"][0].as_object_mut().unwrap().remove("side_data_list");
        json["streams"][0]["tags"] = json!({ "rotate": "90" });
        let asset = MediaAsset::from_probe_json(Path::new("clip.mov"), &json).unwrap();
        assert_eq!(asset.rotation, -90);
    }

    #[test]
    fn test_no_video_track() {
        let json = json!({ "streams": [{ "codec_type": "audio", "codec_name": "aac" }] });
        let result = MediaAsset::from_probe_json(Path::new("song.m4a"), &json);
        assert!(matches!(result, Err(OpenError::NoVideoTrack { .. })));
    }

    #[test]
    fn test_undecodable_codec() {
        let json = json!({
            "streams": [{ "codec_type": "video", "codec_tag_string": "apcx", "width": 640, "height": 480 }],
            "format": { "duration": "1.0" }
        });
        let result = MediaAsset::from_probe_json(Path::new("clip.mov"), &json);
        assert_eq!(result, Err(OpenError::UnsupportedFormat { format: "apcx".to_string() }));
    }

    #[test]
    fn test_missing_file() {
        let result = MediaAsset::probe("/definitely/not/here.mp4", "ffprobe");
        assert!(matches!(result, Err(OpenError::Unreadable { .. })));
    }
}
