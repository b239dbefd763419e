//! # clipveil
//!
//! Non-destructive color filters with frame-by-frame preview, trimming, and
//! privacy face-blur export.
//!
//! Two paths share the same stages:
//!
//! - **Preview**: [`PreviewCompositor`] runs the current [`FilterSpec`] over
//!   each displayed frame in memory. Nothing is encoded.
//! - **Export**: [`TranscodeEngine`] pulls frames inside a trim range from a
//!   [`FrameSource`](video::FrameSource), blurs detected faces, optionally
//!   burns in a filter, and encodes the result on a background worker.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clipveil::{
//!     blur::NoFaceDetector,
//!     config::Config,
//!     transcode::{ExportOptions, JobStatus, TranscodeEngine},
//!     trim::TrimPlanner,
//!     video::MediaAsset,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let asset = MediaAsset::probe("clip.mov", &config.ffmpeg.ffprobe_bin)?;
//! let range = TrimPlanner::from_config(&config.trim).propose(asset.duration, 2.0, 6.0)?;
//!
//! let engine = TranscodeEngine::from_config(&config, Arc::new(NoFaceDetector));
//! let job = engine.start(&asset, range, ExportOptions::trim_only("trimmed.mov"))?;
//! if let JobStatus::Completed(output) = job.wait().await {
//!     println!("wrote {} frames to {}", output.frame_count, output.path.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Presets
//!
//! Register your own look by implementing [`ColorPreset`](filters::ColorPreset):
//!
//! ```rust,no_run
//! use clipveil::filters::{ColorFilterStage, ColorPreset, PresetRegistry};
//!
//! struct Invert;
//!
//! impl ColorPreset for Invert {
//!     fn name(&self) -> &str {
//!         "Invert"
//!     }
//!
//!     fn description(&self) -> &str {
//!         "Negative image"
//!     }
//!
//!     fn transform(&self, rgb: [f32; 3]) -> [f32; 3] {
//!         rgb.map(|c| 1.0 - c)
//!     }
//! }
//!
//! let mut registry = PresetRegistry::new();
//! registry.register("Invert", || Box::new(Invert));
//! let stage = ColorFilterStage::with_registry(registry);
//! ```

pub mod blur;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod filters;
pub mod preview;
pub mod session;
pub mod transcode;
pub mod trim;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    blur::{FaceDetector, FaceMaskStage},
    config::Config,
    error::{ClipError, Result},
    filters::{ColorFilterStage, ColorPreset, FilterSpec, PresetRegistry},
    preview::{PlaybackSpeed, PreviewCompositor},
    session::{EditorSession, PreviewSource},
    transcode::{ExportOptions, JobHandle, JobStatus, TranscodeEngine},
    trim::TrimPlanner,
    video::{MediaAsset, MediaTime, TimeRange},
};
