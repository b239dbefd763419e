//! # Color Filters
//!
//! Non-destructive color treatment of frames: a named preset followed by
//! brightness, contrast and saturation adjustments.
//!
//! ## Built-in Presets
//!
//! - **Original**: no change
//! - **Noir**, **Mono**, **Tonal**: black and white variants
//! - **Chrome**: vivid, punchy color
//! - **Fade**, **Instant**, **Transfer**: faded and warm film looks
//! - **Process**: cool cross-processed tones
//!
//! ## Usage
//!
//! ```rust,no_run
//! use clipveil::filters::{ColorFilterStage, FilterSpec};
//! use clipveil::video::Frame;
//!
//! let stage = ColorFilterStage::new();
//! let spec = FilterSpec::preset("Noir").with_adjustments(0.1, 1.2, 1.0);
//! let filter = stage.resolve(&spec).unwrap();
//! let frame = filter.apply(Frame::new_black(64, 48));
//! ```

pub mod adjust;
pub mod presets;
pub mod registry;
pub mod spec;
pub mod stage;
pub mod traits;

pub use adjust::Adjustments;
pub use registry::PresetRegistry;
pub use spec::FilterSpec;
pub use stage::{ColorFilter, ColorFilterStage};
pub use traits::ColorPreset;
