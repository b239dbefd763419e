//! # Video Module
//!
//! Asset probing, the rational time model, frame buffers and frame sources.

pub mod asset;
pub mod source;
pub mod time;
pub mod types;

pub use asset::{AssetSource, MediaAsset};
pub use source::{frame_at, AutoDecoder, Decoder, FfmpegDecoder, FrameSource, RangedSource, RawFrameReader, SyntheticDecoder};
pub use time::{FrameRate, MediaTime, TimeRange};
pub use types::{Frame, PixelFormat, Size};
