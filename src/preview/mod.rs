//! # Preview
//!
//! Real-time, non-destructive display path: per-frame filtering, the filter
//! and trim timeline thumbnail strips, playback speed and scrub position
//! handling.

pub mod compositor;
pub mod scrub;
pub mod speed;

pub use compositor::{timeline_thumbnails, PreviewCompositor, Thumbnail};
pub use scrub::ScrubPosition;
pub use speed::{PlaybackSpeed, PLAYBACK_RATES};
