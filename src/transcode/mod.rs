//! # Transcode
//!
//! Offline export: frames are pulled from a [`FrameSource`](crate::video::FrameSource)
//! inside the trim range, optionally face-blurred and color filtered, and
//! pushed to an [`EncoderSink`]. Jobs run on tokio's blocking pool and report
//! progress and a single terminal [`JobStatus`] through a [`JobHandle`].

pub mod engine;
pub mod job;
pub mod sink;

pub use engine::TranscodeEngine;
pub use job::{ExportOptions, JobHandle, JobId, JobStatus, OutputHandle};
pub use sink::{EncoderSink, FfmpegSink, FfmpegSinkFactory, MemoryOutput, MemorySink, MemorySinkFactory, SinkFactory};
