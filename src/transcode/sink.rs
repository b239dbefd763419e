//! Encoder sinks: where exported frames go.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ExportConfig, FfmpegConfig};
use crate::error::EncodeError;
use crate::ffmpeg::StderrTail;
use crate::transcode::job::{ExportOptions, OutputHandle};
use crate::video::asset::MediaAsset;
use crate::video::time::{FrameRate, MediaTime, TimeRange};
use crate::video::types::{Frame, PixelFormat, Size};

/// Accepts frames in presentation order and produces a container
pub trait EncoderSink: Send {
    fn write_frame(&mut self, frame: Frame) -> Result<(), EncodeError>;

    /// Flush and close the output. Called exactly once, on every exit path.
    fn finish(self: Box<Self>) -> Result<OutputHandle, EncodeError>;
}

/// Creates a sink for one job
pub trait SinkFactory: Send + Sync {
    fn create(
        &self,
        asset: &MediaAsset,
        range: TimeRange,
        options: &ExportOptions,
    ) -> Result<Box<dyn EncoderSink>, EncodeError>;
}

/// Geometry and ordering checks shared by every sink
#[derive(Debug, Clone)]
struct FrameGate {
    size: Size,
    rate: FrameRate,
    last_pts: Option<MediaTime>,
    count: u64,
}

impl FrameGate {
    fn new(size: Size, rate: FrameRate) -> Self {
        Self {
            size,
            rate,
            last_pts: None,
            count: 0,
        }
    }

    fn admit(&mut self, frame: &Frame) -> Result<(), EncodeError> {
        if frame.size() != self.size {
            return Err(EncodeError::FrameRejected {
                reason: format!("frame is {}, output is {}", frame.size(), self.size),
            });
        }
        if let Some(last) = self.last_pts {
            if frame.pts() <= last {
                return Err(EncodeError::FrameRejected {
                    reason: format!("timestamp {} does not follow {}", frame.pts(), last),
                });
            }
        }
        self.last_pts = Some(frame.pts());
        self.count += 1;
        Ok(())
    }

    /// Last timestamp plus one frame
    fn duration(&self) -> MediaTime {
        self.last_pts
            .map(|pts| pts + self.rate.frame_duration())
            .unwrap_or(MediaTime::ZERO)
    }

    fn handle(&self, path: &Path) -> OutputHandle {
        OutputHandle {
            path: path.to_path_buf(),
            frame_count: self.count,
            duration: self.duration(),
        }
    }
}

/// Encodes through an external `ffmpeg` process fed raw RGB on stdin
pub struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: StderrTail,
    gate: FrameGate,
    output: PathBuf,
}

impl FfmpegSink {
    pub fn spawn(
        ffmpeg_bin: &str,
        export: &ExportConfig,
        asset: &MediaAsset,
        range: TimeRange,
        output: &Path,
    ) -> Result<Self, EncodeError> {
        let args = Self::command_args(export, asset, range, output);
        debug!("{} {}", ffmpeg_bin, args.join(" "));

        let mut child = Command::new(ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EncodeError::StartFailed {
                reason: format!("{} could not be started: {}", ffmpeg_bin, e),
            })?;

        let stdin = child.stdin.take();
        let stderr = StderrTail::capture(child.stderr.take());

        info!(
            "Encoding {} ({} @ {} fps, {} bit/s) to {}",
            asset.label(),
            asset.natural_size,
            asset.frame_rate,
            Self::target_bitrate(export, asset),
            output.display()
        );

        Ok(Self {
            child,
            stdin,
            stderr,
            gate: FrameGate::new(asset.natural_size, asset.frame_rate),
            output: output.to_path_buf(),
        })
    }

    /// Arguments for encoding `range` of `asset` into `output`
    pub fn command_args(export: &ExportConfig, asset: &MediaAsset, range: TimeRange, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-v", "error", "-y", "-nostdin"].iter().map(|s| s.to_string()).collect();
        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

        push(&["-f", "rawvideo", "-pix_fmt", PixelFormat::Rgb24.ffmpeg_name()]);
        push(&["-s", &asset.natural_size.to_string()]);
        push(&["-framerate", &asset.frame_rate.to_string()]);
        if asset.rotation != 0 {
            push(&["-display_rotation", &asset.rotation.to_string()]);
        }
        push(&["-i", "pipe:0"]);

        let audio_source = asset.path().filter(|_| asset.has_audio);
        if let Some(source) = audio_source {
            let source = source.display().to_string();
            push(&["-ss", &format!("{:.6}", range.start.as_secs())]);
            push(&["-t", &format!("{:.6}", range.duration().as_secs())]);
            push(&["-i", &source]);
        }

        push(&["-map", "0:v:0"]);
        if audio_source.is_some() {
            push(&["-map", "1:a:0?", "-c:a", &export.audio_codec]);
        }

        let bitrate = Self::target_bitrate(export, asset).to_string();
        push(&["-c:v", &export.codec, "-profile:v", &export.profile, "-b:v", &bitrate]);
        push(&["-pix_fmt", "yuv420p"]);
        push(&["-f", &export.container]);
        args.push(output.display().to_string());
        args
    }

    /// The source's own video bitrate, or the configured one when it is unknown
    pub fn target_bitrate(export: &ExportConfig, asset: &MediaAsset) -> u64 {
        asset.bitrate.filter(|&b| b > 0).unwrap_or(export.bitrate)
    }

    fn stderr_reason(&mut self, fallback: &str) -> String {
        self.stderr.reason(fallback)
    }
}

impl EncoderSink for FfmpegSink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), EncodeError> {
        self.gate.admit(&frame)?;

        let stdin = self.stdin.as_mut().ok_or_else(|| EncodeError::FrameRejected {
            reason: "encoder input already closed".to_string(),
        })?;
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            // The encoder went away; its stderr says why
            self.stdin = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
            let reason = self.stderr_reason(&e.to_string());
            return Err(EncodeError::FrameRejected { reason });
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<OutputHandle, EncodeError> {
        // Closing stdin signals end of stream
        drop(self.stdin.take());
        let status = self.child.wait().map_err(|e| EncodeError::FinalizeFailed { reason: e.to_string() })?;

        if !status.success() {
            let reason = self.stderr_reason("encoder exited with an error");
            return Err(EncodeError::FinalizeFailed { reason });
        }

        let handle = self.gate.handle(&self.output);
        info!(
            "Wrote {} frames ({}) to {}",
            handle.frame_count,
            handle.duration,
            handle.path.display()
        );
        Ok(handle)
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            warn!("Encoder for {} dropped without finishing", self.output.display());
            self.stdin = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Creates [`FfmpegSink`]s from the export configuration
#[derive(Debug, Clone, Default)]
pub struct FfmpegSinkFactory {
    ffmpeg: FfmpegConfig,
    export: ExportConfig,
}

impl FfmpegSinkFactory {
    pub fn new(ffmpeg: FfmpegConfig, export: ExportConfig) -> Self {
        Self { ffmpeg, export }
    }
}

impl SinkFactory for FfmpegSinkFactory {
    fn create(
        &self,
        asset: &MediaAsset,
        range: TimeRange,
        options: &ExportOptions,
    ) -> Result<Box<dyn EncoderSink>, EncodeError> {
        if let Some(parent) = options.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| EncodeError::StartFailed {
                reason: format!("cannot create {}: {}", parent.display(), e),
            })?;
        }
        let sink = FfmpegSink::spawn(&self.ffmpeg.ffmpeg_bin, &self.export, asset, range, &options.output)?;
        Ok(Box::new(sink))
    }
}

/// Frames collected by a [`MemorySink`]
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    pub frames: Vec<Frame>,
    pub finished: bool,
}

/// Keeps exported frames in memory, keyed by output path
#[derive(Clone, Default)]
pub struct MemorySinkFactory {
    outputs: Arc<Mutex<HashMap<PathBuf, MemoryOutput>>>,
    frame_delay: Option<Duration>,
    reject_after: Option<u64>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long on every frame, to keep jobs observable mid-flight
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    /// Reject every frame after the first `frames`
    pub fn rejecting_after(mut self, frames: u64) -> Self {
        self.reject_after = Some(frames);
        self
    }

    pub fn output<P: AsRef<Path>>(&self, path: P) -> Option<MemoryOutput> {
        self.outputs.lock().get(path.as_ref()).cloned()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn create(
        &self,
        asset: &MediaAsset,
        _range: TimeRange,
        options: &ExportOptions,
    ) -> Result<Box<dyn EncoderSink>, EncodeError> {
        self.outputs.lock().insert(options.output.clone(), MemoryOutput::default());
        Ok(Box::new(MemorySink {
            outputs: Arc::clone(&self.outputs),
            path: options.output.clone(),
            gate: FrameGate::new(asset.natural_size, asset.frame_rate),
            frame_delay: self.frame_delay,
            reject_after: self.reject_after,
        }))
    }
}

/// Sink that stores frames in a shared map instead of encoding them
pub struct MemorySink {
    outputs: Arc<Mutex<HashMap<PathBuf, MemoryOutput>>>,
    path: PathBuf,
    gate: FrameGate,
    frame_delay: Option<Duration>,
    reject_after: Option<u64>,
}

impl EncoderSink for MemorySink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), EncodeError> {
        if let Some(delay) = self.frame_delay {
            std::thread::sleep(delay);
        }
        if self.reject_after.is_some_and(|limit| self.gate.count >= limit) {
            return Err(EncodeError::FrameRejected {
                reason: format!("sink full after {} frames", self.gate.count),
            });
        }
        self.gate.admit(&frame)?;
        self.outputs
            .lock()
            .entry(self.path.clone())
            .or_default()
            .frames
            .push(frame);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<OutputHandle, EncodeError> {
        self.outputs.lock().entry(self.path.clone()).or_default().finished = true;
        Ok(self.gate.handle(&self.path))
    }
}
