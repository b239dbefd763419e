//! Frame sources: decoders that yield timestamped frames inside a time range.
//!
//! Every backend produces a raw stream carrying absolute presentation
//! timestamps. [`RangedSource`] applies the range and rebases timestamps so
//! the first frame handed out is at zero.

use std::collections::HashSet;
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use crate::error::{ClipError, OpenError, ReadError};
use crate::ffmpeg::StderrTail;
use crate::video::asset::{AssetSource, MediaAsset};
use crate::video::time::{FrameRate, MediaTime, TimeRange};
use crate::video::types::{Frame, PixelFormat, Size};

/// A pull-based sequence of decoded frames
pub trait FrameSource: Send {
    /// Next frame in presentation order, `None` once exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>, ReadError>;
}

/// Opens an asset for sequential decoding over a range
pub trait Decoder: Send + Sync {
    fn open(&self, asset: &MediaAsset, range: TimeRange) -> Result<Box<dyn FrameSource>, OpenError>;
}

/// Restricts a raw stream to `[start, end)` and rebases its timestamps
pub struct RangedSource<S> {
    inner: S,
    range: TimeRange,
    last_pts: Option<MediaTime>,
    done: bool,
}

impl<S: FrameSource> RangedSource<S> {
    pub fn new(inner: S, range: TimeRange) -> Self {
        Self {
            inner,
            range,
            last_pts: None,
            done: false,
        }
    }
}

impl<S: FrameSource> FrameSource for RangedSource<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, ReadError> {
        if self.done {
            return Ok(None);
        }

        loop {
            let frame = match self.inner.next_frame()? {
                Some(frame) => frame,
                None => {
                    self.done = true;
                    return Ok(None);
                }
            };

            let pts = frame.pts();
            if pts < self.range.start {
                continue;
            }
            if pts >= self.range.end {
                self.done = true;
                return Ok(None);
            }
            if let Some(last) = self.last_pts {
                if pts <= last {
                    warn!("Dropping out-of-order frame at {} (previous {})", pts, last);
                    continue;
                }
            }

            self.last_pts = Some(pts);
            return Ok(Some(frame.with_pts(pts - self.range.start)));
        }
    }
}

/// Decoder backed by an external `ffmpeg` process writing raw RGB to a pipe
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg_bin: String,
    /// Codec names this ffmpeg build can decode, listed once on first open
    codecs: Arc<OnceLock<Option<HashSet<String>>>>,
}

impl FfmpegDecoder {
    pub fn new<S: Into<String>>(ffmpeg_bin: S) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            codecs: Arc::new(OnceLock::new()),
        }
    }

    /// Decoder that trusts `codecs` instead of asking the ffmpeg build
    pub fn with_codecs<S, I>(ffmpeg_bin: S, codecs: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let codecs: HashSet<String> = codecs.into_iter().map(Into::into).collect();
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            codecs: Arc::new(OnceLock::from(Some(codecs))),
        }
    }

    fn decodable_codecs(&self) -> Option<&HashSet<String>> {
        self.codecs
            .get_or_init(|| list_decodable_codecs(&self.ffmpeg_bin))
            .as_ref()
    }

    /// Rejects a video codec the ffmpeg build has no decoder for.
    ///
    /// When the codec list cannot be obtained the check is skipped and a
    /// missing decoder surfaces as a read error instead.
    fn check_codec(&self, asset: &MediaAsset) -> Result<(), OpenError> {
        let Some(codec) = asset.video_codec.as_deref() else {
            return Ok(());
        };
        match self.decodable_codecs() {
            Some(codecs) if !codecs.contains(codec) => Err(OpenError::UnsupportedFormat {
                format: codec.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Decoder for FfmpegDecoder {
    fn open(&self, asset: &MediaAsset, range: TimeRange) -> Result<Box<dyn FrameSource>, OpenError> {
        if !asset.has_video {
            return Err(OpenError::NoVideoTrack { path: asset.label() });
        }
        let path = asset.path().ok_or_else(|| OpenError::Unreadable {
            path: asset.label(),
            reason: "asset has no backing file".to_string(),
        })?;
        self.check_codec(asset)?;

        let rate = asset.frame_rate;
        let mut command = Command::new(&self.ffmpeg_bin);
        command
            .args(["-v", "error", "-nostdin", "-noautorotate"])
            .args(["-ss", &format!("{:.6}", range.start.as_secs())])
            .arg("-i")
            .arg(path)
            .args(["-t", &format!("{:.6}", range.duration().as_secs())])
            .args(["-map", "0:v:0"])
            .args(["-vf", &format!("fps={}", rate)])
            .args(["-f", "rawvideo", "-pix_fmt", PixelFormat::Rgb24.ffmpeg_name(), "pipe:1"]);

        let raw = FfmpegFrames::spawn(&mut command, asset.natural_size, rate, range.start).map_err(|e| {
            OpenError::Unreadable {
                path: asset.label(),
                reason: format!("{} could not be started: {}", self.ffmpeg_bin, e),
            }
        })?;

        info!("Decoding {} over {} at {} fps", asset.label(), range, rate);
        Ok(Box::new(RangedSource::new(raw, range)))
    }
}

/// Runs `ffmpeg -codecs` and keeps the video codecs it can decode
fn list_decodable_codecs(ffmpeg_bin: &str) -> Option<HashSet<String>> {
    let output = Command::new(ffmpeg_bin)
        .args(["-hide_banner", "-codecs"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output();
    match output {
        Ok(output) if output.status.success() => {
            let codecs = parse_decodable_codecs(&String::from_utf8_lossy(&output.stdout));
            debug!("{} can decode {} video codecs", ffmpeg_bin, codecs.len());
            Some(codecs)
        }
        Ok(output) => {
            warn!("{} -codecs exited with {}; skipping the codec check", ffmpeg_bin, output.status);
            None
        }
        Err(e) => {
            warn!("Could not list codecs with {}: {}", ffmpeg_bin, e);
            None
        }
    }
}

/// Video codec names with decoding support from an `ffmpeg -codecs` listing.
///
/// Rows follow a dashed separator and start with a flag column such as
/// `DEV.LS`: `D` in the first place means decodable, `V` in the third a
/// video codec.
fn parse_decodable_codecs(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let mut flags = fields.next()?.chars();
            let name = fields.next()?;
            (flags.next() == Some('D') && flags.nth(1) == Some('V')).then(|| name.to_string())
        })
        .collect()
}

/// Back-to-back rgb24 frames read from a byte stream onto a constant-rate grid
pub struct RawFrameReader<R> {
    reader: R,
    size: Size,
    rate: FrameRate,
    /// Timestamp of the first frame in the stream
    origin: MediaTime,
    index: u64,
    exhausted: bool,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, size: Size, rate: FrameRate, origin: MediaTime) -> Self {
        Self {
            reader,
            size,
            rate,
            origin,
            index: 0,
            exhausted: false,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.index
    }

    fn frame_bytes(&self) -> usize {
        self.size.pixels() * PixelFormat::Rgb24.bytes_per_pixel()
    }

    /// Reads until `buf` is full or the stream ends; returns the byte count
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ReadError::DecodeFailed { reason: e.to_string() }),
            }
        }
        Ok(filled)
    }

    /// The next whole frame, `None` when the stream ends on a frame boundary
    pub fn read_frame(&mut self) -> Result<Option<Frame>, ReadError> {
        if self.exhausted {
            return Ok(None);
        }

        let expected = self.frame_bytes();
        let mut data = vec![0u8; expected];
        let actual = self.fill(&mut data)?;

        if actual == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        if actual < expected {
            self.exhausted = true;
            return Err(ReadError::ShortFrame { expected, actual });
        }

        let pts = self.origin + MediaTime::for_frame(self.index, self.rate);
        self.index += 1;
        Frame::from_rgb_bytes(self.size.width, self.size.height, data, pts)
            .map(Some)
            .ok_or(ReadError::ShortFrame { expected, actual })
    }
}

impl<R: Read + Send> FrameSource for RawFrameReader<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>, ReadError> {
        self.read_frame()
    }
}

/// Raw frames read from a decoder process's stdout
struct FfmpegFrames {
    child: Child,
    frames: RawFrameReader<ChildStdout>,
    stderr: StderrTail,
    finished: bool,
}

impl FfmpegFrames {
    /// Starts `command` with its stdout piped into a frame reader.
    ///
    /// The command seeks to `origin`, so its output clock starts there.
    fn spawn(command: &mut Command, size: Size, rate: FrameRate, origin: MediaTime) -> std::io::Result<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "decoder produced no output pipe",
                ));
            }
        };
        let stderr = StderrTail::capture(child.stderr.take());

        Ok(Self {
            child,
            frames: RawFrameReader::new(stdout, size, rate, origin),
            stderr,
            finished: false,
        })
    }

    fn finish(&mut self) -> Result<(), ReadError> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| ReadError::DecodeFailed { reason: e.to_string() })?;
        if status.success() {
            debug!("Decoder finished after {} frames", self.frames.frames_read());
            Ok(())
        } else {
            Err(ReadError::DecodeFailed {
                reason: self.stderr.reason("decoder exited with an error"),
            })
        }
    }

    fn abort(&mut self) {
        self.finished = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FrameSource for FfmpegFrames {
    fn next_frame(&mut self) -> Result<Option<Frame>, ReadError> {
        if self.finished {
            return Ok(None);
        }

        match self.frames.read_frame() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                self.finish()?;
                Ok(None)
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }
}

impl Drop for FfmpegFrames {
    fn drop(&mut self) {
        if !self.finished {
            self.abort();
        }
    }
}

/// Generates a deterministic test pattern for synthetic assets
#[derive(Debug, Clone, Default)]
pub struct SyntheticDecoder {
    fail_after: Option<u64>,
}

impl SyntheticDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce `frames` frames, then report a decode failure
    pub fn failing_after(frames: u64) -> Self {
        Self { fail_after: Some(frames) }
    }
}

impl Decoder for SyntheticDecoder {
    fn open(&self, asset: &MediaAsset, range: TimeRange) -> Result<Box<dyn FrameSource>, OpenError> {
        if !asset.has_video {
            return Err(OpenError::NoVideoTrack { path: asset.label() });
        }
        if asset.natural_size.is_empty() {
            return Err(OpenError::UnsupportedFormat { format: format!("{} frames", asset.natural_size) });
        }

        let raw = PatternFrames {
            size: asset.natural_size,
            rate: asset.frame_rate,
            origin: range.start,
            duration: asset.duration,
            index: 0,
            fail_at: self.fail_after,
        };
        Ok(Box::new(RangedSource::new(raw, range)))
    }
}

/// Constant-rate grid anchored at the range start, like the ffmpeg backend after a seek
struct PatternFrames {
    size: Size,
    rate: FrameRate,
    origin: MediaTime,
    duration: MediaTime,
    index: u64,
    fail_at: Option<u64>,
}

impl FrameSource for PatternFrames {
    fn next_frame(&mut self) -> Result<Option<Frame>, ReadError> {
        if self.fail_at == Some(self.index) {
            return Err(ReadError::DecodeFailed {
                reason: format!("synthetic failure at frame {}", self.index),
            });
        }
        let pts = self.origin + MediaTime::for_frame(self.index, self.rate);
        if pts >= self.duration {
            return Ok(None);
        }
        self.index += 1;
        Ok(Some(test_pattern(self.size, pts)))
    }
}

/// Hue sweep over time with moving diagonal stripes
pub fn test_pattern(size: Size, pts: MediaTime) -> Frame {
    let t = pts.as_secs();
    let mut frame = Frame::new_black(size.width, size.height).with_pts(pts);
    let shift = (t * 30.0) as u32;

    for (x, y, pixel) in frame.as_image_mut().enumerate_pixels_mut() {
        if (x + y + shift) % 20 < 2 {
            pixel.0 = [255, 255, 255];
        } else {
            let hue = ((t * 60.0 + x as f64 * 360.0 / size.width as f64) % 360.0) as f32;
            let value = 0.4 + 0.5 * (y as f32 / size.height as f32);
            pixel.0 = hsv_to_rgb(hue, 0.6, value);
        }
    }
    frame
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}

/// Picks the backend from the asset's source
#[derive(Debug, Clone, Default)]
pub struct AutoDecoder {
    ffmpeg: FfmpegDecoder,
    synthetic: SyntheticDecoder,
}

impl AutoDecoder {
    pub fn new(ffmpeg: FfmpegDecoder) -> Self {
        Self {
            ffmpeg,
            synthetic: SyntheticDecoder::new(),
        }
    }
}

impl Decoder for AutoDecoder {
    fn open(&self, asset: &MediaAsset, range: TimeRange) -> Result<Box<dyn FrameSource>, OpenError> {
        match asset.source {
            AssetSource::File(_) => self.ffmpeg.open(asset, range),
            AssetSource::Synthetic => self.synthetic.open(asset, range),
        }
    }
}

/// Decode the single frame displayed at `at`
pub fn frame_at(decoder: &dyn Decoder, asset: &MediaAsset, at: MediaTime) -> Result<Frame, ClipError> {
    let frame_duration = asset.frame_rate.frame_duration();
    let last = asset.duration - frame_duration;
    let start = at.max(MediaTime::ZERO).min(last.max(MediaTime::ZERO));
    let end = (start + frame_duration).min(asset.duration);
    if start >= end {
        return Err(ClipError::generic(format!("{} has no frames", asset.label())));
    }

    let mut source = decoder.open(asset, TimeRange { start, end })?;
    let frame = source
        .next_frame()?
        .ok_or_else(|| ClipError::generic(format!("no frame at {} in {}", start, asset.label())))?;
    Ok(frame.with_pts(start))
}
