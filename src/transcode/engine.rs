use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::blur::{FaceDetector, FaceMaskStage, NoFaceDetector};
use crate::config::{BlurConfig, Config};
use crate::error::{ClipError, EncodeError, Result};
use crate::filters::{ColorFilter, ColorFilterStage};
use crate::transcode::job::{ExportOptions, JobHandle, JobId, JobShared, JobStatus};
use crate::transcode::sink::{EncoderSink, FfmpegSinkFactory, SinkFactory};
use crate::trim::TrimPlanner;
use crate::video::asset::MediaAsset;
use crate::video::source::{AutoDecoder, Decoder, FfmpegDecoder, FrameSource};
use crate::video::time::TimeRange;
use crate::video::types::Size;

/// Runs export jobs: decode a range, blur and filter each frame, encode
///
/// Each job runs on its own blocking worker and reports through a
/// [`JobHandle`]. Two jobs never write the same output path at once.
pub struct TranscodeEngine {
    decoder: Arc<dyn Decoder>,
    sinks: Arc<dyn SinkFactory>,
    detector: Arc<dyn FaceDetector>,
    stage: ColorFilterStage,
    blur: BlurConfig,
    planner: TrimPlanner,
    reserved: Arc<Mutex<HashSet<PathBuf>>>,
    next_id: AtomicU64,
}

impl TranscodeEngine {
    pub fn new(decoder: Arc<dyn Decoder>, sinks: Arc<dyn SinkFactory>, detector: Arc<dyn FaceDetector>) -> Self {
        Self {
            decoder,
            sinks,
            detector,
            stage: ColorFilterStage::new(),
            blur: BlurConfig::default(),
            planner: TrimPlanner::default(),
            reserved: Arc::new(Mutex::new(HashSet::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Engine decoding and encoding through the configured ffmpeg binaries
    pub fn from_config(config: &Config, detector: Arc<dyn FaceDetector>) -> Self {
        let decoder = AutoDecoder::new(FfmpegDecoder::new(config.ffmpeg.ffmpeg_bin.clone()));
        let sinks = FfmpegSinkFactory::new(config.ffmpeg.clone(), config.export.clone());
        Self::new(Arc::new(decoder), Arc::new(sinks), detector)
            .with_blur_config(config.blur.clone())
            .with_planner(TrimPlanner::from_config(&config.trim))
    }

    pub fn with_blur_config(mut self, blur: BlurConfig) -> Self {
        self.blur = blur;
        self
    }

    pub fn with_planner(mut self, planner: TrimPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_filter_stage(mut self, stage: ColorFilterStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn decoder(&self) -> &dyn Decoder {
        self.decoder.as_ref()
    }

    /// Whether a running job currently owns `path`
    pub fn is_reserved<P: AsRef<Path>>(&self, path: P) -> bool {
        self.reserved.lock().contains(path.as_ref())
    }

    /// Validate, open and launch an export of `range`.
    ///
    /// Everything that can be checked up front is: the range, the filter
    /// preset, the output reservation, the source and the sink. Once this
    /// returns `Ok`, the job always ends in exactly one terminal status.
    pub fn start(&self, asset: &MediaAsset, range: TimeRange, options: ExportOptions) -> Result<JobHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ClipError::generic("transcode jobs must be started inside a tokio runtime"))?;

        let range = self.planner.validate(range, asset.duration)?;
        let filter = match &options.filter {
            Some(spec) => self.stage.resolve(spec)?,
            None => ColorFilter::identity(),
        };

        let reservation = Reservation::acquire(&self.reserved, &options.output)?;
        let source = self.decoder.open(asset, range)?;
        let sink = self.sinks.create(asset, range, &options)?;

        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let shared = JobShared::new();
        let mask = options
            .blur_faces
            .then(|| FaceMaskStage::from_config(Arc::clone(&self.detector), &self.blur));

        info!(
            "Starting {}: {} {} -> {} (blur: {}, filter: {:?})",
            id,
            asset.label(),
            range,
            options.output.display(),
            options.blur_faces,
            filter.spec().preset_name()
        );

        let worker = Worker {
            id,
            source,
            sink,
            mask,
            filter,
            natural_size: asset.natural_size,
            range,
            shared: Arc::clone(&shared),
            reservation,
        };

        let join = runtime.spawn_blocking(move || worker.run());
        let watchdog = Arc::clone(&shared);
        runtime.spawn(async move {
            if let Err(e) = join.await {
                error!("{} worker stopped abnormally: {}", id, e);
                watchdog.finish(JobStatus::Failed(format!("worker stopped abnormally: {}", e)));
            }
        });

        Ok(JobHandle::new(id, options.output, shared))
    }
}

impl Default for TranscodeEngine {
    fn default() -> Self {
        Self::from_config(&Config::default(), Arc::new(NoFaceDetector))
    }
}

/// Holds an output path in the engine's reserved set until dropped
struct Reservation {
    set: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl Reservation {
    fn acquire(set: &Arc<Mutex<HashSet<PathBuf>>>, path: &Path) -> std::result::Result<Self, EncodeError> {
        if !set.lock().insert(path.to_path_buf()) {
            return Err(EncodeError::OutputBusy {
                path: path.display().to_string(),
            });
        }
        Ok(Self {
            set: Arc::clone(set),
            path: path.to_path_buf(),
        })
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.set.lock().remove(&self.path);
    }
}

/// Why the frame loop stopped
enum Outcome {
    EndOfRange,
    Cancelled,
    Failed(ClipError),
}

struct Worker {
    id: JobId,
    source: Box<dyn FrameSource>,
    sink: Box<dyn EncoderSink>,
    mask: Option<FaceMaskStage>,
    filter: ColorFilter,
    natural_size: Size,
    range: TimeRange,
    shared: Arc<JobShared>,
    reservation: Reservation,
}

impl Worker {
    fn run(self) {
        let Worker {
            id,
            mut source,
            mut sink,
            mut mask,
            filter,
            natural_size,
            range,
            shared,
            reservation,
        } = self;
        let started = Instant::now();
        let total = range.duration();

        let outcome = loop {
            if shared.is_cancelled() {
                break Outcome::Cancelled;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break Outcome::EndOfRange,
                Err(e) => break Outcome::Failed(e.into()),
            };

            let pts = frame.pts();
            let frame = match mask.as_mut() {
                Some(stage) => stage.process(frame, natural_size),
                None => frame,
            };
            let frame = filter.apply(frame);

            if let Err(e) = sink.write_frame(frame) {
                break Outcome::Failed(e.into());
            }
            shared.frame_written(pts.ratio(total));
            debug!("{} wrote frame at {}", id, pts);
        };

        // Stop the decoder before the encoder drains
        drop(source);
        let finished = sink.finish();
        drop(reservation);

        let status = match (outcome, finished) {
            (Outcome::EndOfRange, Ok(output)) => {
                info!(
                    "{} completed: {} frames ({}) in {:.2?}",
                    id,
                    output.frame_count,
                    output.duration,
                    started.elapsed()
                );
                JobStatus::Completed(output)
            }
            (Outcome::EndOfRange, Err(e)) => {
                let err = ClipError::from(e);
                error!("{} failed to finalize: {}", id, err);
                JobStatus::Failed(err.user_message())
            }
            (Outcome::Cancelled, finished) => {
                if let Err(e) = finished {
                    warn!("{} cancelled, output not finalized cleanly: {}", id, e);
                }
                info!("{} cancelled after {} frames", id, shared.frames_written());
                JobStatus::Cancelled
            }
            (Outcome::Failed(err), finished) => {
                if let Err(e) = finished {
                    warn!("{} could not finalize partial output: {}", id, e);
                }
                error!("{} failed: {}", id, err);
                JobStatus::Failed(err.user_message())
            }
        };

        shared.finish(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blur::{NormalizedRect, StaticRegionDetector};
    use crate::filters::FilterSpec;
    use crate::transcode::sink::MemorySinkFactory;
    use crate::video::source::SyntheticDecoder;
    use crate::video::time::{FrameRate, MediaTime};
    use std::time::Duration;

    fn asset(secs: f64) -> MediaAsset {
        MediaAsset::synthetic(Size::new(48, 32), FrameRate::FPS_30, MediaTime::from_secs(secs))
    }

    fn range(start: f64, end: f64) -> TimeRange {
        TimeRange {
            start: MediaTime::from_secs(start),
            end: MediaTime::from_secs(end),
        }
    }

    fn engine(decoder: SyntheticDecoder, sinks: &MemorySinkFactory, detector: Arc<dyn FaceDetector>) -> TranscodeEngine {
        TranscodeEngine::new(Arc::new(decoder), Arc::new(sinks.clone()), detector)
            .with_blur_config(BlurConfig { padding_px: 4, sigma: 3.0 })
    }

    async fn wait_for_frames(handle: &JobHandle, frames: u64) {
        while handle.frames_written() < frames && !handle.status().is_terminal() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_trimmed_export_has_expected_length() {
        let sinks = MemorySinkFactory::new();
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(NoFaceDetector));

        let handle = engine
            .start(&asset(10.0), range(2.0, 6.0), ExportOptions::trim_only("trim.mov"))
            .unwrap();
        let output = match handle.wait().await {
            JobStatus::Completed(output) => output,
            other => panic!("unexpected status {:?}", other),
        };

        assert_eq!(output.frame_count, 120);
        let drift = (output.duration.as_secs() - 4.0).abs();
        assert!(drift <= 1.0 / 30.0, "duration {} off by {}", output.duration, drift);
        assert_eq!(handle.progress(), 1.0);

        let frames = sinks.output("trim.mov").unwrap().frames;
        assert_eq!(frames[0].pts(), MediaTime::ZERO);
        assert!(frames.windows(2).all(|w| w[0].pts() < w[1].pts()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_progress_is_full_as_soon_as_wait_returns() {
        let sinks = MemorySinkFactory::new();
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(NoFaceDetector));
        let asset = asset(1.0);

        for i in 0..25 {
            let output = format!("repeat_{}.mov", i);
            let handle = engine
                .start(&asset, range(0.0, 0.1), ExportOptions::trim_only(&output))
                .unwrap();
            assert!(matches!(handle.wait().await, JobStatus::Completed(_)));
            assert_eq!(handle.progress(), 1.0, "export {}", i);
        }
    }

    #[tokio::test]
    async fn test_blur_without_faces_matches_plain_export() {
        let sinks = MemorySinkFactory::new();
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(NoFaceDetector));
        let asset = asset(1.0);

        let plain = engine.start(&asset, range(0.0, 0.5), ExportOptions::trim_only("plain.mov")).unwrap();
        let blurred = engine
            .start(&asset, range(0.0, 0.5), ExportOptions::trim_only("blurred.mov").with_blur(true))
            .unwrap();
        assert!(matches!(plain.wait().await, JobStatus::Completed(_)));
        assert!(matches!(blurred.wait().await, JobStatus::Completed(_)));

        let plain = sinks.output("plain.mov").unwrap().frames;
        let blurred = sinks.output("blurred.mov").unwrap().frames;
        assert_eq!(plain.len(), blurred.len());
        for (a, b) in plain.iter().zip(&blurred) {
            assert!(a.same_pixels(b));
            assert_eq!(a.pts(), b.pts());
        }
    }

    #[tokio::test]
    async fn test_blur_with_faces_changes_frames() {
        let sinks = MemorySinkFactory::new();
        let detector = StaticRegionDetector::new([NormalizedRect::new(0.25, 0.25, 0.5, 0.5)]);
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(detector));
        let asset = asset(1.0);

        let plain = engine.start(&asset, range(0.0, 0.2), ExportOptions::trim_only("a.mov")).unwrap();
        let blurred = engine
            .start(&asset, range(0.0, 0.2), ExportOptions::trim_only("b.mov").with_blur(true))
            .unwrap();
        plain.wait().await;
        blurred.wait().await;

        let plain = sinks.output("a.mov").unwrap().frames;
        let blurred = sinks.output("b.mov").unwrap().frames;
        assert!(!plain[0].same_pixels(&blurred[0]));
    }

    #[tokio::test]
    async fn test_burned_in_filter_is_applied() {
        let sinks = MemorySinkFactory::new();
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(NoFaceDetector));
        let options = ExportOptions::trim_only("mono.mov").with_filter(Some(FilterSpec::preset("Mono")));

        let handle = engine.start(&asset(1.0), range(0.0, 0.2), options).unwrap();
        assert!(matches!(handle.wait().await, JobStatus::Completed(_)));

        for frame in sinks.output("mono.mov").unwrap().frames {
            assert!(frame.as_image().pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
        }
    }

    #[tokio::test]
    async fn test_cancel_finalizes_sink() {
        let sinks = MemorySinkFactory::new().with_frame_delay(Duration::from_millis(5));
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(NoFaceDetector));

        let handle = engine
            .start(&asset(10.0), range(0.0, 10.0), ExportOptions::trim_only("cancel.mov"))
            .unwrap();
        wait_for_frames(&handle, 3).await;
        handle.cancel();

        assert_eq!(handle.wait().await, JobStatus::Cancelled);
        assert!(handle.progress() < 1.0);

        let output = sinks.output("cancel.mov").unwrap();
        assert!(output.finished);
        assert!(output.frames.len() < 300);
        assert!(!engine.is_reserved("cancel.mov"));
    }

    #[tokio::test]
    async fn test_decode_failure_fails_job_and_keeps_partial_output() {
        let sinks = MemorySinkFactory::new();
        let engine = engine(SyntheticDecoder::failing_after(10), &sinks, Arc::new(NoFaceDetector));

        let handle = engine
            .start(&asset(2.0), range(0.0, 2.0), ExportOptions::trim_only("broken.mov"))
            .unwrap();
        match handle.wait().await {
            JobStatus::Failed(reason) => assert!(reason.contains("synthetic failure"), "{}", reason),
            other => panic!("unexpected status {:?}", other),
        }

        let output = sinks.output("broken.mov").unwrap();
        assert!(output.finished);
        assert_eq!(output.frames.len(), 10);
        assert!(handle.progress() < 1.0);
    }

    #[tokio::test]
    async fn test_sink_rejection_fails_job() {
        let sinks = MemorySinkFactory::new().rejecting_after(5);
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(NoFaceDetector));

        let handle = engine
            .start(&asset(2.0), range(0.0, 1.0), ExportOptions::trim_only("full.mov"))
            .unwrap();
        assert!(matches!(handle.wait().await, JobStatus::Failed(_)));

        let output = sinks.output("full.mov").unwrap();
        assert!(output.finished);
        assert_eq!(output.frames.len(), 5);
    }

    #[tokio::test]
    async fn test_output_path_is_exclusive_while_running() {
        let sinks = MemorySinkFactory::new().with_frame_delay(Duration::from_millis(5));
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(NoFaceDetector));
        let asset = asset(10.0);

        let first = engine
            .start(&asset, range(0.0, 10.0), ExportOptions::trim_only("busy.mov"))
            .unwrap();
        assert!(engine.is_reserved("busy.mov"));

        let second = engine.start(&asset, range(0.0, 1.0), ExportOptions::trim_only("busy.mov"));
        assert!(matches!(
            second,
            Err(ClipError::Encode(EncodeError::OutputBusy { .. }))
        ));

        first.cancel();
        first.wait().await;
        assert!(!engine.is_reserved("busy.mov"));

        let third = engine
            .start(&asset, range(0.0, 0.1), ExportOptions::trim_only("busy.mov"))
            .unwrap();
        assert_ne!(first.id(), third.id());
        assert!(matches!(third.wait().await, JobStatus::Completed(_)));
    }

    #[tokio::test]
    async fn test_rejections_happen_before_any_work() {
        let sinks = MemorySinkFactory::new();
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(NoFaceDetector));
        let asset = asset(10.0);

        let backwards = engine.start(&asset, range(6.0, 2.0), ExportOptions::trim_only("x.mov"));
        assert!(matches!(backwards, Err(ClipError::Range(_))));

        let too_long = engine.start(&asset, range(0.0, 11.0), ExportOptions::trim_only("x.mov"));
        assert!(matches!(too_long, Err(ClipError::Range(_))));

        let options = ExportOptions::trim_only("x.mov").with_filter(Some(FilterSpec::preset("Sepia")));
        let unknown = engine.start(&asset, range(0.0, 1.0), options);
        assert!(matches!(unknown, Err(ClipError::Filter(_))));

        let mut silent = asset.clone();
        silent.has_video = false;
        let no_video = engine.start(&silent, range(0.0, 1.0), ExportOptions::trim_only("x.mov"));
        assert!(matches!(no_video, Err(ClipError::Open(_))));

        assert!(sinks.output("x.mov").is_none());
        assert!(!engine.is_reserved("x.mov"));
    }

    #[tokio::test]
    async fn test_progress_is_monotone_and_full_only_on_completion() {
        let sinks = MemorySinkFactory::new().with_frame_delay(Duration::from_millis(1));
        let engine = engine(SyntheticDecoder::new(), &sinks, Arc::new(NoFaceDetector));

        let handle = engine
            .start(&asset(2.0), range(0.0, 1.0), ExportOptions::trim_only("progress.mov"))
            .unwrap();
        let mut progress = handle.subscribe_progress();
        let observer = tokio::spawn({
            let handle = handle.clone();
            async move {
                let mut seen = Vec::new();
                loop {
                    let value = *progress.borrow_and_update();
                    seen.push((value, handle.status().is_terminal()));
                    if value >= 1.0 || progress.changed().await.is_err() {
                        break;
                    }
                }
                seen
            }
        });

        assert!(matches!(handle.wait().await, JobStatus::Completed(_)));
        let seen = observer.await.unwrap();

        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        let (last, terminal) = *seen.last().unwrap();
        assert_eq!(last, 1.0);
        assert!(terminal);
        assert!(seen[..seen.len() - 1].iter().all(|(value, _)| *value < 1.0));
    }
}
