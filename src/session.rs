//! Editing session: the state a UI holds while a user edits one video.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{FilterError, RangeError, Result};
use crate::filters::{ColorFilterStage, FilterSpec};
use crate::preview::{timeline_thumbnails, PreviewCompositor, PlaybackSpeed, ScrubPosition};
use crate::transcode::{ExportOptions, JobHandle, JobStatus, TranscodeEngine};
use crate::trim::TrimPlanner;
use crate::video::asset::MediaAsset;
use crate::video::time::{MediaTime, TimeRange};
use crate::video::types::Frame;

/// What the player should show
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewSource {
    /// The asset the session was opened with
    Original,
    /// A completed face-blurred export
    Blurred(PathBuf),
}

/// One user's edits to one asset
///
/// Holds the current trim, filter and playback speed, renders preview
/// frames and launches exports on a shared [`TranscodeEngine`].
pub struct EditorSession {
    asset: MediaAsset,
    range: TimeRange,
    speed: PlaybackSpeed,
    compositor: PreviewCompositor,
    planner: TrimPlanner,
    engine: Arc<TranscodeEngine>,
    output_dir: PathBuf,
    container: String,
    blur_enabled: bool,
    active: Option<JobHandle>,
    last_blur: Option<JobHandle>,
}

impl EditorSession {
    pub fn new(asset: MediaAsset, engine: Arc<TranscodeEngine>, config: &Config) -> Self {
        let range = TimeRange::full(asset.duration);
        Self {
            asset,
            range,
            speed: PlaybackSpeed::default(),
            compositor: PreviewCompositor::new(ColorFilterStage::new()),
            planner: TrimPlanner::from_config(&config.trim),
            engine,
            output_dir: config.export.output_dir.clone(),
            container: config.export.container.clone(),
            blur_enabled: false,
            active: None,
            last_blur: None,
        }
    }

    pub fn asset(&self) -> &MediaAsset {
        &self.asset
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn filter_spec(&self) -> &FilterSpec {
        self.compositor.filter_spec()
    }

    /// Render one displayed frame with the current filter
    pub fn preview(&self, frame: Frame) -> Frame {
        self.compositor.composite_frame(frame)
    }

    /// Evenly spaced frames across the whole video for the trim timeline
    pub fn timeline_thumbnails(&self, count: usize, max_edge: u32) -> Result<Vec<Frame>> {
        timeline_thumbnails(self.engine.decoder(), &self.asset, count, max_edge)
    }

    /// Replace the filter; an unknown preset leaves the current one in place
    pub fn set_filter(&mut self, spec: FilterSpec) -> std::result::Result<(), FilterError> {
        self.compositor.set_filter(spec)
    }

    /// Select a playback rate by index; out-of-range indexes are ignored
    pub fn set_speed(&mut self, index: usize) -> Option<PlaybackSpeed> {
        let speed = PlaybackSpeed::from_index(index)?;
        self.speed = speed;
        Some(speed)
    }

    /// Apply a new trim selection.
    ///
    /// Returns the adjusted range and where the scrub position should move
    /// so it stays at the same relative place.
    pub fn trim(
        &mut self,
        start_secs: f64,
        end_secs: f64,
        current: MediaTime,
    ) -> std::result::Result<(TimeRange, MediaTime), RangeError> {
        let range = self.planner.propose(self.asset.duration, start_secs, end_secs)?;
        let position = ScrubPosition::restore(self.range, range, current);
        self.range = range;
        Ok((range, position))
    }

    /// Toggle whether the preview plays the blurred export
    pub fn set_blur_enabled(&mut self, enabled: bool) {
        self.blur_enabled = enabled;
    }

    /// Export the trimmed range with every detected face blurred
    pub fn export_blur(&mut self) -> Result<JobHandle> {
        let output = self.output_path("blurred");
        let handle = self.launch(ExportOptions::trim_only(output).with_blur(true))?;
        self.blur_enabled = true;
        self.last_blur = Some(handle.clone());
        Ok(handle)
    }

    /// Export the trimmed range unmodified
    pub fn export_trim(&mut self) -> Result<JobHandle> {
        let output = self.output_path("trimmed");
        self.launch(ExportOptions::trim_only(output))
    }

    /// Cancel the most recent export, if it is still running
    pub fn cancel_export(&mut self) -> bool {
        match self.active.take() {
            Some(handle) if !handle.status().is_terminal() => {
                info!("Cancelling {}", handle.id());
                handle.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn active_export(&self) -> Option<&JobHandle> {
        self.active.as_ref()
    }

    /// The blurred export when blur is on and it finished, otherwise the original
    pub fn preview_source(&self) -> PreviewSource {
        if !self.blur_enabled {
            return PreviewSource::Original;
        }
        match self.last_blur.as_ref().map(JobHandle::status) {
            Some(JobStatus::Completed(output)) => PreviewSource::Blurred(output.path),
            _ => PreviewSource::Original,
        }
    }

    fn launch(&mut self, options: ExportOptions) -> Result<JobHandle> {
        if let Some(running) = self.active.as_ref().filter(|h| !h.status().is_terminal()) {
            warn!("Starting a new export while {} is still running", running.id());
        }
        let handle = self.engine.start(&self.asset, self.range, options)?;
        self.active = Some(handle.clone());
        Ok(handle)
    }

    fn output_path(&self, prefix: &str) -> PathBuf {
        let stamp = chrono::Utc::now().timestamp();
        output_name(&self.output_dir, prefix, stamp, &self.container)
    }
}

fn output_name(dir: &Path, prefix: &str, stamp: i64, container: &str) -> PathBuf {
    dir.join(format!("{}_{}.{}", prefix, stamp, container))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blur::NoFaceDetector;
    use crate::transcode::MemorySinkFactory;
    use crate::video::source::SyntheticDecoder;
    use crate::video::time::FrameRate;
    use crate::video::types::Size;
    use std::time::Duration;
    use tempfile::tempdir;

    fn session(sinks: &MemorySinkFactory, output_dir: &Path) -> EditorSession {
        let engine = TranscodeEngine::new(
            Arc::new(SyntheticDecoder::new()),
            Arc::new(sinks.clone()),
            Arc::new(NoFaceDetector),
        );
        let mut config = Config::default();
        config.export.output_dir = output_dir.to_path_buf();
        let asset = MediaAsset::synthetic(Size::new(32, 24), FrameRate::FPS_30, MediaTime::from_secs(10.0));
        EditorSession::new(asset, Arc::new(engine), &config)
    }

    #[test]
    fn test_output_name() {
        let path = output_name(Path::new("/tmp"), "blurred", 1_700_000_000, "mov");
        assert_eq!(path, PathBuf::from("/tmp/blurred_1700000000.mov"));
    }

    #[tokio::test]
    async fn test_trim_moves_scrub_position_proportionally() {
        let dir = tempdir().unwrap();
        let mut session = session(&MemorySinkFactory::new(), dir.path());

        let (range, position) = session.trim(2.0, 6.0, MediaTime::from_secs(5.0)).unwrap();
        assert_eq!(range.start, MediaTime::from_secs(2.0));
        assert_eq!(range.end, MediaTime::from_secs(6.0));
        assert_eq!(position, MediaTime::from_secs(4.0));
        assert_eq!(session.range(), range);

        let (range, _) = session.trim(5.0, 5.05, position).unwrap();
        assert_eq!(range.end, MediaTime::from_secs(5.1));
    }

    #[tokio::test]
    async fn test_timeline_thumbnails_cover_whole_video_after_trim() {
        let dir = tempdir().unwrap();
        let mut session = session(&MemorySinkFactory::new(), dir.path());
        session.trim(4.0, 6.0, MediaTime::ZERO).unwrap();

        let thumbs = session.timeline_thumbnails(10, 8).unwrap();
        assert_eq!(thumbs.len(), 10);
        assert_eq!(thumbs[9].pts(), MediaTime::from_secs(9.0));
        assert_eq!(thumbs[0].size(), Size::new(8, 6));
    }

    #[tokio::test]
    async fn test_filter_and_speed_selection() {
        let dir = tempdir().unwrap();
        let mut session = session(&MemorySinkFactory::new(), dir.path());

        session.set_filter(FilterSpec::preset("Noir")).unwrap();
        assert!(session.set_filter(FilterSpec::preset("Sepia")).is_err());
        assert_eq!(session.filter_spec().preset_name(), Some("Noir"));

        let frame = Frame::new_filled(4, 4, [200, 30, 30]);
        let [r, g, b] = session.preview(frame).get_pixel(0, 0);
        assert!(r == g && g == b);

        assert_eq!(session.set_speed(4).map(|s| s.label()), Some("Speed: 1.25x".to_string()));
        assert_eq!(session.set_speed(1).map(|s| s.label()), Some("Speed: 0.50x".to_string()));
        session.set_speed(4);
        assert!(session.set_speed(99).is_none());
        assert_eq!(session.speed().rate(), 1.25);
    }

    #[tokio::test]
    async fn test_export_blur_then_preview_blurred_output() {
        let dir = tempdir().unwrap();
        let sinks = MemorySinkFactory::new();
        let mut session = session(&sinks, dir.path());
        session.trim(1.0, 1.5, MediaTime::ZERO).unwrap();
        assert_eq!(session.preview_source(), PreviewSource::Original);

        let handle = session.export_blur().unwrap();
        let name = handle.output_path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("blurred_") && name.ends_with(".mov"), "{}", name);
        assert!(handle.output_path().starts_with(dir.path()));

        assert!(matches!(handle.wait().await, JobStatus::Completed(_)));
        assert_eq!(
            session.preview_source(),
            PreviewSource::Blurred(handle.output_path().to_path_buf())
        );
        assert_eq!(sinks.output(handle.output_path()).unwrap().frames.len(), 15);

        session.set_blur_enabled(false);
        assert_eq!(session.preview_source(), PreviewSource::Original);
    }

    #[tokio::test]
    async fn test_cancel_export() {
        let dir = tempdir().unwrap();
        let sinks = MemorySinkFactory::new().with_frame_delay(Duration::from_millis(5));
        let mut session = session(&sinks, dir.path());

        let handle = session.export_trim().unwrap();
        assert!(session.cancel_export());
        assert_eq!(handle.wait().await, JobStatus::Cancelled);
        assert!(!session.cancel_export());
        assert!(sinks.output(handle.output_path()).unwrap().finished);
    }
}
