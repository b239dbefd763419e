use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::filters::FilterSpec;
use crate::video::time::MediaTime;

/// What an export should do besides trimming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Run face detection and blur every detected face
    pub blur_faces: bool,

    /// Color filter burned into the output, if any
    pub filter: Option<FilterSpec>,

    /// Destination container
    pub output: PathBuf,
}

impl ExportOptions {
    /// Plain trimmed copy, no blur and no filter
    pub fn trim_only<P: Into<PathBuf>>(output: P) -> Self {
        Self {
            blur_faces: false,
            filter: None,
            output: output.into(),
        }
    }

    pub fn with_blur(mut self, blur_faces: bool) -> Self {
        self.blur_faces = blur_faces;
        self
    }

    pub fn with_filter(mut self, filter: Option<FilterSpec>) -> Self {
        self.filter = filter.filter(|spec| !spec.is_identity());
        self
    }
}

/// A finished output container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputHandle {
    pub path: PathBuf,
    pub frame_count: u64,
    pub duration: MediaTime,
}

/// Lifecycle of a transcode job. Every state but `Running` is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Running,
    Completed(OutputHandle),
    Failed(String),
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Identifier unique within one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Highest progress value reported while a job is still running
const RUNNING_CEILING: f64 = 0.999_999;

/// State shared between a job's worker and its handles
pub(crate) struct JobShared {
    cancel: AtomicBool,
    frames: AtomicU64,
    status: watch::Sender<JobStatus>,
    progress: watch::Sender<f64>,
}

impl JobShared {
    pub(crate) fn new() -> Arc<Self> {
        let (status, _) = watch::channel(JobStatus::Running);
        let (progress, _) = watch::channel(0.0);
        Arc::new(Self {
            cancel: AtomicBool::new(false),
            frames: AtomicU64::new(0),
            status,
            progress,
        })
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub(crate) fn frames_written(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Count one written frame and report how far through the range it was.
    ///
    /// Progress never goes backwards and stays below 1.0 until completion.
    pub(crate) fn frame_written(&self, fraction: f64) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, RUNNING_CEILING) } else { 0.0 };
        self.progress.send_if_modified(|current| {
            if fraction > *current {
                *current = fraction;
                true
            } else {
                false
            }
        });
    }

    /// Publish the terminal status; only the first call has any effect
    pub(crate) fn finish(&self, status: JobStatus) {
        let completed = matches!(status, JobStatus::Completed(_));
        let changed = self.status.send_if_modified(|current| {
            if current.is_terminal() {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed && completed {
            self.progress.send_replace(1.0);
        }
    }
}

/// Caller's view of a running or finished job
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    output: PathBuf,
    shared: Arc<JobShared>,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, output: PathBuf, shared: Arc<JobShared>) -> Self {
        Self { id, output, shared }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn status(&self) -> JobStatus {
        self.shared.status.borrow().clone()
    }

    /// Fraction of the range written, in `[0, 1]`.
    ///
    /// Exactly 1.0 whenever the status is `Completed`.
    pub fn progress(&self) -> f64 {
        if matches!(*self.shared.status.borrow(), JobStatus::Completed(_)) {
            return 1.0;
        }
        *self.shared.progress.borrow()
    }

    pub fn frames_written(&self) -> u64 {
        self.shared.frames_written()
    }

    /// Ask the worker to stop after the current frame
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.shared.progress.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<JobStatus> {
        self.shared.status.subscribe()
    }

    /// Wait for the terminal status
    pub async fn wait(&self) -> JobStatus {
        let mut status = self.subscribe_status();
        loop {
            let current = status.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if status.changed().await.is_err() {
                return status.borrow().clone();
            }
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("output", &self.output)
            .field("status", &self.status())
            .field("progress", &self.progress())
            .finish()
    }
}
