//! # Trim Planning
//!
//! Turns the user's raw start/end selection into a valid [`TimeRange`].

use tracing::debug;

use crate::config::TrimConfig;
use crate::error::RangeError;
use crate::video::time::{MediaTime, TimeRange};

/// Proposes trim ranges that always satisfy the range invariants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimPlanner {
    min_duration: MediaTime,
}

impl TrimPlanner {
    pub fn new(min_duration: MediaTime) -> Self {
        Self { min_duration }
    }

    pub fn from_config(config: &TrimConfig) -> Self {
        Self::new(config.min_duration())
    }

    pub fn min_duration(&self) -> MediaTime {
        self.min_duration
    }

    /// Clamp a selection into `[0, duration]` and stretch it to the minimum length.
    ///
    /// A too-short selection grows forward first; when that would run past
    /// the end, the start is pulled back instead.
    pub fn propose(&self, duration: MediaTime, start_secs: f64, end_secs: f64) -> Result<TimeRange, RangeError> {
        let reject = |reason: &str| RangeError::InvalidRange {
            start: start_secs,
            end: end_secs,
            duration: duration.as_secs(),
            reason: reason.to_string(),
        };

        if !start_secs.is_finite() || !end_secs.is_finite() {
            return Err(reject("start and end must be finite"));
        }
        if duration < self.min_duration {
            return Err(reject("the video is shorter than the minimum trim duration"));
        }

        let mut start = MediaTime::from_secs(start_secs).max(MediaTime::ZERO).min(duration);
        let mut end = MediaTime::from_secs(end_secs).max(start).min(duration);

        if end - start < self.min_duration {
            end = (start + self.min_duration).min(duration);
            if end - start < self.min_duration {
                start = duration - self.min_duration;
            }
            debug!("Trim ({:.3}, {:.3}) stretched to {}..{}", start_secs, end_secs, start, end);
        }

        TimeRange::validated(start, end, duration, self.min_duration)
    }

    /// Check a range built elsewhere against the same invariants
    pub fn validate(&self, range: TimeRange, duration: MediaTime) -> Result<TimeRange, RangeError> {
        TimeRange::validated(range.start, range.end, duration, self.min_duration)
    }
}

impl Default for TrimPlanner {
    fn default() -> Self {
        Self::from_config(&TrimConfig::default())
    }
}
