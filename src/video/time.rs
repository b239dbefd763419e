//! Rational media time.
//!
//! Timestamps are kept as `value / timescale` so that trims over long
//! durations never accumulate floating point rounding.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::RangeError;

/// Timescale used when converting from seconds (600 divides 24, 25, 30 and 60 fps).
pub const DEFAULT_TIMESCALE: i32 = 600;

/// A point in time expressed as the rational `value / timescale` seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const ZERO: Self = Self { value: 0, timescale: DEFAULT_TIMESCALE };

    /// Create a time; a non-positive timescale is replaced with the default.
    pub fn new(value: i64, timescale: i32) -> Self {
        if timescale <= 0 {
            return Self { value, timescale: DEFAULT_TIMESCALE };
        }
        Self { value, timescale }
    }

    pub fn from_secs(secs: f64) -> Self {
        Self::from_secs_with_timescale(secs, DEFAULT_TIMESCALE)
    }

    pub fn from_secs_with_timescale(secs: f64, timescale: i32) -> Self {
        let timescale = if timescale <= 0 { DEFAULT_TIMESCALE } else { timescale };
        Self {
            value: (secs * timescale as f64).round() as i64,
            timescale,
        }
    }

    /// Presentation time of frame `index` at the rational rate `rate`
    pub fn for_frame(index: u64, rate: FrameRate) -> Self {
        Self::new(index as i64 * rate.den as i64, rate.num as i32)
    }

    pub fn as_secs(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    pub fn is_negative(&self) -> bool {
        self.value < 0
    }

    /// Ratio `self / other` as a float, used for progress reporting
    pub fn ratio(self, other: Self) -> f64 {
        let (a, b, _) = Self::common(self, other);
        if b == 0 {
            return 0.0;
        }
        a as f64 / b as f64
    }

    fn common(a: Self, b: Self) -> (i128, i128, i64) {
        let (sa, sb) = (a.timescale as i64, b.timescale as i64);
        if sa == sb {
            (a.value as i128, b.value as i128, sa)
        } else if sa % sb == 0 {
            (a.value as i128, b.value as i128 * (sa / sb) as i128, sa)
        } else if sb % sa == 0 {
            (a.value as i128 * (sb / sa) as i128, b.value as i128, sb)
        } else {
            (a.value as i128 * sb as i128, b.value as i128 * sa as i128, sa * sb)
        }
    }

    fn from_wide(value: i128, scale: i64) -> Self {
        if scale <= i32::MAX as i64 {
            return Self { value: value as i64, timescale: scale as i32 };
        }
        // Collapse oversized products back onto the default timescale
        let secs = value as f64 / scale as f64;
        Self::from_secs(secs)
    }
}

/// Exact subtraction. The result uses the larger of the two timescales when
/// one divides the other, otherwise their product.
impl Sub for MediaTime {
    type Output = MediaTime;

    fn sub(self, other: Self) -> Self {
        let (a, b, scale) = Self::common(self, other);
        Self::from_wide(a - b, scale)
    }
}

impl Add for MediaTime {
    type Output = MediaTime;

    fn add(self, other: Self) -> Self {
        let (a, b, scale) = Self::common(self, other);
        Self::from_wide(a + b, scale)
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.value as i128 * other.timescale as i128;
        let rhs = other.value as i128 * self.timescale as i128;
        lhs.cmp(&rhs)
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs())
    }
}

/// Rational frame rate `num / den` frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const NTSC_30: Self = Self::new(30000, 1001);

    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// Duration of one frame
    pub fn frame_duration(&self) -> MediaTime {
        MediaTime::new(self.den as i64, self.num as i32)
    }

    /// Parse ffprobe's `"30000/1001"` notation; `"0/0"` and garbage yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (num, den) = match text.split_once('/') {
            Some((n, d)) => (n.trim().parse::<u32>().ok()?, d.trim().parse::<u32>().ok()?),
            None => (text.trim().parse::<u32>().ok()?, 1),
        };
        if num == 0 || den == 0 {
            return None;
        }
        Some(Self::new(num, den))
    }

    /// Number of whole frames needed to cover `duration`
    pub fn frames_in(&self, duration: MediaTime) -> u64 {
        if duration.value <= 0 || self.den == 0 {
            return 0;
        }
        let num = duration.value as i128 * self.num as i128;
        let den = duration.timescale as i128 * self.den as i128;
        ((num + den - 1) / den) as u64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: MediaTime,
    pub end: MediaTime,
}

impl TimeRange {
    /// The untrimmed range of an asset
    pub fn full(duration: MediaTime) -> Self {
        Self { start: MediaTime::ZERO, end: duration }
    }

    /// Build a range and check every invariant against the asset duration.
    pub fn validated(
        start: MediaTime,
        end: MediaTime,
        duration: MediaTime,
        min_duration: MediaTime,
    ) -> Result<Self, RangeError> {
        let invalid = |reason: &str| RangeError::InvalidRange {
            start: start.as_secs(),
            end: end.as_secs(),
            duration: duration.as_secs(),
            reason: reason.to_string(),
        };

        if start.is_negative() {
            return Err(invalid("start is before the beginning of the video"));
        }
        if start >= end {
            return Err(invalid("start must come before end"));
        }
        if end > duration {
            return Err(invalid("end is past the end of the video"));
        }
        if end - start < min_duration {
            return Err(invalid("selection is shorter than the minimum trim duration"));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> MediaTime {
        self.end - self.start
    }

    pub fn contains(&self, t: MediaTime) -> bool {
        t >= self.start && t < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_across_timescales() {
        let a = MediaTime::new(1001, 30000);
        let b = MediaTime::new(1, 30);
        assert!(a > b);
        assert_eq!(MediaTime::new(300, 600), MediaTime::new(1, 2));
    }

    #[test]
    fn test_sub_is_exact() {
        let end = MediaTime::from_secs(6.0);
        let start = MediaTime::from_secs(2.0);
        assert_eq!(end - start, MediaTime::from_secs(4.0));

        let frame = MediaTime::for_frame(3, FrameRate::NTSC_30);
        let back = frame - FrameRate::NTSC_30.frame_duration();
        assert_eq!(back, MediaTime::for_frame(2, FrameRate::NTSC_30));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(FrameRate::parse("30000/1001"), Some(FrameRate::NTSC_30));
        assert_eq!(FrameRate::parse("25"), Some(FrameRate::new(25, 1)));
        assert_eq!(FrameRate::parse("0/0"), None);
        assert_eq!(FrameRate::parse("abc"), None);
    }

    #[test]
    fn test_frames_in_range() {
        assert_eq!(FrameRate::FPS_30.frames_in(MediaTime::from_secs(4.0)), 120);
        assert_eq!(FrameRate::FPS_30.frames_in(MediaTime::from_secs(0.05)), 2);
        assert_eq!(FrameRate::FPS_30.frames_in(MediaTime::ZERO), 0);
    }

    #[test]
    fn test_validated_range() {
        let duration = MediaTime::from_secs(10.0);
        let min = MediaTime::from_secs(0.1);

        assert!(TimeRange::validated(MediaTime::from_secs(2.0), MediaTime::from_secs(6.0), duration, min).is_ok());
        assert!(TimeRange::validated(MediaTime::from_secs(6.0), MediaTime::from_secs(2.0), duration, min).is_err());
        assert!(TimeRange::validated(MediaTime::from_secs(5.0), MediaTime::from_secs(5.05), duration, min).is_err());
        assert!(TimeRange::validated(MediaTime::from_secs(2.0), MediaTime::from_secs(11.0), duration, min).is_err());
        assert!(TimeRange::validated(MediaTime::from_secs(-1.0), MediaTime::from_secs(2.0), duration, min).is_err());
    }
}
