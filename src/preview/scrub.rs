use crate::video::time::{MediaTime, TimeRange};

/// Keeps the scrub position stable across trim edits
pub struct ScrubPosition;

impl ScrubPosition {
    /// Map `current` from `previous` into `new`, keeping its relative position.
    ///
    /// The result lies in `[new.start, new.end)`.
    pub fn restore(previous: TimeRange, new: TimeRange, current: MediaTime) -> MediaTime {
        let fraction = if previous.duration() > MediaTime::ZERO {
            (current - previous.start).ratio(previous.duration()).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let offset = MediaTime::from_secs_with_timescale(
            new.duration().as_secs() * fraction,
            new.start.timescale,
        );
        let position = new.start + offset;

        // Half-open range: the end itself is not a displayable position
        let last = new.end - MediaTime::new(1, new.end.timescale);
        position.max(new.start).min(last.max(new.start))
    }
}
