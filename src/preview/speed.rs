use std::fmt;

/// Playback rates offered by the speed control
pub const PLAYBACK_RATES: [f32; 8] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

const NORMAL_INDEX: usize = 3;

/// Selected preview playback rate. Never affects exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSpeed {
    index: usize,
}

impl PlaybackSpeed {
    /// `None` for an index outside [`PLAYBACK_RATES`]
    pub fn from_index(index: usize) -> Option<Self> {
        (index < PLAYBACK_RATES.len()).then_some(Self { index })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rate(&self) -> f32 {
        PLAYBACK_RATES[self.index]
    }

    /// Text for the speed control, e.g. `Speed: 1.25x`
    pub fn label(&self) -> String {
        format!("Speed: {}", self)
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self { index: NORMAL_INDEX }
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x", self.rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_normal_speed() {
        let speed = PlaybackSpeed::default();
        assert_eq!(speed.rate(), 1.0);
        assert_eq!(speed.label(), "Speed: 1.00x");
    }

    #[test]
    fn test_labels_and_bounds() {
        assert_eq!(PlaybackSpeed::from_index(4).unwrap().label(), "Speed: 1.25x");
        assert_eq!(PlaybackSpeed::from_index(0).unwrap().label(), "Speed: 0.25x");
        assert!(PlaybackSpeed::from_index(8).is_none());
    }

    #[test]
    fn test_labels_keep_two_decimals() {
        let labels: Vec<String> = (0..PLAYBACK_RATES.len())
            .filter_map(PlaybackSpeed::from_index)
            .map(|speed| speed.label())
            .collect();
        assert_eq!(
            labels,
            [
                "Speed: 0.25x",
                "Speed: 0.50x",
                "Speed: 0.75x",
                "Speed: 1.00x",
                "Speed: 1.25x",
                "Speed: 1.50x",
                "Speed: 1.75x",
                "Speed: 2.00x"
            ]
        );
    }
}
