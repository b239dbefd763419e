use crate::filters::presets::LUMA;

/// Brightness, contrast and saturation in color-controls semantics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustments {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Adjustments {
    pub const NEUTRAL: Self = Self {
        brightness: 0.0,
        contrast: 1.0,
        saturation: 1.0,
    };

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    /// Saturation first, then brightness, then contrast around mid-gray
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let luma = LUMA[0] * rgb[0] + LUMA[1] * rgb[1] + LUMA[2] * rgb[2];
        rgb.map(|c| {
            let saturated = luma + (c - luma) * self.saturation;
            let brightened = saturated + self.brightness;
            ((brightened - 0.5) * self.contrast + 0.5).clamp(0.0, 1.0)
        })
    }
}
