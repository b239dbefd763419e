use serde::{Deserialize, Serialize};

use crate::filters::adjust::Adjustments;

pub const BRIGHTNESS_RANGE: (f32, f32) = (-1.0, 1.0);
pub const CONTRAST_RANGE: (f32, f32) = (0.0, 2.0);
pub const SATURATION_RANGE: (f32, f32) = (0.0, 2.0);

/// The user's color choices: a named preset plus adjustments
///
/// Values outside their ranges are clamped on construction; a non-finite
/// value falls back to its neutral setting. Replace the whole spec to change
/// any part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FilterSpecFields")]
pub struct FilterSpec {
    /// `None` means the unfiltered original
    preset: Option<String>,
    brightness: f32,
    contrast: f32,
    saturation: f32,
}

impl FilterSpec {
    pub fn new(preset: Option<String>, brightness: f32, contrast: f32, saturation: f32) -> Self {
        let preset = preset.filter(|name| !name.eq_ignore_ascii_case("original") && !name.is_empty());
        Self {
            preset,
            brightness: clamp_or(brightness, BRIGHTNESS_RANGE, 0.0),
            contrast: clamp_or(contrast, CONTRAST_RANGE, 1.0),
            saturation: clamp_or(saturation, SATURATION_RANGE, 1.0),
        }
    }

    /// No preset, neutral adjustments
    pub fn identity() -> Self {
        Self::new(None, 0.0, 1.0, 1.0)
    }

    /// Only a preset, neutral adjustments
    pub fn preset<S: Into<String>>(name: S) -> Self {
        Self::new(Some(name.into()), 0.0, 1.0, 1.0)
    }

    pub fn with_adjustments(&self, brightness: f32, contrast: f32, saturation: f32) -> Self {
        Self::new(self.preset.clone(), brightness, contrast, saturation)
    }

    pub fn preset_name(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn contrast(&self) -> f32 {
        self.contrast
    }

    pub fn saturation(&self) -> f32 {
        self.saturation
    }

    pub fn adjustments(&self) -> Adjustments {
        Adjustments {
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.preset.is_none() && self.adjustments().is_neutral()
    }
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self::identity()
    }
}

/// Deserialized form, routed through [`FilterSpec::new`] for clamping
#[derive(Deserialize)]
struct FilterSpecFields {
    #[serde(default)]
    preset: Option<String>,
    #[serde(default)]
    brightness: f32,
    #[serde(default = "neutral_gain")]
    contrast: f32,
    #[serde(default = "neutral_gain")]
    saturation: f32,
}

fn neutral_gain() -> f32 {
    1.0
}

impl From<FilterSpecFields> for FilterSpec {
    fn from(fields: FilterSpecFields) -> Self {
        Self::new(fields.preset, fields.brightness, fields.contrast, fields.saturation)
    }
}

fn clamp_or(value: f32, (lo, hi): (f32, f32), neutral: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_clamped() {
        let spec = FilterSpec::new(None, 3.0, -1.0, f32::NAN);
        assert_eq!(spec.brightness(), 1.0);
        assert_eq!(spec.contrast(), 0.0);
        assert_eq!(spec.saturation(), 1.0);
    }

    #[test]
    fn test_original_means_no_preset() {
        assert!(FilterSpec::preset("Original").is_identity());
        assert!(FilterSpec::default().is_identity());
        assert!(!FilterSpec::preset("Noir").is_identity());
        assert!(!FilterSpec::identity().with_adjustments(0.1, 1.0, 1.0).is_identity());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let spec: FilterSpec = toml::from_str(
            "preset = \"Fade\"\nbrightness = 0.1\ncontrast = 1.2\nsaturation = 0.8\n",
        )
        .unwrap();
        assert_eq!(spec.preset_name(), Some("Fade"));
        assert_eq!(spec.contrast(), 1.2);

        let spec: FilterSpec = toml::from_str("brightness = 4.0\n").unwrap();
        assert_eq!(spec.brightness(), 1.0);
        assert_eq!(spec.saturation(), 1.0);
    }
}
