use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::error::FilterError;
use crate::filters::adjust::Adjustments;
use crate::filters::registry::PresetRegistry;
use crate::filters::spec::FilterSpec;
use crate::filters::traits::ColorPreset;
use crate::video::types::Frame;

/// Applies a [`FilterSpec`] to frames
///
/// Preset names are looked up once when a spec is resolved, so an unknown
/// name is reported before any pixel is touched.
#[derive(Clone)]
pub struct ColorFilterStage {
    registry: Arc<PresetRegistry>,
}

impl ColorFilterStage {
    pub fn new() -> Self {
        Self::with_registry(PresetRegistry::new())
    }

    pub fn with_registry(registry: PresetRegistry) -> Self {
        Self { registry: Arc::new(registry) }
    }

    pub fn registry(&self) -> &PresetRegistry {
        &self.registry
    }

    /// Look up the preset named by `spec` and freeze it into a ready-to-run filter
    pub fn resolve(&self, spec: &FilterSpec) -> Result<ColorFilter, FilterError> {
        let preset = match spec.preset_name() {
            Some(name) => {
                let preset = self
                    .registry
                    .get_preset(name)
                    .ok_or_else(|| FilterError::UnknownPreset { name: name.to_string() })?;
                (!preset.is_identity()).then_some(preset)
            }
            None => None,
        };

        Ok(ColorFilter {
            spec: spec.clone(),
            preset: preset.map(Arc::from),
            adjust: spec.adjustments(),
        })
    }

    /// Resolve `spec` and run it over `frame`
    pub fn apply(&self, frame: Frame, spec: &FilterSpec) -> Result<Frame, FilterError> {
        Ok(self.resolve(spec)?.apply(frame))
    }
}

impl Default for ColorFilterStage {
    fn default() -> Self {
        Self::new()
    }
}

/// A resolved filter: preset transform, then adjustments
#[derive(Clone)]
pub struct ColorFilter {
    spec: FilterSpec,
    preset: Option<Arc<dyn ColorPreset>>,
    adjust: Adjustments,
}

impl ColorFilter {
    pub fn identity() -> Self {
        Self {
            spec: FilterSpec::identity(),
            preset: None,
            adjust: Adjustments::NEUTRAL,
        }
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn is_identity(&self) -> bool {
        self.preset.is_none() && self.adjust.is_neutral()
    }

    /// Filter every pixel, rows in parallel. The timestamp is kept.
    pub fn apply(&self, mut frame: Frame) -> Frame {
        if self.is_identity() {
            return frame;
        }

        let row_bytes = frame.width() as usize * frame.format().bytes_per_pixel();
        if row_bytes == 0 {
            return frame;
        }

        debug!("Filtering {} frame at {}", frame.size(), frame.pts());
        frame.as_raw_mut().par_chunks_mut(row_bytes).for_each(|row| {
            for pixel in row.chunks_exact_mut(3) {
                let out = self.map_pixel([pixel[0], pixel[1], pixel[2]]);
                pixel.copy_from_slice(&out);
            }
        });
        frame
    }

    fn map_pixel(&self, rgb: [u8; 3]) -> [u8; 3] {
        let mut color = rgb.map(|c| c as f32 / 255.0);
        if let Some(preset) = &self.preset {
            color = preset.transform(color).map(|c| c.clamp(0.0, 1.0));
        }
        if !self.adjust.is_neutral() {
            color = self.adjust.apply(color);
        }
        color.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8)
    }
}

impl std::fmt::Debug for ColorFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorFilter")
            .field("preset", &self.preset.as_ref().map(|p| p.name().to_string()))
            .field("adjust", &self.adjust)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::time::MediaTime;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_frame(width: u32, height: u32, seed: u64) -> Frame {
        let mut rng = SmallRng::seed_from_u64(seed);
        let data = (0..width * height * 3).map(|_| rng.gen()).collect();
        Frame::from_rgb_bytes(width, height, data, MediaTime::from_secs(1.5)).unwrap()
    }

    #[test]
    fn test_identity_is_pixel_exact() {
        let stage = ColorFilterStage::new();
        let frame = random_frame(37, 21, 7);

        let out = stage.apply(frame.clone(), &FilterSpec::identity()).unwrap();
        assert!(out.same_pixels(&frame));

        let out = stage.apply(frame.clone(), &FilterSpec::preset("Original")).unwrap();
        assert!(out.same_pixels(&frame));
        assert_eq!(out.pts(), frame.pts());
    }

    #[test]
    fn test_unknown_preset_fails_at_resolution() {
        let stage = ColorFilterStage::new();
        let result = stage.resolve(&FilterSpec::preset("Sepia"));
        assert_eq!(result.err(), Some(FilterError::UnknownPreset { name: "Sepia".to_string() }));
    }

    #[test]
    fn test_mono_output_is_gray() {
        let stage = ColorFilterStage::new();
        let out = stage.apply(random_frame(16, 16, 3), &FilterSpec::preset("Mono")).unwrap();
        for pixel in out.as_image().pixels() {
            let [r, g, b] = pixel.0;
            assert!(r == g && g == b);
        }
    }

    #[test]
    fn test_preset_runs_before_adjustments() {
        let stage = ColorFilterStage::new();
        let frame = Frame::new_filled(4, 4, [200, 40, 40]);

        // Saturation cannot bring color back once the preset removed it
        let spec = FilterSpec::preset("Mono").with_adjustments(0.0, 1.0, 2.0);
        let out = stage.apply(frame, &spec).unwrap();
        let [r, g, b] = out.get_pixel(0, 0);
        assert!(r == g && g == b);
    }

    #[test]
    fn test_adjustments_clamp() {
        let stage = ColorFilterStage::new();
        let frame = random_frame(8, 8, 11);

        let white = stage.apply(frame.clone(), &FilterSpec::new(None, 1.0, 1.0, 1.0)).unwrap();
        assert!(white.as_raw().iter().all(|&c| c == 255));

        let gray = stage.apply(frame, &FilterSpec::new(None, 0.0, 0.0, 1.0)).unwrap();
        assert!(gray.as_raw().iter().all(|&c| c == 128));
    }

    #[test]
    fn test_every_preset_is_deterministic() {
        let stage = ColorFilterStage::new();
        let frame = random_frame(12, 9, 5);
        for name in stage.registry().available_presets() {
            let spec = FilterSpec::preset(name.as_str());
            let a = stage.apply(frame.clone(), &spec).unwrap();
            let b = stage.apply(frame.clone(), &spec).unwrap();
            assert!(a.same_pixels(&b), "{} is not deterministic", name);
        }
    }
}
