use std::sync::Arc;

use tracing::{debug, warn};

use crate::blur::detect::{FaceDetector, FaceRegion};
use crate::blur::gaussian::{BlurScratch, GaussianBlur};
use crate::blur::mask::RadialMask;
use crate::blur::region::{BlurRegion, PixelRect};
use crate::config::BlurConfig;
use crate::video::types::{Frame, Size};

/// Blurs every detected face in a frame
///
/// Regions are composited one after another, each blurring the frame as
/// left by the previous region. Detection failures are logged and the frame
/// passes through untouched.
pub struct FaceMaskStage {
    detector: Arc<dyn FaceDetector>,
    blur: GaussianBlur,
    padding: u32,
    scratch: BlurScratch,
}

impl FaceMaskStage {
    pub fn new(detector: Arc<dyn FaceDetector>, padding: u32, sigma: f32) -> Self {
        Self {
            detector,
            blur: GaussianBlur::new(sigma),
            padding,
            scratch: BlurScratch::new(),
        }
    }

    pub fn from_config(detector: Arc<dyn FaceDetector>, config: &BlurConfig) -> Self {
        Self::new(detector, config.padding_px, config.sigma)
    }

    /// Detect, then blur each padded face region of `frame`.
    ///
    /// `natural_size` maps normalized detections to pixels.
    pub fn process(&mut self, mut frame: Frame, natural_size: Size) -> Frame {
        let faces = match self.detector.detect(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Face detection failed at {}, frame left unblurred: {}", frame.pts(), e);
                return frame;
            }
        };
        if faces.is_empty() {
            return frame;
        }

        let regions = self.regions(&faces, natural_size, frame.size());
        debug!("Blurring {} of {} detected faces at {}", regions.len(), faces.len(), frame.pts());

        for region in regions {
            self.composite(&mut frame, region.rect);
        }
        frame
    }

    /// Padded, clamped pixel regions in detection order; empty ones are dropped
    pub fn regions(&self, faces: &[FaceRegion], natural_size: Size, bounds: Size) -> Vec<BlurRegion> {
        faces
            .iter()
            .filter_map(|face| BlurRegion::from_face(face, natural_size, bounds, self.padding))
            .collect()
    }

    fn composite(&mut self, frame: &mut Frame, rect: PixelRect) {
        let mask = RadialMask::for_rect(rect);
        let blurred = self.blur.blur_region(frame.as_image(), rect, &mut self.scratch);
        let image = frame.as_image_mut();

        for y in 0..rect.height {
            for x in 0..rect.width {
                let (fx, fy) = (rect.x + x, rect.y + y);
                let alpha = mask.alpha(fx, fy);
                if alpha <= 0.0 {
                    continue;
                }

                let i = ((y * rect.width + x) * 3) as usize;
                let pixel = image.get_pixel_mut(fx, fy);
                if alpha >= 1.0 {
                    pixel.0.copy_from_slice(&blurred[i..i + 3]);
                    continue;
                }
                for c in 0..3 {
                    let mixed = blurred[i + c] as f32 * alpha + pixel.0[c] as f32 * (1.0 - alpha);
                    pixel.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blur::detect::{NoFaceDetector, NormalizedRect, StaticRegionDetector};
    use crate::error::DetectionError;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_frame(width: u32, height: u32) -> Frame {
        let mut rng = SmallRng::seed_from_u64(9);
        let data = (0..width * height * 3).map(|_| rng.gen()).collect();
        Frame::from_rgb_bytes(width, height, data, Default::default()).unwrap()
    }

    #[test]
    fn test_no_faces_leaves_frame_untouched() {
        let frame = random_frame(64, 48);
        let mut stage = FaceMaskStage::new(Arc::new(NoFaceDetector), 100, 50.0);
        let out = stage.process(frame.clone(), frame.size());
        assert!(out.same_pixels(&frame));
    }

    #[test]
    fn test_detection_failure_passes_frame_through() {
        let frame = random_frame(32, 32);
        let failing = |_: &Frame| -> Result<Vec<FaceRegion>, DetectionError> {
            Err(DetectionError::Failed { reason: "model unavailable".into() })
        };
        let mut stage = FaceMaskStage::new(Arc::new(failing), 4, 3.0);
        let out = stage.process(frame.clone(), frame.size());
        assert!(out.same_pixels(&frame));
    }

    #[test]
    fn test_pixels_outside_regions_unchanged() {
        let frame = random_frame(160, 120);
        let size = frame.size();
        let faces = [NormalizedRect::new(0.1, 0.1, 0.1, 0.1), NormalizedRect::new(0.6, 0.5, 0.2, 0.3)];
        let detector = StaticRegionDetector::new(faces);
        let mut stage = FaceMaskStage::new(Arc::new(detector.clone()), 6, 5.0);

        let regions = stage.regions(&detector.detect(&frame).unwrap(), size, size);
        assert_eq!(regions.len(), 2);

        let out = stage.process(frame.clone(), size);
        let mut changed_inside = 0;
        for y in 0..size.height {
            for x in 0..size.width {
                let inside = regions.iter().any(|r| r.rect.contains(x, y));
                if !inside {
                    assert_eq!(out.get_pixel(x, y), frame.get_pixel(x, y), "pixel ({}, {}) changed", x, y);
                } else if out.get_pixel(x, y) != frame.get_pixel(x, y) {
                    changed_inside += 1;
                }
            }
        }
        assert!(changed_inside > 0);
    }

    #[test]
    fn test_region_centre_is_blurred() {
        let frame = random_frame(100, 100);
        let rect = NormalizedRect::new(0.4, 0.4, 0.2, 0.2);
        let mut stage = FaceMaskStage::new(Arc::new(StaticRegionDetector::new([rect])), 0, 4.0);
        let out = stage.process(frame.clone(), frame.size());

        let expected = GaussianBlur::new(4.0).blur_image(frame.as_image());
        assert_eq!(out.get_pixel(50, 50), expected.get_pixel(50, 50).0);
    }

    #[test]
    fn test_empty_regions_are_skipped() {
        let frame = random_frame(40, 40);
        let outside = NormalizedRect::new(2.0, 2.0, 0.1, 0.1);
        let mut stage = FaceMaskStage::new(Arc::new(StaticRegionDetector::new([outside])), 0, 4.0);
        let out = stage.process(frame.clone(), frame.size());
        assert!(out.same_pixels(&frame));
    }
}
