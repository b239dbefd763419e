use crate::blur::detect::FaceRegion;
use crate::video::types::Size;

/// Axis-aligned pixel rectangle `[x, x + width) × [y, y + height)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn full(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Grow by `margin` on every side, staying inside `bounds`
    pub fn expand(&self, margin: u32, bounds: Size) -> Self {
        let x0 = self.x.saturating_sub(margin);
        let y0 = self.y.saturating_sub(margin);
        let x1 = self.right().saturating_add(margin).min(bounds.width);
        let y1 = self.bottom().saturating_add(margin).min(bounds.height);
        Self::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

/// The pixel area blurred for one detected face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurRegion {
    pub rect: PixelRect,
}

impl BlurRegion {
    /// Map a face to pixels using `natural_size`, pad by `padding` on all
    /// sides and clamp to `bounds`. `None` when nothing is left.
    pub fn from_face(face: &FaceRegion, natural_size: Size, bounds: Size, padding: u32) -> Option<Self> {
        let r = face.rect;
        if ![r.x, r.y, r.width, r.height].iter().all(|v| v.is_finite()) {
            return None;
        }

        let (w, h) = (natural_size.width as f64, natural_size.height as f64);
        let pad = padding as f64;
        let x0 = (snap(r.x as f64 * w) - pad).floor().max(0.0);
        let y0 = (snap(r.y as f64 * h) - pad).floor().max(0.0);
        let x1 = (snap((r.x + r.width) as f64 * w) + pad).ceil().min(bounds.width as f64);
        let y1 = (snap((r.y + r.height) as f64 * h) + pad).ceil().min(bounds.height as f64);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Self {
            rect: PixelRect::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32),
        })
    }
}

/// Absorb f32 noise so 0.6 × 1000 lands on pixel 600, not 601
fn snap(v: f64) -> f64 {
    let rounded = v.round();
    if (v - rounded).abs() < 1e-3 {
        rounded
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blur::detect::NormalizedRect;

    fn face(x: f32, y: f32, w: f32, h: f32) -> FaceRegion {
        FaceRegion::new(NormalizedRect::new(x, y, w, h), 0.9)
    }

    #[test]
    fn test_padding_on_all_sides() {
        let size = Size::new(1000, 1000);
        let region = BlurRegion::from_face(&face(0.4, 0.4, 0.2, 0.2), size, size, 100).unwrap();
        assert_eq!(region.rect, PixelRect::new(300, 300, 400, 400));
    }

    #[test]
    fn test_clamped_to_frame() {
        let size = Size::new(640, 480);
        let region = BlurRegion::from_face(&face(0.0, 0.9, 0.1, 0.2), size, size, 100).unwrap();
        assert_eq!(region.rect.x, 0);
        assert_eq!(region.rect.bottom(), 480);
        assert_eq!(region.rect.right(), 164);
    }

    #[test]
    fn test_outside_frame_is_skipped() {
        let size = Size::new(640, 480);
        assert!(BlurRegion::from_face(&face(1.5, 0.2, 0.1, 0.1), size, size, 10).is_none());
        assert!(BlurRegion::from_face(&face(0.2, 0.2, 0.0, 0.0), size, size, 0).is_none());
        assert!(BlurRegion::from_face(&face(f32::NAN, 0.2, 0.1, 0.1), size, size, 10).is_none());
    }

    #[test]
    fn test_expand_clamps() {
        let rect = PixelRect::new(10, 20, 30, 40).expand(15, Size::new(50, 100));
        assert_eq!(rect, PixelRect::new(0, 5, 50, 70));
    }
}
