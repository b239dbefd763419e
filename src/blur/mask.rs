use crate::blur::region::PixelRect;

/// Circular feather mask inscribed in a region
///
/// Fully opaque inside the inner radius, fully transparent past the outer
/// radius, linear in between. Sampled at pixel centres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialMask {
    cx: f32,
    cy: f32,
    inner: f32,
    outer: f32,
}

impl RadialMask {
    /// Inner radius half the region's shorter side, outer radius one pixel more
    pub fn for_rect(rect: PixelRect) -> Self {
        let inner = rect.width.min(rect.height) as f32 / 2.0;
        Self {
            cx: rect.x as f32 + rect.width as f32 / 2.0,
            cy: rect.y as f32 + rect.height as f32 / 2.0,
            inner,
            outer: inner + 1.0,
        }
    }

    /// Opacity of the blurred layer at frame pixel `(x, y)`
    pub fn alpha(&self, x: u32, y: u32) -> f32 {
        let dx = x as f32 + 0.5 - self.cx;
        let dy = y as f32 + 0.5 - self.cy;
        let d = (dx * dx + dy * dy).sqrt();
        if d <= self.inner {
            1.0
        } else if d >= self.outer {
            0.0
        } else {
            (self.outer - d) / (self.outer - self.inner)
        }
    }
}
