//! Gaussian blur approximated by three successive box blurs.
//!
//! Box sums are kept as exact integers through all six separable passes and
//! divided once at the end, so blurring a window gives bit-identical values
//! to blurring the whole frame wherever the window covers the blur support.

use image::RgbImage;

use crate::blur::region::PixelRect;
use crate::video::types::Size;

const PASSES: usize = 3;

/// Box radii whose three successive passes approximate a Gaussian of `sigma`
pub fn boxes_for_gauss(sigma: f32) -> [usize; PASSES] {
    if !(sigma > 0.0) {
        return [0; PASSES];
    }

    let n = PASSES as f64;
    let variance12 = 12.0 * (sigma as f64).powi(2);
    let w_ideal = (variance12 / n + 1.0).sqrt();
    let mut wl = w_ideal.floor() as i64;
    if wl % 2 == 0 {
        wl -= 1;
    }
    let wl = wl.max(1);
    let wu = wl + 2;

    let wlf = wl as f64;
    let m_ideal = (variance12 - n * wlf * wlf - 4.0 * n * wlf - 3.0 * n) / (-4.0 * wlf - 4.0);
    let m = (m_ideal.round().max(0.0) as usize).min(PASSES);

    let mut radii = [0; PASSES];
    for (i, radius) in radii.iter_mut().enumerate() {
        let size = if i < m { wl } else { wu };
        *radius = ((size - 1) / 2) as usize;
    }
    radii
}

/// Reusable working memory, grown on demand and never shrunk
#[derive(Debug, Default)]
pub struct BlurScratch {
    columns: Vec<u64>,
    line_a: Vec<u64>,
    line_b: Vec<u64>,
    crop: Vec<u8>,
}

impl BlurScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

fn grow<T: Copy + Default>(buf: &mut Vec<T>, len: usize) -> &mut [T] {
    if buf.len() < len {
        buf.resize(len, T::default());
    }
    &mut buf[..len]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianBlur {
    sigma: f32,
    radii: [usize; PASSES],
}

impl GaussianBlur {
    pub fn new(sigma: f32) -> Self {
        Self {
            sigma,
            radii: boxes_for_gauss(sigma),
        }
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn radii(&self) -> [usize; PASSES] {
        self.radii
    }

    /// How far, in pixels, a source pixel can influence the output
    pub fn support(&self) -> u32 {
        self.radii.iter().sum::<usize>() as u32
    }

    fn norm(&self) -> u64 {
        self.radii.iter().map(|r| (2 * *r as u64 + 1).pow(2)).product()
    }

    /// Blur `image` and return the blurred pixels of `region`, packed RGB rows.
    ///
    /// Only `region` grown by [`support`](Self::support) is read. Edges of
    /// the image are extended by clamping.
    pub fn blur_region<'a>(&self, image: &RgbImage, region: PixelRect, scratch: &'a mut BlurScratch) -> &'a [u8] {
        let bounds = Size::new(image.width(), image.height());
        let window = region.expand(self.support(), bounds);
        let (ww, wh) = (window.width as usize, window.height as usize);
        let (rw, rh) = (region.width as usize, region.height as usize);
        let BlurScratch { columns, line_a, line_b, crop } = scratch;

        let crop = grow(crop, rw * rh * 3);
        if region.is_empty() {
            return crop;
        }

        let stride = image.width() as usize * 3;
        let raw = image.as_raw();
        let columns = grow(columns, rw * wh * 3);
        let col_offset = (region.x - window.x) as usize * 3;

        // Horizontal passes over every window row, keeping only the region's columns
        for y in 0..wh {
            let mut a = grow(line_a, ww * 3);
            let mut b = grow(line_b, ww * 3);
            let row_start = (window.y as usize + y) * stride + window.x as usize * 3;
            for (dst, src) in a.iter_mut().zip(&raw[row_start..row_start + ww * 3]) {
                *dst = *src as u64;
            }
            for &radius in &self.radii {
                box_line(a, b, ww, radius);
                std::mem::swap(&mut a, &mut b);
            }
            columns[y * rw * 3..(y + 1) * rw * 3].copy_from_slice(&a[col_offset..col_offset + rw * 3]);
        }

        // Vertical passes per region column, writing only the region's rows
        let norm = self.norm();
        let row_offset = (region.y - window.y) as usize;
        for x in 0..rw {
            let mut a = grow(line_a, wh * 3);
            let mut b = grow(line_b, wh * 3);
            for y in 0..wh {
                let src = (y * rw + x) * 3;
                a[y * 3..y * 3 + 3].copy_from_slice(&columns[src..src + 3]);
            }
            for &radius in &self.radii {
                box_line(a, b, wh, radius);
                std::mem::swap(&mut a, &mut b);
            }
            for y in 0..rh {
                let src = (row_offset + y) * 3;
                let dst = (y * rw + x) * 3;
                for c in 0..3 {
                    crop[dst + c] = ((a[src + c] + norm / 2) / norm).min(255) as u8;
                }
            }
        }

        crop
    }

    /// Blur a whole image
    pub fn blur_image(&self, image: &RgbImage) -> RgbImage {
        let mut scratch = BlurScratch::new();
        let full = PixelRect::full(Size::new(image.width(), image.height()));
        let data = self.blur_region(image, full, &mut scratch).to_vec();
        RgbImage::from_raw(image.width(), image.height(), data).unwrap_or_else(|| image.clone())
    }
}

/// Clamped sliding box sum over `len` interleaved RGB samples
fn box_line(src: &[u64], dst: &mut [u64], len: usize, radius: usize) {
    let last = len - 1;
    for c in 0..3 {
        let at = |i: usize| src[i.min(last) * 3 + c];
        let mut sum = (radius as u64 + 1) * at(0) + (1..=radius).map(at).sum::<u64>();
        for i in 0..len {
            dst[i * 3 + c] = sum;
            sum = sum + at(i + radius + 1) - at(i.saturating_sub(radius));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_image(width: u32, height: u32) -> RgbImage {
        let mut rng = SmallRng::seed_from_u64(42);
        RgbImage::from_fn(width, height, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
    }

    #[test]
    fn test_boxes_for_sigma_50() {
        assert_eq!(boxes_for_gauss(50.0), [49, 49, 50]);
        assert_eq!(GaussianBlur::new(50.0).support(), 148);
        assert_eq!(boxes_for_gauss(0.0), [0, 0, 0]);
    }

    #[test]
    fn test_uniform_image_is_unchanged() {
        let image = RgbImage::from_pixel(40, 30, Rgb([12, 200, 99]));
        let blurred = GaussianBlur::new(5.0).blur_image(&image);
        assert_eq!(blurred, image);
    }

    #[test]
    fn test_window_matches_whole_frame() {
        let image = random_image(120, 90);
        let blur = GaussianBlur::new(4.0);
        let whole = blur.blur_image(&image);

        let region = PixelRect::new(50, 20, 30, 25);
        let mut scratch = BlurScratch::new();
        let crop = blur.blur_region(&image, region, &mut scratch).to_vec();

        for y in 0..region.height {
            for x in 0..region.width {
                let i = ((y * region.width + x) * 3) as usize;
                let expected = whole.get_pixel(region.x + x, region.y + y).0;
                assert_eq!(&crop[i..i + 3], &expected[..]);
            }
        }
    }

    #[test]
    fn test_blur_smooths_noise() {
        let image = random_image(64, 64);
        let blurred = GaussianBlur::new(6.0).blur_image(&image);
        let spread = |img: &RgbImage| {
            let (lo, hi) = img.pixels().fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
            hi - lo
        };
        assert!(spread(&blurred) < spread(&image) / 2);
    }

    #[test]
    fn test_scratch_is_reused() {
        let image = random_image(80, 80);
        let blur = GaussianBlur::new(3.0);
        let mut scratch = BlurScratch::new();
        let capacities = |s: &BlurScratch| [s.columns.capacity(), s.line_a.capacity(), s.line_b.capacity(), s.crop.capacity()];

        blur.blur_region(&image, PixelRect::new(10, 10, 40, 40), &mut scratch);
        let grown = capacities(&scratch);
        assert!(grown.iter().all(|&c| c > 0));
        blur.blur_region(&image, PixelRect::new(30, 30, 20, 20), &mut scratch);
        assert_eq!(capacities(&scratch), grown);
    }
}
