//! Built-in color presets.
//!
//! Each preset is a 3×4 color matrix (three gains plus an offset per output
//! channel) followed by an optional tone curve applied to every channel.

use crate::filters::traits::ColorPreset;

/// Rec.709 luma weights
pub const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

type Matrix = [[f32; 4]; 3];

const IDENTITY_MATRIX: Matrix = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// Piecewise-linear curve through control points sorted by input
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCurve {
    points: Vec<(f32, f32)>,
}

impl ToneCurve {
    pub fn new(mut points: Vec<(f32, f32)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    pub fn eval(&self, x: f32) -> f32 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return x,
        };
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        for pair in self.points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            if x <= x1 {
                if x1 <= x0 {
                    return y1;
                }
                let t = (x - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        last.1
    }
}

/// A preset defined by a color matrix and optional tone curve
#[derive(Debug, Clone)]
pub struct MatrixPreset {
    name: String,
    description: String,
    matrix: Matrix,
    curve: Option<ToneCurve>,
}

impl MatrixPreset {
    pub fn new(name: &str, description: &str, matrix: [[f32; 4]; 3], curve: Option<ToneCurve>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            matrix,
            curve,
        }
    }
}

impl ColorPreset for MatrixPreset {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn transform(&self, rgb: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0; 3];
        for (channel, row) in out.iter_mut().zip(self.matrix.iter()) {
            let mixed = row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2] + row[3];
            *channel = match &self.curve {
                Some(curve) => curve.eval(mixed.clamp(0.0, 1.0)),
                None => mixed,
            };
        }
        out
    }

    fn is_identity(&self) -> bool {
        self.matrix == IDENTITY_MATRIX && self.curve.is_none()
    }
}

/// Mixes each channel with luma: 0 is grayscale, 1 is unchanged
fn saturation_matrix(s: f32) -> Matrix {
    let mut m = [[0.0; 4]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().take(3).enumerate() {
            *cell = (1.0 - s) * LUMA[j] + if i == j { s } else { 0.0 };
        }
    }
    m
}

/// Scale each output row and add a per-channel offset
fn tint(mut m: Matrix, gains: [f32; 3], offsets: [f32; 3]) -> Matrix {
    for (row, (gain, offset)) in m.iter_mut().zip(gains.iter().zip(offsets.iter())) {
        for cell in row.iter_mut().take(3) {
            *cell *= gain;
        }
        row[3] += offset;
    }
    m
}

fn curve(points: &[(f32, f32)]) -> Option<ToneCurve> {
    Some(ToneCurve::new(points.to_vec()))
}

pub fn original() -> MatrixPreset {
    MatrixPreset::new("Original", "No color change", IDENTITY_MATRIX, None)
}

pub fn noir() -> MatrixPreset {
    MatrixPreset::new(
        "Noir",
        "High-contrast black and white",
        saturation_matrix(0.0),
        curve(&[(0.0, 0.0), (0.25, 0.1), (0.5, 0.5), (0.75, 0.9), (1.0, 1.0)]),
    )
}

pub fn chrome() -> MatrixPreset {
    MatrixPreset::new(
        "Chrome",
        "Vivid colors with extra punch",
        saturation_matrix(1.3),
        curve(&[(0.0, 0.0), (0.25, 0.21), (0.75, 0.8), (1.0, 1.0)]),
    )
}

pub fn fade() -> MatrixPreset {
    MatrixPreset::new(
        "Fade",
        "Muted colors with lifted blacks",
        saturation_matrix(0.6),
        curve(&[(0.0, 0.12), (0.5, 0.52), (1.0, 0.92)]),
    )
}

pub fn instant() -> MatrixPreset {
    MatrixPreset::new(
        "Instant",
        "Warm, slightly faded instant-camera look",
        tint(saturation_matrix(0.85), [1.06, 1.0, 0.88], [0.03, 0.02, 0.0]),
        curve(&[(0.0, 0.06), (0.5, 0.53), (1.0, 0.95)]),
    )
}

pub fn mono() -> MatrixPreset {
    MatrixPreset::new("Mono", "Plain black and white", saturation_matrix(0.0), None)
}

pub fn process() -> MatrixPreset {
    MatrixPreset::new(
        "Process",
        "Cool cross-processed tones",
        tint(saturation_matrix(1.1), [0.92, 1.0, 1.08], [0.0, 0.01, 0.04]),
        curve(&[(0.0, 0.02), (0.3, 0.25), (0.7, 0.76), (1.0, 1.0)]),
    )
}

pub fn tonal() -> MatrixPreset {
    MatrixPreset::new(
        "Tonal",
        "Black and white with a compressed tonal range",
        saturation_matrix(0.0),
        curve(&[(0.0, 0.04), (0.25, 0.24), (0.75, 0.77), (1.0, 0.96)]),
    )
}

pub fn transfer() -> MatrixPreset {
    MatrixPreset::new(
        "Transfer",
        "Warm vintage print",
        tint(saturation_matrix(1.1), [1.1, 1.0, 0.84], [0.02, 0.0, 0.0]),
        curve(&[(0.0, 0.03), (0.5, 0.52), (1.0, 0.97)]),
    )
}
