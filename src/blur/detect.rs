use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;
use crate::video::types::Frame;

/// Rectangle in normalized `[0, 1]` coordinates, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Convert a box whose `y` is measured up from the bottom edge
    pub fn from_bottom_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, 1.0 - y - height, width, height)
    }
}

impl FromStr for NormalizedRect {
    type Err = String;

    /// Parses `x,y,w,h`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<f32> = s
            .split(',')
            .map(|v| v.trim().parse::<f32>().map_err(|e| format!("'{}': {}", v.trim(), e)))
            .collect::<Result<_, _>>()?;

        match values.as_slice() {
            [x, y, w, h] if values.iter().all(|v| v.is_finite()) => Ok(Self::new(*x, *y, *w, *h)),
            _ => Err(format!("expected four numbers x,y,w,h, got '{}'", s)),
        }
    }
}

/// One detected face, valid only for the frame that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub rect: NormalizedRect,
    pub confidence: f32,
}

impl FaceRegion {
    pub fn new(rect: NormalizedRect, confidence: f32) -> Self {
        Self { rect, confidence }
    }
}

/// Finds faces in a frame. May return zero regions.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceRegion>, DetectionError>;
}

impl<F> FaceDetector for F
where
    F: Fn(&Frame) -> Result<Vec<FaceRegion>, DetectionError> + Send + Sync,
{
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceRegion>, DetectionError> {
        self(frame)
    }
}

/// Never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaceDetector;

impl FaceDetector for NoFaceDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<FaceRegion>, DetectionError> {
        Ok(Vec::new())
    }
}

/// Reports the same fixed privacy regions on every frame
#[derive(Debug, Clone, Default)]
pub struct StaticRegionDetector {
    regions: Vec<FaceRegion>,
}

impl StaticRegionDetector {
    pub fn new(rects: impl IntoIterator<Item = NormalizedRect>) -> Self {
        Self {
            regions: rects.into_iter().map(|rect| FaceRegion::new(rect, 1.0)).collect(),
        }
    }
}

impl FaceDetector for StaticRegionDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<FaceRegion>, DetectionError> {
        Ok(self.regions.clone())
    }
}
