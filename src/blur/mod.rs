//! # Face Blur
//!
//! Privacy masking for export: detected faces are padded, clamped to the
//! frame and covered with a strong Gaussian blur behind a feathered circular
//! mask.
//!
//! Detection itself is pluggable through [`FaceDetector`]; closures of the
//! form `Fn(&Frame) -> Result<Vec<FaceRegion>, DetectionError>` qualify.

pub mod detect;
pub mod gaussian;
pub mod mask;
pub mod region;
pub mod stage;

pub use detect::{FaceDetector, FaceRegion, NoFaceDetector, NormalizedRect, StaticRegionDetector};
pub use gaussian::{BlurScratch, GaussianBlur};
pub use mask::RadialMask;
pub use region::{BlurRegion, PixelRect};
pub use stage::FaceMaskStage;
