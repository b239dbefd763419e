use image::imageops::{self, FilterType};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{ClipError, FilterError};
use crate::filters::{ColorFilter, ColorFilterStage, FilterSpec};
use crate::video::asset::MediaAsset;
use crate::video::source::{frame_at, Decoder};
use crate::video::time::MediaTime;
use crate::video::types::Frame;

/// One entry of the filter strip
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub preset: String,
    pub frame: Frame,
}

/// Applies the current filter to frames as they are displayed
///
/// Holds no state besides the filter itself; frames are processed in
/// memory and never written anywhere.
pub struct PreviewCompositor {
    stage: ColorFilterStage,
    filter: ColorFilter,
}

impl PreviewCompositor {
    pub fn new(stage: ColorFilterStage) -> Self {
        Self {
            stage,
            filter: ColorFilter::identity(),
        }
    }

    /// Replace the filter. An unknown preset leaves the previous filter in place.
    pub fn set_filter(&mut self, spec: FilterSpec) -> Result<(), FilterError> {
        self.filter = self.stage.resolve(&spec)?;
        debug!("Preview filter set to {:?}", self.filter);
        Ok(())
    }

    pub fn filter_spec(&self) -> &FilterSpec {
        self.filter.spec()
    }

    /// The displayed version of `frame`
    pub fn composite_frame(&self, frame: Frame) -> Frame {
        self.filter.apply(frame)
    }

    /// Render every catalogue preset over a downscaled copy of `base`
    ///
    /// Thumbnails use neutral adjustments so they show the preset alone.
    pub fn filter_thumbnails(&self, base: &Frame, max_edge: u32) -> Result<Vec<Thumbnail>, FilterError> {
        let small = downscale(base, max_edge);
        let names = self.stage.registry().available_presets();

        let filters = names
            .iter()
            .map(|name| self.stage.resolve(&FilterSpec::preset(name.as_str())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names
            .into_par_iter()
            .zip(filters.into_par_iter())
            .map(|(preset, filter)| Thumbnail {
                preset,
                frame: filter.apply(small.clone()),
            })
            .collect())
    }
}

impl Default for PreviewCompositor {
    fn default() -> Self {
        Self::new(ColorFilterStage::new())
    }
}

/// Evenly spaced frames across the whole asset for the trim timeline
///
/// Frame `i` of `count` is taken at `i * duration / count` and fitted within
/// `max_edge`. Results keep timeline order.
pub fn timeline_thumbnails(
    decoder: &dyn Decoder,
    asset: &MediaAsset,
    count: usize,
    max_edge: u32,
) -> Result<Vec<Frame>, ClipError> {
    let duration = asset.duration.as_secs();
    let frames = (0..count)
        .into_par_iter()
        .map(|i| {
            let at = MediaTime::from_secs(i as f64 * duration / count as f64);
            frame_at(decoder, asset, at).map(|frame| downscale(&frame, max_edge))
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Generated {} timeline thumbnails for {}", frames.len(), asset.label());
    Ok(frames)
}

/// Fit within `max_edge` keeping the aspect ratio; never upscales
fn downscale(frame: &Frame, max_edge: u32) -> Frame {
    let (w, h) = (frame.width(), frame.height());
    let longest = w.max(h);
    if longest <= max_edge || max_edge == 0 {
        return frame.clone();
    }

    let scale = max_edge as f64 / longest as f64;
    let tw = ((w as f64 * scale).round() as u32).max(1);
    let th = ((h as f64 * scale).round() as u32).max(1);
    let resized = imageops::resize(frame.as_image(), tw, th, FilterType::Triangle);
    Frame::new(resized, frame.pts())
}
