//! Resolution of the model's coordinate space into canonical pixel boxes.
//!
//! The upstream model does not say which convention it answered in. Three are
//! known: the unit interval `[0, 1]`, a fixed normalization range (1000 for
//! HunyuanOCR), and raw pixels of a downscaled working copy of the image. The
//! convention belongs to the model call, so it is detected once for a whole
//! response batch and then applied to every box in it.
//!
//! Each convention is a [`CoordinateSpace`]; [`detect_space`] picks one, and
//! [`rescale_blocks`] maps the batch through it and canonicalizes every box
//! (ordered corners, clamped to the image).

use tracing::debug;

use crate::blocks::{BBox, ImageDimensions, PixelBox, RescaledBlock, TextBlock};
use crate::coords::{self, CoordRange};

/// Ratio of image size to largest emitted coordinate above which the batch is
/// treated as coming from a downscaled image. Empirical.
pub const DEFAULT_UPSCALE_THRESHOLD: f64 = 1.1;

/// A coordinate convention a model may answer in.
pub trait CoordinateSpace: Send + Sync {
    fn name(&self) -> &'static str;

    /// Per-axis pixels per model unit applied to `boxes` on an image of `dims`.
    fn factors(&self, boxes: &[BBox], dims: ImageDimensions) -> (f64, f64);

    /// Map a whole batch into pixel space of `dims`. No ordering or clamping.
    fn map_batch(&self, boxes: &[BBox], dims: ImageDimensions) -> Vec<BBox>;
}

/// Coordinates are fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitInterval;

impl CoordinateSpace for UnitInterval {
    fn name(&self) -> &'static str {
        "normalized-unit"
    }

    fn factors(&self, _boxes: &[BBox], dims: ImageDimensions) -> (f64, f64) {
        (f64::from(dims.width()), f64::from(dims.height()))
    }

    fn map_batch(&self, boxes: &[BBox], dims: ImageDimensions) -> Vec<BBox> {
        let (w, h) = self.factors(boxes, dims);
        boxes
            .iter()
            .map(|b| BBox::new(b.x1 * w, b.y1 * h, b.x2 * w, b.y2 * h))
            .collect()
    }
}

/// Coordinates are normalized to a fixed range.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedRange {
    range: CoordRange,
}

impl NormalizedRange {
    pub fn new(range: CoordRange) -> Self {
        Self { range }
    }
}

impl CoordinateSpace for NormalizedRange {
    fn name(&self) -> &'static str {
        "normalized-range"
    }

    fn factors(&self, _boxes: &[BBox], dims: ImageDimensions) -> (f64, f64) {
        coords::scale_factors(dims, self.range)
    }

    fn map_batch(&self, boxes: &[BBox], dims: ImageDimensions) -> Vec<BBox> {
        let x = |v: f64| coords::to_pixel(v, dims.width(), self.range) as f64;
        let y = |v: f64| coords::to_pixel(v, dims.height(), self.range) as f64;
        boxes
            .iter()
            .map(|b| BBox::new(x(b.x1), y(b.y1), x(b.x2), y(b.y2)))
            .collect()
    }
}

/// Coordinates are pixels of a possibly downscaled copy of the image.
///
/// When the largest `x2` (or `y2`) in the batch falls short of the real image
/// size by more than `threshold`, that axis is upscaled uniformly by the ratio.
/// Otherwise the axis is taken as already being in true pixel space.
#[derive(Debug, Clone, Copy)]
pub struct DetectAndUpscale {
    threshold: f64,
}

impl DetectAndUpscale {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    fn axis_factor(&self, dimension: u32, max_coord: f64) -> f64 {
        if max_coord <= 0.0 || !max_coord.is_finite() {
            return 1.0;
        }
        let ratio = f64::from(dimension) / max_coord;
        if ratio > self.threshold {
            ratio
        } else {
            1.0
        }
    }
}

impl CoordinateSpace for DetectAndUpscale {
    fn name(&self) -> &'static str {
        "detect-and-upscale"
    }

    fn factors(&self, boxes: &[BBox], dims: ImageDimensions) -> (f64, f64) {
        let max_x = boxes.iter().map(|b| b.x2).fold(f64::NEG_INFINITY, f64::max);
        let max_y = boxes.iter().map(|b| b.y2).fold(f64::NEG_INFINITY, f64::max);
        (
            self.axis_factor(dims.width(), max_x),
            self.axis_factor(dims.height(), max_y),
        )
    }

    fn map_batch(&self, boxes: &[BBox], dims: ImageDimensions) -> Vec<BBox> {
        let (fx, fy) = self.factors(boxes, dims);
        boxes
            .iter()
            .map(|b| BBox::new(b.x1 * fx, b.y1 * fy, b.x2 * fx, b.y2 * fy))
            .collect()
    }
}

/// How a batch's coordinate space is resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescaleConfig {
    /// Fixed normalization range of the model, if it has one.
    pub coord_range: Option<CoordRange>,
    pub upscale_threshold: f64,
}

impl Default for RescaleConfig {
    fn default() -> Self {
        Self {
            coord_range: Some(CoordRange::default()),
            upscale_threshold: DEFAULT_UPSCALE_THRESHOLD,
        }
    }
}

/// Pick the coordinate space for a whole batch.
///
/// Unit interval when every coordinate lies in `[0, 1]`, else the fixed range
/// when one is configured, else detect-and-upscale.
pub fn detect_space(boxes: &[BBox], config: &RescaleConfig) -> Box<dyn CoordinateSpace> {
    let all_unit = boxes
        .iter()
        .flat_map(|b| b.coords())
        .all(|v| (0.0..=1.0).contains(&v));

    if all_unit {
        Box::new(UnitInterval)
    } else if let Some(range) = config.coord_range {
        Box::new(NormalizedRange::new(range))
    } else {
        Box::new(DetectAndUpscale::new(config.upscale_threshold))
    }
}

/// Truncate toward zero, order corners and clamp into `[0, dimension - 1]`.
pub fn canonicalize(b: BBox, dims: ImageDimensions) -> PixelBox {
    let b = BBox::new(b.x1.trunc(), b.y1.trunc(), b.x2.trunc(), b.y2.trunc()).ordered();
    let clamp = |v: f64, dimension: u32| v.clamp(0.0, f64::from(dimension - 1)) as u32;
    PixelBox {
        x1: clamp(b.x1, dims.width()),
        y1: clamp(b.y1, dims.height()),
        x2: clamp(b.x2, dims.width()),
        y2: clamp(b.y2, dims.height()),
    }
}

/// Result of rescaling one response batch.
#[derive(Debug, Clone)]
pub struct RescaledBatch {
    pub space: &'static str,
    /// Pixels per model unit along x and y, as applied to this batch.
    pub scale: (f64, f64),
    pub blocks: Vec<RescaledBlock>,
}

/// Resolve the batch's space once and convert every block to a canonical pixel box.
pub fn rescale_blocks(
    blocks: &[TextBlock],
    dims: ImageDimensions,
    config: &RescaleConfig,
) -> RescaledBatch {
    let boxes: Vec<BBox> = blocks.iter().map(TextBlock::bbox).collect();
    let space = detect_space(&boxes, config);
    let scale = space.factors(&boxes, dims);
    debug!(
        "Rescaling {} blocks to {}x{} as {} (x={:.3}, y={:.3})",
        blocks.len(),
        dims.width(),
        dims.height(),
        space.name(),
        scale.0,
        scale.1
    );

    let rescaled = space
        .map_batch(&boxes, dims)
        .into_iter()
        .zip(blocks)
        .map(|(mapped, block)| RescaledBlock::new(block.clone(), canonicalize(mapped, dims)))
        .collect();

    RescaledBatch {
        space: space.name(),
        scale,
        blocks: rescaled,
    }
}
