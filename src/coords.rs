//! Conversion between normalized coordinates and pixel coordinates.
//!
//! HunyuanOCR answers in a resolution-independent space where every axis runs
//! from 0 to a fixed range (1000), regardless of the real image size:
//!
//! ```text
//! pixel      = (normalized / range) * dimension
//! normalized = pixel * (range / dimension)
//! ```
//!
//! The range is configuration, not a constant: other model versions may use a
//! different one, so every function takes it explicitly.

use serde::Serialize;
use thiserror::Error;

use crate::blocks::ImageDimensions;

/// Normalization range used by HunyuanOCR.
pub const HUNYUAN_COORD_RANGE: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("coordinate range must be positive and finite, got {0}")]
    InvalidRange(f64),
    #[error("image dimension must be non-zero")]
    ZeroDimension,
}

/// A validated, positive normalization range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CoordRange(f64);

impl CoordRange {
    pub fn new(value: f64) -> Result<Self, CoordError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(CoordError::InvalidRange(value))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for CoordRange {
    fn default() -> Self {
        Self(HUNYUAN_COORD_RANGE)
    }
}

/// Normalized coordinate to pixel coordinate, truncated toward zero.
pub fn to_pixel(normalized: f64, dimension: u32, range: CoordRange) -> i64 {
    ((normalized / range.0) * f64::from(dimension)).trunc() as i64
}

/// Pixel coordinate to normalized coordinate.
pub fn to_normalized(pixel: f64, dimension: u32, range: CoordRange) -> Result<f64, CoordError> {
    if dimension == 0 {
        return Err(CoordError::ZeroDimension);
    }
    Ok(pixel * (range.0 / f64::from(dimension)))
}

/// Pixels per normalized unit along each axis.
pub fn scale_factors(dims: ImageDimensions, range: CoordRange) -> (f64, f64) {
    (
        f64::from(dims.width()) / range.0,
        f64::from(dims.height()) / range.0,
    )
}
