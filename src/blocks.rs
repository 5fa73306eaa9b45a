//! Text block data model.
//!
//! A [`TextBlock`] is what the parser yields: a trimmed text span plus a box in
//! whatever coordinate space the model answered in. Rescaling never touches it;
//! it produces a [`RescaledBlock`] that carries the canonical [`PixelBox`]
//! alongside the untouched source block.

use serde::{Deserialize, Serialize};

use crate::coords::CoordError;

/// Axis-aligned box with corners as emitted by the model (not necessarily ordered).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Width, never negative even when corners are reversed.
    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    /// Height, never negative even when corners are reversed.
    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Swap corners so that `x1 <= x2` and `y1 <= y2`.
    pub fn ordered(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    pub fn coords(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// A detected text span. The box is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    text: String,
    #[serde(rename = "box")]
    bbox: BBox,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }
}

/// Pixel dimensions of an upright (EXIF-corrected) raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageDimensions {
    width: u32,
    height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Result<Self, CoordError> {
        if width == 0 || height == 0 {
            return Err(CoordError::ZeroDimension);
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Canonical pixel box: ordered corners, clamped to `[0, dimension - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelBox {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }
}

/// A source block paired with its canonical pixel box.
#[derive(Debug, Clone, PartialEq)]
pub struct RescaledBlock {
    source: TextBlock,
    pixel: PixelBox,
}

impl RescaledBlock {
    pub fn new(source: TextBlock, pixel: PixelBox) -> Self {
        Self { source, pixel }
    }

    pub fn text(&self) -> &str {
        self.source.text()
    }

    /// Box as the model emitted it.
    pub fn normalized(&self) -> BBox {
        self.source.bbox()
    }

    pub fn pixel(&self) -> PixelBox {
        self.pixel
    }

    pub fn source(&self) -> &TextBlock {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_corners_have_zero_extent() {
        let b = BBox::new(50.0, 90.0, 10.0, 10.0);
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 0.0);
    }

    #[test]
    fn test_ordered_swaps_corners() {
        let b = BBox::new(50.0, 10.0, 10.0, 90.0).ordered();
        assert_eq!(b, BBox::new(10.0, 10.0, 50.0, 90.0));
        assert_eq!(b.width(), 40.0);
        assert_eq!(b.height(), 80.0);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(ImageDimensions::new(0, 10).is_err());
        assert!(ImageDimensions::new(10, 0).is_err());
        let dims = ImageDimensions::new(800, 600).unwrap();
        assert_eq!((dims.width(), dims.height()), (800, 600));
    }
}
