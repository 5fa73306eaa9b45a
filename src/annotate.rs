//! Drawing of numbered, colored boxes onto a copy of the source image.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::blocks::{PixelBox, RescaledBlock};
use crate::image_io::ImageError;

/// Box colors, assigned to blocks in order and wrapping around.
pub const COLOR_PALETTE: [&str; 8] = [
    "#f97316", "#22c55e", "#0ea5e9", "#a855f7", "#e11d48", "#06b6d4", "#d97706", "#10b981",
];

/// Used when a style is built with an empty palette.
pub const FALLBACK_COLOR: Rgba<u8> = Rgba([0xf9, 0x73, 0x16, 255]);

static FONT_PATHS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Parse `#rrggbb` into an opaque color.
pub fn parse_hex_color(hex: &str) -> Option<Rgba<u8>> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

pub fn to_hex(color: Rgba<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Visual parameters of an annotation pass.
#[derive(Debug, Clone)]
pub struct AnnotationStyle {
    pub palette: Vec<Rgba<u8>>,
    pub line_width: u32,
    /// Characters of block text kept in the label before an ellipsis.
    pub label_chars: usize,
    /// Offset of the label tag from the box's top-left corner.
    pub label_offset: i32,
    pub font_size: f32,
    pub label_color: Rgba<u8>,
}

impl AnnotationStyle {
    /// Style used for the web UI: thin lines, dark label text.
    pub fn web() -> Self {
        Self {
            palette: default_palette(),
            line_width: 3,
            label_chars: 14,
            label_offset: 4,
            font_size: 14.0,
            label_color: Rgba([0, 0, 0, 255]),
        }
    }

    /// Style used by the `draw-blocks` tool: thicker lines, white labels.
    pub fn cli() -> Self {
        Self {
            line_width: 4,
            label_offset: 8,
            font_size: 20.0,
            label_color: Rgba([255, 255, 255, 255]),
            ..Self::web()
        }
    }

    /// Color of the block with 1-based `index`. An empty palette yields
    /// [`FALLBACK_COLOR`].
    pub fn color_for(&self, index: usize) -> Rgba<u8> {
        match self.palette.len() {
            0 => FALLBACK_COLOR,
            n => self.palette[index.saturating_sub(1) % n],
        }
    }
}

fn default_palette() -> Vec<Rgba<u8>> {
    COLOR_PALETTE.iter().filter_map(|c| parse_hex_color(c)).collect()
}

/// `"{index} {snippet}"`, the snippet cut to `max_chars` with an ellipsis.
pub fn label_for(index: usize, text: &str, max_chars: usize) -> String {
    let mut snippet: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        snippet.push('…');
    }
    format!("{} {}", index, snippet)
}

/// Load a label font from `explicit`, else from well-known system locations.
pub fn load_font(explicit: Option<&Path>) -> Option<FontVec> {
    let candidates = explicit
        .into_iter()
        .chain(FONT_PATHS.iter().map(|p| Path::new(*p)));

    for path in candidates {
        let Ok(data) = std::fs::read(path) else {
            continue;
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                info!("Loaded label font from {:?}", path);
                return Some(font);
            }
            Err(e) => warn!("Unusable font {:?}: {}", path, e),
        }
    }

    warn!("No label font found; boxes will be drawn without labels");
    None
}

/// Draws blocks onto images. Holds the style and the optional label font.
pub struct Annotator {
    style: AnnotationStyle,
    font: Option<FontVec>,
}

impl Annotator {
    pub fn new(style: AnnotationStyle, font: Option<FontVec>) -> Self {
        Self { style, font }
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Draw every block onto a copy of `image`; `image` itself is left untouched.
    ///
    /// Blocks must already be canonical (ordered and clamped).
    pub fn annotate(&self, image: &DynamicImage, blocks: &[RescaledBlock]) -> RgbaImage {
        let mut canvas = image.to_rgba8();

        for (idx, block) in blocks.iter().enumerate() {
            let index = idx + 1;
            let color = self.style.color_for(index);
            draw_outline(&mut canvas, block.pixel(), self.style.line_width, color);

            if let Some(ref font) = self.font {
                let label = label_for(index, block.text(), self.style.label_chars);
                self.draw_label(&mut canvas, font, block.pixel(), &label, color);
            }
        }

        debug!("Annotated {} blocks", blocks.len());
        canvas
    }

    fn draw_label(
        &self,
        canvas: &mut RgbaImage,
        font: &FontVec,
        pb: PixelBox,
        label: &str,
        color: Rgba<u8>,
    ) {
        let scale = PxScale::from(self.style.font_size);
        let (tw, th) = text_size(scale, font, label);
        let x = pb.x1 as i32 + self.style.label_offset;
        let y = pb.y1 as i32 + self.style.label_offset;

        let tag = Rect::at(x, y).of_size(tw.max(1) + 4, th.max(1) + 4);
        draw_filled_rect_mut(canvas, tag, color);
        draw_text_mut(canvas, self.style.label_color, x + 2, y + 2, scale, font, label);
    }
}

/// Outline `pb` with `width` nested one-pixel rectangles, growing inward.
fn draw_outline(canvas: &mut RgbaImage, pb: PixelBox, width: u32, color: Rgba<u8>) {
    let (x1, y1, x2, y2) = (
        i64::from(pb.x1),
        i64::from(pb.y1),
        i64::from(pb.x2),
        i64::from(pb.y2),
    );
    for i in 0..i64::from(width.max(1)) {
        let (left, top, right, bottom) = (x1 + i, y1 + i, x2 - i, y2 - i);
        if left > right || top > bottom {
            break;
        }
        let rect = Rect::at(left as i32, top as i32)
            .of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Encode as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(ImageError::Encode)?;
    Ok(buf)
}

/// Encode as a `data:image/png;base64,...` URI for inline display.
pub fn png_data_uri(image: &RgbaImage) -> Result<String, ImageError> {
    let png = encode_png(image)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}
