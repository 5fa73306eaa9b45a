//! Plain-text coordinate report, for terminals and logs.

use std::fmt::Write as _;

use crate::blocks::{ImageDimensions, TextBlock};
use crate::rescale::RescaledBatch;

const RULE_WIDTH: usize = 80;

/// Table of blocks with their model boxes and, once rescaled against an
/// image, the pixel boxes and the factors that produced them.
pub fn format_coordinate_info(
    blocks: &[TextBlock],
    rescaled: Option<(ImageDimensions, &RescaledBatch)>,
) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    if let Some((dims, batch)) = rescaled {
        let (sx, sy) = batch.scale;
        let _ = writeln!(out, "Image dimensions: {} x {} pixels", dims.width(), dims.height());
        let _ = writeln!(out, "Scale factors: x={:.3}, y={:.3}", sx, sy);
        let _ = writeln!(out, "Coordinate space: {}", batch.space);
        out.push('\n');
    }

    let _ = writeln!(out, "Found {} text elements:", blocks.len());
    let _ = writeln!(out, "{}", rule);

    match rescaled {
        Some((_, batch)) => {
            let _ = writeln!(out, "{:>4}  {:<35}  {:<20}  Pixels", "No.", "Text", "Model");
            let _ = writeln!(out, "{}", rule);
            for (i, block) in batch.blocks.iter().enumerate() {
                let n = block.normalized();
                let p = block.pixel();
                let model = format!("({:.0},{:.0})→({:.0},{:.0})", n.x1, n.y1, n.x2, n.y2);
                let pixel = format!("({},{})→({},{})", p.x1, p.y1, p.x2, p.y2);
                let _ = writeln!(
                    out,
                    "{:>4}  {:<35}  {:<20}  {}",
                    i + 1,
                    truncate(block.text(), 35),
                    model,
                    pixel
                );
            }
        }
        None => {
            let _ = writeln!(out, "{:>4}  {:<40}  Coordinates (model space)", "No.", "Text");
            let _ = writeln!(out, "{}", rule);
            for (i, block) in blocks.iter().enumerate() {
                let b = block.bbox();
                let _ = writeln!(
                    out,
                    "{:>4}  {:<40}  ({:.0},{:.0}) → ({:.0},{:.0})",
                    i + 1,
                    truncate(block.text(), 40),
                    b.x1,
                    b.y1,
                    b.x2,
                    b.y2
                );
            }
        }
    }

    out.push_str(&rule);
    out
}

/// Keep `text` when it fits in `width` chars, else cut to `width - 2` and add `..`.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let mut cut: String = text.chars().take(width.saturating_sub(2)).collect();
        cut.push_str("..");
        cut
    } else {
        text.to_string()
    }
}
