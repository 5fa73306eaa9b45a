//! Parser for `TEXT(x1,y1),(x2,y2)` entries in OCR model output.
//!
//! Parsing is lossy on purpose: anything that does not match the entry shape is
//! skipped without error, and a blob with no entries yields nothing. Labels that
//! themselves contain parentheses are not supported; only the run after the last
//! `)` before the coordinates is captured.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::blocks::{BBox, TextBlock};

const NUMBER: &str = r"([-+]?\d+(?:\.\d+)?)";

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"([^()]+?)\({NUMBER},{NUMBER}\),\({NUMBER},{NUMBER}\)");
    Regex::new(&pattern).expect("entry pattern compiles")
});

/// Lazily yield every entry in `content`, in order of appearance.
pub fn parse_blocks(content: &str) -> impl Iterator<Item = TextBlock> + '_ {
    ENTRY.captures_iter(content).filter_map(|cap| to_block(&cap))
}

fn to_block(cap: &Captures<'_>) -> Option<TextBlock> {
    let coord = |i: usize| cap.get(i)?.as_str().parse::<f64>().ok();
    let bbox = BBox::new(coord(2)?, coord(3)?, coord(4)?, coord(5)?);
    Some(TextBlock::new(cap.get(1)?.as_str().trim(), bbox))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entries() {
        assert_eq!(parse_blocks("").count(), 0);
        assert_eq!(parse_blocks("just some prose, no boxes").count(), 0);
        assert_eq!(parse_blocks("broken(1,2),(3").count(), 0);
    }

    #[test]
    fn test_single_entry() {
        let blocks: Vec<_> = parse_blocks("hello(1,2),(3,4)").collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "hello");
        assert_eq!(blocks[0].bbox(), BBox::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_entries_keep_order_and_are_trimmed() {
        let content = "  Title (10,20),(300,40)\n第二行(5,50),(600,80)\nfoot(1,900),(999,990)";
        let texts: Vec<String> = parse_blocks(content)
            .map(|b| b.text().to_string())
            .collect();
        assert_eq!(texts, vec!["Title", "第二行", "foot"]);
    }

    #[test]
    fn test_signed_and_fractional_numbers() {
        let blocks: Vec<_> = parse_blocks("a(-1.5,+2),(0.25,1000)").collect();
        assert_eq!(blocks[0].bbox(), BBox::new(-1.5, 2.0, 0.25, 1000.0));
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let content = "good(1,2),(3,4) bad(1,2) (x,y),(z,w) also(5,6),(7,8) trailing(9,";
        let texts: Vec<String> = parse_blocks(content)
            .map(|b| b.text().to_string())
            .collect();
        assert_eq!(texts, vec!["good", "also"]);
    }

    #[test]
    fn test_parenthesized_label_loses_prefix() {
        let blocks: Vec<_> = parse_blocks("a (b) c(1,2),(3,4)").collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "c");
    }
}
