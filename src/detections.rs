//! Detection files consumed by the `draw-blocks` tool.
//!
//! Accepted shapes:
//!
//! ```json
//! [{"label": "...", "box_2d": [x1, y1, x2, y2]}]
//! [{"label": "...", "x1": 0, "y1": 0, "x2": 100, "y2": 100}]
//! {"detections": [...]}   // also "compartments", "shelf_compartments", "blocks"
//! ```

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::blocks::{BBox, TextBlock};

/// Keys under which an object may hold the detection list, in lookup order.
pub const LIST_KEYS: [&str; 4] = ["detections", "compartments", "shelf_compartments", "blocks"];

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON dict must contain one of {keys:?}")]
    MissingListKey { keys: &'static [&'static str] },
    #[error("JSON must be a list or dict")]
    UnsupportedShape,
    #[error("detection {index} has neither box_2d nor x1/y1/x2/y2")]
    MissingBox { index: usize },
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    #[serde(default)]
    box_2d: Option<[f64; 4]>,
    #[serde(default)]
    x1: Option<f64>,
    #[serde(default)]
    y1: Option<f64>,
    #[serde(default)]
    x2: Option<f64>,
    #[serde(default)]
    y2: Option<f64>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl RawDetection {
    fn into_block(self, index: usize) -> Result<TextBlock, DetectionError> {
        let bbox = match self.box_2d {
            Some([x1, y1, x2, y2]) => BBox::new(x1, y1, x2, y2),
            None => match (self.x1, self.y1, self.x2, self.y2) {
                (Some(x1), Some(y1), Some(x2), Some(y2)) => BBox::new(x1, y1, x2, y2),
                _ => return Err(DetectionError::MissingBox { index }),
            },
        };
        let text = self.label.or(self.text).unwrap_or_default();
        Ok(TextBlock::new(text.trim(), bbox))
    }
}

/// Parse a detection file into blocks, in file order.
pub fn load(json: &str) -> Result<Vec<TextBlock>, DetectionError> {
    let value: Value = serde_json::from_str(json)?;

    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let key = LIST_KEYS
                .iter()
                .find(|k| map.contains_key(**k))
                .ok_or(DetectionError::MissingListKey { keys: &LIST_KEYS })?;
            match map.remove(*key) {
                Some(Value::Array(items)) => items,
                _ => return Err(DetectionError::UnsupportedShape),
            }
        }
        _ => return Err(DetectionError::UnsupportedShape),
    };

    list.into_iter()
        .enumerate()
        .map(|(i, item)| {
            let raw: RawDetection = serde_json::from_value(item)?;
            raw.into_block(i + 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_of_box_2d() {
        let blocks = load(r#"[{"label": "shelf A", "box_2d": [10, 20, 300, 400]}]"#).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "shelf A");
        assert_eq!(blocks[0].bbox(), BBox::new(10.0, 20.0, 300.0, 400.0));
    }

    #[test]
    fn test_separate_fields_without_label() {
        let blocks = load(r#"[{"x1": 1, "y1": 2.5, "x2": 3, "y2": 4}]"#).unwrap();
        assert_eq!(blocks[0].text(), "");
        assert_eq!(blocks[0].bbox(), BBox::new(1.0, 2.5, 3.0, 4.0));
    }

    #[test]
    fn test_dict_keys_in_order() {
        let json = r#"{
            "shelf_compartments": [{"box_2d": [0, 0, 1, 1]}],
            "compartments": [{"box_2d": [5, 5, 6, 6]}, {"box_2d": [7, 7, 8, 8], "text": "t"}]
        }"#;
        let blocks = load(json).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].text(), "t");
    }

    #[test]
    fn test_unknown_dict_rejected() {
        let err = load(r#"{"items": []}"#).unwrap_err();
        assert!(matches!(err, DetectionError::MissingListKey { .. }));
        assert!(err.to_string().contains("detections"));
    }

    #[test]
    fn test_scalar_rejected() {
        assert!(matches!(load("42"), Err(DetectionError::UnsupportedShape)));
        assert!(matches!(
            load(r#"{"detections": 3}"#),
            Err(DetectionError::UnsupportedShape)
        ));
    }

    #[test]
    fn test_missing_box_reports_index() {
        let err = load(r#"[{"box_2d": [0,0,1,1]}, {"x1": 1, "y1": 2}]"#).unwrap_err();
        assert!(matches!(err, DetectionError::MissingBox { index: 2 }));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(load("[{"), Err(DetectionError::Json(_))));
    }
}
