//! OCR visualizer: parse coordinate-tagged OCR output, map boxes onto the
//! source image, and draw them.
//!
//! The `ocr-visualizer` binary serves a small web UI over an
//! OpenAI-compatible OCR endpoint; `draw-blocks` annotates an image from a
//! detection file on the command line.

pub mod annotate;
pub mod blocks;
pub mod config;
pub mod coords;
pub mod detections;
pub mod error;
pub mod image_io;
pub mod ocr_client;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod rescale;
pub mod server;
pub mod settings;
