//! Image fetching, EXIF-aware decoding and header-only dimension probing.

use std::io::Cursor;
use std::time::Duration;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use thiserror::Error;
use tracing::{debug, info};

use crate::blocks::ImageDimensions;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to fetch image: {0}")]
    Fetch(String),
    #[error("image request returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),
    #[error("image has zero width or height")]
    Empty,
}

/// Where source images come from.
#[async_trait::async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError>;
}

/// Downloads images over HTTP with a bounded timeout.
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImageError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        info!("Fetching image {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::Fetch(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ImageError::Status { status, body });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ImageError::Fetch(e.to_string()))?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

/// Decode `bytes` and rotate/flip according to the EXIF orientation tag, so
/// that dimensions and pixels match what a viewer displays.
pub fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(e.into()))?;
    let mut decoder = reader.into_decoder().map_err(ImageError::Decode)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder).map_err(ImageError::Decode)?;
    if orientation != Orientation::NoTransforms {
        debug!("Applying EXIF orientation {:?}", orientation);
        image.apply_orientation(orientation);
    }
    Ok(image)
}

/// Dimensions of a decoded image.
pub fn dimensions_of(image: &DynamicImage) -> Result<ImageDimensions, ImageError> {
    ImageDimensions::new(image.width(), image.height()).map_err(|_| ImageError::Empty)
}

/// Read dimensions from the header of a PNG, JPEG, GIF or BMP without decoding
/// pixels, falling back to the `image` crate's header reader for other formats.
///
/// EXIF orientation is not applied.
pub fn probe_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    let (w, h) = sniff_header(bytes).or_else(|| {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    })?;
    ImageDimensions::new(w, h).ok()
}

fn sniff_header(data: &[u8]) -> Option<(u32, u32)> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some((be_u32(data, 16)?, be_u32(data, 20)?));
    }
    if data.starts_with(&[0xff, 0xd8]) {
        return sniff_jpeg(data);
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some((u32::from(le_u16(data, 6)?), u32::from(le_u16(data, 8)?)));
    }
    if data.starts_with(b"BM") {
        // Negative height marks a top-down bitmap.
        let w = le_u32(data, 18)? as i32;
        let h = le_u32(data, 22)? as i32;
        return Some((w.unsigned_abs(), h.unsigned_abs()));
    }
    None
}

/// Walk JPEG segments up to the first baseline or progressive frame header.
fn sniff_jpeg(data: &[u8]) -> Option<(u32, u32)> {
    let mut idx = 2;
    while idx < data.len() {
        if data[idx] != 0xff {
            idx += 1;
            continue;
        }
        let marker = *data.get(idx + 1)?;
        match marker {
            0xd9 => return None,
            0xc0 | 0xc2 => {
                let h = be_u16(data, idx + 5)?;
                let w = be_u16(data, idx + 7)?;
                return Some((u32::from(w), u32::from(h)));
            }
            0x01 | 0xd0..=0xd8 => idx += 2,
            _ => idx += 2 + usize::from(be_u16(data, idx + 2)?),
        }
    }
    None
}

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn le_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(at..at + 4)?.try_into().ok()?))
}
