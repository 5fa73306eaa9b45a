//! Process-wide configuration.
//!
//! Loaded once at startup from the environment (after `.env` has been applied)
//! and handed to components explicitly. Nothing reads the environment later.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::coords::CoordRange;
use crate::ocr_client::OcrTimeouts;
use crate::rescale::{RescaleConfig, DEFAULT_UPSCALE_THRESHOLD};

const DEFAULT_ENDPOINT: &str = "https://hunyuan-ocr.ashybay-2b080a17.japaneast.azurecontainerapps.io/v1";
const DEFAULT_MODEL: &str = "/app/models/HunyuanOCR";
const DEFAULT_PROMPT: &str =
    "Detect and recognize text in the image, and output the text coordinates in a formatted manner.";
const DEFAULT_SAMPLE_IMAGE: &str = "https://ev-cuhk.net/tmp/t01.jpg";
const DEFAULT_SETTINGS_FILE: &str = "ocr_settings.json";
const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the OpenAI-compatible OCR endpoint (without `/chat/completions`).
    pub endpoint: String,
    pub model: String,
    pub default_prompt: String,
    pub sample_image_url: String,
    pub rescale: RescaleConfig,
    pub settings_path: PathBuf,
    pub font_path: Option<PathBuf>,
    pub port: u16,
    pub ocr_timeouts: OcrTimeouts,
    pub image_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            default_prompt: DEFAULT_PROMPT.to_string(),
            sample_image_url: DEFAULT_SAMPLE_IMAGE.to_string(),
            rescale: RescaleConfig::default(),
            settings_path: PathBuf::from(DEFAULT_SETTINGS_FILE),
            font_path: None,
            port: DEFAULT_PORT,
            ocr_timeouts: OcrTimeouts::default(),
            image_timeout: Duration::from_secs(20),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("HY_OCR_ENDPOINT") {
            config.endpoint = v;
        }
        if let Some(v) = lookup("HY_OCR_MODEL") {
            config.model = v;
        }
        if let Some(v) = lookup("HY_OCR_PROMPT") {
            config.default_prompt = v;
        }
        if let Some(v) = lookup("HY_OCR_SAMPLE_IMAGE") {
            config.sample_image_url = v;
        }
        if let Some(v) = lookup("HY_OCR_COORD_RANGE") {
            config.rescale.coord_range = parse_coord_range(&v)
                .with_context(|| format!("Invalid HY_OCR_COORD_RANGE: {:?}", v))?;
        }
        if let Some(v) = lookup("HY_OCR_UPSCALE_THRESHOLD") {
            let threshold: f64 = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid HY_OCR_UPSCALE_THRESHOLD: {:?}", v))?;
            if !(threshold.is_finite() && threshold > 0.0) {
                anyhow::bail!("HY_OCR_UPSCALE_THRESHOLD must be positive, got {}", threshold);
            }
            config.rescale.upscale_threshold = threshold;
        }
        if let Some(v) = lookup("HY_OCR_SETTINGS_FILE") {
            config.settings_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("HY_OCR_FONT") {
            config.font_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PORT") {
            config.port = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT: {:?}", v))?;
        }

        Ok(config)
    }

    /// Human-readable description of the configured coordinate convention.
    pub fn coord_description(&self) -> String {
        match self.rescale.coord_range {
            Some(range) => format!(
                "HunyuanOCR outputs coordinates normalized to [0-{}] range",
                range.get()
            ),
            None => format!(
                "Coordinates treated as pixels of a possibly downscaled image (upscale threshold {})",
                self.rescale.upscale_threshold
            ),
        }
    }
}

/// `none`, `pixel` and `0` disable the fixed range.
fn parse_coord_range(value: &str) -> Result<Option<CoordRange>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" | "pixel" | "0" => Ok(None),
        other => {
            let range: f64 = other.parse()?;
            Ok(Some(CoordRange::new(range)?))
        }
    }
}
