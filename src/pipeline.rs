//! OCR-and-annotate request pipeline.
//!
//! One call does: OCR → parse → fetch image → rescale → draw → encode. Every
//! request is self-contained; the only shared pieces are immutable (config,
//! clients, annotator). Image problems degrade the response instead of
//! failing it: without a decodable image the blocks keep their model
//! coordinates only.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::annotate::{self, Annotator};
use crate::blocks::{BBox, ImageDimensions, PixelBox, TextBlock};
use crate::config::AppConfig;
use crate::coords::CoordRange;
use crate::error::AppError;
use crate::image_io::{self, ImageSource};
use crate::ocr_client::TextRecognizer;
use crate::parser::parse_blocks;
use crate::report;
use crate::rescale::{self, RescaleConfig, RescaledBatch};

/// Box corners plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxMetrics<T> {
    pub x1: T,
    pub y1: T,
    pub x2: T,
    pub y2: T,
    pub width: T,
    pub height: T,
}

impl From<BBox> for BoxMetrics<f64> {
    fn from(b: BBox) -> Self {
        Self {
            x1: b.x1,
            y1: b.y1,
            x2: b.x2,
            y2: b.y2,
            width: b.width(),
            height: b.height(),
        }
    }
}

impl From<PixelBox> for BoxMetrics<u32> {
    fn from(b: PixelBox) -> Self {
        Self {
            x1: b.x1,
            y1: b.y1,
            x2: b.x2,
            y2: b.y2,
            width: b.width(),
            height: b.height(),
        }
    }
}

/// Coordinates repeated at the top level of a block for older clients:
/// pixel when known, model coordinates otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrimaryBox {
    Pixel(BoxMetrics<u32>),
    Normalized(BoxMetrics<f64>),
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockReport {
    /// 1-based display index.
    pub index: usize,
    pub text: String,
    pub color: String,
    pub normalized: BoxMetrics<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel: Option<BoxMetrics<u32>>,
    #[serde(flatten)]
    pub primary: PrimaryBox,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordInfo {
    pub normalized_range: Option<CoordRange>,
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    /// Coordinate space detected for this response, when an image was available.
    pub convention: Option<&'static str>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrResponse {
    pub raw_text: String,
    pub blocks: Vec<BlockReport>,
    pub image_with_boxes: Option<String>,
    pub image_size: Option<ImageDimensions>,
    pub coord_info: CoordInfo,
    pub steps: Vec<String>,
    pub endpoint: String,
    pub model: String,
}

/// What could be derived from the fetched image bytes.
#[derive(Default)]
struct Rendered {
    dims: Option<ImageDimensions>,
    batch: Option<RescaledBatch>,
    image: Option<String>,
    steps: Vec<String>,
}

pub struct Pipeline {
    config: Arc<AppConfig>,
    recognizer: Arc<dyn TextRecognizer>,
    images: Arc<dyn ImageSource>,
    annotator: Arc<Annotator>,
}

impl Pipeline {
    pub fn new(
        config: Arc<AppConfig>,
        recognizer: Arc<dyn TextRecognizer>,
        images: Arc<dyn ImageSource>,
        annotator: Arc<Annotator>,
    ) -> Self {
        Self {
            config,
            recognizer,
            images,
            annotator,
        }
    }

    /// Run OCR on `image_url` and build the annotated response.
    pub async fn run(&self, image_url: &str, prompt: &str) -> Result<OcrResponse, AppError> {
        let span = info_span!("ocr_request", request_id = %Uuid::new_v4());
        self.run_inner(image_url, prompt).instrument(span).await
    }

    async fn run_inner(&self, image_url: &str, prompt: &str) -> Result<OcrResponse, AppError> {
        info!("OCR request for {}", image_url);
        let mut steps = vec!["Received request".to_string()];

        steps.push("Calling OCR endpoint".to_string());
        let raw_text = match self.recognizer.recognize(image_url, prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!("{}", e);
                return Err(AppError::Upstream {
                    message: e.to_string(),
                    steps,
                });
            }
        };

        steps.push("Parsing OCR response".to_string());
        let blocks: Vec<TextBlock> = parse_blocks(&raw_text).collect();
        info!("Parsed {} text blocks", blocks.len());

        let mut rendered = Rendered::default();
        if !blocks.is_empty() {
            steps.push("Fetching image for dimension analysis".to_string());
            match self.images.fetch(image_url).await {
                Ok(bytes) => {
                    rendered = self.render(bytes, blocks.clone(), &steps).await?;
                    steps.append(&mut rendered.steps);
                }
                Err(e) => {
                    warn!("Falling back to model coordinates: {}", e);
                    steps.push(format!("Warning: Could not fetch image - {}", e));
                }
            }
        }
        steps.push("Done".to_string());

        debug!(
            "\n{}",
            report::format_coordinate_info(&blocks, rendered.dims.zip(rendered.batch.as_ref()))
        );

        Ok(self.build_response(raw_text, &blocks, rendered, steps))
    }

    /// Decode, rescale and draw off the async executor.
    async fn render(
        &self,
        bytes: Vec<u8>,
        blocks: Vec<TextBlock>,
        steps: &[String],
    ) -> Result<Rendered, AppError> {
        let annotator = Arc::clone(&self.annotator);
        let rescale_config = self.config.rescale;

        tokio::task::spawn_blocking(move || {
            render_blocking(&bytes, &blocks, &rescale_config, &annotator)
        })
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Rendering task failed: {}", e),
            steps: steps.to_vec(),
        })
    }

    fn build_response(
        &self,
        raw_text: String,
        blocks: &[TextBlock],
        rendered: Rendered,
        steps: Vec<String>,
    ) -> OcrResponse {
        let style = self.annotator.style();
        let color = |index: usize| annotate::to_hex(style.color_for(index));

        let reports: Vec<BlockReport> = match &rendered.batch {
            Some(batch) => batch
                .blocks
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    let pixel = BoxMetrics::from(b.pixel());
                    BlockReport {
                        index: i + 1,
                        text: b.text().to_string(),
                        color: color(i + 1),
                        normalized: b.normalized().into(),
                        pixel: Some(pixel),
                        primary: PrimaryBox::Pixel(pixel),
                    }
                })
                .collect(),
            None => blocks
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    let normalized = BoxMetrics::from(b.bbox());
                    BlockReport {
                        index: i + 1,
                        text: b.text().to_string(),
                        color: color(i + 1),
                        normalized,
                        pixel: None,
                        primary: PrimaryBox::Normalized(normalized),
                    }
                })
                .collect(),
        };

        // Factors applied to this batch, whichever space it resolved to.
        let scale = rendered.batch.as_ref().map(|b| b.scale);

        OcrResponse {
            raw_text,
            blocks: reports,
            image_with_boxes: rendered.image,
            image_size: rendered.dims,
            coord_info: CoordInfo {
                normalized_range: self.config.rescale.coord_range,
                scale_x: scale.map(|s| s.0),
                scale_y: scale.map(|s| s.1),
                convention: rendered.batch.as_ref().map(|b| b.space),
                description: self.config.coord_description(),
            },
            steps,
            endpoint: self.config.endpoint.clone(),
            model: self.config.model.clone(),
        }
    }
}

fn render_blocking(
    bytes: &[u8],
    blocks: &[TextBlock],
    rescale_config: &RescaleConfig,
    annotator: &Annotator,
) -> Rendered {
    let decoded = image_io::decode_oriented(bytes)
        .and_then(|image| Ok((image_io::dimensions_of(&image)?, image)));

    match decoded {
        Ok((dims, image)) => {
            let batch = rescale::rescale_blocks(blocks, dims, rescale_config);
            let mut steps = vec!["Rendering bounding boxes".to_string()];
            let canvas = annotator.annotate(&image, &batch.blocks);
            let image = match annotate::png_data_uri(&canvas) {
                Ok(uri) => Some(uri),
                Err(e) => {
                    warn!("{}", e);
                    steps.push(format!("Warning: Could not encode annotated image - {}", e));
                    None
                }
            };
            Rendered {
                dims: Some(dims),
                batch: Some(batch),
                image,
                steps,
            }
        }
        Err(e) => match image_io::probe_dimensions(bytes) {
            Some(dims) => {
                warn!("Decode failed, using header dimensions: {}", e);
                Rendered {
                    dims: Some(dims),
                    batch: Some(rescale::rescale_blocks(blocks, dims, rescale_config)),
                    image: None,
                    steps: vec![format!(
                        "Warning: Could not decode image - {}; using header dimensions",
                        e
                    )],
                }
            }
            None => {
                warn!("Falling back to model coordinates: {}", e);
                Rendered {
                    steps: vec![format!("Warning: Could not fetch image - {}", e)],
                    ..Rendered::default()
                }
            }
        },
    }
}
