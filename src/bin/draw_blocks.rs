//! draw-blocks - draw boxes from a detection JSON file onto an image.
//!
//! ```text
//! draw-blocks shelf.jpg detections.json
//! draw-blocks -i shelf.jpg -j detections.json -o out.png --line-width 6
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use ocr_visualizer::annotate::{load_font, AnnotationStyle, Annotator};
use ocr_visualizer::blocks::RescaledBlock;
use ocr_visualizer::coords::{CoordRange, HUNYUAN_COORD_RANGE};
use ocr_visualizer::rescale::{rescale_blocks, RescaleConfig};
use ocr_visualizer::{detections, image_io};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const JPEG_QUALITY: u8 = 95;

#[derive(Parser, Debug)]
#[command(name = "draw-blocks")]
#[command(about = "Draw detection boxes from a JSON file onto an image")]
struct Args {
    /// Image file
    #[arg(value_name = "IMAGE")]
    image_pos: Option<PathBuf>,

    /// Detection JSON file
    #[arg(value_name = "JSON")]
    json_pos: Option<PathBuf>,

    /// Image file (overrides the positional argument)
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Detection JSON file (overrides the positional argument)
    #[arg(short, long)]
    json: Option<PathBuf>,

    /// Output path (default: <image stem>_annotated.jpg next to the image)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Range the box coordinates are normalized to
    #[arg(long, default_value_t = HUNYUAN_COORD_RANGE)]
    range: f64,

    /// Treat coordinates as pixels of a possibly downscaled image
    #[arg(long)]
    detect_scale: bool,

    /// Box outline width in pixels
    #[arg(long, default_value_t = 4)]
    line_width: u32,
}

impl Args {
    /// Resolve image and JSON paths; flags win over positionals.
    fn inputs(&self) -> std::result::Result<(PathBuf, PathBuf), &'static str> {
        let image = self.image.as_ref().or(self.image_pos.as_ref());
        let json = self.json.as_ref().or(self.json_pos.as_ref());
        match (image, json) {
            (None, _) => Err("Image file is required (IMAGE or --image)"),
            (_, None) => Err("JSON file is required (JSON or --json)"),
            (Some(image), Some(json)) => Ok((image.clone(), json.clone())),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ocr_visualizer=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let (image, json) = match args.inputs() {
        Ok(paths) => paths,
        Err(msg) => Args::command()
            .error(ErrorKind::MissingRequiredArgument, msg)
            .exit(),
    };

    match run(&args, &image, &json) {
        Ok(output) => {
            println!("\nSuccess! Annotated image saved to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args, image_path: &Path, json_path: &Path) -> Result<PathBuf> {
    if !image_path.is_file() {
        bail!("Image not found: {}", image_path.display());
    }
    if !json_path.is_file() {
        bail!("JSON file not found: {}", json_path.display());
    }

    let json = std::fs::read_to_string(json_path)
        .with_context(|| format!("Failed to read {}", json_path.display()))?;
    let blocks = detections::load(&json)
        .with_context(|| format!("Failed to load detections from {}", json_path.display()))?;

    let bytes = std::fs::read(image_path)
        .with_context(|| format!("Failed to read {}", image_path.display()))?;
    let image = image_io::decode_oriented(&bytes)?;
    let dims = image_io::dimensions_of(&image)?;

    let range = CoordRange::new(args.range)?;
    let config = RescaleConfig {
        coord_range: (!args.detect_scale).then_some(range),
        ..RescaleConfig::default()
    };
    let batch = rescale_blocks(&blocks, dims, &config);

    println!("Image: {}", image_path.display());
    println!("Image dimensions: {}x{} pixels", dims.width(), dims.height());
    if let Some(range) = config.coord_range {
        println!("Normalized coordinate range: 0-{}", range.get());
    }
    let (sx, sy) = batch.scale;
    println!("Coordinate space: {}", batch.space);
    println!("Scale factors: x={:.3}, y={:.3}", sx, sy);
    println!("Total blocks: {}", batch.blocks.len());
    print_summary(&batch.blocks);

    let style = AnnotationStyle {
        line_width: args.line_width,
        ..AnnotationStyle::cli()
    };
    let font_path = std::env::var_os("HY_OCR_FONT").map(PathBuf::from);
    let annotator = Annotator::new(style, load_font(font_path.as_deref()));
    let canvas = annotator.annotate(&image, &batch.blocks);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(image_path));
    save(canvas, &output)?;

    println!("\nSaved annotated image to: {}", output.display());
    println!("Total blocks drawn: {}", batch.blocks.len());
    Ok(output)
}

/// First five and last two blocks, with an elision line between.
fn print_summary(blocks: &[RescaledBlock]) {
    println!("\nDrawing blocks:");
    let total = blocks.len();
    for (i, block) in blocks.iter().enumerate() {
        let idx = i + 1;
        if idx <= 5 || idx + 2 > total {
            let n = block.normalized();
            let p = block.pixel();
            println!("  Block {}: {}", idx, block.text());
            println!("    Normalized: ({},{}) → ({},{})", n.x1, n.y1, n.x2, n.y2);
            println!(
                "    Pixel:      ({},{}) → ({},{}) [{}x{}px]",
                p.x1,
                p.y1,
                p.x2,
                p.y2,
                p.width(),
                p.height()
            );
        } else if idx == 6 {
            println!("  ... ({} more blocks) ...", total - 7);
        }
    }
}

fn default_output_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    image.with_file_name(format!("{}_annotated.jpg", stem))
}

fn save(canvas: RgbaImage, output: &Path) -> Result<()> {
    let format = ImageFormat::from_path(output)
        .with_context(|| format!("Unsupported output format: {}", output.display()))?;
    debug!("Saving {:?} to {}", format, output.display());

    match format {
        ImageFormat::Jpeg => {
            let file = File::create(output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
            JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY).encode_image(&rgb)?;
        }
        ImageFormat::Png => canvas.save(output)?,
        _ => DynamicImage::ImageRgba8(canvas).to_rgb8().save(output)?,
    }
    Ok(())
}
