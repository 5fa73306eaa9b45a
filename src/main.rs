//! OCR Visualizer - web UI for coordinate-tagged OCR output.

use std::sync::Arc;

use ocr_visualizer::annotate::{load_font, AnnotationStyle, Annotator};
use ocr_visualizer::config::AppConfig;
use ocr_visualizer::image_io::HttpImageSource;
use ocr_visualizer::ocr_client::ChatCompletionsOcr;
use ocr_visualizer::pipeline::Pipeline;
use ocr_visualizer::server::{router, AppState};
use ocr_visualizer::settings::SettingsStore;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ocr_visualizer=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    info!("OCR endpoint: {} (model {})", config.endpoint, config.model);
    info!("{}", config.coord_description());

    // Initialize clients
    let recognizer = ChatCompletionsOcr::new(&config.endpoint, &config.model, config.ocr_timeouts)?;
    let images = HttpImageSource::new(config.image_timeout)?;
    let annotator = Annotator::new(AnnotationStyle::web(), load_font(config.font_path.as_deref()));

    // Build application state
    let state = AppState {
        pipeline: Arc::new(Pipeline::new(
            config.clone(),
            Arc::new(recognizer),
            Arc::new(images),
            Arc::new(annotator),
        )),
        settings: Arc::new(SettingsStore::new(config.settings_path.clone())),
        config: config.clone(),
    };
    info!("Settings file: {:?}", state.settings.path());

    // Run server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}
