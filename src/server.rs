//! HTTP surface: the single-page UI, settings, and the OCR endpoint.

use std::sync::{Arc, LazyLock};

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::pipeline::{OcrResponse, Pipeline};
use crate::settings::{Settings, SettingsStore};

const PAGE_TEMPLATE: &str = include_str!("page.html");

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern compiles"));

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<Pipeline>,
    pub settings: Arc<SettingsStore>,
}

impl AppState {
    /// Load settings off the async runtime.
    async fn read_settings(&self) -> Settings {
        let store = self.settings.clone();
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(settings) => settings,
            Err(e) => {
                error!("Settings load task failed: {}", e);
                Settings::default()
            }
        }
    }

    /// Save settings off the async runtime.
    async fn write_settings(&self, settings: Settings) -> anyhow::Result<()> {
        let store = self.settings.clone();
        tokio::task::spawn_blocking(move || store.save(&settings)).await?
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/settings", get(get_settings).post(save_settings))
        .route("/api/ocr", post(run_ocr))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Main page, prefilled with the last-used settings.
async fn index(State(state): State<AppState>) -> Html<String> {
    let saved = state.read_settings().await;
    Html(render_page(&state.config, &saved))
}

async fn health() -> &'static str {
    "ok"
}

async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.read_settings().await)
}

async fn save_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> (StatusCode, Json<Value>) {
    match state.write_settings(settings).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(e) => {
            error!("{:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct OcrRequest {
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    prompt: Option<String>,
}

/// Run OCR on an image URL and return blocks plus the annotated image.
async fn run_ocr(
    State(state): State<AppState>,
    Json(request): Json<OcrRequest>,
) -> Result<Json<OcrResponse>, AppError> {
    let image_url = request.image_url.trim();
    if image_url.is_empty() {
        return Err(AppError::BadRequest("image_url is required".to_string()));
    }
    let prompt = match request.prompt.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => state.config.default_prompt.clone(),
    };

    // Remember the inputs even if OCR fails.
    let settings = Settings {
        image_url: image_url.to_string(),
        prompt: prompt.clone(),
    };
    if let Err(e) = state.write_settings(settings).await {
        warn!("Could not save settings: {:#}", e);
    }

    let response = state.pipeline.run(image_url, &prompt).await?;
    info!(
        "OCR complete: {} blocks, annotated={}",
        response.blocks.len(),
        response.image_with_boxes.is_some()
    );
    Ok(Json(response))
}

// ============================================================================
// Page rendering
// ============================================================================

/// Fill the template's `{{name}}` placeholders in a single pass, so
/// substituted values are never scanned for further placeholders.
fn render_page(config: &AppConfig, saved: &Settings) -> String {
    let image_url = non_empty_or(&saved.image_url, &config.sample_image_url);
    let prompt = non_empty_or(&saved.prompt, &config.default_prompt);

    PLACEHOLDER
        .replace_all(PAGE_TEMPLATE, |caps: &Captures| match &caps[1] {
            "endpoint" => escape_html(&config.endpoint),
            "model" => escape_html(&config.model),
            "image_url" => escape_html(image_url),
            "prompt" => escape_html(prompt),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{AnnotationStyle, Annotator};
    use crate::image_io::{ImageError, ImageSource};
    use crate::ocr_client::{OcrError, TextRecognizer};

    /// Echoes the prompt back as recognized text.
    struct EchoOcr;

    #[async_trait::async_trait]
    impl TextRecognizer for EchoOcr {
        async fn recognize(&self, _image_url: &str, prompt: &str) -> Result<String, OcrError> {
            Ok(prompt.to_string())
        }
    }

    struct NoImages;

    #[async_trait::async_trait]
    impl ImageSource for NoImages {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, ImageError> {
            Err(ImageError::Empty)
        }
    }

    fn state(dir: &tempfile::TempDir) -> AppState {
        let config = Arc::new(AppConfig {
            settings_path: dir.path().join("settings.json"),
            ..AppConfig::default()
        });
        let pipeline = Pipeline::new(
            config.clone(),
            Arc::new(EchoOcr),
            Arc::new(NoImages),
            Arc::new(Annotator::new(AnnotationStyle::web(), None)),
        );
        AppState {
            settings: Arc::new(SettingsStore::new(config.settings_path.clone())),
            config,
            pipeline: Arc::new(pipeline),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_page_uses_saved_settings_escaped() {
        let config = AppConfig::default();
        let saved = Settings {
            image_url: "https://x.test/a.png?q=1&r=2".to_string(),
            prompt: "</textarea><script>".to_string(),
        };
        let page = render_page(&config, &saved);

        assert!(page.contains(r#"value="https://x.test/a.png?q=1&amp;r=2""#));
        assert!(page.contains("&lt;/textarea&gt;&lt;script&gt;"));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn test_page_keeps_placeholder_text_inside_values() {
        let config = AppConfig::default();
        let saved = Settings {
            image_url: "https://x.test/{{prompt}}.png".to_string(),
            prompt: "read {{image_url}}".to_string(),
        };
        let page = render_page(&config, &saved);

        assert!(page.contains(r#"value="https://x.test/{{prompt}}.png""#));
        assert!(page.contains(">read {{image_url}}</textarea>"));
    }

    #[test]
    fn test_page_falls_back_to_configured_defaults() {
        let config = AppConfig::default();
        let page = render_page(&config, &Settings::default());
        assert!(page.contains(&escape_html(&config.sample_image_url)));
        assert!(page.contains(&escape_html(&config.default_prompt)));
    }

    #[tokio::test]
    async fn test_blank_image_url_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let request = OcrRequest {
            image_url: "   ".to_string(),
            prompt: None,
        };
        let err = run_ocr(State(state.clone()), Json(request)).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "image_url is required");
        assert!(!state.settings.path().exists());
    }

    #[tokio::test]
    async fn test_run_ocr_saves_settings_with_default_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let request = OcrRequest {
            image_url: " https://x.test/a.png ".to_string(),
            prompt: Some(String::new()),
        };
        let Json(response) = run_ocr(State(state.clone()), Json(request)).await.unwrap();

        // The echoed default prompt carries no coordinates.
        assert_eq!(response.raw_text, state.config.default_prompt);
        assert!(response.blocks.is_empty());

        let saved = state.settings.load();
        assert_eq!(saved.image_url, "https://x.test/a.png");
        assert_eq!(saved.prompt, state.config.default_prompt);
    }

    #[tokio::test]
    async fn test_run_ocr_without_image_keeps_normalized_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let request = OcrRequest {
            image_url: "https://x.test/a.png".to_string(),
            prompt: Some("Total(10,20),(30,40)".to_string()),
        };
        let Json(response) = run_ocr(State(state(&dir)), Json(request)).await.unwrap();

        assert_eq!(response.blocks.len(), 1);
        assert!(response.blocks[0].pixel.is_none());
        assert!(response.image_with_boxes.is_none());
    }

    #[tokio::test]
    async fn test_settings_round_trip_through_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let settings = Settings {
            image_url: "u".to_string(),
            prompt: "p".to_string(),
        };

        let (status, Json(body)) =
            save_settings(State(state.clone()), Json(settings.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let Json(loaded) = get_settings(State(state)).await;
        assert_eq!(loaded, settings);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_through_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let state = state.clone();
                let settings = Settings {
                    image_url: format!("https://x.test/{}.png", i),
                    prompt: format!("prompt {}", i),
                };
                tokio::spawn(async move { save_settings(State(state), Json(settings)).await.0 })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::OK);
        }

        let Json(loaded) = get_settings(State(state)).await;
        assert!(loaded.image_url.starts_with("https://x.test/"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health().await, "ok");
    }
}
