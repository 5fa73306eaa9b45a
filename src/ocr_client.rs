//! Chat-completions client for the HunyuanOCR endpoint.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Failures talking to the OCR endpoint. Never retried.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    Request(String),
    #[error("OCR request failed: endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("OCR request failed: malformed response: {0}")]
    Decode(String),
}

/// Anything that can turn an image into OCR text.
#[async_trait::async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image_url: &str, prompt: &str) -> Result<String, OcrError>;
}

/// Timeouts for the OCR call. Inference on dense pages is slow.
#[derive(Debug, Clone, Copy)]
pub struct OcrTimeouts {
    pub connect: Duration,
    pub total: Duration,
}

impl Default for OcrTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            total: Duration::from_secs(120),
        }
    }
}

/// OpenAI-compatible `/chat/completions` OCR client.
#[derive(Clone)]
pub struct ChatCompletionsOcr {
    client: Client,
    endpoint: String,
    model: String,
}

impl ChatCompletionsOcr {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeouts: OcrTimeouts,
    ) -> Result<Self, OcrError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.total)
            .build()
            .map_err(|e| OcrError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn build_request(&self, image_url: &str, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user_with_image(image_url, prompt)],
            temperature: 0.0,
            top_k: 1,
            // Keeps dense pages from looping on the same line.
            repetition_penalty: 1.2,
            max_tokens: 8192,
        }
    }
}

#[async_trait::async_trait]
impl TextRecognizer for ChatCompletionsOcr {
    async fn recognize(&self, image_url: &str, prompt: &str) -> Result<String, OcrError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let request = self.build_request(image_url, prompt);
        info!("Calling OCR endpoint: model={}", request.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| OcrError::Request(e.to_string()))?;
        debug!(
            "OCR raw response ({} bytes): {}",
            raw.len(),
            raw.chars().take(500).collect::<String>()
        );
        content_of(&raw)
    }
}

/// `choices[0].message.content`, or an empty string when the model said nothing.
fn content_of(raw: &str) -> Result<String, OcrError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(raw).map_err(|e| OcrError::Decode(e.to_string()))?;

    if let Some(usage) = response.usage {
        info!(
            "OCR response: {} tokens (prompt: {}, completion: {})",
            usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
        );
    }

    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    top_k: u32,
    repetition_penalty: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    ImageUrl { image_url: ImageUrl },
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
struct ImageUrl {
    url: String,
}

impl Message {
    /// User turn with the image first and the instruction after it.
    fn user_with_image(image_url: &str, prompt: &str) -> Self {
        Self {
            role: "user",
            content: vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.to_string(),
                    },
                },
                ContentPart::Text {
                    text: prompt.to_string(),
                },
            ],
        }
    }
}
