//! Request-level errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    /// The OCR endpoint failed; reported as a gateway error.
    #[error("{message}")]
    Upstream { message: String, steps: Vec<String> },
    #[error("{message}")]
    Internal { message: String, steps: Vec<String> },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn steps(&self) -> &[String] {
        match self {
            Self::BadRequest(_) => &[],
            Self::Upstream { steps, .. } | Self::Internal { steps, .. } => steps,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string(), "steps": self.steps() });
        (self.status(), Json(body)).into_response()
    }
}
