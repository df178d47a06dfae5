// src/server/error.rs
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::utils::error::{ExtractError, LlmError, PdfError};

/// Errors returned by handlers, rendered as `{error, details, success: false}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request")]
    BadRequest(String),

    #[error("File too large")]
    PayloadTooLarge(String),

    #[error("Document could not be processed")]
    Unprocessable(String),

    #[error("LLM request failed")]
    Upstream(String),

    #[error("LLM not configured")]
    LlmUnavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::LlmUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn details(&self) -> String {
        match self {
            ApiError::BadRequest(d)
            | ApiError::PayloadTooLarge(d)
            | ApiError::Unprocessable(d)
            | ApiError::Upstream(d) => d.clone(),
            ApiError::LlmUnavailable => "Set ANTHROPIC_API_KEY or MISTRAL_API_KEY to enable LLM features".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}: {}", self, self.details());
        } else {
            tracing::warn!("{}: {}", self, self.details());
        }
        let body = serde_json::json!({
            "error": self.to_string(),
            "details": self.details(),
            "success": false,
        });
        (status, Json(body)).into_response()
    }
}

impl From<PdfError> for ApiError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::Empty | PdfError::NotPdf(_) => ApiError::BadRequest(err.to_string()),
            PdfError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            PdfError::Extraction(_) | PdfError::NoText => ApiError::Unprocessable(err.to_string()),
            PdfError::Ocr(_) | PdfError::Network(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}
