//! API error types with structured JSON responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::PipelineError;
use crate::store::StoreError;
use crate::vcs::{SyncError, SyncStep};

/// Challenge sent with every 401.
pub const BASIC_AUTH_CHALLENGE: &str = r#"Basic realm="api""#;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<SyncStep>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync failed at {step}: {message}")]
    SyncFailed { step: SyncStep, message: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, step) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Unauthorized".to_string(),
                None,
            ),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone(), None)
            }
            ApiError::Config(detail) => {
                tracing::error!(detail, "Configuration error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    detail.clone(),
                    None,
                )
            }
            ApiError::SyncFailed { step, message } => (
                StatusCode::BAD_GATEWAY,
                "SYNC_FAILED",
                message.clone(),
                Some(*step),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                step,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::Unauthorized = &self {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BASIC_AUTH_CHALLENGE),
            );
        }
        response
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        tracing::error!(step = %err.step, error = %err, "Sync failed");
        ApiError::SyncFailed {
            step: err.step,
            message: err.summary(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::Config(_) => ApiError::Config(message),
            PipelineError::Render(_) | PipelineError::Task(_) => ApiError::Internal(message),
            PipelineError::Sync {
                written, source, ..
            } => {
                tracing::error!(step = %source.step, written, error = %source, "Sync failed after render");
                ApiError::SyncFailed {
                    step: source.step,
                    message: format!("Rendered {written} document(s), then {}", source.summary()),
                }
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Request task failed: {err}"))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
