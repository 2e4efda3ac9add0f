//! Error types for omx-vision
//!
//! Two layers: `TrainError` is the library-level taxonomy for everything
//! that can go wrong against the remote training service, and `ApiError`
//! adapts failures to HTTP responses on the webhook surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for training-lifecycle operations
pub type Result<T> = std::result::Result<T, TrainError>;

/// Training-lifecycle errors
#[derive(Debug, Error)]
pub enum TrainError {
    /// Remote service returned a non-2xx response
    #[error("remote request failed with status {status}: {body}")]
    RemoteRequest { status: u16, body: String },

    /// Remote object no longer exists (tolerated during cleanup)
    #[error("not found: {0}")]
    NotFound(String),

    /// An expected at-least-one-result list was empty
    #[error("empty result: {0}")]
    EmptyResult(String),

    /// Poll budget exhausted before the iteration completed
    #[error("training did not complete after {attempts} polls")]
    TrainingTimeout { attempts: u32 },

    /// Remote service reported the iteration as failed
    #[error("training failed for iteration {iteration_id} (status {status})")]
    TrainingFailed { iteration_id: String, status: String },

    /// Network-level failure (connect, timeout, TLS)
    #[error("network error: {0}")]
    Network(String),

    /// Failed to decode a remote response body
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// Image decode or variant generation error
    #[error("image error: {0}")]
    Image(String),
}

impl TrainError {
    /// True for failures that idempotent cleanup paths swallow.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TrainError::NotFound(_))
    }
}

/// Webhook-surface error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request payload (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<TrainError> for ApiError {
    fn from(err: TrainError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for webhook handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
