//! Error types for ns-server
//!
//! Every failure leaves the server as a JSON body with a `message` field.
//! Validation failures add `errors: [{field, message}]`, inference failures add
//! `error` with the downstream reason.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ns_common::api::{FieldError, MessageResponse};
use thiserror::Error;
use tracing::error;

use crate::services::InferenceError;

/// Generic body for unexpected failures
pub const SERVER_ERROR_MESSAGE: &str = "Server error";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body failed field validation (400)
    #[error("Validation failed: {0:?}")]
    Validation(Vec<FieldError>),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or rejected credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Inference service failure (500)
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// ns-common error (500)
    #[error("Common error: {0}")]
    Common(#[from] ns_common::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                MessageResponse {
                    message: "Validation failed".to_string(),
                    errors,
                    ..Default::default()
                },
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                MessageResponse {
                    message,
                    ..Default::default()
                },
            ),
            ApiError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                MessageResponse {
                    message,
                    ..Default::default()
                },
            ),
            ApiError::Inference(err) => {
                error!(error = %err, "Inference failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    MessageResponse {
                        message: SERVER_ERROR_MESSAGE.to_string(),
                        error: Some(err.to_string()),
                        ..Default::default()
                    },
                )
            }
            ApiError::Database(ref err) => {
                error!(error = %err, "Database error");
                server_error()
            }
            ApiError::Common(ref err) => {
                error!(error = %err, "Internal error");
                server_error()
            }
            ApiError::Internal(ref msg) => {
                error!(error = %msg, "Internal error");
                server_error()
            }
        };

        (status, Json(body)).into_response()
    }
}

fn server_error() -> (StatusCode, MessageResponse) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        MessageResponse {
            message: SERVER_ERROR_MESSAGE.to_string(),
            ..Default::default()
        },
    )
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
