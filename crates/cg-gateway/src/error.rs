//! Control surface error type with Axum `IntoResponse` support.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// API error type that converts to `{status: "error", message}` responses.
///
/// Every variant answers 500; the manual-publish contract has a single
/// failure shape.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body could not be used as a payload.
    #[error("{0}")]
    InvalidPayload(String),

    #[error("{0}")]
    PublishFailed(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) | ApiError::PublishFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "status": "error",
            "message": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience alias.
pub type ApiResult<T> = Result<T, ApiError>;
