//! HTTP-facing error mapping.
//!
//! The pipeline's failures become status codes here: malformed input is a
//! 400, everything else a 500 carrying the attempted model and routing
//! decision so callers can tell which path broke.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use tandem_foundation::PipelineError;
use tandem_kernel::Error;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// 400: the request body did not bind or failed validation.
    BadRequest(String),
    /// 500: routing or inference failed after a valid request.
    Inference {
        message: String,
        model: Option<String>,
        routing: Option<String>,
    },
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err.source {
            Error::BadRequest(message) => ApiError::BadRequest(message),
            source => ApiError::Inference {
                message: source.to_string(),
                model: err.model,
                routing: err.routing,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ApiError::Inference {
                message,
                model,
                routing,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": message,
                    "model": model,
                    "routing": routing,
                })),
            )
                .into_response(),
        }
    }
}
