//! Inference endpoint.
//!
//! POST /v1/inference - run one query through the pipeline and return the
//! response, whether freshly inferred or served from a cache tier.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use tandem_kernel::InferenceRequest;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /v1/inference
pub async fn inference(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InferenceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // Any bind failure is a 400, regardless of how axum classifies it.
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let response = state.pipeline.execute(&req).await?;

    tracing::info!(
        model_used = %response.model_used,
        cache_hit = response.cache_hit,
        latency_ms = response.latency.as_millis() as u64,
        "inference request completed"
    );

    Ok((StatusCode::OK, Json(response)))
}

/// Build the inference router sub-tree.
pub fn inference_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::post;
    axum::Router::new().route("/v1/inference", post(inference))
}
