//! Health check endpoint.
//!
//! GET /v1/health - liveness probe (server is up)

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

/// GET /v1/health
///
/// Always returns 200 OK while the process is alive.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": Utc::now(),
        })),
    )
}

/// Build the health router sub-tree.
pub fn health_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;
    axum::Router::new().route("/v1/health", get(health))
}
