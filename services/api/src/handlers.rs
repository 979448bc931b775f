//! Axum Handlers for the REST API
//!
//! The relay itself lives behind the WebSocket endpoint; the only plain HTTP
//! handler is the liveness probe.

use axum::{extract::State, response::Json};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    models::{HealthResponse, HealthStatus},
    state::AppState,
};

/// Report process liveness and whether upstream credentials are configured.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "The service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        api_key_configured: !state.config.api_key.is_empty(),
        timestamp: Utc::now(),
    })
}
