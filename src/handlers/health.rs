//! Liveness and readiness

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub version: String,
}

/// GET /health - Report service and storage health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage_ok = state.auth_service.storage_healthy().await;

    let (status_code, status, storage) = if storage_ok {
        (StatusCode::OK, "healthy", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "unavailable")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            storage: storage.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
