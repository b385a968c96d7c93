//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::health;

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - overall health with a live store probe.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let postgres_connected = state.store.ping().await.is_ok();

    if postgres_connected {
        health().postgres.set_healthy();
    } else {
        health().postgres.set_unhealthy("Connection failed");
    }

    let status = if postgres_connected { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        postgres_connected,
    })
}

/// GET /health/ready - readiness for traffic.
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - process liveness.
pub async fn live_handler() -> StatusCode {
    StatusCode::OK
}
