//! Health check controller

use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;

use crate::infrastructure::CircuitState;
use crate::presentation::controllers::AppState;
use crate::presentation::models::{HealthDetails, HealthResponse};

/// Basic health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        details: None,
    })
}

/// Per-provider circuit, spend and cache state.
///
/// Reports `degraded` while any circuit is open; the service itself still
/// answers, so the status code stays 200.
#[utoipa::path(
    get,
    path = "/health/detailed",
    tag = "health",
    responses(
        (status = 200, description = "Detailed health information", body = HealthResponse)
    )
)]
pub async fn detailed_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let context = state.orchestrator.context();

    let mut circuits = Vec::new();
    let mut spend = Vec::new();
    for id in context.registry.ids() {
        circuits.push(context.circuits.snapshot(id).await);
        spend.push(context.spend.snapshot(id).await);
    }

    let status = if circuits.iter().any(|c| c.state != CircuitState::Closed) {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        details: Some(HealthDetails {
            uptime_seconds: state.started_at.elapsed().as_secs(),
            store_backend: state.store.backend().to_string(),
            vendor_configured: state.vendor_configured,
            cache: context.cache.stats().await,
            circuits,
            spend,
            policy_gates: context.policy.gates(),
        }),
    })
}

/// Liveness endpoint
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive")
    )
)]
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}
