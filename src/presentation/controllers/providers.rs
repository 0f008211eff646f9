//! Provider listing and generic lookup endpoints

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};

use super::{AppState, invalid_body, parse_target};
use crate::application::errors::ApplicationError;
use crate::presentation::models::{
    CircuitResetResponse, ErrorResponse, FindingDto, LookupRequest, LookupResponse,
    ProviderDto, ProviderListResponse,
};

/// List registered providers without any credential material
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "Registered providers", body = ProviderListResponse)
    )
)]
pub async fn list_providers(State(state): State<AppState>) -> Json<ProviderListResponse> {
    let context = state.orchestrator.context();
    let providers = context
        .registry
        .all()
        .iter()
        .map(|d| ProviderDto::new(d, context.policy.is_allowed(d.policy_tag)))
        .collect();

    Json(ProviderListResponse { providers })
}

/// Run one generic provider adapter.
///
/// Provider failures never surface as errors here; they come back as a single
/// unavailable finding.
#[utoipa::path(
    post,
    path = "/api/v1/providers/{id}/lookup",
    tag = "providers",
    params(("id" = String, Path, description = "Provider id")),
    request_body = LookupRequest,
    responses(
        (status = 200, description = "Normalized findings", body = LookupResponse),
        (status = 400, description = "Invalid target", body = ErrorResponse),
        (status = 404, description = "Unknown provider", body = ErrorResponse)
    )
)]
pub async fn lookup_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Result<Json<LookupResponse>, ApplicationError> {
    let descriptor = state
        .orchestrator
        .context()
        .registry
        .get(&id)
        .filter(|d| state.adapters.has_adapter(d.id))
        .ok_or_else(|| ApplicationError::NotFound {
            resource: "provider".to_string(),
            id: id.clone(),
        })?;

    let Json(request) = payload.map_err(invalid_body)?;
    let target = parse_target(&request.target_type, &request.target_value)?;

    let findings = state
        .adapters
        .run(descriptor.id, &target, request.skip_cache.unwrap_or(false))
        .await;

    Ok(Json(LookupResponse {
        provider: descriptor.id.to_string(),
        unavailable: findings.iter().any(|f| f.is_unavailable()),
        findings: findings.into_iter().map(FindingDto::from).collect(),
    }))
}

/// Manually close a provider's circuit
#[utoipa::path(
    post,
    path = "/api/v1/providers/{id}/circuit/reset",
    tag = "providers",
    params(("id" = String, Path, description = "Provider id")),
    responses(
        (status = 200, description = "Circuit reset", body = CircuitResetResponse),
        (status = 404, description = "Unknown provider", body = ErrorResponse)
    )
)]
pub async fn reset_circuit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CircuitResetResponse>, ApplicationError> {
    let context = state.orchestrator.context();
    let descriptor = context
        .registry
        .get(&id)
        .ok_or_else(|| ApplicationError::NotFound {
            resource: "provider".to_string(),
            id: id.clone(),
        })?;

    let reset = context.circuits.reset(descriptor.id).await;
    Ok(Json(CircuitResetResponse {
        provider: descriptor.id.to_string(),
        reset,
    }))
}
