//! Vendor enrichment endpoints

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};

use super::{AppState, invalid_body, parse_target};
use crate::application::errors::ApplicationError;
use crate::application::{EnrichmentQuery, LookupKind};
use crate::domain::{DomainError, TargetType};
use crate::presentation::models::{EnrichRequest, EnrichResponse, ErrorResponse};

/// Point-in-time reputation for an address or domain
#[utoipa::path(
    post,
    path = "/api/v1/enrich",
    tag = "enrichment",
    request_body = EnrichRequest,
    responses(
        (status = 200, description = "Abstracted threat signal", body = EnrichResponse),
        (status = 400, description = "Invalid target", body = ErrorResponse),
        (status = 429, description = "Query volume or rate limit reached", body = ErrorResponse),
        (status = 503, description = "Vendor not configured", body = ErrorResponse)
    )
)]
pub async fn enrich(
    State(state): State<AppState>,
    payload: Result<Json<EnrichRequest>, JsonRejection>,
) -> Result<Json<EnrichResponse>, ApplicationError> {
    run_enrichment(&state, LookupKind::Reputation, payload).await
}

/// Passive-resolution activity for an address or domain
#[utoipa::path(
    post,
    path = "/api/v1/enrich/passive-dns",
    tag = "enrichment",
    request_body = EnrichRequest,
    responses(
        (status = 200, description = "Abstracted DNS activity signal", body = EnrichResponse),
        (status = 400, description = "Invalid target", body = ErrorResponse)
    )
)]
pub async fn enrich_passive_dns(
    State(state): State<AppState>,
    payload: Result<Json<EnrichRequest>, JsonRejection>,
) -> Result<Json<EnrichResponse>, ApplicationError> {
    run_enrichment(&state, LookupKind::PassiveDns, payload).await
}

/// Content reputation for a domain
#[utoipa::path(
    post,
    path = "/api/v1/enrich/content",
    tag = "enrichment",
    request_body = EnrichRequest,
    responses(
        (status = 200, description = "Abstracted content signal", body = EnrichResponse),
        (status = 400, description = "Invalid target", body = ErrorResponse)
    )
)]
pub async fn enrich_content(
    State(state): State<AppState>,
    payload: Result<Json<EnrichRequest>, JsonRejection>,
) -> Result<Json<EnrichResponse>, ApplicationError> {
    run_enrichment(&state, LookupKind::Content, payload).await
}

async fn run_enrichment(
    state: &AppState,
    kind: LookupKind,
    payload: Result<Json<EnrichRequest>, JsonRejection>,
) -> Result<Json<EnrichResponse>, ApplicationError> {
    let Json(request) = payload.map_err(invalid_body)?;

    let target = parse_target(&request.target_type, &request.target_value)?;
    if target.target_type == TargetType::Email {
        return Err(DomainError::invalid("targetType", "targetType must be 'ip' or 'domain'").into());
    }

    let signal = state
        .enrichment
        .enrich(EnrichmentQuery {
            kind,
            target,
            correlation_id: request.correlation_id,
            skip_cache: request.skip_cache.unwrap_or(false),
        })
        .await?;

    Ok(Json(EnrichResponse::new(signal)))
}
