//! Route definitions and server setup

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    response::Json,
    routing::{get, post},
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::Config;
use crate::application::errors::ErrorCode;
use crate::infrastructure::{CacheStats, CircuitSnapshot, CircuitState, PolicyGate, SpendRecord, SpendSnapshot};
use crate::presentation::{
    controllers::{
        AppState,
        enrichment::{enrich, enrich_content, enrich_passive_dns},
        health::{detailed_health_check, health_check, liveness_check},
        providers::{list_providers, lookup_provider, reset_circuit},
    },
    middleware::logging_middleware,
    models::*,
};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::controllers::enrichment::enrich,
        crate::presentation::controllers::enrichment::enrich_passive_dns,
        crate::presentation::controllers::enrichment::enrich_content,
        crate::presentation::controllers::providers::list_providers,
        crate::presentation::controllers::providers::lookup_provider,
        crate::presentation::controllers::providers::reset_circuit,
        crate::presentation::controllers::health::health_check,
        crate::presentation::controllers::health::detailed_health_check,
        crate::presentation::controllers::health::liveness_check
    ),
    components(
        schemas(
            EnrichRequest,
            EnrichResponse,
            SignalDto,
            EvidenceDto,
            ErrorResponse,
            ErrorBody,
            ErrorCode,
            ProviderDto,
            ProviderListResponse,
            LookupRequest,
            LookupResponse,
            FindingDto,
            CircuitResetResponse,
            HealthResponse,
            HealthDetails,
            CacheStats,
            CircuitSnapshot,
            CircuitState,
            SpendSnapshot,
            SpendRecord,
            PolicyGate
        )
    ),
    tags(
        (name = "enrichment", description = "Vendor-neutral threat enrichment for addresses and domains"),
        (name = "providers", description = "Provider listing, generic lookups and circuit control"),
        (name = "health", description = "Service health and runtime gate state")
    ),
    info(
        title = "Intel Relay API",
        version = "1.0.0",
        description = "Governed access to external threat-intelligence providers. Every call passes cache, circuit breaker, rate limit, policy and spend checks, and vendor results are reduced to a vendor-neutral signal."
    )
)]
pub struct ApiDoc;

/// Create the application router with the middleware stack
pub fn create_router(app_state: AppState, config: &Config) -> Router {
    let api_routes = Router::new()
        .route("/enrich", post(enrich))
        .route("/enrich/passive-dns", post(enrich_passive_dns))
        .route("/enrich/content", post(enrich_content))
        .route("/providers", get(list_providers))
        .route("/providers/{id}/lookup", post(lookup_provider))
        .route("/providers/{id}/circuit/reset", post(reset_circuit));

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/health/detailed", get(detailed_health_check));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .merge(health_routes);

    if config.server.enable_docs {
        router = router.route("/api-docs/openapi.json", get(openapi_json));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.server.allowed_origins))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_seconds,
                )))
                .layer(middleware::from_fn(logging_middleware)),
        )
        .with_state(app_state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}
