//! HTTP controllers for handling requests

pub mod enrichment;
pub mod health;
pub mod providers;

pub use enrichment::*;
pub use health::*;
pub use providers::*;

use axum::extract::rejection::JsonRejection;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use crate::Config;
use crate::application::errors::ApplicationError;
use crate::application::{AdapterRunner, CallOrchestrator, EnrichmentService, RuntimeContext};
use crate::domain::{DomainError, Target, TargetType};
use crate::infrastructure::DurableStore;
use crate::infrastructure::api_clients::ReputationClient;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub enrichment: Arc<EnrichmentService>,
    pub adapters: Arc<AdapterRunner>,
    pub orchestrator: CallOrchestrator,
    pub store: Arc<dyn DurableStore>,
    pub vendor_configured: bool,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the runtime context, vendor client and adapters from configuration.
    ///
    /// Fails when a provider references a policy tag with no registered gate.
    pub fn from_config(config: &Config, store: Arc<dyn DurableStore>) -> Result<Self, ApplicationError> {
        let context = Arc::new(RuntimeContext::from_config(config));
        context.policy.validate_registry(context.registry.all())?;
        let orchestrator = CallOrchestrator::new(context);

        let client = Arc::new(ReputationClient::new(&config.vendor)?);
        let vendor_configured = client.is_configured();
        let enrichment = Arc::new(EnrichmentService::new(
            orchestrator.clone(),
            client,
            store.clone(),
            &config.vendor,
        ));
        let adapters = Arc::new(AdapterRunner::from_config(
            orchestrator.clone(),
            &config.providers,
            config.runtime.call_timeout(),
        )?);

        Ok(Self {
            enrichment,
            adapters,
            orchestrator,
            store,
            vendor_configured,
            started_at: Instant::now(),
        })
    }
}

/// Map a body extraction failure into the validation error envelope
pub(crate) fn invalid_body(rejection: JsonRejection) -> ApplicationError {
    ApplicationError::Domain(DomainError::invalid("body", rejection.body_text()))
}

/// Parse the wire target pair into a validated target
pub(crate) fn parse_target(target_type: &str, target_value: &str) -> Result<Target, ApplicationError> {
    let target_type = TargetType::from_str(target_type)?;
    Ok(Target::parse(target_type, target_value)?)
}
