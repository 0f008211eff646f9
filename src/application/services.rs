//! Vendor enrichment service
//!
//! Wraps the reputation vendor's lookups with the durable cross-instance
//! cache, the account-wide query volume limiter and the shared orchestrator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::{ApplicationError, ProviderError};
use super::orchestrator::{CallOptions, CallOrchestrator};
use crate::config::VendorConfig;
use crate::domain::{AbstractedSignal, Target, TargetType, validate_signal_compliance};
use crate::infrastructure::api_clients::ReputationClient;
use crate::infrastructure::provider_registry::{CONTENT_REPUTATION, DNS_ACTIVITY, THREAT_REPUTATION};
use crate::infrastructure::{DurableStore, MultiWindowLimiter, StoredRecord};

const SIGNAL_RECORD_TYPE: &str = "reputation_signal";
const AUDIT_RECORD_TYPE: &str = "enrichment_audit";

/// Query volume is enforced for the whole vendor account
const VOLUME_IDENTIFIER_TYPE: &str = "account";
const VOLUME_IDENTIFIER: &str = "default";

/// Which vendor lookup to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Reputation,
    PassiveDns,
    Content,
}

impl LookupKind {
    pub fn provider_id(&self) -> &'static str {
        match self {
            LookupKind::Reputation => THREAT_REPUTATION,
            LookupKind::PassiveDns => DNS_ACTIVITY,
            LookupKind::Content => CONTENT_REPUTATION,
        }
    }

    /// Durable cache key scope for a target
    fn scope(&self, target_type: TargetType) -> String {
        match self {
            LookupKind::Reputation => target_type.as_str().to_string(),
            LookupKind::PassiveDns => format!("pdns_{}", target_type),
            LookupKind::Content => "content".to_string(),
        }
    }

    /// Audit action name
    fn action(&self, target_type: TargetType) -> &'static str {
        match (self, target_type) {
            (LookupKind::Reputation, TargetType::Ip) => "lookup_ip",
            (LookupKind::Reputation, _) => "lookup_domain",
            (LookupKind::PassiveDns, _) => "passive_dns",
            (LookupKind::Content, _) => "content_reputation",
        }
    }
}

/// One enrichment request after input validation
#[derive(Debug, Clone)]
pub struct EnrichmentQuery {
    pub kind: LookupKind,
    pub target: Target,
    pub correlation_id: Option<String>,
    pub skip_cache: bool,
}

/// Audit row written for every enrichment outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentAudit {
    pub action: &'static str,
    pub input_type: TargetType,
    pub input_value: String,
    pub correlation_id: Option<String>,
    pub cache_hit: bool,
    pub success: bool,
    pub status_code: u16,
    pub error_code: Option<&'static str>,
    pub recorded_at: DateTime<Utc>,
}

impl EnrichmentAudit {
    fn new(query: &EnrichmentQuery, result: &Result<AbstractedSignal, ApplicationError>) -> Self {
        let (cache_hit, status_code, error_code) = match result {
            Ok(signal) => (signal.cache_hit, 200, None),
            Err(error) => {
                let code = error.code();
                (false, code.status().as_u16(), Some(code.as_str()))
            }
        };

        Self {
            action: query.kind.action(query.target.target_type),
            input_type: query.target.target_type,
            input_value: query.target.value.clone(),
            correlation_id: query.correlation_id.clone(),
            cache_hit,
            success: result.is_ok(),
            status_code,
            error_code,
            recorded_at: Utc::now(),
        }
    }
}

pub struct EnrichmentService {
    orchestrator: CallOrchestrator,
    client: Arc<ReputationClient>,
    store: Arc<dyn DurableStore>,
    volume_limiter: MultiWindowLimiter,
    call_timeout: Duration,
    cache_ttl: Duration,
    audit_retention: Duration,
}

impl EnrichmentService {
    pub fn new(
        orchestrator: CallOrchestrator,
        client: Arc<ReputationClient>,
        store: Arc<dyn DurableStore>,
        config: &VendorConfig,
    ) -> Self {
        Self {
            orchestrator,
            client,
            volume_limiter: MultiWindowLimiter::new(store.clone(), config.limits.clone()),
            store,
            call_timeout: Duration::from_secs(config.timeout_seconds),
            cache_ttl: Duration::from_secs(config.cache_ttl_seconds),
            audit_retention: Duration::from_secs(config.audit_retention_days * 24 * 3600),
        }
    }

    pub fn store_key(kind: LookupKind, target: &Target) -> String {
        format!("vendor:{}:{}", kind.scope(target.target_type), target.value)
    }

    /// Run one lookup and record its outcome in the audit trail
    pub async fn enrich(&self, query: EnrichmentQuery) -> Result<AbstractedSignal, ApplicationError> {
        let result = self.lookup(&query).await;
        self.record_audit(EnrichmentAudit::new(&query, &result)).await;
        result
    }

    async fn lookup(&self, query: &EnrichmentQuery) -> Result<AbstractedSignal, ApplicationError> {
        let provider_id = query.kind.provider_id();
        let correlation_id = query.correlation_id.as_deref().unwrap_or("-");
        let target = &query.target;

        let supported = self
            .orchestrator
            .context()
            .registry
            .get(provider_id)
            .is_some_and(|d| d.supports(target.target_type));
        if !supported {
            return Err(ProviderError::UnsupportedTarget {
                provider: provider_id.to_string(),
                target_type: target.target_type.to_string(),
            }
            .into());
        }

        let key = Self::store_key(query.kind, target);
        if !query.skip_cache {
            if let Some(signal) = self.cached_signal(&key).await {
                info!(provider = provider_id, correlation_id, key = %key, "Enrichment served from store");
                return Ok(signal);
            }
        }

        // The durable store is the only cache for vendor results
        let options = CallOptions {
            skip_cache: true,
            skip_cache_write: true,
            timeout: Some(self.call_timeout),
            ttl: None,
        };
        let client = &self.client;
        let limiter = &self.volume_limiter;
        let kind = query.kind;
        let outcome = self
            .orchestrator
            .call(provider_id, target, options, || async move {
                // Counted per attempt, after every gate has admitted the call
                if let Err(retry_after) = limiter
                    .check_and_record(VOLUME_IDENTIFIER_TYPE, VOLUME_IDENTIFIER)
                    .await
                {
                    return Err(ProviderError::QueryVolumeExceeded { retry_after });
                }

                match kind {
                    LookupKind::Reputation => client.lookup(provider_id, target).await,
                    LookupKind::PassiveDns => client.passive_dns(provider_id, target).await,
                    LookupKind::Content => client.content_reputation(provider_id, target).await,
                }
            })
            .await?;

        let signal = outcome.value;
        validate_signal_compliance(&signal);

        match serde_json::to_value(&signal) {
            Ok(value) => {
                let record = StoredRecord::new(key.clone(), SIGNAL_RECORD_TYPE, value, self.cache_ttl);
                if let Err(e) = self.store.put(record).await {
                    warn!(key = %key, "Failed to persist enrichment result: {}", e);
                }
            }
            Err(e) => warn!(key = %key, "Failed to serialize enrichment result: {}", e),
        }

        info!(
            provider = provider_id,
            correlation_id,
            verdict = signal.verdict.as_str(),
            categories = signal.categories.len(),
            "Enrichment completed"
        );
        Ok(signal)
    }

    /// Persist an audit row; failures are logged and never fail the lookup
    async fn record_audit(&self, audit: EnrichmentAudit) {
        let key = format!("audit:enrichment:{}", Uuid::new_v4());
        let value = match serde_json::to_value(&audit) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize enrichment audit: {}", e);
                return;
            }
        };

        let record = StoredRecord::new(key.clone(), AUDIT_RECORD_TYPE, value, self.audit_retention);
        if let Err(e) = self.store.put(record).await {
            warn!(key = %key, action = audit.action, "Failed to persist enrichment audit: {}", e);
        }
    }

    /// Live stored signal for a key; store failures are treated as a miss
    async fn cached_signal(&self, key: &str) -> Option<AbstractedSignal> {
        let record = match self.store.get(key).await {
            Ok(record) => record?,
            Err(e) => {
                warn!(key, "Store lookup failed, continuing without cache: {}", e);
                return None;
            }
        };

        match serde_json::from_value::<AbstractedSignal>(record.value) {
            Ok(signal) => Some(signal.from_cache()),
            Err(e) => {
                debug!(key, "Discarding unreadable stored signal: {}", e);
                None
            }
        }
    }
}
