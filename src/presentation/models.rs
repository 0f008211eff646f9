//! API request and response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::application::errors::ErrorCode;
use crate::domain::{AbstractedSignal, EvidenceItem, Finding, ProviderDescriptor};
use crate::infrastructure::{CacheStats, CircuitSnapshot, PolicyGate, SpendSnapshot};

/// Request model for vendor enrichment lookups
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrichRequest {
    /// Kind of target: `ip` or `domain`
    #[schema(example = "ip")]
    pub target_type: String,

    /// Address or domain to look up
    #[schema(example = "203.0.113.7")]
    pub target_value: String,

    /// Caller-supplied id echoed into logs
    #[schema(example = "scan-42")]
    pub correlation_id: Option<String>,

    /// Bypass the shared result cache
    #[serde(default)]
    pub skip_cache: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvidenceDto {
    #[schema(example = "first_observed")]
    pub key: String,
    #[schema(example = "recent")]
    pub value: String,
}

impl From<EvidenceItem> for EvidenceDto {
    fn from(item: EvidenceItem) -> Self {
        Self {
            key: item.key,
            value: item.value,
        }
    }
}

/// Vendor-neutral threat signal
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignalDto {
    #[schema(example = "threat_reputation")]
    pub provider: String,
    #[schema(example = "ip")]
    pub input_type: String,
    #[schema(example = "203.0.113.7")]
    pub input_value: String,
    /// One of `low`, `medium`, `high`, `unknown`
    #[schema(example = "low")]
    pub verdict: String,
    #[schema(example = json!(["spam_source"]))]
    pub categories: Vec<String>,
    pub reasons: Vec<String>,
    #[schema(example = 0.9)]
    pub confidence: f64,
    pub evidence: Vec<EvidenceDto>,
    pub fetched_at: DateTime<Utc>,
    pub cache_hit: bool,
}

impl From<AbstractedSignal> for SignalDto {
    fn from(signal: AbstractedSignal) -> Self {
        Self {
            provider: signal.provider,
            input_type: signal.input_type.to_string(),
            input_value: signal.input_value,
            verdict: signal.verdict.as_str().to_string(),
            categories: signal
                .categories
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            reasons: signal.reasons,
            confidence: signal.confidence,
            evidence: signal.evidence.into_iter().map(EvidenceDto::from).collect(),
            fetched_at: signal.fetched_at,
            cache_hit: signal.cache_hit,
        }
    }
}

/// Successful enrichment envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnrichResponse {
    pub success: bool,
    pub data: SignalDto,
}

impl EnrichResponse {
    pub fn new(signal: AbstractedSignal) -> Self {
        Self {
            success: true,
            data: signal.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorCode,
    #[schema(example = "Provider rate limit exceeded")]
    pub message: String,
    /// Seconds to wait before retrying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Error envelope returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

/// Provider metadata safe for display; credentials never appear here
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDto {
    #[schema(example = "breach_lookup")]
    pub id: String,
    #[schema(example = "Breach Lookup")]
    pub title: String,
    #[schema(example = json!(["email"]))]
    pub supported_target_types: Vec<String>,
    #[schema(example = 43200)]
    pub cache_ttl_seconds: u64,
    #[schema(example = 0.0035)]
    pub unit_cost: f64,
    pub policy_tag: Option<String>,
    /// Whether the provider's policy gate currently allows calls
    pub enabled: bool,
}

impl ProviderDto {
    pub fn new(descriptor: &ProviderDescriptor, enabled: bool) -> Self {
        Self {
            id: descriptor.id.to_string(),
            title: descriptor.title.to_string(),
            supported_target_types: descriptor
                .supported_target_types
                .iter()
                .map(|t| t.to_string())
                .collect(),
            cache_ttl_seconds: descriptor.cache_ttl.as_secs(),
            unit_cost: descriptor.unit_cost,
            policy_tag: descriptor.policy_tag.map(str::to_string),
            enabled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderListResponse {
    pub providers: Vec<ProviderDto>,
}

/// Request model for a single generic provider lookup
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    #[schema(example = "email")]
    pub target_type: String,
    #[schema(example = "someone@example.com")]
    pub target_value: String,
    #[serde(default)]
    pub skip_cache: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindingDto {
    pub provider: String,
    /// One of `breach`, `reputation`, `exposure`, `unavailable`
    pub kind: String,
    pub title: String,
    pub summary: Option<String>,
    pub risk: String,
    pub attributes: BTreeMap<String, String>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl From<Finding> for FindingDto {
    fn from(finding: Finding) -> Self {
        let kind = serde_json::to_value(finding.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Self {
            provider: finding.provider,
            kind,
            title: finding.title,
            summary: finding.summary,
            risk: finding.risk.as_str().to_string(),
            attributes: finding.attributes,
            observed_at: finding.observed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LookupResponse {
    pub provider: String,
    /// True when the provider could not be queried
    pub unavailable: bool,
    pub findings: Vec<FindingDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircuitResetResponse {
    pub provider: String,
    /// Whether the provider had any circuit state to clear
    pub reset: bool,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

/// Runtime state of every provider gate
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthDetails {
    pub uptime_seconds: u64,
    pub store_backend: String,
    pub vendor_configured: bool,
    pub cache: CacheStats,
    pub circuits: Vec<CircuitSnapshot>,
    pub spend: Vec<SpendSnapshot>,
    pub policy_gates: Vec<PolicyGate>,
}
