//! Domain entities for provider calls and their normalized results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::value_objects::{Category, EvidenceItem, Target, TargetType, Verdict};

/// Vendor-neutral reputation signal returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractedSignal {
    pub provider: String,
    pub input_type: TargetType,
    pub input_value: String,
    pub verdict: Verdict,
    pub categories: Vec<Category>,
    pub reasons: Vec<String>,
    pub confidence: f64,
    pub evidence: Vec<EvidenceItem>,
    pub fetched_at: DateTime<Utc>,
    pub cache_hit: bool,
}

impl AbstractedSignal {
    /// Mark a signal as served from cache
    pub fn from_cache(mut self) -> Self {
        self.cache_hit = true;
        self
    }

    pub fn target(&self) -> Target {
        Target {
            target_type: self.input_type,
            value: self.input_value.clone(),
        }
    }
}

/// Immutable registry entry describing one external provider.
///
/// Descriptors never carry credentials; they are safe to expose as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    pub supported_target_types: &'static [TargetType],
    #[serde(serialize_with = "serialize_ttl_seconds", rename = "cacheTtlSeconds")]
    pub cache_ttl: Duration,
    pub unit_cost: f64,
    pub policy_tag: Option<&'static str>,
}

impl ProviderDescriptor {
    pub fn supports(&self, target_type: TargetType) -> bool {
        self.supported_target_types.contains(&target_type)
    }
}

fn serialize_ttl_seconds<S>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(ttl.as_secs())
}

/// What a normalized finding describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Breach,
    Reputation,
    Exposure,
    Unavailable,
}

/// Normalized result handed to scan orchestration by every generic adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub provider: String,
    pub kind: FindingKind,
    pub title: String,
    pub summary: Option<String>,
    pub risk: Verdict,
    pub attributes: BTreeMap<String, String>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl Finding {
    pub fn new(provider: &str, kind: FindingKind, title: impl Into<String>, risk: Verdict) -> Self {
        Self {
            provider: provider.to_string(),
            kind,
            title: title.into(),
            summary: None,
            risk,
            attributes: BTreeMap::new(),
            observed_at: None,
        }
    }

    /// Synthetic placeholder emitted when a provider is gated or failing
    pub fn unavailable(provider: &str, reason_code: &str, reason: impl Into<String>) -> Self {
        let mut finding = Self::new(
            provider,
            FindingKind::Unavailable,
            "Provider unavailable",
            Verdict::Unknown,
        );
        finding.summary = Some(reason.into());
        finding
            .attributes
            .insert("reason_code".to_string(), reason_code.to_string());
        finding
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn observed(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.observed_at = at;
        self
    }

    pub fn is_unavailable(&self) -> bool {
        self.kind == FindingKind::Unavailable
    }
}
