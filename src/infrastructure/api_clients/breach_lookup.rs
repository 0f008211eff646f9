//! Breach lookup adapter for email addresses

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::traits::{ProviderAdapter, build_http_client, error_for_status, not_configured};
use crate::application::errors::ProviderError;
use crate::config::ProviderEndpoint;
use crate::domain::{Finding, FindingKind, Target, TargetType, Verdict};
use crate::infrastructure::provider_registry::BREACH_LOOKUP;

/// Data classes that make a breach high risk
const SENSITIVE_CLASSES: &[&str] = &["Passwords", "Credit cards", "Bank account numbers"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BreachRecord {
    name: String,
    title: Option<String>,
    domain: Option<String>,
    breach_date: Option<String>,
    #[serde(default)]
    pwn_count: u64,
    #[serde(default)]
    data_classes: Vec<String>,
    #[serde(default)]
    is_verified: bool,
}

pub struct BreachLookupAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BreachLookupAdapter {
    pub fn new(endpoint: &ProviderEndpoint, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn to_finding(record: BreachRecord) -> Finding {
        let sensitive = record
            .data_classes
            .iter()
            .any(|class| SENSITIVE_CLASSES.contains(&class.as_str()));
        let risk = match (sensitive, record.is_verified) {
            (true, true) => Verdict::High,
            (true, false) | (false, true) => Verdict::Medium,
            (false, false) => Verdict::Low,
        };

        let observed = record
            .breach_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt));

        let mut finding = Finding::new(
            BREACH_LOOKUP,
            FindingKind::Breach,
            record.title.unwrap_or_else(|| record.name.clone()),
            risk,
        )
        .with_summary(format!(
            "Exposed data: {}",
            if record.data_classes.is_empty() {
                "unspecified".to_string()
            } else {
                record.data_classes.join(", ")
            }
        ))
        .with_attribute("breach", record.name)
        .with_attribute("accounts_affected", record.pwn_count.to_string())
        .with_attribute("verified", record.is_verified.to_string())
        .observed(observed);

        if let Some(domain) = record.domain.filter(|d| !d.is_empty()) {
            finding = finding.with_attribute("domain", domain);
        }
        finding
    }
}

#[async_trait]
impl ProviderAdapter for BreachLookupAdapter {
    fn provider_id(&self) -> &'static str {
        BREACH_LOOKUP
    }

    async fn fetch(&self, target: &Target) -> Result<Vec<Finding>, ProviderError> {
        if target.target_type != TargetType::Email {
            return Err(ProviderError::UnsupportedTarget {
                provider: BREACH_LOOKUP.to_string(),
                target_type: target.target_type.to_string(),
            });
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| not_configured(BREACH_LOOKUP))?;

        let url = format!("{}/breachedaccount/{}", self.base_url, target.value);
        let response = self
            .client
            .get(&url)
            .query(&[("truncateResponse", "false")])
            .header("hibp-api-key", api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let records: Vec<BreachRecord> = response.json().await?;
                Ok(records.into_iter().map(Self::to_finding).collect())
            }
            _ => Err(error_for_status(response).await),
        }
    }
}
