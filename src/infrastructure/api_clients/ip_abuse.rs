//! IP abuse reputation adapter

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{ProviderAdapter, build_http_client, error_for_status, not_configured};
use crate::application::errors::ProviderError;
use crate::config::ProviderEndpoint;
use crate::domain::{Finding, FindingKind, Target, TargetType, Verdict};
use crate::infrastructure::provider_registry::IP_ABUSE;

const MAX_AGE_DAYS: &str = "90";

#[derive(Debug, Deserialize)]
struct CheckResponse {
    data: AbuseReport,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbuseReport {
    #[serde(default)]
    abuse_confidence_score: u32,
    country_code: Option<String>,
    #[serde(default)]
    total_reports: u64,
    last_reported_at: Option<DateTime<Utc>>,
    usage_type: Option<String>,
    isp: Option<String>,
}

/// Map an abuse confidence score (0-100) to a qualitative risk
fn score_risk(score: u32) -> Verdict {
    match score {
        75.. => Verdict::High,
        25..=74 => Verdict::Medium,
        _ => Verdict::Low,
    }
}

pub struct IpAbuseAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl IpAbuseAdapter {
    pub fn new(endpoint: &ProviderEndpoint, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl ProviderAdapter for IpAbuseAdapter {
    fn provider_id(&self) -> &'static str {
        IP_ABUSE
    }

    async fn fetch(&self, target: &Target) -> Result<Vec<Finding>, ProviderError> {
        if target.target_type != TargetType::Ip {
            return Err(ProviderError::UnsupportedTarget {
                provider: IP_ABUSE.to_string(),
                target_type: target.target_type.to_string(),
            });
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| not_configured(IP_ABUSE))?;

        let response = self
            .client
            .get(format!("{}/check", self.base_url))
            .query(&[("ipAddress", target.value.as_str()), ("maxAgeInDays", MAX_AGE_DAYS)])
            .header("Key", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let report = response.json::<CheckResponse>().await?.data;
        let mut finding = Finding::new(
            IP_ABUSE,
            FindingKind::Reputation,
            format!("Abuse confidence {}%", report.abuse_confidence_score),
            score_risk(report.abuse_confidence_score),
        )
        .with_summary(format!(
            "{} abuse reports in the last {} days",
            report.total_reports, MAX_AGE_DAYS
        ))
        .with_attribute("abuse_score", report.abuse_confidence_score.to_string())
        .with_attribute("total_reports", report.total_reports.to_string())
        .observed(report.last_reported_at);

        for (key, value) in [
            ("country_code", report.country_code),
            ("usage_type", report.usage_type),
            ("isp", report.isp),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                finding = finding.with_attribute(key, value);
            }
        }

        Ok(vec![finding])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn test_score_bands() {
        assert_eq!(score_risk(0), Verdict::Low);
        assert_eq!(score_risk(24), Verdict::Low);
        assert_eq!(score_risk(25), Verdict::Medium);
        assert_eq!(score_risk(75), Verdict::High);
        assert_eq!(score_risk(100), Verdict::High);
    }

    #[tokio::test]
    async fn test_report_becomes_finding() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/check")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ipAddress".into(), "8.8.8.8".into()),
                Matcher::UrlEncoded("maxAgeInDays".into(), "90".into()),
            ]))
            .match_header("key", "abuse-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"data": {
                    "ipAddress": "8.8.8.8", "abuseConfidenceScore": 80, "countryCode": "US",
                    "totalReports": 14, "lastReportedAt": "2024-01-02T03:04:05+00:00",
                    "usageType": "Data Center", "isp": "Example ISP"
                }})
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = IpAbuseAdapter::new(
            &ProviderEndpoint {
                base_url: server.url(),
                api_key: Some("abuse-key".to_string()),
            },
            Duration::from_secs(5),
        )
        .unwrap();
        let target = Target::parse(TargetType::Ip, "8.8.8.8").unwrap();
        let findings = adapter.fetch(&target).await.unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].risk, Verdict::High);
        assert_eq!(findings[0].attributes["country_code"], "US");
        assert_eq!(findings[0].attributes["total_reports"], "14");
        assert!(findings[0].observed_at.is_some());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/check")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let adapter = IpAbuseAdapter::new(
            &ProviderEndpoint {
                base_url: server.url(),
                api_key: Some("abuse-key".to_string()),
            },
            Duration::from_secs(5),
        )
        .unwrap();
        let target = Target::parse(TargetType::Ip, "8.8.8.8").unwrap();
        let err = adapter.fetch(&target).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.counts_toward_circuit());
    }
}
