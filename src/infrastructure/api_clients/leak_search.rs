//! Leak search adapter for exposed credentials on paste and dump sites

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::traits::{ProviderAdapter, build_http_client, error_for_status, not_configured};
use crate::application::errors::ProviderError;
use crate::config::ProviderEndpoint;
use crate::domain::{Finding, FindingKind, Target, TargetType, Verdict};
use crate::infrastructure::provider_registry::LEAK_SEARCH;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Vec<LeakEntry>,
}

#[derive(Debug, Deserialize)]
struct LeakEntry {
    source: Option<LeakSource>,
    #[serde(default)]
    fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LeakSource {
    name: Option<String>,
    breach_date: Option<String>,
}

pub struct LeakSearchAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl LeakSearchAdapter {
    pub fn new(endpoint: &ProviderEndpoint, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn to_finding(entry: LeakEntry) -> Finding {
        let exposes_secret = entry
            .fields
            .iter()
            .any(|f| matches!(f.as_str(), "password" | "hash" | "ssn" | "card"));
        let (name, date) = entry
            .source
            .map(|s| (s.name, s.breach_date))
            .unwrap_or((None, None));

        // Source dates arrive as either YYYY-MM or YYYY-MM-DD
        let observed = date.as_deref().and_then(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", d), "%Y-%m-%d"))
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| Utc.from_utc_datetime(&dt))
        });

        let mut finding = Finding::new(
            LEAK_SEARCH,
            FindingKind::Exposure,
            name.unwrap_or_else(|| "Unattributed leak".to_string()),
            if exposes_secret { Verdict::High } else { Verdict::Medium },
        )
        .observed(observed);

        if !entry.fields.is_empty() {
            finding = finding
                .with_summary(format!("Exposed fields: {}", entry.fields.join(", ")))
                .with_attribute("fields", entry.fields.join(","));
        }
        finding
    }
}

#[async_trait]
impl ProviderAdapter for LeakSearchAdapter {
    fn provider_id(&self) -> &'static str {
        LEAK_SEARCH
    }

    async fn fetch(&self, target: &Target) -> Result<Vec<Finding>, ProviderError> {
        let query_type = match target.target_type {
            TargetType::Email => "email",
            TargetType::Domain => "domain",
            TargetType::Ip => {
                return Err(ProviderError::UnsupportedTarget {
                    provider: LEAK_SEARCH.to_string(),
                    target_type: target.target_type.to_string(),
                });
            }
        };
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| not_configured(LEAK_SEARCH))?;

        let response = self
            .client
            .get(format!("{}/query/{}", self.base_url, target.value))
            .query(&[("type", query_type)])
            .header("X-API-Key", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let body: SearchResponse = response.json().await?;
                if !body.success {
                    return Ok(Vec::new());
                }
                Ok(body.result.into_iter().map(Self::to_finding).collect())
            }
            _ => Err(error_for_status(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn adapter(url: String) -> LeakSearchAdapter {
        LeakSearchAdapter::new(
            &ProviderEndpoint {
                base_url: url,
                api_key: Some("leak-key".to_string()),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_domain_search() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/query/example.com")
            .match_query(Matcher::UrlEncoded("type".into(), "domain".into()))
            .match_header("x-api-key", "leak-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "found": 2,
                    "result": [
                        {"source": {"name": "Combo dump", "breach_date": "2021-07"},
                         "fields": ["username", "password"]},
                        {"source": {"name": "Paste"}, "fields": ["email"]}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let target = Target::parse(TargetType::Domain, "example.com").unwrap();
        let findings = adapter(server.url()).fetch(&target).await.unwrap();

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].risk, Verdict::High);
        assert!(findings[0].observed_at.is_some());
        assert_eq!(findings[1].risk, Verdict::Medium);
        assert_eq!(findings[1].attributes["fields"], "email");
    }

    #[tokio::test]
    async fn test_unsuccessful_body_is_empty() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/query/someone@example.com")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"success": false, "error": "Not found"}).to_string())
            .create_async()
            .await;

        let target = Target::parse(TargetType::Email, "someone@example.com").unwrap();
        assert!(adapter(server.url()).fetch(&target).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ip_unsupported() {
        let target = Target::parse(TargetType::Ip, "8.8.8.8").unwrap();
        let err = adapter("http://127.0.0.1:9".to_string())
            .fetch(&target)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedTarget { .. }));
    }
}
