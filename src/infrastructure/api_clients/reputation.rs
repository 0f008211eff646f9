//! Reputation vendor client
//!
//! Holds the vendor's expiring bearer token and issues the point, passive
//! resolution and content lookups. Raw responses are decoded here and handed
//! straight to the abstraction layer; nothing vendor-shaped leaves this module.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::traits::{build_http_client, error_for_status};
use crate::application::errors::{ApiError, ProviderError};
use crate::config::VendorConfig;
use crate::domain::{
    AbstractedOutcome, AbstractedSignal, RawObservation, Target, TargetType,
    abstract_observation, abstract_passive_activity,
};

/// Retry hint the vendor's throttling response implies
const VENDOR_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    realm: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// Point lookup payload; the vendor returns either a wrapped or a bare list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IntelResponse {
    Wrapped { results: Vec<IntelRecord> },
    Bare(Vec<IntelRecord>),
}

impl IntelResponse {
    fn into_records(self) -> Vec<IntelRecord> {
        match self {
            IntelResponse::Wrapped { results } => results,
            IntelResponse::Bare(records) => records,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct IntelRecord {
    dataset: Option<String>,
    #[serde(alias = "botname")]
    detection: Option<String>,
    #[serde(alias = "reason")]
    category: Option<String>,
    #[serde(alias = "country")]
    cc: Option<String>,
    asn: Option<serde_json::Value>,
    #[serde(alias = "netname")]
    network: Option<String>,
    #[serde(alias = "firstseen")]
    first_seen: Option<i64>,
    #[serde(alias = "lastseen", alias = "seen")]
    last_seen: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PassiveResponse {
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    resp: Vec<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Single cached bearer token with refresh-before-expiry
pub struct TokenManager {
    http: Client,
    auth_url: String,
    username: Option<String>,
    password: Option<String>,
    lifetime: Duration,
    refresh_buffer: Duration,
    token: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    fn new(http: Client, config: &VendorConfig) -> Self {
        Self {
            http,
            auth_url: config.auth_url.clone(),
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone().filter(|p| !p.is_empty()),
            lifetime: Duration::from_secs(config.token_lifetime_seconds),
            refresh_buffer: Duration::from_secs(config.token_refresh_buffer_seconds),
            token: Mutex::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Current token, re-authenticating when it expires within the refresh buffer
    pub async fn token(&self) -> Result<String, ProviderError> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(ProviderError::Api(ApiError::NotConfigured {
                message: "Threat reputation credentials are not configured".to_string(),
            }));
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + self.refresh_buffer {
                return Ok(token.value.clone());
            }
        }

        debug!("Authenticating with reputation vendor");
        let response = self
            .http
            .post(&self.auth_url)
            .json(&LoginRequest {
                username,
                password,
                realm: "intel",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Vendor authentication failed");
            return Err(ProviderError::Api(ApiError::Authentication));
        }

        let login: LoginResponse = response.json().await?;
        let value = login
            .token
            .filter(|t| !t.is_empty())
            .ok_or(ProviderError::Api(ApiError::Authentication))?;

        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + self.lifetime,
        });
        info!("Vendor authentication successful");
        Ok(value)
    }

    /// Drop the cached token so the next request re-authenticates
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }
}

/// Client for the reputation vendor's lookup APIs
pub struct ReputationClient {
    http: Client,
    intel_url: String,
    passive_dns_url: String,
    content_url: String,
    content_key: Option<String>,
    tokens: TokenManager,
}

impl ReputationClient {
    pub fn new(config: &VendorConfig) -> Result<Self, ProviderError> {
        let http = build_http_client(Duration::from_secs(config.timeout_seconds))?;
        Ok(Self {
            tokens: TokenManager::new(http.clone(), config),
            http,
            intel_url: config.intel_url.trim_end_matches('/').to_string(),
            passive_dns_url: config.passive_dns_url.trim_end_matches('/').to_string(),
            content_url: config.content_url.trim_end_matches('/').to_string(),
            content_key: config.content_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.tokens.is_configured()
    }

    pub fn content_configured(&self) -> bool {
        self.content_key.is_some()
    }

    /// Point-in-time reputation for an address or domain
    pub async fn lookup(
        &self,
        provider: &str,
        target: &Target,
    ) -> Result<AbstractedSignal, ProviderError> {
        let url = match target.target_type {
            TargetType::Ip => format!("{}/cidr/{}/32", self.intel_url, target.value),
            TargetType::Domain => format!("{}/domain/{}", self.intel_url, target.value),
            TargetType::Email => {
                return Err(ProviderError::UnsupportedTarget {
                    provider: provider.to_string(),
                    target_type: target.target_type.to_string(),
                });
            }
        };

        let now = Utc::now();
        let outcome = match self.authorized_get::<IntelResponse>(provider, &url).await? {
            None => AbstractedOutcome::clean(),
            Some(response) => {
                let records = response.into_records();
                if records.is_empty() {
                    AbstractedOutcome::clean()
                } else {
                    abstract_observation(&observation_from_records(&records), now)
                }
            }
        };

        Ok(outcome.into_signal(provider, target, now))
    }

    /// Passive-resolution history, reduced to an activity level
    pub async fn passive_dns(
        &self,
        provider: &str,
        target: &Target,
    ) -> Result<AbstractedSignal, ProviderError> {
        let url = format!("{}/lookup", self.passive_dns_url);
        let request_url = reqwest::Url::parse_with_params(&url, &[("q", target.value.as_str())])
            .map_err(|e| ProviderError::Api(ApiError::NotConfigured {
                message: format!("Invalid passive DNS endpoint: {}", e),
            }))?;

        let outcome = match self
            .authorized_get::<PassiveResponse>(provider, request_url.as_str())
            .await?
        {
            None => AbstractedOutcome::clean(),
            Some(response) => abstract_passive_activity(response.records.len()),
        };

        Ok(outcome.into_signal(provider, target, Utc::now()))
    }

    /// Content reputation for a domain, authorized by the separate content key
    pub async fn content_reputation(
        &self,
        provider: &str,
        target: &Target,
    ) -> Result<AbstractedSignal, ProviderError> {
        if target.target_type != TargetType::Domain {
            return Err(ProviderError::UnsupportedTarget {
                provider: provider.to_string(),
                target_type: target.target_type.to_string(),
            });
        }
        let Some(content_key) = self.content_key.as_deref() else {
            return Err(ProviderError::Api(ApiError::NotConfigured {
                message: "Content reputation key is not configured".to_string(),
            }));
        };

        let url = format!("{}/{}", self.content_url, target.value);
        let response = self
            .http
            .get(&url)
            .bearer_auth(content_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let now = Utc::now();
        let outcome = match response.status() {
            StatusCode::NOT_FOUND => AbstractedOutcome::clean(),
            StatusCode::TOO_MANY_REQUESTS => return Err(vendor_rate_limited(provider)),
            status if status.is_success() => {
                let content: ContentResponse = response.json().await?;
                if content.resp.is_empty() {
                    AbstractedOutcome::clean()
                } else {
                    let observation = RawObservation {
                        indicators: content
                            .resp
                            .iter()
                            .map(|code| content_code_indicator(*code).to_string())
                            .collect(),
                        listed: true,
                        ..Default::default()
                    };
                    abstract_observation(&observation, now)
                }
            }
            _ => return Err(error_for_status(response).await),
        };

        Ok(outcome.into_signal(provider, target, now))
    }

    /// GET with the bearer token; `Ok(None)` means the vendor has no record
    async fn authorized_get<T: serde::de::DeserializeOwned>(
        &self,
        provider: &str,
        url: &str,
    ) -> Result<Option<T>, ProviderError> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => Err(vendor_rate_limited(provider)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.tokens.invalidate().await;
                Err(ProviderError::Api(ApiError::Authentication))
            }
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => Err(error_for_status(response).await),
        }
    }
}

fn vendor_rate_limited(provider: &str) -> ProviderError {
    ProviderError::RateLimited {
        provider: provider.to_string(),
        retry_after: VENDOR_RETRY_AFTER,
    }
}

/// Collapse vendor records into one generic observation
fn observation_from_records(records: &[IntelRecord]) -> RawObservation {
    let indicators = records
        .iter()
        .flat_map(|r| [&r.dataset, &r.detection, &r.category])
        .filter_map(|field| field.clone())
        .collect();

    RawObservation {
        indicators,
        listed: true,
        country_code: records.iter().find_map(|r| r.cc.clone()),
        has_network_owner: records.iter().any(|r| r.asn.is_some() || r.network.is_some()),
        first_seen: records
            .iter()
            .filter_map(|r| r.first_seen)
            .min()
            .and_then(from_epoch),
        last_seen: records
            .iter()
            .filter_map(|r| r.last_seen)
            .max()
            .and_then(from_epoch),
    }
}

fn from_epoch(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Translate a content return code into a generic indicator keyword
fn content_code_indicator(code: i64) -> &'static str {
    match code {
        1002 | 1102 => "spam",
        1004 | 1104 => "phish",
        1005 | 1105 => "malware",
        1006 | 1106 => "botnet",
        1007 | 1107 => "abuse",
        2001..=2099 => "newlyobserved",
        _ => "abuse",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compliance::assert_no_disallowed_fields;
    use crate::domain::{Category, Verdict};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    fn config(server: &ServerGuard) -> VendorConfig {
        VendorConfig {
            auth_url: format!("{}/api/v1/login", server.url()),
            intel_url: format!("{}/api/intel/v2/byobject", server.url()),
            passive_dns_url: format!("{}/api/pdns/v1", server.url()),
            content_url: format!("{}/lookup/v1", server.url()),
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            content_key: Some("content-key".to_string()),
            ..Default::default()
        }
    }

    async fn mock_login(server: &mut ServerGuard, hits: usize) -> mockito::Mock {
        server
            .mock("POST", "/api/v1/login")
            .match_body(Matcher::PartialJson(json!({"realm": "intel"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"token": "tok-1"}).to_string())
            .expect(hits)
            .create_async()
            .await
    }

    fn ip_target() -> Target {
        Target::parse(TargetType::Ip, "8.8.8.8").unwrap()
    }

    #[tokio::test]
    async fn test_not_found_is_clean_and_token_reused() {
        let mut server = Server::new_async().await;
        let login = mock_login(&mut server, 1).await;
        let lookup = server
            .mock("GET", "/api/intel/v2/byobject/cidr/8.8.8.8/32")
            .match_header("authorization", "Bearer tok-1")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;

        let client = ReputationClient::new(&config(&server)).unwrap();
        for _ in 0..2 {
            let signal = client.lookup("threat_reputation", &ip_target()).await.unwrap();
            assert_eq!(signal.verdict, Verdict::Low);
            assert!(signal.categories.is_empty());
            assert_eq!(signal.confidence, 0.9);
            assert_eq!(signal.reasons, vec!["No threat indicators found".to_string()]);
            assert_no_disallowed_fields(&signal, "clean lookup");
        }

        login.assert_async().await;
        lookup.assert_async().await;
    }

    #[tokio::test]
    async fn test_listed_domain_is_abstracted() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server, 1).await;
        let _lookup = server
            .mock("GET", "/api/intel/v2/byobject/domain/example.com")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "results": [
                        {"dataset": "XBL", "botname": "botnet-c2", "cc": "nl", "asn": 64500,
                         "firstseen": 1_600_000_000, "lastseen": 1_600_100_000},
                        {"dataset": "SBL", "reason": "spam operation"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ReputationClient::new(&config(&server)).unwrap();
        let target = Target::parse(TargetType::Domain, "example.com").unwrap();
        let signal = client.lookup("threat_reputation", &target).await.unwrap();

        assert!(signal.categories.contains(&Category::BotnetC2));
        assert!(signal.categories.contains(&Category::SpamSource));
        assert!(signal.categories.contains(&Category::CompromisedHost));
        assert_eq!(signal.verdict, Verdict::High);
        assert_no_disallowed_fields(&signal, "listed lookup");
    }

    #[tokio::test]
    async fn test_empty_result_is_clean() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server, 1).await;
        let _lookup = server
            .mock("GET", "/api/intel/v2/byobject/cidr/8.8.8.8/32")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = ReputationClient::new(&config(&server)).unwrap();
        let signal = client.lookup("threat_reputation", &ip_target()).await.unwrap();
        assert_eq!(signal.reasons, vec!["No threat indicators found".to_string()]);
    }

    #[tokio::test]
    async fn test_throttled_and_server_errors() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server, 1).await;
        let throttled = server
            .mock("GET", "/api/intel/v2/byobject/cidr/8.8.8.8/32")
            .with_status(429)
            .create_async()
            .await;

        let client = ReputationClient::new(&config(&server)).unwrap();
        let err = client.lookup("threat_reputation", &ip_target()).await.unwrap_err();
        assert_eq!(err.retry_after_secs(), Some(60));
        throttled.remove_async().await;

        let _failing = server
            .mock("GET", "/api/intel/v2/byobject/cidr/8.8.8.8/32")
            .with_status(502)
            .create_async()
            .await;
        let err = client.lookup("threat_reputation", &ip_target()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rejected_token_is_dropped() {
        let mut server = Server::new_async().await;
        let login = mock_login(&mut server, 2).await;
        let _lookup = server
            .mock("GET", "/api/intel/v2/byobject/cidr/8.8.8.8/32")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;

        let client = ReputationClient::new(&config(&server)).unwrap();
        for _ in 0..2 {
            let err = client.lookup("threat_reputation", &ip_target()).await.unwrap_err();
            assert!(matches!(err, ProviderError::Api(ApiError::Authentication)));
            assert!(!err.is_retryable());
        }
        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_credentials_not_configured() {
        let server = Server::new_async().await;
        let mut config = config(&server);
        config.password = None;

        let client = ReputationClient::new(&config).unwrap();
        assert!(!client.is_configured());
        let err = client.lookup("threat_reputation", &ip_target()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(ApiError::NotConfigured { .. })));
    }

    #[tokio::test]
    async fn test_failed_login_is_auth_error() {
        let mut server = Server::new_async().await;
        let _login = server
            .mock("POST", "/api/v1/login")
            .with_status(401)
            .create_async()
            .await;

        let client = ReputationClient::new(&config(&server)).unwrap();
        let err = client.lookup("threat_reputation", &ip_target()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(ApiError::Authentication)));
    }

    #[tokio::test]
    async fn test_passive_dns_activity() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server, 1).await;
        let records: Vec<_> = (0..12).map(|i| json!({"rrname": format!("h{}.example.com", i)})).collect();
        let _pdns = server
            .mock("GET", "/api/pdns/v1/lookup")
            .match_query(Matcher::UrlEncoded("q".into(), "example.com".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "records": records }).to_string())
            .create_async()
            .await;

        let client = ReputationClient::new(&config(&server)).unwrap();
        let target = Target::parse(TargetType::Domain, "example.com").unwrap();
        let signal = client.passive_dns("dns_activity", &target).await.unwrap();

        assert_eq!(signal.verdict, Verdict::Low);
        assert_eq!(signal.categories, vec![Category::NewlyObserved]);
        assert_eq!(signal.evidence[0].value, "moderate");
        assert_eq!(signal.confidence, 0.42);
    }

    #[tokio::test]
    async fn test_passive_dns_throttling_names_its_provider() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server, 1).await;
        let _pdns = server
            .mock("GET", "/api/pdns/v1/lookup")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let client = ReputationClient::new(&config(&server)).unwrap();
        let target = Target::parse(TargetType::Domain, "example.com").unwrap();
        let err = client.passive_dns("dns_activity", &target).await.unwrap_err();

        match err {
            ProviderError::RateLimited { provider, retry_after } => {
                assert_eq!(provider, "dns_activity");
                assert_eq!(retry_after, VENDOR_RETRY_AFTER);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_content_reputation() {
        let mut server = Server::new_async().await;
        let _content = server
            .mock("GET", "/lookup/v1/example.com")
            .match_header("authorization", "Bearer content-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"resp": [1004], "status": 200}).to_string())
            .create_async()
            .await;

        let client = ReputationClient::new(&config(&server)).unwrap();
        let target = Target::parse(TargetType::Domain, "example.com").unwrap();
        let signal = client
            .content_reputation("content_reputation", &target)
            .await
            .unwrap();
        assert_eq!(signal.categories, vec![Category::PhishingRisk]);
        assert_no_disallowed_fields(&signal, "content lookup");

        let mut unconfigured = config(&server);
        unconfigured.content_key = None;
        let client = ReputationClient::new(&unconfigured).unwrap();
        let err = client
            .content_reputation("content_reputation", &target)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api(ApiError::NotConfigured { .. })));
    }
}
