//! Shared contract and helpers for provider HTTP clients

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

use crate::application::errors::{ApiError, ProviderError};
use crate::domain::{Finding, Target};

pub(crate) const USER_AGENT: &str = concat!("intel-relay/", env!("CARGO_PKG_VERSION"));

/// A generic provider adapter returning normalized findings.
///
/// Adapters only speak HTTP and normalize; retry, circuit, rate and spend
/// handling belong to the call orchestrator.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> &'static str;

    async fn fetch(&self, target: &Target) -> Result<Vec<Finding>, ProviderError>;
}

/// Build an HTTP client with the crate user agent
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Map a non-success response to a typed error, consuming the body for context
pub(crate) async fn error_for_status(response: Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unexpected status")
            .to_string()
    } else {
        body.chars().take(200).collect()
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Api(ApiError::Authentication)
        }
        StatusCode::SERVICE_UNAVAILABLE => ProviderError::Api(ApiError::ServiceUnavailable),
        _ => ProviderError::Api(ApiError::Http {
            status: status.as_u16(),
            message,
        }),
    }
}

/// Error for an adapter whose credentials are missing
pub(crate) fn not_configured(provider: &str) -> ProviderError {
    ProviderError::Api(ApiError::NotConfigured {
        message: format!("{} credentials are not configured", provider),
    })
}
