//! Application layer error types

use crate::domain::DomainError;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Provider call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Resource not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },
}

/// Failure of a single orchestrated provider call
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Validation failed: {0}")]
    Validation(#[from] DomainError),

    #[error("Unknown provider: {id}")]
    UnknownProvider { id: String },

    #[error("Provider {provider} does not support {target_type} targets")]
    UnsupportedTarget {
        provider: String,
        target_type: String,
    },

    #[error("Provider disabled by policy gate '{tag}'")]
    PolicyBlocked { tag: String },

    #[error("Budget exceeded: {reason}")]
    BudgetExceeded { reason: String },

    #[error("Rate limit exceeded for {provider}")]
    RateLimited {
        provider: String,
        retry_after: Duration,
    },

    #[error("Query volume limit reached")]
    QueryVolumeExceeded { retry_after: Duration },

    #[error("Provider {provider} temporarily unavailable")]
    CircuitOpen {
        provider: String,
        retry_after: Duration,
    },

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout occurred after {millis}ms")]
    Timeout { millis: u64 },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Authentication failed")]
    Authentication,

    #[error("Provider not configured: {message}")]
    NotConfigured { message: String },

    #[error("Service unavailable")]
    ServiceUnavailable,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    RedisPool(#[from] deadpool_redis::PoolError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Store operation failed: {message}")]
    Operation { message: String },
}

/// Wire-level error code shared by every HTTP error response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    AuthFailed,
    RateLimited,
    NotFound,
    ApiError,
    NotConfigured,
    Timeout,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::AuthFailed => StatusCode::UNAUTHORIZED,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ApiError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::AuthFailed => "auth_failed",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::NotFound => "not_found",
            ErrorCode::ApiError => "api_error",
            ErrorCode::NotConfigured => "not_configured",
            ErrorCode::Timeout => "timeout",
        }
    }
}

impl ProviderError {
    /// Whether another attempt within the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Timeout { .. } => true,
            ProviderError::Api(ApiError::Http { status, .. }) => *status >= 500,
            ProviderError::Api(ApiError::ServiceUnavailable) => true,
            _ => false,
        }
    }

    /// Whether this failure says something about the provider's health.
    ///
    /// Gate rejections and caller mistakes never feed the circuit breaker.
    pub fn counts_toward_circuit(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout { .. }
            | ProviderError::Json(_)
            | ProviderError::Api(ApiError::ServiceUnavailable) => true,
            ProviderError::Api(ApiError::Http { status, .. }) => *status >= 500,
            _ => false,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ProviderError::Validation(_) | ProviderError::UnsupportedTarget { .. } => {
                ErrorCode::ValidationError
            }
            ProviderError::UnknownProvider { .. } => ErrorCode::NotFound,
            ProviderError::PolicyBlocked { .. } => ErrorCode::NotConfigured,
            ProviderError::BudgetExceeded { .. }
            | ProviderError::RateLimited { .. }
            | ProviderError::QueryVolumeExceeded { .. } => ErrorCode::RateLimited,
            ProviderError::CircuitOpen { .. } => ErrorCode::ApiError,
            ProviderError::Api(api) => match api {
                ApiError::Http { status: 404, .. } => ErrorCode::NotFound,
                ApiError::Http { status: 429, .. } => ErrorCode::RateLimited,
                ApiError::Http {
                    status: 401 | 403, ..
                } => ErrorCode::AuthFailed,
                ApiError::Http { .. } | ApiError::ServiceUnavailable => ErrorCode::ApiError,
                ApiError::Authentication => ErrorCode::AuthFailed,
                ApiError::NotConfigured { .. } => ErrorCode::NotConfigured,
            },
            ProviderError::Network(_) | ProviderError::Json(_) => ErrorCode::ApiError,
            ProviderError::Timeout { .. } => ErrorCode::Timeout,
        }
    }

    /// Suggested wait before the caller tries again, in whole seconds
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after, .. }
            | ProviderError::QueryVolumeExceeded { retry_after }
            | ProviderError::CircuitOpen { retry_after, .. } => {
                Some(ceil_secs(*retry_after).max(1))
            }
            _ => None,
        }
    }

    /// Short machine-readable reason used in synthetic findings
    pub fn reason_code(&self) -> &'static str {
        match self {
            ProviderError::PolicyBlocked { .. } => "policy_blocked",
            ProviderError::BudgetExceeded { .. } => "budget_exceeded",
            ProviderError::CircuitOpen { .. } => "circuit_open",
            ProviderError::QueryVolumeExceeded { .. } => "query_volume",
            other => other.code().as_str(),
        }
    }

    /// Whether the failed attempt actually sent a request upstream
    pub fn reached_provider(&self) -> bool {
        match self {
            ProviderError::Validation(_)
            | ProviderError::UnknownProvider { .. }
            | ProviderError::UnsupportedTarget { .. }
            | ProviderError::PolicyBlocked { .. }
            | ProviderError::BudgetExceeded { .. }
            | ProviderError::QueryVolumeExceeded { .. }
            | ProviderError::CircuitOpen { .. }
            | ProviderError::Api(ApiError::NotConfigured { .. }) => false,
            _ => true,
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

impl ApplicationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApplicationError::Domain(_) | ApplicationError::Json(_) => ErrorCode::ValidationError,
            ApplicationError::Provider(e) => e.code(),
            ApplicationError::Store(_) => ErrorCode::ApiError,
            ApplicationError::Configuration { .. } => ErrorCode::NotConfigured,
            ApplicationError::NotFound { .. } => ErrorCode::NotFound,
        }
    }

    /// Message safe to show a client; internals are not echoed back
    pub fn public_message(&self) -> String {
        match self {
            ApplicationError::Domain(DomainError::InvalidInput { message, .. }) => message.clone(),
            ApplicationError::Domain(e) => e.to_string(),
            ApplicationError::Json(_) => "Invalid JSON format".to_string(),
            ApplicationError::Store(_) => "Internal server error".to_string(),
            ApplicationError::Provider(e) => match e {
                ProviderError::Validation(DomainError::InvalidInput { message, .. }) => {
                    message.clone()
                }
                ProviderError::Network(_) | ProviderError::Json(_) => {
                    "Upstream provider request failed".to_string()
                }
                ProviderError::Api(ApiError::Http { status, .. }) => {
                    format!("Upstream provider returned status {}", status)
                }
                other => other.to_string(),
            },
            other => other.to_string(),
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ApplicationError::Provider(e) => e.retry_after_secs(),
            _ => None,
        }
    }
}
