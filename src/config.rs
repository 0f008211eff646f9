//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub runtime: RuntimeConfig,
    pub spend: SpendConfig,
    pub policy: PolicyConfig,
    pub store: StoreConfig,
    pub vendor: VendorConfig,
    pub providers: ProvidersConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whether to serve the OpenAPI document. Should be false in hardened production.
    pub enable_docs: bool,
    /// Global request timeout in seconds applied at the HTTP layer.
    pub request_timeout_seconds: u64,
    /// Allowed CORS origins. Use ["*"] to allow any (development only). Empty vector -> no external origins.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_docs: true,
            request_timeout_seconds: 30,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Settings shared by every orchestrated provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub call_timeout_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub default_rate_limit_per_minute: u32,
    /// Per-provider overrides of the rate limit, keyed by provider id
    pub rate_limits: HashMap<String, u32>,
    pub rate_refill_interval_seconds: u64,
    pub circuit_failure_threshold: u32,
    pub circuit_cooldown_seconds: u64,
    /// Interval of the background purge of expired in-memory cache entries
    pub cache_purge_interval_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 12_000,
            max_retries: 1,
            backoff_base_ms: 500,
            backoff_max_ms: 5_000,
            default_rate_limit_per_minute: 60,
            rate_limits: HashMap::new(),
            rate_refill_interval_seconds: 60,
            circuit_failure_threshold: 5,
            circuit_cooldown_seconds: 60,
            cache_purge_interval_seconds: 300,
        }
    }
}

impl RuntimeConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn rate_limit_for(&self, provider_id: &str) -> u32 {
        self.rate_limits
            .get(provider_id)
            .copied()
            .unwrap_or(self.default_rate_limit_per_minute)
    }
}

/// Daily quota and monthly budget limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpendConfig {
    pub default_daily_quota: u64,
    pub default_monthly_budget: f64,
    pub warn_threshold: f64,
    pub hard_fail_threshold: f64,
    pub hard_fail_enabled: bool,
    pub overrides: HashMap<String, SpendLimits>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendLimits {
    pub daily_quota: Option<u64>,
    pub monthly_budget: Option<f64>,
}

impl Default for SpendConfig {
    fn default() -> Self {
        Self {
            default_daily_quota: 1000,
            default_monthly_budget: 50.0,
            warn_threshold: 0.80,
            hard_fail_threshold: 0.95,
            hard_fail_enabled: true,
            overrides: HashMap::new(),
        }
    }
}

impl SpendConfig {
    pub fn daily_quota_for(&self, provider_id: &str) -> u64 {
        self.overrides
            .get(provider_id)
            .and_then(|o| o.daily_quota)
            .unwrap_or(self.default_daily_quota)
    }

    pub fn monthly_budget_for(&self, provider_id: &str) -> f64 {
        self.overrides
            .get(provider_id)
            .and_then(|o| o.monthly_budget)
            .unwrap_or(self.default_monthly_budget)
    }
}

/// Named policy gates, keyed by tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub gates: HashMap<String, PolicyGateConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyGateConfig {
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let mut gates = HashMap::new();
        gates.insert(
            "darkweb".to_string(),
            PolicyGateConfig {
                enabled: false,
                description: "Dark-web and leak-site sources".to_string(),
            },
        );
        gates.insert(
            "enterprise".to_string(),
            PolicyGateConfig {
                enabled: true,
                description: "Contracted enterprise intelligence feeds".to_string(),
            },
        );
        Self { gates }
    }
}

/// Durable key/value store backing vendor quota and cache rows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `memory` or `redis`
    pub backend: String,
    pub redis_url: String,
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "intel-relay".to_string(),
        }
    }
}

/// Reputation vendor integration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    pub auth_url: String,
    pub intel_url: String,
    pub passive_dns_url: String,
    pub content_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub content_key: Option<String>,
    pub timeout_seconds: u64,
    pub token_lifetime_seconds: u64,
    pub token_refresh_buffer_seconds: u64,
    pub cache_ttl_seconds: u64,
    /// How long enrichment audit rows are kept in the durable store
    pub audit_retention_days: u64,
    pub limits: QueryVolumeLimits,
}

/// Allowable query volume per window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryVolumeLimits {
    pub per_second: u64,
    pub per_minute: u64,
    pub per_hour: u64,
    pub per_day: u64,
}

impl Default for QueryVolumeLimits {
    fn default() -> Self {
        Self {
            per_second: 5,
            per_minute: 100,
            per_hour: 2_000,
            per_day: 20_000,
        }
    }
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            auth_url: "https://api.spamhaus.org/api/v1/login".to_string(),
            intel_url: "https://api.spamhaus.org/api/intel/v2/byobject".to_string(),
            passive_dns_url: "https://api.spamhaus.org/api/intel/v1/pdns".to_string(),
            content_url: "https://api.spamhaus.org/api/intel/v2/content".to_string(),
            username: None,
            password: None,
            content_key: None,
            timeout_seconds: 10,
            token_lifetime_seconds: 55 * 60,
            token_refresh_buffer_seconds: 5 * 60,
            cache_ttl_seconds: 24 * 3600,
            audit_retention_days: 90,
            limits: QueryVolumeLimits::default(),
        }
    }
}

impl VendorConfig {
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Connection settings for one generic HTTP provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub breach_lookup: ProviderEndpoint,
    pub ip_abuse: ProviderEndpoint,
    pub leak_search: ProviderEndpoint,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            breach_lookup: ProviderEndpoint {
                base_url: "https://haveibeenpwned.com/api/v3".to_string(),
                api_key: None,
            },
            ip_abuse: ProviderEndpoint {
                base_url: "https://api.abuseipdb.com/api/v2".to_string(),
                api_key: None,
            },
            leak_search: ProviderEndpoint {
                base_url: "https://leakcheck.io/api/v2".to_string(),
                api_key: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        // Override with environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder
            .add_source(
                config::Environment::with_prefix("INTEL_RELAY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
