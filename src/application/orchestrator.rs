//! Call orchestration shared by every provider integration
//!
//! Each provider call passes cache, circuit, rate, policy and spend checks in
//! that order before the underlying fetch runs under a timeout with bounded
//! jittered retry. Adapters never implement any of this themselves.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::errors::ProviderError;
use crate::config::{Config, PolicyConfig, RuntimeConfig, SpendConfig};
use crate::domain::Target;
use crate::infrastructure::{
    CircuitBreakerConfig, CircuitBreakerRegistry, PolicyGates, ProviderCache, ProviderRegistry,
    RetryConfig, SpendTracker, TokenBucketLimiter, retry_with_backoff,
};

/// Shared runtime state, constructed once and injected into the orchestrator
pub struct RuntimeContext {
    pub cache: Arc<ProviderCache>,
    pub circuits: CircuitBreakerRegistry,
    pub rate_limiter: TokenBucketLimiter,
    pub spend: SpendTracker,
    pub policy: PolicyGates,
    pub registry: ProviderRegistry,
    pub runtime: RuntimeConfig,
    pub retry: RetryConfig,
}

impl RuntimeContext {
    pub fn new(
        runtime: RuntimeConfig,
        spend: SpendConfig,
        policy: &PolicyConfig,
        registry: ProviderRegistry,
    ) -> Self {
        // Longest a single call can legitimately run: every attempt plus the backoff between them
        let attempts = runtime.max_retries + 1;
        let trial_lease = runtime.call_timeout() * attempts
            + Duration::from_millis(runtime.backoff_max_ms) * runtime.max_retries;

        Self {
            cache: Arc::new(ProviderCache::new()),
            circuits: CircuitBreakerRegistry::new(CircuitBreakerConfig {
                failure_threshold: runtime.circuit_failure_threshold,
                cooldown: Duration::from_secs(runtime.circuit_cooldown_seconds),
                trial_lease,
            }),
            rate_limiter: TokenBucketLimiter::new(Duration::from_secs(
                runtime.rate_refill_interval_seconds,
            )),
            spend: SpendTracker::new(spend),
            policy: PolicyGates::from_config(policy),
            registry,
            retry: RetryConfig {
                max_retries: runtime.max_retries,
                base_delay: Duration::from_millis(runtime.backoff_base_ms),
                max_delay: Duration::from_millis(runtime.backoff_max_ms),
            },
            runtime,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.runtime.clone(),
            config.spend.clone(),
            &config.policy,
            ProviderRegistry::default(),
        )
    }
}

/// Per-call overrides of the registry defaults
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Bypass the process cache; the result is still written back
    pub skip_cache: bool,
    /// Do not write the result into the process cache
    pub skip_cache_write: bool,
    pub timeout: Option<Duration>,
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct CallOutcome<T> {
    pub value: T,
    pub cache_hit: bool,
}

/// Runs provider calls through the shared runtime checks
#[derive(Clone)]
pub struct CallOrchestrator {
    context: Arc<RuntimeContext>,
}

impl CallOrchestrator {
    pub fn new(context: Arc<RuntimeContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    /// Execute `operation` for `provider_id` against `target`.
    ///
    /// The operation may be invoked more than once when the failure is
    /// retryable. A rejection by any gate never invokes it.
    pub async fn call<T, F, Fut>(
        &self,
        provider_id: &str,
        target: &Target,
        options: CallOptions,
        operation: F,
    ) -> Result<CallOutcome<T>, ProviderError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let ctx = &self.context;
        let descriptor = ctx
            .registry
            .get(provider_id)
            .ok_or_else(|| ProviderError::UnknownProvider {
                id: provider_id.to_string(),
            })?;

        if !descriptor.supports(target.target_type) {
            return Err(ProviderError::UnsupportedTarget {
                provider: provider_id.to_string(),
                target_type: target.target_type.to_string(),
            });
        }

        let cache_key = ProviderCache::cache_key(provider_id, target);
        if !options.skip_cache {
            if let Some(value) = ctx.cache.get_as::<T>(&cache_key).await {
                debug!(provider = provider_id, key = %cache_key, "Serving provider result from cache");
                return Ok(CallOutcome {
                    value,
                    cache_hit: true,
                });
            }
        }

        if let Err(retry_after) = ctx.circuits.check(provider_id).await {
            debug!(provider = provider_id, "Circuit open, failing fast");
            return Err(ProviderError::CircuitOpen {
                provider: provider_id.to_string(),
                retry_after,
            });
        }

        if let Err(error) = self.admit(provider_id, descriptor.policy_tag, descriptor.unit_cost).await {
            ctx.circuits.release(provider_id).await;
            return Err(error);
        }

        let timeout = options.timeout.unwrap_or_else(|| ctx.runtime.call_timeout());
        let unit_cost = descriptor.unit_cost;
        let spend = &ctx.spend;
        let operation = &operation;

        let result = retry_with_backoff(&ctx.retry, provider_id, |attempt| async move {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(timeout, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout {
                    millis: timeout.as_millis() as u64,
                }),
            };
            let latency_ms = started.elapsed().as_millis() as u64;
            let reached = match &outcome {
                Ok(_) => true,
                Err(error) => error.reached_provider(),
            };
            if reached {
                spend
                    .record_call(provider_id, outcome.is_ok(), latency_ms, unit_cost)
                    .await;
            }
            if let Err(error) = &outcome {
                debug!(provider = provider_id, attempt, error = %error, "Provider attempt failed");
            }
            outcome
        })
        .await;

        match result {
            Ok(value) => {
                ctx.circuits.record_success(provider_id).await;
                if !options.skip_cache_write {
                    let ttl = options.ttl.unwrap_or(descriptor.cache_ttl);
                    match serde_json::to_value(&value) {
                        Ok(json) => ctx.cache.set(&cache_key, json, ttl).await,
                        Err(e) => warn!(provider = provider_id, error = %e, "Result not cacheable"),
                    }
                }
                Ok(CallOutcome {
                    value,
                    cache_hit: false,
                })
            }
            Err(error) => {
                if error.counts_toward_circuit() {
                    ctx.circuits.record_failure(provider_id).await;
                } else {
                    ctx.circuits.release(provider_id).await;
                }
                info!(provider = provider_id, code = error.code().as_str(), error = %error, "Provider call failed");
                Err(error)
            }
        }
    }

    /// Rate, policy and spend gates, evaluated after the circuit admits the call
    async fn admit(
        &self,
        provider_id: &str,
        policy_tag: Option<&'static str>,
        unit_cost: f64,
    ) -> Result<(), ProviderError> {
        let ctx = &self.context;

        let capacity = ctx.runtime.rate_limit_for(provider_id);
        if let Err(retry_after) = ctx.rate_limiter.try_acquire(provider_id, capacity).await {
            return Err(ProviderError::RateLimited {
                provider: provider_id.to_string(),
                retry_after,
            });
        }

        if !ctx.policy.is_allowed(policy_tag) {
            return Err(ProviderError::PolicyBlocked {
                tag: policy_tag.unwrap_or_default().to_string(),
            });
        }

        let decision = ctx.spend.check_spend(provider_id, unit_cost).await;
        if !decision.allowed {
            return Err(ProviderError::BudgetExceeded {
                reason: decision
                    .reason
                    .unwrap_or_else(|| format!("Spend limit reached for {}", provider_id)),
            });
        }

        Ok(())
    }
}
