//! Resilience patterns for external provider calls

use crate::application::errors::ProviderError;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed through
    Closed,
    /// Circuit is open, requests are rejected without touching the network
    Open,
    /// Cooldown elapsed; exactly one trial request is allowed through
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before allowing a trial
    pub cooldown: Duration,
    /// How long a half-open trial may hold its slot without recording an outcome.
    /// A trial whose caller went away frees the slot once this lapses.
    pub trial_lease: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            trial_lease: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct ProviderCircuit {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    cooldown_until: Option<Instant>,
    trial_started_at: Option<Instant>,
}

impl ProviderCircuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            cooldown_until: None,
            trial_started_at: None,
        }
    }
}

/// Point-in-time view of one provider's circuit
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub provider: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub retry_after_seconds: Option<u64>,
}

/// Per-provider circuit breakers, created lazily on first failure
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<String, ProviderCircuit>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a call may proceed.
    ///
    /// Returns the remaining wait when the call must be rejected. A call admitted
    /// in the half-open state holds the single trial slot until an outcome is
    /// recorded, the slot is released, or the trial lease lapses.
    pub async fn check(&self, provider: &str) -> Result<(), Duration> {
        let mut circuits = self.circuits.lock().await;
        let Some(circuit) = circuits.get_mut(provider) else {
            return Ok(());
        };

        let now = Instant::now();
        match circuit.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => match circuit.cooldown_until {
                Some(until) if now < until => Err(until - now),
                _ => {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.trial_started_at = Some(now);
                    info!(provider, "Circuit half-open, allowing trial call");
                    Ok(())
                }
            },
            CircuitState::HalfOpen => match circuit.trial_started_at {
                Some(started) if now < started + self.config.trial_lease => {
                    Err((started + self.config.trial_lease - now).min(Duration::from_secs(1)))
                }
                Some(_) => {
                    warn!(provider, "Trial call never reported an outcome, granting a new trial");
                    circuit.trial_started_at = Some(now);
                    Ok(())
                }
                None => {
                    circuit.trial_started_at = Some(now);
                    Ok(())
                }
            },
        }
    }

    /// Record a successful call; failures decay toward zero
    pub async fn record_success(&self, provider: &str) {
        let mut circuits = self.circuits.lock().await;
        let Some(circuit) = circuits.get_mut(provider) else {
            return;
        };

        match circuit.state {
            CircuitState::HalfOpen => {
                circuit.state = CircuitState::Closed;
                circuit.failure_count = 0;
                circuit.cooldown_until = None;
                circuit.trial_started_at = None;
                info!(provider, "Circuit closed after successful trial");
            }
            CircuitState::Closed => {
                circuit.failure_count = circuit.failure_count.saturating_sub(1);
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call, opening the circuit at the threshold
    pub async fn record_failure(&self, provider: &str) {
        let mut circuits = self.circuits.lock().await;
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(ProviderCircuit::new);

        let now = Instant::now();
        circuit.failure_count += 1;
        circuit.last_failure_at = Some(now);

        match circuit.state {
            CircuitState::Closed => {
                if circuit.failure_count >= self.config.failure_threshold {
                    circuit.state = CircuitState::Open;
                    circuit.cooldown_until = Some(now + self.config.cooldown);
                    warn!(
                        provider,
                        failures = circuit.failure_count,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "Circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                circuit.state = CircuitState::Open;
                circuit.cooldown_until = Some(now + self.config.cooldown);
                circuit.trial_started_at = None;
                warn!(provider, "Trial call failed, circuit re-opened");
            }
            CircuitState::Open => {}
        }
    }

    /// Give back a half-open trial slot when the call never reached the provider
    pub async fn release(&self, provider: &str) {
        let mut circuits = self.circuits.lock().await;
        if let Some(circuit) = circuits.get_mut(provider) {
            if circuit.state == CircuitState::HalfOpen && circuit.trial_started_at.is_some() {
                circuit.trial_started_at = None;
                debug!(provider, "Trial slot released");
            }
        }
    }

    /// Manually close a provider's circuit; returns whether state existed
    pub async fn reset(&self, provider: &str) -> bool {
        let removed = self.circuits.lock().await.remove(provider).is_some();
        if removed {
            info!(provider, "Circuit manually reset");
        }
        removed
    }

    pub async fn snapshot(&self, provider: &str) -> CircuitSnapshot {
        let circuits = self.circuits.lock().await;
        match circuits.get(provider) {
            Some(circuit) => to_snapshot(provider, circuit),
            None => CircuitSnapshot {
                provider: provider.to_string(),
                state: CircuitState::Closed,
                failure_count: 0,
                retry_after_seconds: None,
            },
        }
    }

    pub async fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let circuits = self.circuits.lock().await;
        let mut snapshots: Vec<_> = circuits
            .iter()
            .map(|(provider, circuit)| to_snapshot(provider, circuit))
            .collect();
        snapshots.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshots
    }
}

fn to_snapshot(provider: &str, circuit: &ProviderCircuit) -> CircuitSnapshot {
    let retry_after_seconds = match (circuit.state, circuit.cooldown_until) {
        (CircuitState::Open, Some(until)) => {
            Some(until.saturating_duration_since(Instant::now()).as_secs())
        }
        _ => None,
    };

    CircuitSnapshot {
        provider: provider.to_string(),
        state: circuit.state,
        failure_count: circuit.failure_count,
        retry_after_seconds,
    }
}

/// Retry configuration for exponential backoff
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further retry
    pub base_delay: Duration,
    /// Upper bound on the un-jittered delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Jittered delay before retry number `retry` (1-based): half fixed, half random
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let capped = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        let half = capped / 2;
        let jitter_ms = rand::thread_rng().gen_range(0..=half.as_millis() as u64);
        half + Duration::from_millis(jitter_ms)
    }
}

/// Execute an operation with bounded exponential backoff retry.
///
/// The closure receives the 1-based attempt number. Non-retryable errors are
/// returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    provider: &str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt > config.max_retries || !error.is_retryable() {
                    return Err(error);
                }

                let delay = config.delay_for(attempt);
                warn!(
                    provider,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Provider call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
