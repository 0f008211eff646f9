//! Rate limiting for provider calls
//!
//! [`TokenBucketLimiter`] is the process-local per-provider limiter used by the
//! call orchestrator. [`MultiWindowLimiter`] enforces the reputation vendor's
//! query volume across several windows through the shared durable store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::cache::DurableStore;
use crate::config::QueryVolumeLimits;

#[derive(Debug)]
struct Bucket {
    capacity: u32,
    tokens: u32,
    last_refill_at: Instant,
}

/// Token buckets refilled to full capacity at fixed interval boundaries
#[derive(Debug)]
pub struct TokenBucketLimiter {
    refill_interval: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucketLimiter {
    pub fn new(refill_interval: Duration) -> Self {
        Self {
            refill_interval,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Consume one token, or return the wait until the next refill boundary
    pub async fn try_acquire(&self, provider: &str, capacity: u32) -> Result<(), Duration> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(provider.to_string()).or_insert(Bucket {
            capacity,
            tokens: capacity,
            last_refill_at: now,
        });

        let elapsed = now.duration_since(bucket.last_refill_at);
        if elapsed >= self.refill_interval {
            let intervals = (elapsed.as_nanos() / self.refill_interval.as_nanos().max(1)) as u32;
            bucket.last_refill_at += self.refill_interval * intervals;
            bucket.capacity = capacity;
            bucket.tokens = capacity;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            Ok(())
        } else {
            let next_refill = bucket.last_refill_at + self.refill_interval;
            let wait = next_refill.saturating_duration_since(now);
            debug!(provider, wait_ms = wait.as_millis() as u64, "Rate limit reached");
            Err(wait)
        }
    }

    /// Remaining tokens for a provider, if a bucket exists
    pub async fn remaining(&self, provider: &str) -> Option<u32> {
        self.buckets.lock().await.get(provider).map(|b| b.tokens)
    }
}

/// Accounting window for query volume limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryWindow {
    Second,
    Minute,
    Hour,
    Day,
}

impl QueryWindow {
    pub const ALL: [QueryWindow; 4] = [
        QueryWindow::Second,
        QueryWindow::Minute,
        QueryWindow::Hour,
        QueryWindow::Day,
    ];

    pub fn seconds(&self) -> i64 {
        match self {
            QueryWindow::Second => 1,
            QueryWindow::Minute => 60,
            QueryWindow::Hour => 3_600,
            QueryWindow::Day => 86_400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryWindow::Second => "second",
            QueryWindow::Minute => "minute",
            QueryWindow::Hour => "hour",
            QueryWindow::Day => "day",
        }
    }

    fn limit(&self, limits: &QueryVolumeLimits) -> u64 {
        match self {
            QueryWindow::Second => limits.per_second,
            QueryWindow::Minute => limits.per_minute,
            QueryWindow::Hour => limits.per_hour,
            QueryWindow::Day => limits.per_day,
        }
    }
}

/// Durable multi-window limiter keyed by identifier type and value
pub struct MultiWindowLimiter {
    store: Arc<dyn DurableStore>,
    limits: QueryVolumeLimits,
}

impl MultiWindowLimiter {
    pub fn new(store: Arc<dyn DurableStore>, limits: QueryVolumeLimits) -> Self {
        Self { store, limits }
    }

    /// Counter key for one window instance
    pub fn window_key(
        identifier_type: &str,
        identifier: &str,
        window: QueryWindow,
        now: DateTime<Utc>,
    ) -> String {
        let window_index = now.timestamp().div_euclid(window.seconds());
        format!(
            "ratelimit:{}:{}:{}:{}",
            identifier_type,
            identifier,
            window.as_str(),
            window_index
        )
    }

    pub async fn check_and_record(
        &self,
        identifier_type: &str,
        identifier: &str,
    ) -> Result<(), Duration> {
        self.check_and_record_at(identifier_type, identifier, Utc::now())
            .await
    }

    /// Deny when any window is at its limit, otherwise count the query in every window.
    ///
    /// Store failures fail open.
    pub async fn check_and_record_at(
        &self,
        identifier_type: &str,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Duration> {
        for window in QueryWindow::ALL {
            let key = Self::window_key(identifier_type, identifier, window, now);
            let count = match self.store.counter(&key).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(key = %key, "Query volume check failed, allowing request: {}", e);
                    return Ok(());
                }
            };

            let limit = window.limit(&self.limits);
            if count >= limit {
                let window_secs = window.seconds();
                let window_end = (now.timestamp().div_euclid(window_secs) + 1) * window_secs;
                let retry_after = (window_end - now.timestamp()).max(1) as u64;
                warn!(
                    identifier_type,
                    window = window.as_str(),
                    count,
                    limit,
                    "Query volume limit reached"
                );
                return Err(Duration::from_secs(retry_after));
            }
        }

        for window in QueryWindow::ALL {
            let key = Self::window_key(identifier_type, identifier, window, now);
            if let Err(e) = self
                .store
                .increment(&key, Duration::from_secs(window.seconds() as u64))
                .await
            {
                warn!(key = %key, "Failed to record query volume: {}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::MemoryStore;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn test_exactly_capacity_calls_per_window() {
        let limiter = TokenBucketLimiter::new(Duration::from_secs(60));

        for _ in 0..3 {
            assert!(limiter.try_acquire("ip_abuse", 3).await.is_ok());
        }
        let wait = limiter.try_acquire("ip_abuse", 3).await.unwrap_err();
        assert_eq!(wait, Duration::from_secs(60));
        assert!(limiter.try_acquire("breach_lookup", 3).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_at_boundary_not_gradually() {
        let limiter = TokenBucketLimiter::new(Duration::from_secs(60));
        assert!(limiter.try_acquire("ip_abuse", 1).await.is_ok());

        tokio::time::advance(Duration::from_secs(59)).await;
        let wait = limiter.try_acquire("ip_abuse", 1).await.unwrap_err();
        assert_eq!(wait, Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire("ip_abuse", 1).await.is_ok());
        assert_eq!(limiter.remaining("ip_abuse").await, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_keeps_boundaries_aligned() {
        let limiter = TokenBucketLimiter::new(Duration::from_secs(10));
        assert!(limiter.try_acquire("p", 1).await.is_ok());

        tokio::time::advance(Duration::from_secs(25)).await;
        assert!(limiter.try_acquire("p", 1).await.is_ok());
        let wait = limiter.try_acquire("p", 1).await.unwrap_err();
        assert_eq!(wait, Duration::from_secs(5));
    }

    fn limits(per_second: u64, per_minute: u64) -> QueryVolumeLimits {
        QueryVolumeLimits {
            per_second,
            per_minute,
            per_hour: 1_000,
            per_day: 10_000,
        }
    }

    #[test]
    fn test_window_key_format() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 30).unwrap();
        let key = MultiWindowLimiter::window_key("ip", "8.8.8.8", QueryWindow::Minute, now);
        assert_eq!(key, format!("ratelimit:ip:8.8.8.8:minute:{}", now.timestamp() / 60));
    }

    #[tokio::test]
    async fn test_multi_window_denies_at_any_limit() {
        let store = Arc::new(MemoryStore::new());
        let limiter = MultiWindowLimiter::new(store, limits(2, 100));
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

        assert!(limiter.check_and_record_at("ip", "8.8.8.8", now).await.is_ok());
        assert!(limiter.check_and_record_at("ip", "8.8.8.8", now).await.is_ok());
        let wait = limiter
            .check_and_record_at("ip", "8.8.8.8", now)
            .await
            .unwrap_err();
        assert_eq!(wait, Duration::from_secs(1));

        // A different identifier has its own windows
        assert!(limiter.check_and_record_at("ip", "1.1.1.1", now).await.is_ok());
    }

    #[tokio::test]
    async fn test_minute_window_reports_remaining_wait() {
        let store = Arc::new(MemoryStore::new());
        let limiter = MultiWindowLimiter::new(store, limits(100, 1));
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 15).unwrap();

        assert!(limiter.check_and_record_at("domain", "example.com", now).await.is_ok());
        let wait = limiter
            .check_and_record_at("domain", "example.com", now)
            .await
            .unwrap_err();
        assert_eq!(wait, Duration::from_secs(45));
    }
}
