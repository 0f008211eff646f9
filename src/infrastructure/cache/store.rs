//! Durable key/value store for cross-instance vendor bookkeeping

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::application::errors::StoreError;

/// One persisted row: cached payload plus bookkeeping columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    pub record_type: String,
    pub value: serde_json::Value,
    pub hit_count: u64,
    pub ttl_seconds: u64,
    pub expires_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(
        key: impl Into<String>,
        record_type: impl Into<String>,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Self {
        let ttl_seconds = ttl.as_secs();
        Self {
            key: key.into(),
            record_type: record_type.into(),
            value,
            hit_count: 0,
            ttl_seconds,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl_seconds as i64),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Shared store for records and expiring counters.
///
/// Counters are read-then-increment without compare-and-swap; callers accept a
/// narrow overshoot under heavy concurrency.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch a live record, bumping its hit count
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StoreError>;

    async fn put(&self, record: StoredRecord) -> Result<(), StoreError>;

    /// Increment a counter, setting its expiry when first created
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

    /// Current counter value, zero when absent or expired
    async fn counter(&self, key: &str) -> Result<u64, StoreError>;

    /// Backend name for health reporting
    fn backend(&self) -> &'static str;
}

#[derive(Debug, Clone)]
struct Counter {
    value: u64,
    expires_at: DateTime<Utc>,
}

/// Process-local store used in development and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, StoredRecord>>,
    counters: Mutex<HashMap<String, Counter>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        let mut records = self.records.lock().await;
        let now = Utc::now();

        if records.get(key).is_some_and(|r| r.is_expired(now)) {
            records.remove(key);
            return Ok(None);
        }

        Ok(records.get_mut(key).map(|record| {
            record.hit_count += 1;
            record.clone()
        }))
    }

    async fn put(&self, record: StoredRecord) -> Result<(), StoreError> {
        self.records.lock().await.insert(record.key.clone(), record);
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut counters = self.counters.lock().await;
        let now = Utc::now();

        let counter = counters
            .entry(key.to_string())
            .and_modify(|c| {
                if now > c.expires_at {
                    c.value = 0;
                    c.expires_at = now + chrono::Duration::seconds(ttl.as_secs() as i64);
                }
            })
            .or_insert_with(|| Counter {
                value: 0,
                expires_at: now + chrono::Duration::seconds(ttl.as_secs() as i64),
            });
        counter.value += 1;
        Ok(counter.value)
    }

    async fn counter(&self, key: &str) -> Result<u64, StoreError> {
        let counters = self.counters.lock().await;
        let now = Utc::now();
        Ok(counters
            .get(key)
            .filter(|c| now <= c.expires_at)
            .map(|c| c.value)
            .unwrap_or(0))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
