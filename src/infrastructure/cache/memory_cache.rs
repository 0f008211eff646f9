//! In-memory TTL cache for provider call results

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, interval};
use tracing::{debug, info, warn};

/// Cache entry with its absolute expiry
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    expires_at: Instant,
}

impl CacheEntry {
    /// An entry is still served at exactly `expires_at`, never after
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired_entries: u64,
    pub total_entries: u64,
    pub purge_runs: u64,
}

/// Process-local cache keyed by provider id plus hashed call parameters
#[derive(Debug, Default)]
pub struct ProviderCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    stats: Mutex<CacheStats>,
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache key from a provider id and its serialized parameters
    pub fn cache_key<P: Serialize + ?Sized>(provider_id: &str, params: &P) -> String {
        let serialized = serde_json::to_vec(params).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&serialized);
        format!("{}:{}", provider_id, hex::encode(hasher.finalize()))
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let mut expired = false;
        let result = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.data.clone()),
            Some(_) => {
                expired = true;
                None
            }
            None => None,
        };

        let mut stats = self.stats.lock().await;
        if expired {
            entries.remove(key);
            stats.expired_entries += 1;
            stats.total_entries = entries.len() as u64;
        }
        if result.is_some() {
            stats.hits += 1;
            debug!(key, "Cache hit");
        } else {
            stats.misses += 1;
            debug!(key, "Cache miss");
        }
        result
    }

    /// Typed read; entries that no longer deserialize are treated as a miss
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key, "Discarding undecodable cache entry: {}", e);
                self.invalidate(key).await;
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            data: value,
            expires_at: Instant::now() + ttl,
        };

        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), entry);
        self.stats.lock().await.total_entries = entries.len() as u64;
        debug!(key, ttl_secs = ttl.as_secs(), "Cache set");
    }

    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.stats.lock().await.total_entries = entries.len() as u64;
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = (before - entries.len()) as u64;

        let mut stats = self.stats.lock().await;
        stats.expired_entries += removed;
        stats.total_entries = entries.len() as u64;
        stats.purge_runs += 1;
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.lock().await.clone()
    }

    /// Start a background task that periodically purges expired entries
    pub fn start_background_purge(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = self.purge_expired().await;
                if removed > 0 {
                    info!(removed, "Purged expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_strictly_after_ttl() {
        let cache = ProviderCache::new();
        cache
            .set("breach_lookup:abc", json!({"count": 2}), Duration::from_secs(10))
            .await;

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("breach_lookup:abc").await, Some(json!({"count": 2})));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("breach_lookup:abc").await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.total_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_removes_only_expired() {
        let cache = ProviderCache::new();
        cache.set("short", json!(1), Duration::from_secs(1)).await;
        cache.set("long", json!(2), Duration::from_secs(100)).await;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.get("long").await, Some(json!(2)));
        assert_eq!(cache.stats().await.purge_runs, 1);
    }

    #[tokio::test]
    async fn test_typed_read_and_invalidate() {
        let cache = ProviderCache::new();
        cache.set("k", json!(["a", "b"]), Duration::from_secs(60)).await;

        let typed: Option<Vec<String>> = cache.get_as("k").await;
        assert_eq!(typed, Some(vec!["a".to_string(), "b".to_string()]));

        let wrong: Option<u32> = cache.get_as("k").await;
        assert!(wrong.is_none());
        assert_eq!(cache.get("k").await, None);
    }

    #[test]
    fn test_cache_key_depends_on_params() {
        let a = ProviderCache::cache_key("ip_abuse", &json!({"ip": "8.8.8.8"}));
        let b = ProviderCache::cache_key("ip_abuse", &json!({"ip": "1.1.1.1"}));
        let c = ProviderCache::cache_key("breach_lookup", &json!({"ip": "8.8.8.8"}));

        assert!(a.starts_with("ip_abuse:"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, ProviderCache::cache_key("ip_abuse", &json!({"ip": "8.8.8.8"})));
    }
}
