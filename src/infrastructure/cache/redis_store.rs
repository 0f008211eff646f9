//! Redis-backed durable store with connection pooling

use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Config as RedisConfig, Connection, Pool, Runtime};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, error, info};

use super::store::{DurableStore, StoredRecord};
use crate::application::errors::StoreError;
use crate::config::StoreConfig;

/// Redis store shared by every service instance
pub struct RedisStore {
    pool: Pool,
    key_prefix: String,
}

impl RedisStore {
    /// Create the pool and verify connectivity with a PING
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = RedisConfig::from_url(&config.redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                error!("Failed to create Redis connection pool: {}", e);
                StoreError::Connection {
                    message: format!("Redis pool creation failed: {}", e),
                }
            })?;

        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Redis store initialized successfully");

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    async fn connection(&self) -> Result<Connection, StoreError> {
        self.pool.get().await.map_err(|e| {
            error!("Failed to get Redis connection: {}", e);
            StoreError::RedisPool(e)
        })
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.connection().await?;

        let raw: Option<String> = conn.get(&full_key).await?;
        let Some(raw) = raw else {
            debug!(key, "Store miss");
            return Ok(None);
        };

        let mut record: StoredRecord = serde_json::from_str(&raw)?;
        let now = Utc::now();
        if record.is_expired(now) {
            let _: () = conn.del(&full_key).await?;
            return Ok(None);
        }

        record.hit_count += 1;
        let remaining = (record.expires_at - now).num_seconds().max(1) as u64;
        let _: () = conn
            .set_ex(&full_key, serde_json::to_string(&record)?, remaining)
            .await?;

        debug!(key, hit_count = record.hit_count, "Store hit");
        Ok(Some(record))
    }

    async fn put(&self, record: StoredRecord) -> Result<(), StoreError> {
        let full_key = self.full_key(&record.key);
        let mut conn = self.connection().await?;

        let ttl = record.ttl_seconds.max(1);
        let _: () = conn
            .set_ex(&full_key, serde_json::to_string(&record)?, ttl)
            .await?;
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.connection().await?;

        let value: u64 = conn.incr(&full_key, 1u64).await?;
        if value == 1 {
            let _: () = conn
                .expire(&full_key, ttl.as_secs().max(1) as i64)
                .await?;
        }
        Ok(value)
    }

    async fn counter(&self, key: &str) -> Result<u64, StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.connection().await?;

        let value: Option<u64> = conn.get(&full_key).await?;
        Ok(value.unwrap_or(0))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
