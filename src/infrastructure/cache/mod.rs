//! Caching and durable storage implementations

pub mod memory_cache;
pub mod redis_store;
pub mod store;

pub use memory_cache::{CacheStats, ProviderCache};
pub use redis_store::RedisStore;
pub use store::{DurableStore, MemoryStore, StoredRecord};

use std::sync::Arc;

use crate::application::errors::ApplicationError;
use crate::config::StoreConfig;

/// Build the configured durable store backend
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn DurableStore>, ApplicationError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "redis" => Ok(Arc::new(RedisStore::connect(config).await?)),
        other => Err(ApplicationError::Configuration {
            message: format!("Unknown store backend '{}'", other),
        }),
    }
}
