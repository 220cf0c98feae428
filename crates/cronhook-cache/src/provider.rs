//! Cache manager that dispatches to the configured provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use cronhook_core::config::CacheConfig;
use cronhook_core::error::AppError;
use cronhook_core::result::AppResult;
use cronhook_core::traits::cache::CacheProvider;

/// Cache manager that wraps the configured store provider.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// The inner cache provider.
    inner: Arc<dyn CacheProvider>,
    /// Provider name, for health reporting.
    kind: &'static str,
}

impl CacheManager {
    /// Create a new cache manager from configuration.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        let (inner, kind): (Arc<dyn CacheProvider>, &'static str) = match config.provider.as_str()
        {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis lock store");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                (Arc::new(crate::redis::RedisCacheProvider::new(client)), "redis")
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory lock store");
                let provider = crate::memory::MemoryCacheProvider::new(&config.memory);
                (Arc::new(provider), "memory")
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown cache provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner, kind })
    }

    /// Create a cache manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn CacheProvider>) -> Self {
        Self {
            inner: provider,
            kind: "custom",
        }
    }

    /// Name of the active provider (`memory`, `redis` or `custom`).
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

#[async_trait]
impl CacheProvider for CacheManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
