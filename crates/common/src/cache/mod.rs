//! Redis cache integration
//!
//! Provides:
//! - The `CacheStore` seam over a key/value store with TTL
//! - Redis and in-process implementations
//! - Search result page caching
//! - Cache key builders

mod memory;
mod search;

pub use memory::MemoryCacheStore;
pub use search::{CachedPage, SearchCache};

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::debug;

const CONNECT_RETRIES: usize = 2;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Key/value store with per-entry expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value; expired entries read as absent
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Store a value that expires after `ttl`
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

/// Redis cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL (redis://host:port)
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "scholarsearch".to_string(),
        }
    }
}

impl From<&crate::config::RedisConfig> for CacheConfig {
    fn from(config: &crate::config::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            key_prefix: config.key_prefix.clone(),
        }
    }
}

/// Redis cache client.
///
/// Holds a `ConnectionManager`, which reconnects after a dropped connection
/// and is cloned per command so requests never queue behind each other.
pub struct Cache {
    connection: ConnectionManager,
    config: CacheConfig,
}

/// `prefix:key`
fn prefixed(prefix: &str, key: &str) -> String {
    format!("{}:{}", prefix, key)
}

impl Cache {
    /// Create a new cache client
    pub async fn new(config: CacheConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(CONNECT_RETRIES)
            .set_connection_timeout(CONNECT_TIMEOUT);
        let connection = client
            .get_connection_manager_with_config(manager_config)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self { connection, config })
    }

    fn key(&self, key: &str) -> String {
        prefixed(&self.config.key_prefix, key)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for Cache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let full_key = self.key(key);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to get key '{}': {}", full_key, e),
        })?;

        debug!(key = %full_key, hit = value.is_some(), "Cache get");
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let full_key = self.key(key);
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(&full_key, value, ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs, "Cache set");
        Ok(())
    }
}

/// Cache key builder helpers
pub mod keys {
    use sha2::{Digest, Sha256};
    use std::fmt;

    /// Namespace of advanced achievement search pages
    pub const ADVANCED_SEARCH: &str = "adv";

    /// Namespace of patent search pages
    pub const PATENT_SEARCH: &str = "patent";

    /// A namespaced page key
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PageKey {
        pub namespace: &'static str,
        pub digest: String,
    }

    impl fmt::Display for PageKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "search:{}:{}", self.namespace, self.digest)
        }
    }

    /// Build a result page key from already-normalised parameters.
    ///
    /// Parameters are NUL separated before hashing so `("ab", "c")` and
    /// `("a", "bc")` never collide.
    pub fn search_page(namespace: &'static str, params: &[&str], page: u32, size: u32) -> PageKey {
        let mut hasher = Sha256::new();
        for param in params {
            hasher.update(param.as_bytes());
            hasher.update(b"\x00");
        }
        hasher.update(page.to_string().as_bytes());
        hasher.update(b"\x00");
        hasher.update(size.to_string().as_bytes());

        PageKey {
            namespace,
            digest: hex::encode(hasher.finalize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::keys::*;
    use super::*;

    #[test]
    fn test_keys_carry_configured_prefix() {
        let config = crate::config::AppConfig::default();
        let cache_config = CacheConfig::from(&config.redis);
        let key = search_page(ADVANCED_SEARCH, &["graphene"], 0, 10);
        assert!(prefixed(&cache_config.key_prefix, &key.to_string()).starts_with("scholarsearch:search:adv:"));
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_cache_error() {
        let result = Cache::new(CacheConfig {
            url: "redis://127.0.0.1:1".to_string(),
            key_prefix: "t".to_string(),
        })
        .await;
        assert!(matches!(result, Err(AppError::CacheError { .. })));
    }

    #[test]
    fn test_key_builders() {
        let key = search_page(ADVANCED_SEARCH, &["machine learning", "", "", "", "", ""], 0, 10);
        assert!(key.to_string().starts_with("search:adv:"));
        assert_eq!(key, search_page(ADVANCED_SEARCH, &["machine learning", "", "", "", "", ""], 0, 10));
    }

    #[test]
    fn test_namespaces_are_disjoint() {
        let adv = search_page(ADVANCED_SEARCH, &["graphene"], 0, 10);
        let patent = search_page(PATENT_SEARCH, &["graphene"], 0, 10);
        assert_ne!(adv.to_string(), patent.to_string());
    }

    #[test]
    fn test_page_and_boundaries_change_key() {
        let base = search_page(ADVANCED_SEARCH, &["ab", "c"], 0, 10);
        assert_ne!(base, search_page(ADVANCED_SEARCH, &["a", "bc"], 0, 10));
        assert_ne!(base, search_page(ADVANCED_SEARCH, &["ab", "c"], 1, 10));
        assert_ne!(base, search_page(ADVANCED_SEARCH, &["ab", "c"], 0, 20));
    }
}
