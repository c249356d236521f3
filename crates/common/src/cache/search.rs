//! Search result page cache
//!
//! Pages are only ever evicted by TTL. Writes to the index (new documents,
//! counter updates) do not invalidate anything, so a cached page may be up to
//! one TTL stale.

use super::keys::PageKey;
use super::CacheStore;
use crate::metrics;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Records of a result page plus the total hit count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPage<T> {
    pub records: Vec<T>,
    pub total: u64,
}

/// Page cache over any `CacheStore`. Store failures read as misses.
#[derive(Clone)]
pub struct SearchCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &PageKey) -> Option<CachedPage<T>> {
        let full_key = key.to_string();
        let raw = match self.store.get_raw(&full_key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache store unavailable, recomputing");
                None
            }
        };

        let page = raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(key = %full_key, error = %e, "Discarding unreadable cached page");
                None
            }
        });

        metrics::record_cache(page.is_some(), key.namespace);
        page
    }

    pub async fn put<T: Serialize>(&self, key: &PageKey, page: &CachedPage<T>) {
        let full_key = key.to_string();
        let json = match serde_json::to_string(page) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to serialize page, not caching");
                return;
            }
        };

        match self.store.set_raw(&full_key, &json, self.ttl).await {
            Ok(()) => debug!(key = %full_key, records = page.records.len(), "Cached page"),
            Err(e) => warn!(key = %full_key, error = %e, "Failed to cache page, continuing without cache"),
        }
    }
}
