//! Default topic for criteria-less searches

use scholarsearch_common::db::PopularityStore;
use scholarsearch_common::{AppError, Result};
use std::sync::Arc;
use tracing::debug;

/// Supplies the most popular concept when a search names no criteria
pub struct FallbackPolicy {
    store: Arc<dyn PopularityStore>,
}

impl FallbackPolicy {
    pub fn new(store: Arc<dyn PopularityStore>) -> Self {
        Self { store }
    }

    /// The current most popular topic. Without any search history there is
    /// nothing sensible to show, which is reported as missing criteria.
    pub async fn default_topic(&self) -> Result<String> {
        let topic = self
            .store
            .most_popular()
            .await?
            .filter(|t| !t.trim().is_empty())
            .ok_or(AppError::NoSearchCriteria)?;

        debug!(topic = %topic, "Using popular topic as implicit filter");
        Ok(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarsearch_common::db::{MemoryPopularityStore, MonthlyCounts};

    #[tokio::test]
    async fn test_picks_highest_count() {
        let store = Arc::new(MemoryPopularityStore::new());
        store.seed("Catalysis", 3, MonthlyCounts::default()).await;
        store.seed("Machine learning", 11, MonthlyCounts::default()).await;

        let policy = FallbackPolicy::new(store);
        assert_eq!(policy.default_topic().await.unwrap(), "Machine learning");
    }

    #[tokio::test]
    async fn test_empty_store_is_invalid_input() {
        let policy = FallbackPolicy::new(Arc::new(MemoryPopularityStore::new()));
        assert!(matches!(policy.default_topic().await, Err(AppError::NoSearchCriteria)));
    }
}
