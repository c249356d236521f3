//! Engagement counters
//!
//! Read and favourite counts live on the stored work and are changed by an
//! update script inside the index. Every failure here is logged and
//! swallowed: a counter must never fail the action that triggered it.

use chrono::{Datelike, Utc};
use scholarsearch_common::db::PopularityStore;
use scholarsearch_common::index::documents::{fields, AchievementDocument};
use scholarsearch_common::index::{Collection, DocumentIndex, UpdateScript};
use scholarsearch_common::metrics;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct EngagementCounters {
    index: Arc<dyn DocumentIndex>,
    popularity: Arc<dyn PopularityStore>,
}

impl EngagementCounters {
    pub fn new(index: Arc<dyn DocumentIndex>, popularity: Arc<dyn PopularityStore>) -> Self {
        Self { index, popularity }
    }

    pub async fn increment_read(&self, id: &str) {
        self.apply(id, fields::READ_COUNT, 1).await;
    }

    pub async fn increment_favorite(&self, id: &str) {
        self.apply(id, fields::FAVOURITE_COUNT, 1).await;
    }

    /// No-op once the count has reached zero
    pub async fn decrement_favorite(&self, id: &str) {
        self.apply(id, fields::FAVOURITE_COUNT, -1).await;
    }

    /// Count one view of `document` in the background: its read counter and
    /// the current month bucket of each of its concepts.
    pub fn record_view(&self, document: &AchievementDocument) -> JoinHandle<()> {
        let counters = self.clone();
        let id = document.id.clone();
        let concepts = document.concepts.clone();

        tokio::spawn(async move {
            let popularity = async {
                if concepts.is_empty() {
                    return;
                }
                let month = Utc::now().month();
                if let Err(e) = counters.popularity.record(&concepts, month).await {
                    warn!(id = %id, error = %e, "Concept popularity update failed");
                }
            };
            tokio::join!(counters.increment_read(&id), popularity);
        })
    }

    /// Fire-and-forget favourite toggle
    pub fn dispatch_favorite(&self, id: &str, saved: bool) -> JoinHandle<()> {
        let counters = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if saved {
                counters.increment_favorite(&id).await;
            } else {
                counters.decrement_favorite(&id).await;
            }
        })
    }

    async fn apply(&self, id: &str, field: &str, delta: i64) {
        let script = UpdateScript::increment(field, delta);
        match self.index.update(Collection::Works, id, &script).await {
            Ok(()) => {
                debug!(id, field, delta, "Counter updated");
                metrics::record_counter_update(field, true);
            }
            Err(e) => {
                warn!(id, field, delta, error = %e, "Counter update failed");
                metrics::record_counter_update(field, false);
            }
        }
    }
}
