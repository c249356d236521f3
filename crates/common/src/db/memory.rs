//! In-process relational collaborators for tests and local runs

use super::repository::{distinct_keywords, KeywordStats, PopularityStore, SavedItems};
use super::MonthlyCounts;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Keyword popularity kept in a vector, in first-seen order
#[derive(Default)]
pub struct MemoryPopularityStore {
    keywords: RwLock<Vec<KeywordStats>>,
}

impl MemoryPopularityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a keyword with a lifetime total and month buckets
    pub async fn seed(&self, keyword: &str, total: i64, monthly: MonthlyCounts) {
        self.keywords.write().await.push(KeywordStats {
            keyword: keyword.to_string(),
            total,
            monthly,
        });
    }
}

#[async_trait]
impl PopularityStore for MemoryPopularityStore {
    async fn most_popular(&self) -> Result<Option<String>> {
        let keywords = self.keywords.read().await;
        // First-seen wins ties, like a stable descending sort
        let top = keywords
            .iter()
            .fold(None::<&KeywordStats>, |best, k| match best {
                Some(b) if b.total >= k.total => Some(b),
                _ => Some(k),
            });
        Ok(top.map(|k| k.keyword.clone()))
    }

    async fn record(&self, keywords: &[String], month: u32) -> Result<()> {
        let mut stored = self.keywords.write().await;
        for keyword in distinct_keywords(keywords) {
            match stored.iter_mut().find(|k| k.keyword == keyword) {
                Some(stats) => {
                    stats.total += 1;
                    stats.monthly.increment(month);
                }
                None => {
                    let mut monthly = MonthlyCounts::default();
                    monthly.increment(month);
                    stored.push(KeywordStats {
                        keyword: keyword.to_string(),
                        total: 1,
                        monthly,
                    });
                }
            }
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<KeywordStats>> {
        Ok(self.keywords.read().await.clone())
    }
}

/// Saved `(user, achievement)` pairs
#[derive(Default)]
pub struct MemorySavedItems {
    saved: RwLock<HashSet<(String, String)>>,
    failing: AtomicBool,
}

impl MemorySavedItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, user_id: &str, achievement_id: &str) {
        self.saved
            .write()
            .await
            .insert((user_id.to_string(), achievement_id.to_string()));
    }

    /// Make every lookup fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SavedItems for MemorySavedItems {
    async fn is_saved(&self, user_id: &str, achievement_id: &str) -> Result<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection {
                message: "saved items unavailable".to_string(),
            });
        }
        Ok(self
            .saved
            .read()
            .await
            .contains(&(user_id.to_string(), achievement_id.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_most_popular_tracks_records() {
        let store = MemoryPopularityStore::new();
        assert_eq!(store.most_popular().await.unwrap(), None);

        store.seed("Graphene", 5, MonthlyCounts::default()).await;
        store.seed("Catalysis", 5, MonthlyCounts::default()).await;
        assert_eq!(store.most_popular().await.unwrap().as_deref(), Some("Graphene"));

        store.record(&["Catalysis".to_string()], 4).await.unwrap();
        assert_eq!(store.most_popular().await.unwrap().as_deref(), Some("Catalysis"));

        let all = store.all().await.unwrap();
        let catalysis = all.iter().find(|k| k.keyword == "Catalysis").unwrap();
        assert_eq!(catalysis.monthly.get(4), 1);
    }

    #[tokio::test]
    async fn test_concurrent_views_all_count() {
        let store = std::sync::Arc::new(MemoryPopularityStore::new());
        let views: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                // Same concepts, listed in either order
                let keywords = if i % 2 == 0 {
                    vec!["Physics".to_string(), "Optics".to_string()]
                } else {
                    vec!["Optics".to_string(), "Physics".to_string()]
                };
                tokio::spawn(async move { store.record(&keywords, 6).await })
            })
            .collect();
        for view in views {
            view.await.unwrap().unwrap();
        }

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|k| k.total == 50 && k.monthly.get(6) == 50));
    }

    #[tokio::test]
    async fn test_repeated_keyword_counts_once_per_view() {
        let store = MemoryPopularityStore::new();
        let keywords = vec!["Physics".to_string(), "Physics".to_string()];
        store.record(&keywords, 1).await.unwrap();
        assert_eq!(store.all().await.unwrap()[0].total, 1);
    }

    #[tokio::test]
    async fn test_saved_items() {
        let saved = MemorySavedItems::new();
        saved.save("u1", "W1").await;
        assert!(saved.is_saved("u1", "W1").await.unwrap());
        assert!(!saved.is_saved("u2", "W1").await.unwrap());

        saved.set_failing(true);
        assert!(saved.is_saved("u1", "W1").await.is_err());
    }
}
