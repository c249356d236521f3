//! Hot topics from recorded concept views

use chrono::{Datelike, Utc};
use scholarsearch_common::db::{KeywordStats, PopularityStore};
use scholarsearch_common::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "1y")]
    LastYear,
    #[serde(rename = "3m")]
    LastQuarter,
}

impl FromStr for TimeRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "all" => Ok(TimeRange::All),
            "1y" => Ok(TimeRange::LastYear),
            "3m" => Ok(TimeRange::LastQuarter),
            other => Err(AppError::Validation {
                message: format!("unknown time range '{}', expected all, 1y or 3m", other),
                field: Some("time_range".to_string()),
            }),
        }
    }
}

impl TimeRange {
    fn weight(&self, stats: &KeywordStats, current_month: u32) -> i64 {
        match self {
            TimeRange::All => stats.total,
            TimeRange::LastYear => stats.monthly.total(),
            TimeRange::LastQuarter => stats.monthly.sum_recent(current_month, 3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicWeight {
    pub topic: String,
    pub weight: i64,
}

pub struct TopicService {
    store: Arc<dyn PopularityStore>,
}

impl TopicService {
    pub fn new(store: Arc<dyn PopularityStore>) -> Self {
        Self { store }
    }

    pub async fn hot_topics(&self, range: TimeRange) -> Result<Vec<TopicWeight>> {
        self.hot_topics_at(range, Utc::now().month()).await
    }

    /// Topics with a non-zero weight in `range`, heaviest first
    pub async fn hot_topics_at(&self, range: TimeRange, current_month: u32) -> Result<Vec<TopicWeight>> {
        let mut topics: Vec<TopicWeight> = self
            .store
            .all()
            .await?
            .iter()
            .map(|stats| TopicWeight {
                topic: stats.keyword.clone(),
                weight: range.weight(stats, current_month),
            })
            .filter(|t| t.weight > 0)
            .collect();

        topics.sort_by(|a, b| b.weight.cmp(&a.weight));
        Ok(topics)
    }
}
