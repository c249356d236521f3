//! Search analysis handlers

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use scholarsearch_common::errors::Result;
use scholarsearch_search::{TimeRange, TopicWeight};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HotTopicParams {
    #[serde(default = "default_time_range")]
    pub time_range: String,
}

fn default_time_range() -> String {
    "all".to_string()
}

pub async fn hot_topics(
    State(state): State<AppState>,
    Query(params): Query<HotTopicParams>,
) -> Result<Json<Vec<TopicWeight>>> {
    let range: TimeRange = params.time_range.parse()?;
    Ok(Json(state.topics.hot_topics(range).await?))
}
