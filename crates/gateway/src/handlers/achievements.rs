//! Achievement handlers

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use scholarsearch_common::auth::Caller;
use scholarsearch_common::errors::{AppError, Result};
use scholarsearch_search::{AchievementView, PageRequest, ResultPage, SearchCriteria};
use serde::Deserialize;
use validator::Validate;

/// Query string of an advanced search
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub keyword: Option<String>,
    /// Concept facet
    pub field: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub author_name: Option<String>,
    pub institution_name: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl SearchParams {
    fn into_parts(self, state: &AppState) -> (SearchCriteria, PageRequest) {
        let page = PageRequest::normalize(self.page, self.size, &state.config.search);
        let criteria = SearchCriteria {
            keyword: self.keyword,
            facet: self.field,
            start_date: self.start_date,
            end_date: self.end_date,
            author_name: self.author_name,
            institution_name: self.institution_name,
        };
        (criteria, page)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchRequest {
    #[validate(length(min = 1, max = 100))]
    pub ids: Vec<String>,
}

fn require_user(caller: &Caller) -> Result<()> {
    if caller.is_authenticated() {
        Ok(())
    } else {
        Err(AppError::Unauthorized {
            message: "a signed-in user is required".to_string(),
        })
    }
}

/// Advanced search
pub async fn search(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<SearchParams>,
) -> Result<Json<ResultPage<AchievementView>>> {
    let (criteria, page) = params.into_parts(&state);
    let result = state.achievements.advanced_search(criteria, page, &caller).await?;
    Ok(Json(result))
}

/// One achievement; counts a read
pub async fn get_achievement(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<AchievementView>> {
    let view = state.achievements.get_by_id(&id, &caller).await?;
    Ok(Json(view))
}

/// Several achievements by id
pub async fn batch(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<BatchRequest>,
) -> Result<Json<Vec<AchievementView>>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("ids".to_string()),
    })?;

    let views = state.achievements.get_by_ids(&request.ids, &caller).await?;
    Ok(Json(views))
}

/// Count a favourite in the background
pub async fn add_favorite(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    require_user(&caller)?;
    drop(state.achievements.increment_favorite(&id));
    Ok(StatusCode::ACCEPTED)
}

/// Remove a favourite in the background
pub async fn remove_favorite(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    require_user(&caller)?;
    drop(state.achievements.decrement_favorite(&id));
    Ok(StatusCode::ACCEPTED)
}
