//! Patent search handler

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use scholarsearch_common::errors::Result;
use scholarsearch_search::{PageRequest, PatentCriteria, PatentView, ResultPage};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatentParams {
    pub q: Option<String>,
    pub application_year: Option<i32>,
    pub grant_year: Option<i32>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<PatentParams>,
) -> Result<Json<ResultPage<PatentView>>> {
    let page = PageRequest::normalize(params.page, params.size, &state.config.search);
    let criteria = PatentCriteria {
        keyword: params.q,
        application_year: params.application_year,
        grant_year: params.grant_year,
    };
    Ok(Json(state.patents.search(&criteria, page).await?))
}
