//! Scholar leaderboard handlers

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use scholarsearch_common::auth::Caller;
use scholarsearch_common::errors::{AppError, Result};
use scholarsearch_ranking::{RankingRow, ALL_DOMAINS};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RankingParams {
    pub domain: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RankedScholar {
    pub rank: usize,
    #[serde(flatten)]
    pub row: RankingRow,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub summary: String,
}

/// Leaderboard of one domain, `all` when none is given
pub async fn get_ranking(
    State(state): State<AppState>,
    Query(params): Query<RankingParams>,
) -> Result<Json<Vec<RankedScholar>>> {
    let domain = params.domain.as_deref().unwrap_or(ALL_DOMAINS);
    let rows = state.rankings.get_ranking(domain).await?;
    Ok(Json(
        rows.into_iter()
            .enumerate()
            .map(|(i, row)| RankedScholar { rank: i + 1, row })
            .collect(),
    ))
}

/// Rebuild every leaderboard now.
///
/// The run is spawned so a dropped connection does not stop it between
/// domains; the response waits for the whole run.
pub async fn generate(State(state): State<AppState>, caller: Caller) -> Result<Json<GenerateResponse>> {
    if !caller.is_authenticated() {
        return Err(AppError::Unauthorized {
            message: "a signed-in user is required".to_string(),
        });
    }
    info!(user_id = ?caller.user_id, "Leaderboard generation requested");

    let rankings = state.rankings.clone();
    let run = tokio::spawn(async move { rankings.generate_domain_rankings().await });
    let summary = run.await.map_err(|e| AppError::Internal {
        message: format!("Leaderboard run aborted: {}", e),
    })??;
    Ok(Json(GenerateResponse { summary }))
}
