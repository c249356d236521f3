//! Health check handlers

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use scholarsearch_common::Result;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub index: CheckResult,
    pub cache: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn skipped() -> Self {
        Self {
            status: "skipped".to_string(),
            latency_ms: None,
            error: None,
        }
    }

    fn is_down(&self) -> bool {
        self.status == "down"
    }
}

async fn probe(check: impl Future<Output = Result<()>>) -> CheckResult {
    let start = Instant::now();
    match check.await {
        Ok(()) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: scholarsearch_common::VERSION.to_string(),
    })
}

/// Readiness probe - the relational store and the index are required, the
/// cache is not
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let probes = &state.probes;

    let database = match &probes.db {
        Some(db) => probe(db.ping()).await,
        None => CheckResult::skipped(),
    };
    let index = probe(probes.index.ping()).await;
    let cache = match &probes.redis {
        Some(redis) => probe(redis.ping()).await,
        None => CheckResult::skipped(),
    };

    let ready = !database.is_down() && !index.is_down();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if ready { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks {
                database,
                index,
                cache,
            },
        }),
    )
}
