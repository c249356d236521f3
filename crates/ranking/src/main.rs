//! ScholarSearch Ranking Job
//!
//! Rebuilds the scholar leaderboards from the author index. Runs once and
//! exits, or repeats every `ranking.schedule_interval_secs` seconds until
//! shut down.

use anyhow::Context;
use scholarsearch_common::{config::AppConfig, db::DbPool, index::ElasticIndex, VERSION};
use scholarsearch_ranking::{RankingGenerator, SqlRankingStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config);

    info!("Starting ScholarSearch Ranking Job v{}", VERSION);

    let db = DbPool::new(&config.database).await?;
    let index = Arc::new(ElasticIndex::new(&config.index)?);
    let store = Arc::new(SqlRankingStore::new(db));
    let generator = RankingGenerator::new(index, store, config.ranking.clone())?;

    let interval_secs = config.ranking.schedule_interval_secs;
    if interval_secs == 0 {
        let summary = generator.generate_domain_rankings().await?;
        info!(summary = %summary, "Ranking run finished");
        return Ok(());
    }

    info!(interval_secs, "Running on a schedule");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                match generator.generate_domain_rankings().await {
                    Ok(summary) => info!(summary = %summary, "Ranking run finished"),
                    Err(e) => error!(error = %e, "Ranking run failed"),
                }
            }
        }
    }

    info!("Ranking job shutting down");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
