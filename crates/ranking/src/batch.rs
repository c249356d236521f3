//! Leaderboard generation
//!
//! Pulls the most cited authors per domain from the index, re-ranks them by
//! influence score and rewrites each domain's table. Domains are processed
//! one after another; a failing domain is logged and skipped, an unreachable
//! store aborts the run.

use crate::domains::{TableNamer, ALL_DOMAINS, DOMAINS};
use crate::influence::{leaderboard, RankingRow};
use crate::store::RankingStore;
use scholarsearch_common::config::RankingConfig;
use scholarsearch_common::index::documents::{fields, AuthorDocument};
use scholarsearch_common::index::{Query, SearchRequest};
use scholarsearch_common::metrics;
use scholarsearch_common::{Collection, DocumentIndex, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

pub struct RankingGenerator {
    index: Arc<dyn DocumentIndex>,
    store: Arc<dyn RankingStore>,
    config: RankingConfig,
    namer: TableNamer,
}

impl RankingGenerator {
    pub fn new(index: Arc<dyn DocumentIndex>, store: Arc<dyn RankingStore>, config: RankingConfig) -> Result<Self> {
        let namer = TableNamer::new(&config.table_prefix)?;
        Ok(Self {
            index,
            store,
            config,
            namer,
        })
    }

    /// Rebuild the cross-domain leaderboard and every domain leaderboard.
    /// Returns a summary such as `processed 26 domains, took 812 ms`.
    #[instrument(skip(self))]
    pub async fn generate_domain_rankings(&self) -> Result<String> {
        let started = Instant::now();
        self.store.ping().await?;
        info!("Generating scholar leaderboards");

        let global = self.process(ALL_DOMAINS, Query::MatchAll, self.config.global_pool).await;
        self.settle(ALL_DOMAINS, global)?;

        let mut processed = 0;
        for domain in DOMAINS {
            let result = self
                .process(domain, Query::phrase(fields::FIELD, domain), self.config.domain_pool)
                .await;
            if self.settle(domain, result)? {
                processed += 1;
            }
        }

        let elapsed = started.elapsed();
        metrics::record_ranking_run(elapsed.as_secs_f64());
        let summary = format!("processed {} domains, took {} ms", processed, elapsed.as_millis());
        info!(processed, skipped = DOMAINS.len() - processed, "{}", summary);
        Ok(summary)
    }

    /// The stored leaderboard of `domain`, best first
    pub async fn get_ranking(&self, domain: &str) -> Result<Vec<RankingRow>> {
        let table = self.namer.table(domain)?;
        self.store.read(&table, self.config.leaderboard_size).await
    }

    async fn process(&self, domain: &str, query: Query, pool: usize) -> Result<usize> {
        let request = SearchRequest::new(query)
            .size(pool)
            .sort_desc(fields::CITED_BY_COUNT);
        let hits = self.index.search(Collection::Authors, &request).await?;
        let authors: Vec<AuthorDocument> = hits.sources()?;

        let rows = leaderboard(&authors, self.config.leaderboard_size);
        let table = self.namer.table(domain)?;
        self.store.replace(&table, &rows).await?;

        info!(domain, table = %table, candidates = authors.len(), rows = rows.len(), "Leaderboard written");
        Ok(rows.len())
    }

    /// Whether the domain succeeded. Connection failures end the run.
    fn settle(&self, domain: &str, result: Result<usize>) -> Result<bool> {
        match result {
            Ok(_) => {
                metrics::record_ranking_domain(true);
                Ok(true)
            }
            Err(e) if e.is_connection_failure() => {
                error!(domain, error = %e, "Ranking store unavailable, aborting run");
                Err(e)
            }
            Err(e) => {
                warn!(domain, error = %e, "Skipping domain");
                metrics::record_ranking_domain(false);
                Ok(false)
            }
        }
    }
}
