//! Shared application state

use axum::extract::FromRef;
use scholarsearch_common::auth::CallerVerifier;
use scholarsearch_common::cache::{Cache, CacheConfig, CacheStore, MemoryCacheStore, SearchCache};
use scholarsearch_common::config::AppConfig;
use scholarsearch_common::db::{PopularityStore, SavedItems};
use scholarsearch_common::index::ElasticIndex;
use scholarsearch_common::translation::create_translator;
use scholarsearch_common::{DbPool, DocumentIndex, Repository, Result, Translator};
use scholarsearch_ranking::{RankingGenerator, RankingStore, SqlRankingStore};
use scholarsearch_search::{AchievementDeps, AchievementService, PatentService, TopicService};
use std::sync::Arc;
use tracing::{info, warn};

/// Backing stores the services are assembled from
pub struct Backends {
    pub index: Arc<dyn DocumentIndex>,
    pub translator: Arc<dyn Translator>,
    pub popularity: Arc<dyn PopularityStore>,
    pub saved: Arc<dyn SavedItems>,
    pub cache_store: Arc<dyn CacheStore>,
    pub ranking_store: Arc<dyn RankingStore>,
}

/// Dependencies checked by the readiness probe
pub struct Probes {
    pub db: Option<DbPool>,
    pub index: Arc<dyn DocumentIndex>,
    pub redis: Option<Arc<Cache>>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub achievements: Arc<AchievementService>,
    pub patents: Arc<PatentService>,
    pub topics: Arc<TopicService>,
    pub rankings: Arc<RankingGenerator>,
    pub verifier: CallerVerifier,
    pub probes: Arc<Probes>,
}

impl FromRef<AppState> for CallerVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl AppState {
    /// Connect to every external store named in `config`
    pub async fn connect(config: AppConfig) -> Result<Self> {
        info!("Connecting to database...");
        let db = DbPool::new(&config.database).await?;
        let repository = Arc::new(Repository::new(db.clone()));
        repository.ensure_keyword_index().await?;

        let index: Arc<dyn DocumentIndex> = Arc::new(ElasticIndex::new(&config.index)?);

        // The cache is optional: without Redis pages are cached in-process
        let redis = if config.redis.url.is_empty() {
            None
        } else {
            match Cache::new(CacheConfig::from(&config.redis)).await {
                Ok(cache) => Some(Arc::new(cache)),
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, caching in-process");
                    None
                }
            }
        };
        let cache_store: Arc<dyn CacheStore> = match &redis {
            Some(cache) => cache.clone(),
            None => Arc::new(MemoryCacheStore::new()),
        };

        let backends = Backends {
            index: index.clone(),
            translator: create_translator(&config.translation),
            popularity: repository.clone(),
            saved: repository,
            cache_store,
            ranking_store: Arc::new(SqlRankingStore::new(db.clone())),
        };
        let probes = Probes {
            db: Some(db),
            index,
            redis,
        };

        Self::assemble(config, backends, probes)
    }

    /// Build the services over already-constructed backends
    pub fn assemble(config: AppConfig, backends: Backends, probes: Probes) -> Result<Self> {
        let cache = SearchCache::new(backends.cache_store, config.cache_ttl());

        let achievements = AchievementService::new(AchievementDeps {
            index: backends.index.clone(),
            translator: backends.translator,
            popularity: backends.popularity.clone(),
            saved: backends.saved,
            cache: cache.clone(),
        });
        let patents = PatentService::new(backends.index.clone(), cache);
        let topics = TopicService::new(backends.popularity);
        let rankings = RankingGenerator::new(backends.index, backends.ranking_store, config.ranking.clone())?;

        Ok(Self {
            verifier: CallerVerifier::from_config(&config.auth),
            config: Arc::new(config),
            achievements: Arc::new(achievements),
            patents: Arc::new(patents),
            topics: Arc::new(topics),
            rankings: Arc::new(rankings),
            probes: Arc::new(probes),
        })
    }
}
