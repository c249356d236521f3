//! Advanced achievement search and direct lookups

use crate::composer::{QueryComposer, SearchCriteria};
use crate::counters::EngagementCounters;
use crate::fallback::FallbackPolicy;
use crate::resolver::EntityResolver;
use crate::views::{AchievementView, PageRequest, ResultPage};
use futures::future::join_all;
use scholarsearch_common::auth::Caller;
use scholarsearch_common::cache::keys::{self, PageKey};
use scholarsearch_common::cache::{CachedPage, SearchCache};
use scholarsearch_common::db::{PopularityStore, SavedItems};
use scholarsearch_common::index::{decode, documents::AchievementDocument, SearchRequest};
use scholarsearch_common::metrics;
use scholarsearch_common::{AppError, Collection, DocId, DocumentIndex, Result, Translator};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Collaborators of the achievement service
pub struct AchievementDeps {
    pub index: Arc<dyn DocumentIndex>,
    pub translator: Arc<dyn Translator>,
    pub popularity: Arc<dyn PopularityStore>,
    pub saved: Arc<dyn SavedItems>,
    pub cache: SearchCache,
}

pub struct AchievementService {
    index: Arc<dyn DocumentIndex>,
    resolver: EntityResolver,
    composer: QueryComposer,
    cache: SearchCache,
    saved: Arc<dyn SavedItems>,
    counters: EngagementCounters,
}

impl AchievementService {
    pub fn new(deps: AchievementDeps) -> Self {
        let AchievementDeps {
            index,
            translator,
            popularity,
            saved,
            cache,
        } = deps;

        Self {
            resolver: EntityResolver::new(index.clone()),
            composer: QueryComposer::new(translator, FallbackPolicy::new(popularity.clone())),
            counters: EngagementCounters::new(index.clone(), popularity),
            index,
            cache,
            saved,
        }
    }

    /// Search works by any combination of criteria.
    ///
    /// Pages are cached as raw documents for the cache TTL; updated counters
    /// or new works only show up once the cached page expires. Favourite
    /// flags are computed per caller on every call.
    #[instrument(skip(self, caller), fields(page = page.page, size = page.size))]
    pub async fn advanced_search(
        &self,
        criteria: SearchCriteria,
        page: PageRequest,
        caller: &Caller,
    ) -> Result<ResultPage<AchievementView>> {
        let started = Instant::now();
        let criteria = criteria.validated()?;
        let key = page_key(&criteria, page);

        let cached = match self.cache.get::<AchievementDocument>(&key).await {
            Some(cached) => {
                debug!(key = %key, "Serving advanced search from cache");
                cached
            }
            None => {
                let fresh = self.execute(&criteria, page).await?;
                self.cache.put(&key, &fresh).await;
                fresh
            }
        };

        let records = self.annotate(cached.records, caller).await;
        metrics::record_search(started.elapsed().as_secs_f64(), "advanced", records.len());
        info!(
            total = cached.total,
            returned = records.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Advanced search completed"
        );
        Ok(ResultPage::new(records, cached.total, page))
    }

    async fn execute(&self, criteria: &SearchCriteria, page: PageRequest) -> Result<CachedPage<AchievementDocument>> {
        let resolved = self
            .resolver
            .resolve_all(criteria.author_name.as_deref(), criteria.institution_name.as_deref())
            .await;
        let query = self.composer.compose(criteria, &resolved).await?;

        let request = SearchRequest::new(query).page(page.page, page.size);
        let hits = self.index.search(Collection::Works, &request).await?;
        Ok(CachedPage {
            records: hits.sources()?,
            total: hits.total,
        })
    }

    /// One work by raw or namespaced id. Counts a view in the background;
    /// the returned read count already includes it.
    #[instrument(skip(self, caller))]
    pub async fn get_by_id(&self, id: &str, caller: &Caller) -> Result<AchievementView> {
        let id = DocId::parse(id);
        let mut document: AchievementDocument = match self.index.get(Collection::Works, &id.namespaced()).await? {
            Some(source) => decode(source)?,
            None => {
                return Err(AppError::AchievementNotFound {
                    id: id.raw().to_string(),
                })
            }
        };

        let _ = self.counters.record_view(&document);
        document.read_count = Some(document.read_count.unwrap_or(0) + 1);

        let is_favourite = self.is_favourite(caller, &id).await;
        Ok(AchievementView::from_document(document, is_favourite))
    }

    /// Several works at once, without counting views; unknown ids are skipped
    pub async fn get_by_ids(&self, ids: &[String], caller: &Caller) -> Result<Vec<AchievementView>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let namespaced: Vec<String> = ids.iter().map(|id| DocId::parse(id).namespaced()).collect();
        let documents = self
            .index
            .get_many(Collection::Works, &namespaced)
            .await?
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<AchievementDocument>>>()?;

        Ok(self.annotate(documents, caller).await)
    }

    pub fn increment_favorite(&self, id: &str) -> JoinHandle<()> {
        self.counters.dispatch_favorite(&DocId::parse(id).namespaced(), true)
    }

    pub fn decrement_favorite(&self, id: &str) -> JoinHandle<()> {
        self.counters.dispatch_favorite(&DocId::parse(id).namespaced(), false)
    }

    async fn annotate(&self, documents: Vec<AchievementDocument>, caller: &Caller) -> Vec<AchievementView> {
        let flags = join_all(
            documents
                .iter()
                .map(|d| async move { self.is_favourite(caller, &DocId::parse(&d.id)).await }),
        )
        .await;

        documents
            .into_iter()
            .zip(flags)
            .map(|(document, flag)| AchievementView::from_document(document, flag))
            .collect()
    }

    async fn is_favourite(&self, caller: &Caller, id: &DocId) -> bool {
        let Some(user_id) = caller.user_id.as_deref() else {
            return false;
        };
        match self.saved.is_saved(user_id, id.raw()).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!(user_id, id = %id, error = %e, "Saved-item lookup failed");
                false
            }
        }
    }
}

fn page_key(criteria: &SearchCriteria, page: PageRequest) -> PageKey {
    let params = criteria.cache_params();
    let params: Vec<&str> = params.iter().map(String::as_str).collect();
    keys::search_page(keys::ADVANCED_SEARCH, &params, page.page, page.size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarsearch_common::cache::MemoryCacheStore;
    use scholarsearch_common::db::{MemoryPopularityStore, MemorySavedItems, MonthlyCounts};
    use scholarsearch_common::index::documents::{fields, InstitutionDocument};
    use scholarsearch_common::index::MemoryIndex;
    use scholarsearch_common::translation::{IdentityTranslator, StaticTranslator};
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        index: Arc<MemoryIndex>,
        popularity: Arc<MemoryPopularityStore>,
        saved: Arc<MemorySavedItems>,
        service: AchievementService,
    }

    fn fixture_with(translator: Arc<dyn Translator>) -> Fixture {
        let index = Arc::new(MemoryIndex::new());
        let popularity = Arc::new(MemoryPopularityStore::new());
        let saved = Arc::new(MemorySavedItems::new());
        let cache = SearchCache::new(Arc::new(MemoryCacheStore::new()), Duration::from_secs(300));

        let service = AchievementService::new(AchievementDeps {
            index: index.clone(),
            translator,
            popularity: popularity.clone(),
            saved: saved.clone(),
            cache,
        });
        Fixture {
            index,
            popularity,
            saved,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(IdentityTranslator))
    }

    fn work(id: &str, title: &str, abstract_text: &str) -> serde_json::Value {
        json!({
            "id": format!("https://openalex.org/{}", id),
            "title": title,
            "abstract": abstract_text,
            "publication_date": "2021-05-01",
            "concepts": ["Computer science"],
        })
    }

    fn keyword(text: &str) -> SearchCriteria {
        SearchCriteria {
            keyword: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn page() -> PageRequest {
        PageRequest { page: 0, size: 10 }
    }

    #[tokio::test]
    async fn test_title_match_outranks_abstract_match() {
        let f = fixture();
        f.index
            .insert(Collection::Works, &work("W1", "Graph theory", "Notes on machine learning"))
            .unwrap();
        f.index
            .insert(Collection::Works, &work("W2", "Machine learning", "A survey"))
            .unwrap();
        f.index
            .insert(Collection::Works, &work("W3", "Protein folding", "Biology"))
            .unwrap();

        let result = f
            .service
            .advanced_search(keyword("machine learning"), page(), &Caller::anonymous())
            .await
            .unwrap();

        assert_eq!(result.total, 2);
        let ids: Vec<&str> = result.records.iter().map(|r| r.id.raw()).collect();
        assert_eq!(ids, vec!["W2", "W1"]);
        assert!(result.records.iter().all(|r| !r.is_favourite));
    }

    #[tokio::test]
    async fn test_engagement_breaks_relevance_ties() {
        let f = fixture();
        let mut quiet = work("W1", "Graphene", "");
        quiet["cited_by_count"] = json!(1);
        let mut popular = work("W2", "Graphene", "");
        popular["cited_by_count"] = json!(500);
        f.index.insert(Collection::Works, &quiet).unwrap();
        f.index.insert(Collection::Works, &popular).unwrap();

        let result = f
            .service
            .advanced_search(keyword("graphene"), page(), &Caller::anonymous())
            .await
            .unwrap();
        assert_eq!(result.records[0].id.raw(), "W2");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_index() {
        let f = fixture();
        f.index
            .insert(Collection::Works, &work("W1", "Machine learning", ""))
            .unwrap();

        let first = f
            .service
            .advanced_search(keyword("Machine Learning"), page(), &Caller::anonymous())
            .await
            .unwrap();
        let calls = f.index.search_calls();

        // Case and padding do not change the key
        let second = f
            .service
            .advanced_search(keyword("  machine learning "), page(), &Caller::anonymous())
            .await
            .unwrap();

        assert_eq!(f.index.search_calls(), calls);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cached_pages_do_not_see_new_documents() {
        let f = fixture();
        f.index
            .insert(Collection::Works, &work("W1", "Graphene", ""))
            .unwrap();
        let before = f
            .service
            .advanced_search(keyword("graphene"), page(), &Caller::anonymous())
            .await
            .unwrap();

        f.index
            .insert(Collection::Works, &work("W2", "Graphene", ""))
            .unwrap();
        let after = f
            .service
            .advanced_search(keyword("graphene"), page(), &Caller::anonymous())
            .await
            .unwrap();

        // Only expiry refreshes a page
        assert_eq!(before.total, 1);
        assert_eq!(after.total, 1);
    }

    #[tokio::test]
    async fn test_favourite_flag_is_per_caller() {
        let f = fixture();
        f.index
            .insert(Collection::Works, &work("W1", "Graphene", ""))
            .unwrap();
        f.saved.save("alice", "W1").await;

        let alice = f
            .service
            .advanced_search(keyword("graphene"), page(), &Caller::user("alice"))
            .await
            .unwrap();
        let bob = f
            .service
            .advanced_search(keyword("graphene"), page(), &Caller::user("bob"))
            .await
            .unwrap();

        assert!(alice.records[0].is_favourite);
        assert!(!bob.records[0].is_favourite);
    }

    #[tokio::test]
    async fn test_saved_lookup_failure_defaults_to_false() {
        let f = fixture();
        f.index
            .insert(Collection::Works, &work("W1", "Graphene", ""))
            .unwrap();
        f.saved.save("alice", "W1").await;
        f.saved.set_failing(true);

        let result = f
            .service
            .advanced_search(keyword("graphene"), page(), &Caller::user("alice"))
            .await
            .unwrap();
        assert!(!result.records[0].is_favourite);
    }

    #[tokio::test]
    async fn test_institution_filter() {
        let f = fixture();
        f.index
            .insert(
                Collection::Institutions,
                &InstitutionDocument {
                    id: "https://openalex.org/I1".into(),
                    display_name: Some("Massachusetts Institute of Technology".into()),
                },
            )
            .unwrap();
        let mut at_mit = work("W1", "Graphene", "");
        at_mit["institution_ids"] = json!(["https://openalex.org/I1"]);
        f.index.insert(Collection::Works, &at_mit).unwrap();
        f.index
            .insert(Collection::Works, &work("W2", "Graphene", ""))
            .unwrap();

        let criteria = SearchCriteria {
            keyword: Some("graphene".into()),
            institution_name: Some("Massachusetts Institute of Technology".into()),
            ..Default::default()
        };
        let result = f
            .service
            .advanced_search(criteria, page(), &Caller::anonymous())
            .await
            .unwrap();

        let ids: Vec<&str> = result.records.iter().map(|r| r.id.raw()).collect();
        assert_eq!(ids, vec!["W1"]);
    }

    #[tokio::test]
    async fn test_unknown_institution_yields_empty_page() {
        let f = fixture();
        f.index
            .insert(Collection::Works, &work("W1", "Graphene", ""))
            .unwrap();

        let criteria = SearchCriteria {
            keyword: Some("graphene".into()),
            institution_name: Some("Nowhere University".into()),
            ..Default::default()
        };
        let result = f
            .service
            .advanced_search(criteria, page(), &Caller::anonymous())
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn test_failing_resolution_still_filters_by_name() {
        let f = fixture();
        let mut by_name = work("W1", "Graphene", "");
        by_name["author_names"] = json!(["Geoffrey Hinton"]);
        f.index.insert(Collection::Works, &by_name).unwrap();
        f.index
            .insert(Collection::Works, &work("W2", "Graphene", ""))
            .unwrap();
        // Only the resolver's display_name lookup fails
        f.index.fail_searches_mentioning(fields::DISPLAY_NAME);

        let criteria = SearchCriteria {
            keyword: Some("graphene".into()),
            author_name: Some("Geoffrey Hinton".into()),
            ..Default::default()
        };
        let result = f
            .service
            .advanced_search(criteria, page(), &Caller::anonymous())
            .await
            .unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].id.raw(), "W1");
    }

    #[tokio::test]
    async fn test_date_range_filters() {
        let f = fixture();
        let mut old = work("W1", "Graphene", "");
        old["publication_date"] = json!("2010-01-01");
        f.index.insert(Collection::Works, &old).unwrap();
        f.index
            .insert(Collection::Works, &work("W2", "Graphene", ""))
            .unwrap();

        let criteria = SearchCriteria {
            keyword: Some("graphene".into()),
            start_date: Some("2020-01-01".into()),
            ..Default::default()
        };
        let result = f
            .service
            .advanced_search(criteria, page(), &Caller::anonymous())
            .await
            .unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].id.raw(), "W2");

        let bad = SearchCriteria {
            start_date: Some("01/02/2020".into()),
            ..Default::default()
        };
        let err = f
            .service
            .advanced_search(bad, page(), &Caller::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_empty_criteria_fall_back_to_popular_topic() {
        let f = fixture();
        f.popularity.seed("Computer science", 10, MonthlyCounts::default()).await;
        f.popularity.seed("Biology", 2, MonthlyCounts::default()).await;
        let mut biology = work("W2", "Cells", "");
        biology["concepts"] = json!(["Biology"]);
        f.index
            .insert(Collection::Works, &work("W1", "Compilers", ""))
            .unwrap();
        f.index.insert(Collection::Works, &biology).unwrap();

        let result = f
            .service
            .advanced_search(SearchCriteria::default(), page(), &Caller::anonymous())
            .await
            .unwrap();
        let ids: Vec<&str> = result.records.iter().map(|r| r.id.raw()).collect();
        assert_eq!(ids, vec!["W1"]);
    }

    #[tokio::test]
    async fn test_empty_criteria_without_history_is_rejected() {
        let f = fixture();
        let err = f
            .service
            .advanced_search(SearchCriteria::default(), page(), &Caller::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoSearchCriteria));
    }

    #[tokio::test]
    async fn test_cjk_keyword_matches_translated_title() {
        let f = fixture_with(Arc::new(StaticTranslator::new([("机器学习", "machine learning")])));
        f.index
            .insert(Collection::Works, &work("W1", "Machine learning", ""))
            .unwrap();

        let result = f
            .service
            .advanced_search(keyword("机器学习"), page(), &Caller::anonymous())
            .await
            .unwrap();
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn test_index_failure_surfaces() {
        let f = fixture();
        f.index.set_unavailable(true);
        let result = f
            .service
            .advanced_search(keyword("graphene"), page(), &Caller::anonymous())
            .await;
        tokio_test::assert_err!(result);
    }

    #[tokio::test]
    async fn test_get_by_id_counts_view() {
        let f = fixture();
        let mut doc = work("W7", "Graphene", "");
        doc["readCount"] = json!(4);
        f.index.insert(Collection::Works, &doc).unwrap();

        let view = f.service.get_by_id("W7", &Caller::anonymous()).await.unwrap();
        assert_eq!(view.id.raw(), "W7");
        assert_eq!(view.read_count, Some(5));

        // Let the background update land
        for _ in 0..50 {
            let stored = f.index.source(Collection::Works, "https://openalex.org/W7").unwrap();
            if stored["readCount"] == 5 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("read counter was not updated");
    }

    #[tokio::test]
    async fn test_get_by_id_unknown() {
        let f = fixture();
        let err = f
            .service
            .get_by_id("https://openalex.org/W404", &Caller::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AchievementNotFound { ref id } if id == "W404"));
    }

    #[tokio::test]
    async fn test_get_by_ids_skips_missing_and_keeps_counters() {
        let f = fixture();
        f.index
            .insert(Collection::Works, &work("W1", "Graphene", ""))
            .unwrap();
        f.index
            .insert(Collection::Works, &work("W2", "Cells", ""))
            .unwrap();

        let ids = vec!["W2".to_string(), "W404".to_string(), "https://openalex.org/W1".to_string()];
        let views = f.service.get_by_ids(&ids, &Caller::anonymous()).await.unwrap();
        let found: Vec<&str> = views.iter().map(|v| v.id.raw()).collect();
        assert_eq!(found, vec!["W2", "W1"]);
        assert_eq!(f.index.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_favourite_toggle_floors_at_zero() {
        let f = fixture();
        f.index
            .insert(Collection::Works, &work("W1", "Graphene", ""))
            .unwrap();

        f.service.increment_favorite("W1").await.unwrap();
        f.service.decrement_favorite("W1").await.unwrap();
        f.service.decrement_favorite("W1").await.unwrap();

        let stored = f.index.source(Collection::Works, "https://openalex.org/W1").unwrap();
        assert_eq!(stored[fields::FAVOURITE_COUNT], 0);
    }
}
