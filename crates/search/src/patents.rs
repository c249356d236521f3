//! Patent search

use crate::views::{PageRequest, PatentView, ResultPage};
use scholarsearch_common::cache::keys;
use scholarsearch_common::cache::{CachedPage, SearchCache};
use scholarsearch_common::index::documents::{fields, PatentDocument};
use scholarsearch_common::index::{BoolQuery, Query, SearchRequest};
use scholarsearch_common::metrics;
use scholarsearch_common::{Collection, DocumentIndex, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

const TEXT_FIELDS: [&str; 4] = [
    fields::PATENT_NAME,
    fields::PATENT_ABSTRACT,
    fields::APPLICANT,
    fields::INVENTOR,
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatentCriteria {
    pub keyword: Option<String>,
    pub application_year: Option<i32>,
    pub grant_year: Option<i32>,
}

impl PatentCriteria {
    fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    fn to_query(&self) -> Query {
        let base = match self.keyword() {
            Some(keyword) => Query::multi_match(&TEXT_FIELDS, keyword),
            None => Query::MatchAll,
        };

        let mut query = BoolQuery::new().must(base);
        if let Some(year) = self.application_year {
            query = query.filter(Query::term(fields::APPLICATION_YEAR, year));
        }
        if let Some(year) = self.grant_year {
            query = query.filter(Query::term(fields::GRANT_YEAR, year));
        }
        query.into()
    }

    fn cache_params(&self) -> [String; 3] {
        let year = |y: Option<i32>| y.map(|y| y.to_string()).unwrap_or_default();
        [
            self.keyword().unwrap_or_default().to_lowercase(),
            year(self.application_year),
            year(self.grant_year),
        ]
    }
}

pub struct PatentService {
    index: Arc<dyn DocumentIndex>,
    cache: SearchCache,
}

impl PatentService {
    pub fn new(index: Arc<dyn DocumentIndex>, cache: SearchCache) -> Self {
        Self { index, cache }
    }

    #[instrument(skip(self))]
    pub async fn search(&self, criteria: &PatentCriteria, page: PageRequest) -> Result<ResultPage<PatentView>> {
        let started = Instant::now();
        let params = criteria.cache_params();
        let params: Vec<&str> = params.iter().map(String::as_str).collect();
        let key = keys::search_page(keys::PATENT_SEARCH, &params, page.page, page.size);

        let cached = match self.cache.get::<PatentDocument>(&key).await {
            Some(cached) => {
                debug!(key = %key, "Serving patent search from cache");
                cached
            }
            None => {
                let request = SearchRequest::new(criteria.to_query()).page(page.page, page.size);
                let hits = self.index.search(Collection::Patents, &request).await?;
                let fresh = CachedPage {
                    records: hits.sources()?,
                    total: hits.total,
                };
                self.cache.put(&key, &fresh).await;
                fresh
            }
        };

        let records: Vec<PatentView> = cached.records.into_iter().map(PatentView::from).collect();
        metrics::record_search(started.elapsed().as_secs_f64(), "patent", records.len());
        Ok(ResultPage::new(records, cached.total, page))
    }
}
