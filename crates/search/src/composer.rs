//! Composite query construction
//!
//! One relevance query per search: a keyword match over title and abstract
//! (expanded with a translation for CJK keywords), multiplied by the
//! engagement factor, AND-ed with every active filter.

use crate::fallback::FallbackPolicy;
use crate::resolver::ResolvedEntities;
use chrono::NaiveDate;
use scholarsearch_common::index::documents::fields;
use scholarsearch_common::index::{BoolQuery, Query};
use scholarsearch_common::{AppError, Result, Translator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const TITLE_BOOST: f32 = 3.0;
const ABSTRACT_BOOST: f32 = 2.0;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Optional inputs of an advanced search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub keyword: Option<String>,
    /// Exact concept, e.g. "Computer science"
    pub facet: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub author_name: Option<String>,
    pub institution_name: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    let invalid = || AppError::Validation {
        message: format!("{} must be an ISO date (yyyy-MM-dd), got '{}'", field, value),
        field: Some(field.to_string()),
    };
    if value.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid())
}

impl SearchCriteria {
    /// Trim every field, drop blanks and check the date range. Dates compare
    /// as strings in the index, so only zero-padded ISO dates are accepted.
    pub fn validated(self) -> Result<Self> {
        let criteria = Self {
            keyword: clean(self.keyword),
            facet: clean(self.facet),
            start_date: clean(self.start_date),
            end_date: clean(self.end_date),
            author_name: clean(self.author_name),
            institution_name: clean(self.institution_name),
        };

        let start = criteria
            .start_date
            .as_deref()
            .map(|d| parse_date(d, "startDate"))
            .transpose()?;
        let end = criteria
            .end_date
            .as_deref()
            .map(|d| parse_date(d, "endDate"))
            .transpose()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AppError::Validation {
                    message: format!("startDate {} is after endDate {}", start, end),
                    field: Some("startDate".to_string()),
                });
            }
        }

        Ok(criteria)
    }

    /// True when no criterion is present
    pub fn is_empty(&self) -> bool {
        [
            &self.keyword,
            &self.facet,
            &self.start_date,
            &self.end_date,
            &self.author_name,
            &self.institution_name,
        ]
        .iter()
        .all(|v| v.as_deref().map_or(true, |s| s.trim().is_empty()))
    }

    /// Canonical cache key parameters. Keyword and facet hit analysed fields
    /// and are case-folded; names keep their case since they also feed exact
    /// term filters.
    pub fn cache_params(&self) -> [String; 6] {
        let value = |v: &Option<String>| v.as_deref().unwrap_or_default().to_string();
        [
            value(&self.keyword).to_lowercase(),
            value(&self.facet).to_lowercase(),
            value(&self.start_date),
            value(&self.end_date),
            value(&self.author_name),
            value(&self.institution_name),
        ]
    }
}

pub struct QueryComposer {
    translator: Arc<dyn Translator>,
    fallback: FallbackPolicy,
}

impl QueryComposer {
    pub fn new(translator: Arc<dyn Translator>, fallback: FallbackPolicy) -> Self {
        Self {
            translator,
            fallback,
        }
    }

    /// Scored base query for `keyword`, or every document when absent
    pub async fn keyword_query(&self, keyword: Option<&str>) -> Query {
        let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) else {
            return Query::MatchAll.engagement_scored();
        };

        let mut texts = vec![keyword.to_string()];
        if self.translator.contains_non_latin(keyword) {
            let translated = self.translator.translate(keyword).await;
            if translated != keyword {
                debug!(keyword, translated = %translated, "Expanding keyword with translation");
                texts.push(translated);
            }
        }

        let mut query = BoolQuery::new().minimum_should_match(1);
        for text in &texts {
            query = query
                .should(Query::match_boosted(fields::TITLE, text, TITLE_BOOST))
                .should(Query::match_boosted(fields::ABSTRACT, text, ABSTRACT_BOOST));
        }
        Query::from(query).engagement_scored()
    }

    /// Filters for every present criterion
    pub fn filters(criteria: &SearchCriteria, resolved: &ResolvedEntities) -> Vec<Query> {
        let mut filters = Vec::new();

        if let Some(filter) = entity_filter(
            fields::INSTITUTION_NAMES,
            criteria.institution_name.as_deref(),
            fields::INSTITUTION_IDS,
            resolved.institution_id.as_deref(),
        ) {
            filters.push(filter);
        }

        if let Some(filter) = entity_filter(
            fields::AUTHOR_NAMES,
            criteria.author_name.as_deref(),
            fields::AUTHOR_IDS,
            resolved.author_id.as_deref(),
        ) {
            filters.push(filter);
        }

        if let Some(facet) = &criteria.facet {
            filters.push(Query::phrase(fields::CONCEPTS, facet));
        }

        if criteria.start_date.is_some() || criteria.end_date.is_some() {
            filters.push(Query::range(
                fields::PUBLICATION_DATE,
                criteria.start_date.as_deref(),
                criteria.end_date.as_deref(),
            ));
        }

        filters
    }

    /// The composite query. Empty criteria are replaced by the popular topic
    /// as an implicit facet.
    pub async fn compose(&self, criteria: &SearchCriteria, resolved: &ResolvedEntities) -> Result<Query> {
        let mut query = BoolQuery::new().must(self.keyword_query(criteria.keyword.as_deref()).await);

        for filter in Self::filters(criteria, resolved) {
            query = query.filter(filter);
        }

        if criteria.is_empty() {
            let topic = self.fallback.default_topic().await?;
            query = query.filter(Query::phrase(fields::CONCEPTS, &topic));
        }

        Ok(query.into())
    }
}

/// Match on the resolved id OR on the raw name, so filtering still works
/// when resolution missed.
fn entity_filter(
    name_field: &str,
    name: Option<&str>,
    id_field: &str,
    id: Option<&str>,
) -> Option<Query> {
    let mut clauses = Vec::new();
    if let Some(name) = name {
        clauses.push(Query::term(&format!("{}.keyword", name_field), name));
        clauses.push(Query::term(name_field, name));
        clauses.push(Query::phrase(name_field, name));
    }
    if let Some(id) = id {
        clauses.push(Query::term(id_field, id));
    }
    if clauses.is_empty() {
        return None;
    }

    let query = clauses
        .into_iter()
        .fold(BoolQuery::new().minimum_should_match(1), BoolQuery::should);
    Some(query.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarsearch_common::db::{MemoryPopularityStore, MonthlyCounts};
    use scholarsearch_common::translation::{IdentityTranslator, StaticTranslator};

    fn composer(translator: Arc<dyn Translator>) -> QueryComposer {
        QueryComposer::new(translator, FallbackPolicy::new(Arc::new(MemoryPopularityStore::new())))
    }

    fn criteria() -> SearchCriteria {
        SearchCriteria::default()
    }

    #[test]
    fn test_whitespace_keyword_is_absent() {
        let c = SearchCriteria {
            keyword: Some("   ".into()),
            ..criteria()
        }
        .validated()
        .unwrap();
        assert_eq!(c.keyword, None);
        assert!(c.is_empty());
    }

    #[test]
    fn test_date_validation() {
        let ok = SearchCriteria {
            start_date: Some("2020-01-01".into()),
            end_date: Some(" 2020-12-31 ".into()),
            ..criteria()
        }
        .validated()
        .unwrap();
        assert_eq!(ok.end_date.as_deref(), Some("2020-12-31"));

        for (start, end) in [("2020-1-5", "2020-12-31"), ("yesterday", "2020-12-31"), ("2021-01-01", "2020-01-01")] {
            let result = SearchCriteria {
                start_date: Some(start.into()),
                end_date: Some(end.into()),
                ..criteria()
            }
            .validated();
            assert!(matches!(result, Err(AppError::Validation { .. })), "{} {}", start, end);
        }

        let half_open = SearchCriteria {
            start_date: Some("2019-06-01".into()),
            ..criteria()
        }
        .validated();
        assert!(half_open.is_ok());
    }

    #[test]
    fn test_cache_params_case_folding() {
        let c = SearchCriteria {
            keyword: Some("Machine Learning".into()),
            facet: Some("Computer Science".into()),
            author_name: Some("Ada Lovelace".into()),
            ..criteria()
        };
        let params = c.cache_params();
        assert_eq!(params[0], "machine learning");
        assert_eq!(params[1], "computer science");
        assert_eq!(params[4], "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_keyword_query_shape() {
        let query = composer(Arc::new(IdentityTranslator)).keyword_query(Some("graphene")).await;
        let json = query.to_json();
        let should = &json["function_score"]["query"]["bool"]["should"];
        assert_eq!(should.as_array().unwrap().len(), 2);
        assert_eq!(should[0]["match"]["title"]["boost"], 3.0);
        assert_eq!(should[1]["match"]["abstract"]["boost"], 2.0);
    }

    #[tokio::test]
    async fn test_cjk_keyword_is_expanded() {
        let translator = Arc::new(StaticTranslator::new([("机器学习", "machine learning")]));
        let query = composer(translator).keyword_query(Some("机器学习")).await;
        let json = query.to_json();
        let should = json["function_score"]["query"]["bool"]["should"].as_array().unwrap().clone();
        assert_eq!(should.len(), 4);
        assert_eq!(should[2]["match"]["title"]["query"], "machine learning");
        assert_eq!(should[3]["match"]["abstract"]["boost"], 2.0);
    }

    #[tokio::test]
    async fn test_failed_translation_keeps_original_only() {
        // Identity means translation degraded
        let query = composer(Arc::new(IdentityTranslator)).keyword_query(Some("机器学习")).await;
        let json = query.to_json();
        assert_eq!(json["function_score"]["query"]["bool"]["should"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_entity_filter_uses_name_and_id() {
        let c = SearchCriteria {
            institution_name: Some("MIT".into()),
            ..criteria()
        };
        let resolved = ResolvedEntities {
            institution_id: Some("https://openalex.org/I63966007".into()),
            ..Default::default()
        };
        let filters = QueryComposer::filters(&c, &resolved);
        assert_eq!(filters.len(), 1);
        let json = filters[0].to_json();
        let should = json["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 4);
        assert_eq!(should[0]["term"]["institution_names.keyword"]["value"], "MIT");
        assert_eq!(should[3]["term"]["institution_ids"]["value"], "https://openalex.org/I63966007");
        assert_eq!(json["bool"]["minimum_should_match"], 1);
    }

    #[tokio::test]
    async fn test_empty_criteria_use_popular_topic() {
        let store = Arc::new(MemoryPopularityStore::new());
        store.seed("Graphene", 7, MonthlyCounts::default()).await;
        let composer = QueryComposer::new(Arc::new(IdentityTranslator), FallbackPolicy::new(store));

        let query = composer.compose(&criteria(), &ResolvedEntities::default()).await.unwrap();
        let json = query.to_json();
        assert_eq!(json["bool"]["filter"][0]["match_phrase"]["concepts"], "Graphene");
    }

    #[tokio::test]
    async fn test_empty_criteria_without_history_fail() {
        let result = composer(Arc::new(IdentityTranslator))
            .compose(&criteria(), &ResolvedEntities::default())
            .await;
        assert!(matches!(result, Err(AppError::NoSearchCriteria)));
    }
}
