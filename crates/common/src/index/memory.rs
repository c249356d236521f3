//! In-memory document index
//!
//! Evaluates the query AST directly over JSON sources with a simple
//! lower-cased token model. Counts calls so callers can assert that a cached
//! path never touched the index.

use super::query::{BoolQuery, Operator, Query, ScoreFunction};
use super::{Collection, DocumentIndex, Hit, SearchHits, SearchRequest, SortOrder, UpdateScript};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<Collection, Vec<Value>>>,
    search_calls: AtomicUsize,
    update_calls: AtomicUsize,
    unavailable: AtomicBool,
    failing_terms: RwLock<Vec<String>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document; its `id` field is the stored id
    pub fn insert<T: Serialize>(&self, collection: Collection, document: &T) -> Result<()> {
        let source = serde_json::to_value(document)?;
        let id = source
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| AppError::Validation {
                message: "document has no string id".to_string(),
                field: Some("id".to_string()),
            })?;

        let mut collections = self.write();
        let documents = collections.entry(collection).or_default();
        documents.retain(|d| d.get("id").and_then(Value::as_str) != Some(id.as_str()));
        documents.push(source);
        Ok(())
    }

    /// Number of `search` calls served so far
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of `update` calls received so far, failed ones included
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(AtomicOrdering::SeqCst)
    }

    /// Make every operation fail as if the cluster were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Fail any search whose rendered query mentions `text`
    pub fn fail_searches_mentioning(&self, text: &str) {
        if let Ok(mut terms) = self.failing_terms.write() {
            terms.push(text.to_string());
        }
    }

    /// Current source of a stored document
    pub fn source(&self, collection: Collection, id: &str) -> Option<Value> {
        self.read()
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| stored_id(d) == Some(id)).cloned())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Collection, Vec<Value>>> {
        self.collections.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Collection, Vec<Value>>> {
        self.collections.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(AppError::Index {
                message: "index unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn stored_id(source: &Value) -> Option<&str> {
    source.get("id").and_then(Value::as_str)
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Values of `field`, flattening arrays. `x.keyword` reads `x`.
fn field_values<'a>(source: &'a Value, field: &str) -> Vec<&'a Value> {
    let field = field.strip_suffix(".keyword").unwrap_or(field);
    let mut current = vec![source];
    for part in field.split('.') {
        current = current
            .into_iter()
            .filter_map(|v| v.get(part))
            .flat_map(|v| match v {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .collect();
    }
    current.into_iter().filter(|v| !v.is_null()).collect()
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field_i64(source: &Value, field: &str) -> Option<i64> {
    field_values(source, field).first().and_then(|v| v.as_i64())
}

fn match_score(source: &Value, field: &str, text: &str, operator: Operator) -> Option<f64> {
    let wanted = tokens(text);
    if wanted.is_empty() {
        return None;
    }
    let present: Vec<String> = field_values(source, field)
        .into_iter()
        .filter_map(as_text)
        .flat_map(|t| tokens(&t))
        .collect();

    let matched = wanted.iter().filter(|w| present.contains(w)).count();
    let ok = match operator {
        Operator::Or => matched > 0,
        Operator::And => matched == wanted.len(),
    };
    ok.then_some(matched as f64)
}

fn phrase_matches(source: &Value, field: &str, text: &str) -> bool {
    let phrase = tokens(text);
    if phrase.is_empty() {
        return false;
    }
    field_values(source, field)
        .into_iter()
        .filter_map(as_text)
        .any(|value| tokens(&value).windows(phrase.len()).any(|w| w == phrase.as_slice()))
}

fn term_matches(source: &Value, field: &str, expected: &Value) -> bool {
    field_values(source, field).into_iter().any(|v| {
        v == expected || matches!((as_text(v), as_text(expected)), (Some(a), Some(b)) if a == b)
    })
}

fn range_matches(source: &Value, field: &str, gte: Option<&str>, lte: Option<&str>) -> bool {
    field_values(source, field)
        .into_iter()
        .filter_map(as_text)
        .any(|value| {
            gte.map_or(true, |g| value.as_str() >= g) && lte.map_or(true, |l| value.as_str() <= l)
        })
}

fn bool_score(source: &Value, query: &BoolQuery) -> Option<f64> {
    let mut score = 0.0;
    for clause in &query.must {
        score += evaluate(source, clause)?;
    }
    for clause in &query.filter {
        evaluate(source, clause)?;
    }

    let should_scores: Vec<f64> = query.should.iter().filter_map(|q| evaluate(source, q)).collect();
    if should_scores.len() < query.required_should() {
        return None;
    }
    score += should_scores.iter().sum::<f64>();

    if query.must.is_empty() && query.should.is_empty() {
        score = 1.0;
    }
    Some(score)
}

/// Relevance of `source` for `query`, `None` when it does not match
fn evaluate(source: &Value, query: &Query) -> Option<f64> {
    match query {
        Query::MatchAll => Some(1.0),
        Query::Match { field, text, boost, operator } => {
            match_score(source, field, text, *operator).map(|s| s * f64::from(boost.unwrap_or(1.0)))
        }
        Query::MatchPhrase { field, text } => phrase_matches(source, field, text).then_some(1.0),
        Query::MultiMatch { fields, text } => fields
            .iter()
            .filter_map(|f| match_score(source, f, text, Operator::Or))
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        Query::Term { field, value } => term_matches(source, field, value).then_some(1.0),
        Query::Range { field, gte, lte } => {
            range_matches(source, field, gte.as_deref(), lte.as_deref()).then_some(1.0)
        }
        Query::Bool(bool_query) => bool_score(source, bool_query),
        Query::FunctionScore { query, function } => {
            let base = evaluate(source, query)?;
            let ScoreFunction::Engagement(weights) = function;
            Some(
                base * weights.factor(
                    field_i64(source, super::documents::fields::CITED_BY_COUNT),
                    field_i64(source, super::documents::fields::FAVOURITE_COUNT),
                    field_i64(source, super::documents::fields::READ_COUNT),
                ),
            )
        }
    }
}

#[async_trait]
impl DocumentIndex for MemoryIndex {
    async fn search(&self, collection: Collection, request: &SearchRequest) -> Result<SearchHits> {
        self.search_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_available()?;

        let rendered = request.query.to_json().to_string();
        let failing = self
            .failing_terms
            .read()
            .map(|terms| terms.iter().any(|t| rendered.contains(t.as_str())))
            .unwrap_or(false);
        if failing {
            return Err(AppError::Index {
                message: "injected search failure".to_string(),
            });
        }

        let collections = self.read();
        let mut hits: Vec<Hit> = collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter_map(|doc| {
                        evaluate(doc, &request.query).map(|score| Hit {
                            id: stored_id(doc).unwrap_or_default().to_string(),
                            score,
                            source: doc.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        // Stable sorts keep insertion order for ties.
        if request.sort.is_empty() {
            hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        } else {
            hits.sort_by(|a, b| {
                for sort in &request.sort {
                    let left = field_i64(&a.source, &sort.field);
                    let right = field_i64(&b.source, &sort.field);
                    let ordering = match sort.order {
                        SortOrder::Asc => left.cmp(&right),
                        SortOrder::Desc => right.cmp(&left),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let total = hits.len() as u64;
        let hits = hits.into_iter().skip(request.from).take(request.size).collect();
        Ok(SearchHits { total, hits })
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        self.check_available()?;
        Ok(self.source(collection, id))
    }

    async fn update(&self, collection: Collection, id: &str, script: &UpdateScript) -> Result<()> {
        self.update_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_available()?;

        let mut collections = self.write();
        let document = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| stored_id(d) == Some(id)))
            .ok_or_else(|| AppError::NotFound {
                resource_type: "document".to_string(),
                id: id.to_string(),
            })?;

        script.apply(document);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::documents::fields;
    use serde_json::json;

    fn seeded() -> MemoryIndex {
        let index = MemoryIndex::new();
        for doc in [
            json!({ "id": "W1", "title": "Deep learning for vision", "abstract": "convolutional nets", "cited_by_count": 5 }),
            json!({ "id": "W2", "title": "Soil chemistry", "abstract": "deep learning applied to soil", "cited_by_count": 5 }),
            json!({ "id": "W3", "title": "Graph theory", "abstract": "planar graphs", "cited_by_count": 500, "publication_date": "2019-05-01" }),
        ] {
            index.insert(Collection::Works, &doc).unwrap();
        }
        index
    }

    #[tokio::test]
    async fn test_title_boost_outranks_abstract() {
        let index = seeded();
        let query: Query = BoolQuery::new()
            .should(Query::match_boosted(fields::TITLE, "deep learning", 3.0))
            .should(Query::match_boosted(fields::ABSTRACT, "deep learning", 2.0))
            .minimum_should_match(1)
            .into();

        let hits = index.search(Collection::Works, &SearchRequest::new(query)).await.unwrap();
        let ids: Vec<&str> = hits.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["W1", "W2"]);
        assert_eq!(index.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_sort_and_paging() {
        let index = seeded();
        let request = SearchRequest::new(Query::MatchAll).sort_desc(fields::CITED_BY_COUNT).page(0, 2);
        let hits = index.search(Collection::Works, &request).await.unwrap();
        assert_eq!(hits.total, 3);
        assert_eq!(hits.hits[0].id, "W3");
        assert_eq!(hits.hits.len(), 2);
    }

    #[tokio::test]
    async fn test_range_and_phrase() {
        let index = seeded();
        let query: Query = BoolQuery::new()
            .filter(Query::range(fields::PUBLICATION_DATE, Some("2019-01-01"), Some("2019-12-31")))
            .into();
        let hits = index.search(Collection::Works, &SearchRequest::new(query)).await.unwrap();
        assert_eq!(hits.total, 1);

        let phrase = Query::phrase(fields::TITLE, "learning deep");
        let hits = index.search(Collection::Works, &SearchRequest::new(phrase)).await.unwrap();
        assert_eq!(hits.total, 0);
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let index = seeded();
        let result = index
            .update(Collection::Works, "W404", &UpdateScript::increment(fields::READ_COUNT, 1))
            .await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
        assert_eq!(index.update_calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let index = seeded();
        tokio_test::assert_ok!(index.ping().await);
        index.set_unavailable(true);
        tokio_test::assert_err!(index.ping().await);
        assert!(index.get(Collection::Works, "W1").await.is_err());
    }
}
