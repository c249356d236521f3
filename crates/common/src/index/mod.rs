//! Document index abstraction
//!
//! Provides:
//! - The `DocumentIndex` trait consumed by search and ranking
//! - A typed query AST rendering to Elasticsearch DSL
//! - Elasticsearch client
//! - Query-evaluating in-memory index for tests and local runs

pub mod documents;
mod elastic;
mod memory;
pub mod query;

pub use elastic::ElasticIndex;
pub use memory::MemoryIndex;
pub use query::{BoolQuery, EngagementWeights, Operator, Query, UpdateScript};

use crate::config::IndexConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Document collections held by the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Works,
    Authors,
    Institutions,
    Patents,
}

impl Collection {
    /// Physical index name for this collection
    pub fn index_name<'a>(&self, config: &'a IndexConfig) -> &'a str {
        match self {
            Collection::Works => &config.works_index,
            Collection::Authors => &config.authors_index,
            Collection::Institutions => &config.institutions_index,
            Collection::Patents => &config.patents_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

/// A paged query against one collection. An empty `sort` means by score.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Query,
    pub from: usize,
    pub size: usize,
    pub sort: Vec<SortField>,
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            from: 0,
            size: 10,
            sort: Vec::new(),
        }
    }

    /// Zero-based page of `size` documents
    pub fn page(mut self, page: u32, size: u32) -> Self {
        self.from = page as usize * size as usize;
        self.size = size as usize;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn sort_desc(mut self, field: &str) -> Self {
        self.sort.push(SortField {
            field: field.to_string(),
            order: SortOrder::Desc,
        });
        self
    }
}

/// One matching document
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Stored (namespaced) id
    pub id: String,
    pub score: f64,
    pub source: Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<Hit>,
}

impl SearchHits {
    /// Decode every hit source into `T`
    pub fn sources<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.hits
            .iter()
            .map(|hit| decode(hit.source.clone()))
            .collect()
    }
}

/// Decode a stored source, reporting which shape failed
pub fn decode<T: DeserializeOwned>(source: Value) -> Result<T> {
    serde_json::from_value(source).map_err(|e| AppError::Index {
        message: format!("Unexpected document shape: {}", e),
    })
}

/// Text-search store holding works, authors, institutions and patents
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn search(&self, collection: Collection, request: &SearchRequest) -> Result<SearchHits>;

    /// Fetch one document by stored id
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>>;

    /// Fetch several documents by stored id, skipping missing ones
    async fn get_many(&self, collection: Collection, ids: &[String]) -> Result<Vec<Value>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(source) = self.get(collection, id).await? {
                found.push(source);
            }
        }
        Ok(found)
    }

    /// Run an update script against one stored document
    async fn update(&self, collection: Collection, id: &str, script: &UpdateScript) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offsets() {
        let request = SearchRequest::new(Query::MatchAll).page(3, 20);
        assert_eq!(request.from, 60);
        assert_eq!(request.size, 20);
    }

    #[test]
    fn test_collection_index_names() {
        let config = crate::config::AppConfig::default().index;
        assert_eq!(Collection::Works.index_name(&config), "openalex_works");
        assert_eq!(Collection::Patents.index_name(&config), "patent");
    }
}
