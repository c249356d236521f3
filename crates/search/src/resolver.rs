//! Entity resolution
//!
//! Turns an author or institution display name into the stored id of the
//! first matching entity. A miss, or a failing index, resolves to `None`:
//! the caller then filters on the raw name alone.

use scholarsearch_common::index::documents::fields;
use scholarsearch_common::index::{Collection, DocumentIndex, Query, SearchRequest};
use scholarsearch_common::Result;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct EntityResolver {
    index: Arc<dyn DocumentIndex>,
}

/// Stored ids of the entities named in a search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEntities {
    pub author_id: Option<String>,
    pub institution_id: Option<String>,
}

impl EntityResolver {
    pub fn new(index: Arc<dyn DocumentIndex>) -> Self {
        Self { index }
    }

    pub async fn resolve_author(&self, name: &str) -> Option<String> {
        self.resolve(Collection::Authors, name).await
    }

    pub async fn resolve_institution(&self, name: &str) -> Option<String> {
        self.resolve(Collection::Institutions, name).await
    }

    /// Resolve both names concurrently; absent names stay unresolved
    pub async fn resolve_all(
        &self,
        author_name: Option<&str>,
        institution_name: Option<&str>,
    ) -> ResolvedEntities {
        let author = async {
            match author_name {
                Some(name) => self.resolve_author(name).await,
                None => None,
            }
        };
        let institution = async {
            match institution_name {
                Some(name) => self.resolve_institution(name).await,
                None => None,
            }
        };

        let (author_id, institution_id) = tokio::join!(author, institution);
        ResolvedEntities {
            author_id,
            institution_id,
        }
    }

    async fn resolve(&self, collection: Collection, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        match self.lookup(collection, name).await {
            Ok(id) => {
                debug!(?collection, name, resolved = id.is_some(), "Entity lookup");
                id
            }
            Err(e) => {
                warn!(?collection, name, error = %e, "Entity lookup failed, filtering by name only");
                None
            }
        }
    }

    async fn lookup(&self, collection: Collection, name: &str) -> Result<Option<String>> {
        let request = SearchRequest::new(Query::match_all_terms(fields::DISPLAY_NAME, name)).size(1);
        let hits = self.index.search(collection, &request).await?;
        Ok(hits.hits.into_iter().next().map(|hit| hit.id))
    }
}
