//! Response views
//!
//! Views are what clients see: raw ids only, plus per-caller annotations.
//! They are built fresh for every request and never cached.

use scholarsearch_common::config::SearchConfig;
use scholarsearch_common::index::documents::{AchievementDocument, PatentDocument};
use scholarsearch_common::DocId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deepest hit reachable with from/size paging (`index.max_result_window`)
pub const MAX_RESULT_WINDOW: u32 = 10_000;

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// Fill in defaults, clamp the size to the configured maximum and the
    /// page to the last one inside the result window
    pub fn normalize(page: Option<u32>, size: Option<u32>, config: &SearchConfig) -> Self {
        let size = size
            .filter(|s| *s > 0)
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size)
            .clamp(1, MAX_RESULT_WINDOW);
        let last_page = MAX_RESULT_WINDOW / size - 1;
        Self {
            page: page.unwrap_or(0).min(last_page),
            size,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
}

impl<T> ResultPage<T> {
    pub fn new(records: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            records,
            total,
            page: request.page,
            size: request.size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionInfo {
    pub id: String,
    pub display_name: Option<String>,
}

/// A scholarly work as exposed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementView {
    pub id: DocId,
    pub doi: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub publication_date: Option<String>,
    pub cited_by_count: Option<i64>,
    pub read_count: Option<i64>,
    pub favourite_count: Option<i64>,
    pub concepts: Vec<String>,
    pub language: Option<String>,
    pub landing_page_url: Option<String>,
    pub related_works: Vec<String>,
    pub authorships: Vec<AuthorInfo>,
    /// Distinct institutions across all authorships, ordered by id
    pub institutions: Vec<InstitutionInfo>,
    pub author_ids: Vec<String>,
    pub author_names: Vec<String>,
    pub institution_ids: Vec<String>,
    pub institution_names: Vec<String>,
    pub is_favourite: bool,
}

impl AchievementView {
    pub fn from_document(document: AchievementDocument, is_favourite: bool) -> Self {
        let authorships = document
            .authorships
            .iter()
            .filter_map(|a| a.author.as_ref())
            .map(|author| AuthorInfo {
                id: author.id.clone(),
                display_name: author.display_name.clone(),
            })
            .collect();

        let mut institutions = BTreeMap::new();
        for institution in document.authorships.iter().flat_map(|a| a.institutions.iter()) {
            if let Some(id) = &institution.id {
                institutions
                    .entry(id.clone())
                    .or_insert_with(|| institution.display_name.clone());
            }
        }

        Self {
            id: DocId::parse(&document.id),
            doi: document.doi,
            title: document.title,
            abstract_text: document.abstract_text,
            publication_date: document.publication_date,
            cited_by_count: document.cited_by_count,
            read_count: document.read_count,
            favourite_count: document.favourite_count,
            concepts: document.concepts,
            language: document.language,
            landing_page_url: document.landing_page_url,
            related_works: document.related_works,
            authorships,
            institutions: institutions
                .into_iter()
                .map(|(id, display_name)| InstitutionInfo { id, display_name })
                .collect(),
            author_ids: document.author_ids,
            author_names: document.author_names,
            institution_ids: document.institution_ids,
            institution_names: document.institution_names,
            is_favourite,
        }
    }
}

/// A patent as exposed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatentView {
    pub id: String,
    pub patent_name: Option<String>,
    pub patent_type: Option<String>,
    pub applicant: Option<String>,
    pub application_number: Option<String>,
    pub application_year: Option<serde_json::Value>,
    pub grant_number: Option<String>,
    pub grant_year: Option<serde_json::Value>,
    pub ipc_code: Option<String>,
    pub inventor: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub cited_count: Option<i64>,
}

impl From<PatentDocument> for PatentView {
    fn from(document: PatentDocument) -> Self {
        Self {
            id: document.id,
            patent_name: document.patent_name,
            patent_type: document.patent_type,
            applicant: document.applicant,
            application_number: document.application_number,
            application_year: document.application_year,
            grant_number: document.grant_number,
            grant_year: document.grant_year,
            ipc_code: document.ipc_code,
            inventor: document.inventor,
            abstract_text: document.abstract_text,
            cited_count: document.cited_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarsearch_common::index::documents::{AuthorRef, Authorship, InstitutionRef};

    fn institution(id: &str, name: &str) -> InstitutionRef {
        InstitutionRef {
            id: Some(id.to_string()),
            display_name: Some(name.to_string()),
        }
    }

    #[test]
    fn test_view_strips_namespace_and_dedupes_institutions() {
        let document = AchievementDocument {
            id: "https://openalex.org/W9".to_string(),
            authorships: vec![
                Authorship {
                    author: Some(AuthorRef {
                        id: Some("A1".into()),
                        display_name: Some("Ada".into()),
                    }),
                    institutions: vec![institution("I2", "MIT"), institution("I1", "ETH")],
                },
                Authorship {
                    author: None,
                    institutions: vec![institution("I2", "MIT")],
                },
            ],
            ..Default::default()
        };

        let view = AchievementView::from_document(document, true);
        assert_eq!(view.id.raw(), "W9");
        assert_eq!(view.authorships.len(), 1);
        let ids: Vec<&str> = view.institutions.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["I1", "I2"]);
        assert!(view.is_favourite);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "W9");
    }

    #[test]
    fn test_page_request_defaults_and_clamp() {
        let config = SearchConfig::default();
        assert_eq!(PageRequest::normalize(None, None, &config), PageRequest { page: 0, size: 10 });
        assert_eq!(PageRequest::normalize(Some(2), Some(0), &config).size, 10);
        assert_eq!(PageRequest::normalize(None, Some(10_000), &config).size, 100);
    }

    #[test]
    fn test_page_stays_inside_result_window() {
        let config = SearchConfig::default();
        let deep = PageRequest::normalize(Some(u32::MAX), Some(10), &config);
        assert_eq!(deep.page, 999);
        assert!((deep.page + 1) * deep.size <= MAX_RESULT_WINDOW);

        let wide = SearchConfig {
            max_page_size: 30_000,
            ..SearchConfig::default()
        };
        let page = PageRequest::normalize(Some(3), Some(30_000), &wide);
        assert_eq!(page, PageRequest { page: 0, size: MAX_RESULT_WINDOW });

        // Pages inside the window are untouched
        assert_eq!(PageRequest::normalize(Some(42), Some(100), &config).page, 42);
    }
}
