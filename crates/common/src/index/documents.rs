//! Stored document shapes
//!
//! Field names follow the index mappings (snake_case for imported OpenAlex
//! fields, camelCase for the engagement counters added later).

use serde::{Deserialize, Serialize};

/// Index field names used by queries
pub mod fields {
    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const ABSTRACT: &str = "abstract";
    pub const CONCEPTS: &str = "concepts";
    pub const PUBLICATION_DATE: &str = "publication_date";
    pub const CITED_BY_COUNT: &str = "cited_by_count";
    pub const FAVOURITE_COUNT: &str = "favouriteCount";
    pub const READ_COUNT: &str = "readCount";
    pub const AUTHOR_IDS: &str = "author_ids";
    pub const AUTHOR_NAMES: &str = "author_names";
    pub const INSTITUTION_IDS: &str = "institution_ids";
    pub const INSTITUTION_NAMES: &str = "institution_names";

    pub const DISPLAY_NAME: &str = "display_name";
    pub const WORKS_COUNT: &str = "works_count";
    pub const FIELD: &str = "field";

    pub const PATENT_NAME: &str = "patentName";
    pub const PATENT_ABSTRACT: &str = "abstractText";
    pub const APPLICANT: &str = "applicant";
    pub const INVENTOR: &str = "inventor";
    pub const APPLICATION_YEAR: &str = "applicationYear";
    pub const GRANT_YEAR: &str = "grantYear";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AchievementStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthorRef {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InstitutionRef {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Authorship {
    pub author: Option<AuthorRef>,
    pub institutions: Vec<InstitutionRef>,
}

/// A scholarly work in the works collection. `id` is namespaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AchievementDocument {
    pub id: String,
    pub doi: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub authorships: Vec<Authorship>,
    pub publication_date: Option<String>,
    pub cited_by_count: Option<i64>,
    #[serde(rename = "readCount")]
    pub read_count: Option<i64>,
    #[serde(rename = "favouriteCount")]
    pub favourite_count: Option<i64>,
    pub concepts: Vec<String>,
    pub status: AchievementStatus,
    pub language: Option<String>,
    pub landing_page_url: Option<String>,
    pub related_works: Vec<String>,
    pub author_ids: Vec<String>,
    pub author_names: Vec<String>,
    pub institution_ids: Vec<String>,
    pub institution_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SummaryStats {
    pub h_index: Option<i64>,
    pub i10_index: Option<i64>,
}

/// A scholar in the authors collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthorDocument {
    pub id: String,
    pub display_name: Option<String>,
    pub works_count: Option<i64>,
    pub cited_by_count: Option<i64>,
    pub summary_stats: Option<SummaryStats>,
    /// Research fields; the first is the primary domain
    pub field: Vec<String>,
}

impl AuthorDocument {
    pub fn h_index(&self) -> i64 {
        self.summary_stats.as_ref().and_then(|s| s.h_index).unwrap_or(0)
    }

    pub fn i10_index(&self) -> i64 {
        self.summary_stats.as_ref().and_then(|s| s.i10_index).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InstitutionDocument {
    pub id: String,
    pub display_name: Option<String>,
}

/// A patent record. Years are stored as integers or strings depending on the
/// import batch, so they stay untyped here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PatentDocument {
    pub id: String,
    pub patent_name: Option<String>,
    pub patent_type: Option<String>,
    pub applicant: Option<String>,
    pub applicant_type: Option<String>,
    pub application_number: Option<String>,
    pub application_year: Option<serde_json::Value>,
    pub grant_number: Option<String>,
    pub grant_year: Option<serde_json::Value>,
    #[serde(rename = "ipc")]
    pub ipc_code: Option<String>,
    pub inventor: Option<String>,
    pub abstract_text: Option<String>,
    pub cited_count: Option<i64>,
}
