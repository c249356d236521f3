//! Influence score and leaderboard rows

use scholarsearch_common::index::documents::AuthorDocument;
use scholarsearch_common::DocId;
use serde::{Deserialize, Serialize};

const MAX_TAGS_CHARS: usize = 255;

/// One leaderboard entry. Rank is the position in the table read order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    pub id: String,
    pub display_name: Option<String>,
    pub primary_tags: String,
    pub h_index: i64,
    pub i10_index: i64,
    pub works_count: i64,
    pub influence_score: f64,
    pub cited_count: f64,
}

/// `cited × 0.5 + h × 10 + i10 × 5 + works`, missing stats count as zero
pub fn influence_score(author: &AuthorDocument) -> f64 {
    author.cited_by_count.unwrap_or(0) as f64 * 0.5
        + author.h_index() as f64 * 10.0
        + author.i10_index() as f64 * 5.0
        + author.works_count.unwrap_or(0) as f64
}

impl From<&AuthorDocument> for RankingRow {
    fn from(author: &AuthorDocument) -> Self {
        Self {
            id: DocId::parse(&author.id).raw().to_string(),
            display_name: author.display_name.clone(),
            primary_tags: author.field.join(", ").chars().take(MAX_TAGS_CHARS).collect(),
            h_index: author.h_index(),
            i10_index: author.i10_index(),
            works_count: author.works_count.unwrap_or(0),
            influence_score: influence_score(author),
            cited_count: author.cited_by_count.unwrap_or(0) as f64,
        }
    }
}

/// Score every candidate and keep the best `size`, highest score first.
/// Equal scores keep candidate order.
pub fn leaderboard(authors: &[AuthorDocument], size: usize) -> Vec<RankingRow> {
    let mut rows: Vec<RankingRow> = authors.iter().map(RankingRow::from).collect();
    rows.sort_by(|a, b| b.influence_score.total_cmp(&a.influence_score));
    rows.truncate(size);
    rows
}
