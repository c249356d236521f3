//! Repository pattern for database operations
//!
//! Provides the relational collaborators of the search engine: keyword
//! popularity (fallback topic, hot topics) and saved-item membership.

use crate::db::models::*;
use crate::db::{DbPool, MonthlyCounts};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Insert,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait, Value,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Popularity of one concept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordStats {
    pub keyword: String,
    pub total: i64,
    pub monthly: MonthlyCounts,
}

impl From<PaperKeyword> for KeywordStats {
    fn from(model: PaperKeyword) -> Self {
        Self {
            monthly: model.monthly(),
            total: i64::from(model.cnt),
            keyword: model.keyword,
        }
    }
}

/// Keywords in sorted order, each once
pub(crate) fn distinct_keywords(keywords: &[String]) -> Vec<&str> {
    let mut distinct: Vec<&str> = keywords.iter().map(String::as_str).collect();
    distinct.sort_unstable();
    distinct.dedup();
    distinct
}

/// `INSERT .. ON CONFLICT (keyword) DO UPDATE` counting one view of `keyword`
/// in the lifetime total and the bucket of `month`
fn keyword_view_upsert(keyword: &str, month: u32) -> Result<Insert<PaperKeywordActiveModel>> {
    let bucket = PaperKeywordColumn::month(month).ok_or_else(|| AppError::Validation {
        message: format!("month {} is outside 1..=12", month),
        field: Some("month".to_string()),
    })?;

    let mut row = PaperKeywordActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        keyword: Set(keyword.to_string()),
        cnt: Set(1),
        ..Default::default()
    };
    row.set(bucket, Value::Int(Some(1)));

    let bucket_count = Func::coalesce([Expr::col((PaperKeywordEntity, bucket)).into(), Expr::val(0).into()]);
    let on_conflict = OnConflict::column(PaperKeywordColumn::Keyword)
        .value(PaperKeywordColumn::Cnt, Expr::col((PaperKeywordEntity, PaperKeywordColumn::Cnt)).add(1))
        .value(bucket, Expr::expr(bucket_count).add(1))
        .to_owned();

    Ok(PaperKeywordEntity::insert(row).on_conflict(on_conflict))
}

/// Search history aggregated per concept
#[async_trait]
pub trait PopularityStore: Send + Sync {
    /// Concept with the highest lifetime count, if any history exists
    async fn most_popular(&self) -> Result<Option<String>>;

    /// Count one view of each keyword in the lifetime total and `month`
    async fn record(&self, keywords: &[String], month: u32) -> Result<()>;

    async fn all(&self) -> Result<Vec<KeywordStats>>;
}

/// Saved-achievement membership
#[async_trait]
pub trait SavedItems: Send + Sync {
    async fn is_saved(&self, user_id: &str, achievement_id: &str) -> Result<bool>;
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Keyword Popularity
    // ========================================================================

    /// Find the most viewed keyword
    pub async fn find_top_keyword(&self) -> Result<Option<PaperKeyword>> {
        PaperKeywordEntity::find()
            .order_by_desc(PaperKeywordColumn::Cnt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List every keyword row
    pub async fn list_keywords(&self) -> Result<Vec<PaperKeyword>> {
        PaperKeywordEntity::find()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Unique index the keyword upsert conflicts on
    pub async fn ensure_keyword_index(&self) -> Result<()> {
        self.write_conn()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS paper_keywords_keyword_key ON paper_keywords (keyword)",
            )
            .await?;
        Ok(())
    }

    /// Bump the lifetime and month counters of each keyword, creating rows
    /// for unseen keywords. Each keyword is one atomic upsert; keywords are
    /// visited in sorted order so concurrent views lock rows consistently.
    pub async fn increment_keywords(&self, keywords: &[String], month: u32) -> Result<()> {
        let keywords = distinct_keywords(keywords);
        let txn = self.write_conn().begin().await?;

        for keyword in &keywords {
            keyword_view_upsert(keyword, month)?.exec_without_returning(&txn).await?;
        }

        txn.commit().await?;
        debug!(keywords = keywords.len(), month, "Recorded keyword views");
        Ok(())
    }

    // ========================================================================
    // Saved Items
    // ========================================================================

    /// Check whether a user has saved an achievement (raw id)
    pub async fn user_has_saved(&self, user_id: &str, achievement_id: &str) -> Result<bool> {
        let count = UserCollectionEntity::find()
            .filter(UserCollectionColumn::UserId.eq(user_id))
            .filter(UserCollectionColumn::AchievementId.eq(achievement_id))
            .count(self.read_conn())
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl PopularityStore for Repository {
    async fn most_popular(&self) -> Result<Option<String>> {
        Ok(self.find_top_keyword().await?.map(|k| k.keyword))
    }

    async fn record(&self, keywords: &[String], month: u32) -> Result<()> {
        self.increment_keywords(keywords, month).await
    }

    async fn all(&self) -> Result<Vec<KeywordStats>> {
        Ok(self.list_keywords().await?.into_iter().map(KeywordStats::from).collect())
    }
}

#[async_trait]
impl SavedItems for Repository {
    async fn is_saved(&self, user_id: &str, achievement_id: &str) -> Result<bool> {
        self.user_has_saved(user_id, achievement_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn test_distinct_keywords_sorted() {
        let keywords = vec!["Physics".to_string(), "Chemistry".to_string(), "Physics".to_string()];
        assert_eq!(distinct_keywords(&keywords), vec!["Chemistry", "Physics"]);
    }

    #[test]
    fn test_view_is_a_single_upsert() {
        let sql = keyword_view_upsert("Physics", 3)
            .unwrap()
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.starts_with("INSERT INTO \"paper_keywords\""), "{}", sql);
        assert!(sql.contains("ON CONFLICT (\"keyword\") DO UPDATE SET"), "{}", sql);
        assert!(sql.contains("\"cnt\" = \"paper_keywords\".\"cnt\" + 1"), "{}", sql);
        assert!(sql.contains("\"cnt3\" = COALESCE(\"paper_keywords\".\"cnt3\", 0) + 1"), "{}", sql);
        assert!(!sql.contains("\"cnt4\" ="), "{}", sql);
    }

    #[test]
    fn test_month_out_of_range() {
        assert!(matches!(
            keyword_view_upsert("Physics", 13),
            Err(AppError::Validation { .. })
        ));
    }
}
