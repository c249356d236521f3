//! Leaderboard tables
//!
//! Each domain owns one table. A run replaces the whole table in a single
//! transaction, so readers see either the previous leaderboard or the new
//! one, never a truncated table.

use crate::influence::RankingRow;
use async_trait::async_trait;
use scholarsearch_common::{AppError, DbPool, Result};
use sea_orm::{ConnectionTrait, DbBackend, Statement, TransactionTrait, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

const COLUMNS: &str =
    "id, display_name, primary_tags, h_index, i10_index, works_count, influence_score, cited_count";

#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Fails with a connection error when the store is unreachable
    async fn ping(&self) -> Result<()>;

    /// Create `table` if needed and swap its rows for `rows`
    async fn replace(&self, table: &str, rows: &[RankingRow]) -> Result<()>;

    /// Up to `limit` rows by descending influence score; a missing table
    /// reads as empty
    async fn read(&self, table: &str, limit: usize) -> Result<Vec<RankingRow>>;
}

/// Only generated names ever reach SQL, but check before interpolating
fn checked(table: &str) -> Result<&str> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(table)
    } else {
        Err(AppError::Validation {
            message: format!("invalid leaderboard table name '{}'", table),
            field: Some("domain".to_string()),
        })
    }
}

pub struct SqlRankingStore {
    pool: DbPool,
}

impl SqlRankingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn create_sql(table: &str) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{table}" (
                id VARCHAR(100) PRIMARY KEY,
                display_name VARCHAR(255),
                primary_tags VARCHAR(255),
                h_index BIGINT,
                i10_index BIGINT,
                works_count BIGINT,
                influence_score DOUBLE PRECISION,
                cited_count DOUBLE PRECISION
            )"#
        )
    }

    fn insert_statement(table: &str, rows: &[RankingRow]) -> Statement {
        let mut placeholders = Vec::with_capacity(rows.len());
        let mut values: Vec<Value> = Vec::with_capacity(rows.len() * 8);

        for (i, row) in rows.iter().enumerate() {
            let base = i * 8;
            let slots: Vec<String> = (1..=8).map(|n| format!("${}", base + n)).collect();
            placeholders.push(format!("({})", slots.join(", ")));

            values.push(row.id.clone().into());
            values.push(row.display_name.clone().into());
            values.push(row.primary_tags.clone().into());
            values.push(row.h_index.into());
            values.push(row.i10_index.into());
            values.push(row.works_count.into());
            values.push(row.influence_score.into());
            values.push(row.cited_count.into());
        }

        let sql = format!(
            r#"INSERT INTO "{}" ({}) VALUES {}"#,
            table,
            COLUMNS,
            placeholders.join(", ")
        );
        Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
    }
}

#[async_trait]
impl RankingStore for SqlRankingStore {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    async fn replace(&self, table: &str, rows: &[RankingRow]) -> Result<()> {
        let table = checked(table)?;
        let txn = self.pool.write().begin().await?;

        txn.execute_unprepared(&Self::create_sql(table)).await?;
        txn.execute_unprepared(&format!(r#"TRUNCATE TABLE "{}""#, table))
            .await?;
        if !rows.is_empty() {
            txn.execute(Self::insert_statement(table, rows)).await?;
        }

        txn.commit().await?;
        debug!(table, rows = rows.len(), "Leaderboard replaced");
        Ok(())
    }

    async fn read(&self, table: &str, limit: usize) -> Result<Vec<RankingRow>> {
        let table = checked(table)?;
        let conn = self.pool.read();

        let exists = conn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT 1 FROM information_schema.tables WHERE table_name = $1",
                [table.into()],
            ))
            .await?;
        if exists.is_none() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"SELECT {} FROM "{}" ORDER BY influence_score DESC LIMIT $1"#,
            COLUMNS, table
        );
        let rows = conn
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                [(limit as i64).into()],
            ))
            .await?;

        rows.iter()
            .map(|r| {
                Ok(RankingRow {
                    id: r.try_get("", "id")?,
                    display_name: r.try_get("", "display_name")?,
                    primary_tags: r
                        .try_get::<Option<String>>("", "primary_tags")?
                        .unwrap_or_default(),
                    h_index: r.try_get::<Option<i64>>("", "h_index")?.unwrap_or(0),
                    i10_index: r.try_get::<Option<i64>>("", "i10_index")?.unwrap_or(0),
                    works_count: r.try_get::<Option<i64>>("", "works_count")?.unwrap_or(0),
                    influence_score: r
                        .try_get::<Option<f64>>("", "influence_score")?
                        .unwrap_or(0.0),
                    cited_count: r.try_get::<Option<f64>>("", "cited_count")?.unwrap_or(0.0),
                })
            })
            .collect()
    }
}

/// Leaderboards held in memory
#[derive(Default)]
pub struct MemoryRankingStore {
    tables: RwLock<HashMap<String, Vec<RankingRow>>>,
    unavailable: AtomicBool,
    failing_tables: RwLock<HashSet<String>>,
}

impl MemoryRankingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make writes to one table fail with a statement error
    pub async fn fail_writes_to(&self, table: &str) {
        self.failing_tables.write().await.insert(table.to_string());
    }

    /// Table names written so far
    pub async fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection {
                message: "ranking store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RankingStore for MemoryRankingStore {
    async fn ping(&self) -> Result<()> {
        self.check_available()
    }

    async fn replace(&self, table: &str, rows: &[RankingRow]) -> Result<()> {
        self.check_available()?;
        let table = checked(table)?;
        if self.failing_tables.read().await.contains(table) {
            return Err(AppError::Database(sea_orm::DbErr::Custom(format!(
                "insert into {} rejected",
                table
            ))));
        }
        self.tables
            .write()
            .await
            .insert(table.to_string(), rows.to_vec());
        Ok(())
    }

    async fn read(&self, table: &str, limit: usize) -> Result<Vec<RankingRow>> {
        self.check_available()?;
        let table = checked(table)?;
        let mut rows = self
            .tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default();
        rows.sort_by(|a, b| b.influence_score.total_cmp(&a.influence_score));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, score: f64) -> RankingRow {
        RankingRow {
            id: id.to_string(),
            display_name: None,
            primary_tags: String::new(),
            h_index: 0,
            i10_index: 0,
            works_count: 0,
            influence_score: score,
            cited_count: 0.0,
        }
    }

    #[test]
    fn test_table_name_check() {
        assert!(checked("scholar_ranking_all").is_ok());
        assert!(checked("x\"; DROP TABLE y; --").is_err());
        assert!(checked("").is_err());
    }

    #[test]
    fn test_insert_statement_numbers_placeholders() {
        let statement = SqlRankingStore::insert_statement("t", &[row("A1", 1.0), row("A2", 2.0)]);
        assert!(statement.sql.contains("($1, $2, $3, $4, $5, $6, $7, $8), ($9,"));
        assert!(statement.sql.ends_with("$16)"));
        assert_eq!(statement.values.map(|v| v.0.len()), Some(16));
    }

    #[tokio::test]
    async fn test_memory_replace_and_read() {
        let store = MemoryRankingStore::new();
        store.replace("t", &[row("A1", 1.0), row("A2", 5.0)]).await.unwrap();
        store.replace("t", &[row("A3", 2.0)]).await.unwrap();

        let rows = store.read("t", 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "A3");
        assert!(store.read("missing", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_unavailable() {
        let store = MemoryRankingStore::new();
        store.set_unavailable(true);
        let err = store.ping().await.unwrap_err();
        assert!(err.is_connection_failure());
    }
}
