// snapshottool/src/runlog/store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::{Operation, Outcome, RunLogEntry};
use crate::store::{quote_ident, validate_identifier, StoreError, StoreResult};

/// Persistence for run-log entries. Append and list only.
#[async_trait]
pub trait RunLogStore: Send + Sync {
    async fn append(&self, entry: &RunLogEntry) -> StoreResult<()>;

    /// Most recent entries first.
    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<RunLogEntry>>;
}

/// Run log kept in a PostgreSQL table next to the application tables.
///
/// The table is created on first use, so opening the store issues no statements.
pub struct PgRunLogStore {
    pool: PgPool,
    table: String,
    prepared: OnceCell<()>,
}

type LogRecord = (
    Uuid,
    DateTime<Utc>,
    String,
    String,
    Json<BTreeMap<String, u64>>,
    i64,
    Option<String>,
    Option<f64>,
);

impl PgRunLogStore {
    pub fn new(pool: PgPool, table: &str) -> StoreResult<Self> {
        validate_identifier(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
            prepared: OnceCell::new(),
        })
    }

    async fn prepare(&self) -> StoreResult<()> {
        self.prepared.get_or_try_init(|| self.ensure_table()).await?;
        Ok(())
    }

    #[cfg(test)]
    fn is_prepared(&self) -> bool {
        self.prepared.initialized()
    }

    fn query_error(&self) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
        move |source| StoreError::Query {
            table: self.table.clone(),
            source,
        }
    }

    async fn ensure_table(&self) -> StoreResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id uuid PRIMARY KEY,
                run_date timestamptz NOT NULL,
                operation text NOT NULL,
                status text NOT NULL,
                table_counts jsonb NOT NULL DEFAULT '{{}}'::jsonb,
                total_rows bigint NOT NULL DEFAULT 0,
                error_message text,
                duration_seconds double precision
            )",
            quote_ident(&self.table)
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(self.query_error())?;
        Ok(())
    }
}

fn entry_from_record(record: LogRecord) -> StoreResult<RunLogEntry> {
    let (id, run_date, operation, status, table_counts, total_rows, error_message, duration_seconds) =
        record;
    let operation = Operation::parse(&operation)
        .ok_or_else(|| StoreError::Rejected(format!("unknown run operation {:?}", operation)))?;
    let outcome = Outcome::parse(&status)
        .ok_or_else(|| StoreError::Rejected(format!("unknown run status {:?}", status)))?;
    Ok(RunLogEntry {
        id,
        run_date,
        operation,
        outcome,
        table_counts: table_counts.0,
        total_rows: u64::try_from(total_rows).unwrap_or(0),
        error_message,
        duration_seconds,
    })
}

#[async_trait]
impl RunLogStore for PgRunLogStore {
    async fn append(&self, entry: &RunLogEntry) -> StoreResult<()> {
        self.prepare().await?;
        let sql = format!(
            "INSERT INTO {} (id, run_date, operation, status, table_counts, total_rows, error_message, duration_seconds)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            quote_ident(&self.table)
        );
        sqlx::query(&sql)
            .bind(entry.id)
            .bind(entry.run_date)
            .bind(entry.operation.as_str())
            .bind(entry.outcome.as_str())
            .bind(Json(&entry.table_counts))
            .bind(i64::try_from(entry.total_rows).unwrap_or(i64::MAX))
            .bind(entry.error_message.as_deref())
            .bind(entry.duration_seconds)
            .execute(&self.pool)
            .await
            .map_err(self.query_error())?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<RunLogEntry>> {
        self.prepare().await?;
        let sql = format!(
            "SELECT id, run_date, operation, status, table_counts, total_rows, error_message, duration_seconds
             FROM {} ORDER BY run_date DESC LIMIT $1",
            quote_ident(&self.table)
        );
        let records: Vec<LogRecord> = sqlx::query_as(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(self.query_error())?;
        records.into_iter().map(entry_from_record).collect()
    }
}

#[cfg(test)]
pub use memory::MemoryRunLog;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_from_record_rejects_unknown_status() {
        let record: LogRecord = (
            Uuid::new_v4(),
            Utc::now(),
            "backup".to_string(),
            "exploded".to_string(),
            Json(BTreeMap::new()),
            0,
            None,
            None,
        );
        assert!(entry_from_record(record).is_err());
    }

    #[test]
    fn test_entry_from_record_maps_columns() {
        let id = Uuid::new_v4();
        let record: LogRecord = (
            id,
            Utc::now(),
            "restore".to_string(),
            "success".to_string(),
            Json(BTreeMap::from([("requests".to_string(), 12)])),
            12,
            Some("requests: upsert failed (batch 1): timeout".to_string()),
            Some(1.5),
        );
        let entry = entry_from_record(record).unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.operation, Operation::Restore);
        assert_eq!(entry.outcome, Outcome::Success);
        assert_eq!(entry.table_counts.get("requests"), Some(&12));
        assert_eq!(entry.total_rows, 12);
    }

    #[tokio::test]
    async fn test_opening_run_log_creates_nothing_until_first_use() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://snapshottool@127.0.0.1:1/unreachable")
            .unwrap();
        let store = PgRunLogStore::new(pool, "run_history").unwrap();
        assert!(!store.is_prepared());

        let entry = RunLogEntry::start(Operation::Restore).fail(BTreeMap::new(), "bad document".to_string());
        assert!(store.append(&entry).await.is_err());
        assert!(!store.is_prepared());
    }
}
