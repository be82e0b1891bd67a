// snapshottool/src/store/mod.rs
pub mod postgres;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

/// One table row: column name to JSON value, in column order.
pub type Row = Map<String, Value>;

/// Column every restorable table is keyed on.
pub const ID_COLUMN: &str = "id";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("query on table {table} failed: {source}")]
    Query {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{0}")]
    Rejected(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Table- and batch-scoped access to the relational store.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Lists the application tables currently present in the store.
    async fn list_tables(&self) -> StoreResult<Vec<String>>;

    /// Unbounded read of every row in `table`.
    async fn select_all(&self, table: &str) -> StoreResult<Vec<Row>>;

    /// Identifiers of every row in `table`.
    async fn select_ids(&self, table: &str) -> StoreResult<Vec<Value>> {
        let rows = self.select_all(table).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove(ID_COLUMN))
            .collect())
    }

    /// Deletes the rows whose id is in `ids`. Returns the number of rows removed.
    async fn delete_by_ids(&self, table: &str, ids: &[Value]) -> StoreResult<u64>;

    /// Insert-or-replace `rows`, resolving conflicts on `conflict_key`.
    async fn upsert_by_key(&self, table: &str, rows: &[Row], conflict_key: &str) -> StoreResult<u64>;
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
    })
}

/// Strict check for names typed into config: schema, run-log table, conflict key.
pub fn validate_identifier(name: &str) -> StoreResult<&str> {
    if name.len() > 63 || !identifier_pattern().is_match(name) {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(name)
}

/// Check for table names read from the catalog or a backup document.
///
/// Any name PostgreSQL can store is accepted; [`quote_ident`] makes it safe in SQL.
pub fn validate_table_name(name: &str) -> StoreResult<&str> {
    if name.is_empty() || name.len() > 63 || name.contains('\0') {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(name)
}

/// Double-quotes an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
