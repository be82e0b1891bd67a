// snapshottool/src/restore/worker.rs
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::errors::{FailureKind, TableFailure};
use crate::store::{DataAccess, Row, StoreResult, ID_COLUMN};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// What one table's restore achieved.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TableRestoreReport {
    pub restored_count: usize,
    pub errors: Vec<TableFailure>,
}

/// Makes a table's contents equal to a snapshot by clearing it and upserting the rows,
/// both in batches of at most `batch_size`.
#[derive(Debug, Clone, Copy)]
pub struct RestoreWorker {
    batch_size: usize,
}

impl Default for RestoreWorker {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl RestoreWorker {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn restore_table(
        &self,
        store: &dyn DataAccess,
        table: &str,
        rows: &[Row],
    ) -> TableRestoreReport {
        let mut report = TableRestoreReport::default();

        if let Err(failure) = self.clear_table(store, table).await {
            report.errors.push(failure);
        }

        let outcomes = self.upsert_rows(store, table, rows).await;
        for (index, (chunk_len, outcome)) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(_) => report.restored_count += chunk_len,
                Err(e) => {
                    error!("❌ Upsert batch {} for {} failed: {}", index + 1, table, e);
                    report.errors.push(
                        TableFailure::new(FailureKind::UpsertBatch, table, e.to_string())
                            .in_batch(index + 1),
                    );
                }
            }
        }

        info!(
            "✓ Restored {}/{} rows into {} ({} errors)",
            report.restored_count,
            rows.len(),
            table,
            report.errors.len()
        );
        report
    }

    /// Deletes every existing row, one id batch at a time.
    ///
    /// Stops at the first failing batch; rows in later batches are left in place and the
    /// upsert phase still runs.
    // TODO: keep deleting the remaining batches after a failure; only the failing batch's rows
    // need to survive.
    async fn clear_table(&self, store: &dyn DataAccess, table: &str) -> Result<(), TableFailure> {
        let ids: Vec<Value> = store.select_ids(table).await.map_err(|e| {
            error!("❌ Could not list existing ids in {}: {}", table, e);
            TableFailure::new(FailureKind::DeleteBatch, table, e.to_string())
        })?;

        debug!("Clearing {} existing rows from {}", ids.len(), table);
        for (index, chunk) in ids.chunks(self.batch_size).enumerate() {
            if let Err(e) = store.delete_by_ids(table, chunk).await {
                warn!(
                    "⚠️ Delete batch {} for {} failed, skipping remaining deletes: {}",
                    index + 1,
                    table,
                    e
                );
                return Err(TableFailure::new(FailureKind::DeleteBatch, table, e.to_string())
                    .in_batch(index + 1));
            }
        }
        Ok(())
    }

    /// Upserts every chunk, collecting one result per chunk alongside its size.
    async fn upsert_rows(
        &self,
        store: &dyn DataAccess,
        table: &str,
        rows: &[Row],
    ) -> Vec<(usize, StoreResult<u64>)> {
        let mut outcomes = Vec::with_capacity(rows.len().div_ceil(self.batch_size));
        for chunk in rows.chunks(self.batch_size) {
            let outcome = store.upsert_by_key(table, chunk, ID_COLUMN).await;
            outcomes.push((chunk.len(), outcome));
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryStore, Op};
    use serde_json::json;

    fn numbered_rows(range: std::ops::Range<u64>) -> Vec<Row> {
        range
            .map(|id| json!({"id": id, "title": format!("request {}", id)}).as_object().cloned().unwrap())
            .collect()
    }

    fn upsert_sizes(store: &MemoryStore, table: &str) -> Vec<usize> {
        store
            .ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Upsert { table: t, rows } if t == table => Some(rows),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_batches_are_capped_at_batch_size() {
        let store = MemoryStore::new();
        let report = RestoreWorker::new(100)
            .restore_table(&store, "requests", &numbered_rows(0..250))
            .await;

        assert_eq!(report.restored_count, 250);
        assert!(report.errors.is_empty());
        assert_eq!(upsert_sizes(&store, "requests"), vec![100, 100, 50]);
    }

    #[tokio::test]
    async fn test_failed_middle_upsert_batch_is_isolated() {
        let store = MemoryStore::new().fail_upsert_call("requests", 2);
        let report = RestoreWorker::new(100)
            .restore_table(&store, "requests", &numbered_rows(0..250))
            .await;

        assert_eq!(report.restored_count, 150);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, FailureKind::UpsertBatch);
        assert_eq!(report.errors[0].batch, Some(2));
        assert_eq!(store.rows("requests").len(), 150);
    }

    #[tokio::test]
    async fn test_rows_missing_from_snapshot_are_removed() {
        let store = MemoryStore::new().with_table("requests", numbered_rows(0..5));
        let report = RestoreWorker::new(2)
            .restore_table(&store, "requests", &numbered_rows(3..7))
            .await;

        assert!(report.errors.is_empty());
        assert_eq!(store.ids("requests"), vec![json!(3), json!(4), json!(5), json!(6)]);
    }

    #[tokio::test]
    async fn test_delete_failure_stops_deletes_but_still_upserts() {
        let store = MemoryStore::new()
            .with_table("requests", numbered_rows(0..6))
            .fail_delete_call("requests", 2);
        let report = RestoreWorker::new(2)
            .restore_table(&store, "requests", &numbered_rows(0..2))
            .await;

        assert_eq!(report.restored_count, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, FailureKind::DeleteBatch);
        assert_eq!(report.errors[0].batch, Some(2));

        let deletes: Vec<usize> = store
            .ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Delete { ids, .. } => Some(ids),
                _ => None,
            })
            .collect();
        assert_eq!(deletes, vec![2]);
        // ids 2..6 sat in the failed and unattempted delete batches.
        assert_eq!(store.rows("requests").len(), 6);
    }

    #[tokio::test]
    async fn test_restoring_twice_is_idempotent() {
        let store = MemoryStore::new().with_table("requests", numbered_rows(40..45));
        let worker = RestoreWorker::new(3);
        let rows = numbered_rows(0..7);

        worker.restore_table(&store, "requests", &rows).await;
        let once = store.rows("requests");
        worker.restore_table(&store, "requests", &rows).await;

        assert_eq!(store.rows("requests"), once);
        assert_eq!(once.len(), 7);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        assert_eq!(RestoreWorker::new(0).batch_size(), 1);
    }
}
