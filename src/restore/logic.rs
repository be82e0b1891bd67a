// snapshottool/src/restore/logic.rs
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::plan::build_restore_plan;
use super::worker::RestoreWorker;
use crate::backup::document::TableSnapshot;
use crate::config::RestoreConfig;
use crate::errors::{AppError, FailureKind, Result, TableFailure};
use crate::runlog::cache::RunHistory;
use crate::runlog::{Operation, RunLogEntry};
use crate::store::{DataAccess, Row};
use crate::utils::tables::TableRegistry;

/// Aggregate result of a restore that got past validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreOutcome {
    pub plan: Vec<String>,
    pub restored_rows: usize,
    pub table_counts: BTreeMap<String, u64>,
    pub errors: Vec<TableFailure>,
}

impl RestoreOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_success() {
            return format!(
                "Restored {} rows across {} tables",
                self.restored_rows,
                self.table_counts.len()
            );
        }
        let details: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        format!(
            "Restore completed with {} errors ({} rows restored): {}",
            self.errors.len(),
            self.restored_rows,
            details.join("; ")
        )
    }
}

/// Validates a document, plans it, and restores table by table.
pub struct RestoreOrchestrator<'a> {
    store: &'a dyn DataAccess,
    registry: &'a TableRegistry,
    worker: RestoreWorker,
}

impl<'a> RestoreOrchestrator<'a> {
    pub fn new(store: &'a dyn DataAccess, registry: &'a TableRegistry, worker: RestoreWorker) -> Self {
        Self {
            store,
            registry,
            worker,
        }
    }

    /// Restores `document` into the store.
    ///
    /// Fails with [`AppError::Format`] before touching any table when the document has no
    /// `tables` mapping. Once the loop starts every failure is collected in the outcome.
    pub async fn restore(&self, document: &Value) -> Result<RestoreOutcome> {
        let tables = document
            .get("tables")
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::Format("document has no \"tables\" mapping".to_string()))?;

        let plan = build_restore_plan(self.registry, tables.keys().map(String::as_str));
        info!(
            "📋 Restore plan ({} tables, batch size {}): {}",
            plan.len(),
            self.worker.batch_size(),
            plan.join(", ")
        );

        let skipped: Vec<&String> = tables.keys().filter(|t| self.registry.is_skipped(t)).collect();
        if !skipped.is_empty() {
            debug!("Skipping excluded tables: {:?}", skipped);
        }

        let mut outcome = RestoreOutcome {
            plan: plan.clone(),
            ..RestoreOutcome::default()
        };

        for table in &plan {
            let Some(entry) = tables.get(table) else {
                continue;
            };
            let rows = match decode_rows(table, entry) {
                Ok(rows) => rows,
                Err(failure) => {
                    error!("❌ {}", failure);
                    outcome.errors.push(failure);
                    continue;
                }
            };
            if rows.is_empty() {
                debug!("No rows for {}, leaving table untouched", table);
                continue;
            }

            info!("🔄 Restoring {} ({} rows)", table, rows.len());
            let report = self.worker.restore_table(self.store, table, &rows).await;
            outcome.restored_rows += report.restored_count;
            outcome
                .table_counts
                .insert(table.clone(), report.restored_count as u64);
            outcome.errors.extend(report.errors);
        }

        if outcome.is_success() {
            info!("✅ {}", outcome.summary());
        } else {
            warn!("⚠️ {}", outcome.summary());
        }
        Ok(outcome)
    }
}

/// Rows of one document entry. Entries carrying a capture error restore nothing.
fn decode_rows(table: &str, entry: &Value) -> std::result::Result<Vec<Row>, TableFailure> {
    TableSnapshot::deserialize(entry)
        .map(|snapshot| snapshot.rows)
        .map_err(|e| TableFailure::new(FailureKind::MalformedSnapshot, table, e.to_string()))
}

/// Reads and parses a backup file.
pub fn load_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Outcome of a full restore run as seen by the CLI.
#[derive(Debug)]
pub struct RestoreReport {
    pub entry: RunLogEntry,
    pub outcome: Option<RestoreOutcome>,
}

/// Load, restore, and record one restore run.
///
/// Unreadable files and format errors are recorded as failed runs; a restore that ran to
/// the end is recorded as successful, with its collected errors as the message.
pub async fn perform_restore_orchestration(
    store: &dyn DataAccess,
    registry: &TableRegistry,
    history: &mut RunHistory,
    restore_config: &RestoreConfig,
) -> RestoreReport {
    let pending = RunLogEntry::start(Operation::Restore);
    let orchestrator = RestoreOrchestrator::new(store, registry, RestoreWorker::new(restore_config.batch_size));

    let result = match load_document(&restore_config.backup_file_path) {
        Ok(document) => orchestrator.restore(&document).await,
        Err(e) => Err(e),
    };

    let (entry, outcome) = match result {
        Ok(outcome) => {
            let message = (!outcome.is_success()).then(|| outcome.summary());
            (pending.succeed(outcome.table_counts.clone(), message), Some(outcome))
        }
        Err(e) => {
            let message = format!(
                "Restore from {} aborted: {}",
                restore_config.backup_file_path.display(),
                e
            );
            error!("❌ {}", message);
            (pending.fail(BTreeMap::new(), message), None)
        }
    };

    history.record(&entry).await;
    RestoreReport { entry, outcome }
}
