// snapshottool/src/backup/logic.rs
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::document::{BackupDocument, TableSnapshot};
use crate::config::BackupConfig;
use crate::errors::{FailureKind, Result, TableFailure};
use crate::runlog::cache::RunHistory;
use crate::runlog::{Operation, RunLogEntry};
use crate::store::DataAccess;
use crate::utils::tables::TableRegistry;

/// Result of one capture pass.
#[derive(Debug)]
pub struct Capture {
    pub document: BackupDocument,
    pub failures: Vec<TableFailure>,
    pub elapsed_seconds: f64,
}

/// Reads every table into one `BackupDocument`.
pub struct SnapshotBuilder<'a> {
    store: &'a dyn DataAccess,
    registry: &'a TableRegistry,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(store: &'a dyn DataAccess, registry: &'a TableRegistry) -> Self {
        Self { store, registry }
    }

    /// Tables to capture: the store's own catalog, or the registry if discovery fails.
    pub async fn discover_tables(&self) -> Vec<String> {
        match self.store.list_tables().await {
            Ok(tables) => tables,
            Err(e) => {
                warn!("⚠️ Table discovery failed ({}), falling back to the known table list", e);
                self.registry.known_tables().to_vec()
            }
        }
    }

    /// Captures `tables` (or every discoverable table). A table that cannot be read is
    /// recorded with its error and the capture moves on.
    pub async fn capture(&self, tables: Option<&[String]>, created_at: DateTime<Utc>) -> Capture {
        let started = std::time::Instant::now();
        let tables = match tables {
            Some(list) => list.to_vec(),
            None => self.discover_tables().await,
        };

        if tables.is_empty() {
            info!("ℹ️ No tables to back up, writing an empty document");
        }

        let mut document = BackupDocument::new(created_at);
        let mut failures = Vec::new();

        for table in tables {
            match self.store.select_all(&table).await {
                Ok(rows) => {
                    info!("✓ Captured {} rows from {}", rows.len(), table);
                    document.tables.insert(table, TableSnapshot::captured(rows));
                }
                Err(e) => {
                    let message = e.to_string();
                    error!("❌ Failed to capture table {}: {}", table, message);
                    failures.push(TableFailure::new(FailureKind::Capture, &table, message.clone()));
                    document.tables.insert(table, TableSnapshot::failed(message));
                }
            }
        }

        Capture {
            document,
            failures,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        }
    }
}

/// File name for a document taken at `created_at`, down to the millisecond.
pub fn backup_file_name(created_at: DateTime<Utc>) -> String {
    format!("backup_{}.json", created_at.format("%Y-%m-%d_%H_%M_%S_%3f"))
}

/// Writes the document as pretty JSON into `backup_dir`, creating the directory if needed.
///
/// The file is written under a temporary name and moved into place, so a reader never sees
/// a half-written backup. An existing backup with the same name is never replaced.
pub fn write_document(document: &BackupDocument, backup_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)?;
    let path = backup_dir.join(backup_file_name(document.created_at));
    let json = serde_json::to_string_pretty(document)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(backup_dir)?;
    temp_file.write_all(json.as_bytes())?;
    temp_file.as_file().sync_all()?;
    temp_file.persist_noclobber(&path).map_err(|e| e.error)?;
    Ok(path)
}

/// Outcome of a full backup run as seen by the CLI.
#[derive(Debug)]
pub struct BackupReport {
    pub entry: RunLogEntry,
    pub file: Option<PathBuf>,
    pub failures: Vec<TableFailure>,
}

/// Capture, persist, and record one backup run.
///
/// Per-table capture errors still yield a successful run. Only a failure to produce the
/// document file marks the run as failed.
pub async fn perform_backup_orchestration(
    store: &dyn DataAccess,
    registry: &TableRegistry,
    history: &mut RunHistory,
    backup_config: &BackupConfig,
) -> BackupReport {
    let pending = RunLogEntry::start(Operation::Backup);
    let created_at = pending.entry().run_date;

    let builder = SnapshotBuilder::new(store, registry);
    let capture = builder
        .capture(backup_config.tables.as_deref(), created_at)
        .await;
    let counts = capture.document.table_counts();

    info!(
        "Captured {} tables, {} rows in {:.2}s",
        capture.document.tables.len(),
        capture.document.total_rows(),
        capture.elapsed_seconds
    );

    let (entry, file) = match write_document(&capture.document, &backup_config.local_backup_path) {
        Ok(path) => {
            info!("💾 Backup written to {}", path.display());
            let message = summarize_capture_errors(&capture.failures);
            (pending.succeed(counts, message), Some(path))
        }
        Err(e) => {
            let message = format!(
                "Failed to write backup into {}: {}",
                backup_config.local_backup_path.display(),
                e
            );
            error!("❌ {}", message);
            (pending.fail(counts, message), None)
        }
    };

    history.record(&entry).await;

    BackupReport {
        entry,
        file,
        failures: capture.failures,
    }
}

fn summarize_capture_errors(failures: &[TableFailure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let lines: Vec<String> = failures.iter().map(ToString::to_string).collect();
    Some(format!("{} tables failed to capture: {}", failures.len(), lines.join("; ")))
}
