// snapshottool/src/runlog/mod.rs
pub mod cache;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::{AppConfig, OperationConfig};
use crate::store::StoreResult;
use crate::utils::setting;
use store::RunLogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Backup,
    Restore,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Backup => "backup",
            Operation::Restore => "restore",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "backup" => Some(Operation::Backup),
            "restore" => Some(Operation::Restore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
    InProgress,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::InProgress => "in_progress",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Outcome::Success),
            "failed" => Some(Outcome::Failed),
            "in_progress" => Some(Outcome::InProgress),
            _ => None,
        }
    }
}

/// Outcome record of one backup or restore attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: Uuid,
    pub run_date: DateTime<Utc>,
    pub operation: Operation,
    pub outcome: Outcome,
    pub table_counts: BTreeMap<String, u64>,
    pub total_rows: u64,
    pub error_message: Option<String>,
    pub duration_seconds: Option<f64>,
}

impl RunLogEntry {
    /// Opens an attempt. The returned run is finalized exactly once.
    pub fn start(operation: Operation) -> PendingRun {
        PendingRun {
            entry: RunLogEntry {
                id: Uuid::new_v4(),
                run_date: Utc::now(),
                operation,
                outcome: Outcome::InProgress,
                table_counts: BTreeMap::new(),
                total_rows: 0,
                error_message: None,
                duration_seconds: None,
            },
            started: Instant::now(),
        }
    }
}

/// An attempt that has not been finalized yet.
#[derive(Debug)]
pub struct PendingRun {
    entry: RunLogEntry,
    started: Instant,
}

impl PendingRun {
    pub fn entry(&self) -> &RunLogEntry {
        &self.entry
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn succeed(
        self,
        table_counts: BTreeMap<String, u64>,
        error_message: Option<String>,
    ) -> RunLogEntry {
        self.finalize(Outcome::Success, table_counts, error_message)
    }

    pub fn fail(self, table_counts: BTreeMap<String, u64>, error_message: impl Into<String>) -> RunLogEntry {
        self.finalize(Outcome::Failed, table_counts, Some(error_message.into()))
    }

    fn finalize(
        self,
        outcome: Outcome,
        table_counts: BTreeMap<String, u64>,
        error_message: Option<String>,
    ) -> RunLogEntry {
        let duration = self.elapsed_seconds();
        RunLogEntry {
            outcome,
            total_rows: table_counts.values().sum(),
            table_counts,
            error_message,
            duration_seconds: Some(duration),
            ..self.entry
        }
    }
}

/// Append-only writer and read path over a `RunLogStore`.
#[derive(Clone)]
pub struct RunLogRecorder {
    store: Arc<dyn RunLogStore>,
}

impl RunLogRecorder {
    pub fn new(store: Arc<dyn RunLogStore>) -> Self {
        Self { store }
    }

    /// Appends `entry`. A failure here is logged and swallowed so it cannot fail the run.
    pub async fn record(&self, entry: &RunLogEntry) -> bool {
        match self.store.append(entry).await {
            Ok(()) => {
                info!(
                    "📝 Recorded {} run {} ({}, {} rows)",
                    entry.operation.as_str(),
                    entry.id,
                    entry.outcome.as_str(),
                    entry.total_rows
                );
                true
            }
            Err(e) => {
                error!("❌ Failed to record {} run {}: {}", entry.operation.as_str(), entry.id, e);
                false
            }
        }
    }

    /// The `limit` most recent entries, newest first.
    pub async fn recent(&self, limit: usize) -> StoreResult<Vec<RunLogEntry>> {
        self.store.list_recent(limit).await
    }
}

impl std::fmt::Display for RunLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}  {:<7}  {:<11}  {:>8} rows",
            self.run_date.format("%Y-%m-%d %H:%M:%S"),
            self.operation.as_str(),
            self.outcome.as_str(),
            self.total_rows
        )?;
        if let Some(duration) = self.duration_seconds {
            write!(f, "  {:.1}s", duration)?;
        }
        if let Some(message) = &self.error_message {
            write!(f, "  {}", message)?;
        }
        Ok(())
    }
}

/// Public entry point for listing recent runs.
pub async fn run_history_flow(app_config: &AppConfig) -> anyhow::Result<()> {
    let history_config = match &app_config.operation {
        Some(OperationConfig::History(cfg)) => cfg,
        _ => anyhow::bail!("History operation selected but no history configuration found."),
    };

    let (_store, mut history) = setting::connect(app_config, history_config.limit).await?;
    match history.current_status().await? {
        Some(current) => println!(
            "Current status: {} ({}, {})",
            current.outcome.as_str(),
            current.operation.as_str(),
            current.run_date.format("%Y-%m-%d %H:%M:%S")
        ),
        None => {
            println!("No backup or restore runs recorded yet.");
            return Ok(());
        }
    }

    for entry in history.recent().await? {
        println!("{}", entry);
    }
    Ok(())
}
