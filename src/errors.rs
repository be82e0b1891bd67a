use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid backup format: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// What went wrong with one table (or one batch of one table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Capture,
    DeleteBatch,
    UpsertBatch,
    MalformedSnapshot,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Capture => "capture failed",
            FailureKind::DeleteBatch => "delete failed",
            FailureKind::UpsertBatch => "upsert failed",
            FailureKind::MalformedSnapshot => "malformed snapshot",
        };
        f.write_str(label)
    }
}

/// A recoverable failure contained at table or batch scope.
///
/// These are collected and returned, never raised past the run boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFailure {
    pub kind: FailureKind,
    pub table: String,
    /// 1-based batch number, when the failure belongs to one chunk.
    pub batch: Option<usize>,
    pub message: String,
}

impl TableFailure {
    pub fn new(kind: FailureKind, table: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.to_string(),
            batch: None,
            message: message.into(),
        }
    }

    pub fn in_batch(mut self, batch: usize) -> Self {
        self.batch = Some(batch);
        self
    }
}

impl fmt::Display for TableFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.batch {
            Some(batch) => write!(f, "{}: {} (batch {}): {}", self.table, self.kind, batch, self.message),
            None => write!(f, "{}: {}: {}", self.table, self.kind, self.message),
        }
    }
}
