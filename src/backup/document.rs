// snapshottool/src/backup/document.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::store::Row;

pub const FORMAT_VERSION: &str = "1.0";

/// Portable point-in-time export of every captured table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    #[serde(rename = "version")]
    pub format_version: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub tables: BTreeMap<String, TableSnapshot>,
}

impl BackupDocument {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            created_at,
            tables: BTreeMap::new(),
        }
    }

    pub fn table_counts(&self) -> BTreeMap<String, u64> {
        self.tables
            .iter()
            .map(|(name, snapshot)| (name.clone(), snapshot.row_count as u64))
            .collect()
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.values().map(|s| s.row_count as u64).sum()
    }
}

/// One table inside a document.
///
/// On the wire a captured table is `{"count": n, "data": [...]}` and a failed capture is
/// `{"error": "...", "data": []}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireTable", into = "WireTable")]
pub struct TableSnapshot {
    pub row_count: usize,
    pub rows: Vec<Row>,
    pub capture_error: Option<String>,
}

impl TableSnapshot {
    pub fn captured(rows: Vec<Row>) -> Self {
        Self {
            row_count: rows.len(),
            rows,
            capture_error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            row_count: 0,
            rows: Vec::new(),
            capture_error: Some(error.into()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default)]
    data: Vec<Row>,
}

impl From<WireTable> for TableSnapshot {
    fn from(wire: WireTable) -> Self {
        match wire.error {
            Some(error) => TableSnapshot::failed(error),
            None => TableSnapshot {
                row_count: wire.count.unwrap_or(wire.data.len()),
                rows: wire.data,
                capture_error: None,
            },
        }
    }
}

impl From<TableSnapshot> for WireTable {
    fn from(snapshot: TableSnapshot) -> Self {
        match snapshot.capture_error {
            Some(error) => WireTable {
                count: None,
                error: Some(error),
                data: Vec::new(),
            },
            None => WireTable {
                count: Some(snapshot.row_count),
                error: None,
                data: snapshot.rows,
            },
        }
    }
}
