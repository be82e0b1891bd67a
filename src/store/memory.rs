// In-memory `DataAccess` used by the unit tests, with failure injection.
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use super::{DataAccess, Row, StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Delete { table: String, ids: usize },
    Upsert { table: String, rows: usize },
}

#[derive(Default)]
struct Inner {
    tables: BTreeMap<String, Vec<Row>>,
    foreign_keys: Vec<(String, String, String)>,
    discovery_fails: bool,
    failing_selects: HashSet<String>,
    failing_deletes: HashSet<(String, usize)>,
    failing_upserts: HashSet<(String, usize)>,
    delete_calls: HashMap<String, usize>,
    upsert_calls: HashMap<String, usize>,
    ops: Vec<Op>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: &str, rows: Vec<Row>) -> Self {
        self.inner.lock().unwrap().tables.insert(table.to_string(), rows);
        self
    }

    /// Rejects upserts into `table` whose `column` points at a missing `parent` id.
    pub fn with_foreign_key(self, table: &str, column: &str, parent: &str) -> Self {
        self.inner.lock().unwrap().foreign_keys.push((
            table.to_string(),
            column.to_string(),
            parent.to_string(),
        ));
        self
    }

    pub fn fail_discovery(self) -> Self {
        self.inner.lock().unwrap().discovery_fails = true;
        self
    }

    pub fn fail_select(self, table: &str) -> Self {
        self.inner.lock().unwrap().failing_selects.insert(table.to_string());
        self
    }

    /// Fails the `call`-th (1-based) delete against `table`.
    pub fn fail_delete_call(self, table: &str, call: usize) -> Self {
        self.inner.lock().unwrap().failing_deletes.insert((table.to_string(), call));
        self
    }

    /// Fails the `call`-th (1-based) upsert against `table`.
    pub fn fail_upsert_call(self, table: &str, call: usize) -> Self {
        self.inner.lock().unwrap().failing_upserts.insert((table.to_string(), call));
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner.lock().unwrap().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn ids(&self, table: &str) -> Vec<Value> {
        let mut ids: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter_map(|mut r| r.remove("id"))
            .collect();
        ids.sort_by_key(|v| v.to_string());
        ids
    }

    pub fn ops(&self) -> Vec<Op> {
        self.inner.lock().unwrap().ops.clone()
    }

    pub fn snapshot_tables(&self) -> BTreeMap<String, Vec<Row>> {
        self.inner.lock().unwrap().tables.clone()
    }
}

fn next_call(calls: &mut HashMap<String, usize>, table: &str) -> usize {
    let counter = calls.entry(table.to_string()).or_insert(0);
    *counter += 1;
    *counter
}

#[async_trait]
impl DataAccess for MemoryStore {
    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        if inner.discovery_fails {
            return Err(StoreError::Rejected("catalog unavailable".to_string()));
        }
        Ok(inner.tables.keys().cloned().collect())
    }

    async fn select_all(&self, table: &str) -> StoreResult<Vec<Row>> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_selects.contains(table) {
            return Err(StoreError::Rejected(format!("permission denied for table {}", table)));
        }
        // Tables that were never seeded read as empty, like a freshly migrated schema.
        Ok(inner.tables.get(table).cloned().unwrap_or_default())
    }

    async fn delete_by_ids(&self, table: &str, ids: &[Value]) -> StoreResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        let call = next_call(&mut inner.delete_calls, table);
        if inner.failing_deletes.contains(&(table.to_string(), call)) {
            return Err(StoreError::Rejected(format!("delete batch {} rejected", call)));
        }
        let rows = inner.tables.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| row.get("id").is_none_or(|id| !ids.contains(id)));
        let removed = (before - rows.len()) as u64;
        inner.ops.push(Op::Delete {
            table: table.to_string(),
            ids: ids.len(),
        });
        Ok(removed)
    }

    async fn upsert_by_key(&self, table: &str, rows: &[Row], conflict_key: &str) -> StoreResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        let call = next_call(&mut inner.upsert_calls, table);
        if inner.failing_upserts.contains(&(table.to_string(), call)) {
            return Err(StoreError::Rejected(format!("upsert batch {} rejected", call)));
        }

        for (child, column, parent) in &inner.foreign_keys {
            if child != table {
                continue;
            }
            let parent_ids: Vec<Value> = inner
                .tables
                .get(parent)
                .map(|rows| rows.iter().filter_map(|r| r.get("id").cloned()).collect())
                .unwrap_or_default();
            for row in rows {
                if let Some(reference) = row.get(column) {
                    if !reference.is_null() && !parent_ids.contains(reference) {
                        return Err(StoreError::Rejected(format!(
                            "foreign key {}.{} -> {} violated",
                            table, column, parent
                        )));
                    }
                }
            }
        }

        let existing = inner.tables.entry(table.to_string()).or_default();
        for row in rows {
            let key = row
                .get(conflict_key)
                .cloned()
                .ok_or_else(|| StoreError::Rejected(format!("row without {}", conflict_key)))?;
            match existing.iter_mut().find(|r| r.get(conflict_key) == Some(&key)) {
                Some(slot) => *slot = row.clone(),
                None => existing.push(row.clone()),
            }
        }
        inner.ops.push(Op::Upsert {
            table: table.to_string(),
            rows: rows.len(),
        });
        Ok(rows.len() as u64)
    }
}
