// snapshottool/src/runlog/cache.rs
use tracing::debug;

use super::{RunLogEntry, RunLogRecorder};
use crate::store::StoreResult;

/// Caller-owned cache over the run-log read path.
///
/// Writes go through [`RunHistory::record`], which invalidates the cache; reads reload lazily.
pub struct RunHistory {
    recorder: RunLogRecorder,
    limit: usize,
    cached: Option<Vec<RunLogEntry>>,
}

impl RunHistory {
    pub fn new(recorder: RunLogRecorder, limit: usize) -> Self {
        Self {
            recorder,
            limit: limit.max(1),
            cached: None,
        }
    }

    pub async fn record(&mut self, entry: &RunLogEntry) -> bool {
        let recorded = self.recorder.record(entry).await;
        self.invalidate();
        recorded
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub async fn refresh(&mut self) -> StoreResult<&[RunLogEntry]> {
        let entries = self.recorder.recent(self.limit).await?;
        debug!("Loaded {} run log entries", entries.len());
        Ok(self.cached.insert(entries).as_slice())
    }

    /// Recent entries, newest first, loading them if the cache is empty.
    pub async fn recent(&mut self) -> StoreResult<&[RunLogEntry]> {
        if self.cached.is_none() {
            return self.refresh().await;
        }
        Ok(self.cached.as_deref().unwrap_or_default())
    }

    pub async fn current_status(&mut self) -> StoreResult<Option<&RunLogEntry>> {
        Ok(self.recent().await?.first())
    }

    #[cfg(test)]
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }
}
