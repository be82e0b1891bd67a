// snapshottool/src/utils/setting.rs
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::runlog::cache::RunHistory;
use crate::runlog::store::PgRunLogStore;
use crate::runlog::RunLogRecorder;
use crate::store::postgres::PgStore;

/// Opens the application store and the run log that sits beside it.
///
/// Nothing is written here. The run log table is created on its first append, after a
/// restore document has already been validated; if that fails the recorder logs it.
pub async fn connect(app_config: &AppConfig, history_limit: usize) -> Result<(PgStore, RunHistory)> {
    let db = &app_config.database;
    let store = PgStore::connect(&db.url, &db.schema, db.max_connections, db.connect_timeout)
        .await
        .context("Failed to connect to the application database")?;
    store
        .check_connection()
        .await
        .context("❌ Cannot proceed - database connection check failed")?;

    let run_log = PgRunLogStore::new(store.pool().clone(), &app_config.run_log_table)
        .context("Invalid run_log_table in config.json")?;
    info!("Run log table: {}", app_config.run_log_table);

    let history = RunHistory::new(RunLogRecorder::new(Arc::new(run_log)), history_limit);
    Ok((store, history))
}
