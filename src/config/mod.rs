// snapshottool/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::restore::worker::DEFAULT_BATCH_SIZE;
use crate::utils::tables::TableRegistry;

const DEFAULT_SCHEMA: &str = "public";
const DEFAULT_RUN_LOG_TABLE: &str = "backup_logs";
const DEFAULT_HISTORY_LIMIT: usize = 10;
const DEFAULT_MAX_CONNECTIONS: u32 = 2;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRegistryConfig {
    pub known_tables: Option<Vec<String>>,
    pub skip_on_restore: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub database_url: Option<String>,
    pub database_schema: Option<String>,
    pub max_connections: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
    pub local_backup_dir: Option<PathBuf>,
    pub backup_file_path_for_restore: Option<PathBuf>,
    pub table_list: Option<Vec<String>>,
    pub batch_size: Option<usize>,
    pub registry: Option<JsonRegistryConfig>,
    pub run_log_table: Option<String>,
    pub history_limit: Option<usize>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub schema: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub local_backup_path: PathBuf,
    /// Explicit tables to capture; `None` means discover everything.
    pub tables: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub backup_file_path: PathBuf,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub operation: Option<OperationConfig>,
    pub database: DatabaseConfig,
    pub registry: TableRegistry,
    pub run_log_table: String,
    pub raw_json_config: RawJsonConfig, // Store the parsed raw config
}

#[derive(Debug, Clone)]
pub enum OperationConfig {
    Backup(BackupConfig),
    Restore(RestoreConfig),
    History(HistoryConfig),
}

impl AppConfig {
    /// Loads `config.json`. `DATABASE_URL` from the environment wins over the file.
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        Self::from_raw(raw_json_config, std::env::var("DATABASE_URL").ok())
    }

    pub fn from_raw(raw_json_config: RawJsonConfig, env_database_url: Option<String>) -> Result<Self> {
        let url = env_database_url
            .filter(|u| !u.trim().is_empty())
            .or_else(|| raw_json_config.database_url.clone())
            .context("database_url must be set in config.json (or DATABASE_URL in the environment)")?;
        validate_database_url(&url)?;

        let max_connections = raw_json_config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_connections == 0 {
            anyhow::bail!("max_connections must be at least 1 in config.json.");
        }

        let database = DatabaseConfig {
            url,
            schema: raw_json_config
                .database_schema
                .clone()
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            max_connections,
            connect_timeout: Duration::from_secs(
                raw_json_config
                    .connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
        };

        let run_log_table = raw_json_config
            .run_log_table
            .clone()
            .unwrap_or_else(|| DEFAULT_RUN_LOG_TABLE.to_string());
        // The run log is append-only, so a restore must never clear it.
        let registry = build_registry(raw_json_config.registry.as_ref()).with_skipped(&run_log_table);

        Ok(AppConfig {
            operation: None, // To be filled by main after parsing CLI args
            database,
            registry,
            run_log_table,
            raw_json_config,
        })
    }
}

fn validate_database_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).context("database_url is not a valid URL")?;
    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(anyhow::anyhow!(
            "database_url must be a postgres:// URL, got scheme {:?}",
            other
        )),
    }
}

/// Registry lists from config replace the compiled-in defaults one list at a time.
fn build_registry(raw: Option<&JsonRegistryConfig>) -> TableRegistry {
    let defaults = TableRegistry::default();
    let Some(raw) = raw else {
        return defaults;
    };
    TableRegistry::new(
        raw.known_tables
            .clone()
            .unwrap_or_else(|| defaults.known_tables().to_vec()),
        raw.skip_on_restore
            .clone()
            .unwrap_or_else(|| defaults.skip_on_restore().to_vec()),
    )
}

pub fn load_backup_config_from_json(raw_config: &RawJsonConfig) -> Result<BackupConfig> {
    let local_backup_path = raw_config
        .local_backup_dir
        .as_ref()
        .context("local_backup_dir must be set in config.json for backup")?
        .clone();

    if local_backup_path.to_string_lossy().is_empty() {
        return Err(anyhow::anyhow!(
            "local_backup_dir cannot be empty in config.json."
        ));
    }

    let tables = raw_config
        .table_list
        .clone()
        .filter(|tables| !tables.is_empty());

    Ok(BackupConfig {
        local_backup_path,
        tables,
    })
}

/// `path_override` (from the command line) takes precedence over `backup_file_path_for_restore`.
pub fn load_restore_config_from_json(
    raw_config: &RawJsonConfig,
    path_override: Option<PathBuf>,
) -> Result<RestoreConfig> {
    let backup_file_path = path_override
        .or_else(|| raw_config.backup_file_path_for_restore.clone())
        .context("backup_file_path_for_restore must be set in config.json for restore")?;

    if backup_file_path.to_string_lossy().trim().is_empty() {
        return Err(anyhow::anyhow!(
            "backup_file_path_for_restore cannot be empty in config.json."
        ));
    }

    let batch_size = raw_config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
    if batch_size == 0 {
        return Err(anyhow::anyhow!("batch_size must be at least 1 in config.json."));
    }

    Ok(RestoreConfig {
        backup_file_path,
        batch_size,
    })
}

pub fn load_history_config_from_json(raw_config: &RawJsonConfig) -> Result<HistoryConfig> {
    let limit = raw_config.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 {
        return Err(anyhow::anyhow!("history_limit must be at least 1 in config.json."));
    }
    Ok(HistoryConfig { limit })
}
