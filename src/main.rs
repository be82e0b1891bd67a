//! Table Snapshot/Restore Tool
//!
//! Provides CLI interface for JSON snapshot backups, dependency-ordered restores, and the run log

// snapshottool/src/main.rs
mod backup;
mod config;
mod errors;
mod restore;
mod runlog;
mod store;
mod utils;

use anyhow::{Context, Result};
use config::{
    AppConfig, OperationConfig, load_backup_config_from_json, load_history_config_from_json,
    load_restore_config_from_json,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Main entry point for the snapshot/restore tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_logging();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn run_app() -> Result<()> {
    // Expects config.json in the working directory.
    let config_path = PathBuf::from("config.json");
    let mut app_config = AppConfig::load_from_json(&config_path)
        .context(format!("Failed to load application configuration from {}", config_path.display()))?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    match choice.as_str() {
        "1" | "backup" => {
            println!("🚀 Starting Backup Process...");
            let backup_config = load_backup_config_from_json(&app_config.raw_json_config)
                .context("Failed to load backup configuration from JSON")?;
            app_config.operation = Some(OperationConfig::Backup(backup_config));
            backup::run_backup_flow(&app_config).await
                .context("Backup process failed")?;
        }
        "2" | "restore" => {
            println!("🔄 Starting Restore Process...");
            let path_override = args.get(2).map(PathBuf::from);
            let restore_config = load_restore_config_from_json(&app_config.raw_json_config, path_override)
                .context("Failed to load restore configuration from JSON")?;
            println!(
                "Restore source: {}, batch size: {}",
                restore_config.backup_file_path.display(),
                restore_config.batch_size
            );
            app_config.operation = Some(OperationConfig::Restore(restore_config));
            restore::run_restore_flow(&app_config).await.context("Restore process failed")?;
        }
        "3" | "history" => {
            let history_config = load_history_config_from_json(&app_config.raw_json_config)
                .context("Failed to load history configuration from JSON")?;
            app_config.operation = Some(OperationConfig::History(history_config));
            runlog::run_history_flow(&app_config).await
                .context("Could not read run history")?;
        }
        _ => {
            println!("❌ Invalid choice. Please enter '1' (backup), '2' (restore), or '3' (history).");
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

/// Prompts user to select an operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stdout};

    println!("Select an operation:");
    println!("1. Take Backup (or type 'backup')");
    println!("2. Restore Backup (or type 'restore [file]')");
    println!("3. Show Run History (or type 'history')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
