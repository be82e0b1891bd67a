pub mod document;
pub mod logic;

use anyhow::Result;
use crate::config::AppConfig;
use crate::runlog::Outcome;
use crate::utils::setting;

/// Public entry point for the backup process.
pub async fn run_backup_flow(app_config: &AppConfig) -> Result<()> {
    let backup_config = match &app_config.operation {
        Some(crate::config::OperationConfig::Backup(cfg)) => cfg,
        _ => anyhow::bail!("Backup operation selected but no backup configuration found."),
    };

    let (store, mut history) = setting::connect(app_config, 1).await?;
    let report =
        logic::perform_backup_orchestration(&store, &app_config.registry, &mut history, backup_config).await;

    for failure in &report.failures {
        println!("⚠️ {}", failure);
    }
    match (report.entry.outcome, &report.file) {
        (Outcome::Success, Some(path)) => {
            println!(
                "💾 Backed up {} rows from {} tables to {}",
                report.entry.total_rows,
                report.entry.table_counts.len(),
                path.display()
            );
            Ok(())
        }
        _ => anyhow::bail!(
            "{}",
            report
                .entry
                .error_message
                .unwrap_or_else(|| "Backup did not complete".to_string())
        ),
    }
}
