pub mod logic;
pub mod plan;
pub mod worker;

use anyhow::Result;
use crate::config::AppConfig;
use crate::utils::setting;

/// Public entry point for the restore process.
///
/// A restore that finished with table errors still returns `Ok`; the errors are printed.
pub async fn run_restore_flow(app_config: &AppConfig) -> Result<()> {
    let restore_config = match &app_config.operation {
        Some(crate::config::OperationConfig::Restore(cfg)) => cfg,
        _ => anyhow::bail!("Restore operation selected but no restore configuration found."),
    };

    let (store, mut history) = setting::connect(app_config, 1).await?;
    let report =
        logic::perform_restore_orchestration(&store, &app_config.registry, &mut history, restore_config).await;

    match report.outcome {
        Some(outcome) => {
            println!("Restore order: {}", outcome.plan.join(" -> "));
            if outcome.is_success() {
                println!("✅ {}", outcome.summary());
            } else {
                println!("⚠️ Restore completed with {} errors", outcome.errors.len());
                for failure in &outcome.errors {
                    println!("   - {}", failure);
                }
                println!("   {} rows restored", outcome.restored_rows);
            }
            Ok(())
        }
        None => anyhow::bail!(
            "{}",
            report
                .entry
                .error_message
                .unwrap_or_else(|| "Restore aborted".to_string())
        ),
    }
}
