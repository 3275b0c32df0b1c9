//! Status command implementation
//!
//! This module implements the `status` command for displaying coverage of
//! the destination store and the targets with logged failures.

use super::load_or_report;
use crate::core::coordinator::IngestCoordinator;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// List every failing target, not only the blocked ones
    #[arg(long)]
    pub all_failures: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking coverage status");

        println!("📊 Coverage Status");
        println!();

        let Some(config) = load_or_report(config_path) else {
            return Ok(2); // Configuration error exit code
        };
        let coordinator = IngestCoordinator::new(config);

        let today = chrono::Local::now().date_naive();
        let status = match coordinator.coverage_status(today) {
            Ok(status) => status,
            Err(e) => {
                println!("❌ Failed to read the failure log");
                println!("   Error: {}", e);
                return Ok(5); // Fatal error exit code
            }
        };

        let grid = coordinator.grid();
        println!(
            "Store: {}  Years: {}-{}  Regions: {}",
            coordinator.store().raw_base().display(),
            grid.year_start,
            grid.year_end,
            grid.regions.len()
        );
        println!();
        println!(
            "{:<10} {:>10} {:>10} {:>10} {:>8}",
            "System", "Expected", "Present", "Missing", "Done"
        );
        println!("{}", "-".repeat(52));
        for entry in &status.systems {
            let percent = if entry.expected == 0 {
                100.0
            } else {
                entry.present as f64 * 100.0 / entry.expected as f64
            };
            println!(
                "{:<10} {:>10} {:>10} {:>10} {:>7.1}%",
                entry.system.code(),
                entry.expected,
                entry.present,
                entry.missing(),
                percent
            );
        }
        println!();

        if status.failing.is_empty() {
            println!("No logged failures for missing targets.");
            return Ok(0);
        }

        let blocked: Vec<_> = status.blocked().collect();
        println!(
            "{} target(s) with logged failures, {} at or above the skip threshold ({})",
            status.failing.len(),
            blocked.len(),
            status.skip_threshold
        );
        println!();

        let rows: Vec<_> = if self.all_failures {
            status.failing.iter().collect()
        } else {
            blocked
        };
        if !rows.is_empty() {
            println!("{:<24} {:>8}", "Target", "Failures");
            println!("{}", "-".repeat(33));
            for (target, count) in rows {
                println!("{:<24} {:>8}", target.to_string(), count);
            }
            println!();
            println!("Run 'datasus-ingest run --from-log' to retry logged targets.");
        }

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_with_missing_config() {
        let args = StatusArgs {
            all_failures: false,
        };
        let code = args.execute("/nonexistent/datasus.toml").await.unwrap();
        assert_eq!(code, 2);
    }
}
