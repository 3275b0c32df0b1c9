//! Targets command implementation
//!
//! Prints the resolved work list, one target per line, in processing order.

use super::{load_or_report, SelectionArgs};
use crate::core::coordinator::IngestCoordinator;
use crate::domain::Target;
use clap::Args;

/// Arguments for the targets command
#[derive(Args, Debug)]
pub struct TargetsArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Print the list as JSON
    #[arg(long)]
    pub json: bool,
}

impl TargetsArgs {
    /// Execute the targets command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Resolving targets");

        let Some(config) = load_or_report(config_path) else {
            return Ok(2); // Configuration error exit code
        };
        let coordinator = self.selection.apply(IngestCoordinator::new(config));

        let today = chrono::Local::now().date_naive();
        let targets = match coordinator.resolve(
            self.selection.include_missing(),
            self.selection.from_log,
            today,
        ) {
            Ok(targets) => targets,
            Err(e) => {
                println!("❌ Failed to resolve targets");
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        if self.json {
            println!("{}", render_json(&targets)?);
        } else {
            println!("📋 {} target(s) pending", targets.len());
            println!();
            super::run::print_targets(&targets);
        }
        Ok(0)
    }
}

fn render_json(targets: &[Target]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(targets)
}
