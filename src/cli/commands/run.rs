//! Run command implementation
//!
//! This module implements the `run` command: resolve the work list, check
//! connectivity, then acquire and process every target in order.

use super::{load_or_report, SelectionArgs};
use crate::core::coordinator::IngestCoordinator;
use crate::core::scheduler::RunSummary;
use crate::domain::Target;
use clap::Args;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Resolve and print targets without acquiring anything
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(
            config_path = %config_path,
            from_log = self.selection.from_log,
            no_missing = self.selection.no_missing,
            "Starting ingestion run"
        );

        println!("🚀 DataSUS ingestion run");
        println!();

        let Some(config) = load_or_report(config_path) else {
            return Ok(2); // Configuration error exit code
        };
        let dry_run = self.dry_run || config.application.dry_run;
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

        println!("📋 {} target(s) to process", targets.len());

        if dry_run {
            println!("🔍 Dry run: nothing will be downloaded");
            println!();
            print_targets(&targets);
            return Ok(0);
        }

        if targets.is_empty() {
            coordinator.execute(&targets).await?;
            println!("✅ Destination store is complete, nothing to do");
            return Ok(0);
        }

        if coordinator.check_connectivity().await {
            println!("🌐 Remote sources reachable");
        } else {
            println!("⚠️  No remote source reachable, continuing with the helper fallback");
        }
        println!();

        let summary = match coordinator.execute(&targets).await {
            Ok(summary) => summary,
            Err(e) => {
                println!("❌ Failed to prepare the run");
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        print_summary(&summary);

        if summary.is_successful() {
            Ok(0)
        } else {
            Ok(1) // Partial failure exit code
        }
    }
}

pub(crate) fn print_targets(targets: &[Target]) {
    for target in targets {
        println!("  {target}");
    }
    if !targets.is_empty() {
        println!();
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.is_successful() {
        println!("✅ Run completed");
    } else {
        println!("⚠️  Run completed with failures");
    }
    println!();
    println!("Summary:");
    println!("  Total targets: {}", summary.total_targets);
    println!("  Succeeded: {}", summary.succeeded.len());
    println!("  Failed: {}", summary.failed.len());
    println!("  Skipped: {}", summary.skipped.len());
    println!("  Via helper: {}", summary.via_fallback);
    println!("  Breaker trips: {}", summary.breaker_trips);
    println!("  Rows written: {}", summary.rows_written);
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());

    if !summary.failed.is_empty() {
        println!();
        println!("Failures:");
        for (target, failure) in &summary.failed {
            println!("  ❌ {target}: {}: {}", failure.kind, failure.message);
        }
    }
    println!();
}
