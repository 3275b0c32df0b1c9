//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the DataSUS Ingest configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading also validates
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2); // Configuration error exit code
            }
        };

        let systems: Vec<&str> = config.coverage.systems.iter().map(|s| s.code()).collect();

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Systems: {}", systems.join(", "));
        println!("  Regions: {}", config.coverage.regions.len());
        println!(
            "  Years: {}-{}",
            config.coverage.year_start, config.coverage.year_end
        );
        println!("  Destination: {}", config.storage.raw_base.display());
        println!("  Failure Log: {}", config.storage.failure_log.display());
        println!(
            "  FTP: {}:{}{}",
            config.source.ftp_host, config.source.ftp_port, config.source.base_dir
        );
        if config.source.mirror_enabled {
            println!("  Mirror: {}", config.source.mirror_base_url);
        } else {
            println!("  Mirror: disabled");
        }
        if config.fallback.enabled {
            println!(
                "  Helper: {} {}",
                config.fallback.program,
                config.fallback.args.join(" ")
            );
        } else {
            println!("  Helper: disabled");
        }
        println!(
            "  Skip Threshold: {} failures",
            config.scheduler.skip_threshold
        );
        println!(
            "  Circuit Breaker: {} timeouts, {}s cooldown",
            config.scheduler.breaker_threshold, config.scheduler.cooldown_secs
        );
        println!("  Chunk Size: {}", config.pipeline.chunk_size);
        println!();
        Ok(0)
    }
}
