//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "datasus.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing DataSUS Ingest configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your coverage and paths", self.output);
                println!(
                    "  2. Install the fallback helper (or set fallback.enabled = false)"
                );
                println!("  3. Validate configuration: datasus-ingest validate-config");
                println!("  4. Preview the work list: datasus-ingest targets");
                println!("  5. Run: datasus-ingest run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# DataSUS Ingest Configuration File
# DATASUS extract acquisition and processing orchestrator

[application]
log_level = "info"
dry_run = false

[coverage]
systems = ["SIH-RD", "SIA-PA"]
year_start = 2021
year_end = 2025

[storage]
raw_base = "data/raw"
failure_log = "logs/failures.log"

[source]
ftp_host = "ftp.datasus.gov.br"
mirror_enabled = true

[fallback]
enabled = true
program = "Rscript"
args = ["scripts/r/fallback_download_only.R"]

[scheduler]
skip_threshold = 3
breaker_threshold = 3
cooldown_secs = 300

[logging]
local_enabled = true
local_path = "logs"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# DataSUS Ingest Configuration File
# DATASUS extract acquisition and processing orchestrator
#
# This file contains all configuration options with examples and explanations.
# Every key is optional; the values below are the defaults.
#
# Values may reference environment variables with ${VAR_NAME}, and any key
# can be overridden with DATASUS_<SECTION>_<KEY> (e.g. DATASUS_SOURCE_FTP_HOST).

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level: trace, debug, info, warn, error
log_level = "info"

# Resolve and print targets without downloading anything
dry_run = false

# ============================================================================
# Coverage Grid
# ============================================================================
[coverage]
# SIH-RD (hospital admissions) and/or SIA-PA (outpatient procedures)
systems = ["SIH-RD", "SIA-PA"]

# Federative units; all 27 when omitted
# regions = ["AC", "RJ", "SP"]

# Competence years, inclusive
year_start = 2021
year_end = 2025

# Leave out months after the current calendar month
skip_future = true

# ============================================================================
# Storage
# ============================================================================
[storage]
# Root of the partitioned store:
#   {raw_base}/ano={YYYY}/uf={UF}/sistema={SIH|SIA}/{sih|sia}_{UF}_{YYYY}_{MM}.parquet
raw_base = "data/raw"

# Append-only failure log; also the source of --from-log retries
failure_log = "logs/failures.log"

# ============================================================================
# Remote Sources
# ============================================================================
[source]
ftp_host = "ftp.datasus.gov.br"
ftp_port = 21
ftp_user = "anonymous"
ftp_password = "anonymous@"
# ftp_password = "${DATASUS_FTP_PASSWORD}"

# Remote tree: {base_dir}/{family}/{window}/Dados/{file}
base_dir = "/dissemin/publicos"
window = "200801_"

# Secondary HTTP mirror with the same relative paths
mirror_enabled = true
mirror_base_url = "https://datasus-ftp-mirror.nyc3.cdn.digitaloceanspaces.com"

# Timeouts in seconds; the download timeout bounds idle time, not the
# length of a transfer
connect_timeout_secs = 30
download_timeout_secs = 600

# Attempts against the FTP server before trying the mirror (1-10)
max_attempts = 3

# Upper bound of a single backoff sleep in seconds
backoff_cap_secs = 60

# ============================================================================
# Fallback Helper
# ============================================================================
[fallback]
# Invoked when both sources report the file as absent. Receives
# UF YEAR MONTH SYSTEM after the arguments below, and the cache path to
# produce in the DATASUS_CACHE_PATH environment variable.
enabled = true
program = "Rscript"
args = ["scripts/r/fallback_download_only.R"]
# working_dir = "."

# Kill the helper after this long without output or cache growth
no_progress_timeout_secs = 600

# Kill the helper after this long in total
hard_timeout_secs = 7200

# Liveness poll interval
poll_interval_secs = 15

# ============================================================================
# Scheduler
# ============================================================================
[scheduler]
# Skip a target once the failure log holds this many failures for it
skip_threshold = 3

# Consecutive timeouts that trip the circuit breaker
breaker_threshold = 3

# Pause after the breaker trips, in seconds
cooldown_secs = 300

# ============================================================================
# Pipeline
# ============================================================================
[pipeline]
# Records per batch (1000-1000000)
chunk_size = 80000

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files under local_path
local_enabled = true
local_path = "logs"

# Rotation: daily, hourly, never
local_rotation = "daily"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_init_args_defaults() {
        let args = InitArgs {
            output: "datasus.toml".to_string(),
            with_examples: false,
            force: false,
        };

        assert_eq!(args.output, "datasus.toml");
        assert!(!args.with_examples);
        assert!(!args.force);
    }

    #[test]
    fn test_generate_minimal_config() {
        let config = InitArgs::generate_minimal_config();
        assert!(config.contains("[coverage]"));
        assert!(config.contains("[storage]"));
        assert!(load_config_from_str(&config).is_ok());
    }

    #[test]
    fn test_generate_config_with_examples() {
        let config = InitArgs::generate_config_with_examples();
        assert!(config.contains("# DataSUS Ingest Configuration File"));
        assert!(config.contains("skip_threshold"));
        assert!(config.contains("chunk_size"));
        assert!(load_config_from_str(&config).is_ok());
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("datasus.toml");
        std::fs::write(&output, "# mine").unwrap();

        let args = InitArgs {
            output: output.to_str().unwrap().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "# mine");

        let forced = InitArgs { force: true, ..args };
        assert_eq!(forced.execute().await.unwrap(), 0);
        assert!(std::fs::read_to_string(&output).unwrap().contains("[coverage]"));
    }
}
