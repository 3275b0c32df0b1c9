//! Configuration management.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! The orchestrator reads a TOML file (`datasus.toml` by default) with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `DATASUS_<SECTION>_<KEY>` overrides
//! - Default values for every optional setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use datasus_ingest::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("datasus.toml")?;
//!
//! println!("FTP host: {}", config.source.ftp_host);
//! println!("Years: {}..={}", config.coverage.year_start, config.coverage.year_end);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run flag
//! - [`CoverageConfig`] - Systems, regions and year range of the coverage grid
//! - [`StorageConfig`] - Destination store root and failure log path
//! - [`SourceConfig`] - FTP primary, HTTP mirror, timeouts and backoff
//! - [`FallbackConfig`] - External helper command and its timeouts
//! - [`SchedulerConfig`] - Skip threshold and circuit breaker
//! - [`PipelineConfig`] - Batch size
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [coverage]
//! systems = ["SIH-RD", "SIA-PA"]
//! year_start = 2021
//! year_end = 2025
//!
//! [storage]
//! raw_base = "data/raw"
//! failure_log = "logs/failures.log"
//!
//! [source]
//! ftp_password = "${DATASUS_FTP_PASSWORD}"
//!
//! [fallback]
//! program = "Rscript"
//! args = ["scripts/r/fallback_download_only.R"]
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str, DEFAULT_CONFIG_FILE};
pub use schema::{
    ApplicationConfig, CoverageConfig, FallbackConfig, IngestConfig, LoggingConfig,
    PipelineConfig, SchedulerConfig, SourceConfig, StorageConfig,
};
