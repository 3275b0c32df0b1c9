//! Configuration schema types
//!
//! Every section and every key has a default, so an empty file (or no
//! `[section]` at all) yields the standard DATASUS coverage run.

use crate::domain::{Region, System};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main orchestrator configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Coverage grid (systems × regions × years × months)
    #[serde(default)]
    pub coverage: CoverageConfig,

    /// Destination store and failure log locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Primary FTP and secondary HTTP mirror
    #[serde(default)]
    pub source: SourceConfig,

    /// External helper process used as last-resort downloader
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Skip threshold and circuit breaker
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Decode/filter/write settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IngestConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.coverage.validate()?;
        self.storage.validate()?;
        self.source.validate()?;
        self.fallback.validate()?;
        self.scheduler.validate()?;
        self.pipeline.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (resolve and report targets, acquire nothing)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Coverage grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Systems to acquire
    #[serde(default = "default_systems")]
    pub systems: Vec<System>,

    /// Federative units to acquire
    #[serde(default = "Region::all")]
    pub regions: Vec<Region>,

    /// First competence year (inclusive)
    #[serde(default = "default_year_start")]
    pub year_start: i32,

    /// Last competence year (inclusive)
    #[serde(default = "default_year_end")]
    pub year_end: i32,

    /// Drop months after the current calendar month
    #[serde(default = "default_true")]
    pub skip_future: bool,
}

impl CoverageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.systems.is_empty() {
            return Err("coverage.systems cannot be empty".to_string());
        }
        if self.regions.is_empty() {
            return Err("coverage.regions cannot be empty".to_string());
        }
        if !(1000..=9999).contains(&self.year_start) || !(1000..=9999).contains(&self.year_end) {
            return Err(format!(
                "coverage years must have four digits, got {}..{}",
                self.year_start, self.year_end
            ));
        }
        if self.year_start > self.year_end {
            return Err(format!(
                "coverage.year_start ({}) must be <= coverage.year_end ({})",
                self.year_start, self.year_end
            ));
        }
        Ok(())
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            systems: default_systems(),
            regions: Region::all(),
            year_start: default_year_start(),
            year_end: default_year_end(),
            skip_future: true,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the partitioned destination store
    #[serde(default = "default_raw_base")]
    pub raw_base: PathBuf,

    /// Append-only failure log
    #[serde(default = "default_failure_log")]
    pub failure_log: PathBuf,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.raw_base.as_os_str().is_empty() {
            return Err("storage.raw_base cannot be empty".to_string());
        }
        if self.failure_log.as_os_str().is_empty() {
            return Err("storage.failure_log cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_base: default_raw_base(),
            failure_log: default_failure_log(),
        }
    }
}

/// Remote source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Primary FTP host
    #[serde(default = "default_ftp_host")]
    pub ftp_host: String,

    /// Primary FTP port
    #[serde(default = "default_ftp_port")]
    pub ftp_port: u16,

    /// FTP user (anonymous by default)
    #[serde(default = "default_ftp_user")]
    pub ftp_user: String,

    /// FTP password
    #[serde(default = "default_ftp_password")]
    pub ftp_password: String,

    /// Remote base directory holding the system families
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Publication window directory under each family
    #[serde(default = "default_window")]
    pub window: String,

    /// Enable the secondary HTTP mirror
    #[serde(default = "default_true")]
    pub mirror_enabled: bool,

    /// Secondary HTTP mirror base URL
    #[serde(default = "default_mirror_base_url")]
    pub mirror_base_url: String,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Longest silence tolerated on a download connection, in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Attempts against the primary endpoint
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Upper bound of a single backoff sleep in seconds
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

impl SourceConfig {
    fn validate(&self) -> Result<(), String> {
        if self.ftp_host.trim().is_empty() {
            return Err("source.ftp_host cannot be empty".to_string());
        }
        if !self.base_dir.starts_with('/') {
            return Err(format!(
                "source.base_dir must be absolute, got '{}'",
                self.base_dir
            ));
        }
        if self.mirror_enabled {
            let parsed = url::Url::parse(&self.mirror_base_url)
                .map_err(|e| format!("source.mirror_base_url is not a valid URL: {e}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(
                    "source.mirror_base_url must start with http:// or https://".to_string()
                );
            }
        }
        if self.connect_timeout_secs == 0 || self.download_timeout_secs == 0 {
            return Err("source timeouts must be > 0".to_string());
        }
        if !(1..=10).contains(&self.max_attempts) {
            return Err(format!(
                "source.max_attempts must be between 1 and 10, got {}",
                self.max_attempts
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ftp_host: default_ftp_host(),
            ftp_port: default_ftp_port(),
            ftp_user: default_ftp_user(),
            ftp_password: default_ftp_password(),
            base_dir: default_base_dir(),
            window: default_window(),
            mirror_enabled: true,
            mirror_base_url: default_mirror_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_cap_secs: default_backoff_cap_secs(),
        }
    }
}

/// External helper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Invoke the helper when both network sources report not-found
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Helper executable
    #[serde(default = "default_fallback_program")]
    pub program: String,

    /// Leading arguments, placed before `UF YEAR MONTH SYSTEM`
    #[serde(default = "default_fallback_args")]
    pub args: Vec<String>,

    /// Working directory for the helper (current directory if unset)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Kill the helper after this long without output or cache growth
    #[serde(default = "default_no_progress_timeout_secs")]
    pub no_progress_timeout_secs: u64,

    /// Kill the helper after this long in total
    #[serde(default = "default_hard_timeout_secs")]
    pub hard_timeout_secs: u64,

    /// Liveness poll interval
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl FallbackConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.program.trim().is_empty() {
            return Err("fallback.program cannot be empty when fallback is enabled".to_string());
        }
        if self.poll_interval_secs == 0 {
            return Err("fallback.poll_interval_secs must be > 0".to_string());
        }
        if self.no_progress_timeout_secs == 0 || self.hard_timeout_secs == 0 {
            return Err("fallback timeouts must be > 0".to_string());
        }
        if self.no_progress_timeout_secs > self.hard_timeout_secs {
            return Err(format!(
                "fallback.no_progress_timeout_secs ({}) must be <= fallback.hard_timeout_secs ({})",
                self.no_progress_timeout_secs, self.hard_timeout_secs
            ));
        }
        Ok(())
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_fallback_program(),
            args: default_fallback_args(),
            working_dir: None,
            no_progress_timeout_secs: default_no_progress_timeout_secs(),
            hard_timeout_secs: default_hard_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Skip a target once the failure log holds this many failures for it
    #[serde(default = "default_skip_threshold")]
    pub skip_threshold: usize,

    /// Consecutive timeout failures that trip the breaker
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,

    /// Pause after the breaker trips, in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl SchedulerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.skip_threshold == 0 {
            return Err("scheduler.skip_threshold must be > 0".to_string());
        }
        if self.breaker_threshold == 0 {
            return Err("scheduler.breaker_threshold must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            skip_threshold: default_skip_threshold(),
            breaker_threshold: default_breaker_threshold(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records per batch
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), String> {
        if !(1_000..=1_000_000).contains(&self.chunk_size) {
            return Err(format!(
                "pipeline.chunk_size must be between 1000 and 1000000, got {}",
                self.chunk_size
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_skip_threshold() -> usize {
    3
}

fn default_breaker_threshold() -> u32 {
    3
}

fn default_systems() -> Vec<System> {
    System::ALL.to_vec()
}

fn default_year_start() -> i32 {
    2021
}

fn default_year_end() -> i32 {
    2025
}

fn default_raw_base() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_failure_log() -> PathBuf {
    PathBuf::from("logs/failures.log")
}

fn default_ftp_host() -> String {
    "ftp.datasus.gov.br".to_string()
}

fn default_ftp_port() -> u16 {
    21
}

fn default_ftp_user() -> String {
    "anonymous".to_string()
}

fn default_ftp_password() -> String {
    "anonymous@".to_string()
}

fn default_base_dir() -> String {
    "/dissemin/publicos".to_string()
}

fn default_window() -> String {
    "200801_".to_string()
}

fn default_mirror_base_url() -> String {
    "https://datasus-ftp-mirror.nyc3.cdn.digitaloceanspaces.com".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_download_timeout_secs() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_cap_secs() -> u64 {
    60
}

fn default_fallback_program() -> String {
    "Rscript".to_string()
}

fn default_fallback_args() -> Vec<String> {
    vec!["scripts/r/fallback_download_only.R".to_string()]
}

fn default_no_progress_timeout_secs() -> u64 {
    600
}

fn default_hard_timeout_secs() -> u64 {
    7200
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_chunk_size() -> usize {
    80_000
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.coverage.regions.len(), 27);
        assert_eq!(config.coverage.systems, vec![System::SihRd, System::SiaPa]);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: IngestConfig = toml::from_str("").unwrap();
        assert_eq!(config.pipeline.chunk_size, 80_000);
        assert_eq!(config.scheduler.skip_threshold, 3);
        assert_eq!(config.scheduler.breaker_threshold, 3);
        assert_eq!(config.scheduler.cooldown_secs, 300);
        assert_eq!(config.fallback.no_progress_timeout_secs, 600);
        assert_eq!(config.fallback.hard_timeout_secs, 7200);
        assert_eq!(config.fallback.poll_interval_secs, 15);
        assert_eq!(config.source.max_attempts, 3);
        assert_eq!(config.source.backoff_cap_secs, 60);
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig {
            log_level: "info".to_string(),
            dry_run: false,
        };

        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_coverage_validation() {
        let mut config = CoverageConfig::default();
        config.year_start = 2026;
        config.year_end = 2024;
        assert!(config.validate().is_err());

        config.year_start = 2024;
        assert!(config.validate().is_ok());

        config.systems.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_coverage_parses_systems_and_regions() {
        let config: IngestConfig = toml::from_str(
            r#"
[coverage]
systems = ["SIH-RD"]
regions = ["sp", "RJ"]
year_start = 2023
year_end = 2023
"#,
        )
        .unwrap();
        assert_eq!(config.coverage.systems, vec![System::SihRd]);
        assert_eq!(config.coverage.regions[0].as_str(), "SP");
        assert_eq!(config.coverage.regions.len(), 2);
    }

    #[test]
    fn test_invalid_region_rejected_at_parse() {
        let result: Result<IngestConfig, _> = toml::from_str(
            r#"
[coverage]
regions = ["SPX"]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_source_validation() {
        let mut config = SourceConfig::default();
        assert!(config.validate().is_ok());

        config.mirror_base_url = "ftp://mirror".to_string();
        assert!(config.validate().is_err());

        config.mirror_enabled = false;
        assert!(config.validate().is_ok());

        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fallback_validation() {
        let mut config = FallbackConfig::default();
        assert!(config.validate().is_ok());

        config.no_progress_timeout_secs = 10_000;
        assert!(config.validate().is_err());

        config.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_validation() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());

        config.chunk_size = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.local_enabled);
        assert_eq!(config.local_path, "logs");
        assert_eq!(config.local_rotation, "daily");
        assert!(config.validate().is_ok());
    }
}
