//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::IngestConfig;
use crate::domain::errors::IngestError;
use crate::domain::result::Result;
use crate::domain::{Region, System};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "datasus.toml";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into IngestConfig
/// 4. Applies environment variable overrides (DATASUS_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use datasus_ingest::config::loader::load_config;
///
/// let config = load_config("datasus.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<IngestConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(IngestError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        IngestError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Same as [`load_config`] for an in-memory document
pub fn load_config_from_str(contents: &str) -> Result<IngestConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: IngestConfig = toml::from_str(&contents)
        .map_err(|e| IngestError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        IngestError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = placeholder_regex();
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        // Placeholders in comments are left alone
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(IngestError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(val) => val.trim().parse::<T>().map(Some).map_err(|e| {
            IngestError::Configuration(format!("Invalid value '{}' for {}: {}", val, name, e))
        }),
        Err(_) => Ok(None),
    }
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|val| {
        val.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Applies environment variable overrides using DATASUS_* prefix
///
/// Environment variables follow the pattern: DATASUS_<SECTION>_<KEY>
/// For example: DATASUS_SOURCE_FTP_HOST, DATASUS_SCHEDULER_COOLDOWN_SECS.
/// List values (systems, regions, helper args) are comma-separated.
fn apply_env_overrides(config: &mut IngestConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("DATASUS_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_parse("DATASUS_APPLICATION_DRY_RUN")? {
        config.application.dry_run = val;
    }

    // Coverage overrides
    if let Some(values) = env_list("DATASUS_COVERAGE_SYSTEMS") {
        config.coverage.systems = values
            .iter()
            .map(|v| System::from_str(v))
            .collect::<std::result::Result<_, _>>()
            .map_err(IngestError::Configuration)?;
    }
    if let Some(values) = env_list("DATASUS_COVERAGE_REGIONS") {
        config.coverage.regions = values
            .iter()
            .map(|v| Region::new(v.as_str()))
            .collect::<std::result::Result<_, _>>()
            .map_err(IngestError::Configuration)?;
    }
    if let Some(val) = env_parse("DATASUS_COVERAGE_YEAR_START")? {
        config.coverage.year_start = val;
    }
    if let Some(val) = env_parse("DATASUS_COVERAGE_YEAR_END")? {
        config.coverage.year_end = val;
    }
    if let Some(val) = env_parse("DATASUS_COVERAGE_SKIP_FUTURE")? {
        config.coverage.skip_future = val;
    }

    // Storage overrides
    if let Ok(val) = std::env::var("DATASUS_STORAGE_RAW_BASE") {
        config.storage.raw_base = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("DATASUS_STORAGE_FAILURE_LOG") {
        config.storage.failure_log = PathBuf::from(val);
    }

    // Source overrides
    if let Ok(val) = std::env::var("DATASUS_SOURCE_FTP_HOST") {
        config.source.ftp_host = val;
    }
    if let Some(val) = env_parse("DATASUS_SOURCE_FTP_PORT")? {
        config.source.ftp_port = val;
    }
    if let Ok(val) = std::env::var("DATASUS_SOURCE_FTP_USER") {
        config.source.ftp_user = val;
    }
    if let Ok(val) = std::env::var("DATASUS_SOURCE_FTP_PASSWORD") {
        config.source.ftp_password = val;
    }
    if let Some(val) = env_parse("DATASUS_SOURCE_MIRROR_ENABLED")? {
        config.source.mirror_enabled = val;
    }
    if let Ok(val) = std::env::var("DATASUS_SOURCE_MIRROR_BASE_URL") {
        config.source.mirror_base_url = val;
    }
    if let Some(val) = env_parse("DATASUS_SOURCE_CONNECT_TIMEOUT_SECS")? {
        config.source.connect_timeout_secs = val;
    }
    if let Some(val) = env_parse("DATASUS_SOURCE_DOWNLOAD_TIMEOUT_SECS")? {
        config.source.download_timeout_secs = val;
    }
    if let Some(val) = env_parse("DATASUS_SOURCE_MAX_ATTEMPTS")? {
        config.source.max_attempts = val;
    }
    if let Some(val) = env_parse("DATASUS_SOURCE_BACKOFF_CAP_SECS")? {
        config.source.backoff_cap_secs = val;
    }

    // Fallback overrides
    if let Some(val) = env_parse("DATASUS_FALLBACK_ENABLED")? {
        config.fallback.enabled = val;
    }
    if let Ok(val) = std::env::var("DATASUS_FALLBACK_PROGRAM") {
        config.fallback.program = val;
    }
    if let Some(values) = env_list("DATASUS_FALLBACK_ARGS") {
        config.fallback.args = values;
    }
    if let Ok(val) = std::env::var("DATASUS_FALLBACK_WORKING_DIR") {
        config.fallback.working_dir = Some(PathBuf::from(val));
    }
    if let Some(val) = env_parse("DATASUS_FALLBACK_NO_PROGRESS_TIMEOUT_SECS")? {
        config.fallback.no_progress_timeout_secs = val;
    }
    if let Some(val) = env_parse("DATASUS_FALLBACK_HARD_TIMEOUT_SECS")? {
        config.fallback.hard_timeout_secs = val;
    }
    if let Some(val) = env_parse("DATASUS_FALLBACK_POLL_INTERVAL_SECS")? {
        config.fallback.poll_interval_secs = val;
    }

    // Scheduler overrides
    if let Some(val) = env_parse("DATASUS_SCHEDULER_SKIP_THRESHOLD")? {
        config.scheduler.skip_threshold = val;
    }
    if let Some(val) = env_parse("DATASUS_SCHEDULER_BREAKER_THRESHOLD")? {
        config.scheduler.breaker_threshold = val;
    }
    if let Some(val) = env_parse("DATASUS_SCHEDULER_COOLDOWN_SECS")? {
        config.scheduler.cooldown_secs = val;
    }

    // Pipeline overrides
    if let Some(val) = env_parse("DATASUS_PIPELINE_CHUNK_SIZE")? {
        config.pipeline.chunk_size = val;
    }

    // Logging overrides
    if let Some(val) = env_parse("DATASUS_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Ok(val) = std::env::var("DATASUS_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("DATASUS_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
