//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables should be run with --test-threads=1
//! to avoid interference between tests.

use datasus_ingest::config::load_config;
use datasus_ingest::domain::System;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("DATASUS_APPLICATION_LOG_LEVEL");
    std::env::remove_var("DATASUS_COVERAGE_SYSTEMS");
    std::env::remove_var("DATASUS_COVERAGE_YEAR_END");
    std::env::remove_var("DATASUS_SCHEDULER_COOLDOWN_SECS");
    std::env::remove_var("TEST_DATASUS_FTP_PASSWORD");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[application]
log_level = "debug"
dry_run = true

[coverage]
systems = ["SIA-PA"]
regions = ["RJ", "SP"]
year_start = 2022
year_end = 2023
skip_future = false

[storage]
raw_base = "/srv/datasus/raw"
failure_log = "/srv/datasus/failures.log"

[source]
ftp_host = "ftp.example.org"
ftp_port = 2121
mirror_enabled = false
max_attempts = 5

[fallback]
program = "python3"
args = ["helper.py", "--quiet"]
no_progress_timeout_secs = 120
hard_timeout_secs = 900
poll_interval_secs = 5

[scheduler]
skip_threshold = 4
breaker_threshold = 2
cooldown_secs = 60

[pipeline]
chunk_size = 10000

[logging]
local_enabled = false
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert!(config.application.dry_run);
    assert_eq!(config.coverage.systems, vec![System::SiaPa]);
    assert_eq!(config.coverage.regions.len(), 2);
    assert_eq!(config.coverage.regions[0].as_str(), "RJ");
    assert!(!config.coverage.skip_future);
    assert_eq!(config.storage.raw_base, PathBuf::from("/srv/datasus/raw"));
    assert_eq!(config.source.ftp_port, 2121);
    assert!(!config.source.mirror_enabled);
    assert_eq!(config.source.max_attempts, 5);
    assert_eq!(config.fallback.args, vec!["helper.py", "--quiet"]);
    assert_eq!(config.fallback.hard_timeout_secs, 900);
    assert_eq!(config.scheduler.skip_threshold, 4);
    assert_eq!(config.scheduler.breaker_threshold, 2);
    assert_eq!(config.pipeline.chunk_size, 10_000);
}

#[test]
fn test_empty_config_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("");
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.coverage.systems, System::ALL.to_vec());
    assert_eq!(config.coverage.regions.len(), 27);
    assert_eq!(config.source.ftp_host, "ftp.datasus.gov.br");
    assert_eq!(config.source.max_attempts, 3);
    assert_eq!(config.scheduler.skip_threshold, 3);
    assert_eq!(config.scheduler.breaker_threshold, 3);
    assert_eq!(config.scheduler.cooldown_secs, 300);
    assert_eq!(config.fallback.no_progress_timeout_secs, 600);
    assert_eq!(config.fallback.hard_timeout_secs, 7200);
}

#[test]
fn test_env_overrides_take_precedence() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    std::env::set_var("DATASUS_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("DATASUS_COVERAGE_SYSTEMS", "SIH-RD");
    std::env::set_var("DATASUS_COVERAGE_YEAR_END", "2024");
    std::env::set_var("DATASUS_SCHEDULER_COOLDOWN_SECS", "30");

    let file = write_config(
        r#"
[application]
log_level = "info"

[coverage]
year_start = 2021
year_end = 2025
"#,
    );
    let result = load_config(file.path());
    cleanup_env_vars();

    let config = result.unwrap();
    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.coverage.systems, vec![System::SihRd]);
    assert_eq!(config.coverage.year_end, 2024);
    assert_eq!(config.scheduler.cooldown_secs, 30);
}

#[test]
fn test_env_placeholder_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    std::env::set_var("TEST_DATASUS_FTP_PASSWORD", "s3cret");
    let file = write_config(
        r#"
[source]
ftp_user = "ingest"
ftp_password = "${TEST_DATASUS_FTP_PASSWORD}"
"#,
    );
    let result = load_config(file.path());
    cleanup_env_vars();

    let config = result.unwrap();
    assert_eq!(config.source.ftp_user, "ingest");
    assert_eq!(config.source.ftp_password, "s3cret");
}

#[test]
fn test_missing_placeholder_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[source]
ftp_password = "${TEST_DATASUS_FTP_PASSWORD}"
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_DATASUS_FTP_PASSWORD"));
}

#[test]
fn test_invalid_values_are_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let cases = [
        "[coverage]\nyear_start = 2025\nyear_end = 2021\n",
        "[coverage]\nregions = [\"SAO\"]\n",
        "[coverage]\nsystems = [\"SIM-DO\"]\n",
        "[source]\nmax_attempts = 0\n",
        "[fallback]\nno_progress_timeout_secs = 9000\nhard_timeout_secs = 600\n",
        "[pipeline]\nchunk_size = 10\n",
    ];
    for case in cases {
        let file = write_config(case);
        assert!(load_config(file.path()).is_err(), "accepted: {case}");
    }
}
