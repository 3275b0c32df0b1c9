//! Logging and observability
//!
//! Structured `tracing` output with:
//! - Console output with span timings
//! - JSON-formatted local file logging with rotation
//! - `RUST_LOG` filter override
//!
//! # Example
//!
//! ```no_run
//! use datasus_ingest::logging::init_logging;
//! use datasus_ingest::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of one target attempt
///
/// # Example
///
/// ```no_run
/// use datasus_ingest::log_target_start;
/// use datasus_ingest::domain::Target;
/// use std::str::FromStr;
///
/// let target = Target::from_str("SIH-RD SP 2024 03").unwrap();
/// log_target_start!(&target, 1, 10);
/// ```
#[macro_export]
macro_rules! log_target_start {
    ($target:expr, $index:expr, $total:expr) => {
        tracing::info!(
            target_label = %$target,
            index = $index,
            total = $total,
            "Starting target"
        );
    };
}

/// Log a failed attempt with its classification
///
/// # Example
///
/// ```no_run
/// use datasus_ingest::log_attempt_failure;
/// use datasus_ingest::domain::{Failure, FailureKind};
///
/// let failure = Failure::download(FailureKind::Timeout, "timed out");
/// log_attempt_failure!("ftp", 2, 3, &failure);
/// ```
#[macro_export]
macro_rules! log_attempt_failure {
    ($endpoint:expr, $attempt:expr, $max_attempts:expr, $failure:expr) => {
        tracing::warn!(
            endpoint = $endpoint,
            attempt = $attempt,
            max_attempts = $max_attempts,
            kind = %$failure.kind,
            reason = %$failure.message,
            "Attempt failed"
        );
    };
}

/// Log a retry backoff sleep
///
/// # Example
///
/// ```no_run
/// use datasus_ingest::log_retry_backoff;
/// use std::time::Duration;
///
/// log_retry_backoff!(2, Duration::from_millis(4_300));
/// ```
#[macro_export]
macro_rules! log_retry_backoff {
    ($attempt:expr, $delay:expr) => {
        tracing::info!(
            attempt = $attempt,
            delay_ms = $delay.as_millis() as u64,
            "Backing off before retry"
        );
    };
}
