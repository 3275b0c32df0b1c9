//! Attempt outcome classification
//!
//! Every failed attempt is reduced to a [`Failure`]: a [`FailureKind`] that
//! drives the retry, circuit-breaker and fallback decisions, the [`Stage`]
//! where it happened, and a human-readable message that ends up in the
//! failure log.

use super::errors::IngestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Failure classification taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Remote object confirmed absent (HTTP 404/410, FTP 550, missing from listing)
    NotFound,
    /// Network or server slowness
    Timeout,
    /// Memory pressure while decoding or converting
    ResourceExhausted,
    /// Helper process produced no output and no cache growth for too long
    Stalled,
    /// Helper process exceeded its wall-clock ceiling
    ExceededDuration,
    /// Download completed with zero bytes
    EmptyResult,
    /// Inclusion filter dropped every row
    NoMatch,
    /// Anything else, message kept verbatim
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "not-found",
            FailureKind::Timeout => "timeout",
            FailureKind::ResourceExhausted => "resource-exhaustion",
            FailureKind::Stalled => "stalled",
            FailureKind::ExceededDuration => "exceeded-duration",
            FailureKind::EmptyResult => "empty-result",
            FailureKind::NoMatch => "no-match",
            FailureKind::Other => "other",
        }
    }

    /// Whether source acquisition should keep retrying the same endpoint
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::NotFound)
    }

    /// Whether the scheduler's consecutive-timeout counter is incremented
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(self, FailureKind::Timeout)
    }

    /// Whether the external helper is invoked after both network sources fail
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, FailureKind::NotFound)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "not-found" => Ok(FailureKind::NotFound),
            "timeout" => Ok(FailureKind::Timeout),
            "resource-exhaustion" => Ok(FailureKind::ResourceExhausted),
            "stalled" => Ok(FailureKind::Stalled),
            "exceeded-duration" => Ok(FailureKind::ExceededDuration),
            "empty-result" => Ok(FailureKind::EmptyResult),
            "no-match" => Ok(FailureKind::NoMatch),
            "other" => Ok(FailureKind::Other),
            other => Err(format!("Unknown failure kind '{other}'")),
        }
    }
}

/// Where in the per-target flow a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Primary/secondary network download
    Download,
    /// External helper fallback
    Fallback,
    /// Decode, filter, enrich and write
    Processing,
}

/// A classified attempt failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub stage: Stage,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            message: message.into(),
        }
    }

    pub fn download(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, Stage::Download, message)
    }

    pub fn fallback(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, Stage::Fallback, message)
    }

    pub fn processing(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, Stage::Processing, message)
    }

    /// Classifies an aborting error raised inside a stage
    pub fn from_error(stage: Stage, err: &IngestError) -> Self {
        let kind = match err {
            IngestError::ResourceExhausted(_) => FailureKind::ResourceExhausted,
            _ => FailureKind::Other,
        };
        Self::new(kind, stage, err.to_string())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Failure {}

/// Classifies a local or socket I/O error
pub fn classify_io_error(err: &std::io::Error) -> FailureKind {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => FailureKind::Timeout,
        ErrorKind::OutOfMemory => FailureKind::ResourceExhausted,
        _ => {
            let text = err.to_string().to_lowercase();
            if text.contains("timed out") || text.contains("timeout") {
                FailureKind::Timeout
            } else {
                FailureKind::Other
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(FailureKind::NotFound, false, false, true ; "not found halts retries and falls back")]
    #[test_case(FailureKind::Timeout, true, true, false ; "timeout retries and trips breaker")]
    #[test_case(FailureKind::EmptyResult, true, false, false ; "empty result retries only")]
    #[test_case(FailureKind::Stalled, true, false, false ; "stalled")]
    #[test_case(FailureKind::Other, true, false, false ; "other")]
    fn test_kind_decisions(kind: FailureKind, retry: bool, breaker: bool, fallback: bool) {
        assert_eq!(kind.is_retryable(), retry);
        assert_eq!(kind.counts_toward_breaker(), breaker);
        assert_eq!(kind.triggers_fallback(), fallback);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            FailureKind::NotFound,
            FailureKind::ResourceExhausted,
            FailureKind::ExceededDuration,
            FailureKind::NoMatch,
        ] {
            assert_eq!(FailureKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_classify_io_error() {
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(classify_io_error(&timeout), FailureKind::Timeout);

        let would_block = std::io::Error::new(std::io::ErrorKind::WouldBlock, "read");
        assert_eq!(classify_io_error(&would_block), FailureKind::Timeout);

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(classify_io_error(&refused), FailureKind::Other);
    }

    #[test]
    fn test_failure_from_error() {
        let err = IngestError::ResourceExhausted("batch too large".to_string());
        let failure = Failure::from_error(Stage::Processing, &err);
        assert_eq!(failure.kind, FailureKind::ResourceExhausted);
        assert_eq!(failure.stage, Stage::Processing);
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure::download(FailureKind::EmptyResult, "download returned 0 bytes");
        assert_eq!(failure.to_string(), "empty-result: download returned 0 bytes");
    }
}
