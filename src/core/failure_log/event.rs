//! Failure log events and their line rendering
//!
//! Every line is `{timestamp} | {actor} | {location} | {message}`. The message
//! always starts with a stable tag so the file stays grep-capable and the
//! retry parser only has to anchor on the two failure tags.

use crate::domain::{Failure, Stage, Target};
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Field separator between the four line fields
pub const FIELD_SEPARATOR: &str = " | ";

pub const TAG_SUCCEEDED: &str = "SUCCEEDED";
pub const TAG_PROCESSING_ERROR: &str = "PROCESSING ERROR";
pub const TAG_DOWNLOAD_FAILURE: &str = "DEFINITIVE DOWNLOAD FAILURE";
pub const TAG_SKIPPED: &str = "SKIPPED";
pub const TAG_FALLBACK: &str = "FALLBACK";
pub const TAG_CIRCUIT_BREAKER: &str = "CIRCUIT BREAKER";
pub const TAG_CONNECTION_CHECK: &str = "CONNECTION CHECK";
pub const TAG_RUN: &str = "RUN";

/// One event appended to the failure log
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// Destination artifact written and verified
    Succeeded {
        target: Target,
        rows: usize,
        sha256: Option<String>,
    },
    /// Terminal failure for one target in this run
    Failed { target: Target, failure: Failure },
    /// Target skipped because of prior logged failures
    Skipped { target: Target, prior_failures: usize },
    /// External helper about to be invoked
    Fallback { target: Target, reason: String },
    /// Breaker tripped, cooldown starting
    CircuitBreaker {
        consecutive_timeouts: u32,
        cooldown: Duration,
    },
    /// Connectivity probe result
    ConnectionCheck { reachable: bool, detail: String },
    /// Run-level marker (start, empty run, summary)
    Run { message: String },
}

impl LogEvent {
    /// Tag that starts the rendered message
    pub fn tag(&self) -> &'static str {
        match self {
            LogEvent::Succeeded { .. } => TAG_SUCCEEDED,
            LogEvent::Failed { failure, .. } => failure_tag(failure.stage),
            LogEvent::Skipped { .. } => TAG_SKIPPED,
            LogEvent::Fallback { .. } => TAG_FALLBACK,
            LogEvent::CircuitBreaker { .. } => TAG_CIRCUIT_BREAKER,
            LogEvent::ConnectionCheck { .. } => TAG_CONNECTION_CHECK,
            LogEvent::Run { .. } => TAG_RUN,
        }
    }

    /// Target the event refers to, if any
    pub fn target(&self) -> Option<&Target> {
        match self {
            LogEvent::Succeeded { target, .. }
            | LogEvent::Failed { target, .. }
            | LogEvent::Skipped { target, .. }
            | LogEvent::Fallback { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Renders the message field (single line)
    pub fn message(&self) -> String {
        let body = match self {
            LogEvent::Succeeded {
                target,
                rows,
                sha256,
            } => match sha256 {
                Some(digest) => format!("{target}: {rows} rows, raw sha256 {digest}"),
                None => format!("{target}: {rows} rows"),
            },
            LogEvent::Failed { target, failure } => {
                format!("{target}: {}: {}", failure.kind, failure.message)
            }
            LogEvent::Skipped {
                target,
                prior_failures,
            } => format!("{target}: {prior_failures} logged failures"),
            LogEvent::Fallback { target, reason } => format!("{target}: {reason}"),
            LogEvent::CircuitBreaker {
                consecutive_timeouts,
                cooldown,
            } => format!(
                "{consecutive_timeouts} consecutive timeouts, pausing {}s",
                cooldown.as_secs()
            ),
            LogEvent::ConnectionCheck { reachable, detail } => {
                let state = if *reachable { "ok" } else { "unreachable" };
                format!("{state}: {detail}")
            }
            LogEvent::Run { message } => message.clone(),
        };
        single_line(&format!("{}: {}", self.tag(), body))
    }

    /// Renders the full line (without trailing newline)
    pub fn render(&self, at: DateTime<Utc>, actor: &str, location: &str) -> String {
        [
            at.to_rfc3339_opts(SecondsFormat::Secs, true),
            single_line(actor).replace(FIELD_SEPARATOR, " / "),
            single_line(location).replace(FIELD_SEPARATOR, " / "),
            self.message(),
        ]
        .join(FIELD_SEPARATOR)
    }
}

/// Tag used for a terminal failure raised in `stage`
pub fn failure_tag(stage: Stage) -> &'static str {
    match stage {
        Stage::Processing => TAG_PROCESSING_ERROR,
        Stage::Download | Stage::Fallback => TAG_DOWNLOAD_FAILURE,
    }
}

fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
