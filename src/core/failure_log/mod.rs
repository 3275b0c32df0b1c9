//! Append-only failure log
//!
//! The log is both an operator-facing record and the retry-hint source for
//! the resolver and the scheduler's skip rule. It is read line by line on
//! every query, so it can grow without bound.

pub mod event;
pub mod parse;

pub use event::{failure_tag, LogEvent};
pub use parse::parse_failure_line;

use crate::domain::{IngestError, Result, Target};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Handle on the failure log file
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
    actor: String,
}

impl FailureLog {
    /// Create a handle; the file is created on first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            actor: "datasus-ingest".to_string(),
        }
    }

    /// Override the actor field written on every line
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event
    pub fn append(&self, location: &str, event: &LogEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    IngestError::FailureLog(format!(
                        "Failed to create log directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                IngestError::FailureLog(format!(
                    "Failed to open failure log {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        let line = event.render(Utc::now(), &self.actor, location);
        writeln!(file, "{line}").map_err(|e| {
            IngestError::FailureLog(format!("Failed to write failure log entry: {e}"))
        })?;
        Ok(())
    }

    /// Append, downgrading a write error to a warning
    ///
    /// A broken log must not abort a long run.
    pub fn record(&self, location: &str, event: &LogEvent) {
        if let Err(e) = self.append(location, event) {
            tracing::warn!(error = %e, event = %event.tag(), "Could not append to failure log");
        }
    }

    /// Visit every failure-tagged target in file order
    fn for_each_failure(&self, mut visit: impl FnMut(Target)) -> Result<()> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(IngestError::FailureLog(format!(
                    "Failed to open failure log {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).map_err(|e| {
                IngestError::FailureLog(format!("Failed to read failure log: {e}"))
            })?;
            if read == 0 {
                break;
            }
            // Tolerate foreign bytes written by other tools
            let line = String::from_utf8_lossy(&buf);
            if let Some(target) = parse_failure_line(line.trim_end()) {
                visit(target);
            }
        }
        Ok(())
    }

    /// Distinct targets with at least one logged failure
    pub fn retry_targets(&self) -> Result<BTreeSet<Target>> {
        let mut targets = BTreeSet::new();
        self.for_each_failure(|target| {
            targets.insert(target);
        })?;
        Ok(targets)
    }

    /// Number of failure lines logged for `target`
    pub fn count_failures(&self, target: &Target) -> Result<usize> {
        let mut count = 0;
        self.for_each_failure(|logged| {
            if &logged == target {
                count += 1;
            }
        })?;
        Ok(count)
    }

    /// Failure counts for every target in the log
    pub fn failure_counts(&self) -> Result<BTreeMap<Target, usize>> {
        let mut counts = BTreeMap::new();
        self.for_each_failure(|target| {
            *counts.entry(target).or_insert(0) += 1;
        })?;
        Ok(counts)
    }
}
