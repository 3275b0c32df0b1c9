//! Run summary and reporting

use crate::domain::{Failure, Target};
use std::time::Duration;

/// Outcome counts of one scheduler run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Targets handed to the scheduler
    pub total_targets: usize,

    /// Targets whose artifact was written and verified
    pub succeeded: Vec<Target>,

    /// Targets that failed, with their terminal failure
    pub failed: Vec<(Target, Failure)>,

    /// Targets skipped because of prior logged failures
    pub skipped: Vec<Target>,

    /// Number of cooldown pauses taken
    pub breaker_trips: u32,

    /// Targets obtained through the external helper
    pub via_fallback: usize,

    /// Rows written across all artifacts
    pub rows_written: u64,

    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl RunSummary {
    pub fn new(total_targets: usize) -> Self {
        Self {
            total_targets,
            ..Self::default()
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// True when no target failed; skipped targets do not count as failures
    pub fn is_successful(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line form used for the failure log and the console
    pub fn line(&self) -> String {
        format!(
            "{} targets: {} succeeded, {} failed, {} skipped, {} breaker trips in {}s",
            self.total_targets,
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len(),
            self.breaker_trips,
            self.duration.as_secs()
        )
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            total = self.total_targets,
            succeeded = self.succeeded.len(),
            failed = self.failed.len(),
            skipped = self.skipped.len(),
            breaker_trips = self.breaker_trips,
            via_fallback = self.via_fallback,
            rows_written = self.rows_written,
            duration_secs = self.duration.as_secs(),
            "Run completed"
        );

        for (target, failure) in &self.failed {
            tracing::warn!(
                target_label = %target,
                kind = %failure.kind,
                reason = %failure.message,
                "Target failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;
    use std::str::FromStr;

    #[test]
    fn test_line() {
        let mut summary = RunSummary::new(4);
        summary.succeeded.push(Target::from_str("SIH-RD SP 2024 1").unwrap());
        summary.failed.push((
            Target::from_str("SIH-RD SP 2024 2").unwrap(),
            Failure::download(FailureKind::Timeout, "timed out"),
        ));
        summary.skipped.push(Target::from_str("SIH-RD SP 2024 3").unwrap());
        let summary = summary.with_duration(Duration::from_secs(42));

        assert_eq!(
            summary.line(),
            "4 targets: 1 succeeded, 1 failed, 1 skipped, 0 breaker trips in 42s"
        );
        assert!(!summary.is_successful());
    }
}
