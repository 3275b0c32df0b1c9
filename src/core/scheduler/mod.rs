//! Sequential run loop
//!
//! Targets are processed one at a time in resolver order. Before each
//! target the scheduler:
//!
//! 1. Pauses for the cooldown if the circuit breaker is tripped
//! 2. Skips the target if the failure log already holds `skip_threshold`
//!    failures for it (read fresh every time)
//!
//! Every outcome is appended to the failure log.

pub mod breaker;
pub mod summary;
pub mod worker;

pub use breaker::CircuitBreaker;
pub use summary::RunSummary;
pub use worker::IngestionWorker;

use crate::config::SchedulerConfig;
use crate::core::failure_log::{FailureLog, LogEvent};
use crate::domain::{Failure, Target};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

const LOG_LOCATION: &str = "scheduler";

/// Successful processing of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub rows_written: u64,
    /// SHA-256 of the downloaded raw extract
    pub sha256: Option<String>,
    pub via_fallback: bool,
}

/// Full acquisition and processing of a single target
#[async_trait]
pub trait TargetProcessor: Send + Sync {
    async fn process(&self, target: &Target) -> Result<Processed, Failure>;
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Skip targets with at least this many logged failures (0 disables)
    pub skip_threshold: usize,
    /// Consecutive timeouts that trip the breaker (0 disables)
    pub breaker_threshold: u32,
    pub cooldown: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            skip_threshold: config.skip_threshold,
            breaker_threshold: config.breaker_threshold,
            cooldown: Duration::from_secs(config.cooldown_secs),
        }
    }
}

pub struct Scheduler<P: TargetProcessor> {
    processor: P,
    log: FailureLog,
    settings: SchedulerSettings,
}

impl<P: TargetProcessor> Scheduler<P> {
    pub fn new(processor: P, log: FailureLog, settings: SchedulerSettings) -> Self {
        Self {
            processor,
            log,
            settings,
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    fn prior_failures(&self, target: &Target) -> usize {
        match self.log.count_failures(target) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(
                    target_label = %target,
                    error = %e,
                    "Could not read failure log, assuming no prior failures"
                );
                0
            }
        }
    }

    /// Processes every target in order and returns the summary
    ///
    /// Individual target failures never abort the run.
    pub async fn run(&self, targets: &[Target]) -> RunSummary {
        let started = Instant::now();
        let total = targets.len();
        let mut summary = RunSummary::new(total);
        let mut breaker =
            CircuitBreaker::new(self.settings.breaker_threshold, self.settings.cooldown);

        for (index, target) in targets.iter().enumerate() {
            if breaker.is_tripped() {
                tracing::warn!(
                    consecutive_timeouts = breaker.consecutive_timeouts(),
                    cooldown_secs = breaker.cooldown().as_secs(),
                    "Circuit breaker tripped, cooling down"
                );
                self.log.record(
                    LOG_LOCATION,
                    &LogEvent::CircuitBreaker {
                        consecutive_timeouts: breaker.consecutive_timeouts(),
                        cooldown: breaker.cooldown(),
                    },
                );
                tokio::time::sleep(breaker.cooldown()).await;
                breaker.reset();
                summary.breaker_trips += 1;
            }

            if self.settings.skip_threshold > 0 {
                let prior = self.prior_failures(target);
                if prior >= self.settings.skip_threshold {
                    tracing::info!(
                        target_label = %target,
                        prior_failures = prior,
                        "Skipping target with repeated failures"
                    );
                    self.log.record(
                        LOG_LOCATION,
                        &LogEvent::Skipped {
                            target: target.clone(),
                            prior_failures: prior,
                        },
                    );
                    summary.skipped.push(target.clone());
                    continue;
                }
            }

            crate::log_target_start!(target, index + 1, total);
            match self.processor.process(target).await {
                Ok(processed) => {
                    breaker.record(None);
                    tracing::info!(
                        target_label = %target,
                        rows = processed.rows_written,
                        via_fallback = processed.via_fallback,
                        "Target succeeded"
                    );
                    self.log.record(
                        LOG_LOCATION,
                        &LogEvent::Succeeded {
                            target: target.clone(),
                            rows: processed.rows_written as usize,
                            sha256: processed.sha256.clone(),
                        },
                    );
                    summary.rows_written += processed.rows_written;
                    if processed.via_fallback {
                        summary.via_fallback += 1;
                    }
                    summary.succeeded.push(target.clone());
                }
                Err(failure) => {
                    breaker.record(Some(failure.kind));
                    tracing::error!(
                        target_label = %target,
                        kind = %failure.kind,
                        reason = %failure.message,
                        "Target failed"
                    );
                    self.log.record(
                        LOG_LOCATION,
                        &LogEvent::Failed {
                            target: target.clone(),
                            failure: failure.clone(),
                        },
                    );
                    summary.failed.push((target.clone(), failure));
                }
            }
        }

        summary.with_duration(started.elapsed())
    }
}
