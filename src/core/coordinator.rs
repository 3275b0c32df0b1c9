//! Run coordination
//!
//! Wires configuration into the resolver, the sources, the fallback helper,
//! the pipeline and the scheduler. The CLI commands are thin wrappers over
//! this type.

use crate::adapters::remote::{FtpSource, HttpMirrorSource, RemoteSource};
use crate::config::IngestConfig;
use crate::core::acquisition::{BackoffPolicy, SourceAcquisition};
use crate::core::failure_log::{FailureLog, LogEvent};
use crate::core::fallback::FallbackSupervisor;
use crate::core::pipeline::Pipeline;
use crate::core::scheduler::{
    IngestionWorker, RunSummary, Scheduler, SchedulerSettings, TargetProcessor,
};
use crate::core::targets::{CoverageGrid, DestinationStore, TargetResolver};
use crate::domain::{Result, System, Target};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

const LOG_LOCATION: &str = "coordinator";

/// Artifacts present versus expected for one system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemCoverage {
    pub system: System,
    pub expected: usize,
    pub present: usize,
}

impl SystemCoverage {
    pub fn missing(&self) -> usize {
        self.expected - self.present
    }
}

/// Snapshot of the destination store and the failure log
#[derive(Debug, Clone)]
pub struct CoverageStatus {
    pub systems: Vec<SystemCoverage>,
    /// Targets with at least one logged failure and no artifact yet
    pub failing: BTreeMap<Target, usize>,
    pub skip_threshold: usize,
}

impl CoverageStatus {
    /// Failing targets the scheduler would skip
    pub fn blocked(&self) -> impl Iterator<Item = (&Target, &usize)> {
        self.failing
            .iter()
            .filter(move |(_, count)| **count >= self.skip_threshold)
    }
}

/// Owns the configuration and the shared handles of one invocation
pub struct IngestCoordinator {
    config: IngestConfig,
    grid: CoverageGrid,
    store: DestinationStore,
    log: FailureLog,
}

impl IngestCoordinator {
    pub fn new(config: IngestConfig) -> Self {
        let grid = CoverageGrid::from_config(&config.coverage);
        let store = DestinationStore::new(&config.storage.raw_base);
        let log = FailureLog::new(&config.storage.failure_log);
        Self {
            config,
            grid,
            store,
            log,
        }
    }

    /// Restrict the grid to another year range
    pub fn with_years(mut self, year_start: i32, year_end: i32) -> Self {
        self.grid = self.grid.with_years(year_start, year_end);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn grid(&self) -> &CoverageGrid {
        &self.grid
    }

    pub fn store(&self) -> &DestinationStore {
        &self.store
    }

    pub fn failure_log(&self) -> &FailureLog {
        &self.log
    }

    /// Compute the work list as of `today`
    pub fn resolve(
        &self,
        include_missing: bool,
        include_from_log: bool,
        today: NaiveDate,
    ) -> Result<Vec<Target>> {
        TargetResolver::new(&self.grid, &self.store, &self.log).resolve(
            include_missing,
            include_from_log,
            today,
        )
    }

    /// Probe the FTP server, then the mirror
    ///
    /// The result is logged as a `CONNECTION CHECK` event and never stops
    /// the run.
    pub async fn check_connectivity(&self) -> bool {
        let ftp = FtpSource::from_config(&self.config.source);
        let (reachable, detail) = match ftp.probe().await {
            Ok(detail) => (true, detail),
            Err(ftp_failure) => {
                tracing::warn!(error = %ftp_failure.message, "FTP probe failed");
                match self.mirror() {
                    Some(Ok(mirror)) => match mirror.probe().await {
                        Ok(detail) => (
                            true,
                            format!("ftp down ({}); {detail}", ftp_failure.message),
                        ),
                        Err(mirror_failure) => (
                            false,
                            format!(
                                "ftp: {}; mirror: {}",
                                ftp_failure.message, mirror_failure.message
                            ),
                        ),
                    },
                    Some(Err(e)) => (false, format!("ftp: {}; mirror: {e}", ftp_failure.message)),
                    None => (false, format!("ftp: {}", ftp_failure.message)),
                }
            }
        };

        if reachable {
            tracing::info!(detail = %detail, "Connectivity check passed");
        } else {
            tracing::warn!(detail = %detail, "No remote source reachable, continuing anyway");
        }
        self.log.record(
            LOG_LOCATION,
            &LogEvent::ConnectionCheck {
                reachable,
                detail: detail.clone(),
            },
        );
        reachable
    }

    fn mirror(&self) -> Option<Result<HttpMirrorSource>> {
        self.config
            .source
            .mirror_enabled
            .then(|| HttpMirrorSource::from_config(&self.config.source))
    }

    /// Assemble the production worker from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror client cannot be built.
    pub fn build_worker(&self) -> Result<IngestionWorker> {
        let source = &self.config.source;
        let primary: Arc<dyn RemoteSource> = Arc::new(FtpSource::from_config(source));
        let secondary = match self.mirror() {
            Some(mirror) => Some(Arc::new(mirror?) as Arc<dyn RemoteSource>),
            None => None,
        };
        let acquisition = SourceAcquisition::new(
            primary,
            secondary,
            source.max_attempts,
            BackoffPolicy::new(source.backoff_cap()),
        );

        let fallback = self
            .config
            .fallback
            .enabled
            .then(|| FallbackSupervisor::from_config(&self.config.fallback));

        let pipeline = Pipeline::new(self.store.clone(), self.config.pipeline.chunk_size);
        Ok(IngestionWorker::new(
            acquisition,
            fallback,
            pipeline,
            self.log.clone(),
        ))
    }

    /// Process `targets` with the production worker
    pub async fn execute(&self, targets: &[Target]) -> Result<RunSummary> {
        if targets.is_empty() {
            return Ok(self.empty_run());
        }
        let worker = self.build_worker()?;
        Ok(self.execute_with(worker, targets).await)
    }

    /// Process `targets` with any processor
    ///
    /// Brackets the run with `RUN` events in the failure log.
    pub async fn execute_with<P: TargetProcessor>(
        &self,
        processor: P,
        targets: &[Target],
    ) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", run_id = %run_id);

        async {
            if targets.is_empty() {
                return self.empty_run();
            }

            self.log.record(
                LOG_LOCATION,
                &LogEvent::Run {
                    message: format!("starting {} targets (run {run_id})", targets.len()),
                },
            );

            let scheduler = Scheduler::new(
                processor,
                self.log.clone(),
                SchedulerSettings::from_config(&self.config.scheduler),
            );
            let summary = scheduler.run(targets).await;

            summary.log_summary();
            self.log.record(
                LOG_LOCATION,
                &LogEvent::Run {
                    message: summary.line(),
                },
            );
            summary
        }
        .instrument(span)
        .await
    }

    fn empty_run(&self) -> RunSummary {
        tracing::info!("Nothing to acquire");
        self.log.record(
            LOG_LOCATION,
            &LogEvent::Run {
                message: "no targets to process".to_string(),
            },
        );
        RunSummary::new(0)
    }

    /// Coverage of the grid as of `today`, with logged failures
    ///
    /// # Errors
    ///
    /// Returns an error if the failure log exists but cannot be read.
    pub fn coverage_status(&self, today: NaiveDate) -> Result<CoverageStatus> {
        let mut systems: Vec<SystemCoverage> = self
            .grid
            .systems
            .iter()
            .map(|system| SystemCoverage {
                system: *system,
                expected: 0,
                present: 0,
            })
            .collect();

        for target in self.grid.targets(today) {
            if let Some(entry) = systems.iter_mut().find(|s| s.system == target.system) {
                entry.expected += 1;
                if self.store.exists(&target) {
                    entry.present += 1;
                }
            }
        }

        let failing = self
            .log
            .failure_counts()?
            .into_iter()
            .filter(|(target, _)| !self.store.exists(target))
            .collect();

        Ok(CoverageStatus {
            systems,
            failing,
            skip_threshold: self.config.scheduler.skip_threshold,
        })
    }
}
