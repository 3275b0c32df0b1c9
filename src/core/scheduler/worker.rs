//! Per-target processing: acquire, fall back, convert, verify

use super::{Processed, TargetProcessor};
use crate::core::acquisition::SourceAcquisition;
use crate::core::failure_log::{FailureLog, LogEvent};
use crate::core::fallback::FallbackSupervisor;
use crate::core::pipeline::{remove_quietly, Pipeline, PipelineReport, RawSource};
use crate::domain::{Failure, FailureKind, Target};
use async_trait::async_trait;
use std::path::PathBuf;

const LOG_LOCATION: &str = "worker";

/// Production [`TargetProcessor`]
///
/// Downloads the raw extract into a scratch directory and runs the
/// pipeline on it. When the network sources report the extract as absent
/// and a helper is configured, the helper's cache is processed instead.
pub struct IngestionWorker {
    acquisition: SourceAcquisition,
    fallback: Option<FallbackSupervisor>,
    pipeline: Pipeline,
    log: FailureLog,
    scratch_dir: Option<PathBuf>,
}

impl IngestionWorker {
    pub fn new(
        acquisition: SourceAcquisition,
        fallback: Option<FallbackSupervisor>,
        pipeline: Pipeline,
        log: FailureLog,
    ) -> Self {
        Self {
            acquisition,
            fallback,
            pipeline,
            log,
            scratch_dir: None,
        }
    }

    /// Parent directory for per-target scratch directories (system temp by default)
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    fn scratch(&self) -> Result<tempfile::TempDir, Failure> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("datasus-");
        let dir = match &self.scratch_dir {
            Some(parent) => std::fs::create_dir_all(parent).and_then(|_| builder.tempdir_in(parent)),
            None => builder.tempdir(),
        };
        dir.map_err(|e| {
            Failure::download(
                crate::domain::classify_io_error(&e),
                format!("failed to create scratch directory: {e}"),
            )
        })
    }

    fn verify(&self, target: &Target, report: &PipelineReport) -> Result<(), Failure> {
        if self.pipeline.store().exists(target) {
            Ok(())
        } else {
            Err(Failure::processing(
                FailureKind::Other,
                format!("artifact not written: {}", report.artifact.display()),
            ))
        }
    }

    async fn via_fallback(
        &self,
        supervisor: &FallbackSupervisor,
        target: &Target,
        reason: &Failure,
    ) -> Result<Processed, Failure> {
        self.log.record(
            LOG_LOCATION,
            &LogEvent::Fallback {
                target: target.clone(),
                reason: reason.message.clone(),
            },
        );
        tracing::info!(target_label = %target, "Network sources report not found, invoking helper");

        let cache = self.pipeline.store().cache_path(target);
        // A cache left by an interrupted run is never trusted
        remove_quietly(&cache);

        if let Err(failure) = supervisor.acquire(target, &cache).await {
            remove_quietly(&cache);
            return Err(failure);
        }

        let report = self
            .pipeline
            .process(RawSource::Cache(cache), target)
            .await?;
        self.verify(target, &report)?;
        Ok(Processed {
            rows_written: report.rows_written,
            sha256: None,
            via_fallback: true,
        })
    }
}

#[async_trait]
impl TargetProcessor for IngestionWorker {
    async fn process(&self, target: &Target) -> Result<Processed, Failure> {
        let scratch = self.scratch()?;
        let dest = scratch.path().join(target.remote_file_name());

        match self.acquisition.fetch(target, &dest).await {
            Ok(acquired) => {
                tracing::info!(
                    target_label = %target,
                    endpoint = %acquired.endpoint,
                    bytes = acquired.bytes,
                    "Raw extract downloaded"
                );
                let report = self.pipeline.process(RawSource::Dbc(dest), target).await?;
                self.verify(target, &report)?;
                Ok(Processed {
                    rows_written: report.rows_written,
                    sha256: acquired.sha256,
                    via_fallback: false,
                })
            }
            Err(failure) if failure.kind.triggers_fallback() => match &self.fallback {
                Some(supervisor) => self.via_fallback(supervisor, target, &failure).await,
                None => Err(failure),
            },
            Err(failure) => Err(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::remote::RemoteSource;
    use crate::core::acquisition::BackoffPolicy;
    use crate::core::fallback::SupervisorSettings;
    use crate::core::targets::DestinationStore;
    use std::path::Path;
    use std::str::FromStr;
    use std::sync::Arc;
    use std::time::Duration;

    struct Absent;

    #[async_trait]
    impl RemoteSource for Absent {
        fn name(&self) -> &str {
            "absent"
        }

        async fn download(&self, _target: &Target, _dest: &Path) -> Result<u64, Failure> {
            Err(Failure::download(FailureKind::NotFound, "550 No such file"))
        }

        async fn probe(&self) -> Result<String, Failure> {
            Ok("ok".to_string())
        }
    }

    fn worker(root: &Path, fallback: Option<FallbackSupervisor>) -> IngestionWorker {
        let acquisition = SourceAcquisition::new(
            Arc::new(Absent),
            Some(Arc::new(Absent)),
            3,
            BackoffPolicy::default(),
        );
        let pipeline = Pipeline::new(DestinationStore::new(root.join("raw")), 1_000);
        IngestionWorker::new(
            acquisition,
            fallback,
            pipeline,
            FailureLog::new(root.join("failures.log")),
        )
        .with_scratch_dir(root.join("scratch"))
    }

    #[tokio::test]
    async fn test_not_found_without_helper() {
        let dir = tempfile::tempdir().unwrap();
        let target = Target::from_str("SIH-RD AC 2021 1").unwrap();

        let failure = worker(dir.path(), None).process(&target).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_not_found_falls_back_to_helper() {
        let dir = tempfile::tempdir().unwrap();
        let target = Target::from_str("SIH-RD AC 2021 1").unwrap();

        // The helper copies a prepared Parquet file into the cache location
        let prepared = dir.path().join("prepared.parquet");
        crate::core::pipeline::test_support::write_cache(
            &prepared,
            &["DIAG_PRINC", "PROC_REA"],
            &[
                vec![Some("E110"), Some("0303010010")],
                vec![Some("J189"), Some("0303010010")],
            ],
        );
        let script = format!("cp '{}' \"$DATASUS_CACHE_PATH\"", prepared.display());
        let supervisor = FallbackSupervisor::new(
            "sh",
            vec!["-c".to_string(), script],
            None,
            SupervisorSettings {
                no_progress_timeout: Duration::from_secs(10),
                hard_timeout: Duration::from_secs(30),
                poll_interval: Duration::from_millis(50),
            },
        );

        let worker = worker(dir.path(), Some(supervisor));
        let processed = worker.process(&target).await.unwrap();

        assert!(processed.via_fallback);
        assert_eq!(processed.rows_written, 1);
        assert!(worker.pipeline.store().exists(&target));
        assert!(!worker.pipeline.store().cache_path(&target).exists());

        let log = std::fs::read_to_string(dir.path().join("failures.log")).unwrap();
        assert!(log.contains("FALLBACK: SIH-RD AC 2021 01"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let target = Target::from_str("SIA-PA AC 2021 1").unwrap();
        let supervisor = FallbackSupervisor::new(
            "sh",
            vec!["-c".to_string(), "echo 'Error: not available' >&2; exit 1".to_string()],
            None,
            SupervisorSettings {
                no_progress_timeout: Duration::from_secs(10),
                hard_timeout: Duration::from_secs(30),
                poll_interval: Duration::from_millis(50),
            },
        );

        let worker = worker(dir.path(), Some(supervisor));
        // Left over from an interrupted run
        let cache = worker.pipeline.store().cache_path(&target);
        std::fs::create_dir_all(cache.parent().unwrap()).unwrap();
        std::fs::write(&cache, b"stale").unwrap();

        let failure = worker.process(&target).await.unwrap_err();
        assert_eq!(failure.stage, crate::domain::Stage::Fallback);
        assert!(failure.message.contains("Error: not available"));
        assert!(!cache.exists());
    }
}
