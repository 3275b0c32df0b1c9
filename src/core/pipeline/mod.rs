//! Decode, filter, enrich and write pipeline
//!
//! Converts one raw extract into its destination artifact in bounded-size
//! batches:
//!
//! 1. Read a batch from the raw source ([`dbf::DbfReader`] or [`cache::CacheReader`])
//! 2. Canonicalize column names and coalesce duplicates
//! 3. Drop rows failing the system's inclusion filter
//! 4. Append derived columns and convert to Arrow
//! 5. Append to the `.partial` Parquet file
//!
//! The artifact is published only when at least one row survived. A raw
//! cache is deleted after processing whatever the outcome.

pub mod batch;
pub mod cache;
pub mod dbc;
pub mod dbf;
pub mod enrich;
pub mod filter;
pub mod writer;

pub use batch::RawBatch;
pub use writer::ArtifactWriter;

use cache::CacheReader;
use crate::core::targets::DestinationStore;
use crate::domain::{Failure, FailureKind, IngestError, Result, Stage, Target};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Sequential source of raw batches
pub trait BatchSource {
    /// Next batch of at most `max_rows` rows, `None` when exhausted
    fn next_batch(&mut self, max_rows: usize) -> Result<Option<RawBatch>>;
}

/// Raw input handed to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSource {
    /// Compressed extract as downloaded from the network sources
    Dbc(PathBuf),
    /// Already decompressed extract
    Dbf(PathBuf),
    /// Parquet cache produced by the fallback helper; deleted after use
    Cache(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub artifact: PathBuf,
    pub rows_read: u64,
    pub rows_written: u64,
    pub batches: u64,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    store: DestinationStore,
    chunk_size: usize,
}

impl Pipeline {
    pub fn new(store: DestinationStore, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn store(&self) -> &DestinationStore {
        &self.store
    }

    /// Processes one raw source on the blocking thread pool
    pub async fn process(
        &self,
        source: RawSource,
        target: &Target,
    ) -> std::result::Result<PipelineReport, Failure> {
        let pipeline = self.clone();
        let target = target.clone();
        tokio::task::spawn_blocking(move || pipeline.process_blocking(&source, &target))
            .await
            .unwrap_or_else(|e| {
                Err(Failure::processing(
                    FailureKind::Other,
                    format!("processing task failed: {e}"),
                ))
            })
    }

    /// Synchronous variant of [`process`](Self::process)
    pub fn process_blocking(
        &self,
        source: &RawSource,
        target: &Target,
    ) -> std::result::Result<PipelineReport, Failure> {
        let started = Instant::now();
        let outcome = self.run(source, target);

        if let RawSource::Cache(path) = source {
            remove_quietly(path);
        }

        match &outcome {
            Ok(report) => tracing::info!(
                target_label = %target,
                rows_read = report.rows_read,
                rows_written = report.rows_written,
                batches = report.batches,
                duration_ms = started.elapsed().as_millis() as u64,
                "Artifact written"
            ),
            Err(failure) => tracing::warn!(
                target_label = %target,
                kind = %failure.kind,
                error = %failure.message,
                "Processing failed"
            ),
        }
        outcome
    }

    fn run(
        &self,
        source: &RawSource,
        target: &Target,
    ) -> std::result::Result<PipelineReport, Failure> {
        let as_failure = |e: IngestError| Failure::from_error(Stage::Processing, &e);

        let (rows_read, rows_written, batches) = match source {
            RawSource::Dbc(path) => {
                let dbf_path = path.with_extension("dbf");
                let converted = dbc::decompress_file(path, &dbf_path)
                    .and_then(|_| self.convert_dbf(&dbf_path, target));
                remove_quietly(&dbf_path);
                converted
            }
            RawSource::Dbf(path) => self.convert_dbf(path, target),
            RawSource::Cache(path) => CacheReader::open(path, self.chunk_size)
                .and_then(|reader| self.convert(reader, target)),
        }
        .map_err(as_failure)?;

        if rows_written == 0 {
            return Err(Failure::processing(
                FailureKind::NoMatch,
                format!("no record matched filter ({rows_read} rows read)"),
            ));
        }

        Ok(PipelineReport {
            artifact: self.store.artifact_path(target),
            rows_read,
            rows_written,
            batches,
        })
    }

    fn convert_dbf(&self, path: &Path, target: &Target) -> Result<(u64, u64, u64)> {
        let file = File::open(path)
            .map_err(|e| IngestError::Decode(format!("Failed to open {}: {}", path.display(), e)))?;
        let reader = dbf::DbfReader::new(BufReader::new(file))?;
        self.convert(reader, target)
    }

    fn convert<S: BatchSource>(&self, mut source: S, target: &Target) -> Result<(u64, u64, u64)> {
        self.store.ensure_partition(target)?;
        let mut writer = ArtifactWriter::new(
            self.store.partial_path(target),
            self.store.artifact_path(target),
        );
        let mut rows_read = 0u64;
        let mut batches = 0u64;

        while let Some(raw) = source.next_batch(self.chunk_size)? {
            batches += 1;
            rows_read += raw.num_rows() as u64;
            let kept = filter::apply(target.system, raw.normalize_columns());
            tracing::debug!(
                target_label = %target,
                batch = batches,
                kept = kept.num_rows(),
                "Batch filtered"
            );
            if kept.is_empty() {
                continue;
            }
            writer.write(&enrich::enrich(kept, target)?)?;
        }

        let rows_written = writer.finish()?;
        Ok((rows_read, rows_written, batches))
    }
}

/// Deletes a scratch file, logging instead of failing
///
/// Returns `false` when the file could not be removed.
pub(crate) fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
            false
        }
    }
}
