//! Incremental Parquet artifact writer
//!
//! Rows are appended to `{artifact}.partial`. The file is opened lazily with
//! the schema of the first non-empty batch; [`ArtifactWriter::finish`]
//! renames it onto the artifact path, and dropping an unfinished writer
//! removes the partial file.

use super::remove_quietly;
use crate::domain::{IngestError, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub struct ArtifactWriter {
    partial_path: PathBuf,
    artifact_path: PathBuf,
    writer: Option<ArrowWriter<File>>,
    schema: Option<SchemaRef>,
    rows: u64,
}

impl ArtifactWriter {
    pub fn new(partial_path: impl Into<PathBuf>, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            partial_path: partial_path.into(),
            artifact_path: artifact_path.into(),
            writer: None,
            schema: None,
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    fn open(&mut self, schema: SchemaRef) -> Result<()> {
        if let Some(parent) = self.partial_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                IngestError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let file = File::create(&self.partial_path).map_err(|e| {
            IngestError::Storage(format!(
                "Failed to create {}: {}",
                self.partial_path.display(),
                e
            ))
        })?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        self.schema = Some(schema);
        self.writer = Some(writer);
        Ok(())
    }

    /// Appends a batch; empty batches are ignored
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::SchemaMismatch`] if the batch schema differs
    /// from the schema of the first written batch.
    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        if batch.num_rows() == 0 {
            return Ok(());
        }

        if let Some(expected) = &self.schema {
            if expected.fields() != batch.schema().fields() {
                return Err(IngestError::SchemaMismatch(format!(
                    "batch columns [{}] differ from established columns [{}]",
                    column_list(&batch.schema()),
                    column_list(expected)
                )));
            }
        }

        if self.writer.is_none() {
            self.open(batch.schema())?;
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write(batch)?;
            self.rows += batch.num_rows() as u64;
        }
        Ok(())
    }

    /// Closes the file and publishes it under the artifact name
    ///
    /// Returns the number of rows written. Nothing is published when no row
    /// was written.
    pub fn finish(mut self) -> Result<u64> {
        let Some(writer) = self.writer.take() else {
            return Ok(0);
        };
        let published = writer
            .close()
            .map_err(IngestError::from)
            .and_then(|_| {
                fs::rename(&self.partial_path, &self.artifact_path).map_err(|e| {
                    IngestError::Storage(format!(
                        "Failed to publish {}: {}",
                        self.artifact_path.display(),
                        e
                    ))
                })
            });
        if published.is_err() {
            remove_quietly(&self.partial_path);
        }
        published.map(|_| self.rows)
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            remove_quietly(&self.partial_path);
        }
    }
}

fn column_list(schema: &SchemaRef) -> String {
    schema
        .fields()
        .iter()
        .map(|f| format!("{}:{}", f.name(), f.data_type()))
        .collect::<Vec<_>>()
        .join(", ")
}
