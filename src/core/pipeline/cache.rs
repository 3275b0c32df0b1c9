//! Reader for the helper's Parquet cache
//!
//! Every column is cast to text so cached extracts go through the same
//! normalization, filter and enrichment as decoded DBF records.

use super::batch::RawBatch;
use super::BatchSource;
use crate::domain::{IngestError, Result};
use arrow::array::{Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::fs::File;
use std::path::Path;

pub struct CacheReader {
    reader: ParquetRecordBatchReader,
}

impl CacheReader {
    /// Opens a cache file, yielding batches of at most `batch_size` rows
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            IngestError::Decode(format!("Failed to open cache {}: {}", path.display(), e))
        })?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(batch_size)
            .build()?;
        Ok(Self { reader })
    }
}

fn to_raw(batch: &RecordBatch) -> Result<RawBatch> {
    let schema = batch.schema();
    let mut names = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let text = cast(array, &DataType::Utf8).map_err(|e| {
            IngestError::Decode(format!(
                "cache column {} ({}) is not convertible to text: {}",
                field.name(),
                field.data_type(),
                e
            ))
        })?;
        let text = text
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| IngestError::Decode(format!("cache column {} cast failed", field.name())))?;

        let values = (0..text.len())
            .map(|i| {
                if text.is_null(i) {
                    return None;
                }
                let value = text.value(i).trim();
                (!value.is_empty()).then(|| value.to_string())
            })
            .collect();
        names.push(field.name().clone());
        columns.push(values);
    }

    Ok(RawBatch::new(names, columns))
}

impl BatchSource for CacheReader {
    /// Batch size is fixed when the reader is opened
    fn next_batch(&mut self, _max_rows: usize) -> Result<Option<RawBatch>> {
        match self.reader.next() {
            Some(batch) => Ok(Some(to_raw(&batch?)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::test_support::write_cache;

    #[test]
    fn test_reads_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".download_sih_SP_2024_03.parquet");
        let rows: Vec<Vec<Option<&str>>> = (0..5).map(|_| vec![Some("E110"), Some(" ")]).collect();
        write_cache(&path, &["DIAG_PRINC", "PROC_REA"], &rows);

        let mut reader = CacheReader::open(&path, 2).unwrap();
        let mut sizes = Vec::new();
        while let Some(batch) = reader.next_batch(2).unwrap() {
            assert_eq!(batch.names(), &["DIAG_PRINC", "PROC_REA"]);
            assert_eq!(batch.column("PROC_REA").unwrap()[0], None);
            sizes.push(batch.num_rows());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_missing_cache() {
        let dir = tempfile::tempdir().unwrap();
        let err = CacheReader::open(&dir.path().join("absent.parquet"), 10)
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::Decode(_)));
    }
}
