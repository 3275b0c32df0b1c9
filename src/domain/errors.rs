//! Domain error types
//!
//! Errors that abort an operation (bad configuration, unreadable files, broken
//! Parquet output). Per-target acquisition failures are not errors in this
//! sense; they are [`Failure`](super::outcome::Failure) values that the
//! scheduler records and moves past.

use thiserror::Error;

/// Main error type for the ingestion orchestrator
#[derive(Debug, Error)]
pub enum IngestError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors (bad target fields, malformed identifiers)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Raw extract could not be decoded (DBC/DBF/Parquet cache)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Columnar output errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Output schema of a later batch differs from the first written batch
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Failure log errors
    #[error("Failure log error: {0}")]
    FailureLog(String),

    /// External helper process errors
    #[error("Helper process error: {0}")]
    Helper(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Out of memory while decoding or converting a batch
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::OutOfMemory {
            return IngestError::ResourceExhausted(err.to_string());
        }
        IngestError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for IngestError {
    fn from(err: toml::de::Error) -> Self {
        IngestError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<parquet::errors::ParquetError> for IngestError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        IngestError::Storage(format!("Parquet: {err}"))
    }
}

impl From<arrow::error::ArrowError> for IngestError {
    fn from(err: arrow::error::ArrowError) -> Self {
        match err {
            arrow::error::ArrowError::MemoryError(msg) => IngestError::ResourceExhausted(msg),
            other => IngestError::Storage(format!("Arrow: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_display() {
        let err = IngestError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: IngestError = io_err.into();
        assert!(matches!(err, IngestError::Io(_)));
    }

    #[test]
    fn test_out_of_memory_io_error_is_resource_exhaustion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "alloc failed");
        let err: IngestError = io_err.into();
        assert!(matches!(err, IngestError::ResourceExhausted(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: IngestError = toml_err.into();
        assert!(matches!(err, IngestError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_arrow_memory_error_conversion() {
        let err: IngestError = arrow::error::ArrowError::MemoryError("oom".to_string()).into();
        assert!(matches!(err, IngestError::ResourceExhausted(_)));
    }

    #[test]
    fn test_ingest_error_implements_std_error() {
        let err = IngestError::Validation("Test error".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
