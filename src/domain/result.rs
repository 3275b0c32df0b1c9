//! Result type alias
//!
//! Convenience alias that uses [`IngestError`] as the error type.

use super::errors::IngestError;

/// Result type alias for orchestrator operations
///
/// # Examples
///
/// ```
/// use datasus_ingest::domain::result::Result;
/// use datasus_ingest::domain::errors::IngestError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(IngestError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
