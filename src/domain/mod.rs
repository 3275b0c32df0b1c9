//! Domain models and types.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Targets** ([`Target`], [`System`], [`Region`]) identifying one extract
//! - **Outcome classification** ([`Failure`], [`FailureKind`], [`Stage`])
//! - **Error types** ([`IngestError`])
//! - **Result type alias** ([`Result`])
//!
//! # Example
//!
//! ```rust
//! use datasus_ingest::domain::Target;
//! use std::str::FromStr;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let target = Target::from_str("SIH-RD SP 2024 3")?;
//! assert_eq!(target.remote_file_name(), "RDSP2403.dbc");
//! assert_eq!(target.label(), "SIH-RD SP 2024 03");
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod outcome;
pub mod result;
pub mod target;

// Re-export commonly used types for convenience
pub use errors::IngestError;
pub use outcome::{classify_io_error, Failure, FailureKind, Stage};
pub use result::Result;
pub use target::{Region, System, Target, ALL_REGIONS};
