//! Core business logic for DataSUS Ingest.
//!
//! # Modules
//!
//! - [`targets`] - Coverage grid, destination store and target resolution
//! - [`acquisition`] - Primary/secondary download with retries and backoff
//! - [`fallback`] - Supervision of the external helper process
//! - [`pipeline`] - Decode, filter, enrich and write Parquet artifacts
//! - [`scheduler`] - Sequential run loop with skip rule and circuit breaker
//! - [`failure_log`] - Append-only event log and its parser
//! - [`coordinator`] - Wiring of the above from configuration
//!
//! # Run Workflow
//!
//! 1. **Resolve**: coverage grid minus existing artifacts, plus failure-log hints
//! 2. **Check**: probe the FTP server, then the mirror
//! 3. **Schedule**: for each target, cool down if the breaker is tripped and
//!    skip it if it has failed too often
//! 4. **Acquire**: FTP with retries, then the mirror, then the helper on not-found
//! 5. **Process**: filter and enrich in batches, publish the artifact atomically
//! 6. **Report**: append every outcome and the run summary to the failure log
//!
//! # Example
//!
//! ```rust,no_run
//! use datasus_ingest::config::load_config;
//! use datasus_ingest::core::coordinator::IngestCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = IngestCoordinator::new(load_config("datasus.toml")?);
//! let today = chrono::Local::now().date_naive();
//!
//! let targets = coordinator.resolve(true, true, today)?;
//! coordinator.check_connectivity().await;
//! let summary = coordinator.execute(&targets).await?;
//!
//! println!("Succeeded: {}", summary.succeeded.len());
//! println!("Failed: {}", summary.failed.len());
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod coordinator;
pub mod failure_log;
pub mod fallback;
pub mod pipeline;
pub mod scheduler;
pub mod targets;
