// DataSUS Ingest - DATASUS extract acquisition and processing orchestrator
// Copyright (c) 2025 DataSUS Ingest Contributors
// Licensed under the MIT License

//! # DataSUS Ingest
//!
//! DataSUS Ingest acquires monthly SIH-RD and SIA-PA extracts from the
//! DATASUS FTP server, filters and enriches them, and writes one Parquet
//! file per extract into a partitioned local store.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Resolving** the work list from the coverage grid, the destination
//!   store and the failure log
//! - **Acquiring** raw `.dbc` extracts from the FTP server with retries,
//!   then from an HTTP mirror
//! - **Falling back** to an external helper process, supervised with a
//!   no-progress timeout and a hard time limit
//! - **Processing** raw extracts in bounded batches into Parquet artifacts
//! - **Scheduling** targets sequentially behind a skip rule and a
//!   consecutive-timeout circuit breaker
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Resolution, acquisition, fallback, pipeline and scheduling
//! - [`adapters`] - Remote sources (FTP, HTTP mirror)
//! - [`domain`] - Targets, failure classification and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datasus_ingest::config::load_config;
//! use datasus_ingest::core::coordinator::IngestCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("datasus.toml")?;
//!     let coordinator = IngestCoordinator::new(config);
//!
//!     let today = chrono::Local::now().date_naive();
//!     let targets = coordinator.resolve(true, false, today)?;
//!     let summary = coordinator.execute(&targets).await?;
//!
//!     println!("{}", summary.line());
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Log
//!
//! Every outcome is appended to a plain-text log, one event per line:
//!
//! ```text
//! 2024-03-01T10:00:00Z | datasus-ingest | scheduler | DEFINITIVE DOWNLOAD FAILURE: SIH-RD SP 2024 02: timeout: ftp: timed out; mirror: not-found: 404
//! ```
//!
//! The log doubles as the source of retry candidates (`run --from-log`) and
//! of the skip rule, so failures survive across runs without a database.
//!
//! ## Error Handling
//!
//! Operations that can abort return [`domain::IngestError`]. Per-target
//! failures are [`domain::Failure`] values carrying a [`domain::FailureKind`]
//! that drives retries, the circuit breaker and the helper fallback.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
