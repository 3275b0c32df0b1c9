//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod init;
pub mod run;
pub mod status;
pub mod targets;
pub mod validate;

use crate::config::{load_config, IngestConfig};
use crate::core::coordinator::IngestCoordinator;
use clap::Args;

/// Which targets a command works on
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Add targets recovered from the failure log
    #[arg(long)]
    pub from_log: bool,

    /// Leave out targets missing from the destination store
    #[arg(long)]
    pub no_missing: bool,

    /// Override the coverage years (e.g. 2021-2023 or 2024)
    #[arg(long, value_parser = parse_year_range)]
    pub years: Option<(i32, i32)>,
}

impl SelectionArgs {
    pub fn include_missing(&self) -> bool {
        !self.no_missing
    }

    /// Apply the year override to a coordinator
    pub fn apply(&self, coordinator: IngestCoordinator) -> IngestCoordinator {
        match self.years {
            Some((start, end)) => coordinator.with_years(start, end),
            None => coordinator,
        }
    }
}

/// Parses `A-B` or a single year `A`
pub fn parse_year_range(value: &str) -> Result<(i32, i32), String> {
    let parse = |s: &str| -> Result<i32, String> {
        let s = s.trim();
        if s.len() != 4 {
            return Err(format!("expected a four-digit year, got '{s}'"));
        }
        s.parse::<i32>()
            .map_err(|_| format!("expected a four-digit year, got '{s}'"))
    };

    let (start, end) = match value.split_once('-') {
        Some((a, b)) => (parse(a)?, parse(b)?),
        None => {
            let year = parse(value)?;
            (year, year)
        }
    };
    if start > end {
        return Err(format!("year range {start}-{end} is reversed"));
    }
    Ok((start, end))
}

/// Load and validate configuration, printing the failure
///
/// Returns `None` after printing when the configuration is unusable.
pub(crate) fn load_or_report(config_path: &str) -> Option<IngestConfig> {
    match load_config(config_path) {
        Ok(config) => Some(config),
        Err(e) => {
            println!("❌ Failed to load configuration file");
            println!("   Error: {e}");
            None
        }
    }
}
