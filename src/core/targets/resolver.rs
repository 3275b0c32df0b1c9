//! Target resolution
//!
//! The work list is the coverage grid minus what the destination store
//! already holds, optionally unioned with the failure log's retry hints.
//! Completion is decided by the store alone; the log only adds candidates.

use super::store::DestinationStore;
use crate::config::CoverageConfig;
use crate::core::failure_log::FailureLog;
use crate::domain::{Region, Result, System, Target};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

/// Systems × regions × years × months
#[derive(Debug, Clone)]
pub struct CoverageGrid {
    pub systems: Vec<System>,
    pub regions: Vec<Region>,
    pub year_start: i32,
    pub year_end: i32,
    pub skip_future: bool,
}

impl CoverageGrid {
    pub fn from_config(config: &CoverageConfig) -> Self {
        Self {
            systems: config.systems.clone(),
            regions: config.regions.clone(),
            year_start: config.year_start,
            year_end: config.year_end,
            skip_future: config.skip_future,
        }
    }

    /// Replace the year range (`--years A-B`)
    pub fn with_years(mut self, year_start: i32, year_end: i32) -> Self {
        self.year_start = year_start;
        self.year_end = year_end;
        self
    }

    /// Lazily enumerates the grid as of `today`
    pub fn targets(&self, today: NaiveDate) -> impl Iterator<Item = Target> + '_ {
        let current = (today.year(), today.month());
        self.systems.iter().flat_map(move |system| {
            self.regions.iter().flat_map(move |region| {
                (self.year_start..=self.year_end).flat_map(move |year| {
                    (1..=12u32).filter_map(move |month| {
                        if self.skip_future && (year, month) > current {
                            return None;
                        }
                        Target::new(*system, region.clone(), year, month).ok()
                    })
                })
            })
        })
    }

    /// Grid size ignoring the future-month rule
    pub fn len(&self) -> usize {
        let years = (self.year_end - self.year_start + 1).max(0) as usize;
        self.systems.len() * self.regions.len() * years * 12
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Computes the ordered, de-duplicated work list
pub struct TargetResolver<'a> {
    grid: &'a CoverageGrid,
    store: &'a DestinationStore,
    log: &'a FailureLog,
}

impl<'a> TargetResolver<'a> {
    pub fn new(grid: &'a CoverageGrid, store: &'a DestinationStore, log: &'a FailureLog) -> Self {
        Self { grid, store, log }
    }

    /// Resolve the targets still to acquire
    ///
    /// Ordered by region, year, month, system. Read-only.
    pub fn resolve(
        &self,
        include_missing: bool,
        include_from_log: bool,
        today: NaiveDate,
    ) -> Result<Vec<Target>> {
        let mut candidates = BTreeSet::new();

        if include_missing {
            candidates.extend(self.grid.targets(today));
        }

        if include_from_log {
            let from_log = self.log.retry_targets()?;
            tracing::debug!(count = from_log.len(), "Retry targets recovered from failure log");
            candidates.extend(from_log);
        }

        let targets: Vec<Target> = candidates
            .into_iter()
            .filter(|target| !self.store.exists(target))
            .collect();

        tracing::info!(
            count = targets.len(),
            include_missing,
            include_from_log,
            "Targets resolved"
        );
        Ok(targets)
    }
}
