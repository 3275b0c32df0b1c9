//! Work-list resolution and destination store layout

pub mod resolver;
pub mod store;

pub use resolver::{CoverageGrid, TargetResolver};
pub use store::DestinationStore;
