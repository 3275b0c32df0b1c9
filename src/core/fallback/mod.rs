//! Last-resort acquisition through an external helper program
//!
//! Used when both network sources report that an extract does not exist.
//! The helper writes a columnar cache file that the pipeline then consumes.

pub mod stderr;
pub mod supervisor;

pub use supervisor::{FallbackSupervisor, SupervisorSettings, CACHE_PATH_ENV};
