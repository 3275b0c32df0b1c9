//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for DataSUS Ingest using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// DataSUS Ingest - DATASUS extract acquisition and processing orchestrator
#[derive(Parser, Debug)]
#[command(name = "datasus-ingest")]
#[command(version, about, long_about = None)]
#[command(author = "DataSUS Ingest Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "datasus.toml", env = "DATASUS_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "DATASUS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire and process every missing target
    Run(commands::run::RunArgs),

    /// Print the resolved work list without acquiring anything
    Targets(commands::targets::TargetsArgs),

    /// Show coverage of the destination store and logged failures
    Status(commands::status::StatusArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
