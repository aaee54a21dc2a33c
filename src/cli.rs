// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `taskgraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskgraph",
    version,
    about = "Run shell commands as a dependency graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the graph file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Task to run, together with everything it depends on. May be given
    /// more than once.
    ///
    /// Default: every task no other task depends on.
    #[arg(long = "target", value_name = "NAME")]
    pub targets: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Discover and print the graph, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
