// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every flag here also exists as a key in the optional TOML config file; a
//! flag given on the command line wins over the file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::HumanDuration;

/// Command-line arguments for `watchrun`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "watchrun",
    version,
    about = "Rebuild and restart a command whenever files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `Watchrun.toml` is used when it exists in the current
    /// directory; otherwise only flags are used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to watch recursively.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Build command, run through the shell before every restart.
    #[arg(long, value_name = "CMD")]
    pub build: Option<String>,

    /// Long-running command, restarted after every successful build.
    #[arg(long, value_name = "CMD")]
    pub run: Option<String>,

    /// How long the tree must stay quiet before a cycle starts (e.g. 100ms).
    #[arg(long, value_name = "DURATION")]
    pub coalesce: Option<HumanDuration>,

    /// Ignore changed paths containing this substring (repeatable).
    #[arg(long, value_name = "SUBSTR")]
    pub exclude: Vec<String>,

    /// Also react to hidden (dot) files and directories.
    #[arg(long)]
    pub include_hidden: bool,

    /// External watcher command whose stdout lines are changed paths
    /// (e.g. `fswatch -r .`). Defaults to the built-in watcher.
    #[arg(long, value_name = "CMD")]
    pub watch_cmd: Option<String>,

    /// How many times to restart a failed watcher before giving up.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Initial delay between watcher restarts; doubles on each attempt.
    #[arg(long, value_name = "DURATION")]
    pub retry_delay: Option<HumanDuration>,

    /// Do not build/run at startup; wait for the first change.
    #[arg(long)]
    pub no_initial: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the settings, but don't watch or execute anything.
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
