//! Clap derive structures for the `tagbridge` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tagbridge -- forward PLC tag values to a row store
#[derive(Debug, Parser)]
#[command(
    name = "tagbridge",
    version,
    about = "Forward PLC tag values to a REST row store",
    long_about = "Connects to one controller, watches a fixed tag catalog, and records\n\
        every value change plus a periodic full sweep. Reconnects on its own\n\
        after controller or network outages; exits only when the retry budget\n\
        is spent."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    /// Defaults to running the bridge
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the configuration file
    #[arg(long, short = 'c', env = "TAGBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log readings instead of writing them to the store
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Use synthetic tag values instead of a controller
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, default_value = "text", env = "TAGBRIDGE_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and forward readings until interrupted (default)
    Run,

    /// Load and validate configuration, then exit
    CheckConfig(CheckConfigArgs),
}

#[derive(Debug, Args)]
pub struct CheckConfigArgs {
    /// Print the effective configuration as TOML (API key masked)
    #[arg(long)]
    pub print: bool,
}
