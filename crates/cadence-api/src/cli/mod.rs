//! CLI command definitions for the `cadence` binary.

pub mod config;
pub mod run;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Quota-aware engagement agent for social platforms.
#[derive(Parser)]
#[command(name = "cadence", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to cadence.toml (defaults to $CADENCE_CONFIG or ~/.cadence/cadence.toml).
    #[arg(long, short, global = true, env = "CADENCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll for engagement until interrupted (Ctrl+C / SIGTERM).
    Run {
        /// Override the poll interval in seconds.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run a single engagement cycle and print its report.
    Cycle,

    /// Show quota usage and conversation counts.
    Status,

    /// List recent outbound API calls.
    Calls {
        /// Number of calls to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Validate configuration and print the effective settings.
    Config,
}

impl Cli {
    /// Log filter implied by the verbosity flags.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info,sqlx=warn",
            1 => "info,cadence_core=debug,cadence_infra=debug,cadence=debug",
            _ => "trace",
        }
    }
}
