//! Cadence CLI entry point.
//!
//! Binary name: `cadence`
//!
//! Parses CLI arguments, loads and validates configuration, opens the
//! database, then dispatches to the command handler.

mod cli;
mod state;

use anyhow::Context;
use clap::Parser;

use cadence_infra::config::{default_config_path, load_config};
use cadence_observe::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        enable_otel: cli.otel,
        default_filter: cli.log_filter().to_string(),
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path)
        .await
        .with_context(|| format!("invalid configuration ({})", config_path.display()))?;

    let state = AppState::init(config).await?;

    let result = match cli.command {
        Commands::Run { interval } => cli::run::run(&state, interval, cli.json).await,
        Commands::Cycle => cli::run::cycle(&state, cli.json).await,
        Commands::Status => cli::status::status(&state, cli.json).await,
        Commands::Calls { limit } => cli::status::calls(&state, limit, cli.json).await,
        Commands::Config => cli::config::show_config(&state, cli.json),
    };

    shutdown_tracing();
    result
}

/// Wait for Ctrl+C or SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
