#![forbid(unsafe_code)]

//! `cmd-broker` — local command broker binary.
//!
//! Loads configuration, creates the request and events channels, and serves
//! until interrupted. Failing to create a channel is fatal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use cmd_broker::broker::Broker;
use cmd_broker::config::BrokerConfig;
use cmd_broker::exec::ShellExecutor;
use cmd_broker::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "cmd-broker", about = "Local command broker", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the channel name prefix from the configuration.
    #[arg(long)]
    name: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting cmd-broker");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("cannot start async runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => BrokerConfig::load_from_path(path)?,
        None => BrokerConfig::default(),
    };
    if let Some(name) = args.name {
        config.name = name;
        config.validate()?;
    }
    let config = Arc::new(config);
    info!(name = %config.name, "configuration loaded");

    // ── Create channels ─────────────────────────────────
    let executor = Arc::new(ShellExecutor::from_config(&config));
    let broker = Broker::start(Arc::clone(&config), executor)?;

    // ── Wait for shutdown signal ────────────────────────
    let handle = broker.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("stop requested; notifying clients");
        handle.shutdown();
    });

    broker.serve().await?;
    info!("cmd-broker exited cleanly");

    Ok(())
}

/// Resolve on ctrl-c, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(err) = result {
                            warn!(%err, "interrupt handler failed; stopping broker");
                        }
                    }
                    _ = terminate.recv() => info!("terminate signal received"),
                }
                return;
            }
            Err(err) => warn!(%err, "terminate signal unavailable; broker stops on interrupt only"),
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "interrupt handler failed; stopping broker");
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter);

    let installed = match log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| AppError::Config(format!("cannot install log subscriber: {err}")))
}
