#![forbid(unsafe_code)]

//! `cmd-broker-client` — interactive client for `cmd-broker`.
//!
//! Reads commands from stdin, submits each to the broker, and prints the
//! reply. Exits on `exit`, end of input, or when the broker broadcasts
//! shutdown.

use std::io::Write;
use std::path::PathBuf;
use std::pin::pin;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use cmd_broker::client::{self, Client, ShutdownReason, EXIT_CMD};
use cmd_broker::config::BrokerConfig;
use cmd_broker::models::client::ClientId;
use cmd_broker::{AppError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "cmd-broker-client",
    about = "Interactive client for cmd-broker",
    version,
    long_about = None
)]
struct Cli {
    /// Path to an optional TOML configuration file shared with the broker.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Channel name prefix (must match the broker's `name`).
    #[arg(long)]
    name: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("cannot start async runtime: {err}")))?;
    let result = runtime.block_on(run(args));

    // stdin is read on a blocking thread that cannot be interrupted.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => BrokerConfig::load_from_path(path)?,
        None => BrokerConfig::default(),
    };
    if let Some(name) = args.name {
        config.name = name;
        config.validate()?;
    }

    let watch = client::subscribe_shutdown(&config).await.inspect_err(|_| {
        eprintln!("Is cmd-broker running with name '{}'?", config.name);
    })?;
    let mut client = Client::connect(&config, ClientId::current())?;
    let mut shutdown = pin!(watch.wait());

    println!("[Client] Connected. Enter shell commands or type 'LIST'.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Enter command: ");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            reason = &mut shutdown => {
                report_shutdown(reason);
                return Ok(());
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            println!();
            break;
        };
        let command = line.trim_end_matches(['\r', '\n']);

        if command == EXIT_CMD {
            println!("[Client] Exiting...");
            break;
        }
        if command.is_empty() {
            continue;
        }

        let reply = tokio::select! {
            reason = &mut shutdown => {
                report_shutdown(reason);
                return Ok(());
            }
            reply = client.submit(command) => reply,
        };

        match reply {
            Ok(body) => println!("[Client] Response:\n{body}"),
            Err(err) => eprintln!("[Client] Request failed: {err}"),
        }
    }

    Ok(())
}

fn report_shutdown(reason: ShutdownReason) {
    match reason {
        ShutdownReason::Sentinel => println!("\n[Client] Server is shutting down. Exiting..."),
        ShutdownReason::BrokerGone => println!("\n[Client] Lost connection to server. Exiting..."),
    }
}
