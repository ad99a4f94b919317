//! Poly-watch: streaming monitor for the Polymarket trading bots.
//!
//! Usage:
//!   poly-watch [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>     Config file path (default: config/watch.toml)
//!   --base-url <URL>        Engine base URL (overrides config)
//!   --log-level <LEVEL>     Logging level (overrides config)
//!
//! The session token is read from the POLY_WATCH_TOKEN environment
//! variable (a `.env` file is honored). Without a token the client
//! starts but does not connect.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use poly_watch::{MemoryCredentialStore, MonitorState, StreamClient, WatchConfig};

/// CLI arguments for poly-watch.
#[derive(Parser, Debug)]
#[command(name = "poly-watch")]
#[command(about = "Streaming monitor for the Polymarket trading bots")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/watch.toml")]
    config: PathBuf,

    /// Engine base URL (overrides config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Logging level (overrides config file)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    let mut config = if args.config.exists() {
        WatchConfig::from_file(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?
    } else {
        WatchConfig::default()
    };

    config.apply_env_overrides();
    config.apply_cli_overrides(args.base_url, args.log_level);

    let level = config.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    if !args.config.exists() {
        warn!("config file not found at {:?}, using defaults", args.config);
    }

    let credentials = Arc::new(MemoryCredentialStore::from_env("POLY_WATCH_TOKEN"));
    let store = Arc::new(MonitorState::new(config.scan_feed_bot));
    let status_interval = config.status_interval;

    info!("starting poly-watch against {}", config.redacted_stream_url());

    let (shutdown_tx, _) = broadcast::channel(16);
    let client = StreamClient::new(config, Arc::clone(&store), credentials);
    let client_shutdown = shutdown_tx.subscribe();
    let mut client_handle = tokio::spawn(async move { client.run(client_shutdown).await });

    let mut status_ticker = interval(status_interval);
    status_ticker.tick().await; // skip the immediate first tick

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                let _ = shutdown_tx.send(());
                break;
            }
            result = &mut client_handle => {
                // The client only ends on its own for auth rejection.
                result.context("stream client task panicked")??;
                return Ok(());
            }
            _ = status_ticker.tick() => {
                log_status(&store);
            }
        }
    }

    client_handle
        .await
        .context("stream client task panicked")??;
    Ok(())
}

/// Log a one-line status summary for operators.
fn log_status(store: &MonitorState) {
    let snapshot = store.snapshot();
    let bots: Vec<String> = snapshot
        .bots
        .iter()
        .map(|panel| format!("{}={}", panel.name, panel.state.status))
        .collect();

    info!(
        connected = snapshot.connected,
        trades = snapshot.trade_feed.len(),
        scans = snapshot.scan_history.len(),
        "status: {}",
        bots.join(" ")
    );
}
