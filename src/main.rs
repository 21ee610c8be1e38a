//! http-tap
//!
//! Serves a small application with every transaction captured and published.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                   HTTP TAP                   │
//!                       │                                              │
//!     Client Request    │  ┌─────────┐   ┌──────────┐   ┌──────────┐   │
//!     ──────────────────┼─▶│  http   │──▶│   tap    │──▶│ handlers │   │
//!                       │  │ server  │   │middleware│   │          │   │
//!     Client Response   │  │         │◀──│          │◀──│          │   │
//!     ◀─────────────────┼──│         │   └────┬─────┘   └──────────┘   │
//!                       │  └─────────┘        │ TransactionRecord      │
//!                       │                     ▼                        │
//!                       │               ┌───────────┐                  │
//!                       │               │ publisher │──── UDP ─────────┼──▶ agent
//!                       │               │           │──── file ────────┼──▶ *.json
//!                       │               └───────────┘                  │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use http_tap::config::{load_config, validate_config, ConfigError, TapConfig};
use http_tap::lifecycle::{self, signals, Shutdown};
use http_tap::observability::logging::init_tracing;

#[derive(Parser)]
#[command(name = "http-tap")]
#[command(about = "Capture HTTP transactions and publish them as JSON", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listener bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Host of the datagram listener.
    #[arg(long, conflicts_with = "no_udp")]
    udpjson_host: Option<String>,

    /// Port of the datagram listener.
    #[arg(long)]
    udpjson_port: Option<u16>,

    /// Append records to this file, one JSON object per line.
    #[arg(long)]
    store_in_file: Option<PathBuf>,

    /// Disable the datagram sink.
    #[arg(long)]
    no_udp: bool,
}

impl Cli {
    fn apply(&self, config: &mut TapConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(host) = &self.udpjson_host {
            config.output.udpjson_host = Some(host.clone());
        }
        if let Some(port) = self.udpjson_port {
            config.output.udpjson_port = port;
        }
        if let Some(path) = &self.store_in_file {
            config.output.store_in_file = Some(path.clone());
        }
        if self.no_udp {
            config.output.udpjson_host = None;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TapConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_tracing(&config.observability)?;

    tracing::info!("http-tap v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        udpjson_host = ?config.output.udpjson_host,
        udpjson_port = config.output.udpjson_port,
        store_in_file = ?config.output.store_in_file,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_shutdown_signal().await;
        shutdown.trigger();
    });

    lifecycle::run(config, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
