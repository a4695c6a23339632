//! # tether
//!
//! Relay server binary: loads configuration, wires a [`Hub`] and serves it
//! over WebSocket until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tether_core::{EndpointId, Hub, ReceiverRegistry};
use tether_server::config::TetherConfig;
use tether_server::server::TetherServer;
use tether_server::{logging, metrics, shutdown};

/// Protocol whose messages are sent straight back to the sender.
const ECHO_PROTOCOL: &str = "echo";

/// Tether relay server.
#[derive(Parser, Debug)]
#[command(name = "tether", about = "WebSocket relay with store-and-forward delivery")]
struct Cli {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Default log filter when `RUST_LOG` is unset (overrides config).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<TetherConfig> {
        let mut config =
            TetherConfig::load(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
        Ok(config)
    }
}

/// Build the hub and register the built-in receivers.
fn build_hub() -> Hub {
    let receivers = Arc::new(ReceiverRegistry::new());
    let hub = Hub::new(receivers.clone());

    // Weak: the transmitter reaches the registry through its validator
    let transmitter = Arc::downgrade(&hub.transmissions);
    receivers.register(ECHO_PROTOCOL, move |message: &str, endpoint: &EndpointId| {
        let Some(transmitter) = transmitter.upgrade() else {
            return;
        };
        if let Err(error) = transmitter.transmit(ECHO_PROTOCOL, message, endpoint) {
            tracing::warn!(%endpoint, %error, "echo reply rejected");
        }
    });

    hub
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    if cli.json_logs {
        logging::init_json_subscriber(&config.log_level);
    } else {
        logging::init_subscriber(&config.log_level);
    }

    let mut server = TetherServer::new(config, build_hub());
    match metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(error) => tracing::warn!(%error, "metrics disabled"),
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        "tether listening on ws://{addr}/ws/{{endpoint_id}} (protocols: {:?})",
        server.hub().receivers.protocols()
    );

    shutdown::wait_for_signal().await;

    tracing::info!("Shutting down...");
    if !server.shutdown().graceful_shutdown(vec![handle], None).await {
        tracing::warn!("exiting with sockets still open");
    }
    Ok(())
}
