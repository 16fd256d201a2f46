//! relayd - Chat relay server
//!
//! Accepts TCP connections and forwards every line a client sends to all
//! other connected clients, prefixed with the sender's address.
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:5000
//! relayd
//!
//! # Listen on a custom port
//! relayd 6000
//! RELAY_PORT=6000 relayd
//!
//! # Disconnect peers that cannot keep up instead of dropping their frames
//! relayd --disconnect-slow-peers
//!
//! # Enable debug logging
//! RUST_LOG=relayd=debug relayd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown (all peers are disconnected)

use std::env;
use std::net::IpAddr;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relay_protocol::DEFAULT_SERVER_PORT;
use relayd::server::DEFAULT_OUTBOX_CAPACITY;
use relayd::{spawn_shutdown_listener, RelayServer, ServerConfig, SlowPeerPolicy};

/// Environment variable overriding the default listen port.
const PORT_ENV: &str = "RELAY_PORT";

/// relayd - newline-delimited TCP chat relay
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// Port to listen on [default: $RELAY_PORT or 5000]
    port: Option<u16>,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Maximum bytes read from a client as one chunk
    #[arg(long, default_value_t = relay_protocol::DEFAULT_MAX_LINE_BYTES)]
    max_line_bytes: usize,

    /// Frames queued per client before it counts as slow
    #[arg(long, default_value_t = DEFAULT_OUTBOX_CAPACITY)]
    outbox_capacity: usize,

    /// Disconnect slow clients instead of dropping frames for them
    #[arg(long)]
    disconnect_slow_peers: bool,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let port = match self.port {
            Some(port) => port,
            None => port_from_env()?,
        };

        let policy = if self.disconnect_slow_peers {
            SlowPeerPolicy::Disconnect
        } else {
            SlowPeerPolicy::Drop
        };

        Ok(ServerConfig::with_addr((self.host, port).into())
            .max_line_bytes(self.max_line_bytes)
            .outbox_capacity(self.outbox_capacity)
            .slow_peer_policy(policy))
    }
}

/// Reads the listen port from `RELAY_PORT`, falling back to the default.
fn port_from_env() -> Result<u16> {
    match env::var(PORT_ENV) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {PORT_ENV} value '{value}'")),
        Err(_) => Ok(DEFAULT_SERVER_PORT),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.into_config()?;
    run_server(config)
}

/// Runs the server (async entry point).
#[tokio::main]
async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relayd=info".parse()?)
                .add_directive("relay_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Relay server starting"
    );

    let cancel_token = CancellationToken::new();

    spawn_shutdown_listener(wait_for_shutdown_signal(), cancel_token.clone());

    let server = match RelayServer::bind(config, cancel_token).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Relay server stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
