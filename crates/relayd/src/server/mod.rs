//! TCP server for the chat relay.
//!
//! The server:
//! - Binds a TCP listener (bind failure is fatal and never retried)
//! - Spawns a ConnectionHandler for each accepted connection
//! - Shares one Registry and Broadcaster across all handlers
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│    Registry     │
//! │   (per peer)    │     │                 │
//! └───────┬─────────┘     └────────┬────────┘
//!         │ chunk                  │ for_each_except
//!         ▼                        ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │   Broadcaster   │────▶│  peer outboxes  │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and allow continued operation

mod config;
mod connection;

pub use config::{ServerConfig, DEFAULT_OUTBOX_CAPACITY};
pub use connection::{ConnectionError, ConnectionHandler, Disconnect};

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::registry::Registry;

/// TCP server for the chat relay.
///
/// Accepts connections and hands each one to its own handler task.
pub struct RelayServer {
    /// Bound listener
    listener: TcpListener,

    /// Server configuration
    config: ServerConfig,

    /// Shared peer registry
    registry: Arc<Registry>,

    /// Fan-out shared by all handlers
    broadcaster: Broadcaster,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Number of connections accepted so far
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Binds the listener described by `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Bind address and per-peer limits
    /// * `cancel_token` - Token for graceful shutdown
    ///
    /// # Errors
    ///
    /// `ServerError::Bind` if the address is in use, not permitted, or invalid.
    pub async fn bind(
        config: ServerConfig,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), config.slow_peer_policy);

        Ok(Self {
            listener,
            config,
            registry,
            broadcaster,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Accept)
    }

    /// Returns the shared peer registry.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Runs the accept loop.
    ///
    /// Accepts connections until the cancellation token is triggered. Handler
    /// tokens are children of the server token, so cancelling the server
    /// also disconnects every peer.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr()?,
            policy = %self.broadcaster.policy(),
            "Relay server listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, addr, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!(
            accepted = self.connection_counter.load(Ordering::Relaxed),
            peers = self.registry.len(),
            "Relay server stopped"
        );
        Ok(())
    }

    /// Handles a new connection by spawning a handler task.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, connection_number: u64) {
        if self.config.tcp_nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!(peer = %addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let handler = ConnectionHandler::new(
            stream,
            addr,
            self.broadcaster.clone(),
            self.cancel_token.child_token(),
        )
        .max_line_bytes(self.config.max_line_bytes)
        .outbox_capacity(self.config.outbox_capacity);

        debug!(
            connection = connection_number,
            peer_id = %handler.peer_id(),
            peer = %addr,
            "Accepted connection"
        );

        tokio::spawn(handler.run());
    }
}

/// Cancels `cancel_token` once `signal` resolves successfully.
///
/// If waiting for the signal fails, the token is left alone and the server
/// keeps running.
pub fn spawn_shutdown_listener<F, E>(
    signal: F,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display,
{
    tokio::spawn(async move {
        if let Err(e) = signal.await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        cancel_token.cancel();
    })
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Listener error: {0}")]
    Accept(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:5000".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:5000"));
        assert!(err.to_string().contains("address in use"));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap());
        let server = RelayServer::bind(config, CancellationToken::new()).await.unwrap();

        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_bind_address_in_use_is_fatal() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let result = RelayServer::bind(ServerConfig::with_addr(addr), CancellationToken::new()).await;
        match result {
            Err(ServerError::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
            Err(other) => panic!("expected bind error, got {other}"),
            Ok(_) => panic!("bind on an in-use port should fail"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_listener_cancels_on_signal() {
        let token = CancellationToken::new();
        let handle = spawn_shutdown_listener(async { Ok::<(), io::Error>(()) }, token.clone());

        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_listener_failure_keeps_server_running() {
        let token = CancellationToken::new();
        let handle = spawn_shutdown_listener(
            async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no signal handler")) },
            token.clone(),
        );

        handle.await.unwrap();
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let token = CancellationToken::new();
        let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap());
        let server = RelayServer::bind(config, token.clone()).await.unwrap();

        let task = tokio::spawn(server.run());
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
