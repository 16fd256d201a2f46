//! Connection handler for individual peer connections.
//!
//! Each accepted connection gets its own `ConnectionHandler` that:
//! - Registers the peer in the shared registry
//! - Spawns a writer task draining the peer's outbox to the socket
//! - Reads bounded line chunks and broadcasts them as tagged frames
//! - Removes the peer and closes the connection on every exit path
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors end this handler only; they never reach other peers

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_protocol::{broadcast_frame, LineChunkCodec};

use crate::broadcast::Broadcaster;
use crate::registry::{Outbox, Peer, PeerId, Registry};

/// Connection handler for a single peer.
///
/// Owns the connection for its whole lifetime. Nothing else touches the
/// socket; other handlers reach this peer only through its outbox.
pub struct ConnectionHandler<S> {
    /// The accepted connection
    stream: S,

    /// Remote address, used as the frame label
    addr: SocketAddr,

    /// Identity allocated by the registry
    peer_id: PeerId,

    /// Shared peer registry
    registry: Arc<Registry>,

    /// Fan-out for frames read from this peer
    broadcaster: Broadcaster,

    /// Cancelled on server shutdown or by the slow-peer policy
    cancel_token: CancellationToken,

    /// Chunk bound for reads
    max_line_bytes: usize,

    /// Outbox capacity for this peer
    outbox_capacity: usize,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted connection
    /// * `addr` - Remote address of the peer
    /// * `broadcaster` - Broadcaster sharing the server's registry
    /// * `cancel_token` - Per-peer token (a child of the server token)
    pub fn new(
        stream: S,
        addr: SocketAddr,
        broadcaster: Broadcaster,
        cancel_token: CancellationToken,
    ) -> Self {
        let registry = Arc::clone(broadcaster.registry());
        let peer_id = registry.next_peer_id();
        Self {
            stream,
            addr,
            peer_id,
            registry,
            broadcaster,
            cancel_token,
            max_line_bytes: relay_protocol::DEFAULT_MAX_LINE_BYTES,
            outbox_capacity: crate::server::DEFAULT_OUTBOX_CAPACITY,
        }
    }

    /// Sets the chunk bound for reads.
    pub fn max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    /// Sets the outbox capacity.
    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    /// Returns the id this peer is registered under.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Runs the connection handler.
    ///
    /// Returns when the peer closes its side, a read fails, or the handler
    /// is cancelled. By then the peer is out of the registry and its
    /// connection is closed.
    pub async fn run(self) -> Disconnect {
        let ConnectionHandler {
            stream,
            addr,
            peer_id,
            registry,
            broadcaster,
            cancel_token,
            max_line_bytes,
            outbox_capacity,
        } = self;

        let (reader, writer) = tokio::io::split(stream);
        let (peer, outbox) = Peer::channel(peer_id, addr, outbox_capacity, cancel_token.clone());
        let label = peer.label().to_string();

        // The writer exists before the peer becomes visible to broadcasts.
        let writer_task = tokio::spawn(write_frames(writer, outbox, cancel_token.clone(), peer_id));
        let registration = registry.register(peer);

        info!(
            peer_id = %peer_id,
            peer = %label,
            peers = registry.len(),
            "Peer connected"
        );
        debug!(peers = ?registry.labels(), "Registry membership");

        let mut chunks = FramedRead::new(reader, LineChunkCodec::with_max_len(max_line_bytes));

        let reason = loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    break Disconnect::Cancelled;
                }

                next = chunks.next() => match next {
                    Some(Ok(chunk)) => {
                        let frame = broadcast_frame(&label, &chunk);
                        let report = broadcaster.broadcast(peer_id, &frame);
                        debug!(
                            peer_id = %peer_id,
                            bytes = chunk.len(),
                            recipients = report.recipients(),
                            delivered = report.delivered,
                            dropped = report.dropped,
                            closed = report.closed,
                            "Broadcast frame"
                        );
                    }
                    Some(Err(e)) => break Disconnect::ReadError(ConnectionError::Io(e)),
                    None => break Disconnect::Eof,
                },
            }
        };

        // Leave the registry first, then stop the writer and close the socket.
        drop(registration);
        cancel_token.cancel();
        if let Err(e) = writer_task.await {
            warn!(peer_id = %peer_id, error = %e, "Writer task failed");
        }
        drop(chunks);

        match &reason {
            Disconnect::ReadError(e) => {
                info!(peer_id = %peer_id, peer = %label, error = %e, "Peer disconnected with error");
            }
            _ => {
                info!(peer_id = %peer_id, peer = %label, reason = ?reason, "Peer disconnected");
            }
        }

        reason
    }
}

/// Drains a peer's outbox to its socket.
///
/// Stops when the handler cancels, the registry drops the peer's sender, or
/// a write fails. Later deliveries to this peer then report `Closed`.
async fn write_frames<W>(
    mut writer: W,
    mut outbox: Outbox,
    cancel_token: CancellationToken,
    peer_id: PeerId,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;

            _ = cancel_token.cancelled() => break,

            frame = outbox.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        tokio::select! {
            _ = cancel_token.cancelled() => break,

            result = write_frame(&mut writer, &frame) => {
                if let Err(e) = result {
                    debug!(peer_id = %peer_id, error = %e, "Failed to write frame to peer");
                    break;
                }
            }
        }
    }
}

async fn write_frame<W>(writer: &mut W, frame: &Bytes) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Why a connection handler finished.
#[derive(Debug)]
pub enum Disconnect {
    /// The peer closed its send side.
    Eof,

    /// Reading from the peer failed.
    ReadError(ConnectionError),

    /// The server shut down or the slow-peer policy closed the peer.
    Cancelled,
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
