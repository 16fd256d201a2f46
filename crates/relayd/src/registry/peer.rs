//! Peer handles held by the registry.
//!
//! A `Peer` is the server-side view of one connected client: its identity,
//! remote address label, and the sending side of its bounded outbox. The
//! socket itself is never shared; it stays with the peer's handler and
//! writer task, and other tasks only ever push frames into the outbox.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Delivery never blocks and never fails loudly; callers get a `DeliveryError`

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Receiving side of a peer's outbox, drained by its writer task.
pub type Outbox = mpsc::Receiver<Bytes>;

// ============================================================================
// Peer Identity
// ============================================================================

/// Connection identity of a peer.
///
/// Allocated by the registry, unique for the lifetime of the server.
/// Two connections from the same remote address get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

// ============================================================================
// Peer
// ============================================================================

/// One live connection as seen by the registry.
#[derive(Debug)]
pub struct Peer {
    id: PeerId,
    label: String,
    outbox: mpsc::Sender<Bytes>,
    cancel_token: CancellationToken,
}

impl Peer {
    /// Creates a peer together with the receiving side of its outbox.
    ///
    /// # Arguments
    ///
    /// * `id` - Identity allocated by the registry
    /// * `addr` - Remote address; its display form becomes the label
    /// * `capacity` - Maximum number of frames queued for this peer
    /// * `cancel_token` - Token the handler watches; cancelling it disconnects the peer
    pub fn channel(
        id: PeerId,
        addr: SocketAddr,
        capacity: usize,
        cancel_token: CancellationToken,
    ) -> (Self, Outbox) {
        let (outbox, rx) = mpsc::channel(capacity.max(1));
        let peer = Self {
            id,
            label: addr.to_string(),
            outbox,
            cancel_token,
        };
        (peer, rx)
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Address label used in broadcast frames.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queues a frame for this peer without waiting.
    ///
    /// # Errors
    ///
    /// - `DeliveryError::QueueFull` if the peer is not draining its outbox fast enough
    /// - `DeliveryError::Closed` if the peer's writer has stopped
    pub fn deliver(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.outbox.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Asks the peer's handler to terminate the connection.
    ///
    /// The handler removes the peer from the registry itself.
    pub fn disconnect(&self) {
        self.cancel_token.cancel();
    }

    /// Returns true once a disconnect has been requested.
    pub fn is_disconnecting(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Reasons a frame could not be queued for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Peer outbox is full")]
    QueueFull,

    #[error("Peer connection is closed")]
    Closed,
}
