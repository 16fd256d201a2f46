//! Fan-out of broadcast frames to every peer but the sender.
//!
//! The broadcaster never writes to sockets and never mutates the registry.
//! It walks the registry once per frame, pushing the frame into each
//! peer's bounded outbox. A peer that cannot take the frame is handled by
//! the configured `SlowPeerPolicy`; a peer whose writer is gone is skipped
//! and left for its own handler to remove.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::registry::{DeliveryError, PeerId, Registry};

/// What to do with a peer whose outbox is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlowPeerPolicy {
    /// Drop the frame for that peer only.
    #[default]
    Drop,
    /// Ask the peer's handler to close the connection.
    Disconnect,
}

impl fmt::Display for SlowPeerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// Outcome counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Frames queued successfully.
    pub delivered: usize,
    /// Frames discarded because the peer's outbox was full.
    pub dropped: usize,
    /// Peers whose writer had already stopped.
    pub closed: usize,
    /// Peers told to disconnect because their outbox was full.
    pub disconnected: usize,
}

impl BroadcastReport {
    /// Number of peers the broadcast reached or tried to reach.
    pub fn recipients(&self) -> usize {
        self.delivered + self.dropped + self.closed + self.disconnected
    }
}

/// Delivers frames to every registered peer except the sender.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
    policy: SlowPeerPolicy,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>, policy: SlowPeerPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> SlowPeerPolicy {
        self.policy
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Queues `frame` for every peer other than `sender`.
    ///
    /// Never fails: per-peer problems are counted in the report and logged.
    pub fn broadcast(&self, sender: PeerId, frame: &Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        self.registry.for_each_except(sender, |peer| {
            match peer.deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Closed) => {
                    debug!(peer_id = %peer.id(), peer = %peer.label(), "Skipping closed peer");
                    report.closed += 1;
                }
                Err(DeliveryError::QueueFull) => match self.policy {
                    SlowPeerPolicy::Drop => {
                        warn!(peer_id = %peer.id(), peer = %peer.label(), "Peer outbox full, dropping frame");
                        report.dropped += 1;
                    }
                    SlowPeerPolicy::Disconnect => {
                        if !peer.is_disconnecting() {
                            warn!(peer_id = %peer.id(), peer = %peer.label(), "Peer outbox full, disconnecting");
                        }
                        peer.disconnect();
                        report.disconnected += 1;
                    }
                },
            }
        });

        report
    }
}
