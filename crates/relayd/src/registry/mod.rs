//! Registry of live peers.
//!
//! The registry is the only shared mutable state in the server. Every
//! handler task holds an `Arc<Registry>`; membership changes and broadcast
//! traversals all go through one mutex, so a traversal never races with an
//! insert or a removal.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  register/drop  ┌──────────────────────────────┐
//! │ ConnectionHandler│────────────────▶│          Registry            │
//! │   (per peer)     │                 │ Mutex<HashMap<PeerId, Peer>> │
//! └────────┬─────────┘                 └──────────────┬───────────────┘
//!          │ chunk read                               │ for_each_except
//!          ▼                                          ▼
//! ┌──────────────────┐                 ┌──────────────────────────────┐
//! │   Broadcaster    │────────────────▶│ Peer::deliver (try_send)     │
//! └──────────────────┘                 │   -> per-peer outbox         │
//!                                      └──────────────────────────────┘
//! ```
//!
//! The lock is a `std::sync::Mutex`: nothing inside the critical section
//! awaits. Per-peer sends are non-blocking queue pushes, and the actual
//! socket writes happen in each peer's writer task outside the lock.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A poisoned lock is recovered instead of propagating the panic

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

mod peer;

pub use peer::{DeliveryError, Outbox, Peer, PeerId};

type PeerMap = HashMap<PeerId, Peer>;

// ============================================================================
// Registry
// ============================================================================

/// Set of currently connected peers, keyed by connection identity.
#[derive(Debug, Default)]
pub struct Registry {
    peers: Mutex<PeerMap>,
    next_id: AtomicU64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh peer id.
    pub fn next_peer_id(&self) -> PeerId {
        PeerId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn lock(&self) -> MutexGuard<'_, PeerMap> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a peer.
    ///
    /// Ids come from `next_peer_id`, so a collision means the caller reused
    /// one; the newer peer wins and the collision is logged.
    pub fn add(&self, peer: Peer) {
        let id = peer.id();
        let previous = self.lock().insert(id, peer);
        if previous.is_some() {
            warn!(peer_id = %id, "Replaced existing peer with the same id");
        } else {
            debug!(peer_id = %id, "Peer added to registry");
        }
    }

    /// Removes a peer, returning it if it was present.
    ///
    /// Removing an absent peer is a no-op.
    pub fn remove(&self, id: PeerId) -> Option<Peer> {
        let removed = self.lock().remove(&id);
        if removed.is_some() {
            debug!(peer_id = %id, "Peer removed from registry");
        }
        removed
    }

    /// Inserts a peer and returns a guard that removes it when dropped.
    ///
    /// The guard is how handlers tie registry membership to their own
    /// lifetime: it fires on normal return, early return via `?`, and when
    /// the handler task is aborted.
    pub fn register(self: &Arc<Self>, peer: Peer) -> PeerRegistration {
        let id = peer.id();
        self.add(peer);
        PeerRegistration {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Applies `f` to every peer except `sender`.
    ///
    /// The whole traversal runs under the registry lock, so `f` must not
    /// block. Returns the number of peers visited.
    pub fn for_each_except<F>(&self, sender: PeerId, mut f: F) -> usize
    where
        F: FnMut(&Peer),
    {
        let peers = self.lock();
        let mut visited = 0;
        for peer in peers.values().filter(|peer| peer.id() != sender) {
            f(peer);
            visited += 1;
        }
        visited
    }

    /// Returns the number of registered peers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Snapshot of the address labels of all registered peers.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .lock()
            .values()
            .map(|peer| peer.label().to_string())
            .collect();
        labels.sort();
        labels
    }
}

// ============================================================================
// Registration Guard
// ============================================================================

/// Membership of one peer, released on drop.
#[derive(Debug)]
#[must_use = "dropping the registration removes the peer immediately"]
pub struct PeerRegistration {
    registry: Arc<Registry>,
    id: PeerId,
}

impl PeerRegistration {
    pub fn id(&self) -> PeerId {
        self.id
    }
}

impl Drop for PeerRegistration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
