//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};

use relay_protocol::{DEFAULT_MAX_LINE_BYTES, DEFAULT_SERVER_PORT};

use crate::broadcast::SlowPeerPolicy;

/// Default number of frames queued per peer before the slow-peer policy applies.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Server configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum bytes read from a peer as one chunk
    pub max_line_bytes: usize,

    /// Frames queued per peer before the slow-peer policy applies
    pub outbox_capacity: usize,

    /// What to do with peers that fall behind
    pub slow_peer_policy: SlowPeerPolicy,

    /// Enable TCP_NODELAY on accepted connections
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_SERVER_PORT)),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            slow_peer_policy: SlowPeerPolicy::Drop,
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the listen port, keeping the bind host
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the chunk bound (at least one byte)
    pub fn max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max.max(1);
        self
    }

    /// Set the per-peer outbox capacity (at least one frame)
    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity.max(1);
        self
    }

    /// Set the slow-peer policy
    pub fn slow_peer_policy(mut self, policy: SlowPeerPolicy) -> Self {
        self.slow_peer_policy = policy;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}
