//! Relay Daemon - Peer registry and broadcast server
//!
//! This crate provides the server side of the chat relay:
//! - `registry` - The shared set of live peers, guarded by one mutex
//! - `broadcast` - Fan-out of tagged frames to every peer but the sender
//! - `server` - TCP accept loop and per-connection handlers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        relayd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  RelayServer    │────▶│         Registry            │   │
//! │  │ (TcpListener)   │     │   (Arc, single mutex)       │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ traversal         │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│────▶│       Broadcaster           │   │
//! │  │  (per peer)     │     │  (per-peer bounded outbox)  │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod broadcast;
pub mod registry;
pub mod server;

pub use broadcast::{BroadcastReport, Broadcaster, SlowPeerPolicy};
pub use registry::{DeliveryError, Peer, PeerId, PeerRegistration, Registry};
pub use server::{spawn_shutdown_listener, RelayServer, ServerConfig, ServerError};
