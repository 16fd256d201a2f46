//! Relay Client - Interactive client for the chat relay
//!
//! This library provides the pieces of the `relay` command:
//!
//! - `endpoint` - Resolving `[HOST] [PORT]` arguments to a server endpoint
//! - `connect` - A single, non-retrying connection attempt
//! - `session` - The interactive session (receive and send duties)
//! - `client` - The whole run: connect, banner, session, `[END]` line
//! - `error` - Client error types
//!
//! # Architecture
//!
//! Once connected, two duties run concurrently under one `tokio::select!`:
//!
//! 1. **Receive**: prints whatever the server sends, as it arrives
//! 2. **Send**: forwards each input line until EOF or `/quit`
//!
//! The first duty to finish ends the session.

pub mod client;
pub mod connect;
pub mod endpoint;
pub mod error;
pub mod session;

// Re-export commonly used types
pub use client::{run_client, ClientOutcome};
pub use connect::connect;
pub use endpoint::Endpoint;
pub use error::{ClientError, Result, USAGE_EXIT_CODE};
pub use session::{run_session, SessionEnd};
