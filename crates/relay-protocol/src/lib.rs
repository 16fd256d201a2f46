//! Relay Protocol - Wire format for the chat relay
//!
//! This crate provides the pieces of the newline-delimited text protocol
//! shared between the relay server (relayd) and the interactive client:
//!
//! - `frame` - Construction of the tagged broadcast frame
//! - `codec` - Bounded line chunking for inbound connection bytes
//! - `command` - Interactive client commands (`/quit`, `/exit`)
//!
//! There is no handshake and no length prefix: a client writes lines, the
//! server forwards each line to every other peer prefixed with the sender's
//! address label.

pub mod codec;
pub mod command;
pub mod frame;

pub use codec::LineChunkCodec;
pub use command::InputCommand;
pub use frame::broadcast_frame;

/// Default TCP port the server listens on.
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Default host a client connects to when none is given.
pub const DEFAULT_CLIENT_HOST: &str = "127.0.0.1";

/// Default TCP port a client connects to when none is given.
pub const DEFAULT_CLIENT_PORT: u16 = 12345;

/// Upper bound on the bytes the server reads as one chunk.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024;
