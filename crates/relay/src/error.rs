//! Error types for the relay client.
//!
//! This module defines the errors that can occur while resolving the
//! server address from command-line arguments and connecting to it.
//! Once a session is running, connection problems end the session
//! instead of surfacing as errors (see `SessionEnd`).
//!
//! All error types use `thiserror` for derive macros. Their display form
//! is the diagnostic shown to the user.

use std::io;
use thiserror::Error;

/// Exit status for command-line usage errors.
pub const USAGE_EXIT_CODE: i32 = 2;

// ============================================================================
// Client Error Type
// ============================================================================

/// Relay client errors.
///
/// # Error Handling
///
/// None of these are retried. The binary prints the diagnostic and exits:
/// - Argument errors are usage errors (no connection was attempted)
/// - Connection errors end the program cleanly after the diagnostic
#[derive(Error, Debug)]
pub enum ClientError {
    /// A port argument was not a number in `0..=65535`.
    #[error("Invalid port: '{0}'")]
    InvalidPort(String),

    /// More positional arguments than `[HOST] [PORT]`.
    #[error("Too many arguments: expected at most 2, got {0}")]
    TooManyArguments(usize),

    /// The host name could not be resolved to any address.
    #[error("Invalid host address: {host}")]
    InvalidHost {
        host: String,
        #[source]
        source: io::Error,
    },

    /// Nothing is listening at the resolved address.
    #[error("Cannot connect to {host}:{port}: the server is not listening.")]
    ConnectionRefused { host: String, port: u16 },

    /// I/O error passthrough.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Returns true for errors caused by the command line rather than the network.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::InvalidPort(_) | Self::TooManyArguments(_))
    }

    /// Process exit status after reporting this error.
    ///
    /// Network errors still end the program normally.
    pub fn exit_code(&self) -> i32 {
        if self.is_usage_error() {
            USAGE_EXIT_CODE
        } else {
            0
        }
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================================================
// Tests
// ============================================================================
