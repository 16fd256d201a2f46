//! Server endpoint resolution from positional arguments.
//!
//! The client accepts at most two positional arguments:
//!
//! | Arguments       | Host          | Port          |
//! |-----------------|---------------|---------------|
//! | (none)          | `127.0.0.1`   | `12345`       |
//! | `PORT`          | `127.0.0.1`   | `PORT`        |
//! | `HOST`          | `HOST`        | `12345`       |
//! | `HOST PORT`     | `HOST`        | `PORT`        |
//!
//! A single argument made only of ASCII digits is a port; anything else is
//! a host.

use std::fmt;

use relay_protocol::{DEFAULT_CLIENT_HOST, DEFAULT_CLIENT_PORT};

use crate::error::{ClientError, Result};

/// Host and port the client connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolves the endpoint from positional arguments (program name excluded).
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidPort` if a port argument is not a number in `0..=65535`
    /// - `ClientError::TooManyArguments` if more than two arguments are given
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<S> = args.into_iter().collect();

        match args.as_slice() {
            [] => Ok(Self::default()),
            [single] => {
                let single = single.as_ref();
                if is_all_digits(single) {
                    Ok(Self::new(DEFAULT_CLIENT_HOST, parse_port(single)?))
                } else {
                    Ok(Self::new(single, DEFAULT_CLIENT_PORT))
                }
            }
            [host, port] => Ok(Self::new(host.as_ref(), parse_port(port.as_ref())?)),
            _ => Err(ClientError::TooManyArguments(args.len())),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_HOST, DEFAULT_CLIENT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `u16::from_str` also accepts a leading `+`, which is not a port.
fn parse_port(s: &str) -> Result<u16> {
    if !is_all_digits(s) {
        return Err(ClientError::InvalidPort(s.to_string()));
    }
    s.parse().map_err(|_| ClientError::InvalidPort(s.to_string()))
}
