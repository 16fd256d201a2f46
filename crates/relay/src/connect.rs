//! Connecting to the relay server.
//!
//! A single attempt, no retries: the host is resolved, every resolved
//! address is tried in order, and the first successful connection wins.

use std::io;

use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::{ClientError, Result};

/// Opens a TCP connection to `endpoint`.
///
/// # Errors
///
/// - `ClientError::InvalidHost` if the host does not resolve to any address
/// - `ClientError::ConnectionRefused` if nothing listens at the last address tried
/// - `ClientError::Io` for any other connect failure
pub async fn connect(endpoint: &Endpoint) -> Result<TcpStream> {
    let addrs: Vec<_> = lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|source| ClientError::InvalidHost {
            host: endpoint.host.clone(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(ClientError::InvalidHost {
            host: endpoint.host.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
        });
    }

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                debug!(server = %addr, "Connected");
                return Ok(stream);
            }
            Err(e) => {
                warn!(server = %addr, error = %e, "Connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            Err(ClientError::ConnectionRefused {
                host: endpoint.host.clone(),
                port: endpoint.port,
            })
        }
        Some(e) => Err(ClientError::Io(e)),
        None => Err(ClientError::Io(io::Error::new(
            io::ErrorKind::NotConnected,
            "no address was tried",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect(&Endpoint::new("127.0.0.1", port)).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then release to find a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect(&Endpoint::new("127.0.0.1", port)).await;
        match result {
            Err(ClientError::ConnectionRefused { host, port: p }) => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(p, port);
            }
            other => panic!("expected ConnectionRefused, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let result = connect(&Endpoint::new("no such host.invalid", 12345)).await;
        assert!(matches!(result, Err(ClientError::InvalidHost { .. })));
    }
}
