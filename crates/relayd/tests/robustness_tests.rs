//! Robustness tests for the relay server.
//!
//! These tests verify the server handles edge cases and error conditions gracefully:
//! - Rapid connect/disconnect
//! - Lines longer than the read bound
//! - Non-UTF-8 payloads
//! - Peers that stop reading
//! - Recovery after abrupt disconnects
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relayd::{Registry, RelayServer, ServerConfig, SlowPeerPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(5);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    registry: Arc<Registry>,
    cancel_token: CancellationToken,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(ServerConfig::default()).await
    }

    async fn spawn_with(config: ServerConfig) -> Self {
        let config = config.bind("127.0.0.1:0".parse().unwrap());
        let cancel_token = CancellationToken::new();
        let server = RelayServer::bind(config, cancel_token.clone())
            .await
            .expect("bind server");
        let addr = server.local_addr().expect("local addr");
        let registry = server.registry();

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        TestServer {
            addr,
            registry,
            cancel_token,
        }
    }

    async fn connect_raw(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.expect("connect to server")
    }

    async fn wait_for_peers(&self, count: usize) {
        let registry = Arc::clone(&self.registry);
        let result = timeout(WAIT_TIMEOUT, async move {
            while registry.len() != count {
                sleep(POLL_INTERVAL).await;
            }
        })
        .await;
        assert!(
            result.is_ok(),
            "registry did not reach {count} peers (has {})",
            self.registry.len()
        );
    }

    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    timeout(WAIT_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("timed out reading")
        .expect("read");
    buf
}

// ============================================================================
// Connection Churn
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rapid_connect_disconnect_membership() {
    const CONNECTS: usize = 50;
    const DISCONNECTS: usize = 30;

    let server = TestServer::spawn().await;

    let mut tasks = Vec::new();
    for _ in 0..CONNECTS {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            TcpStream::connect(addr).await.expect("connect")
        }));
    }

    let mut streams = Vec::new();
    for task in tasks {
        streams.push(task.await.unwrap());
    }
    server.wait_for_peers(CONNECTS).await;

    // Interleave disconnects from several tasks.
    let leaving: Vec<TcpStream> = streams.drain(..DISCONNECTS).collect();
    let mut closers = Vec::new();
    for mut stream in leaving {
        closers.push(tokio::spawn(async move {
            let _ = stream.shutdown().await;
            drop(stream);
        }));
    }
    for closer in closers {
        closer.await.unwrap();
    }

    server.wait_for_peers(CONNECTS - DISCONNECTS).await;
    assert_eq!(streams.len(), CONNECTS - DISCONNECTS);

    drop(streams);
    server.wait_for_peers(0).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_recovers_after_abrupt_disconnects() {
    let server = TestServer::spawn().await;

    for _ in 0..10 {
        let mut stream = server.connect_raw().await;
        server.wait_for_peers(1).await;
        stream.write_all(b"half a line").await.unwrap();
        drop(stream);
        server.wait_for_peers(0).await;
    }

    let mut a = server.connect_raw().await;
    let mut b = server.connect_raw().await;
    server.wait_for_peers(2).await;

    a.write_all(b"ok\n").await.unwrap();
    let expected = format!("[{}] ok\n", a.local_addr().unwrap());
    let got = read_exactly(&mut b, expected.len()).await;
    assert_eq!(got, expected.as_bytes());

    server.shutdown().await;
}

// ============================================================================
// Payload Edge Cases
// ============================================================================

#[tokio::test]
async fn test_long_line_is_split_at_read_bound() {
    let server = TestServer::spawn_with(ServerConfig::default().max_line_bytes(8)).await;
    let mut a = server.connect_raw().await;
    let mut b = server.connect_raw().await;
    server.wait_for_peers(2).await;

    a.write_all(b"abcdefghij\n").await.unwrap();

    let label = a.local_addr().unwrap();
    let expected = format!("[{label}] abcdefgh[{label}] ij\n");
    let got = read_exactly(&mut b, expected.len()).await;
    assert_eq!(String::from_utf8(got).unwrap(), expected);

    server.shutdown().await;
}

#[tokio::test]
async fn test_non_utf8_payload_is_relayed_verbatim() {
    let server = TestServer::spawn().await;
    let mut a = server.connect_raw().await;
    let mut b = server.connect_raw().await;
    server.wait_for_peers(2).await;

    let payload = [0xffu8, 0x00, 0xc3, 0x28, b'\n'];
    a.write_all(&payload).await.unwrap();

    let mut expected = format!("[{}] ", a.local_addr().unwrap()).into_bytes();
    expected.extend_from_slice(&payload);
    let got = read_exactly(&mut b, expected.len()).await;
    assert_eq!(got, expected);

    server.shutdown().await;
}

#[tokio::test]
async fn test_empty_line_is_relayed() {
    let server = TestServer::spawn().await;
    let mut a = server.connect_raw().await;
    let mut b = server.connect_raw().await;
    server.wait_for_peers(2).await;

    a.write_all(b"\n").await.unwrap();

    let expected = format!("[{}] \n", a.local_addr().unwrap());
    let got = read_exactly(&mut b, expected.len()).await;
    assert_eq!(got, expected.as_bytes());

    server.shutdown().await;
}

// ============================================================================
// Slow Peers
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stalled_reader_is_disconnected_under_disconnect_policy() {
    const CHUNK: usize = 64 * 1024;
    const CHUNKS: usize = 400;

    let config = ServerConfig::default()
        .max_line_bytes(CHUNK)
        .outbox_capacity(2)
        .slow_peer_policy(SlowPeerPolicy::Disconnect);
    let server = TestServer::spawn_with(config).await;

    let sender = server.connect_raw().await;
    // Never reads: its socket buffers fill, then its outbox.
    let _stalled = server.connect_raw().await;
    server.wait_for_peers(2).await;

    let writer = tokio::spawn(async move {
        let mut sender = sender;
        let mut line = vec![b'x'; CHUNK - 1];
        line.push(b'\n');
        for _ in 0..CHUNKS {
            if sender.write_all(&line).await.is_err() {
                break;
            }
        }
        sender
    });

    server.wait_for_peers(1).await;

    let _sender = writer.await.unwrap();
    server.shutdown().await;
}
