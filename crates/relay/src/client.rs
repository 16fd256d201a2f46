//! Top-level client flow.
//!
//! Connects to the endpoint, prints the banner, runs one session and
//! always finishes with the `[END]` line. Connect failures are reported
//! on the console rather than returned: once a connection was attempted
//! the program ends normally.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::future::Future;
use std::io;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::connect::connect;
use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::session::{run_session, SessionEnd};

/// Last line printed by every client run.
pub const END_NOTICE: &str = "[END] Session finished.";

/// How a client run ended.
#[derive(Debug)]
pub enum ClientOutcome {
    /// A session ran and ended for the given reason.
    Finished(SessionEnd),
    /// The interrupt future fired during the session.
    Interrupted,
    /// No session was started.
    ConnectFailed(ClientError),
}

impl ClientOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectFailed(e) => e.exit_code(),
            Self::Finished(_) | Self::Interrupted => 0,
        }
    }
}

/// Runs the client against `endpoint`.
///
/// # Arguments
///
/// * `endpoint` - Server to connect to
/// * `input` - Source of user lines
/// * `console` - Destination for banners, diagnostics and received text
/// * `interrupt` - Ends the session early when it completes (Ctrl+C in the binary)
///
/// # Errors
///
/// Only console write failures are returned.
pub async fn run_client<I, O, F>(
    endpoint: &Endpoint,
    input: I,
    mut console: O,
    interrupt: F,
) -> io::Result<ClientOutcome>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
    F: Future,
{
    let outcome = match connect(endpoint).await {
        Ok(stream) => {
            let banner = format!(
                "[OK] Connected to {endpoint}\n\
                 [INFO] Type a message and press ENTER, /quit to leave.\n\n"
            );
            console.write_all(banner.as_bytes()).await?;
            console.flush().await?;

            let finished = tokio::select! {
                end = run_session(stream, input, &mut console) => Some(end),
                _ = interrupt => None,
            };

            match finished {
                Some(end) => {
                    info!(endpoint = %endpoint, reason = %end, "Session finished");
                    ClientOutcome::Finished(end)
                }
                None => {
                    debug!("Interrupted");
                    console.write_all(b"\n").await?;
                    ClientOutcome::Interrupted
                }
            }
        }
        Err(e) => {
            debug!(error = ?e, "Connect failed");
            console.write_all(format!("[ERROR] {e}\n").as_bytes()).await?;
            ClientOutcome::ConnectFailed(e)
        }
    };

    console.write_all(format!("{END_NOTICE}\n").as_bytes()).await?;
    console.flush().await?;
    Ok(outcome)
}
