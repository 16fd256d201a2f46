//! Interactive chat session over an established connection.
//!
//! A session runs two duties concurrently:
//!
//! - **Receive**: everything the server sends is written to the console as
//!   soon as it arrives, without waiting for a full line.
//! - **Send**: each input line is forwarded to the server with a single
//!   `\n` terminator, until input ends or the user types `/quit` / `/exit`.
//!
//! Whichever duty finishes first ends the session; the other one is dropped
//! mid-operation. The connection's write side is then shut down so the
//! server sees a clean close.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use relay_protocol::InputCommand;

/// Bytes requested from the server per read.
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Printed when the server closes the connection.
pub const DISCONNECTED_NOTICE: &str = "[INFO] Disconnected by server.";

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed `/quit` or `/exit`.
    Quit,
    /// Input reached end-of-file.
    InputClosed,
    /// The server closed the connection.
    ServerClosed,
    /// Reading from or writing to the server failed.
    ConnectionLost,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Quit => "quit",
            Self::InputClosed => "input closed",
            Self::ServerClosed => "server closed",
            Self::ConnectionLost => "connection lost",
        };
        f.write_str(reason)
    }
}

/// Runs a session until either duty ends.
///
/// # Arguments
///
/// * `stream` - Connection to the relay server
/// * `input` - Source of user lines (stdin in the binary)
/// * `console` - Destination for received text (stdout in the binary)
pub async fn run_session<S, I, O>(stream: S, mut input: I, mut console: O) -> SessionEnd
where
    S: AsyncRead + AsyncWrite,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let end = tokio::select! {
        end = receive_duty(&mut reader, &mut console) => end,
        end = send_duty(&mut input, &mut writer) => end,
    };

    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "Failed to shut down connection");
    }

    info!(reason = %end, "Session ended");
    end
}

/// Copies server output to the console until the server closes or fails.
async fn receive_duty<R, O>(reader: &mut R, console: &mut O) -> SessionEnd
where
    R: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    // Bytes of a UTF-8 sequence cut off by the end of the previous read.
    let mut pending = Vec::new();

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                let mut notice = String::from_utf8_lossy(&pending).into_owned();
                notice.push_str(&format!("\n{DISCONNECTED_NOTICE}\n"));
                if let Err(e) = write_console(console, notice.as_bytes()).await {
                    warn!(error = %e, "Failed to write to console");
                }
                return SessionEnd::ServerClosed;
            }
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let text = decode_available(&mut pending);
                if let Err(e) = write_console(console, text.as_bytes()).await {
                    warn!(error = %e, "Failed to write to console");
                }
            }
            Err(e) => {
                debug!(error = %e, "Read from server failed");
                return SessionEnd::ConnectionLost;
            }
        }
    }
}

/// Decodes as much of `pending` as possible.
///
/// Invalid sequences become U+FFFD. A sequence that is merely incomplete
/// at the end stays in `pending` for the next read to finish.
fn decode_available(pending: &mut Vec<u8>) -> String {
    let mut text = String::with_capacity(pending.len());
    let mut start = 0;

    loop {
        match std::str::from_utf8(&pending[start..]) {
            Ok(valid) => {
                text.push_str(valid);
                pending.clear();
                return text;
            }
            Err(e) => {
                let valid_end = start + e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[start..valid_end]));
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        start = valid_end + len;
                    }
                    None => {
                        pending.drain(..valid_end);
                        return text;
                    }
                }
            }
        }
    }
}

/// Forwards input lines to the server until input ends or the user quits.
async fn send_duty<I, W>(input: &mut I, writer: &mut W) -> SessionEnd
where
    I: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();

    loop {
        line.clear();
        match input.read_until(b'\n', &mut line).await {
            Ok(0) => return SessionEnd::InputClosed,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Failed to read input");
                return SessionEnd::InputClosed;
            }
        }

        if InputCommand::parse(&String::from_utf8_lossy(&line)).is_quit() {
            return SessionEnd::Quit;
        }

        let message = strip_line_ending(&line);
        if let Err(e) = send_line(writer, message).await {
            debug!(error = %e, "Write to server failed");
            return SessionEnd::ConnectionLost;
        }
    }
}

async fn write_console<O>(console: &mut O, bytes: &[u8]) -> std::io::Result<()>
where
    O: AsyncWrite + Unpin,
{
    console.write_all(bytes).await?;
    console.flush().await
}

async fn send_line<W>(writer: &mut W, message: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = Vec::with_capacity(message.len() + 1);
    frame.extend_from_slice(message);
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
