//! Broadcast frame construction.
//!
//! A broadcast frame is the sender's address label in square brackets, one
//! space, then the payload exactly as it was read (trailing newline
//! included when the sender sent one):
//!
//! ```text
//! [127.0.0.1:54012] hello
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Builds the frame forwarded to every other peer.
///
/// The payload is copied verbatim; it is not required to be valid UTF-8.
pub fn broadcast_frame(label: &str, payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(label.len() + payload.len() + 3);
    frame.put_u8(b'[');
    frame.put_slice(label.as_bytes());
    frame.put_slice(b"] ");
    frame.put_slice(payload);
    frame.freeze()
}
