//! Bounded line chunking for inbound connection bytes.
//!
//! The server forwards what it reads one chunk at a time. A chunk ends at
//! the first newline (inclusive) or after `max_len` bytes, whichever comes
//! first, so a peer that never sends a newline cannot grow the read buffer
//! without bound. Bytes left over when the peer closes its send side are
//! emitted as a final, unterminated chunk.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::DEFAULT_MAX_LINE_BYTES;

/// Decoder yielding raw line chunks, newline preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChunkCodec {
    max_len: usize,
    /// Index already scanned for a newline, so partial reads are not rescanned.
    next_index: usize,
}

impl LineChunkCodec {
    /// Creates a codec with the default chunk bound.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_BYTES)
    }

    /// Creates a codec that never yields chunks longer than `max_len`.
    ///
    /// A bound of zero is treated as one byte.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            next_index: 0,
        }
    }

    /// Returns the chunk bound.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for LineChunkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineChunkCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let limit = src.len().min(self.max_len);
        let start = self.next_index.min(limit);

        if let Some(offset) = src[start..limit].iter().position(|b| *b == b'\n') {
            self.next_index = 0;
            return Ok(Some(src.split_to(start + offset + 1)));
        }

        if src.len() >= self.max_len {
            self.next_index = 0;
            return Ok(Some(src.split_to(self.max_len)));
        }

        self.next_index = limit;
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(chunk) = self.decode(src)? {
            return Ok(Some(chunk));
        }

        if src.is_empty() {
            return Ok(None);
        }

        self.next_index = 0;
        let len = src.len();
        Ok(Some(src.split_to(len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    async fn chunks(input: &[u8], max_len: usize) -> Vec<Vec<u8>> {
        let mut framed = FramedRead::new(input, LineChunkCodec::with_max_len(max_len));
        let mut out = Vec::new();
        while let Some(chunk) = framed.next().await {
            out.push(chunk.expect("chunk").to_vec());
        }
        out
    }

    #[tokio::test]
    async fn test_splits_on_newlines() {
        let out = chunks(b"hello\nworld\n", 1024).await;
        assert_eq!(out, vec![b"hello\n".to_vec(), b"world\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_empty_line_is_a_chunk() {
        let out = chunks(b"\nx\n", 1024).await;
        assert_eq!(out, vec![b"\n".to_vec(), b"x\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_long_line_is_cut_at_bound() {
        let out = chunks(b"abcdefgh\n", 3).await;
        assert_eq!(
            out,
            vec![
                b"abc".to_vec(),
                b"def".to_vec(),
                b"gh\n".to_vec(),
            ]
        );
    }

    #[tokio::test]
    async fn test_trailing_bytes_flushed_at_eof() {
        let out = chunks(b"one\ntwo", 1024).await;
        assert_eq!(out, vec![b"one\n".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_partial_input_waits_for_more() {
        let mut codec = LineChunkCodec::with_max_len(16);
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"lo\nrest");
        let chunk = codec.decode(&mut buf).unwrap().expect("line");
        assert_eq!(&chunk[..], b"hello\n");
        assert_eq!(&buf[..], b"rest");
    }

    #[test]
    fn test_zero_bound_is_clamped() {
        let codec = LineChunkCodec::with_max_len(0);
        assert_eq!(codec.max_len(), 1);
    }

    #[test]
    fn test_default_bound() {
        assert_eq!(LineChunkCodec::default().max_len(), DEFAULT_MAX_LINE_BYTES);
    }
}
