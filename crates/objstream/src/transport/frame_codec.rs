// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefix framing over a byte stream.
//!
//! ```text
//! +----------------+-------------------------+
//! | Length (4B BE) | Payload (kind + body)   |
//! +----------------+-------------------------+
//! ```
//!
//! The length covers the payload only, not the 4-byte header.
//!
//! # Example
//!
//! ```
//! use objstream::transport::FrameCodec;
//! use std::io::Cursor;
//!
//! let frame = FrameCodec::encode(b"\x00\x00\x00\x01hello");
//! let mut codec = FrameCodec::new(1024);
//! let payload = codec.read_frame(&mut Cursor::new(frame)).unwrap();
//! assert_eq!(&payload[4..], b"hello");
//! ```

use crate::config::FRAME_HEADER_SIZE;
use crate::error::{Error, Result};
use std::io::{self, Read};

#[derive(Debug, Clone, Copy)]
enum ReadState {
    ReadingLength { bytes_read: usize },
    ReadingBody { expected_len: usize, bytes_read: usize },
}

impl Default for ReadState {
    fn default() -> Self {
        ReadState::ReadingLength { bytes_read: 0 }
    }
}

/// Frame decoder with partial-read state and an anti-OOM size limit.
#[derive(Debug)]
pub struct FrameCodec {
    state: ReadState,
    header: [u8; FRAME_HEADER_SIZE],
    body: Vec<u8>,
    max_size: usize,
    frames_decoded: u64,
    bytes_decoded: u64,
    frames_rejected: u64,
}

impl FrameCodec {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: ReadState::default(),
            header: [0; FRAME_HEADER_SIZE],
            body: Vec::new(),
            max_size,
            frames_decoded: 0,
            bytes_decoded: 0,
            frames_rejected: 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn bytes_decoded(&self) -> u64 {
        self.bytes_decoded
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }

    /// True while a frame has been started but not completed.
    pub fn is_partial(&self) -> bool {
        match self.state {
            ReadState::ReadingLength { bytes_read } => bytes_read > 0,
            ReadState::ReadingBody { .. } => true,
        }
    }

    /// `[length: u32 BE][payload]`
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    /// Decode the next frame payload.
    ///
    /// Returns `Ok(None)` when the reader would block (read timeout or
    /// non-blocking stream); call again to resume. End of stream, even in
    /// the middle of a frame, is [`Error::ConnectionBroken`].
    pub fn decode<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<Option<Vec<u8>>> {
        loop {
            let result = match self.state {
                ReadState::ReadingLength { bytes_read } => {
                    reader.read(&mut self.header[bytes_read..])
                }
                ReadState::ReadingBody {
                    expected_len,
                    bytes_read,
                } => reader.read(&mut self.body[bytes_read..expected_len]),
            };

            let n = match result {
                Ok(0) => {
                    let what = if self.is_partial() {
                        "stream ended inside a frame"
                    } else {
                        "stream closed"
                    };
                    log::debug!("[TRANSPORT] {}", what);
                    self.state = ReadState::default();
                    return Err(Error::ConnectionBroken);
                }
                Ok(n) => n,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Ok(None);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from_stream(e)),
            };

            match self.state {
                ReadState::ReadingLength { bytes_read } => {
                    let total = bytes_read + n;
                    if total < FRAME_HEADER_SIZE {
                        self.state = ReadState::ReadingLength { bytes_read: total };
                        continue;
                    }
                    let len = u32::from_be_bytes(self.header) as usize;
                    if len > self.max_size {
                        self.frames_rejected += 1;
                        self.state = ReadState::default();
                        return Err(Error::FrameTooLarge {
                            len,
                            max: self.max_size,
                        });
                    }
                    if len == 0 {
                        self.frames_decoded += 1;
                        self.state = ReadState::default();
                        return Ok(Some(Vec::new()));
                    }
                    self.body.resize(len, 0);
                    self.state = ReadState::ReadingBody {
                        expected_len: len,
                        bytes_read: 0,
                    };
                }
                ReadState::ReadingBody {
                    expected_len,
                    bytes_read,
                } => {
                    let total = bytes_read + n;
                    if total < expected_len {
                        self.state = ReadState::ReadingBody {
                            expected_len,
                            bytes_read: total,
                        };
                        continue;
                    }
                    self.frames_decoded += 1;
                    self.bytes_decoded += expected_len as u64;
                    self.state = ReadState::default();
                    return Ok(Some(std::mem::take(&mut self.body)));
                }
            }
        }
    }

    /// Blocking decode: a timeout surfaces as an I/O error.
    pub fn read_frame<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<Vec<u8>> {
        match self.decode(reader)? {
            Some(payload) => Ok(payload),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "no complete frame before the read timeout",
            ))),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_MESSAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `chunk` bytes per read.
    struct Trickle {
        data: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.data.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_encode_layout() {
        let frame = FrameCodec::encode(b"hello");
        assert_eq!(&frame[..4], &5u32.to_be_bytes());
        assert_eq!(&frame[4..], b"hello");
        assert_eq!(FrameCodec::encode(b"").len(), 4);
    }

    #[test]
    fn test_decode_sequence_in_small_chunks() {
        let mut bytes = FrameCodec::encode(b"first");
        bytes.extend(FrameCodec::encode(b""));
        bytes.extend(FrameCodec::encode(b"third frame"));
        let mut reader = Trickle {
            data: Cursor::new(bytes),
            chunk: 3,
        };

        let mut codec = FrameCodec::new(64);
        assert_eq!(codec.read_frame(&mut reader).unwrap(), b"first");
        assert_eq!(codec.read_frame(&mut reader).unwrap(), b"");
        assert_eq!(codec.read_frame(&mut reader).unwrap(), b"third frame");
        assert_eq!(codec.frames_decoded(), 3);
        assert_eq!(codec.bytes_decoded(), 16);
        assert!(!codec.is_partial());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut codec = FrameCodec::new(8);
        let frame = FrameCodec::encode(&[0u8; 9]);
        let err = codec.read_frame(&mut Cursor::new(frame)).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { len: 9, max: 8 }));
        assert_eq!(codec.frames_rejected(), 1);

        let huge = u32::MAX.to_be_bytes().to_vec();
        assert!(matches!(
            codec.read_frame(&mut Cursor::new(huge)),
            Err(Error::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_truncation_is_connection_broken() {
        let mut frame = FrameCodec::encode(b"truncated body");
        frame.truncate(9);
        let mut codec = FrameCodec::new(64);
        assert!(matches!(
            codec.read_frame(&mut Cursor::new(frame)),
            Err(Error::ConnectionBroken)
        ));

        let mut empty = Cursor::new(Vec::new());
        assert!(matches!(
            codec.read_frame(&mut empty),
            Err(Error::ConnectionBroken)
        ));
    }
}
