// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Kind-tagged wire messages.
//!
//! ```text
//! +----------------+----------------+---------------------------+
//! | Length (4B BE) | Kind (4B BE)   | Body (maybe compressed)   |
//! +----------------+----------------+---------------------------+
//! ```
//!
//! The kind carries two flag bits: [`FLAG_ACK`] asks the receiver for an
//! `ok` acknowledgement, [`FLAG_COMPRESSED`] marks a compressed body.

use super::WireBuffer;
use crate::config::{
    StreamConfig, FLAG_ACK, FLAG_COMPRESSED, KIND_IDENTITY_UPDATE, KIND_MASK, KIND_OBJECT,
    KIND_PAYLOAD, KIND_SCHEMA_UPDATE, KIND_TAG_SIZE, KIND_USER_BASE,
};
use crate::error::{Error, Result};

/// A decoded (uncompressed) message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: u32,
    ack: bool,
    body: Vec<u8>,
}

impl Message {
    /// New message; flag bits in `kind` are ignored.
    pub fn new(kind: u32, body: Vec<u8>) -> Self {
        Self {
            kind: kind & KIND_MASK,
            ack: false,
            body,
        }
    }

    /// Ask the receiver to acknowledge with `ok`.
    pub fn with_ack(mut self) -> Self {
        self.ack = true;
        self
    }

    pub fn kind(&self) -> u32 {
        self.kind
    }

    pub fn requests_ack(&self) -> bool {
        self.ack
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Schema-update or identity-update messages consumed by the transport.
    pub fn is_update(&self) -> bool {
        matches!(self.kind, KIND_SCHEMA_UPDATE | KIND_IDENTITY_UPDATE)
    }

    /// Encode into a complete frame (length header included).
    ///
    /// The body is compressed when enabled, at least `min_compress_size`
    /// long, and the compressed form is actually smaller.
    pub fn encode(&self, config: &StreamConfig) -> Result<Vec<u8>> {
        let mut kind = self.kind;
        if self.ack {
            kind |= FLAG_ACK;
        }

        let compressed = if config.compression.is_enabled()
            && self.body.len() >= config.min_compress_size
        {
            let packed = config.codecs.compress(config.compression, &self.body)?;
            (packed.len() < self.body.len()).then_some(packed)
        } else {
            None
        };

        let body = match &compressed {
            Some(packed) => {
                kind |= FLAG_COMPRESSED;
                packed.as_slice()
            }
            None => self.body.as_slice(),
        };

        if KIND_TAG_SIZE + body.len() > config.max_message_size {
            return Err(Error::FrameTooLarge {
                len: KIND_TAG_SIZE + body.len(),
                max: config.max_message_size,
            });
        }

        let mut buf = WireBuffer::with_capacity(KIND_TAG_SIZE + body.len());
        buf.write_u32(kind)?;
        buf.write_bytes(body)?;
        Ok(buf.finalize()?)
    }

    /// Decode a frame payload (the bytes after the length header).
    ///
    /// Compressed bodies are expanded with `config`'s codecs, up to
    /// `max_message_size` bytes.
    pub fn decode(payload: Vec<u8>, config: &StreamConfig) -> Result<Message> {
        if payload.len() < KIND_TAG_SIZE {
            return Err(Error::MalformedFrame(format!(
                "payload of {} bytes has no kind tag",
                payload.len()
            )));
        }
        let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let kind = raw & KIND_MASK;
        if !is_known_kind(kind) {
            return Err(Error::UnknownKind(kind));
        }

        let body = if raw & FLAG_COMPRESSED != 0 {
            config
                .codecs
                .decompress(&payload[KIND_TAG_SIZE..], config.max_message_size)?
        } else {
            let mut payload = payload;
            payload.drain(..KIND_TAG_SIZE);
            payload
        };

        Ok(Message {
            kind,
            ack: raw & FLAG_ACK != 0,
            body,
        })
    }
}

/// Reserved kinds this implementation understands, plus every user kind.
pub fn is_known_kind(kind: u32) -> bool {
    kind >= KIND_USER_BASE
        || matches!(
            kind,
            KIND_PAYLOAD | KIND_OBJECT | KIND_SCHEMA_UPDATE | KIND_IDENTITY_UPDATE
        )
}
