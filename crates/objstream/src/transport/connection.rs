// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Point-to-point message connection.
//!
//! Manages a single connected [`ByteStream`]: framing, piggybacked schema
//! and identity updates, and the blocking `ok` acknowledgement.
//!
//! # State Machine
//!
//! ```text
//!              send()                      receive()
//!   SendReady <------- Connected -------> RecvReady
//!       |                 ^  |                |
//!       +-----------------+  | close()        |
//!        done             |  v                |
//!                         | Closing           |
//!                         |  |                |
//!                         |  v                |
//!                         | Closed <----------+ broken stream /
//!                         +-------------------+ protocol error
//! ```
//!
//! Once `Closed`, every operation fails with [`Error::ConnectionBroken`]
//! without touching the stream. Reconnection is the caller's business.

use super::byte_stream::{BoxedByteStream, ByteStream};
use super::frame_codec::FrameCodec;
use crate::config::{
    ACK_TOKEN, FRAME_HEADER_SIZE, KIND_IDENTITY_UPDATE, KIND_OBJECT, KIND_SCHEMA_UPDATE,
};
use crate::context::SchemaContext;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectGraph, ObjectId};
use crate::registry::IdentityToken;
use crate::schema::codec::{decode_descriptor_list, encode_descriptor_list};
use crate::schema::ClassDescriptor;
use crate::stream::{EncodedObjects, ObjectReader, ObjectWriter};
use crate::wire::{Message, WireBuffer};
use crate::xref::CrossRefTables;
use std::fmt;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

// ============================================================================
// Connection State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Idle and usable.
    Connected,
    /// A send (and its acknowledgement wait) is in progress.
    SendReady,
    /// A receive is in progress.
    RecvReady,
    /// Shutting down.
    Closing,
    /// Closed, either by `close()` or by a broken stream.
    Closed,
}

impl ConnectionState {
    /// Can this connection send or receive?
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::SendReady | ConnectionState::RecvReady
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::SendReady => write!(f, "SendReady"),
            ConnectionState::RecvReady => write!(f, "RecvReady"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

// ============================================================================
// Connection Statistics
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct ConnectionStats {
    /// Payload messages sent (updates not included)
    pub messages_sent: u64,
    /// Payload messages handed to the caller
    pub messages_received: u64,
    /// Total bytes written, framing and acks included
    pub bytes_sent: u64,
    /// Total bytes read, framing and acks included
    pub bytes_received: u64,
    pub schema_updates_sent: u64,
    pub identity_updates_sent: u64,
    pub schema_updates_absorbed: u64,
    pub identity_updates_absorbed: u64,
    /// `ok` tokens written for the peer
    pub acks_sent: u64,
    /// `ok` tokens received for our own requests
    pub acks_received: u64,
    pub last_send_time: Option<Instant>,
    pub last_recv_time: Option<Instant>,
}

// ============================================================================
// Connection
// ============================================================================

/// A message connection over a connected byte stream.
///
/// Owned by one thread at a time; the schema context behind it may be
/// shared with other connections.
pub struct Connection<S: ByteStream = BoxedByteStream> {
    stream: S,
    codec: FrameCodec,
    ctx: Arc<SchemaContext>,
    xref: CrossRefTables,
    state: ConnectionState,
    stats: ConnectionStats,
}

impl<S: ByteStream> Connection<S> {
    /// Wrap an established stream. The stream is switched to blocking mode.
    pub fn new(stream: S, ctx: Arc<SchemaContext>) -> Result<Self> {
        stream.set_nonblocking(false).map_err(Error::Io)?;
        // Small frames and acks should not wait on Nagle.
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("[TRANSPORT] set_nodelay failed: {}", e);
        }
        let codec = FrameCodec::new(ctx.config().max_message_size);
        if let Ok(peer) = stream.peer_addr() {
            log::debug!("[TRANSPORT] connection to {} established", peer);
        }
        Ok(Self {
            stream,
            codec,
            ctx,
            xref: CrossRefTables::new(),
            state: ConnectionState::Connected,
            stats: ConnectionStats::default(),
        })
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn context(&self) -> &Arc<SchemaContext> {
        &self.ctx
    }

    pub fn xref(&self) -> &CrossRefTables {
        &self.xref
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(Error::Io)
    }

    /// Underlying stream, for readiness polling or timeouts.
    pub fn stream(&self) -> &S {
        &self.stream
    }

    // ========================================================================
    // State management
    // ========================================================================

    fn set_state(&mut self, new_state: ConnectionState) {
        if self.state != new_state {
            log::trace!("[TRANSPORT] state {} -> {}", self.state, new_state);
            self.state = new_state;
        }
    }

    fn ensure_operational(&self) -> Result<()> {
        if self.state.is_operational() {
            Ok(())
        } else {
            Err(Error::ConnectionBroken)
        }
    }

    /// Graceful close: `Closing`, stream shutdown, `Closed`.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.set_state(ConnectionState::Closing);
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            log::debug!("[TRANSPORT] shutdown: {}", e);
        }
        self.xref = CrossRefTables::new();
        self.set_state(ConnectionState::Closed);
        log::debug!("[TRANSPORT] connection closed");
    }

    /// Route a failure: connection-fatal errors close, others return to `Connected`.
    fn fail(&mut self, err: Error) -> Error {
        if err.is_connection_fatal() {
            log::debug!("[TRANSPORT] closing after error: {}", err);
            self.close();
        } else {
            self.set_state(ConnectionState::Connected);
        }
        err
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).map_err(Error::from_stream)?;
        self.stream.flush().map_err(Error::from_stream)?;
        self.stats.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    // ========================================================================
    // Send operations
    // ========================================================================

    /// Send one message. Blocks for `ok` if the message requests it.
    pub fn send(&mut self, msg: &Message) -> Result<()> {
        self.send_with_dependencies(msg, &[], &[])
    }

    /// Send `msg` preceded by whatever of `descriptors` and `identities`
    /// the peer has not seen yet on this connection.
    ///
    /// At most one schema update and one identity update go out, each
    /// batching every new item.
    pub fn send_with_dependencies(
        &mut self,
        msg: &Message,
        descriptors: &[Arc<ClassDescriptor>],
        identities: &[IdentityToken],
    ) -> Result<()> {
        self.ensure_operational()?;
        self.set_state(ConnectionState::SendReady);
        match self.send_inner(msg, descriptors, identities) {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn send_inner(
        &mut self,
        msg: &Message,
        descriptors: &[Arc<ClassDescriptor>],
        identities: &[IdentityToken],
    ) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let config = ctx.config();

        // Encode everything before touching the stream so a schema error
        // leaves the tables and the peer untouched.
        let payload = msg.encode(config)?;

        let mut new_descriptors = Vec::new();
        for desc in descriptors {
            let token = self.ctx.descriptors().register_arc(Arc::clone(desc));
            if !self.xref.descriptor_was_sent(token)
                && !new_descriptors.iter().any(|(t, _)| *t == token)
            {
                new_descriptors.push((token, desc.as_ref()));
            }
        }
        let mut new_identities: Vec<IdentityToken> = Vec::new();
        for &token in identities {
            if !token.is_null()
                && !self.xref.identity_was_sent(token)
                && !new_identities.contains(&token)
            {
                new_identities.push(token);
            }
        }

        let mut out = Vec::new();
        if !new_descriptors.is_empty() {
            let mut body = WireBuffer::new();
            encode_descriptor_list(&mut body, new_descriptors.iter().map(|(_, d)| *d))?;
            out.extend(Message::new(KIND_SCHEMA_UPDATE, body.into_bytes()).encode(config)?);
        }
        if !new_identities.is_empty() {
            let mut body = WireBuffer::new();
            body.write_u32(new_identities.len() as u32)?;
            for token in &new_identities {
                let label = self.ctx.identities().label(*token).unwrap_or_default();
                body.write_u64(token.0)?;
                body.write_str(&label)?;
            }
            out.extend(Message::new(KIND_IDENTITY_UPDATE, body.into_bytes()).encode(config)?);
        }
        out.extend(payload);
        self.write_raw(&out)?;

        if !new_descriptors.is_empty() {
            for (token, _) in &new_descriptors {
                self.xref.note_descriptor_sent(*token);
            }
            self.stats.schema_updates_sent += 1;
            log::debug!(
                "[TRANSPORT] schema update with {} descriptor(s)",
                new_descriptors.len()
            );
        }
        if !new_identities.is_empty() {
            for token in &new_identities {
                self.xref.note_identity_sent(*token);
            }
            self.stats.identity_updates_sent += 1;
            log::debug!(
                "[TRANSPORT] identity update with {} token(s)",
                new_identities.len()
            );
        }
        self.stats.messages_sent += 1;
        self.stats.last_send_time = Some(Instant::now());

        if msg.requests_ack() {
            self.wait_for_ack()?;
        }
        Ok(())
    }

    fn wait_for_ack(&mut self) -> Result<()> {
        let mut token = [0u8; 2];
        self.stream
            .read_exact(&mut token)
            .map_err(Error::from_stream)?;
        self.stats.bytes_received += token.len() as u64;
        if token != ACK_TOKEN {
            log::warn!("[TRANSPORT] bad acknowledgement {:02x?}", token);
            return Err(Error::BadAcknowledgement(token));
        }
        self.stats.acks_received += 1;
        Ok(())
    }

    /// Serialize `obj` (standalone, null pointers) and send it.
    pub fn send_object(&mut self, obj: &Object, ack: bool) -> Result<()> {
        let encoded = {
            let ctx = Arc::clone(&self.ctx);
            let mut writer = ObjectWriter::new(&ctx);
            writer.write_object(obj)?;
            writer.finish()
        };
        self.send_encoded(encoded, ack)
    }

    /// Serialize the graph reachable from `root` and send it.
    pub fn send_graph(&mut self, graph: &ObjectGraph, root: ObjectId, ack: bool) -> Result<()> {
        let encoded = {
            let ctx = Arc::clone(&self.ctx);
            let mut writer = ObjectWriter::new(&ctx);
            writer.write_root(graph, root)?;
            writer.finish()
        };
        self.send_encoded(encoded, ack)
    }

    /// Send records produced by an [`ObjectWriter`] on this connection's context.
    pub fn send_encoded(&mut self, encoded: EncodedObjects, ack: bool) -> Result<()> {
        let EncodedObjects {
            bytes,
            descriptors,
            identities,
        } = encoded;
        let mut msg = Message::new(KIND_OBJECT, bytes);
        if ack {
            msg = msg.with_ack();
        }
        self.send_with_dependencies(&msg, &descriptors, &identities)
    }

    // ========================================================================
    // Receive operations
    // ========================================================================

    /// Receive the next payload message.
    ///
    /// Schema and identity updates are applied and never returned. Any
    /// requested acknowledgement is written once the frame is absorbed.
    pub fn receive(&mut self) -> Result<Message> {
        self.ensure_operational()?;
        self.set_state(ConnectionState::RecvReady);
        match self.receive_inner() {
            Ok(msg) => {
                self.set_state(ConnectionState::Connected);
                Ok(msg)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn receive_inner(&mut self) -> Result<Message> {
        loop {
            let payload = self.codec.read_frame(&mut self.stream)?;
            self.stats.bytes_received += (payload.len() + FRAME_HEADER_SIZE) as u64;
            let msg = Message::decode(payload, self.ctx.config())?;

            match msg.kind() {
                KIND_SCHEMA_UPDATE => self.absorb_schema(msg.body())?,
                KIND_IDENTITY_UPDATE => self.absorb_identities(msg.body())?,
                _ => {}
            }
            if msg.requests_ack() {
                self.write_raw(&ACK_TOKEN)?;
                self.stats.acks_sent += 1;
            }
            if msg.is_update() {
                continue;
            }
            self.stats.messages_received += 1;
            self.stats.last_recv_time = Some(Instant::now());
            return Ok(msg);
        }
    }

    fn absorb_schema(&mut self, body: &[u8]) -> Result<()> {
        let mut buf = WireBuffer::from_bytes(body.to_vec());
        let descriptors = decode_descriptor_list(&mut buf, self.ctx.config().max_message_size)?;
        let count = descriptors.len();
        for desc in descriptors {
            let token = self.ctx.descriptors().register(desc);
            self.xref.note_descriptor_received(token);
        }
        self.stats.schema_updates_absorbed += 1;
        log::debug!("[TRANSPORT] absorbed schema update ({} descriptors)", count);
        Ok(())
    }

    fn absorb_identities(&mut self, body: &[u8]) -> Result<()> {
        let mut buf = WireBuffer::from_bytes(body.to_vec());
        let count = buf.read_u32()? as usize;
        for _ in 0..count {
            let token = IdentityToken(buf.read_u64()?);
            let label = buf.read_str()?;
            self.ctx.identities().register(token, label);
            self.xref.note_identity_received(token);
        }
        self.stats.identity_updates_absorbed += 1;
        log::debug!("[TRANSPORT] absorbed identity update ({} tokens)", count);
        Ok(())
    }

    /// Receive an object message and decode its first record.
    pub fn receive_object(&mut self) -> Result<Object> {
        let body = self.receive_object_body()?;
        ObjectReader::new(&self.ctx, body).read_object()
    }

    /// Receive an object message and decode its first record with every
    /// pointee, returning the graph and the root's id.
    pub fn receive_graph(&mut self) -> Result<(ObjectGraph, ObjectId)> {
        let body = self.receive_object_body()?;
        let mut reader = ObjectReader::new(&self.ctx, body);
        let root = reader.read_root()?;
        Ok((reader.into_graph(), root))
    }

    fn receive_object_body(&mut self) -> Result<Vec<u8>> {
        let msg = self.receive()?;
        if msg.kind() != KIND_OBJECT {
            return Err(Error::InvalidState(format!(
                "expected an object message, got kind {}",
                msg.kind()
            )));
        }
        Ok(msg.into_body())
    }
}

impl<S: ByteStream> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("xref", &self.xref.counts())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<S: ByteStream> Drop for Connection<S> {
    fn drop(&mut self) {
        self.close();
    }
}
