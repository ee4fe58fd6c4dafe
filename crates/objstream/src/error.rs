// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Variants are grouped by how far an error propagates:
//!
//! - **Protocol** errors are fatal to the connection they occurred on.
//! - **Connection** errors mark the transport closed; retry is a caller concern.
//! - **Schema** errors abort the current object or message only.
//! - **Evolution** errors are configuration errors raised at rule registration.

use crate::wire::WireError;
use std::io;

/// Errors returned by objstream operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Frame length exceeds the configured maximum.
    FrameTooLarge { len: usize, max: usize },
    /// Frame is shorter than its mandatory header or otherwise malformed.
    MalformedFrame(String),
    /// A reserved message kind this peer does not understand.
    UnknownKind(u32),
    /// Compressed payload could not be decoded or its size did not match.
    Compression(String),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Peer closed, reset, or the pipe broke. The connection is now closed.
    ConnectionBroken,
    /// Underlying I/O failure that is not a broken connection.
    Io(io::Error),
    /// Expected the 2-byte `ok` token, got something else.
    BadAcknowledgement([u8; 2]),

    // ========================================================================
    // Schema Errors
    // ========================================================================
    /// No descriptor with this name and checksum is registered.
    UnknownClass { name: String, checksum: u32 },
    /// The layout provider cannot resolve this class and emulation is off.
    NoLayout(String),
    /// Encoded descriptor is invalid (bad kind code, checksum mismatch, ...).
    InvalidDescriptor(String),
    /// Class declaration text could not be parsed.
    Declaration { line: usize, reason: String },
    /// Object contents do not match what its descriptor promised.
    SchemaMismatch(String),
    /// Member name not present in the layout.
    NoSuchMember { class: String, member: String },

    // ========================================================================
    // Evolution (configuration) Errors
    // ========================================================================
    /// Two rules claim the same target member from the same source.
    AmbiguousRule { class: String, target: String },
    /// Rule is structurally invalid (no sources, unknown conversion, ...).
    InvalidRule(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// Buffer encode/decode failure.
    Wire(WireError),
    /// Persisted record failed its integrity check.
    Corrupted(String),
    /// Operation is not valid in the current state.
    InvalidState(String),
}

impl Error {
    /// True when the error leaves the connection unusable.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConnectionBroken
                | Error::Io(_)
                | Error::FrameTooLarge { .. }
                | Error::MalformedFrame(_)
                | Error::UnknownKind(_)
                | Error::Compression(_)
        )
    }

    /// True for the "connection broken" signal.
    pub fn is_connection_broken(&self) -> bool {
        matches!(self, Error::ConnectionBroken)
    }

    /// Map an I/O error from a stream operation.
    ///
    /// EOF, reset, abort and broken pipe collapse into [`Error::ConnectionBroken`].
    pub(crate) fn from_stream(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => Error::ConnectionBroken,
            io::ErrorKind::InvalidData => Error::MalformedFrame(err.to_string()),
            _ => Error::Io(err),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Protocol
            Error::FrameTooLarge { len, max } => {
                write!(f, "Frame too large: {} bytes (max {})", len, max)
            }
            Error::MalformedFrame(msg) => write!(f, "Malformed frame: {}", msg),
            Error::UnknownKind(kind) => write!(f, "Unknown message kind: {:#x}", kind),
            Error::Compression(msg) => write!(f, "Compression error: {}", msg),
            // Connection
            Error::ConnectionBroken => write!(f, "Connection broken"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::BadAcknowledgement(got) => {
                write!(f, "Bad acknowledgement: expected \"ok\", got {:02x?}", got)
            }
            // Schema
            Error::UnknownClass { name, checksum } => {
                write!(f, "Unknown class {} (checksum {:#010x})", name, checksum)
            }
            Error::NoLayout(name) => write!(f, "No in-memory layout for class {}", name),
            Error::InvalidDescriptor(msg) => write!(f, "Invalid descriptor: {}", msg),
            Error::Declaration { line, reason } => {
                write!(f, "Declaration error at line {}: {}", line, reason)
            }
            Error::SchemaMismatch(msg) => write!(f, "Schema mismatch: {}", msg),
            Error::NoSuchMember { class, member } => {
                write!(f, "Class {} has no member {}", class, member)
            }
            // Evolution
            Error::AmbiguousRule { class, target } => write!(
                f,
                "Ambiguous evolution rule: {}::{} already claimed from the same source",
                class, target
            ),
            Error::InvalidRule(msg) => write!(f, "Invalid evolution rule: {}", msg),
            // Data
            Error::Wire(e) => write!(f, "Wire error: {}", e),
            Error::Corrupted(msg) => write!(f, "Corrupted record: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Wire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WireError> for Error {
    fn from(err: WireError) -> Self {
        Error::Wire(err)
    }
}

/// Convenient alias for results using the crate [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
