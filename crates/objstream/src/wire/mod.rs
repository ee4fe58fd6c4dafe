// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire buffer, compression codecs and kind-tagged messages.

pub mod buffer;
pub mod compress;
pub mod message;

pub use buffer::{Placeholder, WireBuffer};
pub use compress::{Codec, CodecRegistry, ZlibCodec};
#[cfg(feature = "lz4")]
pub use compress::Lz4Codec;
pub use message::Message;

use std::fmt;

/// Wire buffer encode/decode error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    WriteFailed { offset: usize, reason: String },
    ReadFailed { offset: usize, reason: String },
    InvalidData { offset: usize, reason: String },
    /// Mode or ordering violation by the caller.
    Misuse { reason: &'static str },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::WriteFailed { offset, reason } => {
                write!(f, "write failed at offset {}: {}", offset, reason)
            }
            WireError::ReadFailed { offset, reason } => {
                write!(f, "read failed at offset {}: {}", offset, reason)
            }
            WireError::InvalidData { offset, reason } => {
                write!(f, "invalid data at offset {}: {}", offset, reason)
            }
            WireError::Misuse { reason } => write!(f, "buffer misuse: {}", reason),
        }
    }
}

impl std::error::Error for WireError {}

pub type WireResult<T> = core::result::Result<T, WireError>;
