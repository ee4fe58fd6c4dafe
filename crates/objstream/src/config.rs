// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! objstream configuration - single source of truth for wire constants.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: wire constants (frame header, reserved kinds, flags)
//! - **Level 2 (Dynamic)**: [`StreamConfig`] for per-connection/per-file tuning
//!
//! # Example
//!
//! ```
//! use objstream::config::{CompressionAlgorithm, CompressionSettings, StreamConfig};
//!
//! let config = StreamConfig::default()
//!     .with_compression(CompressionSettings::new(CompressionAlgorithm::Zlib, 6))
//!     .with_member_wise(false);
//! assert_eq!(config.compression.packed(), 106);
//! ```

use crate::error::{Error, Result};
use crate::wire::compress::{Codec, CodecRegistry};
use std::sync::Arc;

// =======================================================================
// Framing
// =======================================================================

/// Frame header size (4-byte big-endian payload length).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Message kind tag size at the start of every payload.
pub const KIND_TAG_SIZE: usize = 4;

/// Default maximum message size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Literal acknowledgement token, written out-of-band (not framed).
pub const ACK_TOKEN: [u8; 2] = *b"ok";

// =======================================================================
// Message kinds
// =======================================================================

/// Ordinary opaque payload.
pub const KIND_PAYLOAD: u32 = 1;

/// Payload holding a serialized object record.
pub const KIND_OBJECT: u32 = 2;

/// Schema update: a batch of encoded class descriptors.
pub const KIND_SCHEMA_UPDATE: u32 = 5;

/// Identity update: a batch of identity token/label pairs.
pub const KIND_IDENTITY_UPDATE: u32 = 6;

/// Kinds below this value are reserved; unknown reserved kinds are protocol errors.
pub const KIND_USER_BASE: u32 = 100;

/// Request-acknowledgement bit OR-ed into a kind.
pub const FLAG_ACK: u32 = 0x1000_0000;

/// Payload body (after the kind tag) is compressed.
pub const FLAG_COMPRESSED: u32 = 0x2000_0000;

/// Mask removing all flag bits from a kind.
pub const KIND_MASK: u32 = 0x0FFF_FFFF;

// =======================================================================
// Object record markers
// =======================================================================

/// Class tag introducing a class name not yet seen in this buffer.
pub const NEW_CLASS_TAG: u32 = 0xFFFF_FFFF;

/// Pointer tag introducing an object not yet written in this buffer.
pub const NEW_OBJECT_TAG: u32 = 0xFFFF_FFFE;

/// Pointer tag for a null pointer.
pub const NULL_OBJECT_TAG: u32 = 0;

// =======================================================================
// Defaults
// =======================================================================

/// Payloads smaller than this are never compressed.
pub const DEFAULT_MIN_COMPRESS_SIZE: usize = 256;

/// Maximum nesting depth for embedded objects/pointers during streaming.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Compression algorithm identifiers (stable on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// zlib/deflate (flate2).
    Zlib,
    /// LZ4 block format (requires the `lz4` feature at runtime).
    Lz4,
    /// Application codec installed with [`StreamConfig::with_codec`].
    /// Ids 1 and 4 alias the built-ins; id 0 marks stored bodies.
    Custom(u8),
}

impl CompressionAlgorithm {
    /// Wire identifier, also the hundreds digit of the packed settings.
    pub fn id(self) -> u8 {
        match self {
            CompressionAlgorithm::Zlib => 1,
            CompressionAlgorithm::Lz4 => 4,
            CompressionAlgorithm::Custom(id) => id,
        }
    }

    /// `None` for the stored id 0.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => None,
            1 => Some(CompressionAlgorithm::Zlib),
            4 => Some(CompressionAlgorithm::Lz4),
            id => Some(CompressionAlgorithm::Custom(id)),
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "zlib" | "deflate" => Some(CompressionAlgorithm::Zlib),
            "lz4" => Some(CompressionAlgorithm::Lz4),
            _ => None,
        }
    }
}

/// Compression algorithm plus level. Level 0 disables compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub algorithm: CompressionAlgorithm,
    pub level: u8,
}

impl CompressionSettings {
    /// Compression off.
    pub const NONE: CompressionSettings = CompressionSettings {
        algorithm: CompressionAlgorithm::Zlib,
        level: 0,
    };

    pub fn new(algorithm: CompressionAlgorithm, level: u8) -> Self {
        Self {
            algorithm,
            level: level.min(9),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.level > 0
    }

    /// Packed form `algorithm * 100 + level`.
    pub fn packed(&self) -> u32 {
        if !self.is_enabled() {
            return 0;
        }
        u32::from(self.algorithm.id()) * 100 + u32::from(self.level)
    }

    /// Decode the packed form. Algorithm `0` selects zlib.
    pub fn from_packed(code: u32) -> Result<Self> {
        let level = (code % 100) as u8;
        let algorithm = match code / 100 {
            0 => CompressionAlgorithm::Zlib,
            id => u8::try_from(id)
                .ok()
                .and_then(CompressionAlgorithm::from_id)
                .ok_or_else(|| {
                    Error::Compression(format!("unknown compression algorithm in {}", code))
                })?,
        };
        Ok(Self::new(algorithm, level))
    }
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self::NONE
    }
}

/// Runtime configuration for one connection or file.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Anti-OOM limit on a single frame payload.
    pub max_message_size: usize,
    /// Compression applied to outgoing payloads.
    pub compression: CompressionSettings,
    /// Payloads below this size go out uncompressed.
    pub min_compress_size: usize,
    /// Allow member-wise streaming of homogeneous object collections.
    pub member_wise: bool,
    /// Build emulated layouts for classes the layout provider does not know.
    pub emulate_unknown: bool,
    /// Maximum nesting depth while streaming an object graph.
    pub max_depth: usize,
    /// Codecs available for compressing and decompressing payloads.
    pub codecs: CodecRegistry,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            compression: CompressionSettings::NONE,
            min_compress_size: DEFAULT_MIN_COMPRESS_SIZE,
            member_wise: true,
            emulate_unknown: true,
            max_depth: DEFAULT_MAX_DEPTH,
            codecs: CodecRegistry::default(),
        }
    }
}

impl StreamConfig {
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_compression(mut self, settings: CompressionSettings) -> Self {
        self.compression = settings;
        self
    }

    pub fn with_min_compress_size(mut self, size: usize) -> Self {
        self.min_compress_size = size;
        self
    }

    pub fn with_member_wise(mut self, enabled: bool) -> Self {
        self.member_wise = enabled;
        self
    }

    pub fn with_emulate_unknown(mut self, enabled: bool) -> Self {
        self.emulate_unknown = enabled;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Make `codec` available under its algorithm id.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Result<Self> {
        self.codecs.register(codec)?;
        Ok(self)
    }

    /// Apply `OBJSTREAM_*` environment overrides on top of `self`.
    ///
    /// Recognized: `OBJSTREAM_MAX_MESSAGE_SIZE`, `OBJSTREAM_COMPRESSION`
    /// (packed code), `OBJSTREAM_MIN_COMPRESS_SIZE`, `OBJSTREAM_MEMBER_WISE`,
    /// `OBJSTREAM_EMULATE_UNKNOWN`, `OBJSTREAM_MAX_DEPTH`.
    pub fn from_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OBJSTREAM_MAX_MESSAGE_SIZE") {
            self.max_message_size = parse_env("OBJSTREAM_MAX_MESSAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("OBJSTREAM_COMPRESSION") {
            self.compression =
                CompressionSettings::from_packed(parse_env("OBJSTREAM_COMPRESSION", &v)?)?;
        }
        if let Some(v) = lookup("OBJSTREAM_MIN_COMPRESS_SIZE") {
            self.min_compress_size = parse_env("OBJSTREAM_MIN_COMPRESS_SIZE", &v)?;
        }
        if let Some(v) = lookup("OBJSTREAM_MEMBER_WISE") {
            self.member_wise = parse_bool("OBJSTREAM_MEMBER_WISE", &v)?;
        }
        if let Some(v) = lookup("OBJSTREAM_EMULATE_UNKNOWN") {
            self.emulate_unknown = parse_bool("OBJSTREAM_EMULATE_UNKNOWN", &v)?;
        }
        if let Some(v) = lookup("OBJSTREAM_MAX_DEPTH") {
            self.max_depth = parse_env("OBJSTREAM_MAX_DEPTH", &v)?;
        }
        if self.max_depth != DEFAULT_MAX_DEPTH {
            log::debug!("[CONFIG] max_depth overridden to {}", self.max_depth);
        }
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidState(format!("{}: cannot parse {:?}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidState(format!(
            "{}: expected boolean, got {:?}",
            key, value
        ))),
    }
}

// =======================================================================
// YAML loader
// =======================================================================

#[cfg(feature = "config-loaders")]
pub use yaml::{YamlLoader, YamlStreamConfig};

#[cfg(feature = "config-loaders")]
mod yaml {
    //! YAML stream configuration loader.
    //!
    //! ```yaml
    //! max_message_size: 4194304
    //! compression:
    //!   algorithm: zlib
    //!   level: 6
    //! member_wise: false
    //! ```

    use super::{CompressionAlgorithm, CompressionSettings, StreamConfig};
    use crate::error::{Error, Result};
    use serde::Deserialize;
    use std::fs;
    use std::path::Path;

    /// YAML stream configuration loader.
    pub struct YamlLoader;

    /// Root YAML document. Every field is optional and overrides the default.
    #[derive(Debug, Deserialize, Default)]
    #[serde(default)]
    pub struct YamlStreamConfig {
        pub max_message_size: Option<usize>,
        pub compression: Option<YamlCompression>,
        pub min_compress_size: Option<usize>,
        pub member_wise: Option<bool>,
        pub emulate_unknown: Option<bool>,
        pub max_depth: Option<usize>,
    }

    /// Compression block: either structured or the packed integer code.
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum YamlCompression {
        Packed(u32),
        Structured { algorithm: String, level: u8 },
    }

    impl YamlLoader {
        /// Load configuration from a YAML file.
        pub fn load_file<P: AsRef<Path>>(path: P) -> Result<StreamConfig> {
            let content = fs::read_to_string(path.as_ref()).map_err(Error::Io)?;
            Self::load_str(&content)
        }

        /// Load configuration from a YAML string.
        pub fn load_str(content: &str) -> Result<StreamConfig> {
            let doc: YamlStreamConfig = serde_yaml::from_str(content)
                .map_err(|e| Error::InvalidState(format!("YAML parse error: {}", e)))?;
            doc.into_config()
        }
    }

    impl YamlStreamConfig {
        pub fn into_config(self) -> Result<StreamConfig> {
            let mut config = StreamConfig::default();
            if let Some(v) = self.max_message_size {
                config.max_message_size = v;
            }
            if let Some(c) = self.compression {
                config.compression = match c {
                    YamlCompression::Packed(code) => CompressionSettings::from_packed(code)?,
                    YamlCompression::Structured { algorithm, level } => {
                        let algo = CompressionAlgorithm::from_name(&algorithm).ok_or_else(|| {
                            Error::Compression(format!("unknown algorithm {:?}", algorithm))
                        })?;
                        CompressionSettings::new(algo, level)
                    }
                };
            }
            if let Some(v) = self.min_compress_size {
                config.min_compress_size = v;
            }
            if let Some(v) = self.member_wise {
                config.member_wise = v;
            }
            if let Some(v) = self.emulate_unknown {
                config.emulate_unknown = v;
            }
            if let Some(v) = self.max_depth {
                config.max_depth = v;
            }
            Ok(config)
        }
    }
}
