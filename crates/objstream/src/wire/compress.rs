// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pluggable compression codecs.
//!
//! Compressed payload layout:
//!
//! ```text
//! +---------------+------------------------+-----------------+
//! | algorithm u8  | uncompressed len u32BE | compressed data |
//! +---------------+------------------------+-----------------+
//! ```
//!
//! Algorithm id [`STORED_ID`] marks a body kept as-is. Codecs are looked up
//! by id in a [`CodecRegistry`], which every
//! [`StreamConfig`](crate::config::StreamConfig) carries.

use crate::config::{CompressionAlgorithm, CompressionSettings};
use crate::error::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// Size of the `[algorithm][uncompressed len]` prefix.
pub const COMPRESSED_HEADER_SIZE: usize = 5;

/// Algorithm id of an uncompressed body behind the usual prefix.
pub const STORED_ID: u8 = 0;

/// Compress/decompress collaborator.
pub trait Codec: Send + Sync {
    fn algorithm(&self) -> CompressionAlgorithm;

    fn compress(&self, data: &[u8], level: u8) -> Result<Vec<u8>>;

    /// Decompress; `expected_len` is the size recorded by the sender.
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// zlib codec backed by flate2.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zlib
    }

    fn compress(&self, data: &[u8], level: u8) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(u32::from(level)));
        encoder
            .write_all(data)
            .map_err(|e| Error::Compression(format!("zlib encode: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| Error::Compression(format!("zlib finish: {}", e)))
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(expected_len);
        // Cap output so a lying header cannot inflate without bound.
        ZlibDecoder::new(data)
            .take(expected_len as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| Error::Compression(format!("zlib decode: {}", e)))?;
        Ok(out)
    }
}

/// LZ4 block codec backed by lz4_flex.
#[cfg(feature = "lz4")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Codec;

#[cfg(feature = "lz4")]
impl Codec for Lz4Codec {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8], _level: u8) -> Result<Vec<u8>> {
        Ok(lz4_flex::block::compress(data))
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        lz4_flex::block::decompress(data, expected_len)
            .map_err(|e| Error::Compression(format!("lz4 decode: {}", e)))
    }
}

/// Codecs keyed by algorithm id.
///
/// The default registry holds zlib, plus LZ4 when the `lz4` feature is
/// enabled. Registering a codec under a taken id replaces the old one.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<u8, Arc<dyn Codec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut codecs: HashMap<u8, Arc<dyn Codec>> = HashMap::new();
        codecs.insert(CompressionAlgorithm::Zlib.id(), Arc::new(ZlibCodec));
        #[cfg(feature = "lz4")]
        codecs.insert(CompressionAlgorithm::Lz4.id(), Arc::new(Lz4Codec));
        Self { codecs }
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<u8> = self.codecs.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("CodecRegistry").field("ids", &ids).finish()
    }
}

impl CodecRegistry {
    /// Install `codec` under its algorithm id, returning the codec it replaced.
    pub fn register(&mut self, codec: Arc<dyn Codec>) -> Result<Option<Arc<dyn Codec>>> {
        let id = codec.algorithm().id();
        if id == STORED_ID {
            return Err(Error::Compression(format!(
                "algorithm id {} is reserved for stored bodies",
                STORED_ID
            )));
        }
        log::debug!("[COMPRESS] codec registered for algorithm id {}", id);
        Ok(self.codecs.insert(id, codec))
    }

    pub fn contains(&self, algorithm: CompressionAlgorithm) -> bool {
        self.codecs.contains_key(&algorithm.id())
    }

    /// Codec registered for `algorithm`.
    pub fn get(&self, algorithm: CompressionAlgorithm) -> Result<&dyn Codec> {
        match self.codecs.get(&algorithm.id()) {
            Some(codec) => Ok(codec.as_ref()),
            None if algorithm == CompressionAlgorithm::Lz4 => Err(Error::Compression(
                "lz4 support not compiled in (enable the `lz4` feature)".into(),
            )),
            None => Err(Error::Compression(format!(
                "no codec registered for algorithm id {}",
                algorithm.id()
            ))),
        }
    }

    /// Compress `data` into the prefixed layout.
    pub fn compress(&self, settings: CompressionSettings, data: &[u8]) -> Result<Vec<u8>> {
        let codec = self.get(settings.algorithm)?;
        let body = codec.compress(data, settings.level)?;
        prefixed(settings.algorithm.id(), data.len(), &body)
    }

    /// Prefixed layout holding `data` uncompressed.
    pub fn store(&self, data: &[u8]) -> Result<Vec<u8>> {
        prefixed(STORED_ID, data.len(), data)
    }

    /// Decompress a prefixed payload, checking the recorded size.
    pub fn decompress(&self, data: &[u8], max_len: usize) -> Result<Vec<u8>> {
        if data.len() < COMPRESSED_HEADER_SIZE {
            return Err(Error::Compression(format!(
                "compressed payload too short: {} bytes",
                data.len()
            )));
        }
        let expected = u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize;
        if expected > max_len {
            return Err(Error::FrameTooLarge {
                len: expected,
                max: max_len,
            });
        }
        let body = &data[COMPRESSED_HEADER_SIZE..];
        let out = match CompressionAlgorithm::from_id(data[0]) {
            None => body.to_vec(),
            Some(algorithm) => self.get(algorithm)?.decompress(body, expected)?,
        };
        if out.len() != expected {
            return Err(Error::Compression(format!(
                "size mismatch: header says {}, got {}",
                expected,
                out.len()
            )));
        }
        Ok(out)
    }
}

fn prefixed(id: u8, raw_len: usize, body: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(raw_len)
        .map_err(|_| Error::Compression("payload longer than u32::MAX".into()))?;
    let mut out = Vec::with_capacity(COMPRESSED_HEADER_SIZE + body.len());
    out.push(id);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(body);
    Ok(out)
}
