// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Container file layout.
//!
//! ```text
//! +---------------------------------------------------------+
//! |                 File Header (40 bytes)                  |
//! |  Magic (8) | Version (4) | Flags (4) | DirOffset (8)    |
//! |  DirCount (4) | RecordCount (8) | Reserved (4)          |
//! +---------------------------------------------------------+
//! |  Record 0                                               |
//! |  PayloadLen (4) | CRC32 (4) | DirIndex (4) | Payload    |
//! +---------------------------------------------------------+
//! |  ...                                                    |
//! +---------------------------------------------------------+
//! |  Directory                                              |
//! |  ByteLen (4) | CRC32 (4) | descriptor list              |
//! +---------------------------------------------------------+
//! ```
//!
//! All integers are big-endian. A record payload is one object record as
//! produced by [`ObjectWriter`](crate::stream::ObjectWriter), compressed
//! when [`FLAG_COMPRESSED_RECORDS`] is set. `DirIndex` names the directory
//! entry of the record's root class.

use crate::error::{Error, Result};
use crate::schema::codec::{decode_descriptor_list, encode_descriptor_list};
use crate::schema::ClassDescriptor;
use crate::wire::WireBuffer;
use std::io::{Read, Write};

/// Magic bytes: "OBJSTRM\0"
pub const MAGIC: [u8; 8] = *b"OBJSTRM\0";

pub const FORMAT_VERSION: u32 = 1;

/// Record payloads carry the compressed-payload prefix.
pub const FLAG_COMPRESSED_RECORDS: u32 = 0x0000_0001;

pub(crate) fn read_u32<R: Read + ?Sized>(r: &mut R) -> std::io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_be_bytes(b))
}

pub(crate) fn read_u64<R: Read + ?Sized>(r: &mut R) -> std::io::Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_be_bytes(b))
}

/// File header (40 bytes, fixed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub flags: u32,
    /// Offset of the directory section; 0 until the file is finished.
    pub directory_offset: u64,
    pub directory_count: u32,
    pub record_count: u64,
}

impl FileHeader {
    pub const SIZE: usize = 40;

    pub fn new(flags: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            flags,
            directory_offset: 0,
            directory_count: 0,
            record_count: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.directory_offset != 0
    }

    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_all(&self.version.to_be_bytes())?;
        w.write_all(&self.flags.to_be_bytes())?;
        w.write_all(&self.directory_offset.to_be_bytes())?;
        w.write_all(&self.directory_count.to_be_bytes())?;
        w.write_all(&self.record_count.to_be_bytes())?;
        w.write_all(&0u32.to_be_bytes())
    }

    pub fn read<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic).map_err(Error::Io)?;
        if magic != MAGIC {
            return Err(Error::Corrupted("not an objstream file (bad magic)".into()));
        }
        let header = Self {
            version: read_u32(r).map_err(Error::Io)?,
            flags: read_u32(r).map_err(Error::Io)?,
            directory_offset: read_u64(r).map_err(Error::Io)?,
            directory_count: read_u32(r).map_err(Error::Io)?,
            record_count: read_u64(r).map_err(Error::Io)?,
        };
        let _reserved = read_u32(r).map_err(Error::Io)?;
        if header.version != FORMAT_VERSION {
            return Err(Error::Corrupted(format!(
                "format version {} (expected {})",
                header.version, FORMAT_VERSION
            )));
        }
        Ok(header)
    }
}

/// Per-record header (12 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub payload_len: u32,
    pub crc: u32,
    pub directory_index: u32,
}

impl RecordHeader {
    pub const SIZE: usize = 12;

    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.payload_len.to_be_bytes())?;
        w.write_all(&self.crc.to_be_bytes())?;
        w.write_all(&self.directory_index.to_be_bytes())
    }

    pub fn read<R: Read + ?Sized>(r: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            payload_len: read_u32(r)?,
            crc: read_u32(r)?,
            directory_index: read_u32(r)?,
        })
    }
}

/// Encode the directory section.
pub fn encode_directory(descriptors: &[std::sync::Arc<ClassDescriptor>]) -> Result<Vec<u8>> {
    let mut body = WireBuffer::new();
    encode_descriptor_list(&mut body, descriptors.iter().map(|d| d.as_ref()))?;
    let body = body.into_bytes();
    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&crc32fast::hash(&body).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode the directory section, verifying its CRC.
///
/// `max_len` bounds the section's byte length, `max_inline_size` the
/// inline size of each descriptor.
pub fn read_directory<R: Read + ?Sized>(
    r: &mut R,
    max_len: usize,
    max_inline_size: usize,
) -> Result<Vec<ClassDescriptor>> {
    let len = read_u32(r).map_err(Error::Io)? as usize;
    let crc = read_u32(r).map_err(Error::Io)?;
    if len > max_len {
        return Err(Error::Corrupted(format!(
            "directory of {} bytes exceeds limit {}",
            len, max_len
        )));
    }
    let mut body = vec![0u8; len];
    r.read_exact(&mut body).map_err(Error::Io)?;
    if crc32fast::hash(&body) != crc {
        return Err(Error::Corrupted("directory CRC mismatch".into()));
    }
    decode_descriptor_list(&mut WireBuffer::from_bytes(body), max_inline_size)
}
