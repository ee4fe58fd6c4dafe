// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Growable wire buffer with big-endian primitive encoding.
//!
//! A buffer is either in write mode (append-only) or read mode (strictly
//! sequential). Using a read operation on a write buffer, or the other way
//! round, is a programming error reported as [`WireError::Misuse`].

use super::{WireError, WireResult};
use crate::config::FRAME_HEADER_SIZE;
use crate::schema::{PrimitiveKind, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Write,
    Read,
}

/// Reserved 4-byte slot in a write buffer, filled later.
///
/// The only sanctioned way to touch bytes behind the write cursor.
#[derive(Debug)]
#[must_use = "a reserved slot must be filled"]
pub struct Placeholder {
    offset: usize,
}

/// Generate big-endian write methods.
///
/// Each generated method checks the mode, then appends `to_be_bytes()`.
macro_rules! impl_write_be {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) -> WireResult<()> {
            self.require(Mode::Write)?;
            self.data.extend_from_slice(&value.to_be_bytes());
            Ok(())
        }
    };
}

/// Generate big-endian read methods.
///
/// Each generated method checks the mode and bounds, then advances the cursor.
macro_rules! impl_read_be {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> WireResult<$type> {
            let bytes = self.take($size)?;
            let mut raw = [0u8; $size];
            raw.copy_from_slice(bytes);
            Ok(<$type>::from_be_bytes(raw))
        }
    };
}

/// Wire buffer. See module docs.
#[derive(Debug, Clone)]
pub struct WireBuffer {
    data: Vec<u8>,
    pos: usize,
    mode: Mode,
}

impl Default for WireBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl WireBuffer {
    /// Empty buffer in write mode.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            pos: 0,
            mode: Mode::Write,
        }
    }

    /// Buffer in read mode over `data`.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            mode: Mode::Read,
        }
    }

    pub fn is_reading(&self) -> bool {
        self.mode == Mode::Read
    }

    /// Bytes written so far (write mode) or cursor offset (read mode).
    pub fn position(&self) -> usize {
        match self.mode {
            Mode::Write => self.data.len(),
            Mode::Read => self.pos,
        }
    }

    /// Unread bytes left (read mode).
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn require(&self, mode: Mode) -> WireResult<()> {
        if self.mode == mode {
            return Ok(());
        }
        Err(WireError::Misuse {
            reason: match mode {
                Mode::Write => "write on a read-mode buffer",
                Mode::Read => "read on a write-mode buffer",
            },
        })
    }

    fn take(&mut self, n: usize) -> WireResult<&[u8]> {
        self.require(Mode::Read)?;
        if n > self.remaining() {
            return Err(WireError::ReadFailed {
                offset: self.pos,
                reason: format!("need {} bytes, {} left", n, self.remaining()),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }

    // ---------------------------------------------------------------------
    // Write side
    // ---------------------------------------------------------------------

    impl_write_be!(write_u16, u16);
    impl_write_be!(write_u32, u32);
    impl_write_be!(write_u64, u64);
    impl_write_be!(write_i32, i32);

    pub fn write_u8(&mut self, value: u8) -> WireResult<()> {
        self.require(Mode::Write)?;
        self.data.push(value);
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> WireResult<()> {
        self.require(Mode::Write)?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Length-prefixed UTF-8 string (`u32` length, then bytes).
    pub fn write_str(&mut self, s: &str) -> WireResult<()> {
        let len = u32::try_from(s.len()).map_err(|_| WireError::WriteFailed {
            offset: self.position(),
            reason: "string longer than u32::MAX".into(),
        })?;
        self.write_u32(len)?;
        self.write_bytes(s.as_bytes())
    }

    /// One primitive value in network byte order.
    pub fn write_primitive(&mut self, value: Value) -> WireResult<()> {
        self.require(Mode::Write)?;
        match value {
            Value::Bool(v) => self.data.push(u8::from(v)),
            Value::I8(v) => self.data.extend_from_slice(&v.to_be_bytes()),
            Value::U8(v) => self.data.push(v),
            Value::I16(v) => self.data.extend_from_slice(&v.to_be_bytes()),
            Value::U16(v) => self.data.extend_from_slice(&v.to_be_bytes()),
            Value::I32(v) => self.data.extend_from_slice(&v.to_be_bytes()),
            Value::U32(v) => self.data.extend_from_slice(&v.to_be_bytes()),
            Value::I64(v) => self.data.extend_from_slice(&v.to_be_bytes()),
            Value::U64(v) => self.data.extend_from_slice(&v.to_be_bytes()),
            Value::F32(v) => self.data.extend_from_slice(&v.to_be_bytes()),
            Value::F64(v) => self.data.extend_from_slice(&v.to_be_bytes()),
        }
        Ok(())
    }

    /// Append `memory.len() / kind.size()` elements stored in memory order (little-endian).
    ///
    /// Byte-swaps each element into network order in one pass.
    pub fn write_array(&mut self, kind: PrimitiveKind, memory: &[u8]) -> WireResult<()> {
        self.require(Mode::Write)?;
        let size = kind.size();
        if memory.len() % size != 0 {
            return Err(WireError::WriteFailed {
                offset: self.data.len(),
                reason: format!("{} bytes is not a whole number of {}", memory.len(), kind),
            });
        }
        if size == 1 {
            self.data.extend_from_slice(memory);
            return Ok(());
        }
        self.data.reserve(memory.len());
        for elem in memory.chunks_exact(size) {
            self.data.extend(elem.iter().rev());
        }
        Ok(())
    }

    /// Reserve a `u32` slot to be filled once its value is known.
    pub fn reserve_u32(&mut self) -> WireResult<Placeholder> {
        self.require(Mode::Write)?;
        let offset = self.data.len();
        self.data.extend_from_slice(&[0u8; 4]);
        Ok(Placeholder { offset })
    }

    /// Fill a slot obtained from [`reserve_u32`](Self::reserve_u32).
    pub fn fill_u32(&mut self, slot: Placeholder, value: u32) -> WireResult<()> {
        self.require(Mode::Write)?;
        let end = slot.offset + 4;
        if end > self.data.len() {
            return Err(WireError::Misuse {
                reason: "placeholder does not belong to this buffer",
            });
        }
        self.data[slot.offset..end].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Bytes written since `slot` was reserved, excluding the slot itself.
    pub fn bytes_since(&self, slot: &Placeholder) -> usize {
        self.data.len().saturating_sub(slot.offset + 4)
    }

    /// Prepend the 4-byte big-endian length header and return the frame.
    pub fn finalize(self) -> WireResult<Vec<u8>> {
        self.require(Mode::Write)?;
        let len = u32::try_from(self.data.len()).map_err(|_| WireError::WriteFailed {
            offset: 0,
            reason: "payload longer than u32::MAX".into(),
        })?;
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + self.data.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&self.data);
        Ok(frame)
    }

    // ---------------------------------------------------------------------
    // Read side
    // ---------------------------------------------------------------------

    impl_read_be!(read_u16, u16, 2);
    impl_read_be!(read_u32, u32, 4);
    impl_read_be!(read_u64, u64, 8);
    impl_read_be!(read_i32, i32, 4);

    pub fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bytes(&mut self, n: usize) -> WireResult<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    /// Advance the cursor without decoding.
    pub fn skip(&mut self, n: usize) -> WireResult<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_str(&mut self) -> WireResult<String> {
        let len = self.read_u32()? as usize;
        let offset = self.pos;
        let bytes = self.take(len)?.to_vec();
        String::from_utf8(bytes).map_err(|_| WireError::InvalidData {
            offset,
            reason: "string is not valid UTF-8".into(),
        })
    }

    pub fn read_primitive(&mut self, kind: PrimitiveKind) -> WireResult<Value> {
        let bytes = self.take(kind.size())?;
        let mut raw = [0u8; 8];
        // big-endian to little-endian
        for (dst, src) in raw.iter_mut().zip(bytes.iter().rev()) {
            *dst = *src;
        }
        Ok(Value::from_le_slice(kind, &raw[..kind.size()]))
    }

    /// Read `count` elements into memory order (little-endian).
    pub fn read_array(&mut self, kind: PrimitiveKind, count: usize) -> WireResult<Vec<u8>> {
        let mut out = vec![0u8; count * kind.size()];
        self.read_array_into(kind, &mut out)?;
        Ok(out)
    }

    /// Fill `memory` with `memory.len() / kind.size()` elements.
    pub fn read_array_into(&mut self, kind: PrimitiveKind, memory: &mut [u8]) -> WireResult<()> {
        let size = kind.size();
        let bytes = self.take(memory.len())?;
        if size == 1 {
            memory.copy_from_slice(bytes);
            return Ok(());
        }
        for (dst, src) in memory.chunks_exact_mut(size).zip(bytes.chunks_exact(size)) {
            for (d, s) in dst.iter_mut().zip(src.iter().rev()) {
                *d = *s;
            }
        }
        Ok(())
    }
}
