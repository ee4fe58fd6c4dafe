// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Primitive kinds and scalar values.

use std::fmt;

/// Fixed-width primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 11] = [
        Self::Bool,
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::F32,
        Self::F64,
    ];

    /// Stable one-byte wire code (1..=11).
    pub fn code(self) -> u8 {
        match self {
            Self::Bool => 1,
            Self::I8 => 2,
            Self::U8 => 3,
            Self::I16 => 4,
            Self::U16 => 5,
            Self::I32 => 6,
            Self::U32 => 7,
            Self::I64 => 8,
            Self::U64 => 9,
            Self::F32 => 10,
            Self::F64 => 11,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }

    /// Size in bytes, both in memory and on the wire.
    pub fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// In-memory alignment (natural alignment).
    pub fn alignment(self) -> usize {
        self.size()
    }

    /// Declaration keyword (`i32`, `f64`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn is_integer(self) -> bool {
        !self.is_float() && self != Self::Bool
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// True when every value of `self` is exactly representable in `target`.
    ///
    /// Identity counts as widening. Narrowing and sign changes that lose
    /// values are rejected; those need an explicit cast rule.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        if self == target {
            return true;
        }
        if self == Self::Bool || target == Self::Bool {
            return false;
        }
        if self.is_integer() && target.is_integer() {
            // signed never widens to unsigned
            return !(self.is_signed() && !target.is_signed()) && target.size() > self.size();
        }
        if self.is_integer() && target.is_float() {
            return match target {
                Self::F32 => self.size() <= 2,
                _ => self.size() <= 4,
            };
        }
        self == Self::F32 && target == Self::F64
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

/// Dispatch `$body` with `$v` bound to the inner scalar of a non-bool value.
macro_rules! with_number {
    ($value:expr, $v:ident => $body:expr, bool $b:ident => $bool_body:expr) => {
        match $value {
            Value::Bool($b) => $bool_body,
            Value::I8($v) => $body,
            Value::U8($v) => $body,
            Value::I16($v) => $body,
            Value::U16($v) => $body,
            Value::I32($v) => $body,
            Value::U32($v) => $body,
            Value::I64($v) => $body,
            Value::U64($v) => $body,
            Value::F32($v) => $body,
            Value::F64($v) => $body,
        }
    };
}

impl Value {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::I8(_) => PrimitiveKind::I8,
            Value::U8(_) => PrimitiveKind::U8,
            Value::I16(_) => PrimitiveKind::I16,
            Value::U16(_) => PrimitiveKind::U16,
            Value::I32(_) => PrimitiveKind::I32,
            Value::U32(_) => PrimitiveKind::U32,
            Value::I64(_) => PrimitiveKind::I64,
            Value::U64(_) => PrimitiveKind::U64,
            Value::F32(_) => PrimitiveKind::F32,
            Value::F64(_) => PrimitiveKind::F64,
        }
    }

    /// Zero (or `false`) of the given kind.
    pub fn zero(kind: PrimitiveKind) -> Value {
        match kind {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::I8 => Value::I8(0),
            PrimitiveKind::U8 => Value::U8(0),
            PrimitiveKind::I16 => Value::I16(0),
            PrimitiveKind::U16 => Value::U16(0),
            PrimitiveKind::I32 => Value::I32(0),
            PrimitiveKind::U32 => Value::U32(0),
            PrimitiveKind::I64 => Value::I64(0),
            PrimitiveKind::U64 => Value::U64(0),
            PrimitiveKind::F32 => Value::F32(0.0),
            PrimitiveKind::F64 => Value::F64(0.0),
        }
    }

    /// Numeric view as `f64` (`true` is 1.0).
    pub fn as_f64(&self) -> f64 {
        with_number!(*self, v => v as f64, bool b => if b { 1.0 } else { 0.0 })
    }

    /// Numeric view as `i128`; floats truncate toward zero and saturate.
    pub fn as_i128(&self) -> i128 {
        match *self {
            Value::F32(v) => v as i128,
            Value::F64(v) => v as i128,
            other => with_number!(other, v => v as i128, bool b => i128::from(b)),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match *self {
            Value::Bool(b) => b,
            Value::F32(v) => v != 0.0,
            Value::F64(v) => v != 0.0,
            other => other.as_i128() != 0,
        }
    }

    /// Convert to `target` with `as`-cast semantics (wraps integers, saturates floats).
    pub fn convert_to(&self, target: PrimitiveKind) -> Value {
        if self.kind() == target {
            return *self;
        }
        if target == PrimitiveKind::Bool {
            return Value::Bool(self.is_truthy());
        }
        if self.kind().is_float() || target.is_float() {
            let f = self.as_f64();
            return match target {
                PrimitiveKind::I8 => Value::I8(f as i8),
                PrimitiveKind::U8 => Value::U8(f as u8),
                PrimitiveKind::I16 => Value::I16(f as i16),
                PrimitiveKind::U16 => Value::U16(f as u16),
                PrimitiveKind::I32 => Value::I32(f as i32),
                PrimitiveKind::U32 => Value::U32(f as u32),
                PrimitiveKind::I64 => Value::I64(f as i64),
                PrimitiveKind::U64 => Value::U64(f as u64),
                PrimitiveKind::F32 => Value::F32(f as f32),
                PrimitiveKind::F64 => Value::F64(f),
                PrimitiveKind::Bool => Value::Bool(f != 0.0),
            };
        }
        let i = self.as_i128();
        match target {
            PrimitiveKind::I8 => Value::I8(i as i8),
            PrimitiveKind::U8 => Value::U8(i as u8),
            PrimitiveKind::I16 => Value::I16(i as i16),
            PrimitiveKind::U16 => Value::U16(i as u16),
            PrimitiveKind::I32 => Value::I32(i as i32),
            PrimitiveKind::U32 => Value::U32(i as u32),
            PrimitiveKind::I64 => Value::I64(i as i64),
            PrimitiveKind::U64 => Value::U64(i as u64),
            PrimitiveKind::F32 => Value::F32(i as f32),
            PrimitiveKind::F64 => Value::F64(i as f64),
            PrimitiveKind::Bool => Value::Bool(i != 0),
        }
    }

    /// Decode from in-memory (little-endian) bytes. `bytes.len()` must equal the kind size.
    pub(crate) fn from_le_slice(kind: PrimitiveKind, bytes: &[u8]) -> Value {
        let mut raw = [0u8; 8];
        raw[..bytes.len()].copy_from_slice(bytes);
        match kind {
            PrimitiveKind::Bool => Value::Bool(raw[0] != 0),
            PrimitiveKind::I8 => Value::I8(raw[0] as i8),
            PrimitiveKind::U8 => Value::U8(raw[0]),
            PrimitiveKind::I16 => Value::I16(i16::from_le_bytes([raw[0], raw[1]])),
            PrimitiveKind::U16 => Value::U16(u16::from_le_bytes([raw[0], raw[1]])),
            PrimitiveKind::I32 => Value::I32(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            PrimitiveKind::U32 => Value::U32(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            PrimitiveKind::I64 => Value::I64(i64::from_le_bytes(raw)),
            PrimitiveKind::U64 => Value::U64(u64::from_le_bytes(raw)),
            PrimitiveKind::F32 => Value::F32(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            PrimitiveKind::F64 => Value::F64(f64::from_le_bytes(raw)),
        }
    }

    /// Encode into in-memory (little-endian) bytes. `out.len()` must equal the kind size.
    pub(crate) fn write_le(&self, out: &mut [u8]) {
        match *self {
            Value::Bool(v) => out[0] = u8::from(v),
            Value::I8(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::U8(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::I16(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::U16(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::I32(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::U32(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::I64(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::U64(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::F32(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::F64(v) => out.copy_from_slice(&v.to_le_bytes()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_number!(*self, v => write!(f, "{}", v), bool b => write!(f, "{}", b))
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool, i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32,
    u32 => U32, i64 => I64, u64 => U64, f32 => F32, f64 => F64,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique_and_roundtrip() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(PrimitiveKind::from_code(kind.code()), Some(kind));
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PrimitiveKind::from_code(0), None);
        assert_eq!(PrimitiveKind::from_code(12), None);
    }

    #[test]
    fn test_widening_relation() {
        use PrimitiveKind::*;
        assert!(I16.widens_to(I32));
        assert!(U16.widens_to(U64));
        assert!(U16.widens_to(I32));
        assert!(!U32.widens_to(I32));
        assert!(!I32.widens_to(U64));
        assert!(!I32.widens_to(I16));
        assert!(I16.widens_to(F32));
        assert!(!I32.widens_to(F32));
        assert!(I32.widens_to(F64));
        assert!(!I64.widens_to(F64));
        assert!(F32.widens_to(F64));
        assert!(!F64.widens_to(F32));
        assert!(!Bool.widens_to(I32));
        assert!(Bool.widens_to(Bool));
    }

    #[test]
    fn test_convert_semantics() {
        assert_eq!(Value::I32(-1).convert_to(PrimitiveKind::I64), Value::I64(-1));
        assert_eq!(Value::I32(300).convert_to(PrimitiveKind::U8), Value::U8(44));
        assert_eq!(Value::F64(2.9).convert_to(PrimitiveKind::I32), Value::I32(2));
        assert_eq!(Value::F64(1e12).convert_to(PrimitiveKind::I32), Value::I32(i32::MAX));
        assert_eq!(Value::U8(7).convert_to(PrimitiveKind::F32), Value::F32(7.0));
        assert_eq!(Value::I16(0).convert_to(PrimitiveKind::Bool), Value::Bool(false));
        assert_eq!(Value::Bool(true).convert_to(PrimitiveKind::U16), Value::U16(1));
    }

    #[test]
    fn test_le_storage_roundtrip() {
        let values = [
            Value::I16(-2),
            Value::U32(0xdead_beef),
            Value::F64(-0.5),
            Value::Bool(true),
        ];
        for v in values {
            let mut buf = vec![0u8; v.kind().size()];
            v.write_le(&mut buf);
            assert_eq!(Value::from_le_slice(v.kind(), &buf), v);
        }
    }
}
