// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Member descriptors.

use super::primitive::PrimitiveKind;
use std::fmt;

/// Element type of an owned collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Primitive(PrimitiveKind),
    Text,
    Object(String),
}

/// Declared type of a serializable member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Single primitive value.
    Primitive(PrimitiveKind),
    /// Fixed-length array of primitives.
    FixedArray { kind: PrimitiveKind, len: u32 },
    /// Length-prefixed UTF-8 string.
    Text,
    /// Object embedded by value.
    Object { class: String },
    /// Owning or aliasing pointer to an object in the same graph. May be null.
    Pointer { class: String },
    /// Reference to an object in another graph, by identity token.
    Reference,
    /// Owned variable-length collection.
    Collection { element: ElementKind },
    /// Base-class slot, streamed like an embedded object.
    Base { class: String },
}

// Type codes. Primitive-bearing kinds carry the primitive code in the low bits.
const CODE_ARRAY_BASE: u8 = 0x20;
const CODE_COLLECTION_BASE: u8 = 0x40;
const CODE_COLLECTION_TEXT: u8 = 0x60;
const CODE_COLLECTION_OBJECT: u8 = 0x61;
const CODE_TEXT: u8 = 0x70;
const CODE_OBJECT: u8 = 0x71;
const CODE_POINTER: u8 = 0x72;
const CODE_REFERENCE: u8 = 0x73;
const CODE_BASE: u8 = 0x74;

impl MemberKind {
    /// Stable one-byte type code, part of the checksum and descriptor encoding.
    pub fn type_code(&self) -> u8 {
        match self {
            MemberKind::Primitive(k) => k.code(),
            MemberKind::FixedArray { kind, .. } => CODE_ARRAY_BASE + kind.code(),
            MemberKind::Collection { element } => match element {
                ElementKind::Primitive(k) => CODE_COLLECTION_BASE + k.code(),
                ElementKind::Text => CODE_COLLECTION_TEXT,
                ElementKind::Object(_) => CODE_COLLECTION_OBJECT,
            },
            MemberKind::Text => CODE_TEXT,
            MemberKind::Object { .. } => CODE_OBJECT,
            MemberKind::Pointer { .. } => CODE_POINTER,
            MemberKind::Reference => CODE_REFERENCE,
            MemberKind::Base { .. } => CODE_BASE,
        }
    }

    /// Rebuild a kind from its encoded parts.
    pub fn from_parts(code: u8, array_len: u32, class: &str) -> Option<MemberKind> {
        let owned = || class.to_string();
        let kind = match code {
            1..=11 => MemberKind::Primitive(PrimitiveKind::from_code(code)?),
            c if c > CODE_ARRAY_BASE && c <= CODE_ARRAY_BASE + 11 => MemberKind::FixedArray {
                kind: PrimitiveKind::from_code(c - CODE_ARRAY_BASE)?,
                len: array_len,
            },
            c if c > CODE_COLLECTION_BASE && c <= CODE_COLLECTION_BASE + 11 => {
                MemberKind::Collection {
                    element: ElementKind::Primitive(PrimitiveKind::from_code(
                        c - CODE_COLLECTION_BASE,
                    )?),
                }
            }
            CODE_COLLECTION_TEXT => MemberKind::Collection {
                element: ElementKind::Text,
            },
            CODE_COLLECTION_OBJECT => MemberKind::Collection {
                element: ElementKind::Object(owned()),
            },
            CODE_TEXT => MemberKind::Text,
            CODE_OBJECT => MemberKind::Object { class: owned() },
            CODE_POINTER => MemberKind::Pointer { class: owned() },
            CODE_REFERENCE => MemberKind::Reference,
            CODE_BASE => MemberKind::Base { class: owned() },
            _ => return None,
        };
        Some(kind)
    }

    /// Fixed array dimension, 0 for everything else.
    pub fn array_len(&self) -> u32 {
        match self {
            MemberKind::FixedArray { len, .. } => *len,
            _ => 0,
        }
    }

    /// Name of the nested class, if any.
    pub fn nested_class(&self) -> Option<&str> {
        match self {
            MemberKind::Object { class }
            | MemberKind::Pointer { class }
            | MemberKind::Base { class } => Some(class.as_str()),
            MemberKind::Collection {
                element: ElementKind::Object(class),
            } => Some(class.as_str()),
            _ => None,
        }
    }

    /// Primitive element kind for primitive and fixed-array members.
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            MemberKind::Primitive(k) | MemberKind::FixedArray { kind: k, .. } => Some(*k),
            _ => None,
        }
    }

    /// True for members stored inline (primitive or fixed array).
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            MemberKind::Primitive(_) | MemberKind::FixedArray { .. }
        )
    }

    /// Inline byte length, 0 for slot members. Saturates on overflow.
    pub fn byte_len(&self) -> usize {
        self.checked_byte_len().unwrap_or(usize::MAX)
    }

    /// Inline byte length, `None` if it does not fit in `usize`.
    pub fn checked_byte_len(&self) -> Option<usize> {
        match self {
            MemberKind::Primitive(k) => Some(k.size()),
            MemberKind::FixedArray { kind, len } => {
                kind.size().checked_mul(usize::try_from(*len).ok()?)
            }
            _ => Some(0),
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Primitive(k) => write!(f, "{}", k),
            MemberKind::FixedArray { kind, len } => write!(f, "{}[{}]", kind, len),
            MemberKind::Text => f.write_str("string"),
            MemberKind::Object { class } => f.write_str(class),
            MemberKind::Pointer { class } => write!(f, "{}*", class),
            MemberKind::Reference => f.write_str("ref"),
            MemberKind::Collection { element } => match element {
                ElementKind::Primitive(k) => write!(f, "vec<{}>", k),
                ElementKind::Text => f.write_str("vec<string>"),
                ElementKind::Object(c) => write!(f, "vec<{}>", c),
            },
            MemberKind::Base { class } => write!(f, "base {}", class),
        }
    }
}

/// One serializable member of a class. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: MemberKind,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MemberKind::Base { class } => write!(f, ": {}", class),
            MemberKind::FixedArray { kind, len } => write!(f, "{} {}[{}]", kind, self.name, len),
            kind => write!(f, "{} {}", kind, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_roundtrip_through_parts() {
        let kinds = vec![
            MemberKind::Primitive(PrimitiveKind::U16),
            MemberKind::FixedArray {
                kind: PrimitiveKind::F64,
                len: 3,
            },
            MemberKind::Collection {
                element: ElementKind::Primitive(PrimitiveKind::I8),
            },
            MemberKind::Collection {
                element: ElementKind::Text,
            },
            MemberKind::Collection {
                element: ElementKind::Object("Hit".into()),
            },
            MemberKind::Text,
            MemberKind::Object {
                class: "Vec3".into(),
            },
            MemberKind::Pointer {
                class: "Node".into(),
            },
            MemberKind::Reference,
            MemberKind::Base {
                class: "Shape".into(),
            },
        ];
        for kind in kinds {
            let class = kind.nested_class().unwrap_or("");
            let rebuilt = MemberKind::from_parts(kind.type_code(), kind.array_len(), class);
            assert_eq!(rebuilt.as_ref(), Some(&kind), "kind {}", kind);
        }
        assert_eq!(MemberKind::from_parts(0x7f, 0, ""), None);
    }

    #[test]
    fn test_inline_sizes() {
        let arr = MemberKind::FixedArray {
            kind: PrimitiveKind::I32,
            len: 4,
        };
        assert!(arr.is_inline());
        assert_eq!(arr.byte_len(), 16);
        assert!(!MemberKind::Text.is_inline());
        assert_eq!(MemberKind::Text.byte_len(), 0);
    }
}
