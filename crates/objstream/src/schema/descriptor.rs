// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Class descriptors and structural checksums.
//!
//! A [`ClassDescriptor`] is the immutable, per-class-version description of
//! what gets streamed. Its checksum is a pure function of the class name and
//! the ordered member list, so two descriptors built independently (in two
//! processes, or parsed from two differently formatted declarations) agree
//! on the checksum exactly when they are structurally interchangeable.
//!
//! # Checksum
//!
//! 32-bit FNV-1a over:
//!
//! ```text
//! class name, 0xFF
//! for each member:
//!     name, 0xFF, type code, array dimension (u32 BE), nested class name, 0xFF
//! ```
//!
//! The version number is not hashed. A version bump with unchanged members
//! still reads through a plain copy.

use super::member::{ElementKind, MemberDescriptor, MemberKind};
use super::primitive::PrimitiveKind;
use std::fmt;

const FNV1A_OFFSET_BASIS_32: u32 = 0x811c_9dc5;
const FNV1A_PRIME_32: u32 = 0x0100_0193;
const FIELD_SEPARATOR: u8 = 0xFF;

struct Fnv1a(u32);

impl Fnv1a {
    fn new() -> Self {
        Fnv1a(FNV1A_OFFSET_BASIS_32)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= u32::from(b);
            self.0 = self.0.wrapping_mul(FNV1A_PRIME_32);
        }
    }

    fn write_str(&mut self, s: &str) {
        self.write(s.as_bytes());
        self.write(&[FIELD_SEPARATOR]);
    }
}

/// Compute the structural checksum of a member list.
pub fn compute_checksum(class_name: &str, members: &[MemberDescriptor]) -> u32 {
    let mut h = Fnv1a::new();
    h.write_str(class_name);
    for m in members {
        h.write_str(&m.name);
        h.write(&[m.kind.type_code()]);
        h.write(&m.kind.array_len().to_be_bytes());
        h.write_str(m.kind.nested_class().unwrap_or(""));
    }
    h.0
}

/// Versioned, checksummed description of a class's serializable members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    name: String,
    version: u32,
    checksum: u32,
    members: Vec<MemberDescriptor>,
}

impl ClassDescriptor {
    /// Build a descriptor; the checksum is computed from `members`.
    pub fn new(name: impl Into<String>, version: u32, members: Vec<MemberDescriptor>) -> Self {
        let name = name.into();
        let checksum = compute_checksum(&name, &members);
        Self {
            name,
            version,
            checksum,
            members,
        }
    }

    /// Start a fluent builder.
    pub fn builder(name: impl Into<String>, version: u32) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.into(),
            version,
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    /// Find a member and its position by name.
    pub fn member(&self, name: &str) -> Option<(usize, &MemberDescriptor)> {
        self.members.iter().enumerate().find(|(_, m)| m.name == name)
    }

    /// Names of classes this descriptor depends on, in member order, deduplicated.
    pub fn nested_classes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for m in &self.members {
            if let Some(c) = m.kind.nested_class() {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// True when there is at least one member and every member is a
    /// primitive or a fixed array.
    ///
    /// Only such classes are eligible for member-wise collection streaming.
    pub fn is_flat(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(|m| m.kind.is_inline())
    }

    /// Bytes one instance occupies in a member-wise column set, if representable.
    pub fn column_width(&self) -> Option<usize> {
        self.members
            .iter()
            .try_fold(0usize, |acc, m| acc.checked_add(m.kind.checked_byte_len()?))
    }

    /// Same class, version and structure.
    pub fn is_identical(&self, other: &ClassDescriptor) -> bool {
        self == other
    }

    /// Copy of `self` under a different version number.
    pub fn with_version(&self, version: u32) -> ClassDescriptor {
        let mut d = self.clone();
        d.version = version;
        d
    }

    /// Pre-computed checksum, trusted as-is. Used by the codec after it verified the value.
    pub(crate) fn from_verified(
        name: String,
        version: u32,
        checksum: u32,
        members: Vec<MemberDescriptor>,
    ) -> Self {
        Self {
            name,
            version,
            checksum,
            members,
        }
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.name)?;
        let bases: Vec<&str> = self
            .members
            .iter()
            .filter_map(|m| match &m.kind {
                MemberKind::Base { class } => Some(class.as_str()),
                _ => None,
            })
            .collect();
        if !bases.is_empty() {
            write!(f, " : {}", bases.join(", "))?;
        }
        writeln!(f, " version {} {{", self.version)?;
        for m in &self.members {
            if !matches!(m.kind, MemberKind::Base { .. }) {
                writeln!(f, "    {};", m)?;
            }
        }
        write!(f, "}}")
    }
}

/// Fluent builder for [`ClassDescriptor`].
#[derive(Debug)]
pub struct DescriptorBuilder {
    name: String,
    version: u32,
    members: Vec<MemberDescriptor>,
}

impl DescriptorBuilder {
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    pub fn primitive(self, name: impl Into<String>, kind: PrimitiveKind) -> Self {
        self.member(MemberDescriptor::new(name, MemberKind::Primitive(kind)))
    }

    pub fn array(self, name: impl Into<String>, kind: PrimitiveKind, len: u32) -> Self {
        self.member(MemberDescriptor::new(
            name,
            MemberKind::FixedArray { kind, len },
        ))
    }

    pub fn text(self, name: impl Into<String>) -> Self {
        self.member(MemberDescriptor::new(name, MemberKind::Text))
    }

    pub fn object(self, name: impl Into<String>, class: impl Into<String>) -> Self {
        self.member(MemberDescriptor::new(
            name,
            MemberKind::Object {
                class: class.into(),
            },
        ))
    }

    pub fn pointer(self, name: impl Into<String>, class: impl Into<String>) -> Self {
        self.member(MemberDescriptor::new(
            name,
            MemberKind::Pointer {
                class: class.into(),
            },
        ))
    }

    pub fn reference(self, name: impl Into<String>) -> Self {
        self.member(MemberDescriptor::new(name, MemberKind::Reference))
    }

    pub fn collection(self, name: impl Into<String>, element: ElementKind) -> Self {
        self.member(MemberDescriptor::new(
            name,
            MemberKind::Collection { element },
        ))
    }

    /// Base-class slot; the member is named after the base class.
    pub fn base(self, class: impl Into<String>) -> Self {
        let class = class.into();
        self.member(MemberDescriptor::new(
            class.clone(),
            MemberKind::Base { class },
        ))
    }

    pub fn build(self) -> ClassDescriptor {
        ClassDescriptor::new(self.name, self.version, self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(version: u32) -> ClassDescriptor {
        ClassDescriptor::builder("Track", version)
            .primitive("id", PrimitiveKind::U32)
            .array("pos", PrimitiveKind::F64, 3)
            .text("label")
            .build()
    }

    #[test]
    fn test_checksum_ignores_version() {
        assert_eq!(track(1).checksum(), track(7).checksum());
        assert!(!track(1).is_identical(&track(7)));
    }

    #[test]
    fn test_checksum_tracks_structure() {
        let base = track(1).checksum();

        let renamed = ClassDescriptor::builder("Track", 1)
            .primitive("ident", PrimitiveKind::U32)
            .array("pos", PrimitiveKind::F64, 3)
            .text("label")
            .build();
        assert_ne!(renamed.checksum(), base);

        let retyped = ClassDescriptor::builder("Track", 1)
            .primitive("id", PrimitiveKind::U64)
            .array("pos", PrimitiveKind::F64, 3)
            .text("label")
            .build();
        assert_ne!(retyped.checksum(), base);

        let resized = ClassDescriptor::builder("Track", 1)
            .primitive("id", PrimitiveKind::U32)
            .array("pos", PrimitiveKind::F64, 4)
            .text("label")
            .build();
        assert_ne!(resized.checksum(), base);

        let reordered = ClassDescriptor::builder("Track", 1)
            .array("pos", PrimitiveKind::F64, 3)
            .primitive("id", PrimitiveKind::U32)
            .text("label")
            .build();
        assert_ne!(reordered.checksum(), base);
    }

    #[test]
    fn test_member_name_boundaries_matter() {
        // "ab"+"c" must not collide with "a"+"bc".
        let a = ClassDescriptor::builder("X", 1)
            .primitive("ab", PrimitiveKind::I8)
            .primitive("c", PrimitiveKind::I8)
            .build();
        let b = ClassDescriptor::builder("X", 1)
            .primitive("a", PrimitiveKind::I8)
            .primitive("bc", PrimitiveKind::I8)
            .build();
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_nested_classes_and_flatness() {
        let d = ClassDescriptor::builder("Event", 3)
            .base("Record")
            .pointer("parent", "Event")
            .collection("hits", ElementKind::Object("Hit".into()))
            .object("origin", "Record")
            .build();
        assert_eq!(d.nested_classes(), vec!["Record", "Event", "Hit"]);
        assert!(!d.is_flat());
        assert!(!ClassDescriptor::builder("Empty", 1).build().is_flat());
        assert!(track(1).members()[..2].iter().all(|m| m.kind.is_inline()));
    }

    #[test]
    fn test_display_lists_bases_in_header() {
        let d = ClassDescriptor::builder("Circle", 2)
            .base("Shape")
            .primitive("r", PrimitiveKind::F32)
            .build();
        let text = d.to_string();
        assert!(text.starts_with("class Circle : Shape version 2 {"));
        assert!(text.contains("f32 r;"));
    }
}
