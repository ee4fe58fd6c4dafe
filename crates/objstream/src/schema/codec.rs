// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary encoding of class descriptors.
//!
//! Used by schema-update messages and the file directory:
//!
//! ```text
//! name: str | version: u32 | checksum: u32 | member count: u32
//! per member: name: str | type code: u8 | array dim: u32 | nested class: str
//! ```

use super::descriptor::{compute_checksum, ClassDescriptor};
use super::member::{MemberDescriptor, MemberKind};
use crate::error::{Error, Result};
use crate::wire::WireBuffer;

/// Append one descriptor.
pub fn encode_descriptor(buf: &mut WireBuffer, desc: &ClassDescriptor) -> Result<()> {
    buf.write_str(desc.name())?;
    buf.write_u32(desc.version())?;
    buf.write_u32(desc.checksum())?;
    buf.write_u32(desc.members().len() as u32)?;
    for m in desc.members() {
        buf.write_str(&m.name)?;
        buf.write_u8(m.kind.type_code())?;
        buf.write_u32(m.kind.array_len())?;
        buf.write_str(m.kind.nested_class().unwrap_or(""))?;
    }
    Ok(())
}

/// Read one descriptor, verifying its checksum.
///
/// Inline members (and their sum) larger than `max_inline_size` bytes are
/// rejected before any layout is built from them.
pub fn decode_descriptor(buf: &mut WireBuffer, max_inline_size: usize) -> Result<ClassDescriptor> {
    let name = buf.read_str()?;
    let version = buf.read_u32()?;
    let checksum = buf.read_u32()?;
    let count = buf.read_u32()? as usize;
    // Each member takes at least 13 bytes; refuse counts the buffer cannot hold.
    if count > buf.remaining() / 13 {
        return Err(Error::InvalidDescriptor(format!(
            "{}: member count {} exceeds remaining data",
            name, count
        )));
    }
    let mut members: Vec<MemberDescriptor> = Vec::with_capacity(count);
    for _ in 0..count {
        let member_name = buf.read_str()?;
        let code = buf.read_u8()?;
        let array_len = buf.read_u32()?;
        let class = buf.read_str()?;
        let kind = MemberKind::from_parts(code, array_len, &class).ok_or_else(|| {
            Error::InvalidDescriptor(format!(
                "{}::{}: unknown type code {:#04x}",
                name, member_name, code
            ))
        })?;
        if members.iter().any(|m| m.name == member_name) {
            return Err(Error::InvalidDescriptor(format!(
                "{}: duplicate member {}",
                name, member_name
            )));
        }
        if !kind
            .checked_byte_len()
            .is_some_and(|len| len <= max_inline_size)
        {
            return Err(Error::InvalidDescriptor(format!(
                "{}::{}: inline size exceeds limit {}",
                name, member_name, max_inline_size
            )));
        }
        members.push(MemberDescriptor::new(member_name, kind));
    }
    let inline = members
        .iter()
        .try_fold(0usize, |acc, m| acc.checked_add(m.kind.checked_byte_len()?));
    if !inline.is_some_and(|len| len <= max_inline_size) {
        return Err(Error::InvalidDescriptor(format!(
            "{} v{}: inline members exceed limit {}",
            name, version, max_inline_size
        )));
    }
    let computed = compute_checksum(&name, &members);
    if computed != checksum {
        return Err(Error::InvalidDescriptor(format!(
            "{} v{}: stored checksum {:#010x} != computed {:#010x}",
            name, version, checksum, computed
        )));
    }
    Ok(ClassDescriptor::from_verified(name, version, checksum, members))
}

/// Count-prefixed descriptor list.
pub fn encode_descriptor_list<'a, I>(buf: &mut WireBuffer, descriptors: I) -> Result<()>
where
    I: IntoIterator<Item = &'a ClassDescriptor>,
    I::IntoIter: ExactSizeIterator,
{
    let iter = descriptors.into_iter();
    buf.write_u32(iter.len() as u32)?;
    for d in iter {
        encode_descriptor(buf, d)?;
    }
    Ok(())
}

pub fn decode_descriptor_list(
    buf: &mut WireBuffer,
    max_inline_size: usize,
) -> Result<Vec<ClassDescriptor>> {
    let count = buf.read_u32()? as usize;
    let mut out = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        out.push(decode_descriptor(buf, max_inline_size)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_MESSAGE_SIZE as LIMIT;
    use crate::schema::{ElementKind, PrimitiveKind};

    fn sample() -> ClassDescriptor {
        ClassDescriptor::builder("Event", 5)
            .base("Record")
            .primitive("run", PrimitiveKind::U32)
            .array("vertex", PrimitiveKind::F32, 3)
            .collection("hits", ElementKind::Object("Hit".into()))
            .pointer("prev", "Event")
            .reference("owner")
            .build()
    }

    #[test]
    fn test_decode_reproduces_descriptor() {
        let d = sample();
        let mut buf = WireBuffer::new();
        encode_descriptor(&mut buf, &d).unwrap();
        let mut rd = WireBuffer::from_bytes(buf.into_bytes());
        let back = decode_descriptor(&mut rd, LIMIT).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.checksum(), d.checksum());
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn test_tampered_checksum_is_rejected() {
        let mut buf = WireBuffer::new();
        encode_descriptor(&mut buf, &sample()).unwrap();
        let mut bytes = buf.into_bytes();
        // name "Event" = 4 + 5 bytes, version = 4 bytes, then checksum
        bytes[13] ^= 0x01;
        let err = decode_descriptor(&mut WireBuffer::from_bytes(bytes), LIMIT).unwrap_err();
        assert!(matches!(err, Error::InvalidDescriptor(_)));
    }

    #[test]
    fn test_list_and_truncation() {
        let a = sample();
        let b = ClassDescriptor::builder("Hit", 1)
            .primitive("e", PrimitiveKind::F64)
            .build();
        let mut buf = WireBuffer::new();
        encode_descriptor_list(&mut buf, [&a, &b]).unwrap();
        let bytes = buf.into_bytes();

        let list = decode_descriptor_list(&mut WireBuffer::from_bytes(bytes.clone()), LIMIT).unwrap();
        assert_eq!(list, vec![a, b]);

        let truncated = bytes[..bytes.len() - 3].to_vec();
        assert!(decode_descriptor_list(&mut WireBuffer::from_bytes(truncated), LIMIT).is_err());
    }

    #[test]
    fn test_oversized_inline_members_are_rejected() {
        let huge = ClassDescriptor::builder("Big", 1)
            .array("x", PrimitiveKind::F64, u32::MAX)
            .build();
        let mut buf = WireBuffer::new();
        encode_descriptor(&mut buf, &huge).unwrap();
        let bytes = buf.into_bytes();
        assert!(bytes.len() < 64);
        assert!(matches!(
            decode_descriptor(&mut WireBuffer::from_bytes(bytes), LIMIT),
            Err(Error::InvalidDescriptor(_))
        ));

        // Each array fits alone; together they do not.
        let wide = ClassDescriptor::builder("Wide", 1)
            .array("a", PrimitiveKind::U8, 600)
            .array("b", PrimitiveKind::U8, 600)
            .build();
        let mut buf = WireBuffer::new();
        encode_descriptor(&mut buf, &wide).unwrap();
        let bytes = buf.into_bytes();
        assert!(decode_descriptor(&mut WireBuffer::from_bytes(bytes.clone()), 1000).is_err());
        assert_eq!(
            decode_descriptor(&mut WireBuffer::from_bytes(bytes), 1200).unwrap(),
            wide
        );
    }
}
