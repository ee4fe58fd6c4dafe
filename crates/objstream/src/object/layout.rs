// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory layouts.
//!
//! A layout maps each member of the current class descriptor to storage:
//! primitives and fixed arrays live in the object's inline byte block at a
//! naturally aligned offset, everything else in an indexed slot.

use crate::error::{Error, Result};
use crate::schema::{ClassDescriptor, MemberKind};
use std::sync::Arc;

/// Where a member lives inside an [`Object`](super::Object).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Byte offset into the inline block.
    Inline { offset: usize },
    /// Index into the slot vector.
    Slot { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    pub kind: MemberKind,
    pub storage: Storage,
}

impl FieldLayout {
    pub fn offset(&self) -> Option<usize> {
        match self.storage {
            Storage::Inline { offset } => Some(offset),
            Storage::Slot { .. } => None,
        }
    }

    pub fn slot(&self) -> Option<usize> {
        match self.storage {
            Storage::Slot { index } => Some(index),
            Storage::Inline { .. } => None,
        }
    }
}

/// Current in-memory layout of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    descriptor: Arc<ClassDescriptor>,
    fields: Vec<FieldLayout>,
    inline_size: usize,
    slot_count: usize,
    emulated: bool,
}

impl Layout {
    /// Lay out `descriptor` in declaration order with natural alignment.
    ///
    /// Fails when the inline block would not fit in `usize`.
    pub fn from_descriptor(descriptor: Arc<ClassDescriptor>) -> Result<Self> {
        let mut fields = Vec::with_capacity(descriptor.members().len());
        let mut offset = 0usize;
        let mut max_align = 1usize;
        let mut slot_count = 0usize;

        for m in descriptor.members() {
            let storage = match m.kind.primitive() {
                Some(prim) if m.kind.is_inline() => {
                    let align = prim.alignment();
                    max_align = max_align.max(align);
                    offset = align_up(offset, align).ok_or_else(|| overflow(&descriptor))?;
                    let s = Storage::Inline { offset };
                    let len = m.kind.checked_byte_len().ok_or_else(|| overflow(&descriptor))?;
                    offset = offset.checked_add(len).ok_or_else(|| overflow(&descriptor))?;
                    s
                }
                _ => {
                    let s = Storage::Slot { index: slot_count };
                    slot_count += 1;
                    s
                }
            };
            fields.push(FieldLayout {
                name: m.name.clone(),
                kind: m.kind.clone(),
                storage,
            });
        }

        let inline_size = align_up(offset, max_align).ok_or_else(|| overflow(&descriptor))?;
        Ok(Self {
            descriptor,
            fields,
            inline_size,
            slot_count,
            emulated: false,
        })
    }

    /// Layout synthesized from an on-disk descriptor for a class the program does not know.
    pub fn emulated(descriptor: Arc<ClassDescriptor>) -> Result<Self> {
        let mut layout = Self::from_descriptor(descriptor)?;
        layout.emulated = true;
        Ok(layout)
    }

    pub fn class_name(&self) -> &str {
        self.descriptor.name()
    }

    /// Checksum of the in-memory descriptor.
    pub fn checksum(&self) -> u32 {
        self.descriptor.checksum()
    }

    pub fn descriptor(&self) -> &Arc<ClassDescriptor> {
        &self.descriptor
    }

    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn inline_size(&self) -> usize {
        self.inline_size
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn is_emulated(&self) -> bool {
        self.emulated
    }
}

fn align_up(offset: usize, align: usize) -> Option<usize> {
    Some(offset.checked_add(align - 1)? & !(align - 1))
}

fn overflow(descriptor: &ClassDescriptor) -> Error {
    Error::InvalidDescriptor(format!(
        "{} v{}: inline members overflow the address space",
        descriptor.name(),
        descriptor.version()
    ))
}
