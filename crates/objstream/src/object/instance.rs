// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object instances: inline bytes plus slots, typed access by member name.

use super::graph::ObjectId;
use super::layout::{FieldLayout, Layout, Storage};
use crate::error::{Error, Result};
use crate::registry::IdentityToken;
use crate::schema::{ElementKind, MemberKind, PrimitiveKind, Value};
use std::sync::Arc;

/// Homogeneous primitive storage in memory (little-endian) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveArray {
    kind: PrimitiveKind,
    bytes: Vec<u8>,
}

impl PrimitiveArray {
    pub fn new(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            bytes: Vec::new(),
        }
    }

    /// Wrap raw memory-order bytes. The length must be a multiple of the kind size.
    pub fn from_bytes(kind: PrimitiveKind, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() % kind.size() != 0 {
            return Err(Error::SchemaMismatch(format!(
                "{} bytes is not a whole number of {}",
                bytes.len(),
                kind
            )));
        }
        Ok(Self { kind, bytes })
    }

    /// Build from values; each is converted to `kind`.
    pub fn from_values(kind: PrimitiveKind, values: &[Value]) -> Self {
        let mut arr = Self::new(kind);
        for v in values {
            arr.push(*v);
        }
        arr
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / self.kind.size()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        let size = self.kind.size();
        let start = index.checked_mul(size)?;
        let bytes = self.bytes.get(start..start + size)?;
        Some(Value::from_le_slice(self.kind, bytes))
    }

    /// Append, converting to the array's kind.
    pub fn push(&mut self, value: Value) {
        let size = self.kind.size();
        let start = self.bytes.len();
        self.bytes.resize(start + size, 0);
        value
            .convert_to(self.kind)
            .write_le(&mut self.bytes[start..start + size]);
    }

    pub fn values(&self) -> Vec<Value> {
        self.bytes
            .chunks_exact(self.kind.size())
            .map(|c| Value::from_le_slice(self.kind, c))
            .collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Owned collection contents.
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    Primitive(PrimitiveArray),
    Text(Vec<String>),
    Objects(Vec<Object>),
}

impl Collection {
    /// Empty collection matching `element`.
    pub fn empty(element: &ElementKind) -> Self {
        match element {
            ElementKind::Primitive(k) => Collection::Primitive(PrimitiveArray::new(*k)),
            ElementKind::Text => Collection::Text(Vec::new()),
            ElementKind::Object(_) => Collection::Objects(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Collection::Primitive(a) => a.len(),
            Collection::Text(v) => v.len(),
            Collection::Objects(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_objects(&self) -> Option<&[Object]> {
        match self {
            Collection::Objects(v) => Some(v),
            _ => None,
        }
    }
}

/// Out-of-line member storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Text(String),
    /// Embedded object or base-class part. `None` until set or read.
    Embedded(Option<Box<Object>>),
    Pointer(Option<ObjectId>),
    Reference(IdentityToken),
    Collection(Collection),
}

impl Slot {
    fn default_for(kind: &MemberKind) -> Slot {
        match kind {
            MemberKind::Text => Slot::Text(String::new()),
            MemberKind::Object { .. } | MemberKind::Base { .. } => Slot::Embedded(None),
            MemberKind::Pointer { .. } => Slot::Pointer(None),
            MemberKind::Reference => Slot::Reference(IdentityToken::NULL),
            MemberKind::Collection { element } => Slot::Collection(Collection::empty(element)),
            // inline kinds never get a slot
            MemberKind::Primitive(_) | MemberKind::FixedArray { .. } => Slot::Pointer(None),
        }
    }
}

/// Live instance of a class.
#[derive(Debug, Clone)]
pub struct Object {
    layout: Arc<Layout>,
    data: Vec<u8>,
    slots: Vec<Slot>,
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.layout.class_name() == other.layout.class_name()
            && self.layout.checksum() == other.layout.checksum()
            && self.data == other.data
            && self.slots == other.slots
    }
}

impl Object {
    /// Zero-initialized instance. Embedded members start unset.
    pub fn new(layout: Arc<Layout>) -> Self {
        let slots = layout
            .fields()
            .iter()
            .filter(|f| matches!(f.storage, Storage::Slot { .. }))
            .map(|f| Slot::default_for(&f.kind))
            .collect();
        Self {
            data: vec![0u8; layout.inline_size()],
            layout,
            slots,
        }
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub fn class_name(&self) -> &str {
        self.layout.class_name()
    }

    fn field(&self, name: &str) -> Result<&FieldLayout> {
        self.layout.field(name).ok_or_else(|| Error::NoSuchMember {
            class: self.layout.class_name().to_string(),
            member: name.to_string(),
        })
    }

    fn mismatch(&self, name: &str, wanted: &str, kind: &MemberKind) -> Error {
        Error::SchemaMismatch(format!(
            "{}::{} is {}, not {}",
            self.layout.class_name(),
            name,
            kind,
            wanted
        ))
    }

    // ---------------------------------------------------------------------
    // Primitives and fixed arrays
    // ---------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Result<Value> {
        let f = self.field(name)?;
        match (&f.kind, f.storage) {
            (MemberKind::Primitive(k), Storage::Inline { offset }) => {
                Ok(self.read_inline(*k, offset))
            }
            (kind, _) => Err(self.mismatch(name, "a primitive", kind)),
        }
    }

    /// Set a primitive member. The value kind must match the member kind.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let f = self.field(name)?;
        match (&f.kind, f.storage) {
            (MemberKind::Primitive(k), Storage::Inline { offset }) if *k == value.kind() => {
                self.write_inline(value, offset);
                Ok(())
            }
            (kind, _) => Err(self.mismatch(name, value.kind().name(), kind)),
        }
    }

    pub fn get_array(&self, name: &str) -> Result<Vec<Value>> {
        let f = self.field(name)?;
        match (&f.kind, f.storage) {
            (MemberKind::FixedArray { kind, len }, Storage::Inline { offset }) => {
                let len = *len as usize;
                Ok((0..len)
                    .map(|i| self.read_inline(*kind, offset + i * kind.size()))
                    .collect())
            }
            (kind, _) => Err(self.mismatch(name, "a fixed array", kind)),
        }
    }

    /// Set a fixed array. Extra values are rejected, missing ones leave zeros.
    pub fn set_array(&mut self, name: &str, values: &[Value]) -> Result<()> {
        let f = self.field(name)?;
        let member_kind = f.kind.clone();
        let (kind, len, offset) = match (&f.kind, f.storage) {
            (MemberKind::FixedArray { kind, len }, Storage::Inline { offset }) => {
                (*kind, *len as usize, offset)
            }
            (kind, _) => return Err(self.mismatch(name, "a fixed array", kind)),
        };
        if values.len() > len {
            return Err(Error::SchemaMismatch(format!(
                "{}::{} holds {} elements, got {}",
                self.layout.class_name(),
                name,
                len,
                values.len()
            )));
        }
        for (i, v) in values.iter().enumerate() {
            if v.kind() != kind {
                return Err(self.mismatch(name, v.kind().name(), &member_kind));
            }
            self.write_inline(*v, offset + i * kind.size());
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Slot members
    // ---------------------------------------------------------------------

    fn slot_of(&self, name: &str) -> Result<(usize, &MemberKind)> {
        let f = self.field(name)?;
        match f.storage {
            Storage::Slot { index } => Ok((index, &f.kind)),
            Storage::Inline { .. } => Err(self.mismatch(name, "a slot member", &f.kind)),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        let (index, kind) = self.slot_of(name)?;
        match &self.slots[index] {
            Slot::Text(s) => Ok(s),
            _ => Err(self.mismatch(name, "string", kind)),
        }
    }

    pub fn set_text(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let (index, kind) = self.slot_of(name)?;
        if *kind != MemberKind::Text {
            return Err(self.mismatch(name, "string", kind));
        }
        self.slots[index] = Slot::Text(value.into());
        Ok(())
    }

    /// Embedded object or base part; `None` if unset.
    pub fn object(&self, name: &str) -> Result<Option<&Object>> {
        let (index, kind) = self.slot_of(name)?;
        match &self.slots[index] {
            Slot::Embedded(obj) => Ok(obj.as_deref()),
            _ => Err(self.mismatch(name, "an embedded object", kind)),
        }
    }

    pub fn object_mut(&mut self, name: &str) -> Result<Option<&mut Object>> {
        let (index, kind) = self.slot_of(name)?;
        if !matches!(kind, MemberKind::Object { .. } | MemberKind::Base { .. }) {
            return Err(self.mismatch(name, "an embedded object", &kind.clone()));
        }
        match &mut self.slots[index] {
            Slot::Embedded(obj) => Ok(obj.as_deref_mut()),
            _ => Ok(None),
        }
    }

    /// Base-class part by base class name.
    pub fn base(&self, class: &str) -> Result<Option<&Object>> {
        self.object(class)
    }

    pub fn set_object(&mut self, name: &str, value: Object) -> Result<()> {
        let (index, kind) = self.slot_of(name)?;
        match kind.nested_class() {
            Some(class)
                if matches!(kind, MemberKind::Object { .. } | MemberKind::Base { .. })
                    && class == value.class_name() =>
            {
                self.slots[index] = Slot::Embedded(Some(Box::new(value)));
                Ok(())
            }
            _ => Err(self.mismatch(name, value.class_name(), &kind.clone())),
        }
    }

    pub fn pointer(&self, name: &str) -> Result<Option<ObjectId>> {
        let (index, kind) = self.slot_of(name)?;
        match &self.slots[index] {
            Slot::Pointer(p) if matches!(kind, MemberKind::Pointer { .. }) => Ok(*p),
            _ => Err(self.mismatch(name, "a pointer", kind)),
        }
    }

    pub fn set_pointer(&mut self, name: &str, target: Option<ObjectId>) -> Result<()> {
        let (index, kind) = self.slot_of(name)?;
        if !matches!(kind, MemberKind::Pointer { .. }) {
            return Err(self.mismatch(name, "a pointer", &kind.clone()));
        }
        self.slots[index] = Slot::Pointer(target);
        Ok(())
    }

    pub fn reference(&self, name: &str) -> Result<IdentityToken> {
        let (index, kind) = self.slot_of(name)?;
        match &self.slots[index] {
            Slot::Reference(t) => Ok(*t),
            _ => Err(self.mismatch(name, "a reference", kind)),
        }
    }

    pub fn set_reference(&mut self, name: &str, token: IdentityToken) -> Result<()> {
        let (index, kind) = self.slot_of(name)?;
        if *kind != MemberKind::Reference {
            return Err(self.mismatch(name, "a reference", &kind.clone()));
        }
        self.slots[index] = Slot::Reference(token);
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Result<&Collection> {
        let (index, kind) = self.slot_of(name)?;
        match &self.slots[index] {
            Slot::Collection(c) => Ok(c),
            _ => Err(self.mismatch(name, "a collection", kind)),
        }
    }

    /// Replace a collection. The contents must match the declared element kind.
    pub fn set_collection(&mut self, name: &str, value: Collection) -> Result<()> {
        let (index, kind) = self.slot_of(name)?;
        let ok = match (kind, &value) {
            (
                MemberKind::Collection {
                    element: ElementKind::Primitive(k),
                },
                Collection::Primitive(a),
            ) => a.kind() == *k,
            (
                MemberKind::Collection {
                    element: ElementKind::Text,
                },
                Collection::Text(_),
            ) => true,
            (
                MemberKind::Collection {
                    element: ElementKind::Object(class),
                },
                Collection::Objects(v),
            ) => v.iter().all(|o| o.class_name() == class),
            _ => false,
        };
        if !ok {
            return Err(self.mismatch(name, "a matching collection", &kind.clone()));
        }
        self.slots[index] = Slot::Collection(value);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Raw access for the executors
    // ---------------------------------------------------------------------

    pub(crate) fn read_inline(&self, kind: PrimitiveKind, offset: usize) -> Value {
        Value::from_le_slice(kind, &self.data[offset..offset + kind.size()])
    }

    pub(crate) fn write_inline(&mut self, value: Value, offset: usize) {
        let size = value.kind().size();
        value.write_le(&mut self.data[offset..offset + size]);
    }

    pub(crate) fn inline_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    pub(crate) fn inline_bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.data[offset..offset + len]
    }

    pub(crate) fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut Slot {
        &mut self.slots[index]
    }

    /// Raw inline block, for equality checks in tests and tooling.
    pub fn inline_data(&self) -> &[u8] {
        &self.data
    }
}
