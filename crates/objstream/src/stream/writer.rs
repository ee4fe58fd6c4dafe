// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write-side executor.

use super::{MODE_MEMBER_WISE, MODE_OBJECT_WISE};
use crate::actions::{Action, ActionSequence, Mode, Plan};
use crate::config::{NEW_CLASS_TAG, NEW_OBJECT_TAG, NULL_OBJECT_TAG};
use crate::context::SchemaContext;
use crate::error::{Error, Result};
use crate::object::{Collection, Object, ObjectGraph, ObjectId, Slot};
use crate::registry::IdentityToken;
use crate::schema::{ClassDescriptor, ElementKind, MemberKind, Value};
use crate::wire::WireBuffer;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Bytes of one or more object records, plus what they depend on.
#[derive(Debug, Clone, Default)]
pub struct EncodedObjects {
    pub bytes: Vec<u8>,
    /// Every descriptor the records were written with, in first-use order.
    pub descriptors: Vec<Arc<ClassDescriptor>>,
    /// Non-null identity tokens referenced by the records, in first-use order.
    pub identities: Vec<IdentityToken>,
}

/// Serializes objects into a buffer of records.
///
/// Class tags and object indices are scoped to the writer, so all records
/// appended to one writer must be read back by one reader.
pub struct ObjectWriter<'a> {
    ctx: &'a SchemaContext,
    buf: WireBuffer,
    classes: HashMap<String, u32>,
    written: HashMap<ObjectId, u32>,
    object_count: u32,
    targets: HashMap<String, Arc<ClassDescriptor>>,
    descriptors: Vec<Arc<ClassDescriptor>>,
    seen_descriptors: HashSet<(String, u32)>,
    identities: Vec<IdentityToken>,
    seen_identities: HashSet<IdentityToken>,
    depth: usize,
}

impl<'a> ObjectWriter<'a> {
    pub fn new(ctx: &'a SchemaContext) -> Self {
        Self {
            ctx,
            buf: WireBuffer::new(),
            classes: HashMap::new(),
            written: HashMap::new(),
            object_count: 0,
            targets: HashMap::new(),
            descriptors: Vec::new(),
            seen_descriptors: HashSet::new(),
            identities: Vec::new(),
            seen_identities: HashSet::new(),
            depth: 0,
        }
    }

    /// Write objects of `desc`'s class in that (possibly older) shape.
    pub fn with_target(mut self, desc: Arc<ClassDescriptor>) -> Self {
        self.targets.insert(desc.name().to_string(), desc);
        self
    }

    /// Append a record for a standalone object. Its pointers must be null.
    pub fn write_object(&mut self, obj: &Object) -> Result<()> {
        self.object_count += 1;
        self.write_class_tag(obj.class_name())?;
        self.write_frame(obj, &ObjectGraph::new())
    }

    /// Append a record for `root`, following pointers through `graph`.
    pub fn write_root(&mut self, graph: &ObjectGraph, root: ObjectId) -> Result<()> {
        let obj = graph
            .get(root)
            .ok_or_else(|| Error::InvalidState(format!("{} is not in the graph", root)))?;
        self.object_count += 1;
        self.written.insert(root, self.object_count);
        self.write_class_tag(obj.class_name())?;
        self.write_frame(obj, graph)
    }

    /// Objects written so far (roots and pointees).
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    pub fn len(&self) -> usize {
        self.buf.position()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> EncodedObjects {
        EncodedObjects {
            bytes: self.buf.into_bytes(),
            descriptors: self.descriptors,
            identities: self.identities,
        }
    }

    // ---------------------------------------------------------------------

    fn write_class_tag(&mut self, class: &str) -> Result<()> {
        if let Some(&index) = self.classes.get(class) {
            self.buf.write_u32(index)?;
            return Ok(());
        }
        self.buf.write_u32(NEW_CLASS_TAG)?;
        self.buf.write_str(class)?;
        let index = self.classes.len() as u32 + 1;
        self.classes.insert(class.to_string(), index);
        Ok(())
    }

    fn note_descriptor(&mut self, desc: &Arc<ClassDescriptor>) {
        if self
            .seen_descriptors
            .insert((desc.name().to_string(), desc.checksum()))
        {
            self.descriptors.push(Arc::clone(desc));
        }
    }

    fn target_for(&self, obj: &Object) -> Arc<ClassDescriptor> {
        self.targets
            .get(obj.class_name())
            .cloned()
            .unwrap_or_else(|| Arc::clone(obj.layout().descriptor()))
    }

    fn write_frame(&mut self, obj: &Object, graph: &ObjectGraph) -> Result<()> {
        if self.depth >= self.ctx.config().max_depth {
            return Err(Error::SchemaMismatch(format!(
                "{} nested deeper than {}",
                obj.class_name(),
                self.ctx.config().max_depth
            )));
        }
        self.depth += 1;
        let result = self.write_frame_at_depth(obj, graph);
        self.depth -= 1;
        result
    }

    fn write_frame_at_depth(&mut self, obj: &Object, graph: &ObjectGraph) -> Result<()> {
        let target = self.target_for(obj);
        let seq = self.ctx.sequence(&target, obj.layout(), Plan::WRITE)?;
        self.note_descriptor(&target);

        self.buf.write_u32(target.checksum())?;
        let size = self.buf.reserve_u32()?;
        self.run(&seq, obj, graph)?;
        let written = u32::try_from(self.buf.bytes_since(&size)).map_err(|_| {
            Error::SchemaMismatch(format!("{} frame exceeds 4 GiB", obj.class_name()))
        })?;
        self.buf.fill_u32(size, written)?;
        Ok(())
    }

    fn run(&mut self, seq: &ActionSequence, obj: &Object, graph: &ObjectGraph) -> Result<()> {
        for action in seq.actions() {
            match action {
                Action::Text { slot } => match obj.slot(*slot) {
                    Slot::Text(s) => self.buf.write_str(s)?,
                    other => return Err(slot_mismatch(obj, "string", other)),
                },
                Action::Nested { class, slot, .. } => match obj.slot(*slot) {
                    Slot::Embedded(Some(child)) => self.write_frame(child, graph)?,
                    Slot::Embedded(None) => {
                        let child = self.ctx.instantiate(class)?;
                        self.write_frame(&child, &ObjectGraph::new())?;
                    }
                    other => return Err(slot_mismatch(obj, "embedded object", other)),
                },
                Action::Pointer { slot, .. } => match obj.slot(*slot) {
                    Slot::Pointer(target) => self.write_pointer(*target, graph)?,
                    other => return Err(slot_mismatch(obj, "pointer", other)),
                },
                Action::Reference { slot } => match obj.slot(*slot) {
                    Slot::Reference(token) => {
                        self.buf.write_u64(token.0)?;
                        if !token.is_null() && self.seen_identities.insert(*token) {
                            self.identities.push(*token);
                        }
                    }
                    other => return Err(slot_mismatch(obj, "reference", other)),
                },
                Action::Collection { disk, slot, .. } => match obj.slot(*slot) {
                    Slot::Collection(coll) => self.write_collection(disk, coll, graph)?,
                    other => return Err(slot_mismatch(obj, "collection", other)),
                },
                Action::WriteDefault { kind } => self.write_default(kind)?,
                inline => self.write_inline(inline, obj)?,
            }
        }
        Ok(())
    }

    /// Actions that only read the object's inline block.
    fn write_inline(&mut self, action: &Action, obj: &Object) -> Result<()> {
        match action {
            Action::CopyPrimitive { kind, offset } => {
                self.buf.write_array(*kind, obj.inline_bytes(*offset, kind.size()))?;
            }
            Action::CopyArray { kind, len, offset } => {
                let n = kind.size() * (*len as usize);
                self.buf.write_array(*kind, obj.inline_bytes(*offset, n))?;
            }
            Action::Convert { from, to, offset } => {
                let v = obj.read_inline(*from, *offset).convert_to(*to);
                self.buf.write_primitive(v)?;
            }
            Action::ConvertArray {
                from,
                to,
                disk_len,
                mem_len,
                offset,
            } => {
                for i in 0..*disk_len {
                    let v = if i < *mem_len {
                        obj.read_inline(*from, offset + i as usize * from.size())
                            .convert_to(*to)
                    } else {
                        Value::zero(*to)
                    };
                    self.buf.write_primitive(v)?;
                }
            }
            Action::WriteDefault { kind } if kind.is_inline() => self.write_default(kind)?,
            other => {
                return Err(Error::InvalidState(format!(
                    "{} is not a write action",
                    other
                )))
            }
        }
        Ok(())
    }

    fn write_default(&mut self, kind: &MemberKind) -> Result<()> {
        match kind {
            MemberKind::Primitive(k) => self.buf.write_primitive(Value::zero(*k))?,
            MemberKind::FixedArray { kind, len } => {
                for _ in 0..*len {
                    self.buf.write_primitive(Value::zero(*kind))?;
                }
            }
            MemberKind::Text => self.buf.write_str("")?,
            MemberKind::Object { class } | MemberKind::Base { class } => {
                let child = self.ctx.instantiate(class)?;
                self.write_frame(&child, &ObjectGraph::new())?;
            }
            MemberKind::Pointer { .. } => self.buf.write_u32(NULL_OBJECT_TAG)?,
            MemberKind::Reference => self.buf.write_u64(0)?,
            MemberKind::Collection { element } => {
                self.buf.write_u32(0)?;
                if matches!(element, ElementKind::Object(_)) {
                    self.buf.write_u8(MODE_OBJECT_WISE)?;
                }
            }
        }
        Ok(())
    }

    fn write_pointer(&mut self, target: Option<ObjectId>, graph: &ObjectGraph) -> Result<()> {
        let Some(id) = target else {
            self.buf.write_u32(NULL_OBJECT_TAG)?;
            return Ok(());
        };
        if let Some(&index) = self.written.get(&id) {
            self.buf.write_u32(index)?;
            return Ok(());
        }
        let pointee = graph.get(id).ok_or_else(|| {
            Error::SchemaMismatch(format!("pointer to {} which is not in the graph", id))
        })?;
        self.object_count += 1;
        self.written.insert(id, self.object_count);
        self.buf.write_u32(NEW_OBJECT_TAG)?;
        self.write_class_tag(pointee.class_name())?;
        self.write_frame(pointee, graph)
    }

    fn write_collection(
        &mut self,
        disk: &ElementKind,
        coll: &Collection,
        graph: &ObjectGraph,
    ) -> Result<()> {
        let count = u32::try_from(coll.len())
            .map_err(|_| Error::SchemaMismatch("collection longer than u32::MAX".into()))?;
        self.buf.write_u32(count)?;
        match (disk, coll) {
            (ElementKind::Primitive(wire), Collection::Primitive(arr)) => {
                if arr.kind() == *wire {
                    self.buf.write_array(*wire, arr.as_bytes())?;
                } else {
                    for v in arr.values() {
                        self.buf.write_primitive(v.convert_to(*wire))?;
                    }
                }
            }
            (ElementKind::Text, Collection::Text(items)) => {
                for s in items {
                    self.buf.write_str(s)?;
                }
            }
            (ElementKind::Object(_), Collection::Objects(items)) => {
                self.write_object_collection(items, graph)?;
            }
            (disk, _) => {
                return Err(Error::SchemaMismatch(format!(
                    "collection contents do not match element kind {:?}",
                    disk
                )))
            }
        }
        Ok(())
    }

    fn write_object_collection(&mut self, items: &[Object], graph: &ObjectGraph) -> Result<()> {
        let mode = match items.first() {
            Some(first)
                if items
                    .iter()
                    .all(|o| o.layout().checksum() == first.layout().checksum())
                    && self.target_for(first).is_flat() =>
            {
                self.ctx.collection_mode(first.layout())
            }
            _ => Mode::ObjectWise,
        };

        match (mode, items.first()) {
            (Mode::MemberWise, Some(first)) => {
                self.buf.write_u8(MODE_MEMBER_WISE)?;
                let target = self.target_for(first);
                let seq = self
                    .ctx
                    .sequence(&target, first.layout(), Plan::WRITE_MEMBER_WISE)?;
                self.note_descriptor(&target);
                self.buf.write_u32(target.checksum())?;
                self.write_columns(&seq, items)
            }
            _ => {
                self.buf.write_u8(MODE_OBJECT_WISE)?;
                for item in items {
                    self.write_frame(item, graph)?;
                }
                Ok(())
            }
        }
    }

    /// One action across every element, copies gathered into a single array write.
    fn write_columns(&mut self, seq: &ActionSequence, items: &[Object]) -> Result<()> {
        for action in seq.actions() {
            let column = match action {
                Action::CopyPrimitive { kind, offset } => Some((*kind, *offset, kind.size())),
                Action::CopyArray { kind, len, offset } => {
                    Some((*kind, *offset, kind.size() * *len as usize))
                }
                _ => None,
            };
            match column {
                Some((kind, offset, n)) => {
                    let mut bytes = Vec::with_capacity(n * items.len());
                    for item in items {
                        bytes.extend_from_slice(item.inline_bytes(offset, n));
                    }
                    self.buf.write_array(kind, &bytes)?;
                }
                None => {
                    for item in items {
                        self.write_inline(action, item)?;
                    }
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn slot_name(slot: &Slot) -> &'static str {
    match slot {
        Slot::Text(_) => "string",
        Slot::Embedded(_) => "embedded object",
        Slot::Pointer(_) => "pointer",
        Slot::Reference(_) => "reference",
        Slot::Collection(_) => "collection",
    }
}

fn slot_mismatch(obj: &Object, wanted: &str, found: &Slot) -> Error {
    Error::SchemaMismatch(format!(
        "{}: expected a {} slot, found a {} slot",
        obj.class_name(),
        wanted,
        slot_name(found)
    ))
}
