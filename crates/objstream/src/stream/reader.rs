// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read-side executor.
//!
//! Each frame is decoded with the sequence compiled for its (on-disk
//! descriptor, current layout) pair. Members nobody wants are skipped by
//! walking their on-disk descriptor, so objects declared inside a skipped
//! member still take their index and later back-references stay aligned.

use super::{MODE_MEMBER_WISE, MODE_OBJECT_WISE};
use crate::actions::{Action, ActionSequence, Plan};
use crate::config::{NEW_CLASS_TAG, NEW_OBJECT_TAG, NULL_OBJECT_TAG};
use crate::context::SchemaContext;
use crate::error::{Error, Result};
use crate::object::{Collection, Layout, Object, ObjectGraph, ObjectId, PrimitiveArray, Slot};
use crate::registry::IdentityToken;
use crate::schema::{ClassDescriptor, ElementKind, MemberKind, Value};
use crate::wire::{WireBuffer, WireError};
use std::sync::Arc;

/// Deserializes records produced by one [`ObjectWriter`](super::ObjectWriter).
pub struct ObjectReader<'a> {
    ctx: &'a SchemaContext,
    buf: WireBuffer,
    classes: Vec<String>,
    /// Object index (1-based on the wire) to graph id; `None` for skipped objects.
    objects: Vec<Option<ObjectId>>,
    graph: ObjectGraph,
    depth: usize,
}

impl<'a> ObjectReader<'a> {
    pub fn new(ctx: &'a SchemaContext, bytes: Vec<u8>) -> Self {
        Self {
            ctx,
            buf: WireBuffer::from_bytes(bytes),
            classes: Vec::new(),
            objects: Vec::new(),
            graph: ObjectGraph::new(),
            depth: 0,
        }
    }

    /// No bytes left to decode.
    pub fn is_exhausted(&self) -> bool {
        self.buf.remaining() == 0
    }

    /// Decode the next record into the reader's graph.
    pub fn read_root(&mut self) -> Result<ObjectId> {
        let class = self.read_class_tag()?;
        let id = self.graph.reserve();
        self.objects.push(Some(id));
        let obj = self.read_frame(&class)?;
        self.graph.fill(id, obj);
        Ok(id)
    }

    /// Decode the next record and move it out of the graph.
    ///
    /// Pointees stay in [`graph`](Self::graph); pointers back to the root
    /// dangle afterwards.
    pub fn read_object(&mut self) -> Result<Object> {
        let id = self.read_root()?;
        self.graph
            .take(id)
            .ok_or_else(|| Error::InvalidState(format!("{} vanished from the graph", id)))
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ObjectGraph {
        self.graph
    }

    // ---------------------------------------------------------------------

    fn invalid(&self, reason: String) -> Error {
        Error::Wire(WireError::InvalidData {
            offset: self.buf.position(),
            reason,
        })
    }

    /// Reject element counts the remaining bytes cannot possibly hold.
    fn check_count(&self, count: usize, min_size: usize) -> Result<()> {
        // Zero-width elements still count as one byte each.
        let fits = count
            .checked_mul(min_size.max(1))
            .is_some_and(|n| n <= self.buf.remaining());
        if fits {
            Ok(())
        } else {
            Err(self.invalid(format!(
                "{} elements of {} bytes exceed the {} bytes left",
                count,
                min_size,
                self.buf.remaining()
            )))
        }
    }

    /// Width of one member-wise element; member-wise data needs a flat class.
    fn column_width(&self, disk: &ClassDescriptor) -> Result<usize> {
        match disk.column_width() {
            Some(width) if disk.is_flat() => Ok(width),
            _ => Err(self.invalid(format!(
                "{} cannot be streamed member-wise",
                disk.name()
            ))),
        }
    }

    fn read_class_tag(&mut self) -> Result<String> {
        let tag = self.buf.read_u32()?;
        if tag == NEW_CLASS_TAG {
            let name = self.buf.read_str()?;
            self.classes.push(name.clone());
            return Ok(name);
        }
        let found = (tag as usize)
            .checked_sub(1)
            .and_then(|i| self.classes.get(i))
            .cloned();
        found.ok_or_else(|| self.invalid(format!("class index {} was never introduced", tag)))
    }

    fn back_reference(&self, index: u32) -> Result<Option<ObjectId>> {
        let found = (index as usize)
            .checked_sub(1)
            .and_then(|i| self.objects.get(i))
            .copied();
        found.ok_or_else(|| self.invalid(format!("back-reference to unwritten object {}", index)))
    }

    fn resolve(&self, class: &str, checksum: u32) -> Result<(Arc<ClassDescriptor>, Arc<Layout>)> {
        if let Some(layout) = self.ctx.layout(class) {
            if layout.checksum() == checksum {
                return Ok((Arc::clone(layout.descriptor()), layout));
            }
        }
        let disk = self.ctx.disk_descriptor(class, checksum)?;
        let layout = self.ctx.read_layout(&disk)?;
        Ok((disk, layout))
    }

    fn enter(&mut self, class: &str) -> Result<()> {
        if self.depth >= self.ctx.config().max_depth {
            return Err(Error::SchemaMismatch(format!(
                "{} nested deeper than {}",
                class,
                self.ctx.config().max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Frame header, then body. Verifies the body length.
    fn read_frame(&mut self, class: &str) -> Result<Object> {
        self.enter(class)?;
        let result = self.read_frame_body(class);
        self.depth -= 1;
        result
    }

    fn read_frame_body(&mut self, class: &str) -> Result<Object> {
        let checksum = self.buf.read_u32()?;
        let size = self.buf.read_u32()? as usize;
        if size > self.buf.remaining() {
            return Err(self.invalid(format!(
                "{} frame of {} bytes, {} left",
                class,
                size,
                self.buf.remaining()
            )));
        }
        let start = self.buf.position();

        let (disk, layout) = self.resolve(class, checksum)?;
        let seq = self.ctx.sequence(&disk, &layout, Plan::READ)?;
        let mut obj = Object::new(layout);
        self.run(&seq, &mut obj)?;

        let consumed = self.buf.position() - start;
        if consumed != size {
            return Err(Error::SchemaMismatch(format!(
                "{} ({:#010x}) body used {} of {} bytes",
                class, checksum, consumed, size
            )));
        }
        Ok(obj)
    }

    fn run(&mut self, seq: &ActionSequence, obj: &mut Object) -> Result<()> {
        let mut scratch = vec![Value::Bool(false); seq.scratch_len()];
        for action in seq.actions() {
            match action {
                Action::Text { slot } => {
                    let s = self.buf.read_str()?;
                    *obj.slot_mut(*slot) = Slot::Text(s);
                }
                Action::Nested { class, slot } => {
                    let child = self.read_frame(class)?;
                    *obj.slot_mut(*slot) = Slot::Embedded(Some(Box::new(child)));
                }
                Action::Pointer { slot, .. } => {
                    let target = self.read_pointer()?;
                    *obj.slot_mut(*slot) = Slot::Pointer(target);
                }
                Action::Reference { slot } => {
                    let token = IdentityToken(self.buf.read_u64()?);
                    *obj.slot_mut(*slot) = Slot::Reference(token);
                }
                Action::Collection { disk, mem, slot } => {
                    let coll = self.read_collection(disk, mem)?;
                    *obj.slot_mut(*slot) = Slot::Collection(coll);
                }
                Action::Skip { kind } => self.skip_member(kind)?,
                inline => self.read_inline(inline, obj, &mut scratch)?,
            }
        }
        Ok(())
    }

    /// Actions that only touch the object's inline block or scratch values.
    fn read_inline(&mut self, action: &Action, obj: &mut Object, scratch: &mut [Value]) -> Result<()> {
        match action {
            Action::CopyPrimitive { kind, offset } => {
                self.buf
                    .read_array_into(*kind, obj.inline_bytes_mut(*offset, kind.size()))?;
            }
            Action::CopyArray { kind, len, offset } => {
                let n = kind.size() * (*len as usize);
                self.buf.read_array_into(*kind, obj.inline_bytes_mut(*offset, n))?;
            }
            Action::Convert { from, to, offset } => {
                let v = self.buf.read_primitive(*from)?;
                obj.write_inline(v.convert_to(*to), *offset);
            }
            Action::ConvertArray {
                from,
                to,
                disk_len,
                mem_len,
                offset,
            } => {
                for i in 0..*disk_len {
                    let v = self.buf.read_primitive(*from)?;
                    if i < *mem_len {
                        obj.write_inline(v.convert_to(*to), offset + i as usize * to.size());
                    }
                }
            }
            Action::ReadToScratch { kind, scratch: s } => {
                scratch[*s] = self.buf.read_primitive(*kind)?;
            }
            Action::StoreScratch { scratch: s, to, offset } => {
                obj.write_inline(scratch[*s].convert_to(*to), *offset);
            }
            Action::ApplyRule {
                rule,
                inputs,
                to,
                offset,
            } => {
                let args: Vec<Value> = inputs.iter().map(|i| scratch[*i]).collect();
                obj.write_inline(rule.apply(&args).convert_to(*to), *offset);
            }
            Action::Skip { kind } if kind.is_inline() => self.buf.skip(kind.byte_len())?,
            other => {
                return Err(Error::InvalidState(format!(
                    "{} is not a read action",
                    other
                )))
            }
        }
        Ok(())
    }

    fn read_pointer(&mut self) -> Result<Option<ObjectId>> {
        match self.buf.read_u32()? {
            NULL_OBJECT_TAG => Ok(None),
            NEW_OBJECT_TAG => {
                let class = self.read_class_tag()?;
                let id = self.graph.reserve();
                self.objects.push(Some(id));
                let pointee = self.read_frame(&class)?;
                self.graph.fill(id, pointee);
                Ok(Some(id))
            }
            index => self.back_reference(index),
        }
    }

    fn read_collection(&mut self, disk: &ElementKind, mem: &ElementKind) -> Result<Collection> {
        let count = self.buf.read_u32()? as usize;
        match (disk, mem) {
            (ElementKind::Primitive(d), ElementKind::Primitive(m)) => {
                self.check_count(count, d.size())?;
                let bytes = self.buf.read_array(*d, count)?;
                let arr = PrimitiveArray::from_bytes(*d, bytes)?;
                if d == m {
                    Ok(Collection::Primitive(arr))
                } else {
                    Ok(Collection::Primitive(PrimitiveArray::from_values(
                        *m,
                        &arr.values(),
                    )))
                }
            }
            (ElementKind::Text, ElementKind::Text) => {
                self.check_count(count, 4)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.buf.read_str()?);
                }
                Ok(Collection::Text(items))
            }
            (ElementKind::Object(class), ElementKind::Object(_)) => {
                Ok(Collection::Objects(self.read_object_collection(class, count)?))
            }
            _ => Err(Error::SchemaMismatch(format!(
                "cannot read a {:?} collection into {:?}",
                disk, mem
            ))),
        }
    }

    fn read_object_collection(&mut self, class: &str, count: usize) -> Result<Vec<Object>> {
        match self.buf.read_u8()? {
            MODE_OBJECT_WISE => {
                self.check_count(count, 8)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_frame(class)?);
                }
                Ok(items)
            }
            MODE_MEMBER_WISE => self.read_columns(class, count),
            other => Err(self.invalid(format!("unknown collection mode {}", other))),
        }
    }

    /// Member-wise collection: one column per member, copies read as one array.
    fn read_columns(&mut self, class: &str, count: usize) -> Result<Vec<Object>> {
        let checksum = self.buf.read_u32()?;
        let (disk, layout) = self.resolve(class, checksum)?;
        let width = self.column_width(&disk)?;
        self.check_count(count, width)?;
        let seq = self.ctx.sequence(&disk, &layout, Plan::READ_MEMBER_WISE)?;

        let mut items: Vec<Object> = (0..count).map(|_| Object::new(Arc::clone(&layout))).collect();
        let mut scratch = vec![vec![Value::Bool(false); seq.scratch_len()]; count];

        for action in seq.actions() {
            let column = match action {
                Action::CopyPrimitive { kind, offset } => Some((*kind, *offset, 1usize)),
                Action::CopyArray { kind, len, offset } => Some((*kind, *offset, *len as usize)),
                _ => None,
            };
            match column {
                Some((kind, offset, len)) if len > 0 => {
                    let n = kind.size() * len;
                    let bytes = self.buf.read_array(kind, count * len)?;
                    for (item, chunk) in items.iter_mut().zip(bytes.chunks_exact(n)) {
                        item.inline_bytes_mut(offset, n).copy_from_slice(chunk);
                    }
                }
                Some(_) => {}
                None => {
                    for (item, s) in items.iter_mut().zip(scratch.iter_mut()) {
                        self.read_inline(action, item, s)?;
                    }
                }
            }
        }
        Ok(items)
    }

    // ---------------------------------------------------------------------
    // Skipping
    // ---------------------------------------------------------------------

    fn skip_str(&mut self) -> Result<()> {
        let n = self.buf.read_u32()? as usize;
        self.buf.skip(n)?;
        Ok(())
    }

    fn skip_member(&mut self, kind: &MemberKind) -> Result<()> {
        match kind {
            MemberKind::Primitive(_) | MemberKind::FixedArray { .. } => {
                self.buf.skip(kind.byte_len())?
            }
            MemberKind::Text => self.skip_str()?,
            MemberKind::Object { class } | MemberKind::Base { class } => self.skip_frame(class)?,
            MemberKind::Pointer { .. } => match self.buf.read_u32()? {
                NULL_OBJECT_TAG => {}
                NEW_OBJECT_TAG => {
                    let class = self.read_class_tag()?;
                    self.objects.push(None);
                    self.skip_frame(&class)?;
                }
                index => {
                    self.back_reference(index)?;
                }
            },
            MemberKind::Reference => self.buf.skip(8)?,
            MemberKind::Collection { element } => {
                let count = self.buf.read_u32()? as usize;
                match element {
                    ElementKind::Primitive(k) => {
                        self.check_count(count, k.size())?;
                        self.buf.skip(count * k.size())?;
                    }
                    ElementKind::Text => {
                        self.check_count(count, 4)?;
                        for _ in 0..count {
                            self.skip_str()?;
                        }
                    }
                    ElementKind::Object(class) => match self.buf.read_u8()? {
                        MODE_OBJECT_WISE => {
                            self.check_count(count, 8)?;
                            for _ in 0..count {
                                self.skip_frame(class)?;
                            }
                        }
                        MODE_MEMBER_WISE => {
                            let checksum = self.buf.read_u32()?;
                            let disk = self.ctx.disk_descriptor(class, checksum)?;
                            let width = self.column_width(&disk)?;
                            self.check_count(count, width)?;
                            self.buf.skip(count * width)?;
                        }
                        other => {
                            return Err(self.invalid(format!("unknown collection mode {}", other)))
                        }
                    },
                }
            }
        }
        Ok(())
    }

    /// Skip one frame by walking its on-disk descriptor.
    ///
    /// An undescribed frame is an error: objects declared inside it would
    /// never take their index, and later back-references would resolve to
    /// the wrong object.
    fn skip_frame(&mut self, class: &str) -> Result<()> {
        let checksum = self.buf.read_u32()?;
        let size = self.buf.read_u32()? as usize;
        if size > self.buf.remaining() {
            return Err(self.invalid(format!("{} frame of {} bytes overruns the buffer", class, size)));
        }
        let disk = self.ctx.disk_descriptor(class, checksum)?;

        self.enter(class)?;
        let start = self.buf.position();
        let result = disk
            .members()
            .iter()
            .try_for_each(|m| self.skip_member(&m.kind));
        self.depth -= 1;
        result?;

        let consumed = self.buf.position() - start;
        if consumed != size {
            return Err(Error::SchemaMismatch(format!(
                "skipped {} body used {} of {} bytes",
                class, consumed, size
            )));
        }
        Ok(())
    }
}
