// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object graph arena.
//!
//! Pointer members hold [`ObjectId`]s into an [`ObjectGraph`] instead of
//! references, so shared targets and cycles need no reference counting and
//! survive a trip through a buffer unchanged in shape.

use super::instance::Object;
use std::fmt;

/// Index of an object in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Arena of objects addressed by [`ObjectId`].
///
/// A slot can be reserved before its object exists, which is how a reader
/// resolves a pointer cycle back to an object still being decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectGraph {
    objects: Vec<Option<Object>>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: Object) -> ObjectId {
        self.objects.push(Some(object));
        ObjectId(self.objects.len() as u32 - 1)
    }

    /// Reserve an id to be filled later.
    pub fn reserve(&mut self) -> ObjectId {
        self.objects.push(None);
        ObjectId(self.objects.len() as u32 - 1)
    }

    pub fn fill(&mut self, id: ObjectId, object: Object) {
        if let Some(slot) = self.objects.get_mut(id.0 as usize) {
            *slot = Some(object);
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0 as usize)?.as_mut()
    }

    /// Move an object out, leaving its slot empty.
    pub fn take(&mut self, id: ObjectId) -> Option<Object> {
        self.objects.get_mut(id.0 as usize)?.take()
    }

    /// Number of ids handed out, filled or not.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|o| (ObjectId(i as u32), o)))
    }
}
