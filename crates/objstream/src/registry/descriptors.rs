// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide descriptor registry.
//!
//! # Architecture
//!
//! ```text
//! DescriptorRegistry
//!   RwLock<Inner>
//!     entries:  token -> Arc<ClassDescriptor>        (slot per token, None once removed)
//!     classes:  class name -> { tokens, epoch }
//! ```
//!
//! Lookups take the read lock and run concurrently; `register`/`remove`
//! take the write lock. Tokens are small integers handed out in
//! registration order and never reused.
//!
//! Every class carries an epoch counter that moves whenever its set of
//! registered descriptors changes. Compiled action sequences remember the
//! epoch they were built under and are rebuilt when it moves.

use crate::schema::ClassDescriptor;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registry handle for one descriptor. Never 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorToken(pub u32);

impl fmt::Display for DescriptorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct ClassEntry {
    /// Tokens in registration order.
    tokens: Vec<DescriptorToken>,
    epoch: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Option<Arc<ClassDescriptor>>>,
    classes: HashMap<String, ClassEntry>,
}

impl Inner {
    fn get(&self, token: DescriptorToken) -> Option<&Arc<ClassDescriptor>> {
        let idx = (token.0 as usize).checked_sub(1)?;
        self.entries.get(idx)?.as_ref()
    }

    fn class_descriptors<'a>(
        &'a self,
        name: &str,
    ) -> impl Iterator<Item = (DescriptorToken, &'a Arc<ClassDescriptor>)> + 'a {
        self.classes
            .get(name)
            .into_iter()
            .flat_map(|c| c.tokens.iter())
            .filter_map(move |&t| self.get(t).map(|d| (t, d)))
    }
}

/// Thread-safe table of class descriptors.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    inner: RwLock<Inner>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `desc`, returning its token.
    ///
    /// Registering an identical descriptor again returns the existing token.
    /// A different checksum under an already registered version is accepted
    /// (both stay reachable by checksum) but logged as a warning.
    pub fn register(&self, desc: ClassDescriptor) -> DescriptorToken {
        self.register_arc(Arc::new(desc))
    }

    pub fn register_arc(&self, desc: Arc<ClassDescriptor>) -> DescriptorToken {
        let mut inner = self.inner.write();

        let mut version_clash = None;
        for (token, existing) in inner.class_descriptors(desc.name()) {
            if existing.is_identical(&desc) {
                return token;
            }
            if existing.version() == desc.version() {
                version_clash = Some(existing.checksum());
            }
        }
        if let Some(old) = version_clash {
            log::warn!(
                "[REGISTRY] {} version {} re-registered with checksum {:#010x} (was {:#010x})",
                desc.name(),
                desc.version(),
                desc.checksum(),
                old
            );
        }

        inner.entries.push(Some(Arc::clone(&desc)));
        let token = DescriptorToken(inner.entries.len() as u32);
        let class = inner.classes.entry(desc.name().to_string()).or_default();
        class.tokens.push(token);
        class.epoch += 1;

        log::debug!(
            "[REGISTRY] registered {} v{} checksum={:#010x} as {}",
            desc.name(),
            desc.version(),
            desc.checksum(),
            token
        );
        token
    }

    /// First descriptor registered for (`name`, `version`).
    pub fn find(&self, name: &str, version: u32) -> Option<Arc<ClassDescriptor>> {
        let inner = self.inner.read();
        let found = inner
            .class_descriptors(name)
            .find(|(_, d)| d.version() == version)
            .map(|(_, d)| Arc::clone(d));
        found
    }

    pub fn find_by_checksum(&self, name: &str, checksum: u32) -> Option<Arc<ClassDescriptor>> {
        self.find_entry_by_checksum(name, checksum).map(|(_, d)| d)
    }

    /// Token and descriptor for (`name`, `checksum`).
    pub fn find_entry_by_checksum(
        &self,
        name: &str,
        checksum: u32,
    ) -> Option<(DescriptorToken, Arc<ClassDescriptor>)> {
        let inner = self.inner.read();
        let found = inner
            .class_descriptors(name)
            .find(|(_, d)| d.checksum() == checksum)
            .map(|(t, d)| (t, Arc::clone(d)));
        found
    }

    pub fn get(&self, token: DescriptorToken) -> Option<Arc<ClassDescriptor>> {
        self.inner.read().get(token).cloned()
    }

    /// Unregister every descriptor of `name` with `version`. Returns how many were removed.
    pub fn remove(&self, name: &str, version: u32) -> usize {
        let mut inner = self.inner.write();
        let Inner { entries, classes } = &mut *inner;
        let Some(class) = classes.get_mut(name) else {
            return 0;
        };

        let mut removed = 0;
        class.tokens.retain(|t| {
            let slot = &mut entries[t.0 as usize - 1];
            if slot.as_ref().is_some_and(|d| d.version() == version) {
                *slot = None;
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            class.epoch += 1;
            log::debug!("[REGISTRY] removed {} v{} ({} entries)", name, version, removed);
        }
        removed
    }

    /// Registered versions of `name`, ascending, without duplicates.
    pub fn versions(&self, name: &str) -> Vec<u32> {
        let inner = self.inner.read();
        let mut v: Vec<u32> = inner.class_descriptors(name).map(|(_, d)| d.version()).collect();
        v.sort_unstable();
        v.dedup();
        v
    }

    /// Descriptor with the highest version (latest registration on ties).
    pub fn latest(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        let inner = self.inner.read();
        let found = inner
            .class_descriptors(name)
            .max_by_key(|(t, d)| (d.version(), *t))
            .map(|(_, d)| Arc::clone(d));
        found
    }

    /// Change counter for `name`; 0 if the class was never touched.
    pub fn epoch(&self, name: &str) -> u64 {
        self.inner.read().classes.get(name).map_or(0, |c| c.epoch)
    }

    /// Move the epoch of `name` without changing its descriptors.
    pub(crate) fn bump_epoch(&self, name: &str) {
        let mut inner = self.inner.write();
        inner.classes.entry(name.to_string()).or_default().epoch += 1;
    }

    /// Number of live descriptors.
    pub fn len(&self) -> usize {
        self.inner.read().entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of classes with at least one live descriptor, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner
            .classes
            .iter()
            .filter(|(_, c)| !c.tokens.is_empty())
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        names
    }
}
