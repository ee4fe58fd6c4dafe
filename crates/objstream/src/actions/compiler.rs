// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Action compiler and sequence cache.
//!
//! A sequence depends only on (plan, class, on-disk checksum, in-memory
//! checksum) and the rules registered for the class. Rule and descriptor
//! registration bump the class epoch in the descriptor registry; a cached
//! sequence from an older epoch is recompiled on next use.

use super::action::{Action, ActionSequence, Direction, Mode, Plan};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::evolution::{resolve_read, resolve_write, RuleSet};
use crate::object::{FieldLayout, Layout};
use crate::schema::{ClassDescriptor, ElementKind, MemberKind, PrimitiveKind};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// Member binding
// ============================================================================

fn element_compatible(disk: &ElementKind, mem: &ElementKind, cast: bool) -> bool {
    match (disk, mem) {
        (ElementKind::Primitive(a), ElementKind::Primitive(b)) => cast || a.widens_to(*b),
        (ElementKind::Text, ElementKind::Text) => true,
        (ElementKind::Object(a), ElementKind::Object(b)) => a == b,
        _ => false,
    }
}

fn bind_primitive(from: PrimitiveKind, to: PrimitiveKind, offset: usize) -> Action {
    if from == to {
        Action::CopyPrimitive { kind: from, offset }
    } else {
        Action::Convert { from, to, offset }
    }
}

fn bind_array(
    from: PrimitiveKind,
    disk_len: u32,
    to: PrimitiveKind,
    mem_len: u32,
    offset: usize,
) -> Action {
    if from == to && disk_len == mem_len {
        Action::CopyArray {
            kind: from,
            len: disk_len,
            offset,
        }
    } else {
        Action::ConvertArray {
            from,
            to,
            disk_len,
            mem_len,
            offset,
        }
    }
}

/// Slot-backed kinds: same shape on both sides, or a widening collection.
fn bind_slot(disk: &MemberKind, target: &FieldLayout, cast: bool) -> Option<Action> {
    let slot = target.slot()?;
    match (disk, &target.kind) {
        (MemberKind::Text, MemberKind::Text) => Some(Action::Text { slot }),
        (MemberKind::Object { class: a }, MemberKind::Object { class: b })
        | (MemberKind::Base { class: a }, MemberKind::Base { class: b })
            if a == b =>
        {
            Some(Action::Nested {
                class: a.clone(),
                slot,
            })
        }
        (MemberKind::Pointer { class: a }, MemberKind::Pointer { class: b }) if a == b => {
            Some(Action::Pointer {
                class: a.clone(),
                slot,
            })
        }
        (MemberKind::Reference, MemberKind::Reference) => Some(Action::Reference { slot }),
        (MemberKind::Collection { element: d }, MemberKind::Collection { element: m })
            if element_compatible(d, m, cast) =>
        {
            Some(Action::Collection {
                disk: d.clone(),
                mem: m.clone(),
                slot,
            })
        }
        _ => None,
    }
}

/// Bind an on-disk member to an in-memory field, exact kind or widening.
pub(crate) fn bind_direct(disk: &MemberKind, target: &FieldLayout) -> Option<Action> {
    match (disk, &target.kind) {
        (MemberKind::Primitive(a), MemberKind::Primitive(b)) if a.widens_to(*b) => {
            Some(bind_primitive(*a, *b, target.offset()?))
        }
        (
            MemberKind::FixedArray { kind: a, len: n },
            MemberKind::FixedArray { kind: b, len: m },
        ) if a.widens_to(*b) => Some(bind_array(*a, *n, *b, *m, target.offset()?)),
        _ => bind_slot(disk, target, false),
    }
}

/// Like [`bind_direct`], but any numeric conversion is allowed.
pub(crate) fn bind_cast(disk: &MemberKind, target: &FieldLayout) -> Option<Action> {
    match (disk, &target.kind) {
        (MemberKind::Primitive(a), MemberKind::Primitive(b)) => {
            Some(bind_primitive(*a, *b, target.offset()?))
        }
        (
            MemberKind::FixedArray { kind: a, len: n },
            MemberKind::FixedArray { kind: b, len: m },
        ) => Some(bind_array(*a, *n, *b, *m, target.offset()?)),
        _ => bind_slot(disk, target, true),
    }
}

/// Bind an in-memory field to a target wire member for writing.
///
/// `Convert::from` is the memory kind here. Narrowing is accepted: the
/// caller asked for the older shape.
pub(crate) fn bind_write(wire: &MemberKind, source: &FieldLayout) -> Option<Action> {
    match (&source.kind, wire) {
        (MemberKind::Primitive(m), MemberKind::Primitive(w)) => {
            Some(bind_primitive(*m, *w, source.offset()?))
        }
        (
            MemberKind::FixedArray { kind: m, len: ml },
            MemberKind::FixedArray { kind: w, len: wl },
        ) => Some(bind_array(*m, *wl, *w, *ml, source.offset()?)),
        _ => {
            let slot = source.slot()?;
            match (&source.kind, wire) {
                (MemberKind::Collection { element: m }, MemberKind::Collection { element: w })
                    if element_compatible(m, w, true) =>
                {
                    Some(Action::Collection {
                        disk: w.clone(),
                        mem: m.clone(),
                        slot,
                    })
                }
                _ => bind_slot(wire, source, false),
            }
        }
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Pick the traversal mode for a collection of `element` objects.
///
/// Member-wise needs a flat element class with no evolution rules.
pub fn choose_mode(element: &Layout, rules: &RuleSet, config: &StreamConfig) -> Mode {
    if config.member_wise
        && element.descriptor().is_flat()
        && !rules.has_rules(element.class_name())
    {
        Mode::MemberWise
    } else {
        Mode::ObjectWise
    }
}

/// Compile one sequence without caching.
///
/// Read: `disk` is the on-disk descriptor. Write: `disk` is the target
/// descriptor the bytes must conform to.
pub fn compile(
    disk: &ClassDescriptor,
    layout: &Layout,
    plan: Plan,
    rules: &RuleSet,
    epoch: u64,
) -> Result<ActionSequence> {
    if disk.name() != layout.class_name() {
        return Err(Error::SchemaMismatch(format!(
            "cannot bind {} to a {} layout",
            disk.name(),
            layout.class_name()
        )));
    }
    if plan.mode == Mode::MemberWise && !disk.is_flat() {
        return Err(Error::InvalidState(format!(
            "{} has slot members and cannot stream member-wise",
            disk.name()
        )));
    }

    let (actions, scratch_len) = if disk.checksum() == layout.checksum() {
        let actions = disk
            .members()
            .iter()
            .zip(layout.fields())
            .map(|(m, f)| {
                bind_direct(&m.kind, f).ok_or_else(|| {
                    Error::SchemaMismatch(format!("{}::{} has no direct binding", disk.name(), m.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        (actions, 0)
    } else {
        let class_rules = rules.for_class(disk.name());
        let res = match plan.direction {
            Direction::Read => resolve_read(disk, layout, &class_rules),
            Direction::Write => resolve_write(disk, layout, &class_rules),
        };
        (res.actions, res.scratch_len)
    };

    if plan.mode == Mode::MemberWise {
        if let Some(bad) = actions.iter().find(|a| !a.is_inline()) {
            return Err(Error::InvalidState(format!(
                "member-wise sequence for {} contains {}",
                disk.name(),
                bad
            )));
        }
    }

    Ok(ActionSequence {
        class: disk.name().to_string(),
        plan,
        disk_checksum: disk.checksum(),
        memory_checksum: layout.checksum(),
        epoch,
        actions,
        scratch_len,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    plan: Plan,
    class: String,
    disk_checksum: u32,
    memory_checksum: u32,
}

/// Caching front-end to [`compile`]. Safe to share between threads.
///
/// Two threads missing the same key both compile; the later insert wins
/// and both results are equivalent.
#[derive(Debug, Default)]
pub struct ActionCompiler {
    cache: DashMap<CacheKey, Arc<ActionSequence>>,
    compiled: AtomicU64,
}

impl ActionCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached sequence for this pair, compiled on first use or after an epoch change.
    pub fn sequence(
        &self,
        disk: &ClassDescriptor,
        layout: &Layout,
        plan: Plan,
        rules: &RuleSet,
        epoch: u64,
    ) -> Result<Arc<ActionSequence>> {
        let key = CacheKey {
            plan,
            class: disk.name().to_string(),
            disk_checksum: disk.checksum(),
            memory_checksum: layout.checksum(),
        };
        if let Some(seq) = self.cache.get(&key) {
            if seq.epoch == epoch {
                return Ok(Arc::clone(seq.value()));
            }
        }

        let seq = Arc::new(compile(disk, layout, plan, rules, epoch)?);
        self.compiled.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "[COMPILER] {} {:?}/{:?} {:#010x}->{:#010x}: {} actions (epoch {})",
            key.class,
            plan.direction,
            plan.mode,
            key.disk_checksum,
            key.memory_checksum,
            seq.len(),
            epoch
        );
        self.cache.insert(key, Arc::clone(&seq));
        Ok(seq)
    }

    /// Number of compilations performed (cache misses).
    pub fn compile_count(&self) -> u64 {
        self.compiled.load(Ordering::Relaxed)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::EvolutionRule;
    use crate::object::LayoutRegistry;

    fn point(version: u32, y_kind: PrimitiveKind) -> ClassDescriptor {
        ClassDescriptor::builder("Point", version)
            .primitive("x", PrimitiveKind::F32)
            .primitive("y", y_kind)
            .build()
    }

    #[test]
    fn test_identical_checksums_compile_to_copies() {
        let reg = LayoutRegistry::new();
        let layout = reg.register(Arc::new(point(1, PrimitiveKind::F32))).unwrap();
        let seq = compile(
            layout.descriptor(),
            &layout,
            Plan::READ,
            &RuleSet::new(),
            0,
        )
        .unwrap();
        assert!(seq.is_direct());
        assert!(seq
            .actions()
            .iter()
            .all(|a| matches!(a, Action::CopyPrimitive { .. })));
    }

    #[test]
    fn test_cache_hits_until_epoch_moves() {
        let reg = LayoutRegistry::new();
        let layout = reg.register(Arc::new(point(2, PrimitiveKind::F64))).unwrap();
        let disk = point(1, PrimitiveKind::F32);
        let rules = RuleSet::new();
        let compiler = ActionCompiler::new();

        let a = compiler
            .sequence(&disk, &layout, Plan::READ, &rules, 3)
            .unwrap();
        let b = compiler
            .sequence(&disk, &layout, Plan::READ, &rules, 3)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(compiler.compile_count(), 1);
        assert!(matches!(
            a.actions()[1],
            Action::Convert {
                from: PrimitiveKind::F32,
                to: PrimitiveKind::F64,
                ..
            }
        ));

        rules
            .register(EvolutionRule::drop_member("Point", "y"))
            .unwrap();
        let c = compiler
            .sequence(&disk, &layout, Plan::READ, &rules, 4)
            .unwrap();
        assert_eq!(compiler.compile_count(), 2);
        assert!(matches!(c.actions()[1], Action::Skip { .. }));
        assert_eq!(c.epoch(), 4);
    }

    #[test]
    fn test_sequence_display_lists_actions() {
        let reg = LayoutRegistry::new();
        reg.register(Arc::new(
            ClassDescriptor::builder("Vec3", 1)
                .array("v", PrimitiveKind::F32, 3)
                .build(),
        ))
        .unwrap();
        let body = reg.register(Arc::new(
            ClassDescriptor::builder("Body", 1)
                .object("pos", "Vec3")
                .primitive("mass", PrimitiveKind::F64)
                .build(),
        ))
        .unwrap();
        let seq = compile(body.descriptor(), &body, Plan::WRITE, &RuleSet::new(), 0).unwrap();
        let text = seq.to_string();
        assert!(text.starts_with("Body Write/ObjectWise"));
        assert!(text.contains("nested    Vec3 slot 0"));
        assert!(text.contains("copy      f64 @0"));
    }

    #[test]
    fn test_member_wise_requires_flat_class() {
        let reg = LayoutRegistry::new();
        let flat = reg.register(Arc::new(point(1, PrimitiveKind::F32))).unwrap();
        let deep = reg.register(Arc::new(
            ClassDescriptor::builder("Named", 1).text("name").build(),
        ))
        .unwrap();
        let rules = RuleSet::new();
        let config = StreamConfig::default();

        assert_eq!(choose_mode(&flat, &rules, &config), Mode::MemberWise);
        assert_eq!(choose_mode(&deep, &rules, &config), Mode::ObjectWise);
        assert_eq!(
            choose_mode(&flat, &rules, &config.clone().with_member_wise(false)),
            Mode::ObjectWise
        );
        assert!(compile(
            deep.descriptor(),
            &deep,
            Plan::WRITE_MEMBER_WISE,
            &rules,
            0
        )
        .is_err());
    }

    #[test]
    fn test_write_binding_narrows_to_older_shape() {
        let reg = LayoutRegistry::new();
        let layout = reg.register(Arc::new(
            ClassDescriptor::builder("Track", 2)
                .array("hits", PrimitiveKind::U32, 4)
                .build(),
        ))
        .unwrap();
        let old = ClassDescriptor::builder("Track", 1)
            .array("hits", PrimitiveKind::U16, 2)
            .build();
        let seq = compile(&old, &layout, Plan::WRITE, &RuleSet::new(), 0).unwrap();
        assert!(matches!(
            seq.actions()[0],
            Action::ConvertArray {
                from: PrimitiveKind::U32,
                to: PrimitiveKind::U16,
                disk_len: 2,
                mem_len: 4,
                offset: 0
            }
        ));
    }
}
