// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rule storage and resolution.
//!
//! [`resolve_read`] handles a class whose on-disk checksum differs from the
//! in-memory one. For each on-disk member, in on-disk order:
//!
//! 1. Same-name member, type compatible (exact or widening), unless that
//!    member is itself the target of a rule. It is filled even when a rule
//!    also reads the on-disk member.
//! 2. Rename or cast rule keyed by the old member name.
//! 3. Compute rule: the member is buffered; the rule fires at its last source.
//! 4. Otherwise the member is skipped and the in-memory member keeps its default.
//!
//! A primitive member feeding more than one destination is read once into
//! scratch and stored to each.

use super::rule::{EvolutionRule, Transform};
use crate::actions::compiler::{bind_cast, bind_direct, bind_write};
use crate::actions::Action;
use crate::error::{Error, Result};
use crate::object::{FieldLayout, Layout};
use crate::schema::{ClassDescriptor, MemberKind};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Registered evolution rules, per class.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: RwLock<HashMap<String, Vec<Arc<EvolutionRule>>>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule after checking its shape and that it does not collide with
    /// an existing rule for the same target and source.
    pub fn register(&self, rule: EvolutionRule) -> Result<()> {
        validate(&rule)?;
        let mut rules = self.rules.write();
        let class_rules = rules.entry(rule.class().to_string()).or_default();
        if class_rules.iter().any(|r| r.conflicts_with(&rule)) {
            return Err(Error::AmbiguousRule {
                class: rule.class().to_string(),
                target: rule.target().to_string(),
            });
        }
        log::debug!(
            "[EVOLUTION] rule {:?} {}::{:?} -> {}",
            rule.transform(),
            rule.class(),
            rule.sources(),
            rule.target()
        );
        class_rules.push(Arc::new(rule));
        Ok(())
    }

    pub fn for_class(&self, class: &str) -> Vec<Arc<EvolutionRule>> {
        self.rules.read().get(class).cloned().unwrap_or_default()
    }

    pub fn has_rules(&self, class: &str) -> bool {
        self.rules.read().get(class).is_some_and(|r| !r.is_empty())
    }

    pub fn len(&self) -> usize {
        self.rules.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate(rule: &EvolutionRule) -> Result<()> {
    if rule.sources().is_empty() {
        return Err(Error::InvalidRule(format!(
            "{}::{}: no source members",
            rule.class(),
            rule.target()
        )));
    }
    let single = matches!(
        rule.transform(),
        Transform::Rename | Transform::Cast | Transform::Drop
    );
    if single && rule.sources().len() != 1 {
        return Err(Error::InvalidRule(format!(
            "{}::{}: {:?} takes exactly one source",
            rule.class(),
            rule.target(),
            rule.transform()
        )));
    }
    let unique: HashSet<&String> = rule.sources().iter().collect();
    if unique.len() != rule.sources().len() {
        return Err(Error::InvalidRule(format!(
            "{}::{}: repeated source member",
            rule.class(),
            rule.target()
        )));
    }
    Ok(())
}

/// Result of rule resolution.
#[derive(Debug, Default)]
pub struct Resolution {
    pub actions: Vec<Action>,
    pub scratch_len: usize,
}

/// Active rules for this (disk, layout) pair, with inert ones filtered out.
fn active_rules<'a>(
    disk: &ClassDescriptor,
    layout: &Layout,
    rules: &'a [Arc<EvolutionRule>],
) -> Vec<&'a Arc<EvolutionRule>> {
    rules
        .iter()
        .filter(|r| {
            if !r.matches(disk) {
                return false;
            }
            if r.is_drop() {
                return true;
            }
            let Some(target) = layout.field(r.target()) else {
                log::debug!(
                    "[EVOLUTION] {}: target {} not in memory, rule inert",
                    r.class(),
                    r.target()
                );
                return false;
            };
            if r.is_compute() {
                let primitive_sources = r.sources().iter().all(|s| {
                    disk.member(s)
                        .is_some_and(|(_, m)| matches!(m.kind, MemberKind::Primitive(_)))
                });
                if !primitive_sources || !matches!(target.kind, MemberKind::Primitive(_)) {
                    log::warn!(
                        "[EVOLUTION] {}::{}: compute rules need primitive members, rule inert",
                        r.class(),
                        r.target()
                    );
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Resolve every on-disk member of `disk` against `layout` for reading.
pub fn resolve_read(
    disk: &ClassDescriptor,
    layout: &Layout,
    rules: &[Arc<EvolutionRule>],
) -> Resolution {
    let active = active_rules(disk, layout, rules);

    let targeted: HashSet<&str> = active
        .iter()
        .filter(|r| !r.is_drop())
        .map(|r| r.target())
        .collect();

    // last on-disk position of each compute rule's sources
    let fire_at: Vec<(usize, &Arc<EvolutionRule>)> = active
        .iter()
        .filter(|r| r.is_compute())
        .map(|r| {
            let last = r
                .sources()
                .iter()
                .filter_map(|s| disk.member(s).map(|(i, _)| i))
                .max()
                .unwrap_or(0);
            (last, *r)
        })
        .collect();

    let mut out = Resolution::default();
    let mut scratch_of: HashMap<&str, usize> = HashMap::new();

    for (pos, member) in disk.members().iter().enumerate() {
        let claims: Vec<&Arc<EvolutionRule>> = active
            .iter()
            .filter(|r| r.sources().iter().any(|s| *s == member.name))
            .copied()
            .collect();
        let same_name = layout
            .field(&member.name)
            .filter(|f| !targeted.contains(f.name.as_str()));

        if claims.is_empty() {
            // Step 1: same-name match.
            let bound = same_name.and_then(|f| bind_direct(&member.kind, f));
            match bound {
                Some(action) => out.actions.push(action),
                None => {
                    log::debug!(
                        "[EVOLUTION] {}::{} ({}) has no match in memory, skipped",
                        disk.name(),
                        member.name,
                        member.kind
                    );
                    out.actions.push(Action::Skip {
                        kind: member.kind.clone(),
                    });
                }
            }
        } else if claims.iter().all(|r| r.is_drop()) {
            out.actions.push(Action::Skip {
                kind: member.kind.clone(),
            });
        } else {
            let storing: Vec<&Arc<EvolutionRule>> = claims
                .iter()
                .filter(|r| matches!(r.transform(), Transform::Rename | Transform::Cast))
                .copied()
                .collect();
            let computes = claims.iter().any(|r| r.is_compute());
            let feeds_same_name = match (&member.kind, same_name.map(|f| &f.kind)) {
                (MemberKind::Primitive(from), Some(MemberKind::Primitive(to))) => {
                    from.widens_to(*to)
                }
                _ => false,
            };

            if storing.len() == 1 && !computes && !feeds_same_name {
                // Step 2: single rename/cast, bound straight to the target.
                let rule = storing[0];
                let action = layout
                    .field(rule.target())
                    .and_then(|f| bind_renamed(rule, &member.kind, f));
                match action {
                    Some(a) => out.actions.push(a),
                    None => {
                        log::warn!(
                            "[EVOLUTION] {}: {} ({}) cannot become {}, skipped",
                            disk.name(),
                            member.name,
                            member.kind,
                            rule.target()
                        );
                        out.actions.push(Action::Skip {
                            kind: member.kind.clone(),
                        });
                    }
                }
            } else if let MemberKind::Primitive(kind) = member.kind {
                // Step 2+3: buffer once, fan out to every claimant.
                let scratch = out.scratch_len;
                out.scratch_len += 1;
                scratch_of.insert(member.name.as_str(), scratch);
                out.actions.push(Action::ReadToScratch { kind, scratch });

                for rule in &storing {
                    if let Some(f) = layout.field(rule.target()) {
                        push_store(&mut out, rule, kind, scratch, f);
                    }
                }
                // Step 1 still applies to a claimed member.
                if feeds_same_name {
                    if let Some((MemberKind::Primitive(to), Some(offset))) =
                        same_name.map(|f| (&f.kind, f.offset()))
                    {
                        out.actions.push(Action::StoreScratch {
                            scratch,
                            to: *to,
                            offset,
                        });
                    }
                }
            } else {
                log::warn!(
                    "[EVOLUTION] {}::{}: several rules claim a non-primitive member, skipped",
                    disk.name(),
                    member.name
                );
                out.actions.push(Action::Skip {
                    kind: member.kind.clone(),
                });
            }
        }

        // Step 3: fire compute rules whose last source was just read.
        for (last, rule) in &fire_at {
            if *last != pos {
                continue;
            }
            let inputs: Option<Vec<usize>> = rule
                .sources()
                .iter()
                .map(|s| scratch_of.get(s.as_str()).copied())
                .collect();
            let target = layout.field(rule.target());
            match (inputs, target.and_then(|f| f.offset().map(|o| (f, o)))) {
                (Some(inputs), Some((f, offset))) => {
                    if let MemberKind::Primitive(to) = f.kind {
                        out.actions.push(Action::ApplyRule {
                            rule: Arc::clone(rule),
                            inputs,
                            to,
                            offset,
                        });
                    }
                }
                _ => log::warn!(
                    "[EVOLUTION] {}::{}: compute inputs unavailable, rule skipped",
                    disk.name(),
                    rule.target()
                ),
            }
        }
    }

    out
}

fn bind_renamed(rule: &EvolutionRule, disk: &MemberKind, target: &FieldLayout) -> Option<Action> {
    match rule.transform() {
        Transform::Cast => bind_cast(disk, target),
        _ => bind_direct(disk, target),
    }
}

fn push_store(
    out: &mut Resolution,
    rule: &EvolutionRule,
    from: crate::schema::PrimitiveKind,
    scratch: usize,
    target: &FieldLayout,
) {
    let (MemberKind::Primitive(to), Some(offset)) = (&target.kind, target.offset()) else {
        return;
    };
    let allowed = match rule.transform() {
        Transform::Cast => true,
        _ => from.widens_to(*to),
    };
    if allowed {
        out.actions.push(Action::StoreScratch {
            scratch,
            to: *to,
            offset,
        });
    }
}

/// Resolve members for writing `layout` objects as `target` (possibly an older version).
///
/// Members missing from memory are written as zero defaults; in-memory
/// members absent from `target` are not emitted. A rename rule `old -> new`
/// lets `target.old` be fed from `memory.new`.
pub fn resolve_write(
    target: &ClassDescriptor,
    layout: &Layout,
    rules: &[Arc<EvolutionRule>],
) -> Resolution {
    let reverse: Vec<&Arc<EvolutionRule>> = rules
        .iter()
        .filter(|r| {
            matches!(r.transform(), Transform::Rename | Transform::Cast)
                && r.source_checksum().map_or(true, |c| c == target.checksum())
        })
        .collect();

    let mut out = Resolution::default();
    for member in target.members() {
        let field = layout.field(&member.name).or_else(|| {
            reverse
                .iter()
                .find(|r| r.sources()[0] == member.name)
                .and_then(|r| layout.field(r.target()))
        });
        let action = field.and_then(|f| bind_write(&member.kind, f));
        match action {
            Some(a) => out.actions.push(a),
            None => {
                log::debug!(
                    "[EVOLUTION] writing {}::{} as default",
                    target.name(),
                    member.name
                );
                out.actions.push(Action::WriteDefault {
                    kind: member.kind.clone(),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PrimitiveKind, Value};

    fn layout(desc: ClassDescriptor) -> Layout {
        Layout::from_descriptor(Arc::new(desc)).unwrap()
    }

    #[test]
    fn test_ambiguous_rule_rejected_at_registration() {
        let set = RuleSet::new();
        set.register(EvolutionRule::rename("P", "a", "b")).unwrap();
        let err = set.register(EvolutionRule::cast("P", "a", "b")).unwrap_err();
        assert!(matches!(err, Error::AmbiguousRule { .. }));
        set.register(EvolutionRule::rename("P", "a", "c")).unwrap();
        set.register(EvolutionRule::rename("Q", "a", "b")).unwrap();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let set = RuleSet::new();
        let none: [&str; 0] = [];
        assert!(matches!(
            set.register(EvolutionRule::compute("P", none, "x", |_: &[Value]| Value::I8(0))),
            Err(Error::InvalidRule(_))
        ));
        assert!(matches!(
            set.register(EvolutionRule::compute("P", ["a", "a"], "x", |_: &[Value]| Value::I8(0))),
            Err(Error::InvalidRule(_))
        ));
    }

    #[test]
    fn test_rename_binds_to_target_offset() {
        let disk = ClassDescriptor::builder("P", 1)
            .primitive("a", PrimitiveKind::I32)
            .build();
        let mem = layout(
            ClassDescriptor::builder("P", 2)
                .primitive("pad", PrimitiveKind::I32)
                .primitive("b", PrimitiveKind::I32)
                .build(),
        );
        let rules = vec![Arc::new(EvolutionRule::rename("P", "a", "b"))];
        let res = resolve_read(&disk, &mem, &rules);
        assert!(matches!(
            res.actions.as_slice(),
            [Action::CopyPrimitive {
                kind: PrimitiveKind::I32,
                offset: 4
            }]
        ));
    }

    #[test]
    fn test_renamed_source_still_fills_same_name_member() {
        let disk = ClassDescriptor::builder("P", 1)
            .primitive("a", PrimitiveKind::I32)
            .build();
        let mem = layout(
            ClassDescriptor::builder("P", 2)
                .primitive("a", PrimitiveKind::I32)
                .primitive("b", PrimitiveKind::I64)
                .build(),
        );
        let rules = vec![Arc::new(EvolutionRule::rename("P", "a", "b"))];
        let res = resolve_read(&disk, &mem, &rules);
        assert_eq!(res.scratch_len, 1);
        assert!(matches!(
            res.actions.as_slice(),
            [
                Action::ReadToScratch {
                    kind: PrimitiveKind::I32,
                    scratch: 0
                },
                Action::StoreScratch {
                    scratch: 0,
                    to: PrimitiveKind::I64,
                    offset: 8
                },
                Action::StoreScratch {
                    scratch: 0,
                    to: PrimitiveKind::I32,
                    offset: 0
                }
            ]
        ));
    }

    #[test]
    fn test_widening_name_match_and_skip() {
        let disk = ClassDescriptor::builder("P", 1)
            .primitive("n", PrimitiveKind::I16)
            .primitive("gone", PrimitiveKind::F64)
            .primitive("narrow", PrimitiveKind::I64)
            .build();
        let mem = layout(
            ClassDescriptor::builder("P", 2)
                .primitive("n", PrimitiveKind::I64)
                .primitive("narrow", PrimitiveKind::I32)
                .build(),
        );
        let res = resolve_read(&disk, &mem, &[]);
        assert!(matches!(
            res.actions.as_slice(),
            [
                Action::Convert {
                    from: PrimitiveKind::I16,
                    to: PrimitiveKind::I64,
                    offset: 0
                },
                Action::Skip { .. },
                Action::Skip { .. }
            ]
        ));

        // an explicit cast allows the narrowing
        let rules = vec![Arc::new(EvolutionRule::cast("P", "narrow", "narrow"))];
        let res = resolve_read(&disk, &mem, &rules);
        assert!(matches!(
            res.actions[2],
            Action::Convert {
                from: PrimitiveKind::I64,
                to: PrimitiveKind::I32,
                offset: 8
            }
        ));
    }

    #[test]
    fn test_compute_fires_at_last_source_in_disk_order() {
        let disk = ClassDescriptor::builder("V", 1)
            .primitive("y", PrimitiveKind::F32)
            .primitive("id", PrimitiveKind::U8)
            .primitive("x", PrimitiveKind::F32)
            .build();
        let mem = layout(
            ClassDescriptor::builder("V", 2)
                .primitive("id", PrimitiveKind::U8)
                .primitive("r", PrimitiveKind::F64)
                .primitive("x", PrimitiveKind::F32)
                .build(),
        );
        let rules = vec![Arc::new(EvolutionRule::compute(
            "V",
            ["x", "y"],
            "r",
            |v: &[Value]| Value::F64(v[0].as_f64().hypot(v[1].as_f64())),
        ))];
        let res = resolve_read(&disk, &mem, &rules);
        assert_eq!(res.scratch_len, 2);
        let kinds: Vec<&str> = res
            .actions
            .iter()
            .map(|a| match a {
                Action::ReadToScratch { .. } => "scratch",
                Action::StoreScratch { .. } => "store",
                Action::ApplyRule { .. } => "rule",
                Action::CopyPrimitive { .. } => "copy",
                _ => "other",
            })
            .collect();
        // y buffered, id copied, x buffered and kept, then the rule fires
        assert_eq!(kinds, vec!["scratch", "copy", "scratch", "store", "rule"]);
        match &res.actions[4] {
            Action::ApplyRule { inputs, .. } => assert_eq!(inputs, &vec![1, 0]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_checksum_precondition_keeps_rule_inert() {
        let disk = ClassDescriptor::builder("P", 1)
            .primitive("a", PrimitiveKind::I32)
            .build();
        let mem = layout(
            ClassDescriptor::builder("P", 2)
                .primitive("b", PrimitiveKind::I32)
                .build(),
        );
        let rules = vec![Arc::new(
            EvolutionRule::rename("P", "a", "b").when_checksum(disk.checksum().wrapping_add(1)),
        )];
        let res = resolve_read(&disk, &mem, &rules);
        assert!(matches!(res.actions.as_slice(), [Action::Skip { .. }]));
    }

    #[test]
    fn test_write_to_older_target() {
        let old = ClassDescriptor::builder("P", 1)
            .primitive("a", PrimitiveKind::I32)
            .primitive("legacy", PrimitiveKind::U16)
            .build();
        let mem = layout(
            ClassDescriptor::builder("P", 2)
                .primitive("b", PrimitiveKind::I64)
                .primitive("extra", PrimitiveKind::F64)
                .build(),
        );
        let rules = vec![Arc::new(EvolutionRule::rename("P", "a", "b"))];
        let res = resolve_write(&old, &mem, &rules);
        assert!(matches!(
            res.actions.as_slice(),
            [
                Action::Convert {
                    from: PrimitiveKind::I64,
                    to: PrimitiveKind::I32,
                    offset: 0
                },
                Action::WriteDefault {
                    kind: MemberKind::Primitive(PrimitiveKind::U16)
                }
            ]
        ));
    }
}
