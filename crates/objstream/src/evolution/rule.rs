// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Evolution rules.

use crate::schema::{ClassDescriptor, Value};
use std::fmt;
use std::sync::Arc;

/// Pure function deriving a new member from old ones.
pub type ComputeFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// What a rule does with its source members.
#[derive(Clone)]
pub enum Transform {
    /// Old member becomes the target member. Kinds must match or widen.
    Rename,
    /// Numeric conversion, narrowing allowed. Source and target may share a name.
    Cast,
    /// Target computed from one or more old primitive members.
    Compute(ComputeFn),
    /// Old member is read and discarded.
    Drop,
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Rename => f.write_str("Rename"),
            Transform::Cast => f.write_str("Cast"),
            Transform::Compute(_) => f.write_str("Compute(<fn>)"),
            Transform::Drop => f.write_str("Drop"),
        }
    }
}

/// A registered transform from on-disk members to an in-memory member.
#[derive(Debug, Clone)]
pub struct EvolutionRule {
    class: String,
    source_checksum: Option<u32>,
    sources: Vec<String>,
    target: String,
    transform: Transform,
}

impl EvolutionRule {
    /// `from` on disk is read into `to` in memory.
    pub fn rename(class: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            source_checksum: None,
            sources: vec![from.into()],
            target: to.into(),
            transform: Transform::Rename,
        }
    }

    /// `from` on disk is converted into `to`, even when that narrows.
    pub fn cast(class: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            source_checksum: None,
            sources: vec![from.into()],
            target: to.into(),
            transform: Transform::Cast,
        }
    }

    /// `target` is computed by `f` from `sources`, passed in the listed order.
    pub fn compute<I, S, F>(class: impl Into<String>, sources: I, target: impl Into<String>, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            class: class.into(),
            source_checksum: None,
            sources: sources.into_iter().map(Into::into).collect(),
            target: target.into(),
            transform: Transform::Compute(Arc::new(f)),
        }
    }

    /// On-disk `member` is discarded silently.
    pub fn drop_member(class: impl Into<String>, member: impl Into<String>) -> Self {
        let member = member.into();
        Self {
            class: class.into(),
            source_checksum: None,
            sources: vec![member.clone()],
            target: member,
            transform: Transform::Drop,
        }
    }

    /// Only apply when the on-disk descriptor has this checksum.
    pub fn when_checksum(mut self, checksum: u32) -> Self {
        self.source_checksum = Some(checksum);
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn source_checksum(&self) -> Option<u32> {
        self.source_checksum
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn is_drop(&self) -> bool {
        matches!(self.transform, Transform::Drop)
    }

    pub fn is_compute(&self) -> bool {
        matches!(self.transform, Transform::Compute(_))
    }

    /// Precondition: checksum matches (if set) and every source exists on disk.
    pub fn matches(&self, disk: &ClassDescriptor) -> bool {
        if disk.name() != self.class {
            return false;
        }
        if self.source_checksum.is_some_and(|c| c != disk.checksum()) {
            return false;
        }
        self.sources.iter().all(|s| disk.member(s).is_some())
    }

    /// Run a compute rule; other transforms pass the first input through.
    pub fn apply(&self, inputs: &[Value]) -> Value {
        match &self.transform {
            Transform::Compute(f) => f(inputs),
            _ => inputs.first().copied().unwrap_or(Value::Bool(false)),
        }
    }

    /// Two rules can claim the same target from the same source.
    pub(crate) fn conflicts_with(&self, other: &EvolutionRule) -> bool {
        let preconditions_overlap = match (self.source_checksum, other.source_checksum) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        preconditions_overlap
            && self.class == other.class
            && self.target == other.target
            && self.sources.iter().any(|s| other.sources.contains(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PrimitiveKind;

    #[test]
    fn test_precondition() {
        let old = ClassDescriptor::builder("P", 1)
            .primitive("a", PrimitiveKind::I32)
            .build();
        let rule = EvolutionRule::rename("P", "a", "b");
        assert!(rule.matches(&old));
        assert!(!rule.clone().when_checksum(old.checksum() ^ 1).matches(&old));
        assert!(rule.clone().when_checksum(old.checksum()).matches(&old));
        assert!(!EvolutionRule::rename("P", "zz", "b").matches(&old));
        assert!(!EvolutionRule::rename("Q", "a", "b").matches(&old));
    }

    #[test]
    fn test_conflicts() {
        let a = EvolutionRule::rename("P", "x", "y");
        let b = EvolutionRule::cast("P", "x", "y");
        let c = EvolutionRule::rename("P", "x", "z");
        let d = EvolutionRule::rename("P", "x", "y").when_checksum(7);
        let e = EvolutionRule::rename("P", "x", "y").when_checksum(8);
        assert!(a.conflicts_with(&b));
        assert!(!a.conflicts_with(&c));
        assert!(a.conflicts_with(&d));
        assert!(!d.conflicts_with(&e));
    }

    #[test]
    fn test_compute_apply() {
        let rule = EvolutionRule::compute("P", ["x", "y"], "sum", |v: &[Value]| {
            Value::F64(v[0].as_f64() + v[1].as_f64())
        });
        assert_eq!(rule.apply(&[Value::I32(2), Value::F32(0.5)]), Value::F64(2.5));
        assert_eq!(format!("{:?}", rule.transform()), "Compute(<fn>)");
    }
}
