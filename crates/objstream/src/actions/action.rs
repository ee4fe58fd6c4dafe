// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compiled actions and action sequences.
//!
//! Actions are a flat tagged enum dispatched by `match` in the executors.
//! Offsets and slot indices always refer to the in-memory layout; the wire
//! side is implied by the action order.

use crate::evolution::EvolutionRule;
use crate::schema::{ElementKind, MemberKind, PrimitiveKind};
use std::fmt;
use std::sync::Arc;

/// Read (wire to memory) or write (memory to wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
}

/// Traversal order for collections of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// All members of one object, then the next object.
    ObjectWise,
    /// One member across every object of the collection, then the next member.
    MemberWise,
}

/// Direction and mode of a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Plan {
    pub direction: Direction,
    pub mode: Mode,
}

impl Plan {
    pub const READ: Plan = Plan {
        direction: Direction::Read,
        mode: Mode::ObjectWise,
    };
    pub const WRITE: Plan = Plan {
        direction: Direction::Write,
        mode: Mode::ObjectWise,
    };
    pub const READ_MEMBER_WISE: Plan = Plan {
        direction: Direction::Read,
        mode: Mode::MemberWise,
    };
    pub const WRITE_MEMBER_WISE: Plan = Plan {
        direction: Direction::Write,
        mode: Mode::MemberWise,
    };
}

/// One low-level read or write step.
#[derive(Debug, Clone)]
pub enum Action {
    /// Primitive, same kind on both sides.
    CopyPrimitive { kind: PrimitiveKind, offset: usize },
    /// Fixed array, same element kind and length on both sides.
    CopyArray {
        kind: PrimitiveKind,
        len: u32,
        offset: usize,
    },
    /// Primitive converted between wire kind and memory kind.
    ///
    /// Read: `from` is the wire kind. Write: `from` is the memory kind.
    Convert {
        from: PrimitiveKind,
        to: PrimitiveKind,
        offset: usize,
    },
    /// Fixed array with differing element kind or length. Missing elements
    /// stay zero (read) or are written as zero (write); extra ones are dropped.
    ConvertArray {
        from: PrimitiveKind,
        to: PrimitiveKind,
        disk_len: u32,
        mem_len: u32,
        offset: usize,
    },
    Text { slot: usize },
    /// Embedded object or base part, streamed as a checksummed frame.
    Nested { class: String, slot: usize },
    Pointer { class: String, slot: usize },
    Reference { slot: usize },
    Collection {
        disk: ElementKind,
        mem: ElementKind,
        slot: usize,
    },
    /// Read a primitive into scratch storage for later rule actions.
    ReadToScratch { kind: PrimitiveKind, scratch: usize },
    /// Store a scratch value into memory, converted to `to`.
    StoreScratch {
        scratch: usize,
        to: PrimitiveKind,
        offset: usize,
    },
    /// Run a compute rule over scratch values and store the result.
    ApplyRule {
        rule: Arc<EvolutionRule>,
        inputs: Vec<usize>,
        to: PrimitiveKind,
        offset: usize,
    },
    /// Consume an on-disk member without storing it.
    Skip { kind: MemberKind },
    /// Emit the zero value of a target member absent from memory.
    WriteDefault { kind: MemberKind },
}

impl Action {
    /// True for actions that touch only inline storage or scratch.
    ///
    /// Member-wise sequences consist solely of these.
    pub fn is_inline(&self) -> bool {
        match self {
            Action::CopyPrimitive { .. }
            | Action::CopyArray { .. }
            | Action::Convert { .. }
            | Action::ConvertArray { .. }
            | Action::ReadToScratch { .. }
            | Action::StoreScratch { .. }
            | Action::ApplyRule { .. } => true,
            Action::Skip { kind } | Action::WriteDefault { kind } => kind.is_inline(),
            _ => false,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CopyPrimitive { kind, offset } => write!(f, "copy      {} @{}", kind, offset),
            Action::CopyArray { kind, len, offset } => {
                write!(f, "copy[]    {}[{}] @{}", kind, len, offset)
            }
            Action::Convert { from, to, offset } => {
                write!(f, "convert   {} -> {} @{}", from, to, offset)
            }
            Action::ConvertArray {
                from,
                to,
                disk_len,
                mem_len,
                offset,
            } => write!(
                f,
                "convert[] {}[{}] -> {}[{}] @{}",
                from, disk_len, to, mem_len, offset
            ),
            Action::Text { slot } => write!(f, "text      slot {}", slot),
            Action::Nested { class, slot } => write!(f, "nested    {} slot {}", class, slot),
            Action::Pointer { class, slot } => write!(f, "pointer   {}* slot {}", class, slot),
            Action::Reference { slot } => write!(f, "reference slot {}", slot),
            Action::Collection { disk, mem, slot } => {
                write!(f, "collect   {:?} -> {:?} slot {}", disk, mem, slot)
            }
            Action::ReadToScratch { kind, scratch } => {
                write!(f, "scratch   {} -> s{}", kind, scratch)
            }
            Action::StoreScratch { scratch, to, offset } => {
                write!(f, "store     s{} -> {} @{}", scratch, to, offset)
            }
            Action::ApplyRule {
                rule,
                inputs,
                to,
                offset,
            } => {
                let inputs: Vec<String> = inputs.iter().map(|i| format!("s{}", i)).collect();
                write!(
                    f,
                    "rule      {}({}) -> {} @{}",
                    rule.target(),
                    inputs.join(","),
                    to,
                    offset
                )
            }
            Action::Skip { kind } => write!(f, "skip      {}", kind),
            Action::WriteDefault { kind } => write!(f, "default   {}", kind),
        }
    }
}

/// Ordered actions for one (on-disk descriptor, in-memory layout) pair.
#[derive(Debug, Clone)]
pub struct ActionSequence {
    pub(crate) class: String,
    pub(crate) plan: Plan,
    pub(crate) disk_checksum: u32,
    pub(crate) memory_checksum: u32,
    pub(crate) epoch: u64,
    pub(crate) actions: Vec<Action>,
    pub(crate) scratch_len: usize,
}

impl ActionSequence {
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn plan(&self) -> Plan {
        self.plan
    }

    pub fn disk_checksum(&self) -> u32 {
        self.disk_checksum
    }

    pub fn memory_checksum(&self) -> u32 {
        self.memory_checksum
    }

    /// Registry epoch the sequence was compiled under.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn scratch_len(&self) -> usize {
        self.scratch_len
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Sequence is a straight copy (no conversion, skip or rule).
    pub fn is_direct(&self) -> bool {
        self.disk_checksum == self.memory_checksum
    }
}

impl fmt::Display for ActionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {:?}/{:?} disk={:#010x} mem={:#010x} epoch={}",
            self.class,
            self.plan.direction,
            self.plan.mode,
            self.disk_checksum,
            self.memory_checksum,
            self.epoch
        )?;
        for (i, a) in self.actions.iter().enumerate() {
            writeln!(f, "  {:3} {}", i, a)?;
        }
        Ok(())
    }
}
