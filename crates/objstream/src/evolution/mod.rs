// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema evolution: rules and their resolution into actions.

pub mod engine;
pub mod rule;

pub use engine::{resolve_read, resolve_write, Resolution, RuleSet};
pub use rule::{ComputeFn, EvolutionRule, Transform};
