// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compiled action sequences and their cache.

pub mod action;
pub mod compiler;

pub use action::{Action, ActionSequence, Direction, Mode, Plan};
pub use compiler::{choose_mode, compile, ActionCompiler};
