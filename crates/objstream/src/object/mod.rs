// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory side: layouts, object instances, the object arena and the
//! layout provider seam.

pub mod graph;
pub mod instance;
pub mod layout;
pub mod provider;

pub use graph::{ObjectGraph, ObjectId};
pub use instance::{Collection, Object, PrimitiveArray, Slot};
pub use layout::{FieldLayout, Layout, Storage};
pub use provider::{instantiate, LayoutProvider, LayoutRegistry};
