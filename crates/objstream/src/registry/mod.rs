// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared registries: class descriptors and object identities.

pub mod descriptors;
pub mod identity;

pub use descriptors::{DescriptorRegistry, DescriptorToken};
pub use identity::{IdentityTable, IdentityToken};
