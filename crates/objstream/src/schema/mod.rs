// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema model: primitive kinds, member and class descriptors.

pub mod codec;
mod declaration;
pub mod descriptor;
pub mod member;
pub mod primitive;

pub use codec::{decode_descriptor, decode_descriptor_list, encode_descriptor, encode_descriptor_list};
pub use descriptor::{compute_checksum, ClassDescriptor, DescriptorBuilder};
pub use member::{ElementKind, MemberDescriptor, MemberKind};
pub use primitive::{PrimitiveKind, Value};
