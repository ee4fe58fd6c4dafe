// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object record encoding: the executors that run compiled action sequences.
//!
//! # Record layout
//!
//! ```text
//! record      := class_tag frame
//! class_tag   := NEW_CLASS_TAG name:str | index:u32        (1-based, per buffer)
//! frame       := checksum:u32 byte_count:u32 body
//! body        := one encoding per action of the write sequence
//!
//! embedded    := frame                                      (class fixed by the member)
//! pointer     := 0 | NEW_OBJECT_TAG class_tag frame | index:u32
//! reference   := token:u64
//! text        := len:u32 utf8
//! collection  := count:u32 elements
//!   objects   := mode:u8 (0: frame*count | 1: checksum:u32 column*)
//! ```
//!
//! Every object written to a buffer (roots and new pointees) takes the next
//! 1-based object index, so later pointers can refer back to it.

pub mod reader;
pub mod writer;

pub use reader::ObjectReader;
pub use writer::{EncodedObjects, ObjectWriter};

pub(crate) const MODE_OBJECT_WISE: u8 = 0;
pub(crate) const MODE_MEMBER_WISE: u8 = 1;
