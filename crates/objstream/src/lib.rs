// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # objstream - versioned object serialization with schema evolution
//!
//! Serializes in-memory objects into a self-describing binary form and
//! reads them back, possibly into a newer or older definition of the class.
//! The same record format backs point-to-point transport and container files.
//!
//! ## Quick Start
//!
//! ```rust
//! use objstream::{ObjectReader, ObjectWriter, SchemaContext, Value};
//!
//! let ctx = SchemaContext::default();
//! ctx.declare("class Point version 1 { f64 x; f64 y; }")?;
//!
//! let mut p = ctx.instantiate("Point")?;
//! p.set("x", 1.5f64)?;
//!
//! let mut writer = ObjectWriter::new(&ctx);
//! writer.write_object(&p)?;
//! let encoded = writer.finish();
//!
//! let back = ObjectReader::new(&ctx, encoded.bytes).read_object()?;
//! assert_eq!(back.get("x")?, Value::F64(1.5));
//! # Ok::<(), objstream::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  transport::Connection            file::{FileWriter, FileReader}    |
//! |  framing, xref piggyback, ok ack  header, records, directory        |
//! +---------------------------------------------------------------------+
//! |  stream::{ObjectWriter, ObjectReader}   executors over action lists |
//! +---------------------------------------------------------------------+
//! |  actions (compiler + cache)  <-  evolution (rules, resolution)      |
//! +---------------------------------------------------------------------+
//! |  registry (descriptors, identities)   object (layouts, instances)   |
//! +---------------------------------------------------------------------+
//! |  schema (descriptors, checksums, declarations)   wire (buffer, zip) |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`context`] - [`SchemaContext`], the state every writer and reader shares
//! - [`schema`] - class descriptors and the declaration parser
//! - [`evolution`] - rename/cast/compute/drop rules
//! - [`transport`] - message connection over a byte stream
//! - [`file`] - container files

/// Action sequences and their compiler.
pub mod actions;
/// Wire constants and runtime configuration.
pub mod config;
/// Explicit schema state shared by writers and readers.
pub mod context;
pub mod error;
/// Schema evolution rules.
pub mod evolution;
/// Container files.
pub mod file;
/// Layouts, object instances and the object arena.
pub mod object;
/// Descriptor and identity registries.
pub mod registry;
/// Class descriptors.
pub mod schema;
/// Object record writer and reader.
pub mod stream;
/// Message transport.
pub mod transport;
/// Byte buffer, codecs and messages.
pub mod wire;
/// Per-connection cross-reference tables.
pub mod xref;

pub use actions::{Action, ActionCompiler, ActionSequence, Direction, Mode, Plan};
pub use config::{CompressionAlgorithm, CompressionSettings, StreamConfig};
pub use context::SchemaContext;
pub use error::{Error, Result};
pub use evolution::{EvolutionRule, RuleSet, Transform};
pub use file::{FileReader, FileWriter};
pub use object::{
    Collection, Layout, LayoutProvider, LayoutRegistry, Object, ObjectGraph, ObjectId,
    PrimitiveArray,
};
pub use registry::{DescriptorRegistry, DescriptorToken, IdentityTable, IdentityToken};
pub use schema::{ClassDescriptor, ElementKind, MemberDescriptor, MemberKind, PrimitiveKind, Value};
pub use stream::{EncodedObjects, ObjectReader, ObjectWriter};
pub use transport::{ByteStream, Connection, ConnectionState, ConnectionStats};
pub use wire::{Codec, CodecRegistry, Message, WireBuffer, WireError};
pub use xref::CrossRefTables;
