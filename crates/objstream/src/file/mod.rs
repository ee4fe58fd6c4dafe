// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Persisted container: object records plus a descriptor directory.
//!
//! The directory plays the role schema-update messages play on a
//! connection: each distinct descriptor is stored once and records refer
//! to it by index.

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{FileHeader, RecordHeader, FLAG_COMPRESSED_RECORDS, FORMAT_VERSION, MAGIC};
pub use reader::FileReader;
pub use writer::FileWriter;
