// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Container file writer.

use super::format::{encode_directory, FileHeader, RecordHeader, FLAG_COMPRESSED_RECORDS};
use crate::context::SchemaContext;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectGraph, ObjectId};
use crate::schema::ClassDescriptor;
use crate::stream::{EncodedObjects, ObjectWriter};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

/// Appends object records and writes the descriptor directory on `finish`.
///
/// Each descriptor a record depends on enters the directory once, in
/// first-use order. The header is rewritten in place when the file is
/// finished; an unfinished file has a zero directory offset.
pub struct FileWriter<'a, W: Write + Seek> {
    ctx: &'a SchemaContext,
    out: W,
    header: FileHeader,
    directory: Vec<Arc<ClassDescriptor>>,
    directory_index: HashMap<(String, u32), u32>,
}

impl<'a> FileWriter<'a, BufWriter<File>> {
    /// Create (truncate) `path`.
    pub fn create<P: AsRef<Path>>(ctx: &'a SchemaContext, path: P) -> Result<Self> {
        let file = File::create(path.as_ref()).map_err(Error::Io)?;
        log::debug!("[FILE] writing {}", path.as_ref().display());
        Self::new(ctx, BufWriter::new(file))
    }
}

impl<'a, W: Write + Seek> FileWriter<'a, W> {
    /// Start a container on `out`, writing a placeholder header.
    pub fn new(ctx: &'a SchemaContext, mut out: W) -> Result<Self> {
        let flags = if ctx.config().compression.is_enabled() {
            FLAG_COMPRESSED_RECORDS
        } else {
            0
        };
        let header = FileHeader::new(flags);
        header.write(&mut out).map_err(Error::Io)?;
        Ok(Self {
            ctx,
            out,
            header,
            directory: Vec::new(),
            directory_index: HashMap::new(),
        })
    }

    pub fn record_count(&self) -> u64 {
        self.header.record_count
    }

    /// Descriptors collected so far.
    pub fn directory(&self) -> &[Arc<ClassDescriptor>] {
        &self.directory
    }

    /// Append one standalone object.
    pub fn write_object(&mut self, obj: &Object) -> Result<u64> {
        let mut writer = ObjectWriter::new(self.ctx);
        writer.write_object(obj)?;
        self.append(writer.finish(), obj.class_name())
    }

    /// Append `root` and everything reachable from it as one record.
    pub fn write_graph(&mut self, graph: &ObjectGraph, root: ObjectId) -> Result<u64> {
        let class = graph
            .get(root)
            .map(|o| o.class_name().to_string())
            .ok_or_else(|| Error::InvalidState(format!("{} is not in the graph", root)))?;
        let mut writer = ObjectWriter::new(self.ctx);
        writer.write_root(graph, root)?;
        self.append(writer.finish(), &class)
    }

    fn directory_entry(&mut self, desc: &Arc<ClassDescriptor>) -> u32 {
        let key = (desc.name().to_string(), desc.checksum());
        if let Some(&index) = self.directory_index.get(&key) {
            return index;
        }
        let index = self.directory.len() as u32;
        self.directory.push(Arc::clone(desc));
        self.directory_index.insert(key, index);
        index
    }

    fn append(&mut self, encoded: EncodedObjects, root_class: &str) -> Result<u64> {
        let mut root_index = None;
        for desc in &encoded.descriptors {
            let index = self.directory_entry(desc);
            if root_index.is_none() && desc.name() == root_class {
                root_index = Some(index);
            }
        }
        let directory_index = root_index.ok_or_else(|| {
            Error::InvalidState(format!("record for {} used no descriptor of it", root_class))
        })?;

        let payload = if self.header.flags & FLAG_COMPRESSED_RECORDS != 0 {
            self.pack(&encoded.bytes)?
        } else {
            encoded.bytes
        };
        let payload_len = u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge {
            len: payload.len(),
            max: u32::MAX as usize,
        })?;

        let record = RecordHeader {
            payload_len,
            crc: crc32fast::hash(&payload),
            directory_index,
        };
        record.write(&mut self.out).map_err(Error::Io)?;
        self.out.write_all(&payload).map_err(Error::Io)?;

        let index = self.header.record_count;
        self.header.record_count += 1;
        Ok(index)
    }

    /// Compressed form of `bytes`, or the stored form when it is below
    /// `min_compress_size` or does not shrink.
    fn pack(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let config = self.ctx.config();
        if bytes.len() >= config.min_compress_size {
            let packed = config.codecs.compress(config.compression, bytes)?;
            if packed.len() < bytes.len() {
                return Ok(packed);
            }
        }
        config.codecs.store(bytes)
    }

    /// Write the directory, patch the header and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        let directory_offset = self.out.stream_position().map_err(Error::Io)?;
        let directory = encode_directory(&self.directory)?;
        self.out.write_all(&directory).map_err(Error::Io)?;

        self.header.directory_offset = directory_offset;
        self.header.directory_count = self.directory.len() as u32;
        self.out.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
        self.header.write(&mut self.out).map_err(Error::Io)?;
        self.out.seek(SeekFrom::End(0)).map_err(Error::Io)?;
        self.out.flush().map_err(Error::Io)?;

        log::debug!(
            "[FILE] finished: {} records, {} directory entries",
            self.header.record_count,
            self.header.directory_count
        );
        Ok(self.out)
    }
}
