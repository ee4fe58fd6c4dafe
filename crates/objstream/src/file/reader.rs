// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Container file reader.

use super::format::{read_directory, FileHeader, RecordHeader, FLAG_COMPRESSED_RECORDS};
use crate::context::SchemaContext;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectGraph, ObjectId};
use crate::schema::ClassDescriptor;
use crate::stream::ObjectReader;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Sequential reader over a finished container.
///
/// Opening registers every directory descriptor with the context, so
/// records decode against whatever classes the context currently declares.
pub struct FileReader<'a, R: Read + Seek> {
    ctx: &'a SchemaContext,
    input: R,
    header: FileHeader,
    directory: Vec<Arc<ClassDescriptor>>,
    position: u64,
    records_read: u64,
}

impl<'a> FileReader<'a, BufReader<File>> {
    pub fn open<P: AsRef<Path>>(ctx: &'a SchemaContext, path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(Error::Io)?;
        log::debug!("[FILE] reading {}", path.as_ref().display());
        Self::new(ctx, BufReader::new(file))
    }
}

impl<'a, R: Read + Seek> FileReader<'a, R> {
    pub fn new(ctx: &'a SchemaContext, mut input: R) -> Result<Self> {
        let header = FileHeader::read(&mut input)?;
        if !header.is_finished() {
            return Err(Error::Corrupted(
                "file was not finished (no directory)".into(),
            ));
        }
        let file_len = input.seek(SeekFrom::End(0)).map_err(Error::Io)?;
        if header.directory_offset < FileHeader::SIZE as u64
            || header.directory_offset > file_len
        {
            return Err(Error::Corrupted(format!(
                "directory offset {} outside a file of {} bytes",
                header.directory_offset, file_len
            )));
        }

        input
            .seek(SeekFrom::Start(header.directory_offset))
            .map_err(Error::Io)?;
        let max = ctx.config().max_message_size;
        // Section header: byte length and CRC.
        let directory_len = usize::try_from((file_len - header.directory_offset).saturating_sub(8))
            .unwrap_or(usize::MAX);
        let decoded = read_directory(&mut input, directory_len.min(max), max)?;
        if decoded.len() != header.directory_count as usize {
            return Err(Error::Corrupted(format!(
                "directory holds {} entries, header says {}",
                decoded.len(),
                header.directory_count
            )));
        }
        let mut directory = Vec::with_capacity(decoded.len());
        for desc in decoded {
            let token = ctx.descriptors().register(desc);
            let desc = ctx.descriptors().get(token).ok_or_else(|| {
                Error::InvalidState(format!("descriptor {} vanished after registration", token))
            })?;
            directory.push(desc);
        }
        log::debug!(
            "[FILE] directory loaded: {} descriptors, {} records",
            directory.len(),
            header.record_count
        );

        let position = FileHeader::SIZE as u64;
        input.seek(SeekFrom::Start(position)).map_err(Error::Io)?;
        Ok(Self {
            ctx,
            input,
            header,
            directory,
            position,
            records_read: 0,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn directory(&self) -> &[Arc<ClassDescriptor>] {
        &self.directory
    }

    pub fn record_count(&self) -> u64 {
        self.header.record_count
    }

    pub fn records_remaining(&self) -> u64 {
        self.header.record_count - self.records_read
    }

    /// Read the next record's payload and its root descriptor.
    ///
    /// The cursor moves past the record even when its CRC fails, so one
    /// corrupt record does not hide the ones after it.
    fn next_payload(&mut self) -> Result<Option<(Vec<u8>, Arc<ClassDescriptor>)>> {
        if self.records_read >= self.header.record_count
            || self.position >= self.header.directory_offset
        {
            return Ok(None);
        }
        let record = RecordHeader::read(&mut self.input).map_err(Error::Io)?;
        let end = self.position + RecordHeader::SIZE as u64 + u64::from(record.payload_len);
        if end > self.header.directory_offset {
            return Err(Error::Corrupted(format!(
                "record {} runs into the directory",
                self.records_read
            )));
        }
        let mut payload = vec![0u8; record.payload_len as usize];
        self.input.read_exact(&mut payload).map_err(Error::Io)?;
        self.position = end;
        let index = self.records_read;
        self.records_read += 1;

        if crc32fast::hash(&payload) != record.crc {
            log::warn!("[FILE] record {} failed its CRC check", index);
            return Err(Error::Corrupted(format!("record {}: CRC mismatch", index)));
        }
        let root = self
            .directory
            .get(record.directory_index as usize)
            .cloned()
            .ok_or_else(|| {
                Error::Corrupted(format!(
                    "record {}: directory index {} out of range",
                    index, record.directory_index
                ))
            })?;

        let payload = if self.header.flags & FLAG_COMPRESSED_RECORDS != 0 {
            let config = self.ctx.config();
            config.codecs.decompress(&payload, config.max_message_size)?
        } else {
            payload
        };
        Ok(Some((payload, root)))
    }

    /// Next record as a standalone object; `None` after the last record.
    pub fn read_object(&mut self) -> Result<Option<Object>> {
        let Some((payload, root)) = self.next_payload()? else {
            return Ok(None);
        };
        let obj = ObjectReader::new(self.ctx, payload).read_object()?;
        check_root(&obj, &root)?;
        Ok(Some(obj))
    }

    /// Next record with every pointee, plus the root's id.
    pub fn read_graph(&mut self) -> Result<Option<(ObjectGraph, ObjectId)>> {
        let Some((payload, root_desc)) = self.next_payload()? else {
            return Ok(None);
        };
        let mut reader = ObjectReader::new(self.ctx, payload);
        let root = reader.read_root()?;
        let graph = reader.into_graph();
        if let Some(obj) = graph.get(root) {
            check_root(obj, &root_desc)?;
        }
        Ok(Some((graph, root)))
    }
}

fn check_root(obj: &Object, root: &ClassDescriptor) -> Result<()> {
    if obj.class_name() != root.name() {
        return Err(Error::SchemaMismatch(format!(
            "record decodes to {} but the directory names {}",
            obj.class_name(),
            root.name()
        )));
    }
    Ok(())
}
