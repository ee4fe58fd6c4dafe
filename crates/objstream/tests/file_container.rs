// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Container files on disk.

use objstream::file::{FileHeader, RecordHeader};
use objstream::{
    Error, EvolutionRule, FileReader, FileWriter, ObjectGraph, SchemaContext, Value,
};
use std::fs;
use std::io::{Seek, SeekFrom, Write};

const TRACK_V1: &str = "class Track version 1 { u32 id; f32 pt; Track* parent; }";
const TRACK_V2: &str = "class Track version 2 { u32 id; f64 momentum; Track* parent; }";

#[test]
fn file_written_by_old_schema_reads_with_new() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracks.objs");

    let old = SchemaContext::default();
    old.declare(TRACK_V1).unwrap();
    {
        let mut w = FileWriter::create(&old, &path).unwrap();
        for i in 0..4u32 {
            let mut graph = ObjectGraph::new();
            let mut parent = old.instantiate("Track").unwrap();
            parent.set("id", 1000 + i).unwrap();
            let parent = graph.add(parent);
            let mut child = old.instantiate("Track").unwrap();
            child.set("id", i).unwrap();
            child.set("pt", 2.5f32 * i as f32).unwrap();
            child.set_pointer("parent", Some(parent)).unwrap();
            let child = graph.add(child);
            w.write_graph(&graph, child).unwrap();
        }
        w.finish().unwrap();
    }

    // The reader never saw v1 declared; the directory carries it.
    let new = SchemaContext::default();
    new.declare(TRACK_V2).unwrap();
    new.add_rule(EvolutionRule::rename("Track", "pt", "momentum"))
        .unwrap();
    let mut r = FileReader::open(&new, &path).unwrap();
    assert_eq!(r.record_count(), 4);
    assert_eq!(r.directory().len(), 1);
    assert_eq!(r.directory()[0].version(), 1);
    assert_eq!(new.descriptors().versions("Track").len(), 2);

    let mut i = 0u32;
    while let Some((graph, root)) = r.read_graph().unwrap() {
        let child = graph.get(root).unwrap();
        assert_eq!(child.get("id").unwrap(), Value::U32(i));
        assert_eq!(child.get("momentum").unwrap(), Value::F64(2.5 * f64::from(i)));
        let parent = child.pointer("parent").unwrap().unwrap();
        assert_eq!(graph.get(parent).unwrap().get("id").unwrap(), Value::U32(1000 + i));
        i += 1;
    }
    assert_eq!(i, 4);
}

#[test]
fn corrupted_record_on_disk_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("damaged.objs");

    let ctx = SchemaContext::default();
    ctx.declare("class Reading { u64 stamp; i32 level; }").unwrap();
    let mut w = FileWriter::create(&ctx, &path).unwrap();
    for stamp in 0..3u64 {
        let mut r = ctx.instantiate("Reading").unwrap();
        r.set("stamp", stamp).unwrap();
        r.set("level", -7i32).unwrap();
        w.write_object(&r).unwrap();
    }
    w.finish().unwrap();

    // Damage the first payload byte of the second record.
    let bytes = fs::read(&path).unwrap();
    let first_len = u32::from_be_bytes(bytes[FileHeader::SIZE..FileHeader::SIZE + 4].try_into().unwrap());
    let second = FileHeader::SIZE + RecordHeader::SIZE + first_len as usize;
    let target = second + RecordHeader::SIZE;
    let mut file = fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(target as u64)).unwrap();
    file.write_all(&[bytes[target] ^ 0xA5]).unwrap();
    drop(file);

    let mut r = FileReader::open(&ctx, &path).unwrap();
    assert_eq!(r.read_object().unwrap().unwrap().get("stamp").unwrap(), Value::U64(0));
    assert!(matches!(r.read_object(), Err(Error::Corrupted(_))));
    assert_eq!(r.read_object().unwrap().unwrap().get("stamp").unwrap(), Value::U64(2));
    assert!(r.read_object().unwrap().is_none());
}

#[test]
fn truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.objs");
    fs::write(&path, b"OBJSTRM\0\0\0").unwrap();

    let ctx = SchemaContext::default();
    assert!(FileReader::open(&ctx, &path).is_err());
}
