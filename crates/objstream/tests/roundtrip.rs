// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::float_cmp)] // Bit-exact round trips
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::items_after_statements)] // Test helpers

//! Round-trip tests: write objects, read them into the same layout, compare.

use objstream::{
    ClassDescriptor, Collection, ObjectGraph, ObjectReader, ObjectWriter, PrimitiveKind,
    SchemaContext, StreamConfig, Value,
};

const SCALARS: &str = "
    class Scalars version 4 {
        bool   on;
        i8     a;  u8  b;
        i16    c;  u16 d;
        i32    e;  u32 f;
        i64    g;  u64 h;
        f32    x;  f64 y;
        i16    window[5];
        f64    matrix[9];
    }";

fn random_value(kind: PrimitiveKind) -> Value {
    match kind {
        PrimitiveKind::Bool => Value::Bool(fastrand::bool()),
        PrimitiveKind::I8 => Value::I8(fastrand::i8(..)),
        PrimitiveKind::U8 => Value::U8(fastrand::u8(..)),
        PrimitiveKind::I16 => Value::I16(fastrand::i16(..)),
        PrimitiveKind::U16 => Value::U16(fastrand::u16(..)),
        PrimitiveKind::I32 => Value::I32(fastrand::i32(..)),
        PrimitiveKind::U32 => Value::U32(fastrand::u32(..)),
        PrimitiveKind::I64 => Value::I64(fastrand::i64(..)),
        PrimitiveKind::U64 => Value::U64(fastrand::u64(..)),
        PrimitiveKind::F32 => Value::F32(fastrand::f32() * 1e6 - 5e5),
        PrimitiveKind::F64 => Value::F64(fastrand::f64() * 1e12 - 5e11),
    }
}

fn random_scalars(ctx: &SchemaContext) -> objstream::Object {
    let mut obj = ctx.instantiate("Scalars").unwrap();
    let layout = ctx.layout("Scalars").unwrap();
    for member in layout.descriptor().members() {
        if let Some(kind) = member.kind.primitive() {
            let len = member.kind.array_len();
            if len == 0 {
                obj.set(&member.name, random_value(kind)).unwrap();
            } else {
                let values: Vec<Value> = (0..len).map(|_| random_value(kind)).collect();
                obj.set_array(&member.name, &values).unwrap();
            }
        }
    }
    obj
}

#[test]
fn primitive_and_array_members_round_trip() {
    fastrand::seed(0x5eed_0b1e);
    let ctx = SchemaContext::default();
    ctx.declare(SCALARS).unwrap();

    let originals: Vec<_> = (0..200).map(|_| random_scalars(&ctx)).collect();
    let mut writer = ObjectWriter::new(&ctx);
    for obj in &originals {
        writer.write_object(obj).unwrap();
    }
    let encoded = writer.finish();
    assert_eq!(encoded.descriptors.len(), 1);

    let mut reader = ObjectReader::new(&ctx, encoded.bytes);
    for original in &originals {
        let back = reader.read_object().unwrap();
        assert_eq!(&back, original);
        assert_eq!(back.inline_data(), original.inline_data());
    }
    assert!(reader.is_exhausted());
}

#[test]
fn collections_round_trip_in_both_modes() {
    fastrand::seed(7);
    const DECL: &str = "
        class Hit { f32 e; u16 channel; i8 flags[2]; }
        class Event version 2 {
            u32 run;
            vec<Hit> hits;
            vec<f64> weights;
            vec<string> labels;
        }";

    for member_wise in [true, false] {
        let ctx = SchemaContext::new(StreamConfig::default().with_member_wise(member_wise));
        ctx.declare(DECL).unwrap();

        let mut event = ctx.instantiate("Event").unwrap();
        event.set("run", 12u32).unwrap();
        let hits = (0..50)
            .map(|i| {
                let mut h = ctx.instantiate("Hit").unwrap();
                h.set("e", fastrand::f32()).unwrap();
                h.set("channel", i as u16).unwrap();
                h.set_array("flags", &[Value::I8(-1), Value::I8(i as i8)]).unwrap();
                h
            })
            .collect();
        event.set_collection("hits", Collection::Objects(hits)).unwrap();
        let weights: Vec<Value> = (0..10).map(|_| Value::F64(fastrand::f64())).collect();
        event
            .set_collection(
                "weights",
                Collection::Primitive(objstream::PrimitiveArray::from_values(
                    PrimitiveKind::F64,
                    &weights,
                )),
            )
            .unwrap();
        event
            .set_collection("labels", Collection::Text(vec!["a".into(), "".into(), "ccc".into()]))
            .unwrap();

        let mut writer = ObjectWriter::new(&ctx);
        writer.write_object(&event).unwrap();
        let back = ObjectReader::new(&ctx, writer.finish().bytes)
            .read_object()
            .unwrap();
        assert_eq!(back, event, "member_wise = {}", member_wise);
    }
}

#[test]
fn shared_and_cyclic_pointers_survive() {
    let ctx = SchemaContext::default();
    ctx.declare("class Link { i64 id; Link* next; Link* skip; }").unwrap();

    let mut graph = ObjectGraph::new();
    let ids: Vec<_> = (0..4)
        .map(|i| {
            let mut link = ctx.instantiate("Link").unwrap();
            link.set("id", i as i64).unwrap();
            graph.add(link)
        })
        .collect();
    for (i, &id) in ids.iter().enumerate() {
        let link = graph.get_mut(id).unwrap();
        link.set_pointer("next", Some(ids[(i + 1) % ids.len()])).unwrap();
        link.set_pointer("skip", Some(ids[(i + 2) % ids.len()])).unwrap();
    }

    let mut writer = ObjectWriter::new(&ctx);
    writer.write_root(&graph, ids[0]).unwrap();
    assert_eq!(writer.object_count(), 4);

    let mut reader = ObjectReader::new(&ctx, writer.finish().bytes);
    let root = reader.read_root().unwrap();
    let g = reader.graph();
    assert_eq!(g.len(), 4);

    // Walk the ring via `next` and check `skip` lands two steps ahead.
    let mut cursor = root;
    let mut ring = Vec::new();
    for _ in 0..4 {
        ring.push(cursor);
        cursor = g.get(cursor).unwrap().pointer("next").unwrap().unwrap();
    }
    assert_eq!(cursor, root);
    for (i, &id) in ring.iter().enumerate() {
        let link = g.get(id).unwrap();
        assert_eq!(link.get("id").unwrap(), Value::I64(i as i64));
        assert_eq!(link.pointer("skip").unwrap(), Some(ring[(i + 2) % 4]));
    }
}

#[test]
fn registration_is_idempotent() {
    let ctx = SchemaContext::default();
    let desc = ClassDescriptor::parse(SCALARS).unwrap();
    let t1 = ctx.descriptors().register(desc.clone());
    let t2 = ctx.descriptors().register(desc);
    assert_eq!(t1, t2);
    assert_eq!(ctx.descriptors().len(), 1);
    assert_eq!(ctx.descriptors().versions("Scalars"), vec![4]);
}

#[test]
fn checksum_ignores_formatting_but_not_structure() {
    let base = ClassDescriptor::parse("class T { i32 a; f64 b[2]; }").unwrap();
    let reformatted = ClassDescriptor::parse(
        "// leading comment
         class   T
         {
             i32 a;   /* inline */
             f64 b[ 2 ];
         }",
    )
    .unwrap();
    assert_eq!(base.checksum(), reformatted.checksum());

    for changed in [
        "class T { i32 a; f64 b[2]; u8 c; }",
        "class T { i32 a; }",
        "class T { i64 a; f64 b[2]; }",
        "class T { i32 a; f64 b[3]; }",
        "class T { f64 b[2]; i32 a; }",
    ] {
        let other = ClassDescriptor::parse(changed).unwrap();
        assert_ne!(base.checksum(), other.checksum(), "{}", changed);
    }

    // Version is not structural.
    let v9 = ClassDescriptor::parse("class T version 9 { i32 a; f64 b[2]; }").unwrap();
    assert_eq!(base.checksum(), v9.checksum());
}
