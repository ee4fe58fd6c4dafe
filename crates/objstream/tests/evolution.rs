// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::float_cmp)] // Exact expected values
#![allow(clippy::cast_possible_truncation)] // Test parameters

//! Schema evolution across independently declared contexts.
//!
//! Each test writes with an "old" context and reads with a "new" one that
//! only knows the old shape through the descriptor registry, as a reader
//! would after absorbing a schema update or a file directory.

use objstream::{
    Error, EvolutionRule, Object, ObjectReader, ObjectWriter, SchemaContext, Value,
};
use std::sync::Arc;

fn write_with(ctx: &SchemaContext, objects: &[Object]) -> Vec<u8> {
    let mut writer = ObjectWriter::new(ctx);
    for obj in objects {
        writer.write_object(obj).unwrap();
    }
    writer.finish().bytes
}

/// New context that has seen `old`'s descriptor for `class`.
fn successor(old: &SchemaContext, class: &str, decl: &str) -> SchemaContext {
    let new = SchemaContext::default();
    new.descriptors()
        .register_arc(Arc::clone(old.layout(class).unwrap().descriptor()));
    new.declare(decl).unwrap();
    new
}

#[test]
fn rename_preserves_values() {
    let old = SchemaContext::default();
    old.declare("class Rec version 1 { i32 a; }").unwrap();
    let samples = [0i32, -1, i32::MAX, i32::MIN];
    let objects: Vec<Object> = samples
        .iter()
        .map(|&v| {
            let mut o = old.instantiate("Rec").unwrap();
            o.set("a", v).unwrap();
            o
        })
        .collect();
    let bytes = write_with(&old, &objects);

    let new = successor(&old, "Rec", "class Rec version 2 { i32 b; }");
    new.add_rule(EvolutionRule::rename("Rec", "a", "b")).unwrap();

    let mut reader = ObjectReader::new(&new, bytes);
    for &v in &samples {
        let back = reader.read_object().unwrap();
        assert_eq!(back.get("b").unwrap(), Value::I32(v));
        assert!(back.get("a").is_err());
    }
}

#[test]
fn renamed_member_kept_under_old_name_too() {
    let old = SchemaContext::default();
    old.declare("class Rec version 1 { i32 a; }").unwrap();
    let mut rec = old.instantiate("Rec").unwrap();
    rec.set("a", 42i32).unwrap();
    let bytes = write_with(&old, &[rec]);

    let new = successor(&old, "Rec", "class Rec version 2 { i32 a; i32 b; }");
    new.add_rule(EvolutionRule::rename("Rec", "a", "b")).unwrap();

    let back = ObjectReader::new(&new, bytes).read_object().unwrap();
    assert_eq!(back.get("a").unwrap(), Value::I32(42));
    assert_eq!(back.get("b").unwrap(), Value::I32(42));
}

#[test]
fn without_rule_member_keeps_default() {
    let old = SchemaContext::default();
    old.declare("class Rec version 1 { i32 a; u16 keep; }").unwrap();
    let mut o = old.instantiate("Rec").unwrap();
    o.set("a", 99i32).unwrap();
    o.set("keep", 5u16).unwrap();
    let bytes = write_with(&old, &[o]);

    // `a` is gone and nothing claims it; `keep` widens to u64.
    let new = successor(&old, "Rec", "class Rec version 2 { i32 b; u64 keep; }");
    let back = ObjectReader::new(&new, bytes).read_object().unwrap();
    assert_eq!(back.get("b").unwrap(), Value::I32(0));
    assert_eq!(back.get("keep").unwrap(), Value::U64(5));
}

#[test]
fn compute_merges_old_members() {
    let old = SchemaContext::default();
    old.declare("class Pt version 1 { f32 x; f32 y; i8 q; }").unwrap();
    let mut o = old.instantiate("Pt").unwrap();
    o.set("x", 3.0f32).unwrap();
    o.set("y", 4.0f32).unwrap();
    o.set("q", -2i8).unwrap();
    let bytes = write_with(&old, &[o]);

    let new = successor(&old, "Pt", "class Pt version 2 { f64 r; i8 q; }");
    new.add_rule(EvolutionRule::compute("Pt", ["x", "y"], "r", |v| {
        Value::F64(v[0].as_f64().hypot(v[1].as_f64()))
    }))
    .unwrap();

    let back = ObjectReader::new(&new, bytes).read_object().unwrap();
    assert_eq!(back.get("r").unwrap(), Value::F64(5.0));
    assert_eq!(back.get("q").unwrap(), Value::I8(-2));
}

#[test]
fn narrowing_needs_an_explicit_cast() {
    let old = SchemaContext::default();
    old.declare("class N version 1 { i64 count; }").unwrap();
    let mut o = old.instantiate("N").unwrap();
    o.set("count", 300i64).unwrap();
    let bytes = write_with(&old, &[o]);

    let plain = successor(&old, "N", "class N version 2 { i16 count; }");
    let back = ObjectReader::new(&plain, bytes.clone()).read_object().unwrap();
    assert_eq!(back.get("count").unwrap(), Value::I16(0));

    let cast = successor(&old, "N", "class N version 2 { i16 count; }");
    cast.add_rule(EvolutionRule::cast("N", "count", "count")).unwrap();
    let back = ObjectReader::new(&cast, bytes).read_object().unwrap();
    assert_eq!(back.get("count").unwrap(), Value::I16(300));
}

#[test]
fn checksum_guarded_rule_is_inert_for_other_shapes() {
    let old = SchemaContext::default();
    old.declare("class G version 1 { i32 a; }").unwrap();
    let mut o = old.instantiate("G").unwrap();
    o.set("a", 17i32).unwrap();
    let bytes = write_with(&old, &[o]);

    let new = successor(&old, "G", "class G version 2 { i32 b; }");
    new.add_rule(EvolutionRule::rename("G", "a", "b").when_checksum(0x1234_5678))
        .unwrap();
    let back = ObjectReader::new(&new, bytes).read_object().unwrap();
    assert_eq!(back.get("b").unwrap(), Value::I32(0));
}

#[test]
fn ambiguous_rules_rejected_before_io() {
    let ctx = SchemaContext::default();
    ctx.declare("class A version 2 { i32 b; }").unwrap();
    ctx.add_rule(EvolutionRule::rename("A", "a", "b")).unwrap();
    let err = ctx
        .add_rule(EvolutionRule::cast("A", "a", "b"))
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousRule { .. }));
    assert_eq!(ctx.rules().len(), 1);
}

#[test]
fn writer_can_target_an_older_shape() {
    let old = SchemaContext::default();
    old.declare("class W version 1 { i32 a; u8 legacy; }").unwrap();
    let old_desc = Arc::clone(old.layout("W").unwrap().descriptor());

    let new = successor(&old, "W", "class W version 2 { i64 b; f64 extra; }");
    new.add_rule(EvolutionRule::rename("W", "a", "b")).unwrap();
    let mut o = new.instantiate("W").unwrap();
    o.set("b", -40i64).unwrap();
    o.set("extra", 1.5f64).unwrap();

    let mut writer = ObjectWriter::new(&new).with_target(Arc::clone(&old_desc));
    writer.write_object(&o).unwrap();
    let encoded = writer.finish();
    assert_eq!(encoded.descriptors[0].checksum(), old_desc.checksum());

    let back = ObjectReader::new(&old, encoded.bytes).read_object().unwrap();
    assert_eq!(back.get("a").unwrap(), Value::I32(-40));
    assert_eq!(back.get("legacy").unwrap(), Value::U8(0));
}
