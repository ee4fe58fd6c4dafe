// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Action Sequence Execution Benchmark
//!
//! Compares object-wise and member-wise collection encoding, and the cost
//! of reading through an evolved (renamed + widened) layout against a
//! direct one.

#![allow(clippy::cast_precision_loss)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use objstream::{
    Collection, EvolutionRule, Object, ObjectReader, ObjectWriter, SchemaContext, StreamConfig,
};
use std::sync::Arc;

const DECL: &str = "
    class Hit { f32 e; u16 channel; i32 t; }
    class Event version 1 { u64 id; vec<Hit> hits; }";

fn event(ctx: &SchemaContext, hits: usize) -> Object {
    let mut ev = ctx.instantiate("Event").unwrap();
    ev.set("id", 42u64).unwrap();
    let hits = (0..hits)
        .map(|i| {
            let mut h = ctx.instantiate("Hit").unwrap();
            h.set("e", i as f32 * 0.25).unwrap();
            h.set("channel", (i % 4096) as u16).unwrap();
            h.set("t", i as i32).unwrap();
            h
        })
        .collect();
    ev.set_collection("hits", Collection::Objects(hits)).unwrap();
    ev
}

fn bench_collection_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection_encode");
    for &n in &[16usize, 256, 4096] {
        group.throughput(Throughput::Elements(n as u64));
        for member_wise in [false, true] {
            let ctx = SchemaContext::new(StreamConfig::default().with_member_wise(member_wise));
            ctx.declare(DECL).unwrap();
            let ev = event(&ctx, n);
            let label = if member_wise { "member_wise" } else { "object_wise" };

            group.bench_with_input(BenchmarkId::new(label, n), &ev, |b, ev| {
                b.iter(|| {
                    let mut w = ObjectWriter::new(&ctx);
                    w.write_object(black_box(ev)).unwrap();
                    black_box(w.finish().bytes.len())
                });
            });

            let mut w = ObjectWriter::new(&ctx);
            w.write_object(&ev).unwrap();
            let bytes = w.finish().bytes;
            group.bench_with_input(
                BenchmarkId::new(format!("{}_decode", label), n),
                &bytes,
                |b, bytes| {
                    b.iter(|| {
                        let obj = ObjectReader::new(&ctx, bytes.clone()).read_object().unwrap();
                        black_box(obj);
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_evolved_read(c: &mut Criterion) {
    let old = SchemaContext::default();
    old.declare("class Rec version 1 { i32 a; f32 b; u16 c; }").unwrap();
    let mut rec = old.instantiate("Rec").unwrap();
    rec.set("a", 7i32).unwrap();
    rec.set("b", 1.5f32).unwrap();
    rec.set("c", 3u16).unwrap();
    let mut w = ObjectWriter::new(&old);
    w.write_object(&rec).unwrap();
    let bytes = w.finish().bytes;

    let evolved = SchemaContext::default();
    evolved
        .descriptors()
        .register_arc(Arc::clone(old.layout("Rec").unwrap().descriptor()));
    evolved
        .declare("class Rec version 2 { i64 renamed; f64 b; u16 c; }")
        .unwrap();
    evolved
        .add_rule(EvolutionRule::rename("Rec", "a", "renamed"))
        .unwrap();

    let mut group = c.benchmark_group("record_decode");
    group.bench_function("direct", |b| {
        b.iter(|| black_box(ObjectReader::new(&old, bytes.clone()).read_object().unwrap()));
    });
    group.bench_function("evolved", |b| {
        b.iter(|| black_box(ObjectReader::new(&evolved, bytes.clone()).read_object().unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_collection_modes, bench_evolved_read);
criterion_main!(benches);
