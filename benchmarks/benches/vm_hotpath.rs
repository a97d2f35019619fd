//! vm_hotpath.rs — dispatch loop micro-benches
//!
//! Chunks are compiled once outside the measured closure; only `Vm::run` is timed.
//!
//!   cargo bench -p lox-benches --bench vm_hotpath
//!   cargo bench -p lox-benches --bench vm_hotpath -- --save-baseline hot

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use lox_benches::{mixed, negate_chain, sum_chain};
use lox_core::prelude::*;
use lox_vm::Vm;

fn long_constants(count: usize) -> Chunk {
    let mut chunk = Chunk::new();
    for i in 0..300 {
        chunk.add_constant(Value::Number(f64::from(i)));
    }
    chunk.write_constant(Value::Number(0.0), 1).ok();
    for i in 0..count {
        chunk.write_constant(Value::Number(i as f64), 1).ok();
        chunk.write_op(OpCode::Add, 1);
    }
    chunk.write_op(OpCode::Return, 1);
    chunk
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm_run");

    let cases = [
        ("sum_chain", lox_compiler::compile(&sum_chain(2_000))),
        ("negate_chain", lox_compiler::compile(&negate_chain(500))),
        ("mixed", lox_compiler::compile(&mixed(2_000))),
    ];
    for (name, chunk) in cases {
        let Ok(chunk) = chunk else { continue };
        group.throughput(Throughput::Bytes(chunk.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &chunk, |b, chunk| {
            b.iter(|| black_box(Vm::new(black_box(chunk)).run()));
        });
    }

    let chunk = long_constants(2_000);
    group.throughput(Throughput::Bytes(chunk.len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter("constant_long"), &chunk, |b, chunk| {
        b.iter(|| black_box(Vm::new(black_box(chunk)).run()));
    });

    group.finish();
}

criterion_group!(benches, bench_run);
criterion_main!(benches);
