//! Benchmarks for the transform + lowering pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polyfront::prelude::*;

fn tiled_pointwise() -> Function {
    let mut f = Function::new("bench").unwrap();
    f.add_buffer("in_buf", vec![64, 64], ElementType::F32, ArgumentKind::Input)
        .unwrap();
    f.add_buffer("out_buf", vec![64, 64], ElementType::F32, ArgumentKind::Output)
        .unwrap();
    f.add_computation(
        "{ input[i, j] : 0 <= i < 64 and 0 <= j < 64 }",
        None,
        false,
        ElementType::F32,
    )
    .unwrap();
    f.add_computation(
        "{ output[i, j] : 0 <= i < 64 and 0 <= j < 64 }",
        Some(Expr::access("input", vec![Expr::var("i"), Expr::var("j")]).add(Expr::int(1))),
        true,
        ElementType::F32,
    )
    .unwrap();
    f.computation_mut("output").unwrap().tile(0, 1, 8, 8).unwrap();
    f.tag_parallel_dimension("output", 0).unwrap();
    f.bind_to("input", "in_buf").unwrap();
    f.bind_to("output", "out_buf").unwrap();
    f
}

fn bench_transform(c: &mut Criterion) {
    c.bench_function("tile_schedule", |b| {
        b.iter(|| {
            let mut f = Function::new("t").unwrap();
            f.add_computation(
                "{ S[i, j] : 0 <= i < 64 and 0 <= j < 64 }",
                Some(Expr::int(0)),
                true,
                ElementType::F32,
            )
            .unwrap();
            f.computation_mut("S").unwrap().tile(0, 1, 8, 8).unwrap();
            black_box(f)
        })
    });
}

fn bench_lowering(c: &mut Criterion) {
    c.bench_function("lower_tiled_pointwise", |b| {
        b.iter(|| {
            let mut f = tiled_pointwise();
            black_box(f.gen_c_code().unwrap())
        })
    });
}

criterion_group!(benches, bench_transform, bench_lowering);
criterion_main!(benches);
