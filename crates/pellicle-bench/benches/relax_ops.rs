//! Relaxation benchmarks: full macro steps over crowded films.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pellicle_bench::seeded_biofilm;
use pellicle_test_utils::MockDriver;

fn bench_macro_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("macro_step");
    for &(columns, layers) in &[(16usize, 2usize), (32, 4), (64, 4)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{columns}x{layers}")),
            &(columns, layers),
            |b, &(columns, layers)| {
                b.iter_batched(
                    || seeded_biofilm(256.0, 4.0, columns, layers),
                    |mut container| {
                        let mut driver = MockDriver::inert();
                        container.step(&mut driver, 0.5).unwrap()
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_initial_relax(c: &mut Criterion) {
    c.bench_function("relax_seeded_film", |b| {
        b.iter_batched(
            || seeded_biofilm(128.0, 4.0, 32, 2),
            |mut container| container.relax(),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_macro_step, bench_initial_relax);
criterion_main!(benches);
