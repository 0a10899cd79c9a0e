//! Workload body microbenchmarks
//!
//! Times each built-in workload body on its own, outside the trial harness,
//! with the ambient generator pinned so every iteration sees the same inputs.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use throughput_bench::ambient;
use throughput_bench::driver::Lcg;
use throughput_bench::registry;

fn bench_bodies(c: &mut Criterion) {
    let mut group = c.benchmark_group("workload_bodies");
    group.sample_size(20);

    for spec in registry::builtin().list() {
        group.bench_function(spec.id.as_str(), |bencher| {
            let _rng = ambient::substitute(Lcg::new(1));
            bencher.iter(|| black_box(spec.workload.run()))
        });
    }

    group.finish();
}

fn bench_generator(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator");

    group.bench_function("lcg_next_f64", |bencher| {
        let mut lcg = Lcg::new(12_345);
        bencher.iter(|| black_box(lcg.next_f64()))
    });

    group.bench_function("ambient_random_seeded", |bencher| {
        let _rng = ambient::substitute(Lcg::new(12_345));
        bencher.iter(|| black_box(ambient::random()))
    });

    group.finish();
}

criterion_group!(benches, bench_bodies, bench_generator);
criterion_main!(benches);
