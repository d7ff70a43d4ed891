use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::prelude::SmallRng;
use rand::{Rng, SeedableRng};
use sheetnest::entities::{Part, Sheet};
use sheetnest::shelf_pack;

criterion_main!(benches);
criterion_group!(benches, shelf_pack_bench);

fn random_parts(n_types: usize, rng: &mut SmallRng) -> Vec<Part> {
    (0..n_types)
        .map(|i| {
            Part::new(
                format!("p{i}"),
                rng.random_range(10.0..600.0),
                rng.random_range(10.0..400.0),
                rng.random_range(1..10),
            )
        })
        .collect()
}

fn shelf_pack_bench(c: &mut Criterion) {
    let sheet = Sheet::new(3000.0, 1500.0);
    let mut group = c.benchmark_group("shelf_pack");
    for n_types in [10, 100, 500] {
        let mut rng = SmallRng::seed_from_u64(0);
        let parts = random_parts(n_types, &mut rng);
        group.bench_with_input(BenchmarkId::from_parameter(n_types), &parts, |b, parts| {
            b.iter(|| shelf_pack(black_box(parts), &sheet, 2.0))
        });
    }
    group.finish();
}
