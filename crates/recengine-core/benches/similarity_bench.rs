//! Similarity Scoring Benchmarks
//!
//! Measures the profile similarity merge and the bounded neighbor heap, the
//! two hot paths of every similar-profiles / recommendation query.
//!
//! Run with: `cargo bench -p recengine-core`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use recengine_core::similarity::{Neighbor, TopNeighbors};
use recengine_core::Profile;

fn profile(user_id: u64, item_count: u64, stride: u64) -> Profile {
    Profile {
        user_id,
        likes: (0..item_count).map(|i| i * stride).collect(),
        dislikes: (0..item_count).map(|i| i * stride + 1).collect(),
    }
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    for size in [10u64, 100, 1000] {
        let a = profile(1, size, 2);
        let b = profile(2, size, 3);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bench, _| {
            bench.iter(|| black_box(a.similarity(black_box(&b), 0.5)));
        });
    }
    group.finish();
}

fn bench_top_neighbors(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_neighbors");
    for population in [1_000u64, 10_000] {
        group.throughput(Throughput::Elements(population));
        group.bench_with_input(
            BenchmarkId::from_parameter(population),
            &population,
            |bench, &population| {
                bench.iter(|| {
                    let mut top = TopNeighbors::new(100);
                    for user in 0..population {
                        top.push(Neighbor {
                            profile: Profile::new(user),
                            similarity: (user % 101) as f32,
                        });
                    }
                    black_box(top.into_sorted())
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_similarity, bench_top_neighbors);
criterion_main!(benches);
