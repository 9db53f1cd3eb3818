//! Delta Log Benchmarks
//!
//! Measures delta accumulation and flush throughput, the write hot path of
//! every like/dislike request.
//!
//! Run with: `cargo bench -p recengine-storage`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use recengine_core::DeltaOp;
use recengine_storage::DeltaStore;

fn open_store(dir: &tempfile::TempDir, name: &str) -> DeltaStore {
    let file = std::fs::File::options()
        .read(true)
        .write(true)
        .create(true)
        .open(dir.path().join(name))
        .unwrap();
    DeltaStore::open(file).unwrap()
}

fn bench_delta_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("delta_add");
    for count in [1_000u64, 10_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |bench, &count| {
            let dir = tempfile::tempdir().unwrap();
            let mut store = open_store(&dir, "bench.recdelta");
            bench.iter(|| {
                for i in 0..count {
                    store.add(DeltaOp::LikeAdd, black_box(i % 100), black_box(i));
                }
            });
        });
    }
    group.finish();
}

fn bench_delta_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("delta_flush");
    for count in [1_000u64, 10_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |bench, &count| {
            bench.iter_with_setup(
                || {
                    let dir = tempfile::tempdir().unwrap();
                    let mut store = open_store(&dir, "bench.recdelta");
                    for i in 0..count {
                        store.add(DeltaOp::LikeAdd, i % 100, i);
                    }
                    (dir, store)
                },
                |(_dir, mut store)| {
                    store.flush().unwrap();
                    black_box(store);
                },
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_delta_add, bench_delta_flush);
criterion_main!(benches);
