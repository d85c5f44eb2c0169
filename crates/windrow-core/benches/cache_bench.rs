//! Benchmarks for the window cache.
//!
//! Run with: cargo bench -p windrow-core

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use windrow_core::{
    CellValue, FilterPolicy, Row, RowKey, RowWindowCache, SharedInterestSet, VecSource,
};

fn make_source(n: usize) -> VecSource {
    VecSource::new(
        (0..n)
            .map(|i| {
                Row::new(
                    RowKey::from_raw(i as u64),
                    vec![CellValue::Int(i as i64), CellValue::from(format!("row{i}"))],
                )
            })
            .collect(),
    )
}

fn bench_window_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/window_hit");
    for total in [1_000usize, 100_000] {
        let mut cache = RowWindowCache::new(SharedInterestSet::new())
            .with_capacity(256)
            .with_chunk_size(64);
        cache.attach(make_source(total)).unwrap();
        // Warm the window around a fixed position.
        let base = total / 2;
        cache.get_row(base).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(total), &base, |b, &base| {
            b.iter(|| {
                for offset in 0..64 {
                    black_box(cache.get_row(base + offset).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_sequential_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/sequential_scan");
    for total in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(total), &total, |b, &total| {
            b.iter(|| {
                let mut cache = RowWindowCache::new(SharedInterestSet::new())
                    .with_capacity(256)
                    .with_chunk_size(64);
                cache.attach(make_source(total)).unwrap();
                for i in 0..total {
                    black_box(cache.get_row(i).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_backward_seek_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/backward_seek");
    for total in [1_000usize, 10_000] {
        let mut cache = RowWindowCache::new(SharedInterestSet::new())
            .with_capacity(64)
            .with_chunk_size(16);
        cache.attach(make_source(total)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(total), &total, |b, &total| {
            b.iter(|| {
                // Jump to the end, then back to the start: two replays.
                black_box(cache.get_row(total - 1).unwrap());
                black_box(cache.get_row(0).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_filtered_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/filtered_scan");
    let total = 10_000usize;
    let set = SharedInterestSet::new();
    // Every 16th row is hilited.
    for key in (0..total as u64).step_by(16) {
        set.insert(RowKey::from_raw(key));
    }

    group.bench_function("interest_only", |b| {
        b.iter(|| {
            let mut cache = RowWindowCache::new(set.clone())
                .with_capacity(256)
                .with_chunk_size(64);
            cache.set_filter_policy(FilterPolicy::InterestOnly).unwrap();
            cache.attach(make_source(total)).unwrap();
            let mut i = 0;
            while cache.get_row(i).is_ok() {
                i += 1;
            }
            black_box(cache.row_count())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_window_hits,
    bench_sequential_scan,
    bench_backward_seek_replay,
    bench_filtered_scan
);
criterion_main!(benches);
