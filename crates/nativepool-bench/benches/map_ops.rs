//! Criterion micro-benchmarks for the block-id map against `std::collections::HashMap`.

use std::collections::HashMap;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use nativepool_arena::linear_map::LinearMap;
use nativepool_core::BlockId;

const N: u64 = 10_000;

fn filled_linear() -> LinearMap {
    let mut map = LinearMap::with_capacity(N as usize);
    for i in 1..=N {
        map.insert(BlockId(i), i as u32);
    }
    map
}

/// Benchmark: hit lookups over 10K monotonic ids.
fn bench_lookup(c: &mut Criterion) {
    let linear = filled_linear();
    let std_map: HashMap<u64, u32> = (1..=N).map(|i| (i, i as u32)).collect();

    let mut group = c.benchmark_group("id_lookup_10k");
    group.bench_function("linear_map", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for i in (1..=N).step_by(97) {
                sum += u64::from(linear.get(BlockId(i)).unwrap_or(0));
            }
            black_box(sum)
        });
    });
    group.bench_function("std_hashmap", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for i in (1..=N).step_by(97) {
                sum += u64::from(std_map.get(&i).copied().unwrap_or(0));
            }
            black_box(sum)
        });
    });
    group.finish();
}

/// Benchmark: insert/remove churn with ids that keep increasing, as the
/// handle table produces them.
fn bench_churn(c: &mut Criterion) {
    c.bench_function("linear_map_sliding_window", |b| {
        let mut map = filled_linear();
        let mut next = N + 1;
        b.iter(|| {
            map.remove(BlockId(next - N));
            map.insert(BlockId(next), next as u32);
            next += 1;
        });
    });
}

criterion_group!(benches, bench_lookup, bench_churn);
criterion_main!(benches);
