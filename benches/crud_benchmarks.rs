#![allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]

use bplus_tree::BPlusTree;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::BTreeMap;
use std::hint::black_box;

const N: usize = 10_000;
const ORDERS: [usize; 3] = [4, 16, 64];

// ─── Key sequences ──────────────────────────────────────────────────────────

fn ordered_keys(n: usize) -> Vec<i64> {
    (0..n as i64).collect()
}

fn reverse_ordered_keys(n: usize) -> Vec<i64> {
    (0..n as i64).rev().collect()
}

fn random_keys(n: usize) -> Vec<i64> {
    // Deterministic LCG so runs are comparable.
    let mut keys = Vec::with_capacity(n);
    let mut x: u64 = 12345;
    for _ in 0..n {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
        keys.push((x >> 33) as i64);
    }
    keys
}

fn build_tree(order: usize, keys: &[i64]) -> BPlusTree {
    let mut tree = BPlusTree::new(order).expect("benchmark orders are valid");
    tree.extend(keys.iter().map(|&k| (k, k as f64)));
    tree
}

fn build_map(keys: &[i64]) -> BTreeMap<i64, f64> {
    keys.iter().map(|&k| (k, k as f64)).collect()
}

// ─── Insert ─────────────────────────────────────────────────────────────────

fn bench_insert(c: &mut Criterion, name: &str, keys: &[i64]) {
    let mut group = c.benchmark_group(name);

    for order in ORDERS {
        group.bench_function(BenchmarkId::new("BPlusTree", order), |b| {
            b.iter(|| build_tree(order, keys));
        });
    }

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| build_map(keys));
    });

    group.finish();
}

fn bench_insert_ordered(c: &mut Criterion) {
    bench_insert(c, "insert_ordered", &ordered_keys(N));
}

fn bench_insert_reverse(c: &mut Criterion) {
    bench_insert(c, "insert_reverse", &reverse_ordered_keys(N));
}

fn bench_insert_random(c: &mut Criterion) {
    bench_insert(c, "insert_random", &random_keys(N));
}

// ─── Search ─────────────────────────────────────────────────────────────────

fn bench_search_random(c: &mut Criterion) {
    let keys = random_keys(N);
    let mut group = c.benchmark_group("search_random");

    for order in ORDERS {
        let tree = build_tree(order, &keys);
        group.bench_function(BenchmarkId::new("BPlusTree", order), |b| {
            b.iter(|| {
                for &k in &keys {
                    black_box(tree.search(k));
                }
            });
        });
    }

    let map = build_map(&keys);
    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| {
            for k in &keys {
                black_box(map.get(k));
            }
        });
    });

    group.finish();
}

fn bench_range_scan(c: &mut Criterion) {
    let keys = ordered_keys(N);
    let mut group = c.benchmark_group("range_scan");
    let (low, high) = (N as i64 / 4, 3 * N as i64 / 4);

    for order in ORDERS {
        let tree = build_tree(order, &keys);
        group.bench_function(BenchmarkId::new("BPlusTree", order), |b| {
            b.iter(|| black_box(tree.search_range(low, high)));
        });
    }

    let map = build_map(&keys);
    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| black_box(map.range(low..=high).map(|(_, &v)| v).collect::<Vec<f64>>()));
    });

    group.finish();
}

// ─── Delete ─────────────────────────────────────────────────────────────────

fn bench_delete_random(c: &mut Criterion) {
    let keys = random_keys(N);
    let mut group = c.benchmark_group("delete_random");

    for order in ORDERS {
        group.bench_function(BenchmarkId::new("BPlusTree", order), |b| {
            b.iter_batched(
                || build_tree(order, &keys),
                |mut tree| {
                    for &k in &keys {
                        let _ = black_box(tree.delete(k));
                    }
                    tree
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter_batched(
            || build_map(&keys),
            |mut map| {
                for k in &keys {
                    black_box(map.remove(k));
                }
                map
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(insert_benches, bench_insert_ordered, bench_insert_reverse, bench_insert_random,);

criterion_group!(search_benches, bench_search_random, bench_range_scan,);

criterion_group!(delete_benches, bench_delete_random,);

criterion_main!(insert_benches, search_benches, delete_benches);
