//! Distance kernel and search benchmarks
//!
//! Run with: cargo bench --package graphann-index

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use graphann_core::{BuildParams, Metric, SearchParams, VectorRef};
use graphann_index::{simd, GraphIndexBuilder};
use graphann_storage::VectorStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_vec(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn bench_f32_kernels(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let mut group = c.benchmark_group("f32");

    for dim in [96, 128, 384, 768] {
        let a = random_vec(&mut rng, dim);
        let b = random_vec(&mut rng, dim);

        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("l2_squared", dim), |bencher| {
            bencher.iter(|| black_box(simd::l2_distance_squared(black_box(&a), black_box(&b))))
        });
        group.bench_function(BenchmarkId::new("dot_product", dim), |bencher| {
            bencher.iter(|| black_box(simd::dot_product(black_box(&a), black_box(&b))))
        });
    }

    group.finish();
}

fn bench_int_kernels(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let mut group = c.benchmark_group("int");

    for dim in [100, 128, 256] {
        let a: Vec<u8> = (0..dim).map(|_| rng.gen()).collect();
        let b: Vec<u8> = (0..dim).map(|_| rng.gen()).collect();
        let x: Vec<i8> = (0..dim).map(|_| rng.gen()).collect();
        let y: Vec<i8> = (0..dim).map(|_| rng.gen()).collect();

        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("l2_squared_u8", dim), |bencher| {
            bencher.iter(|| black_box(simd::l2_squared_u8(black_box(&a), black_box(&b))))
        });
        group.bench_function(BenchmarkId::new("l2_squared_i8", dim), |bencher| {
            bencher.iter(|| black_box(simd::l2_squared_i8(black_box(&x), black_box(&y))))
        });
        group.bench_function(BenchmarkId::new("dot_product_i8", dim), |bencher| {
            bencher.iter(|| black_box(simd::dot_product_i8(black_box(&x), black_box(&y))))
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let n = 10_000;
    let dim = 64;
    let mut rng = StdRng::seed_from_u64(3);
    let data = (0..n * dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    let store = Arc::new(VectorStore::from_f32(data, dim).expect("store"));
    let index = GraphIndexBuilder::new(Metric::SquaredEuclidean, BuildParams::new(32, 64, 1.2))
        .build(Arc::clone(&store))
        .expect("build");
    let query = random_vec(&mut rng, dim);

    let mut group = c.benchmark_group("search");
    for l_search in [10, 50, 100] {
        let params = SearchParams::new(10, l_search);
        group.bench_function(BenchmarkId::new("k10", l_search), |bencher| {
            bencher.iter(|| black_box(index.search(black_box(VectorRef::from(query.as_slice())), &params)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_f32_kernels, bench_int_kernels, bench_search);
criterion_main!(benches);
