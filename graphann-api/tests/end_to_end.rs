//! End-to-end: vector files on disk → build → load → search → recall

use std::sync::Arc;

use graphann_api::{build_index, load_index, ElementType, Error, Metric};
use graphann_index::FlatIndex;
use graphann_storage::{write_bin, VectorStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const DIM: usize = 32;

fn clustered(n: usize, centers: &[Vec<i32>], rng: &mut StdRng) -> Vec<u8> {
    let mut data = Vec::with_capacity(n * DIM);
    for i in 0..n {
        for &x in &centers[i % centers.len()] {
            data.push((x + rng.gen_range(-25..=25)).clamp(0, 255) as u8);
        }
    }
    data
}

struct Dataset {
    dir: TempDir,
    base: usize,
    queries: usize,
}

impl Dataset {
    fn new(base: usize, queries: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(2024);
        let centers: Vec<Vec<i32>> = (0..16)
            .map(|_| (0..DIM).map(|_| rng.gen_range(30..226)).collect())
            .collect();
        let base_data = clustered(base, &centers, &mut rng);
        let query_data = clustered(queries, &centers, &mut rng);
        write_bin(dir.path().join("base.u8bin"), &base_data[..], DIM).unwrap();
        write_bin(dir.path().join("query.u8bin"), &query_data[..], DIM).unwrap();
        Self { dir, base, queries }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn write_ground_truth(&self, k: usize) {
        let base = Arc::new(VectorStore::open_with_header(self.path("base.u8bin"), ElementType::Uint8).unwrap());
        let queries = VectorStore::open_with_header(self.path("query.u8bin"), ElementType::Uint8).unwrap();
        FlatIndex::new(base, Metric::SquaredEuclidean)
            .compute_ground_truth(&queries, k, 2)
            .unwrap()
            .write(self.path("gt.bin"))
            .unwrap();
    }
}

#[test]
fn test_build_load_search_recall() {
    let data = Dataset::new(2000, 100);
    data.write_ground_truth(10);

    let stats = build_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        32,
        64,
        4,
        1.2,
        0.05,
    )
    .unwrap();
    assert_eq!(stats.num_vectors, 2000);
    assert!(stats.max_degree <= 32);

    let index = load_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        data.base,
        DIM,
    )
    .unwrap();
    assert_eq!(index.len(), 2000);
    assert_eq!(index.dimension(), DIM);
    assert_eq!(index.element_type(), ElementType::Uint8);

    let (ids, distances) = index
        .batch_search_from_file(data.path("query.u8bin"), data.queries, 10, 100)
        .unwrap();
    assert_eq!(ids.len(), 100 * 10);
    assert_eq!(distances.len(), 100 * 10);
    for row in distances.chunks(10) {
        assert!(row.windows(2).all(|w| w[0] <= w[1]));
    }

    let recall = index.check_recall(data.path("gt.bin"), &ids, 10).unwrap();
    println!("Recall@10: {:.3}", recall);
    assert!(recall >= 0.9, "Recall too low: {:.3}", recall);

    // Narrower recall over the same 10-wide rows
    for k in [1, 5] {
        let recall = index.check_recall(data.path("gt.bin"), &ids, k).unwrap();
        println!("Recall@{}: {:.3}", k, recall);
        assert!(recall >= 0.8, "Recall@{} too low: {:.3}", k, recall);
    }
    let err = index.check_recall(data.path("gt.bin"), &ids, 11).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    let err = index.check_recall(data.path("gt.bin"), &ids[..995], 5).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn test_dedicated_search_pool() {
    let data = Dataset::new(500, 40);
    build_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        16,
        32,
        2,
        1.2,
        0.05,
    )
    .unwrap();
    let open = || {
        load_index(
            Metric::SquaredEuclidean,
            ElementType::Uint8,
            data.path("base.u8bin"),
            data.path("index"),
            data.base,
            DIM,
        )
        .unwrap()
    };

    let shared = open();
    let pooled = open().with_threads(2).unwrap();
    assert_eq!(pooled.num_threads(), 2);

    let expected = shared
        .batch_search_from_file(data.path("query.u8bin"), data.queries, 5, 40)
        .unwrap();
    let actual = pooled
        .batch_search_from_file(data.path("query.u8bin"), data.queries, 5, 40)
        .unwrap();
    assert_eq!(actual, expected);

    let err = open().with_threads(0).unwrap_err();
    assert!(matches!(err, Error::InvalidParams { .. }));
}

#[test]
fn test_load_with_wrong_metric() {
    let data = Dataset::new(200, 10);
    build_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        8,
        16,
        1,
        1.2,
        0.05,
    )
    .unwrap();
    let err = load_index(
        Metric::InnerProduct,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        200,
        DIM,
    )
    .unwrap_err();
    assert!(matches!(err, Error::CorruptIndex { .. }));
}

#[test]
fn test_load_with_wrong_shape() {
    let data = Dataset::new(200, 10);
    build_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        8,
        16,
        1,
        1.2,
        0.05,
    )
    .unwrap();
    // File size disagrees with the declared shape
    let err = load_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        300,
        DIM,
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
}

#[test]
fn test_build_rejects_bad_params_and_missing_file() {
    let data = Dataset::new(50, 5);
    let err = build_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        16,
        8,
        1,
        1.2,
        0.05,
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidParams { .. }));
    assert!(!data.path("index").exists());

    let err = build_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("missing.u8bin"),
        data.path("index"),
        16,
        32,
        1,
        1.2,
        0.05,
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
}

#[test]
fn test_query_count_mismatch() {
    let data = Dataset::new(200, 10);
    build_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        8,
        16,
        2,
        1.2,
        0.05,
    )
    .unwrap();
    let index = load_index(
        Metric::SquaredEuclidean,
        ElementType::Uint8,
        data.path("base.u8bin"),
        data.path("index"),
        200,
        DIM,
    )
    .unwrap();
    let err = index
        .batch_search_from_file(data.path("query.u8bin"), 11, 5, 10)
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}
