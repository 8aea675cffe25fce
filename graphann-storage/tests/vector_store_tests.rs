//! # Vector Store Tests
//!
//! Mapped and owned vector files, header validation and concurrent reads.

use std::sync::Arc;
use std::thread;

use graphann_core::{ElementType, Error, VectorRef};
use graphann_storage::{read_header, write_bin, BinWriter, VectorStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn random_u8(n: usize, dim: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n * dim).map(|_| rng.gen()).collect()
}

// ============================================================================
// Opening
// ============================================================================

#[test]
fn test_open_u8_matches_written_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("base.u8bin");
    let data = random_u8(200, 16, 1);
    write_bin(&path, &data[..], 16).unwrap();

    let store = VectorStore::open(&path, ElementType::Uint8, 200, 16).unwrap();
    assert_eq!(store.len(), 200);
    assert!(store.is_mapped());
    for (id, v) in store.iter() {
        let start = id as usize * 16;
        assert_eq!(v, VectorRef::U8(&data[start..start + 16]));
    }
}

#[test]
fn test_open_with_header() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("query.i8bin");
    let data: Vec<i8> = (0..30).map(|i| (i as i8) - 15).collect();
    write_bin(&path, &data[..], 10).unwrap();

    assert_eq!(read_header(&path).unwrap(), (3, 10));
    let store = VectorStore::open_with_header(&path, ElementType::Int8).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.dimension(), 10);
    assert_eq!(store.get(2).unwrap().to_f32_vec()[0], 5.0);
}

#[test]
fn test_empty_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("empty.fbin");
    BinWriter::create(&path, ElementType::Float32, 8).unwrap().finish().unwrap();

    let store = VectorStore::open(&path, ElementType::Float32, 0, 8).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.iter().count(), 0);
    assert!(matches!(store.get(0), Err(Error::OutOfRange { .. })));
}

#[test]
fn test_missing_file() {
    let tmp = TempDir::new().unwrap();
    let err = VectorStore::open(tmp.path().join("nope.fbin"), ElementType::Float32, 1, 1).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn test_truncated_body_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("base.fbin");
    let data = vec![1.0f32; 40];
    write_bin(&path, &data[..], 4).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
    let err = VectorStore::open(&path, ElementType::Float32, 10, 4).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn test_short_header_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("stub.fbin");
    std::fs::write(&path, [1u8, 0, 0]).unwrap();
    assert!(VectorStore::open_with_header(&path, ElementType::Float32).is_err());
}

// ============================================================================
// Element types
// ============================================================================

#[test]
fn test_i16_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("base.i16bin");
    let data: Vec<i16> = vec![i16::MIN, -1, 0, 1, i16::MAX, 1234];
    write_bin(&path, &data[..], 3).unwrap();

    let store = VectorStore::open(&path, ElementType::Int16, 2, 3).unwrap();
    assert_eq!(store.get(0).unwrap(), VectorRef::I16(&[i16::MIN, -1, 0]));
    assert_eq!(store.get(1).unwrap(), VectorRef::I16(&[1, i16::MAX, 1234]));
    assert_eq!(store.size_bytes(), 12);
}

#[test]
fn test_f32_file_exact_values() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("base.fbin");
    let data = vec![0.1f32, -2.5, f32::MAX, 1e-30];
    write_bin(&path, &data[..], 2).unwrap();

    let store = VectorStore::open(&path, ElementType::Float32, 2, 2).unwrap();
    assert_eq!(store.flat(), VectorRef::F32(&data));
}

// ============================================================================
// Concurrency & lifetime
// ============================================================================

#[test]
fn test_concurrent_reads() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("base.u8bin");
    let data = random_u8(1000, 32, 7);
    write_bin(&path, &data[..], 32).unwrap();

    let store = Arc::new(VectorStore::open(&path, ElementType::Uint8, 1000, 32).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut sum = 0u64;
                for id in (t..1000).step_by(4) {
                    if let VectorRef::U8(v) = store.get(id as u32).unwrap() {
                        sum += v.iter().map(|&x| x as u64).sum::<u64>();
                    }
                }
                sum
            })
        })
        .collect();

    let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, data.iter().map(|&x| x as u64).sum::<u64>());
}

#[test]
fn test_drop_releases_mapping() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("base.u8bin");
    write_bin(&path, &[1u8, 2, 3, 4][..], 2).unwrap();

    {
        let store = VectorStore::open(&path, ElementType::Uint8, 2, 2).unwrap();
        store.advise_random().unwrap();
    }
    // The file can be replaced once the store is gone
    write_bin(&path, &[9u8, 9][..], 2).unwrap();
    let store = VectorStore::open(&path, ElementType::Uint8, 1, 2).unwrap();
    assert_eq!(store.get(0).unwrap(), VectorRef::U8(&[9, 9]));
}
