//! # Ground Truth Files
//!
//! Exact k-NN answers in the big-ann benchmark layout:
//!
//! ```text
//! [num_queries: u32][k: u32]
//! [ids:       u32 × num_queries·k]   row-major
//! [distances: f32 × num_queries·k]   row-major
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use graphann_core::error::{Error, Result, ResultExt};
use graphann_core::VectorId;

/// Row-major `num_queries × k` matrix of neighbor ids and distances
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    num_queries: usize,
    k: usize,
    ids: Vec<VectorId>,
    distances: Vec<f32>,
}

impl GroundTruth {
    pub fn new(num_queries: usize, k: usize, ids: Vec<VectorId>, distances: Vec<f32>) -> Result<Self> {
        let cells = num_queries * k;
        if ids.len() != cells {
            return Err(Error::ShapeMismatch {
                what: "ground truth ids".into(),
                expected: cells,
                actual: ids.len(),
            });
        }
        if distances.len() != cells {
            return Err(Error::ShapeMismatch {
                what: "ground truth distances".into(),
                expected: cells,
                actual: distances.len(),
            });
        }
        Ok(Self { num_queries, k, ids, distances })
    }

    /// Read a ground truth file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let num_queries = reader
            .read_u32::<LittleEndian>()
            .with_context(|| format!("reading header of {}", path.display()))?
            as usize;
        let k = reader
            .read_u32::<LittleEndian>()
            .with_context(|| format!("reading header of {}", path.display()))?
            as usize;

        let cells = num_queries * k;
        let mut ids = vec![0u32; cells];
        reader
            .read_u32_into::<LittleEndian>(&mut ids)
            .with_context(|| format!("reading ids of {}", path.display()))?;
        let mut distances = vec![0f32; cells];
        reader
            .read_f32_into::<LittleEndian>(&mut distances)
            .with_context(|| format!("reading distances of {}", path.display()))?;

        let mut rest = [0u8; 1];
        if reader.read(&mut rest)? != 0 {
            return Err(Error::ShapeMismatch {
                what: format!("ground truth file {}", path.display()),
                expected: 8 + cells * 8,
                actual: 8 + cells * 8 + 1,
            });
        }

        tracing::debug!(path = %path.display(), num_queries, k, "Loaded ground truth");
        Ok(Self { num_queries, k, ids, distances })
    }

    /// Write in the layout `read` expects
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut w = BufWriter::new(file);
        w.write_u32::<LittleEndian>(self.num_queries as u32)?;
        w.write_u32::<LittleEndian>(self.k as u32)?;
        for &id in &self.ids {
            w.write_u32::<LittleEndian>(id)?;
        }
        for &d in &self.distances {
            w.write_f32::<LittleEndian>(d)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn num_queries(&self) -> usize {
        self.num_queries
    }

    /// Neighbors stored per query
    pub fn k(&self) -> usize {
        self.k
    }

    /// Neighbor ids of query `q`, closest first
    pub fn ids(&self, q: usize) -> &[VectorId] {
        &self.ids[q * self.k..(q + 1) * self.k]
    }

    pub fn distances(&self, q: usize) -> &[f32] {
        &self.distances[q * self.k..(q + 1) * self.k]
    }

    /// One id list per query
    pub fn rows(&self) -> Vec<Vec<VectorId>> {
        (0..self.num_queries).map(|q| self.ids(q).to_vec()).collect()
    }
}
