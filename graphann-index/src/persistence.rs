//! # Index Persistence
//!
//! Directory layout of a saved graph:
//!
//! ```text
//! index_dir/
//! ├── graph.bin          "GANNGRPH" | version u32 | n u32 | max_degree u32
//! │                      | degree u32 × n | neighbor ids u32 × Σdegree
//! ├── entry_points.bin   count u32 | id u32 × count
//! └── metadata.json      R, dim, count, element type, metric, L_build, alpha,
//!                        format version, build timestamp
//! ```
//!
//! All integers are little-endian. Every file is written to `<name>.tmp`,
//! synced and renamed into place. `metadata.json` is deleted first and
//! written last, so its presence marks a complete save.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use graphann_core::error::{Error, Result, ResultExt};
use graphann_core::{ElementType, Metric, VectorId};
use graphann_storage::VectorStore;

use crate::graph::{check_node, BuildInfo, GraphIndex};

pub const GRAPH_FILE: &str = "graph.bin";
pub const ENTRY_POINTS_FILE: &str = "entry_points.bin";
pub const METADATA_FILE: &str = "metadata.json";

const GRAPH_MAGIC: &[u8; 8] = b"GANNGRPH";
pub const FORMAT_VERSION: u32 = 1;

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub format_version: u32,
    pub count: usize,
    pub dim: usize,
    pub element_type: ElementType,
    pub metric: Metric,
    pub max_degree: usize,
    pub l_build: usize,
    pub alpha: f32,
    pub num_entry_points: usize,
    /// Seconds since the Unix epoch
    pub build_timestamp: u64,
}

impl IndexMetadata {
    fn describe(index: &GraphIndex) -> Self {
        let info = index.build_info();
        Self {
            format_version: FORMAT_VERSION,
            count: index.len(),
            dim: index.dimension(),
            element_type: index.store().element_type(),
            metric: index.metric(),
            max_degree: index.max_degree(),
            l_build: info.l_build,
            alpha: info.alpha,
            num_entry_points: index.entry_points().len(),
            build_timestamp: info.built_at,
        }
    }

    /// Read `metadata.json` from an index directory
    pub fn read(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(METADATA_FILE);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::corrupt(format!(
                    "{} missing, index save did not complete",
                    path.display()
                )));
            }
            Err(e) => return Err(Error::io(format!("opening {}", path.display()), e)),
        };
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::corrupt(format!("{}: {}", path.display(), e)))
    }
}

/// Save `index` into `dir`, creating it if needed
pub fn save(index: &GraphIndex, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let metadata_path = dir.join(METADATA_FILE);
    match fs::remove_file(&metadata_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io(format!("removing {}", metadata_path.display()), e)),
    }

    write_atomic(&dir.join(GRAPH_FILE), |w| write_graph(index, w))?;
    write_atomic(&dir.join(ENTRY_POINTS_FILE), |w| {
        w.write_u32::<LittleEndian>(index.entry_points().len() as u32)?;
        for &ep in index.entry_points() {
            w.write_u32::<LittleEndian>(ep)?;
        }
        Ok(())
    })?;

    let metadata = IndexMetadata::describe(index);
    write_atomic(&metadata_path, |w| {
        serde_json::to_writer_pretty(&mut *w, &metadata).map_err(io::Error::from)?;
        w.write_all(b"\n")
    })?;

    tracing::info!(
        dir = %dir.display(),
        nodes = index.len(),
        edges = index.num_edges(),
        "Saved graph index"
    );
    Ok(())
}

fn write_graph(index: &GraphIndex, w: &mut BufWriter<File>) -> io::Result<()> {
    w.write_all(GRAPH_MAGIC)?;
    w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    w.write_u32::<LittleEndian>(index.len() as u32)?;
    w.write_u32::<LittleEndian>(index.max_degree() as u32)?;
    for i in 0..index.len() {
        w.write_u32::<LittleEndian>(index.neighbors_unchecked(i).len() as u32)?;
    }
    for i in 0..index.len() {
        for &nb in index.neighbors_unchecked(i) {
            w.write_u32::<LittleEndian>(nb)?;
        }
    }
    Ok(())
}

/// Write through `body` into `path.tmp`, sync, then rename over `path`
fn write_atomic<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let tmp = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let mut w = BufWriter::new(file);
    body(&mut w).with_context(|| format!("writing {}", tmp.display()))?;
    w.flush().with_context(|| format!("flushing {}", tmp.display()))?;
    let file = w
        .into_inner()
        .map_err(|e| Error::io(format!("flushing {}", tmp.display()), e.into_error()))?;
    file.sync_all().with_context(|| format!("syncing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming {} into place", tmp.display()))?;
    Ok(())
}

/// Load a saved index over `store`.
///
/// `count` and `dim` must agree with the store, the metadata and the graph.
pub fn load(dir: impl AsRef<Path>, store: Arc<VectorStore>, count: usize, dim: usize) -> Result<GraphIndex> {
    let dir = dir.as_ref();

    if store.dimension() != dim {
        return Err(Error::DimensionMismatch { expected: dim, actual: store.dimension() });
    }
    if store.len() != count {
        return Err(Error::ShapeMismatch {
            what: "vector store count".into(),
            expected: count,
            actual: store.len(),
        });
    }

    let metadata = IndexMetadata::read(dir)?;
    if metadata.format_version != FORMAT_VERSION {
        return Err(Error::corrupt(format!(
            "unsupported format version {}",
            metadata.format_version
        )));
    }
    if metadata.dim != dim {
        return Err(Error::DimensionMismatch { expected: dim, actual: metadata.dim });
    }
    if metadata.count != count {
        return Err(Error::corrupt(format!(
            "metadata records {} vectors, expected {}",
            metadata.count, count
        )));
    }
    if metadata.element_type != store.element_type() {
        return Err(Error::corrupt(format!(
            "index was built over {} vectors, store holds {}",
            metadata.element_type,
            store.element_type()
        )));
    }

    let (max_degree, offsets, edges) = read_graph(&dir.join(GRAPH_FILE), count)?;
    if max_degree != metadata.max_degree {
        return Err(Error::corrupt(format!(
            "graph max degree {} disagrees with metadata R {}",
            max_degree, metadata.max_degree
        )));
    }
    let entry_points = read_entry_points(&dir.join(ENTRY_POINTS_FILE))?;

    let info = BuildInfo {
        l_build: metadata.l_build,
        alpha: metadata.alpha,
        built_at: metadata.build_timestamp,
    };
    let index = GraphIndex::from_csr(store, metadata.metric, max_degree, offsets, edges, entry_points, info)?;

    tracing::info!(
        dir = %dir.display(),
        nodes = index.len(),
        edges = index.num_edges(),
        max_degree,
        metric = %index.metric(),
        "Loaded graph index"
    );
    Ok(index)
}

/// Map an I/O failure while decoding to `CorruptIndex` when it means the
/// file ended early
fn decode_err<'a>(path: &'a Path, what: &str) -> impl FnOnce(io::Error) -> Error + 'a {
    let what = what.to_string();
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::corrupt(format!("{} truncated while reading {}", path.display(), what))
        } else {
            Error::io(format!("reading {} of {}", what, path.display()), e)
        }
    }
}

fn open_reader(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn expect_eof(reader: &mut impl Read, path: &Path) -> Result<()> {
    let mut extra = [0u8; 1];
    match reader.read(&mut extra) {
        Ok(0) => Ok(()),
        Ok(_) => Err(Error::corrupt(format!("{} has trailing bytes", path.display()))),
        Err(e) => Err(Error::io(format!("reading {}", path.display()), e)),
    }
}

/// Read and validate `graph.bin`. Returns `(max_degree, offsets, edges)`.
fn read_graph(path: &Path, count: usize) -> Result<(usize, Vec<usize>, Vec<VectorId>)> {
    let mut r = open_reader(path)?;

    let mut magic = [0u8; 8];
    r.read_exact(&mut magic).map_err(decode_err(path, "magic"))?;
    if &magic != GRAPH_MAGIC {
        return Err(Error::corrupt(format!("{} is not a graph file", path.display())));
    }
    let version = r.read_u32::<LittleEndian>().map_err(decode_err(path, "version"))?;
    if version != FORMAT_VERSION {
        return Err(Error::corrupt(format!("unsupported graph version {}", version)));
    }

    let n = r.read_u32::<LittleEndian>().map_err(decode_err(path, "node count"))? as usize;
    if n != count {
        return Err(Error::corrupt(format!("graph has {} nodes, expected {}", n, count)));
    }
    let max_degree = r.read_u32::<LittleEndian>().map_err(decode_err(path, "max degree"))? as usize;

    let mut degrees = vec![0u32; n];
    r.read_u32_into::<LittleEndian>(&mut degrees)
        .map_err(decode_err(path, "degree table"))?;

    let mut offsets = Vec::with_capacity(n + 1);
    offsets.push(0usize);
    for (id, &d) in degrees.iter().enumerate() {
        if d as usize > max_degree {
            return Err(Error::corrupt(format!(
                "node {} has degree {} > max degree {}",
                id, d, max_degree
            )));
        }
        let last = offsets[offsets.len() - 1];
        offsets.push(last + d as usize);
    }

    let total = offsets[n];
    let mut edges = vec![0 as VectorId; total];
    r.read_u32_into::<LittleEndian>(&mut edges)
        .map_err(decode_err(path, "neighbor ids"))?;
    expect_eof(&mut r, path)?;

    for id in 0..n {
        check_node(id, &edges[offsets[id]..offsets[id + 1]], n, max_degree)?;
    }
    Ok((max_degree, offsets, edges))
}

fn read_entry_points(path: &Path) -> Result<Vec<VectorId>> {
    let mut r = open_reader(path)?;
    let count = r.read_u32::<LittleEndian>().map_err(decode_err(path, "entry count"))? as usize;
    let mut ids = vec![0 as VectorId; count];
    r.read_u32_into::<LittleEndian>(&mut ids)
        .map_err(decode_err(path, "entry points"))?;
    expect_eof(&mut r, path)?;
    Ok(ids)
}

impl GraphIndex {
    /// Save into `dir`. See [`save`].
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        save(self, dir)
    }

    /// Load from `dir` over `store`. See [`load`].
    pub fn load(dir: impl AsRef<Path>, store: Arc<VectorStore>, count: usize, dim: usize) -> Result<Self> {
        load(dir, store, count, dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_index() -> GraphIndex {
        let store = Arc::new(VectorStore::from_u8(vec![0, 0, 1, 1, 5, 5], 2).unwrap());
        let info = BuildInfo { l_build: 4, alpha: 1.2, built_at: 1_700_000_000 };
        GraphIndex::from_adjacency(store, Metric::SquaredEuclidean, 2, vec![vec![1], vec![0, 2], vec![1]], vec![1], info)
            .unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let index = small_index();
        index.save(tmp.path()).unwrap();

        for name in [GRAPH_FILE, ENTRY_POINTS_FILE, METADATA_FILE] {
            assert!(tmp.path().join(name).exists());
        }
        assert!(!tmp.path().join("graph.bin.tmp").exists());

        let loaded = GraphIndex::load(tmp.path(), Arc::clone(index.store()), 3, 2).unwrap();
        assert_eq!(loaded.to_adjacency(), index.to_adjacency());
        assert_eq!(loaded.entry_points(), index.entry_points());
        assert_eq!(loaded.build_info(), index.build_info());

        let meta = IndexMetadata::read(tmp.path()).unwrap();
        assert_eq!(meta.element_type, ElementType::Uint8);
        assert_eq!(meta.max_degree, 2);
    }

    #[test]
    fn test_graph_file_layout() {
        let tmp = TempDir::new().unwrap();
        small_index().save(tmp.path()).unwrap();
        let bytes = fs::read(tmp.path().join(GRAPH_FILE)).unwrap();
        // magic + version + n + R + 3 degrees + 4 edges
        assert_eq!(bytes.len(), 8 + 4 + 4 + 4 + 3 * 4 + 4 * 4);
        assert_eq!(&bytes[0..8], b"GANNGRPH");
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &2u32.to_le_bytes());
    }

    #[test]
    fn test_missing_metadata_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let index = small_index();
        index.save(tmp.path()).unwrap();
        fs::remove_file(tmp.path().join(METADATA_FILE)).unwrap();
        let err = GraphIndex::load(tmp.path(), Arc::clone(index.store()), 3, 2).unwrap_err();
        assert_eq!(err.error_code(), "CORRUPT_INDEX");
    }

    #[test]
    fn test_dim_mismatch() {
        let tmp = TempDir::new().unwrap();
        let index = small_index();
        index.save(tmp.path()).unwrap();
        let err = GraphIndex::load(tmp.path(), Arc::clone(index.store()), 3, 4).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }
}
