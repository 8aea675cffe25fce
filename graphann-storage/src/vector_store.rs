//! # Memory-Mapped Vector Storage
//!
//! Read-only, zero-copy access to fixed-width binary vector files.
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             Vector File (.fbin / .u8bin / .i8bin)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Header (8 bytes, little-endian):                           │
//! │    count: u32                                                │
//! │    dim:   u32                                                │
//! │                                                              │
//! │  Body (count * dim elements, contiguous, no padding):       │
//! │    [T; dim][T; dim][T; dim] ...                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The body is read in place from the mapping once its alignment has been
//! checked. A misaligned mapping (or a big-endian host) falls back to a single
//! decoded copy.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use memmap2::{Mmap, MmapOptions};

use graphann_core::error::{Error, Result};
use graphann_core::{ElementType, VectorId, VectorRef};

/// Size of the `[count][dim]` header
pub const HEADER_SIZE: usize = 8;

/// Where the vector elements live
enum Backing {
    /// Mapped file, elements read in place starting at `HEADER_SIZE`
    Mapped(Mmap),
    F32(Vec<f32>),
    U8(Vec<u8>),
    I8(Vec<i8>),
    I16(Vec<i16>),
}

/// Immutable store of `count` vectors of `dim` components
pub struct VectorStore {
    backing: Backing,
    element_type: ElementType,
    count: usize,
    dim: usize,
    path: Option<PathBuf>,
}

impl VectorStore {
    /// Map a vector file, requiring its header to match `count` and `dim`
    pub fn open(
        path: impl AsRef<Path>,
        element_type: ElementType,
        count: usize,
        dim: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let (file, file_count, file_dim) = open_file(path)?;
        if file_count != count || file_dim != dim {
            return Err(invalid_data(
                path,
                format!(
                    "header says {} x {}, expected {} x {}",
                    file_count, file_dim, count, dim
                ),
            ));
        }
        Self::map(path, file, element_type, count, dim)
    }

    /// Map a vector file, taking `count` and `dim` from its header
    pub fn open_with_header(path: impl AsRef<Path>, element_type: ElementType) -> Result<Self> {
        let path = path.as_ref();
        let (file, count, dim) = open_file(path)?;
        Self::map(path, file, element_type, count, dim)
    }

    fn map(path: &Path, file: File, element_type: ElementType, count: usize, dim: usize) -> Result<Self> {
        if dim == 0 && count > 0 {
            return Err(invalid_data(path, "zero dimension".to_string()));
        }
        let expected = count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(element_type.size()))
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or_else(|| invalid_data(path, "size overflows usize".to_string()))?;
        let actual = file
            .metadata()
            .map_err(|e| Error::io(format!("stat {}", path.display()), e))?
            .len();
        if actual != expected as u64 {
            return Err(invalid_data(
                path,
                format!("file is {} bytes, expected {}", actual, expected),
            ));
        }

        // SAFETY: the file is opened read-only and the store never hands out
        // mutable access. Concurrent truncation by another process is outside
        // what the store can guard against.
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .map_err(|e| Error::io(format!("mapping {}", path.display()), e))?;

        let body = &mmap[HEADER_SIZE..];
        let in_place = cfg!(target_endian = "little")
            && body.as_ptr().align_offset(element_align(element_type)) == 0;

        let backing = if in_place {
            Backing::Mapped(mmap)
        } else {
            tracing::warn!(path = %path.display(), "Vector data not aligned, decoding into memory");
            decode(body, element_type)
        };

        tracing::info!(
            path = %path.display(),
            element_type = %element_type,
            count,
            dim,
            mapped = in_place,
            "Opened vector store"
        );

        Ok(Self {
            backing,
            element_type,
            count,
            dim,
            path: Some(path.to_path_buf()),
        })
    }

    /// In-memory store over a row-major f32 buffer
    pub fn from_f32(data: Vec<f32>, dim: usize) -> Result<Self> {
        let count = rows(data.len(), dim)?;
        Ok(Self::owned(Backing::F32(data), ElementType::Float32, count, dim))
    }

    /// In-memory store over a row-major u8 buffer
    pub fn from_u8(data: Vec<u8>, dim: usize) -> Result<Self> {
        let count = rows(data.len(), dim)?;
        Ok(Self::owned(Backing::U8(data), ElementType::Uint8, count, dim))
    }

    /// In-memory store over a row-major i8 buffer
    pub fn from_i8(data: Vec<i8>, dim: usize) -> Result<Self> {
        let count = rows(data.len(), dim)?;
        Ok(Self::owned(Backing::I8(data), ElementType::Int8, count, dim))
    }

    /// In-memory store over a row-major i16 buffer
    pub fn from_i16(data: Vec<i16>, dim: usize) -> Result<Self> {
        let count = rows(data.len(), dim)?;
        Ok(Self::owned(Backing::I16(data), ElementType::Int16, count, dim))
    }

    fn owned(backing: Backing, element_type: ElementType, count: usize, dim: usize) -> Self {
        Self { backing, element_type, count, dim, path: None }
    }

    /// Vector `id`, or `OutOfRange`
    #[inline]
    pub fn get(&self, id: VectorId) -> Result<VectorRef<'_>> {
        let idx = id as usize;
        if idx >= self.count {
            return Err(Error::OutOfRange { id: id as u64, count: self.count });
        }
        Ok(self.row(idx))
    }

    /// Vector at `idx` without the `Result` wrapper.
    ///
    /// Panics if `idx >= len()`. Used on hot paths where ids come from a
    /// validated graph.
    #[inline]
    pub fn row(&self, idx: usize) -> VectorRef<'_> {
        let start = idx * self.dim;
        let end = start + self.dim;
        match self.flat() {
            VectorRef::F32(v) => VectorRef::F32(&v[start..end]),
            VectorRef::U8(v) => VectorRef::U8(&v[start..end]),
            VectorRef::I8(v) => VectorRef::I8(&v[start..end]),
            VectorRef::I16(v) => VectorRef::I16(&v[start..end]),
        }
    }

    /// All elements, row-major
    pub fn flat(&self) -> VectorRef<'_> {
        match &self.backing {
            Backing::Mapped(mmap) => {
                let body = &mmap[HEADER_SIZE..];
                // SAFETY: alignment of `body` was checked in `map`, the host is
                // little-endian and every bit pattern is a valid value of the
                // element types below.
                unsafe {
                    match self.element_type {
                        ElementType::Float32 => VectorRef::F32(cast_slice::<f32>(body)),
                        ElementType::Uint8 => VectorRef::U8(body),
                        ElementType::Int8 => VectorRef::I8(cast_slice::<i8>(body)),
                        ElementType::Int16 => VectorRef::I16(cast_slice::<i16>(body)),
                    }
                }
            }
            Backing::F32(v) => VectorRef::F32(v),
            Backing::U8(v) => VectorRef::U8(v),
            Backing::I8(v) => VectorRef::I8(v),
            Backing::I16(v) => VectorRef::I16(v),
        }
    }

    /// Iterate over `(id, vector)` pairs in id order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (VectorId, VectorRef<'_>)> + '_ {
        (0..self.count).map(move |i| (i as VectorId, self.row(i)))
    }

    /// Number of vectors stored
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Vector dimension
    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Size of the vector body in bytes
    pub fn size_bytes(&self) -> usize {
        self.count * self.dim * self.element_type.size()
    }

    /// Whether elements are read in place from a file mapping
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Source file, for mapped stores and their decoded fallbacks
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Hint the kernel that graph traversal reads pages in random order
    pub fn advise_random(&self) -> Result<()> {
        #[cfg(unix)]
        {
            if let Backing::Mapped(mmap) = &self.backing {
                mmap.advise(memmap2::Advice::Random)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("element_type", &self.element_type)
            .field("count", &self.count)
            .field("dim", &self.dim)
            .field("mapped", &self.is_mapped())
            .field("path", &self.path)
            .finish()
    }
}

/// Open `path` and read its `(count, dim)` header
fn open_file(path: &Path) -> Result<(File, usize, usize)> {
    let mut file =
        File::open(path).map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
    let mut header = [0u8; HEADER_SIZE];
    file.read_exact(&mut header)
        .map_err(|e| Error::io(format!("reading header of {}", path.display()), e))?;
    let count = LittleEndian::read_u32(&header[0..4]) as usize;
    let dim = LittleEndian::read_u32(&header[4..8]) as usize;
    Ok((file, count, dim))
}

/// Read just the `(count, dim)` header of a vector file
pub fn read_header(path: impl AsRef<Path>) -> Result<(usize, usize)> {
    let (_, count, dim) = open_file(path.as_ref())?;
    Ok((count, dim))
}

fn invalid_data(path: &Path, message: String) -> Error {
    let source = io::Error::new(io::ErrorKind::InvalidData, message);
    Error::io(format!("invalid vector file {}", path.display()), source)
}

fn rows(len: usize, dim: usize) -> Result<usize> {
    if dim == 0 {
        return Err(Error::invalid_params("dimension must be at least 1"));
    }
    if len % dim != 0 {
        return Err(Error::invalid_params(format!(
            "buffer of {} elements is not a multiple of dimension {}",
            len, dim
        )));
    }
    Ok(len / dim)
}

fn element_align(element_type: ElementType) -> usize {
    match element_type {
        ElementType::Float32 => std::mem::align_of::<f32>(),
        ElementType::Uint8 | ElementType::Int8 => 1,
        ElementType::Int16 => std::mem::align_of::<i16>(),
    }
}

/// Decode a little-endian body into an owned buffer
fn decode(body: &[u8], element_type: ElementType) -> Backing {
    match element_type {
        ElementType::Float32 => {
            let mut out = vec![0f32; body.len() / 4];
            LittleEndian::read_f32_into(body, &mut out);
            Backing::F32(out)
        }
        ElementType::Uint8 => Backing::U8(body.to_vec()),
        ElementType::Int8 => Backing::I8(body.iter().map(|&b| b as i8).collect()),
        ElementType::Int16 => {
            let mut out = vec![0i16; body.len() / 2];
            LittleEndian::read_i16_into(body, &mut out);
            Backing::I16(out)
        }
    }
}

/// Reinterpret bytes as a slice of `T`.
///
/// SAFETY: `bytes` must be aligned for `T` and every bit pattern must be a
/// valid `T`.
unsafe fn cast_slice<T>(bytes: &[u8]) -> &[T] {
    std::slice::from_raw_parts(bytes.as_ptr() as *const T, bytes.len() / std::mem::size_of::<T>())
}
