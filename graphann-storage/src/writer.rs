//! # Vector File Writer
//!
//! Streams vectors into the `[count: u32][dim: u32][elements]` layout read by
//! [`VectorStore`](crate::VectorStore). The count is patched into the header
//! on [`BinWriter::finish`], so callers don't need to know it up front.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use graphann_core::error::{Error, Result, ResultExt};
use graphann_core::{ElementType, VectorRef};

/// Streaming writer for `.fbin` / `.u8bin` / `.i8bin` style files
pub struct BinWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    element_type: ElementType,
    dim: usize,
    count: u64,
}

impl BinWriter {
    /// Create (or truncate) `path` and write a provisional header
    pub fn create(path: impl AsRef<Path>, element_type: ElementType, dim: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if dim == 0 || dim > u32::MAX as usize {
            return Err(Error::invalid_params(format!("unsupported dimension {}", dim)));
        }
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_u32::<LittleEndian>(0)?;
        writer.write_u32::<LittleEndian>(dim as u32)?;
        Ok(Self { writer, path, element_type, dim, count: 0 })
    }

    /// Append one vector
    pub fn push<'a>(&mut self, vector: impl Into<VectorRef<'a>>) -> Result<()> {
        let vector = vector.into();
        if vector.dim() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.dim() });
        }
        self.write_elements(vector)?;
        self.count += 1;
        Ok(())
    }

    /// Append a row-major block of vectors
    pub fn push_all<'a>(&mut self, data: impl Into<VectorRef<'a>>) -> Result<()> {
        let data = data.into();
        if data.dim() % self.dim != 0 {
            return Err(Error::invalid_params(format!(
                "buffer of {} elements is not a multiple of dimension {}",
                data.dim(),
                self.dim
            )));
        }
        self.write_elements(data)?;
        self.count += (data.dim() / self.dim) as u64;
        Ok(())
    }

    fn write_elements(&mut self, data: VectorRef<'_>) -> Result<()> {
        if data.element_type() != self.element_type {
            return Err(Error::invalid_params(format!(
                "cannot write {} elements to a {} file",
                data.element_type(),
                self.element_type
            )));
        }
        let w = &mut self.writer;
        match data {
            VectorRef::F32(v) => {
                for &x in v {
                    w.write_f32::<LittleEndian>(x)?;
                }
            }
            VectorRef::U8(v) => w.write_all(v)?,
            VectorRef::I8(v) => {
                for &x in v {
                    w.write_i8(x)?;
                }
            }
            VectorRef::I16(v) => {
                for &x in v {
                    w.write_i16::<LittleEndian>(x)?;
                }
            }
        }
        Ok(())
    }

    /// Number of vectors written so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Patch the header count, flush and sync
    pub fn finish(mut self) -> Result<u32> {
        let count = u32::try_from(self.count).map_err(|_| {
            Error::invalid_params(format!("{} vectors do not fit a u32 header", self.count))
        })?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_u32::<LittleEndian>(count)?;
        self.writer.flush()?;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| Error::io(format!("flushing {}", self.path.display()), e.into_error()))?;
        file.sync_all().with_context(|| format!("syncing {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), count, dim = self.dim, "Wrote vector file");
        Ok(count)
    }
}

/// Write a row-major buffer as a vector file in one call
pub fn write_bin<'a>(path: impl AsRef<Path>, data: impl Into<VectorRef<'a>>, dim: usize) -> Result<u32> {
    let data = data.into();
    let mut writer = BinWriter::create(path, data.element_type(), dim)?;
    writer.push_all(data)?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_header_and_body_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("small.i16bin");
        let mut writer = BinWriter::create(&path, ElementType::Int16, 2).unwrap();
        writer.push(&[1i16, -2][..]).unwrap();
        writer.push(&[300i16, 4][..]).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8 + 2 * 2 * 2);
        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..10], &1i16.to_le_bytes());
        assert_eq!(&bytes[10..12], &(-2i16).to_le_bytes());
        assert_eq!(&bytes[12..14], &300i16.to_le_bytes());
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let tmp = TempDir::new().unwrap();
        let mut writer = BinWriter::create(tmp.path().join("x.fbin"), ElementType::Float32, 3).unwrap();
        assert!(matches!(
            writer.push(&[1.0f32, 2.0][..]),
            Err(Error::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(writer.push(&[1u8, 2, 3][..]).is_err());
        assert!(writer.push_all(&[0.0f32; 7][..]).is_err());
        assert_eq!(writer.count(), 0);
    }
}
