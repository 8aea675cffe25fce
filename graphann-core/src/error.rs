//! # Error Handling
//!
//! Error taxonomy shared by every graphann crate.
//!
//! ## Design Principles
//!
//! 1. **Distinct**: Each failure class is its own variant so callers can match on it
//! 2. **Contextual**: Errors carry the offending values (ids, dimensions, paths)
//! 3. **All-or-nothing**: Build and load return an error instead of a partial index

use thiserror::Error;

/// Result type alias for graphann operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for graphann
#[derive(Error, Debug)]
pub enum Error {
    // I/O Errors
    #[error("IO error: {message}")]
    Io { message: String, source: std::io::Error },

    // Shape Errors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector id {id} out of range (count {count})")]
    OutOfRange { id: u64, count: usize },

    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch { what: String, expected: usize, actual: usize },

    // Parameter Errors
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("Dataset is empty")]
    EmptyDataset,

    // Index Errors
    #[error("Index corruption detected: {details}")]
    CorruptIndex { details: String },

    // System Errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Shorthand for [`Error::InvalidParams`]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Error::InvalidParams { message: message.into() }
    }

    /// Shorthand for [`Error::CorruptIndex`]
    pub fn corrupt(details: impl Into<String>) -> Self {
        Error::CorruptIndex { details: details.into() }
    }

    /// Wrap an I/O error with a message naming what was being done
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io { message: message.into(), source }
    }

    /// Check if error is recoverable
    ///
    /// Recoverable errors are caller mistakes that can be fixed by retrying
    /// with different arguments. Corruption and I/O failures are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Io { .. } => false,
            Error::CorruptIndex { .. } => false,
            Error::Internal { .. } => false,
            _ => true,
        }
    }

    /// Get error code for monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Io { .. } => "IO_ERROR",
            Error::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Error::OutOfRange { .. } => "OUT_OF_RANGE",
            Error::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Error::InvalidParams { .. } => "INVALID_PARAMS",
            Error::EmptyDataset => "EMPTY_DATASET",
            Error::CorruptIndex { .. } => "CORRUPT_INDEX",
            Error::Configuration { .. } => "CONFIG_ERROR",
            Error::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Extension trait for adding context to results
pub trait ResultExt<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::Io {
            message: format!("{}: {}", f(), e),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            Error::DimensionMismatch { expected: 1, actual: 2 },
            Error::OutOfRange { id: 5, count: 3 },
            Error::ShapeMismatch { what: "rows".into(), expected: 1, actual: 2 },
            Error::invalid_params("R must be positive"),
            Error::EmptyDataset,
            Error::corrupt("bad neighbor"),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.error_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_io_context() {
        let raw: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let err = raw.with_context(|| "opening base.u8bin".to_string()).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(err.to_string().contains("base.u8bin"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::invalid_params("k > L").is_recoverable());
        assert!(!Error::corrupt("truncated").is_recoverable());
    }
}
