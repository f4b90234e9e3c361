//! Error types for WGF4 encoding.

use std::path::PathBuf;

use thiserror::Error;

use crate::grid::GeoField;

/// Errors that can occur while encoding or decoding WGF4 rasters.
#[derive(Error, Debug)]
pub enum Wgf4Error {
    /// The two grids of a conversion disagree on geometry.
    #[error("grid geometry mismatch on field '{field}'")]
    GridMismatch { field: GeoField },

    /// The two grids expose value sequences of different length.
    #[error("grid length mismatch: start has {start} cells, end has {end}")]
    GridLengthMismatch { start: usize, end: usize },

    /// The output file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    SinkWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A scaled geo field does not fit a signed 32-bit header slot.
    #[error("field '{field}' = {value} does not fit an i32 header slot after scaling")]
    HeaderOverflow { field: GeoField, value: f64 },

    /// Multiplier must be strictly positive.
    #[error("invalid multiplier: {0}")]
    InvalidMultiplier(i32),

    /// A WGF4 byte stream could not be parsed.
    #[error("malformed WGF4 data: {0}")]
    Malformed(String),

    #[error("failed to read WGF4 file: {0}")]
    Read(#[from] std::io::Error),
}

impl Wgf4Error {
    /// Create a Malformed error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// Result type for WGF4 operations.
pub type Result<T> = std::result::Result<T, Wgf4Error>;
