//! Error types for bandcalc

use thiserror::Error;

/// Main error type for tile and source operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid tile dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: band {band}, ({row}, {col}) in tile of {bands} band(s), size ({rows}, {cols})")]
    IndexOutOfBounds {
        band: usize,
        row: usize,
        col: usize,
        bands: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Tile size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Band {band} out of range for a tile with {bands} band(s)")]
    BandOutOfRange { band: usize, bands: usize },

    #[error("Tile buffer is not allocated")]
    Unallocated,

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for bandcalc core operations
pub type Result<T> = std::result::Result<T, Error>;
