//! # bandcalc core
//!
//! Core types, tile sources and I/O for the bandcalc band-algebra engine.
//!
//! This crate provides:
//! - `Tile`: a multi-band, double-precision raster tile with per-band
//!   null/min/max metadata and a coarse [`TileStatus`]
//! - `IRect`: integer pixel rectangles used to request tiles
//! - `ScalarType`: the storage types a result can be narrowed to
//! - `TileSource`: random-access tile fetch from an upstream raster, with
//!   in-memory, convolution and shift implementations
//! - Native GeoTIFF reading and writing

pub mod error;
pub mod io;
pub mod raster;
pub mod source;

pub use error::{Error, Result};
pub use raster::{IRect, ScalarType, Tile, TileStatus};
pub use source::{ConvolutionSource, MemorySource, ShiftSource, TileSource};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{IRect, ScalarType, Tile, TileStatus};
    pub use crate::source::{MemorySource, TileSource};
}
