//! # bandcalc parallel
//!
//! Splits a large extent into work tiles and evaluates an equation over
//! them on a Rayon thread pool, one engine per worker.

#[cfg(feature = "parallel")]
pub mod error;
#[cfg(feature = "parallel")]
pub mod strategy;
#[cfg(feature = "parallel")]
pub mod tiled;

#[cfg(feature = "parallel")]
pub use error::{Error, Result};
#[cfg(feature = "parallel")]
pub use strategy::{num_cpus, ProcessingMode};
#[cfg(feature = "parallel")]
pub use tiled::{TileIterator, TiledEvaluator, DEFAULT_TILE_SIZE};
