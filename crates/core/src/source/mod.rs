//! Random-access tile sources
//!
//! A [`TileSource`] produces the tile covering a requested rectangle at a
//! given resolution level, plus per-band metadata. The equation engine pulls
//! its inputs through this trait.

mod convolution;
mod memory;
mod shift;

pub use convolution::ConvolutionSource;
pub use memory::MemorySource;
pub use shift::ShiftSource;

use crate::error::Result;
use crate::raster::{IRect, ScalarType};
use crate::Tile;
use std::sync::Arc;

/// Upstream raster input.
///
/// Implementations must be `Send + Sync` so one source can feed several
/// engines evaluating different tiles in parallel.
pub trait TileSource: Send + Sync {
    /// Fetch the tile covering `rect` at `res_level` (0 = full resolution).
    ///
    /// `Ok(None)` means the source has nothing for this request.
    fn get_tile(&self, rect: &IRect, res_level: u32) -> Result<Option<Tile>>;

    fn number_of_output_bands(&self) -> usize;

    fn null_pixel_value(&self, band: usize) -> f64;

    fn min_pixel_value(&self, band: usize) -> f64;

    fn max_pixel_value(&self, band: usize) -> f64;

    fn output_scalar_type(&self) -> ScalarType {
        ScalarType::Float64
    }

    /// Full extent at `res_level`, when known
    fn bounding_rect(&self, _res_level: u32) -> Option<IRect> {
        None
    }
}

impl<T: TileSource + ?Sized> TileSource for Arc<T> {
    fn get_tile(&self, rect: &IRect, res_level: u32) -> Result<Option<Tile>> {
        (**self).get_tile(rect, res_level)
    }

    fn number_of_output_bands(&self) -> usize {
        (**self).number_of_output_bands()
    }

    fn null_pixel_value(&self, band: usize) -> f64 {
        (**self).null_pixel_value(band)
    }

    fn min_pixel_value(&self, band: usize) -> f64 {
        (**self).min_pixel_value(band)
    }

    fn max_pixel_value(&self, band: usize) -> f64 {
        (**self).max_pixel_value(band)
    }

    fn output_scalar_type(&self) -> ScalarType {
        (**self).output_scalar_type()
    }

    fn bounding_rect(&self, res_level: u32) -> Option<IRect> {
        (**self).bounding_rect(res_level)
    }
}
