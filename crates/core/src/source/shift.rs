//! Integer pixel translation of another source

use crate::error::Result;
use crate::raster::{IRect, ScalarType};
use crate::source::TileSource;
use crate::Tile;
use std::sync::Arc;

/// Reads the wrapped source at the requested rectangle moved by `(dx, dy)`
/// and labels the result with the requested origin, so output pixel
/// `(x, y)` holds input pixel `(x + dx, y + dy)`.
pub struct ShiftSource {
    input: Arc<dyn TileSource>,
    dx: i64,
    dy: i64,
}

impl ShiftSource {
    pub fn new(input: Arc<dyn TileSource>, dx: i64, dy: i64) -> Self {
        Self { input, dx, dy }
    }

    pub fn offset(&self) -> (i64, i64) {
        (self.dx, self.dy)
    }
}

impl TileSource for ShiftSource {
    fn get_tile(&self, rect: &IRect, res_level: u32) -> Result<Option<Tile>> {
        let moved = rect.translated(self.dx, self.dy)?;
        let tile = self.input.get_tile(&moved, res_level)?.map(|mut tile| {
            tile.set_origin(rect.x, rect.y);
            tile
        });
        Ok(tile)
    }

    fn number_of_output_bands(&self) -> usize {
        self.input.number_of_output_bands()
    }

    fn null_pixel_value(&self, band: usize) -> f64 {
        self.input.null_pixel_value(band)
    }

    fn min_pixel_value(&self, band: usize) -> f64 {
        self.input.min_pixel_value(band)
    }

    fn max_pixel_value(&self, band: usize) -> f64 {
        self.input.max_pixel_value(band)
    }

    fn output_scalar_type(&self) -> ScalarType {
        self.input.output_scalar_type()
    }

    fn bounding_rect(&self, res_level: u32) -> Option<IRect> {
        let (dx, dy) = (self.dx.saturating_neg(), self.dy.saturating_neg());
        self.input
            .bounding_rect(res_level)
            .and_then(|r| r.translated(dx, dy).ok())
    }
}
