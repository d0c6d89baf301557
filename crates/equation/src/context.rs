//! Per-request evaluation context

use crate::error::{EquationError, Result};
use bandcalc_core::{IRect, Tile, TileSource};
use std::sync::Arc;

/// Everything one evaluation pass needs from its surroundings: the
/// connected inputs, the requested rectangle and level, and the output
/// tile's per-band valid range.
pub struct EvalContext<'a> {
    sources: &'a [Arc<dyn TileSource>],
    rect: IRect,
    res_level: u32,
    out_min: Vec<f64>,
    out_max: Vec<f64>,
}

impl<'a> EvalContext<'a> {
    pub fn new(sources: &'a [Arc<dyn TileSource>], rect: IRect, res_level: u32) -> Self {
        Self {
            sources,
            rect,
            res_level,
            out_min: Vec::new(),
            out_max: Vec::new(),
        }
    }

    /// Builder: valid range written onto every fetched input tile
    pub fn with_output_range(mut self, min: Vec<f64>, max: Vec<f64>) -> Self {
        self.out_min = min;
        self.out_max = max;
        self
    }

    pub fn rect(&self) -> IRect {
        self.rect
    }

    pub fn res_level(&self) -> u32 {
        self.res_level
    }

    pub fn number_of_sources(&self) -> usize {
        self.sources.len()
    }

    /// Connected input `index`
    pub fn source(&self, index: usize) -> Result<Arc<dyn TileSource>> {
        self.sources
            .get(index)
            .cloned()
            .ok_or(EquationError::MissingSource(index))
    }

    /// Tile of input `index` for the current request, carrying the output
    /// tile's min/max per band and the input's own null values.
    pub fn fetch(&self, index: usize) -> Result<Tile> {
        let source = self.source(index)?;
        self.fetch_from(source.as_ref(), index)
    }

    /// Tile of `source` (derived from input `index`) for the current request
    pub fn fetch_from(&self, source: &dyn TileSource, index: usize) -> Result<Tile> {
        let mut tile = source
            .get_tile(&self.rect, self.res_level)
            .map_err(|source| EquationError::SourceFailed { index, source })?
            .ok_or(EquationError::NoTile { index })?;
        self.apply_output_range(&mut tile)?;
        Ok(tile)
    }

    fn apply_output_range(&self, tile: &mut Tile) -> Result<()> {
        if self.out_min.is_empty() || self.out_max.is_empty() {
            return Ok(());
        }
        let last_min = self.out_min.len() - 1;
        let last_max = self.out_max.len() - 1;
        for band in 0..tile.number_of_bands() {
            tile.set_min_pixel(band, self.out_min[band.min(last_min)])?;
            tile.set_max_pixel(band, self.out_max[band.min(last_max)])?;
        }
        Ok(())
    }
}
