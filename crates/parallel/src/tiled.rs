//! Tiled evaluation of an equation over a large extent

use crate::error::{Error, Result};
use crate::strategy::ProcessingMode;
use bandcalc_core::{IRect, Tile, TileSource};
use bandcalc_equation::{EquationCombiner, EquationParams};
use std::sync::Arc;
use tracing::{debug, info};

/// Default edge length of a work tile, in pixels
pub const DEFAULT_TILE_SIZE: usize = 256;

/// Iterator over tile rectangles covering an extent, row by row.
///
/// Tiles on the right and bottom edges are clipped to the extent.
#[derive(Debug, Clone)]
pub struct TileIterator {
    extent: IRect,
    tile_width: usize,
    tile_height: usize,
    col: usize,
    row: usize,
}

impl TileIterator {
    pub fn new(extent: IRect, tile_width: usize, tile_height: usize) -> Self {
        Self {
            extent,
            tile_width: tile_width.max(1),
            tile_height: tile_height.max(1),
            col: 0,
            row: 0,
        }
    }

    /// Number of tiles along (x, y)
    pub fn grid_size(&self) -> (usize, usize) {
        (
            self.extent.width.div_ceil(self.tile_width),
            self.extent.height.div_ceil(self.tile_height),
        )
    }

    /// Total number of tiles
    pub fn total_tiles(&self) -> usize {
        let (nx, ny) = self.grid_size();
        nx * ny
    }
}

impl Iterator for TileIterator {
    type Item = IRect;

    fn next(&mut self) -> Option<Self::Item> {
        if self.extent.is_empty() || self.row >= self.extent.height {
            return None;
        }

        let width = self.tile_width.min(self.extent.width - self.col);
        let height = self.tile_height.min(self.extent.height - self.row);
        let rect = IRect::new(
            self.extent.x + self.col as i64,
            self.extent.y + self.row as i64,
            width,
            height,
        );

        self.col += self.tile_width;
        if self.col >= self.extent.width {
            self.col = 0;
            self.row += self.tile_height;
        }

        Some(rect)
    }
}

/// Evaluates an equation over an extent by splitting it into tiles and
/// running one engine per worker thread.
///
/// Engines are never shared: each worker builds its own from the same
/// parameters and inputs, so results do not depend on the thread count.
pub struct TiledEvaluator {
    params: EquationParams,
    sources: Vec<Arc<dyn TileSource>>,
    output_bands: Option<usize>,
    tile_size: usize,
    mode: ProcessingMode,
}

impl TiledEvaluator {
    pub fn new(params: EquationParams) -> Self {
        Self {
            params,
            sources: Vec::new(),
            output_bands: None,
            tile_size: DEFAULT_TILE_SIZE,
            mode: ProcessingMode::default(),
        }
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_output_bands(mut self, bands: usize) -> Self {
        self.output_bands = Some(bands);
        self
    }

    /// Append an input, returning its `im[k]` index
    pub fn connect(&mut self, source: Arc<dyn TileSource>) -> usize {
        self.sources.push(source);
        self.sources.len() - 1
    }

    pub fn params(&self) -> &EquationParams {
        &self.params
    }

    fn build_engine(&self) -> EquationCombiner {
        let mut engine = EquationCombiner::with_params(self.params.clone());
        engine.set_output_bands(self.output_bands);
        for source in &self.sources {
            engine.connect(Arc::clone(source));
        }
        engine
    }

    /// Evaluate the whole `extent` at `res_level` into a single tile.
    ///
    /// The first failing tile aborts the run.
    pub fn evaluate(&self, extent: &IRect, res_level: u32) -> Result<Tile> {
        let probe = self.build_engine();
        let bands = probe.number_of_output_bands();
        let scalar_type = probe.output_scalar_type();

        let mut output = Tile::with_scalar_type(*extent, bands, scalar_type);
        for band in 0..bands {
            output.set_null_pixel(band, probe.null_pixel_value(band))?;
            output.set_min_pixel(band, probe.min_pixel_value(band))?;
            output.set_max_pixel(band, probe.max_pixel_value(band))?;
        }
        output.initialize();

        let rects: Vec<IRect> =
            TileIterator::new(*extent, self.tile_size, self.tile_size).collect();
        info!(
            tiles = rects.len(),
            tile_size = self.tile_size,
            mode = ?self.mode,
            "evaluating equation"
        );

        let pieces = self.mode.map_init(
            rects,
            || self.build_engine(),
            |engine, rect| {
                engine.get_tile(&rect, res_level).map_err(|source| Error::Tile {
                    x: rect.x,
                    y: rect.y,
                    source,
                })
            },
        )?;

        for piece in pieces {
            let piece = piece?;
            debug!(rect = ?piece.rect(), status = ?piece.status(), "stitching tile");
            output.copy_from(&piece)?;
        }
        output.validate();
        Ok(output)
    }
}
