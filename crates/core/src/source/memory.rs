//! Whole-image in-memory source

use crate::error::{Error, Result};
use crate::io::GeoTags;
use crate::raster::{IRect, ScalarType};
use crate::source::TileSource;
use crate::Tile;
use ndarray::{Array2, Array3, Axis};

/// A full multi-band image held in memory.
///
/// Requests may extend past the image; pixels outside read as the band's
/// null value. At resolution level `L` pixel `(x, y)` samples the
/// full-resolution pixel `(x * 2^L, y * 2^L)`.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Array3<f64>,
    origin: (i64, i64),
    null: Vec<f64>,
    min: Vec<f64>,
    max: Vec<f64>,
    scalar_type: ScalarType,
    geotags: Option<GeoTags>,
}

impl MemorySource {
    /// Wrap a `(band, row, col)` array with `f64` default metadata
    pub fn new(data: Array3<f64>) -> Result<Self> {
        let (bands, rows, cols) = data.dim();
        if bands == 0 || rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let st = ScalarType::Float64;
        Ok(Self {
            data,
            origin: (0, 0),
            null: vec![st.default_null(); bands],
            min: vec![st.default_min(); bands],
            max: vec![st.default_max(); bands],
            scalar_type: st,
            geotags: None,
        })
    }

    /// Single-band source from a `(row, col)` array
    pub fn from_band(band: Array2<f64>) -> Result<Self> {
        Self::new(band.insert_axis(Axis(0)))
    }

    /// Source filled with one value in every band
    pub fn filled(width: usize, height: usize, bands: usize, value: f64) -> Result<Self> {
        Self::new(Array3::from_elem((bands, height, width), value))
    }

    /// Builder: image-space position of the upper-left pixel
    pub fn with_origin(mut self, x: i64, y: i64) -> Self {
        self.origin = (x, y);
        self
    }

    /// Builder: null value of every band
    pub fn with_null(mut self, null: f64) -> Self {
        self.null.fill(null);
        self
    }

    /// Builder: valid range of every band
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min.fill(min);
        self.max.fill(max);
        self
    }

    /// Builder: storage type reported downstream
    pub fn with_scalar_type(mut self, scalar_type: ScalarType) -> Self {
        self.scalar_type = scalar_type;
        self
    }

    pub fn with_geotags(mut self, geotags: GeoTags) -> Self {
        self.geotags = Some(geotags);
        self
    }

    pub fn set_null_pixel(&mut self, band: usize, value: f64) -> Result<()> {
        let bands = self.null.len();
        let slot = self
            .null
            .get_mut(band)
            .ok_or(Error::BandOutOfRange { band, bands })?;
        *slot = value;
        Ok(())
    }

    pub fn geotags(&self) -> Option<&GeoTags> {
        self.geotags.as_ref()
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    fn band_index(&self, band: usize) -> usize {
        band.min(self.null.len() - 1)
    }
}

impl TileSource for MemorySource {
    fn get_tile(&self, rect: &IRect, res_level: u32) -> Result<Option<Tile>> {
        let bands = self.number_of_output_bands();
        let mut tile = Tile::with_scalar_type(*rect, bands, self.scalar_type);
        for band in 0..bands {
            tile.set_null_pixel(band, self.null[band])?;
            tile.set_min_pixel(band, self.min[band])?;
            tile.set_max_pixel(band, self.max[band])?;
        }
        tile.initialize();

        let scale = 1i64.checked_shl(res_level).unwrap_or(i64::MAX);
        let (rows, cols) = (self.height() as i64, self.width() as i64);
        let (ox, oy) = self.origin;

        if let Some(out) = tile.data_mut() {
            for row in 0..rect.height {
                let sy = (rect.y + row as i64).saturating_mul(scale) - oy;
                if sy < 0 || sy >= rows {
                    continue;
                }
                for col in 0..rect.width {
                    let sx = (rect.x + col as i64).saturating_mul(scale) - ox;
                    if sx < 0 || sx >= cols {
                        continue;
                    }
                    for band in 0..bands {
                        out[(band, row, col)] = self.data[(band, sy as usize, sx as usize)];
                    }
                }
            }
        }
        tile.validate();
        Ok(Some(tile))
    }

    fn number_of_output_bands(&self) -> usize {
        self.data.dim().0
    }

    fn null_pixel_value(&self, band: usize) -> f64 {
        self.null[self.band_index(band)]
    }

    fn min_pixel_value(&self, band: usize) -> f64 {
        self.min[self.band_index(band)]
    }

    fn max_pixel_value(&self, band: usize) -> f64 {
        self.max[self.band_index(band)]
    }

    fn output_scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    fn bounding_rect(&self, res_level: u32) -> Option<IRect> {
        let scale = 1usize.checked_shl(res_level)?;
        Some(IRect::new(
            self.origin.0 / scale as i64,
            self.origin.1 / scale as i64,
            self.width().div_ceil(scale),
            self.height().div_ceil(scale),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileStatus;

    fn ramp() -> MemorySource {
        let data = Array3::from_shape_fn((1, 4, 4), |(_, r, c)| (r * 4 + c) as f64);
        MemorySource::new(data).unwrap().with_null(-1.0)
    }

    #[test]
    fn test_inside_tile_is_full() {
        let src = ramp();
        let tile = src.get_tile(&IRect::new(1, 1, 2, 2), 0).unwrap().unwrap();
        assert_eq!(tile.status(), TileStatus::Full);
        assert_eq!(tile.get(0, 0, 0).unwrap(), 5.0);
        assert_eq!(tile.get(0, 1, 1).unwrap(), 10.0);
    }

    #[test]
    fn test_outside_pixels_are_null() {
        let src = ramp();
        let tile = src.get_tile(&IRect::new(-1, 0, 2, 1), 0).unwrap().unwrap();
        assert_eq!(tile.status(), TileStatus::Partial);
        assert_eq!(tile.get(0, 0, 0).unwrap(), -1.0);
        assert_eq!(tile.get(0, 0, 1).unwrap(), 0.0);

        let far = src.get_tile(&IRect::new(100, 100, 2, 2), 0).unwrap().unwrap();
        assert_eq!(far.status(), TileStatus::Null);
    }

    #[test]
    fn test_reduced_resolution_decimates() {
        let src = ramp();
        let tile = src.get_tile(&IRect::new(0, 0, 2, 2), 1).unwrap().unwrap();
        assert_eq!(tile.get(0, 0, 1).unwrap(), 2.0);
        assert_eq!(tile.get(0, 1, 0).unwrap(), 8.0);
        assert_eq!(src.bounding_rect(1), Some(IRect::new(0, 0, 2, 2)));
    }
}
