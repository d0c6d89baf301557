//! Main Tile type

use crate::error::{Error, Result};
use crate::raster::{IRect, ScalarType};
use ndarray::{Array3, ArrayView2, ArrayViewMut2, Axis};

/// Coarse classification of how much of a tile holds valid data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileStatus {
    /// No buffer allocated
    #[default]
    Empty,
    /// Buffer allocated but every pixel is null
    Null,
    /// Some pixels are null in some band
    Partial,
    /// No null pixels
    Full,
}

impl TileStatus {
    /// Whether the tile carries any valid pixel
    pub fn has_data(self) -> bool {
        matches!(self, TileStatus::Partial | TileStatus::Full)
    }
}

/// Null test used throughout: exact match, or both NaN.
#[inline]
pub fn is_null_value(value: f64, null: f64) -> bool {
    value == null || (null.is_nan() && value.is_nan())
}

/// A rectangular, multi-band tile of double-precision samples.
///
/// Samples are stored band-major in an `Array3` indexed `(band, row, col)`.
/// The buffer is optional: a tile without one has [`TileStatus::Empty`].
/// Every band carries its own null, min and max pixel value.
///
/// # Example
///
/// ```ignore
/// use bandcalc_core::{IRect, Tile};
///
/// let mut tile = Tile::new(IRect::from_size(64, 64), 3);
/// tile.initialize();           // allocated, all null
/// tile.fill_band(1, 42.0)?;
/// tile.validate();             // Partial
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    rect: IRect,
    bands: usize,
    data: Option<Array3<f64>>,
    null: Vec<f64>,
    min: Vec<f64>,
    max: Vec<f64>,
    status: TileStatus,
    scalar_type: ScalarType,
}

impl Tile {
    /// Create an unallocated tile with `f64` default metadata
    pub fn new(rect: IRect, bands: usize) -> Self {
        Self::with_scalar_type(rect, bands, ScalarType::Float64)
    }

    /// Create an unallocated tile whose band metadata defaults to `scalar_type`
    pub fn with_scalar_type(rect: IRect, bands: usize, scalar_type: ScalarType) -> Self {
        let bands = bands.max(1);
        Self {
            rect,
            bands,
            data: None,
            null: vec![scalar_type.default_null(); bands],
            min: vec![scalar_type.default_min(); bands],
            max: vec![scalar_type.default_max(); bands],
            status: TileStatus::Empty,
            scalar_type,
        }
    }

    /// Create a full tile with every sample set to `value`
    pub fn filled(rect: IRect, bands: usize, value: f64) -> Self {
        let mut tile = Self::new(rect, bands);
        tile.data = Some(Array3::from_elem((tile.bands, rect.height, rect.width), value));
        tile.validate();
        tile
    }

    /// Create a tile from an existing `(band, row, col)` array
    pub fn from_array(rect: IRect, data: Array3<f64>) -> Result<Self> {
        let (bands, rows, cols) = data.dim();
        if rows != rect.height || cols != rect.width {
            return Err(Error::SizeMismatch {
                er: rect.height,
                ec: rect.width,
                ar: rows,
                ac: cols,
            });
        }
        if bands == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let mut tile = Self::new(rect, bands);
        tile.data = Some(data);
        tile.validate();
        Ok(tile)
    }

    /// Create a tile from row-major band planes concatenated in `data`
    pub fn from_vec(rect: IRect, bands: usize, data: Vec<f64>) -> Result<Self> {
        if bands == 0 || data.len() != bands * rect.size() {
            return Err(Error::InvalidDimensions {
                width: rect.width,
                height: rect.height,
            });
        }
        let array = Array3::from_shape_vec((bands, rect.height, rect.width), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Self::from_array(rect, array)
    }

    // Geometry

    pub fn rect(&self) -> IRect {
        self.rect
    }

    pub fn width(&self) -> usize {
        self.rect.width
    }

    pub fn height(&self) -> usize {
        self.rect.height
    }

    /// Upper-left pixel of the tile in image space
    pub fn origin(&self) -> (i64, i64) {
        (self.rect.x, self.rect.y)
    }

    pub fn number_of_bands(&self) -> usize {
        self.bands
    }

    /// Samples per band
    pub fn size_per_band(&self) -> usize {
        self.rect.size()
    }

    /// Move the tile to `rect`.
    ///
    /// The buffer survives when the pixel count is unchanged (it is reshaped
    /// to the new width/height); otherwise it is dropped and the tile becomes
    /// [`TileStatus::Empty`].
    pub fn set_rect(&mut self, rect: IRect) {
        let reshaped = rect.width != self.rect.width || rect.height != self.rect.height;
        if rect.size() != self.rect.size() {
            self.data = None;
        } else if reshaped && let Some(data) = self.data.take() {
            self.data = data
                .into_shape_with_order((self.bands, rect.height, rect.width))
                .ok();
        }
        if self.data.is_none() {
            self.status = TileStatus::Empty;
        }
        self.rect = rect;
    }

    /// Change the origin only
    pub fn set_origin(&mut self, x: i64, y: i64) {
        self.rect.x = x;
        self.rect.y = y;
    }

    // Buffer lifecycle

    /// Allocate the buffer (if missing or mis-sized) and fill it with nulls
    pub fn initialize(&mut self) {
        let dim = (self.bands, self.rect.height, self.rect.width);
        match &self.data {
            Some(d) if d.dim() == dim => {}
            _ => self.data = Some(Array3::zeros(dim)),
        }
        self.fill_nulls();
    }

    /// Reset every sample to its band's null value, keeping the allocation
    pub fn make_blank(&mut self) {
        if self.data.is_some() {
            self.fill_nulls();
        }
    }

    fn fill_nulls(&mut self) {
        if let Some(data) = self.data.as_mut() {
            for (band, mut plane) in data.axis_iter_mut(Axis(0)).enumerate() {
                plane.fill(self.null[band]);
            }
            self.status = TileStatus::Null;
        }
    }

    /// Drop the buffer
    pub fn release(&mut self) {
        self.data = None;
        self.status = TileStatus::Empty;
    }

    pub fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    /// Recompute the status by scanning every band against its null value
    pub fn validate(&mut self) -> TileStatus {
        let Some(data) = self.data.as_ref() else {
            self.status = TileStatus::Empty;
            return self.status;
        };

        let mut valid = 0usize;
        for (band, plane) in data.axis_iter(Axis(0)).enumerate() {
            let np = self.null[band];
            valid += plane.iter().filter(|&&v| !is_null_value(v, np)).count();
        }

        self.status = if valid == 0 {
            TileStatus::Null
        } else if valid == data.len() {
            TileStatus::Full
        } else {
            TileStatus::Partial
        };
        self.status
    }

    pub fn status(&self) -> TileStatus {
        self.status
    }

    /// Override the status without scanning
    pub fn set_status(&mut self, status: TileStatus) {
        self.status = status;
    }

    // Data access

    pub fn data(&self) -> Option<&Array3<f64>> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut Array3<f64>> {
        self.data.as_mut()
    }

    /// Consume the tile and return its buffer
    pub fn into_array(self) -> Option<Array3<f64>> {
        self.data
    }

    /// View of one band plane
    pub fn band(&self, band: usize) -> Result<ArrayView2<'_, f64>> {
        self.check_band(band)?;
        let data = self.data.as_ref().ok_or(Error::Unallocated)?;
        Ok(data.index_axis(Axis(0), band))
    }

    /// Mutable view of one band plane
    pub fn band_mut(&mut self, band: usize) -> Result<ArrayViewMut2<'_, f64>> {
        self.check_band(band)?;
        let data = self.data.as_mut().ok_or(Error::Unallocated)?;
        Ok(data.index_axis_mut(Axis(0), band))
    }

    /// Get the sample at (band, row, col)
    pub fn get(&self, band: usize, row: usize, col: usize) -> Result<f64> {
        self.data
            .as_ref()
            .ok_or(Error::Unallocated)?
            .get((band, row, col))
            .copied()
            .ok_or(self.out_of_bounds(band, row, col))
    }

    /// Set the sample at (band, row, col); the status is not updated
    pub fn set(&mut self, band: usize, row: usize, col: usize, value: f64) -> Result<()> {
        let err = self.out_of_bounds(band, row, col);
        let slot = self
            .data
            .as_mut()
            .ok_or(Error::Unallocated)?
            .get_mut((band, row, col))
            .ok_or(err)?;
        *slot = value;
        Ok(())
    }

    fn out_of_bounds(&self, band: usize, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            band,
            row,
            col,
            bands: self.bands,
            rows: self.height(),
            cols: self.width(),
        }
    }

    fn check_band(&self, band: usize) -> Result<()> {
        if band >= self.bands {
            return Err(Error::BandOutOfRange {
                band,
                bands: self.bands,
            });
        }
        Ok(())
    }

    // Band operations

    /// Set every sample of `band` to `value`, allocating the tile if needed
    pub fn fill_band(&mut self, band: usize, value: f64) -> Result<()> {
        self.check_band(band)?;
        if self.data.is_none() {
            self.initialize();
        }
        self.band_mut(band)?.fill(value);
        Ok(())
    }

    /// Copy `src_band` of `src` into `dst_band` of this tile.
    ///
    /// Both tiles must have the same width and height. Nothing is copied when
    /// `src` has no buffer; this tile is allocated first if it has none.
    pub fn assign_band(&mut self, src: &Tile, src_band: usize, dst_band: usize) -> Result<()> {
        src.check_band(src_band)?;
        self.check_band(dst_band)?;
        if src.width() != self.width() || src.height() != self.height() {
            return Err(Error::SizeMismatch {
                er: self.height(),
                ec: self.width(),
                ar: src.height(),
                ac: src.width(),
            });
        }
        let Some(src_data) = src.data.as_ref() else {
            return Ok(());
        };
        if self.data.is_none() {
            self.initialize();
        }
        self.band_mut(dst_band)?
            .assign(&src_data.index_axis(Axis(0), src_band));
        Ok(())
    }

    /// A single-band copy of `band`, carrying that band's metadata
    pub fn extract_band(&self, band: usize) -> Result<Tile> {
        self.check_band(band)?;
        let mut out = Tile::with_scalar_type(self.rect, 1, self.scalar_type);
        out.null[0] = self.null[band];
        out.min[0] = self.min[band];
        out.max[0] = self.max[band];
        if let Some(data) = self.data.as_ref() {
            let plane = data.index_axis(Axis(0), band).to_owned();
            out.data = Some(plane.insert_axis(Axis(0)));
        }
        out.validate();
        Ok(out)
    }

    /// Grow to `bands` bands by repeating the last band's samples and metadata.
    /// Never shrinks.
    pub fn expand_bands(&mut self, bands: usize) {
        if bands <= self.bands {
            return;
        }
        let last = self.bands - 1;
        self.null.resize(bands, self.null[last]);
        self.min.resize(bands, self.min[last]);
        self.max.resize(bands, self.max[last]);
        if let Some(data) = self.data.take() {
            let mut grown = Array3::zeros((bands, self.height(), self.width()));
            for b in 0..bands {
                grown
                    .index_axis_mut(Axis(0), b)
                    .assign(&data.index_axis(Axis(0), b.min(last)));
            }
            self.data = Some(grown);
        }
        self.bands = bands;
    }

    /// Copy the overlapping region of `other` into this tile (image-space
    /// aligned). Null samples of `other` are skipped.
    pub fn copy_from(&mut self, other: &Tile) -> Result<()> {
        let Some(overlap) = self.rect.intersection(&other.rect) else {
            return Ok(());
        };
        let Some(src) = other.data.as_ref() else {
            return Ok(());
        };
        if self.data.is_none() {
            self.initialize();
        }
        let bands = self.bands;
        let other_last = other.bands - 1;
        let (sx, sy) = (self.rect.x, self.rect.y);
        let (ox, oy) = (other.rect.x, other.rect.y);
        let dst = self.data.as_mut().ok_or(Error::Unallocated)?;
        for band in 0..bands {
            let ob = band.min(other_last);
            let np = other.null[ob];
            for y in overlap.y..overlap.y + overlap.height as i64 {
                for x in overlap.x..overlap.x + overlap.width as i64 {
                    let v = src[(ob, (y - oy) as usize, (x - ox) as usize)];
                    if !is_null_value(v, np) {
                        dst[(band, (y - sy) as usize, (x - sx) as usize)] = v;
                    }
                }
            }
        }
        Ok(())
    }

    // Metadata

    pub fn null_pixel(&self, band: usize) -> f64 {
        self.null[band.min(self.bands - 1)]
    }

    pub fn min_pixel(&self, band: usize) -> f64 {
        self.min[band.min(self.bands - 1)]
    }

    pub fn max_pixel(&self, band: usize) -> f64 {
        self.max[band.min(self.bands - 1)]
    }

    pub fn null_pixels(&self) -> &[f64] {
        &self.null
    }

    pub fn set_null_pixel(&mut self, band: usize, value: f64) -> Result<()> {
        self.check_band(band)?;
        self.null[band] = value;
        Ok(())
    }

    pub fn set_min_pixel(&mut self, band: usize, value: f64) -> Result<()> {
        self.check_band(band)?;
        self.min[band] = value;
        Ok(())
    }

    pub fn set_max_pixel(&mut self, band: usize, value: f64) -> Result<()> {
        self.check_band(band)?;
        self.max[band] = value;
        Ok(())
    }

    /// Set min and max of every band
    pub fn set_valid_range(&mut self, min: f64, max: f64) {
        self.min.fill(min);
        self.max.fill(max);
    }

    /// Whether `value` is the null pixel of `band`
    pub fn is_null(&self, band: usize, value: f64) -> bool {
        is_null_value(value, self.null_pixel(band))
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// Tag the tile with a storage type; samples and metadata are untouched
    pub fn set_scalar_type(&mut self, scalar_type: ScalarType) {
        self.scalar_type = scalar_type;
    }

    /// Reset null/min/max of every band to the defaults of `scalar_type`
    pub fn set_default_metadata(&mut self, scalar_type: ScalarType) {
        self.null.fill(scalar_type.default_null());
        self.min.fill(scalar_type.default_min());
        self.max.fill(scalar_type.default_max());
    }

    // Statistics

    /// Basic statistics over the valid samples of one band
    pub fn statistics(&self, band: usize) -> Result<TileStatistics> {
        let plane = self.band(band)?;
        let np = self.null_pixel(band);

        let mut min = None::<f64>;
        let mut max = None::<f64>;
        let mut sum = 0.0;
        let mut count = 0usize;

        for &v in plane.iter() {
            if is_null_value(v, np) {
                continue;
            }
            min = Some(min.map_or(v, |m| m.min(v)));
            max = Some(max.map_or(v, |m| m.max(v)));
            sum += v;
            count += 1;
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        Ok(TileStatistics {
            min,
            max,
            mean,
            valid_count: count,
            null_count: plane.len() - count,
        })
    }
}

/// Basic statistics for one band of a tile
#[derive(Debug, Clone, PartialEq)]
pub struct TileStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub null_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> IRect {
        IRect::new(0, 0, 4, 3)
    }

    #[test]
    fn test_tile_creation() {
        let tile = Tile::new(rect(), 3);
        assert_eq!(tile.width(), 4);
        assert_eq!(tile.height(), 3);
        assert_eq!(tile.number_of_bands(), 3);
        assert_eq!(tile.status(), TileStatus::Empty);
        assert!(!tile.is_allocated());
    }

    #[test]
    fn test_initialize_and_validate() {
        let mut tile = Tile::new(rect(), 2);
        tile.initialize();
        assert_eq!(tile.status(), TileStatus::Null);

        tile.set(0, 1, 1, 5.0).unwrap();
        assert_eq!(tile.validate(), TileStatus::Partial);

        tile.fill_band(0, 1.0).unwrap();
        tile.fill_band(1, 2.0).unwrap();
        assert_eq!(tile.validate(), TileStatus::Full);

        tile.make_blank();
        assert_eq!(tile.status(), TileStatus::Null);
        assert!(tile.is_null(1, tile.get(1, 2, 3).unwrap()));
    }

    #[test]
    fn test_nan_null_is_detected() {
        let mut tile = Tile::filled(rect(), 1, 1.0);
        tile.set_null_pixel(0, f64::NAN).unwrap();
        tile.set(0, 0, 0, f64::NAN).unwrap();
        assert_eq!(tile.validate(), TileStatus::Partial);
    }

    #[test]
    fn test_extract_band_keeps_metadata() {
        let mut tile = Tile::filled(rect(), 3, 7.0);
        tile.set_null_pixel(2, -9.0).unwrap();
        tile.set_min_pixel(2, 1.0).unwrap();
        tile.set_max_pixel(2, 99.0).unwrap();

        let band = tile.extract_band(2).unwrap();
        assert_eq!(band.number_of_bands(), 1);
        assert_eq!(band.null_pixel(0), -9.0);
        assert_eq!(band.min_pixel(0), 1.0);
        assert_eq!(band.max_pixel(0), 99.0);
        assert_eq!(band.status(), TileStatus::Full);
        assert!(tile.extract_band(3).is_err());
    }

    #[test]
    fn test_expand_bands_repeats_last() {
        let mut tile = Tile::new(rect(), 2);
        tile.initialize();
        tile.fill_band(0, 1.0).unwrap();
        tile.fill_band(1, 2.0).unwrap();
        tile.expand_bands(4);
        assert_eq!(tile.number_of_bands(), 4);
        assert_eq!(tile.get(3, 2, 3).unwrap(), 2.0);
        assert_eq!(tile.get(0, 0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_set_rect_keeps_buffer_for_same_size() {
        let mut tile = Tile::filled(rect(), 1, 3.0);
        tile.set_rect(IRect::new(8, 8, 3, 4));
        assert!(tile.is_allocated());
        assert_eq!(tile.width(), 3);

        tile.set_rect(IRect::new(0, 0, 10, 10));
        assert!(!tile.is_allocated());
        assert_eq!(tile.status(), TileStatus::Empty);
    }

    #[test]
    fn test_copy_from_offset_tile() {
        let mut whole = Tile::new(IRect::new(0, 0, 4, 4), 1);
        whole.initialize();
        let part = Tile::filled(IRect::new(2, 2, 4, 4), 1, 8.0);
        whole.copy_from(&part).unwrap();
        assert_eq!(whole.get(0, 3, 3).unwrap(), 8.0);
        assert!(whole.is_null(0, whole.get(0, 0, 0).unwrap()));
        assert_eq!(whole.validate(), TileStatus::Partial);
    }

    #[test]
    fn test_statistics() {
        let mut tile = Tile::new(rect(), 1);
        tile.initialize();
        for col in 0..4 {
            tile.set(0, 0, col, col as f64).unwrap();
        }
        let stats = tile.statistics(0).unwrap();
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(3.0));
        assert_eq!(stats.valid_count, 4);
        assert_eq!(stats.null_count, 8);
    }
}
