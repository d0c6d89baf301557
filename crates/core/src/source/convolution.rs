//! 2-D convolution over another source

use crate::error::{Error, Result};
use crate::raster::{is_null_value, IRect, ScalarType};
use crate::source::TileSource;
use crate::Tile;
use ndarray::Array2;
use std::sync::Arc;

/// Applies a `rows x cols` kernel to every band of the wrapped source.
///
/// The kernel is anchored at `(rows / 2, cols / 2)` and is not flipped. For
/// each output pixel the input rectangle is grown by the kernel extent, so
/// edges see real neighbours when the input has them. A null centre gives a
/// null output, null neighbours are left out of the sum, and the result is
/// clamped to the band's min/max.
pub struct ConvolutionSource {
    input: Arc<dyn TileSource>,
    kernel: Array2<f64>,
}

impl ConvolutionSource {
    pub fn new(input: Arc<dyn TileSource>, kernel: Array2<f64>) -> Result<Self> {
        let (rows, cols) = kernel.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidParameter {
                name: "kernel",
                value: format!("{rows}x{cols}"),
                reason: "kernel must have at least one row and column".into(),
            });
        }
        Ok(Self { input, kernel })
    }

    /// Uniform `rows x cols` averaging kernel
    pub fn uniform(input: Arc<dyn TileSource>, rows: usize, cols: usize) -> Result<Self> {
        let cells = rows.checked_mul(cols).ok_or_else(|| Error::InvalidParameter {
            name: "kernel",
            value: format!("{rows}x{cols}"),
            reason: "kernel size overflows".into(),
        })?;
        let weight = 1.0 / cells.max(1) as f64;
        Self::new(input, Array2::from_elem((rows, cols), weight))
    }

    pub fn kernel(&self) -> &Array2<f64> {
        &self.kernel
    }
}

impl TileSource for ConvolutionSource {
    fn get_tile(&self, rect: &IRect, res_level: u32) -> Result<Option<Tile>> {
        let (krows, kcols) = self.kernel.dim();
        let (cy, cx) = (krows / 2, kcols / 2);
        let grown = rect.grown(cx, cy, kcols - 1 - cx, krows - 1 - cy)?;

        let Some(input) = self.input.get_tile(&grown, res_level)? else {
            return Ok(None);
        };
        let bands = input.number_of_bands();

        let mut out = Tile::with_scalar_type(*rect, bands, input.scalar_type());
        for band in 0..bands {
            out.set_null_pixel(band, input.null_pixel(band))?;
            out.set_min_pixel(band, input.min_pixel(band))?;
            out.set_max_pixel(band, input.max_pixel(band))?;
        }
        out.initialize();

        let Some(src) = input.data() else {
            return Ok(Some(out));
        };

        for band in 0..bands {
            let np = input.null_pixel(band);
            let (lo, hi) = (input.min_pixel(band), input.max_pixel(band));
            let mut plane = out.band_mut(band)?;
            for row in 0..rect.height {
                for col in 0..rect.width {
                    if is_null_value(src[(band, row + cy, col + cx)], np) {
                        continue;
                    }
                    let mut sum = 0.0;
                    for ((kr, kc), &w) in self.kernel.indexed_iter() {
                        let v = src[(band, row + kr, col + kc)];
                        if !is_null_value(v, np) {
                            sum += w * v;
                        }
                    }
                    plane[(row, col)] = sum.clamp(lo.min(hi), hi.max(lo));
                }
            }
        }
        out.validate();
        Ok(Some(out))
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
        self.input.bounding_rect(res_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySource, TileStatus};
    use approx::assert_relative_eq;
    use ndarray::{array, Array3};

    #[test]
    fn test_uniform_kernel_on_constant_image() {
        let src: Arc<dyn TileSource> = Arc::new(MemorySource::filled(6, 6, 1, 4.0).unwrap());
        let conv = ConvolutionSource::uniform(src, 3, 3).unwrap();
        let tile = conv.get_tile(&IRect::new(1, 1, 4, 4), 0).unwrap().unwrap();
        assert_eq!(tile.status(), TileStatus::Full);
        assert_relative_eq!(tile.get(0, 2, 2).unwrap(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kernel_is_not_flipped() {
        let data = Array3::from_shape_fn((1, 3, 3), |(_, r, c)| (r * 3 + c) as f64 + 1.0);
        let src: Arc<dyn TileSource> = Arc::new(MemorySource::new(data).unwrap().with_null(-1.0));
        // picks the right-hand neighbour
        let kernel = array![[0.0, 0.0, 1.0]];
        let conv = ConvolutionSource::new(src, kernel).unwrap();
        let tile = conv.get_tile(&IRect::new(0, 0, 2, 1), 0).unwrap().unwrap();
        assert_eq!(tile.get(0, 0, 0).unwrap(), 2.0);
        assert_eq!(tile.get(0, 0, 1).unwrap(), 3.0);
    }

    #[test]
    fn test_null_centre_stays_null() {
        let mut data = Array3::from_elem((1, 3, 3), 1.0);
        data[(0, 1, 1)] = -1.0;
        let src: Arc<dyn TileSource> = Arc::new(MemorySource::new(data).unwrap().with_null(-1.0));
        let conv = ConvolutionSource::uniform(src, 3, 3).unwrap();
        let tile = conv.get_tile(&IRect::new(0, 0, 3, 3), 0).unwrap().unwrap();
        assert_eq!(tile.get(0, 1, 1).unwrap(), -1.0);
        // neighbour of a null pixel skips it
        assert_relative_eq!(tile.get(0, 0, 0).unwrap(), 3.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_kernel_is_rejected() {
        let src: Arc<dyn TileSource> = Arc::new(MemorySource::filled(2, 2, 1, 0.0).unwrap());
        assert!(ConvolutionSource::new(src, Array2::zeros((0, 3))).is_err());
    }
}
