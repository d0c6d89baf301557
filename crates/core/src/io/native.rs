//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Georeferencing tags are carried through untouched
//! so an output lines up with the input it was computed from.

use crate::error::{Error, Result};
use crate::source::MemorySource;
use crate::Tile;
use ndarray::Array3;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Georeferencing tags read from (and written back to) a GeoTIFF
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoTags {
    /// ModelPixelScaleTag: `[sx, sy, sz]`
    pub pixel_scale: Vec<f64>,
    /// ModelTiepointTag: `[i, j, k, x, y, z]`
    pub tiepoint: Vec<f64>,
    /// GeoKeyDirectoryTag, when present
    pub geokeys: Option<Vec<u16>>,
}

/// Read a GeoTIFF file into an in-memory source.
///
/// Chunky multi-sample images become multi-band sources. The GDAL nodata
/// tag, when present, becomes the null value of every band; otherwise NaN
/// is used.
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<MemorySource> {
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer(data: &[u8]) -> Result<MemorySource> {
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<R>(reader: R) -> Result<MemorySource>
where
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let samples: Vec<f64> = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ));
        }
    };

    let pixels = rows * cols;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    let bands = samples.len() / pixels;

    // samples are pixel-interleaved: (row, col, band)
    let interleaved = Array3::from_shape_vec((rows, cols, bands), samples)
        .map_err(|e| Error::Other(e.to_string()))?;
    let data = interleaved.permuted_axes([2, 0, 1]).as_standard_layout().into_owned();

    let null = decoder
        .get_tag_ascii_string(tag(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN);

    let mut source = MemorySource::new(data)?.with_null(null);
    if let Some(geotags) = read_geotags(&mut decoder) {
        source = source.with_geotags(geotags);
    }
    Ok(source)
}

fn read_geotags<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<GeoTags> {
    let pixel_scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)).ok()?;
    if pixel_scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    let geokeys = decoder
        .get_tag_u32_vec(tag(GEO_KEY_DIRECTORY))
        .ok()
        .map(|keys| keys.into_iter().map(|k| k as u16).collect());
    Some(GeoTags {
        pixel_scale,
        tiepoint,
        geokeys,
    })
}

/// Write one band of a tile to a single-band 32-bit float GeoTIFF.
///
/// The band's null value is written as the GDAL nodata tag.
pub fn write_geotiff<P: AsRef<Path>>(
    tile: &Tile,
    band: usize,
    path: P,
    geotags: Option<&GeoTags>,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_geotiff(tile, band, geotags, file)
}

/// Write one band of a tile to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer(
    tile: &Tile,
    band: usize,
    geotags: Option<&GeoTags>,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(tile, band, geotags, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<W>(tile: &Tile, band: usize, geotags: Option<&GeoTags>, writer: W) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let plane = tile.band(band)?;
    let data: Vec<f32> = plane.iter().map(|&v| v as f32).collect();

    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let mut image = encoder
        .new_image::<Gray32Float>(tile.width() as u32, tile.height() as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    if let Some(gt) = geotags {
        image
            .encoder()
            .write_tag(tag(MODEL_PIXEL_SCALE), gt.pixel_scale.as_slice())
            .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;
        image
            .encoder()
            .write_tag(tag(MODEL_TIEPOINT), gt.tiepoint.as_slice())
            .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

        // minimal directory: projected model, pixel-is-area
        let geokeys = gt
            .geokeys
            .clone()
            .unwrap_or_else(|| vec![1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1]);
        image
            .encoder()
            .write_tag(tag(GEO_KEY_DIRECTORY), geokeys.as_slice())
            .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;
    }

    let nodata = (tile.null_pixel(band) as f32).to_string();
    image
        .encoder()
        .write_tag(tag(GDAL_NODATA), nodata.as_str())
        .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::IRect;
    use crate::source::TileSource;

    #[test]
    fn test_buffer_round_trip() {
        let rect = IRect::from_size(3, 2);
        let mut tile = Tile::from_vec(rect, 1, vec![1.0, 2.0, 3.0, 4.0, 5.0, -9.0]).unwrap();
        tile.set_null_pixel(0, -9.0).unwrap();

        let geotags = GeoTags {
            pixel_scale: vec![10.0, 10.0, 0.0],
            tiepoint: vec![0.0, 0.0, 0.0, 500.0, 900.0, 0.0],
            geokeys: None,
        };
        let bytes = write_geotiff_to_buffer(&tile, 0, Some(&geotags)).unwrap();
        let source = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(source.number_of_output_bands(), 1);
        assert_eq!(source.null_pixel_value(0), -9.0);
        assert_eq!(source.geotags().map(|g| g.tiepoint[3]), Some(500.0));

        let back = source.get_tile(&rect, 0).unwrap().unwrap();
        assert_eq!(back.get(0, 1, 1).unwrap(), 5.0);
        assert!(back.is_null(0, back.get(0, 1, 2).unwrap()));
    }
}
