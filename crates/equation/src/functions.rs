//! Built-in raster functions
//!
//! Each function receives its evaluated arguments by value, so rasters
//! passed in are owned here and may be mutated or dropped freely.

use crate::broadcast::{apply_binary, apply_unary, map_valid};
use crate::context::EvalContext;
use crate::error::{EquationError, Result};
use crate::lexer::Function;
use crate::ops::BinaryOp;
use crate::value::Value;
use bandcalc_core::{ConvolutionSource, ShiftSource, Tile};
use ndarray::Array2;

/// Evaluate `function` over `args`
pub fn call(function: Function, args: Vec<Value>, ctx: &EvalContext<'_>) -> Result<Value> {
    match function {
        Function::AssignBand => assign_band(args),
        Function::Band => band(args),
        Function::Blurr => blurr(args, ctx),
        Function::Clamp => clamp(args),
        Function::Conv => conv(args, ctx),
        Function::Max => fold(args, BinaryOp::Max, "max"),
        Function::Min => fold(args, BinaryOp::Min, "min"),
        Function::Shift => shift(args, ctx),
        Function::Unary(op) => {
            let [arg] = exact::<1>(args, function.name(), "1")?;
            Ok(apply_unary(op, arg))
        }
    }
}

fn exact<const N: usize>(
    args: Vec<Value>,
    function: &'static str,
    expected: &'static str,
) -> Result<[Value; N]> {
    let found = args.len();
    args.try_into().map_err(|_| EquationError::Arity {
        function,
        expected,
        found,
    })
}

fn scalar(value: &Value, function: &'static str, argument: usize) -> Result<f64> {
    value.as_scalar().ok_or(EquationError::Type {
        function,
        argument,
        expected: "scalar",
    })
}

fn raster(value: Value, function: &'static str, argument: usize) -> Result<Tile> {
    value.into_raster().ok_or(EquationError::Type {
        function,
        argument,
        expected: "raster",
    })
}

/// Truncate a scalar to a non-negative index
pub(crate) fn index(value: f64, function: &'static str, argument: usize) -> Result<usize> {
    if value.is_nan() || value < 0.0 {
        return Err(EquationError::Type {
            function,
            argument,
            expected: "non-negative index",
        });
    }
    Ok(value as usize)
}

/// A whole pixel offset; fractions are truncated
fn offset(value: f64, function: &'static str, argument: usize) -> Result<i64> {
    // i64::MAX as f64 rounds up to 2^63
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return Err(EquationError::Type {
            function,
            argument,
            expected: "finite pixel offset",
        });
    }
    Ok(value as i64)
}

fn band_index(value: &Value, function: &'static str, argument: usize, bands: usize) -> Result<usize> {
    let band = index(scalar(value, function, argument)?, function, argument)?;
    if band >= bands {
        return Err(EquationError::BandOutOfRange {
            function,
            band,
            bands,
        });
    }
    Ok(band)
}

/// `assign_band(dst, band, value)` or `assign_band(dst, band, src, src_band)`
fn assign_band(args: Vec<Value>) -> Result<Value> {
    const NAME: &str = "assign_band";
    let found = args.len();
    if !(3..=4).contains(&found) {
        return Err(EquationError::Arity {
            function: NAME,
            expected: "3 or 4",
            found,
        });
    }

    let mut args = args.into_iter();
    let (Some(dst), Some(band), Some(value)) = (args.next(), args.next(), args.next()) else {
        return Err(EquationError::EmptyStack);
    };
    let source_band = args.next();

    let mut dst = raster(dst, NAME, 0)?;
    let band = band_index(&band, NAME, 1, dst.number_of_bands())?;

    // an unallocated destination is left as it is
    let allocated = dst.is_allocated();
    match (value, source_band) {
        (Value::Scalar(v), None) => {
            if allocated {
                dst.fill_band(band, v)?;
            }
        }
        (Value::Raster(src), None) => {
            if allocated {
                dst.assign_band(&src, 0, band)?;
            }
        }
        (value, Some(source_band)) => {
            let src = raster(value, NAME, 2)?;
            let sb = band_index(&source_band, NAME, 3, src.number_of_bands())?;
            if allocated {
                dst.assign_band(&src, sb, band)?;
            }
        }
    }
    dst.validate();
    Ok(Value::Raster(dst))
}

/// `band(raster, k)`: single-band copy keeping band `k`'s metadata
fn band(args: Vec<Value>) -> Result<Value> {
    const NAME: &str = "band";
    let [src, k] = exact::<2>(args, NAME, "2")?;
    let src = raster(src, NAME, 0)?;
    let k = band_index(&k, NAME, 1, src.number_of_bands())?;
    Ok(Value::Raster(src.extract_band(k)?))
}

/// `clamp(raster, lo, hi)`; bounds are swapped when given out of order
fn clamp(args: Vec<Value>) -> Result<Value> {
    const NAME: &str = "clamp";
    let [src, lo, hi] = exact::<3>(args, NAME, "3")?;
    let mut tile = raster(src, NAME, 0)?;
    let a = scalar(&lo, NAME, 1)?;
    let b = scalar(&hi, NAME, 2)?;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    map_valid(&mut tile, |v| v.max(lo).min(hi));
    Ok(Value::Raster(tile))
}

/// Left fold of `op` over two or more arguments
fn fold(args: Vec<Value>, op: BinaryOp, function: &'static str) -> Result<Value> {
    if args.len() < 2 {
        return Err(EquationError::Arity {
            function,
            expected: "at least 2",
            found: args.len(),
        });
    }
    let mut args = args.into_iter();
    let first = args.next().ok_or(EquationError::EmptyStack)?;
    args.try_fold(first, |acc, next| apply_binary(op, acc, next))
}

fn scalars(args: &[Value], function: &'static str) -> Result<Vec<f64>> {
    args.iter()
        .enumerate()
        .map(|(i, v)| scalar(v, function, i))
        .collect()
}

/// `conv(index, rows, cols, k...)` with a row-major kernel
fn conv(args: Vec<Value>, ctx: &EvalContext<'_>) -> Result<Value> {
    const NAME: &str = "conv";
    if args.len() < 4 {
        return Err(EquationError::Arity {
            function: NAME,
            expected: "at least 4",
            found: args.len(),
        });
    }
    let values = scalars(&args, NAME)?;
    let source = index(values[0], NAME, 0)?;
    let rows = index(values[1], NAME, 1)?;
    let cols = index(values[2], NAME, 2)?;
    let weights = &values[3..];
    if rows.checked_mul(cols) != Some(weights.len()) {
        return Err(EquationError::Arity {
            function: NAME,
            expected: "3 + rows * cols",
            found: args.len(),
        });
    }
    let kernel = Array2::from_shape_vec((rows, cols), weights.to_vec())
        .map_err(|e| bandcalc_core::Error::Other(e.to_string()))?;
    let filter = ConvolutionSource::new(ctx.source(source)?, kernel)?;
    Ok(Value::Raster(ctx.fetch_from(&filter, source)?))
}

/// `blurr(index, rows, cols)`: uniform averaging kernel
fn blurr(args: Vec<Value>, ctx: &EvalContext<'_>) -> Result<Value> {
    const NAME: &str = "blurr";
    let args = exact::<3>(args, NAME, "3")?;
    let values = scalars(&args, NAME)?;
    let source = index(values[0], NAME, 0)?;
    let rows = index(values[1], NAME, 1)?;
    let cols = index(values[2], NAME, 2)?;
    let filter = ConvolutionSource::uniform(ctx.source(source)?, rows, cols)?;
    Ok(Value::Raster(ctx.fetch_from(&filter, source)?))
}

/// `shift(index, dx, dy)`
fn shift(args: Vec<Value>, ctx: &EvalContext<'_>) -> Result<Value> {
    const NAME: &str = "shift";
    let args = exact::<3>(args, NAME, "3")?;
    let values = scalars(&args, NAME)?;
    let source = index(values[0], NAME, 0)?;
    let dx = offset(values[1], NAME, 1)?;
    let dy = offset(values[2], NAME, 2)?;
    let filter = ShiftSource::new(ctx.source(source)?, dx, dy);
    Ok(Value::Raster(ctx.fetch_from(&filter, source)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandcalc_core::{IRect, MemorySource, TileSource, TileStatus};
    use ndarray::Array3;
    use std::sync::Arc;

    fn rect() -> IRect {
        IRect::from_size(3, 3)
    }

    fn three_band() -> Tile {
        let data = Array3::from_shape_fn((3, 3, 3), |(b, _, _)| b as f64 + 1.0);
        let mut tile = Tile::from_array(rect(), data).unwrap();
        tile.set_null_pixel(2, -5.0).unwrap();
        tile.set_min_pixel(2, 0.5).unwrap();
        tile
    }

    fn sources() -> Vec<Arc<dyn TileSource>> {
        let data = Array3::from_shape_fn((1, 3, 3), |(_, r, c)| (r * 3 + c) as f64);
        vec![Arc::new(MemorySource::new(data).unwrap().with_null(-1.0))]
    }

    #[test]
    fn test_band_extracts_metadata() {
        let out = band(vec![three_band().into(), Value::Scalar(2.0)]).unwrap();
        let tile = out.into_raster().unwrap();
        assert_eq!(tile.number_of_bands(), 1);
        assert_eq!(tile.get(0, 1, 1).unwrap(), 3.0);
        assert_eq!(tile.null_pixel(0), -5.0);
        assert_eq!(tile.min_pixel(0), 0.5);
    }

    #[test]
    fn test_band_errors() {
        assert!(matches!(
            band(vec![three_band().into(), Value::Scalar(3.0)]),
            Err(EquationError::BandOutOfRange { band: 3, bands: 3, .. })
        ));
        assert!(matches!(
            band(vec![Value::Scalar(1.0), Value::Scalar(0.0)]),
            Err(EquationError::Type { argument: 0, .. })
        ));
        assert!(matches!(
            band(vec![three_band().into()]),
            Err(EquationError::Arity { found: 1, .. })
        ));
    }

    #[test]
    fn test_clamp_swaps_bounds() {
        let a = clamp(vec![three_band().into(), Value::Scalar(1.5), Value::Scalar(2.5)]).unwrap();
        let b = clamp(vec![three_band().into(), Value::Scalar(2.5), Value::Scalar(1.5)]).unwrap();
        assert_eq!(a, b);
        let tile = a.into_raster().unwrap();
        assert_eq!(tile.get(0, 0, 0).unwrap(), 1.5);
        assert_eq!(tile.get(2, 0, 0).unwrap(), 2.5);
        assert!(clamp(vec![Value::Scalar(1.0), Value::Scalar(0.0), Value::Scalar(1.0)]).is_err());
    }

    #[test]
    fn test_assign_band_forms() {
        let out = assign_band(vec![three_band().into(), Value::Scalar(0.0), Value::Scalar(9.0)]).unwrap();
        assert_eq!(out.as_raster().unwrap().get(0, 2, 2).unwrap(), 9.0);

        let out = assign_band(vec![
            three_band().into(),
            Value::Scalar(0.0),
            three_band().into(),
            Value::Scalar(2.0),
        ])
        .unwrap();
        assert_eq!(out.as_raster().unwrap().get(0, 0, 0).unwrap(), 3.0);

        assert!(assign_band(vec![three_band().into(), Value::Scalar(3.0), Value::Scalar(1.0)]).is_err());
        assert!(assign_band(vec![Value::Scalar(1.0), Value::Scalar(0.0), Value::Scalar(1.0)]).is_err());
        assert!(assign_band(vec![three_band().into(), Value::Scalar(0.0)]).is_err());
    }

    #[test]
    fn test_assign_band_leaves_empty_destination() {
        let empty = Tile::new(rect(), 2);
        let out = assign_band(vec![empty.into(), Value::Scalar(1.0), Value::Scalar(4.0)]).unwrap();
        let tile = out.into_raster().unwrap();
        assert_eq!(tile.status(), TileStatus::Empty);
        assert!(!tile.is_allocated());

        let empty = Tile::new(rect(), 2);
        let args = vec![empty.into(), Value::Scalar(0.0), three_band().into(), Value::Scalar(1.0)];
        let tile = assign_band(args).unwrap().into_raster().unwrap();
        assert!(!tile.is_allocated());

        // argument checks still apply
        let empty = Tile::new(rect(), 2);
        assert!(matches!(
            assign_band(vec![empty.into(), Value::Scalar(2.0), Value::Scalar(4.0)]),
            Err(EquationError::BandOutOfRange { band: 2, bands: 2, .. })
        ));
    }

    #[test]
    fn test_min_max_fold() {
        let args = || vec![Value::Scalar(3.0), Value::Scalar(1.0), Value::Scalar(2.0)];
        assert_eq!(fold(args(), BinaryOp::Min, "min").unwrap(), Value::Scalar(1.0));
        assert_eq!(fold(args(), BinaryOp::Max, "max").unwrap(), Value::Scalar(3.0));
        assert!(fold(vec![Value::Scalar(1.0)], BinaryOp::Min, "min").is_err());
    }

    #[test]
    fn test_conv_checks_kernel_size() {
        let sources = sources();
        let ctx = EvalContext::new(&sources, rect(), 0);
        let bad = vec![Value::Scalar(0.0), Value::Scalar(2.0), Value::Scalar(2.0), Value::Scalar(1.0)];
        assert!(matches!(
            conv(bad, &ctx),
            Err(EquationError::Arity { function: "conv", .. })
        ));

        let identity = vec![Value::Scalar(0.0), Value::Scalar(1.0), Value::Scalar(1.0), Value::Scalar(1.0)];
        let tile = conv(identity, &ctx).unwrap().into_raster().unwrap();
        assert_eq!(tile.get(0, 2, 1).unwrap(), 7.0);
    }

    #[test]
    fn test_shift_and_missing_source() {
        let sources = sources();
        let ctx = EvalContext::new(&sources, rect(), 0);
        let tile = shift(vec![Value::Scalar(0.0), Value::Scalar(1.0), Value::Scalar(0.0)], &ctx)
            .unwrap()
            .into_raster()
            .unwrap();
        assert_eq!(tile.get(0, 0, 0).unwrap(), 1.0);
        assert_eq!(tile.status(), TileStatus::Partial);

        assert!(matches!(
            blurr(vec![Value::Scalar(4.0), Value::Scalar(3.0), Value::Scalar(3.0)], &ctx),
            Err(EquationError::MissingSource(4))
        ));
    }

    #[test]
    fn test_shift_rejects_unrepresentable_offsets() {
        let sources = sources();
        let ctx = EvalContext::new(&sources, IRect::new(1, 0, 2, 1), 0);
        for bad in [1e19, -1e19, f64::NAN, f64::INFINITY] {
            let args = vec![Value::Scalar(0.0), Value::Scalar(bad), Value::Scalar(0.0)];
            assert!(matches!(
                shift(args, &ctx),
                Err(EquationError::Type { function: "shift", argument: 1, .. })
            ));
        }

        // representable offset whose far edge overflows
        let near_edge = EvalContext::new(&sources, IRect::new(i64::MAX - 10, 0, 2, 1), 0);
        let args = vec![Value::Scalar(0.0), Value::Scalar(20.0), Value::Scalar(0.0)];
        assert!(matches!(
            shift(args, &near_edge),
            Err(EquationError::SourceFailed { index: 0, .. })
        ));
    }
}
