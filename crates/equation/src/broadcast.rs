//! Tile broadcaster
//!
//! Applies operators across scalar and raster operands. This is the only
//! place besides the built-in functions that touches raw sample buffers.
//!
//! Null handling follows the operand statuses:
//!
//! | left    | right      | result                    |
//! |---------|------------|---------------------------|
//! | Empty   | any        | the right operand         |
//! | Null    | any        | left unchanged (all null) |
//! | any     | Empty/Null | left unchanged            |
//! | Full    | Full       | every sample combined     |
//! | Full    | Partial    | skip where right is null  |
//! | Partial | Full       | skip where left is null   |
//! | Partial | Partial    | skip where either is null |
//!
//! When band counts differ, the shorter operand's last band is repeated and
//! the result has the larger band count.

use crate::error::Result;
use crate::ops::{BinaryOp, UnaryOp};
use crate::value::Value;
use bandcalc_core::raster::is_null_value;
use bandcalc_core::{Error, Tile, TileStatus};
use ndarray::{Axis, Zip};

/// Combine two operands with `op`, preserving operand order
pub fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(op.apply(a, b))),
        (Value::Raster(mut tile), Value::Scalar(b)) => {
            map_valid(&mut tile, |v| op.apply(v, b));
            Ok(Value::Raster(tile))
        }
        (Value::Scalar(a), Value::Raster(mut tile)) => {
            map_valid(&mut tile, |v| op.apply(a, v));
            Ok(Value::Raster(tile))
        }
        (Value::Raster(l), Value::Raster(r)) => Ok(Value::Raster(combine(op, l, r)?)),
    }
}

/// Apply `op` to a scalar or to every valid sample of a raster
pub fn apply_unary(op: UnaryOp, value: Value) -> Value {
    match value {
        Value::Scalar(v) => Value::Scalar(op.apply(v)),
        Value::Raster(mut tile) => {
            map_valid(&mut tile, |v| op.apply(v));
            Value::Raster(tile)
        }
    }
}

/// Replace every non-null sample of `tile` with `f(sample)`.
///
/// Empty and all-null tiles are left alone; full tiles skip the null test.
pub fn map_valid<F>(tile: &mut Tile, f: F)
where
    F: Fn(f64) -> f64,
{
    let status = tile.status();
    if !status.has_data() {
        return;
    }
    let nulls = tile.null_pixels().to_vec();
    let Some(data) = tile.data_mut() else {
        return;
    };
    for (band, mut plane) in data.axis_iter_mut(Axis(0)).enumerate() {
        if status == TileStatus::Full {
            plane.mapv_inplace(&f);
        } else {
            let np = nulls[band];
            plane.mapv_inplace(|v| if is_null_value(v, np) { v } else { f(v) });
        }
    }
}

fn combine(op: BinaryOp, mut left: Tile, mut right: Tile) -> Result<Tile> {
    if left.width() != right.width() || left.height() != right.height() {
        return Err(Error::SizeMismatch {
            er: left.height(),
            ec: left.width(),
            ar: right.height(),
            ac: right.width(),
        }
        .into());
    }

    let bands = left.number_of_bands().max(right.number_of_bands());

    match (left.status(), right.status()) {
        (TileStatus::Empty, _) => {
            right.expand_bands(bands);
            Ok(right)
        }
        (TileStatus::Null, _) | (_, TileStatus::Empty | TileStatus::Null) => {
            left.expand_bands(bands);
            Ok(left)
        }
        (ls, rs) => {
            left.expand_bands(bands);
            let skip_left = ls == TileStatus::Partial;
            let skip_right = rs == TileStatus::Partial;
            combine_samples(op, &mut left, &right, skip_left, skip_right)?;
            Ok(left)
        }
    }
}

fn combine_samples(
    op: BinaryOp,
    left: &mut Tile,
    right: &Tile,
    skip_left: bool,
    skip_right: bool,
) -> Result<()> {
    let right_last = right.number_of_bands() - 1;
    let left_nulls = left.null_pixels().to_vec();
    let src = right.data().ok_or(Error::Unallocated)?;
    let dst = left.data_mut().ok_or(Error::Unallocated)?;

    for (band, mut plane) in dst.axis_iter_mut(Axis(0)).enumerate() {
        let rb = band.min(right_last);
        let lnp = left_nulls[band];
        let rnp = right.null_pixel(rb);
        let other = src.index_axis(Axis(0), rb);

        Zip::from(&mut plane).and(&other).for_each(|l, &r| {
            if (skip_left && is_null_value(*l, lnp)) || (skip_right && is_null_value(r, rnp)) {
                return;
            }
            *l = op.apply(*l, r);
        });
    }
    Ok(())
}

/// Copy the non-null samples of `src` into `dst`, repeating the last band
/// of `src` when `dst` has more bands.
fn copy_valid(dst: &mut Tile, src: &Tile) -> Result<()> {
    let Some(from) = src.data() else {
        return Ok(());
    };
    let src_last = src.number_of_bands() - 1;
    let to = dst.data_mut().ok_or(Error::Unallocated)?;

    for (band, mut plane) in to.axis_iter_mut(Axis(0)).enumerate() {
        let sb = band.min(src_last);
        let np = src.null_pixel(sb);
        Zip::from(&mut plane)
            .and(&from.index_axis(Axis(0), sb))
            .for_each(|d, &s| {
                if !is_null_value(s, np) {
                    *d = s;
                }
            });
    }
    Ok(())
}

/// Write a final value into the output tile.
///
/// A scalar fills every sample. A raster is copied with band broadcasting:
/// all samples when it is full, only valid samples when partial, nothing
/// when it is empty or all null. The output status is not updated.
pub fn assign(out: &mut Tile, value: &Value) -> Result<()> {
    match value {
        Value::Scalar(v) => {
            if !out.is_allocated() {
                out.initialize();
            }
            if let Some(data) = out.data_mut() {
                data.fill(*v);
            }
            Ok(())
        }
        Value::Raster(tile) => {
            if tile.width() != out.width() || tile.height() != out.height() {
                return Err(Error::SizeMismatch {
                    er: out.height(),
                    ec: out.width(),
                    ar: tile.height(),
                    ac: tile.width(),
                }
                .into());
            }
            match tile.status() {
                TileStatus::Empty | TileStatus::Null => Ok(()),
                TileStatus::Partial => {
                    if !out.is_allocated() {
                        out.initialize();
                    }
                    copy_valid(out, tile)
                }
                TileStatus::Full => {
                    if !out.is_allocated() {
                        out.initialize();
                    }
                    let last = tile.number_of_bands() - 1;
                    for band in 0..out.number_of_bands() {
                        out.assign_band(tile, band.min(last), band)?;
                    }
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandcalc_core::IRect;

    fn rect() -> IRect {
        IRect::from_size(3, 2)
    }

    fn raster(bands: usize, value: f64) -> Tile {
        Tile::filled(rect(), bands, value)
    }

    fn partial(value: f64) -> Tile {
        let mut tile = raster(1, value);
        tile.set_null_pixel(0, -1.0).unwrap();
        tile.set(0, 0, 0, -1.0).unwrap();
        tile.validate();
        tile
    }

    fn unwrap_raster(v: Value) -> Tile {
        v.into_raster().expect("raster result")
    }

    #[test]
    fn test_scalar_scalar() {
        let v = apply_binary(BinaryOp::Sub, Value::Scalar(5.0), Value::Scalar(2.0)).unwrap();
        assert_eq!(v, Value::Scalar(3.0));
    }

    #[test]
    fn test_scalar_raster_preserves_order() {
        let t = unwrap_raster(
            apply_binary(BinaryOp::Sub, Value::Scalar(10.0), raster(1, 4.0).into()).unwrap(),
        );
        assert_eq!(t.get(0, 1, 2).unwrap(), 6.0);

        let t = unwrap_raster(
            apply_binary(BinaryOp::Div, raster(1, 4.0).into(), Value::Scalar(2.0)).unwrap(),
        );
        assert_eq!(t.get(0, 0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_partial_raster_skips_nulls() {
        let t = unwrap_raster(
            apply_binary(BinaryOp::Mul, partial(3.0).into(), Value::Scalar(2.0)).unwrap(),
        );
        assert_eq!(t.get(0, 0, 0).unwrap(), -1.0);
        assert_eq!(t.get(0, 0, 1).unwrap(), 6.0);

        let t = unwrap_raster(apply_unary(UnaryOp::Neg, partial(3.0).into()));
        assert_eq!(t.get(0, 0, 0).unwrap(), -1.0);
        assert_eq!(t.get(0, 1, 1).unwrap(), -3.0);
    }

    #[test]
    fn test_band_broadcast_one_and_three() {
        let mut three = Tile::new(rect(), 3);
        three.initialize();
        for b in 0..3 {
            three.fill_band(b, (b + 1) as f64 * 10.0).unwrap();
        }
        three.validate();

        let t = unwrap_raster(
            apply_binary(BinaryOp::Add, raster(1, 1.0).into(), three.clone().into()).unwrap(),
        );
        assert_eq!(t.number_of_bands(), 3);
        assert_eq!(t.get(0, 0, 0).unwrap(), 11.0);
        assert_eq!(t.get(1, 0, 0).unwrap(), 21.0);
        assert_eq!(t.get(2, 1, 2).unwrap(), 31.0);

        let t = unwrap_raster(
            apply_binary(BinaryOp::Sub, three.into(), raster(1, 1.0).into()).unwrap(),
        );
        assert_eq!(t.number_of_bands(), 3);
        assert_eq!(t.get(2, 0, 0).unwrap(), 29.0);
    }

    #[test]
    fn test_partial_pairs() {
        // Full op Partial: skip where right is null
        let t = unwrap_raster(
            apply_binary(BinaryOp::Add, raster(1, 1.0).into(), partial(2.0).into()).unwrap(),
        );
        assert_eq!(t.get(0, 0, 0).unwrap(), 1.0);
        assert_eq!(t.get(0, 0, 1).unwrap(), 3.0);
        assert_eq!(t.status(), TileStatus::Full);

        // Partial op Full: skip where left is null
        let t = unwrap_raster(
            apply_binary(BinaryOp::Add, partial(2.0).into(), raster(1, 1.0).into()).unwrap(),
        );
        assert_eq!(t.get(0, 0, 0).unwrap(), -1.0);
        assert_eq!(t.get(0, 1, 0).unwrap(), 3.0);
    }

    #[test]
    fn test_empty_left_takes_right() {
        let empty = Tile::new(rect(), 1);
        let t = unwrap_raster(
            apply_binary(BinaryOp::Add, empty.into(), raster(1, 5.0).into()).unwrap(),
        );
        assert_eq!(t.status(), TileStatus::Full);
        assert_eq!(t.get(0, 0, 0).unwrap(), 5.0);
    }

    #[test]
    fn test_null_left_stays_null() {
        let mut null = Tile::new(rect(), 1);
        null.initialize();
        let t = unwrap_raster(
            apply_binary(BinaryOp::Mul, null.into(), raster(3, 4.0).into()).unwrap(),
        );
        assert_eq!(t.status(), TileStatus::Null);
        assert_eq!(t.number_of_bands(), 3);
        assert!(t.is_null(2, t.get(2, 1, 1).unwrap()));
    }

    #[test]
    fn test_null_right_leaves_left() {
        let mut null = Tile::new(rect(), 1);
        null.initialize();
        let t = unwrap_raster(
            apply_binary(BinaryOp::Mul, raster(1, 7.0).into(), null.into()).unwrap(),
        );
        assert_eq!(t.get(0, 0, 0).unwrap(), 7.0);
    }

    #[test]
    fn test_size_mismatch() {
        let other = Tile::filled(IRect::from_size(2, 2), 1, 1.0);
        assert!(apply_binary(BinaryOp::Add, raster(1, 1.0).into(), other.into()).is_err());
    }

    #[test]
    fn test_assign_partial_copies_valid_only() {
        let mut out = Tile::new(rect(), 2);
        out.initialize();
        assign(&mut out, &partial(8.0).into()).unwrap();
        assert_eq!(out.validate(), TileStatus::Partial);
        assert_eq!(out.get(1, 1, 2).unwrap(), 8.0);
        assert!(out.is_null(1, out.get(1, 0, 0).unwrap()));

        assign(&mut out, &Value::Scalar(2.0)).unwrap();
        assert_eq!(out.validate(), TileStatus::Full);
    }
}
