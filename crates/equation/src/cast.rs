//! Final narrowing of an evaluated tile to the output storage type

use bandcalc_core::{ScalarType, Tile};
use ndarray::Axis;

/// Converts double-precision result tiles to an output [`ScalarType`].
///
/// Each engine owns its caster. Null samples become the target type's null
/// value; every other sample is narrowed (rounded for integer types, then
/// clamped to the type's valid range). The result keeps `f64` storage but
/// carries the target type's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileCaster {
    scalar_type: ScalarType,
}

impl TileCaster {
    pub fn new(scalar_type: ScalarType) -> Self {
        Self { scalar_type }
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    pub fn set_scalar_type(&mut self, scalar_type: ScalarType) {
        self.scalar_type = scalar_type;
    }

    /// Narrow `input` to the target type. A `Float64` target is the
    /// identity.
    pub fn cast(&self, input: &Tile) -> Tile {
        let st = self.scalar_type;
        if st == ScalarType::Float64 {
            return input.clone();
        }
        let mut out = input.clone();
        out.set_scalar_type(st);
        out.set_default_metadata(st);

        let target_null = st.default_null();
        let nulls = input.null_pixels().to_vec();
        if let Some(data) = out.data_mut() {
            for (band, mut plane) in data.axis_iter_mut(Axis(0)).enumerate() {
                let np = nulls[band];
                plane.mapv_inplace(|v| {
                    if bandcalc_core::raster::is_null_value(v, np) {
                        target_null
                    } else {
                        st.narrow(v)
                    }
                });
            }
        }
        out
    }
}
