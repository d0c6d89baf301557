//! Operand values

use bandcalc_core::Tile;

/// One operand on the evaluation stack.
///
/// A raster value owns its tile; moving it into an operator consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Raster(Tile),
}

impl Value {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, Value::Raster(_))
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Raster(_) => None,
        }
    }

    pub fn as_raster(&self) -> Option<&Tile> {
        match self {
            Value::Raster(t) => Some(t),
            Value::Scalar(_) => None,
        }
    }

    pub fn into_raster(self) -> Option<Tile> {
        match self {
            Value::Raster(t) => Some(t),
            Value::Scalar(_) => None,
        }
    }

    /// "scalar" or "raster"
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Raster(_) => "raster",
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Tile> for Value {
    fn from(t: Tile) -> Self {
        Value::Raster(t)
    }
}
