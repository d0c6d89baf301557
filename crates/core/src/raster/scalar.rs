//! Output storage types and their default pixel ranges

use num_traits::{NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trait for the primitive types a tile can be narrowed to.
///
/// Evaluation always happens in `f64`; a `Sample` describes the default
/// null/min/max of a storage type and how a double is squeezed into it.
pub trait Sample: Copy + NumCast + ToPrimitive + 'static {
    /// Default null pixel value
    fn default_null() -> f64;

    /// Smallest valid (non-null) value
    fn default_min() -> f64;

    /// Largest valid value
    fn default_max() -> f64;

    /// Narrow a non-null double into this type's valid range
    fn narrow(value: f64) -> f64;
}

macro_rules! impl_sample_int {
    ($t:ty, $null:expr, $min:expr) => {
        impl Sample for $t {
            fn default_null() -> f64 {
                $null as f64
            }

            fn default_min() -> f64 {
                $min as f64
            }

            fn default_max() -> f64 {
                <$t>::MAX as f64
            }

            fn narrow(value: f64) -> f64 {
                let clamped = value.round().clamp(Self::default_min(), Self::default_max());
                num_traits::cast::<f64, $t>(clamped)
                    .and_then(|v| v.to_f64())
                    .unwrap_or(Self::default_min())
            }
        }
    };
}

macro_rules! impl_sample_float {
    ($t:ty) => {
        impl Sample for $t {
            fn default_null() -> f64 {
                -1.0 / (<$t>::EPSILON as f64)
            }

            fn default_min() -> f64 {
                Self::default_null() + 1.0
            }

            fn default_max() -> f64 {
                1.0 / (<$t>::EPSILON as f64)
            }

            fn narrow(value: f64) -> f64 {
                let clamped = value.clamp(Self::default_min(), Self::default_max());
                num_traits::cast::<f64, $t>(clamped)
                    .and_then(|v| v.to_f64())
                    .unwrap_or(clamped)
            }
        }
    };
}

impl_sample_int!(u8, 0u8, 1u8);
impl_sample_int!(i8, i8::MIN, i8::MIN + 1);
impl_sample_int!(u16, 0u16, 1u16);
impl_sample_int!(i16, i16::MIN, i16::MIN + 1);
impl_sample_int!(u32, 0u32, 1u32);
impl_sample_int!(i32, i32::MIN, i32::MIN + 1);
impl_sample_float!(f32);
impl_sample_float!(f64);

/// Storage type a result tile is cast to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    UInt8,
    SInt8,
    UInt16,
    SInt16,
    UInt32,
    SInt32,
    Float32,
    #[default]
    Float64,
}

macro_rules! dispatch {
    ($st:expr, $f:ident $(, $arg:expr)*) => {
        match $st {
            ScalarType::UInt8 => <u8 as Sample>::$f($($arg),*),
            ScalarType::SInt8 => <i8 as Sample>::$f($($arg),*),
            ScalarType::UInt16 => <u16 as Sample>::$f($($arg),*),
            ScalarType::SInt16 => <i16 as Sample>::$f($($arg),*),
            ScalarType::UInt32 => <u32 as Sample>::$f($($arg),*),
            ScalarType::SInt32 => <i32 as Sample>::$f($($arg),*),
            ScalarType::Float32 => <f32 as Sample>::$f($($arg),*),
            ScalarType::Float64 => <f64 as Sample>::$f($($arg),*),
        }
    };
}

impl ScalarType {
    /// Every supported type, in table order
    pub const ALL: [ScalarType; 8] = [
        ScalarType::UInt8,
        ScalarType::SInt8,
        ScalarType::UInt16,
        ScalarType::SInt16,
        ScalarType::UInt32,
        ScalarType::SInt32,
        ScalarType::Float32,
        ScalarType::Float64,
    ];

    /// Canonical name used in properties and keyword lists
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::UInt8 => "ossim_uint8",
            ScalarType::SInt8 => "ossim_sint8",
            ScalarType::UInt16 => "ossim_uint16",
            ScalarType::SInt16 => "ossim_sint16",
            ScalarType::UInt32 => "ossim_uint32",
            ScalarType::SInt32 => "ossim_sint32",
            ScalarType::Float32 => "ossim_float32",
            ScalarType::Float64 => "ossim_float64",
        }
    }

    /// Look up a type by canonical name or short alias (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let short = lower.strip_prefix("ossim_").unwrap_or(&lower);
        let st = match short {
            "uint8" | "u8" | "uchar" => ScalarType::UInt8,
            "sint8" | "int8" | "i8" => ScalarType::SInt8,
            "uint16" | "u16" | "ushort" => ScalarType::UInt16,
            "sint16" | "int16" | "i16" | "short" => ScalarType::SInt16,
            "uint32" | "u32" | "uint" => ScalarType::UInt32,
            "sint32" | "int32" | "i32" | "int" => ScalarType::SInt32,
            "float32" | "f32" | "float" => ScalarType::Float32,
            "float64" | "f64" | "double" => ScalarType::Float64,
            _ => return None,
        };
        Some(st)
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }

    pub fn default_null(self) -> f64 {
        dispatch!(self, default_null)
    }

    pub fn default_min(self) -> f64 {
        dispatch!(self, default_min)
    }

    pub fn default_max(self) -> f64 {
        dispatch!(self, default_max)
    }

    /// Narrow a non-null double into this type: integers are rounded, and
    /// every type is clamped into `[default_min, default_max]`.
    pub fn narrow(self, value: f64) -> f64 {
        dispatch!(self, narrow, value)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScalarType::from_name(s).ok_or_else(|| crate::Error::InvalidParameter {
            name: "scalar_type",
            value: s.to_string(),
            reason: "unknown scalar type".into(),
        })
    }
}
