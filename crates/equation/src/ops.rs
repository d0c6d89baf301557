//! Per-sample operator library

/// Near-zero threshold for division and modulo (single-precision epsilon)
pub const DIVISION_EPSILON: f64 = f32::EPSILON as f64;

/// Value returned when dividing by a near-zero number
pub const DIVISION_SENTINEL: f64 = 1.0 / DIVISION_EPSILON;

/// Two-operand operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    And,
    Or,
    Xor,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Min,
    Max,
}

impl BinaryOp {
    /// Apply to one pair of samples
    #[inline]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => {
                if b.abs() <= DIVISION_EPSILON {
                    DIVISION_SENTINEL
                } else {
                    a / b
                }
            }
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Mod => {
                if b.abs() <= DIVISION_EPSILON {
                    DIVISION_SENTINEL
                } else {
                    a % b
                }
            }
            BinaryOp::And => f64::from(a as u32 & b as u32),
            BinaryOp::Or => f64::from(a as u32 | b as u32),
            BinaryOp::Xor => f64::from(a as u32 ^ b as u32),
            BinaryOp::Equal => truth(a == b),
            BinaryOp::NotEqual => truth(a != b),
            BinaryOp::Greater => truth(a > b),
            BinaryOp::GreaterEqual => truth(a >= b),
            BinaryOp::Less => truth(a < b),
            BinaryOp::LessEqual => truth(a <= b),
            BinaryOp::Min => a.min(b),
            BinaryOp::Max => a.max(b),
        }
    }

    /// Operator text as written in an equation
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "xor",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
        }
    }
}

#[inline]
fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// One-operand operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    /// One's complement of the low 8 bits
    OnesComplement,
    Abs,
    Sin,
    SinDeg,
    Asin,
    AsinDeg,
    Cos,
    CosDeg,
    Acos,
    AcosDeg,
    Tan,
    TanDeg,
    Atan,
    AtanDeg,
    Log,
    Log10,
    Sqrt,
    Exp,
}

impl UnaryOp {
    /// Apply to one sample
    #[inline]
    pub fn apply(self, v: f64) -> f64 {
        match self {
            UnaryOp::Neg => -v,
            UnaryOp::OnesComplement => f64::from(!(v as u8)),
            UnaryOp::Abs => v.abs(),
            UnaryOp::Sin => v.sin(),
            UnaryOp::SinDeg => v.to_radians().sin(),
            UnaryOp::Asin => v.clamp(-1.0, 1.0).asin(),
            UnaryOp::AsinDeg => v.clamp(-1.0, 1.0).asin().to_degrees(),
            UnaryOp::Cos => v.cos(),
            UnaryOp::CosDeg => v.to_radians().cos(),
            UnaryOp::Acos => v.clamp(-1.0, 1.0).acos(),
            UnaryOp::AcosDeg => v.clamp(-1.0, 1.0).acos().to_degrees(),
            UnaryOp::Tan => v.tan(),
            UnaryOp::TanDeg => v.to_radians().tan(),
            UnaryOp::Atan => v.atan(),
            UnaryOp::AtanDeg => v.atan().to_degrees(),
            UnaryOp::Log => v.ln(),
            UnaryOp::Log10 => v.log10(),
            UnaryOp::Sqrt => {
                if v < 0.0 {
                    -1.0
                } else {
                    v.sqrt()
                }
            }
            UnaryOp::Exp => v.exp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_division_by_near_zero() {
        assert_eq!(BinaryOp::Div.apply(1.0, 0.0), DIVISION_SENTINEL);
        assert_eq!(BinaryOp::Mod.apply(5.0, 1e-9), DIVISION_SENTINEL);
        assert!(DIVISION_SENTINEL.is_finite());
        assert_eq!(BinaryOp::Div.apply(6.0, 3.0), 2.0);
        assert_eq!(BinaryOp::Mod.apply(7.5, 2.0), 1.5);
        assert_eq!(BinaryOp::Mod.apply(-7.0, 3.0), -1.0);
    }

    #[test]
    fn test_comparisons_are_zero_or_one() {
        assert_eq!(BinaryOp::Greater.apply(2.0, 1.0), 1.0);
        assert_eq!(BinaryOp::Greater.apply(1.0, 2.0), 0.0);
        assert_eq!(BinaryOp::LessEqual.apply(2.0, 2.0), 1.0);
        assert_eq!(BinaryOp::NotEqual.apply(2.0, 2.0), 0.0);
        assert_eq!(BinaryOp::Equal.apply(2.0, 2.0), 1.0);
    }

    #[test]
    fn test_bitwise_truncates() {
        assert_eq!(BinaryOp::And.apply(6.7, 3.2), 2.0);
        assert_eq!(BinaryOp::Or.apply(4.0, 1.9), 5.0);
        assert_eq!(BinaryOp::Xor.apply(5.0, 1.0), 4.0);
        assert_eq!(UnaryOp::OnesComplement.apply(0.0), 255.0);
        assert_eq!(UnaryOp::OnesComplement.apply(255.0), 0.0);
        assert_eq!(UnaryOp::OnesComplement.apply(15.0), 240.0);
    }

    #[test]
    fn test_domain_sentinels() {
        assert_eq!(UnaryOp::Sqrt.apply(-4.0), -1.0);
        assert_eq!(UnaryOp::Sqrt.apply(9.0), 3.0);
        assert_eq!(UnaryOp::Asin.apply(2.0), 1.0f64.asin());
        assert_relative_eq!(UnaryOp::AcosDeg.apply(-5.0), 180.0, epsilon = 1e-12);
        assert_relative_eq!(UnaryOp::SinDeg.apply(90.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(UnaryOp::AtanDeg.apply(1.0), 45.0, epsilon = 1e-12);
    }
}
