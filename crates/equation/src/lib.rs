//! # bandcalc equation engine
//!
//! Parses a band-algebra equation and evaluates it tile by tile over a set
//! of connected raster inputs.
//!
//! Parsing and evaluation are fused: a recursive-descent parser evaluates
//! each production as it recognises it and keeps intermediate results on an
//! operand stack. Operands are scalars or owned multi-band tiles; raster
//! operands are combined pixel by pixel with null-aware band broadcasting.
//!
//! ```ignore
//! use bandcalc_equation::EquationCombiner;
//!
//! let mut engine = EquationCombiner::new("clamp(im[0] * 0.0001, 0, 1)");
//! engine.connect(reflectance);
//! let tile = engine.get_tile(&rect, 0)?;
//! ```
//!
//! Supported syntax: numbers, `pi`, `im[k]`, parentheses, unary `-` and
//! `~`, binary `+ - * / ^ %`, `& | xor`, comparisons, and the functions
//! `conv`, `blurr`, `shift`, `band`, `clamp`, `min`, `max`, `assign_band`
//! plus the usual unary math functions. All multiplicative, bitwise and
//! comparison operators share one precedence level.

pub mod broadcast;
pub mod cast;
pub mod context;
pub mod engine;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod ops;
pub mod params;
pub mod parser;
pub mod value;

pub use cast::TileCaster;
pub use context::EvalContext;
pub use engine::{evaluate, EquationCombiner};
pub use error::{EquationError, Result};
pub use lexer::{Function, Lexer, Token, TokenKind};
pub use ops::{BinaryOp, UnaryOp};
pub use params::{EquationParams, Keywordlist, Property};
pub use parser::{evaluate_value, Parser};
pub use value::Value;
