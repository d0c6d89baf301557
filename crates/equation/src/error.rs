//! Error types for equation parsing and evaluation

use thiserror::Error;

/// Why an equation could not be evaluated.
///
/// Domain edge cases (division by zero, `sqrt` of a negative number, `asin`
/// out of range) are not errors; they produce sentinel values instead.
#[derive(Error, Debug)]
pub enum EquationError {
    #[error("unexpected character '{found}' at offset {position}")]
    Lexical { position: usize, found: char },

    #[error("expected {expected} at offset {position}, found {found}")]
    Syntax {
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("unknown identifier '{name}' at offset {position}")]
    UnknownIdentifier { position: usize, name: String },

    #[error("{function}: expected {expected} argument(s), got {found}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("{function}: argument {argument} must be a {expected}")]
    Type {
        function: &'static str,
        argument: usize,
        expected: &'static str,
    },

    #[error("{function}: band {band} out of range for {bands} band(s)")]
    BandOutOfRange {
        function: &'static str,
        band: usize,
        bands: usize,
    },

    #[error("no input source connected at index {0}")]
    MissingSource(usize),

    #[error("input source {index} failed")]
    SourceFailed {
        index: usize,
        #[source]
        source: bandcalc_core::Error,
    },

    #[error("input source {index} produced no tile")]
    NoTile { index: usize },

    #[error("no input sources connected")]
    NoInputs,

    #[error("evaluation stack is empty")]
    EmptyStack,

    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error(transparent)]
    Raster(#[from] bandcalc_core::Error),
}

/// Result type alias for equation operations
pub type Result<T> = std::result::Result<T, EquationError>;
