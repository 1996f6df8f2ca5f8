use thiserror::Error;

use crate::spec::WindowType;

/// Problems registering an acceptance limit. None of these abort an
/// analysis: the offending entry is dropped and the rest of the set is kept.
#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    #[error("unparsable {side} limit {text:?} for {window}/{standard_type}")]
    UnparsableLimit {
        window: WindowType,
        standard_type: String,
        side: &'static str,
        text: String,
    },

    #[error("lower limit {lower} exceeds upper limit {upper} for {window}/{standard_type}")]
    InvertedLimits {
        window: WindowType,
        standard_type: String,
        lower: f64,
        upper: f64,
    },

    #[error("unknown window type {0:?}")]
    UnknownWindowType(String),

    #[error("empty standard type key")]
    EmptyKey,
}

/// Unexpected failure while judging a single record. The batch runner turns
/// this into a Fail result tagged `evaluation-error`.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("row {row}: column {column:?} is bound but the row has no cell for it")]
    MissingCell { row: usize, column: String },

    #[error("row {row}: chromaticity coordinate in {column:?} is not finite")]
    NonFiniteCoordinate { row: usize, column: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("match threshold must be positive, got {0}")]
    InvalidThreshold(i32),

    #[error("tolerance {name} must be finite and non-negative, got {value}")]
    InvalidTolerance { name: &'static str, value: f64 },
}

/// Type alias for registry operations.
pub type SpecResult<T> = std::result::Result<T, SpecError>;
