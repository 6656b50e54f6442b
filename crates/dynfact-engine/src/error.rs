//! Error types for dynfact-engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Fewer candidates than the requested swap size; the round is skipped.
    #[error("insufficient candidates: {requested} requested, {available} available")]
    InsufficientCandidates { requested: usize, available: usize },

    /// Selection index does not fit the live entry count.
    #[error("selection index {k} out of range for {len} live entries")]
    SelectorOutOfRange { k: usize, len: usize },

    /// The Cholesky diagonal update hit a non-positive square root argument.
    #[error("non-positive diagonal at row {row}: {value}")]
    NonPositiveDiagonal { row: usize, value: f64 },

    /// An ILU division pivot vanished.
    #[error("zero pivot at row {row}")]
    ZeroPivot { row: usize },

    #[error(transparent)]
    Core(#[from] dynfact_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
