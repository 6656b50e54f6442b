//! Error types for dynfact-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),

    #[error("missing diagonal entry at row {0}")]
    MissingDiagonal(usize),

    #[error("capacity exhausted: {needed} slot(s) needed, {available} free")]
    CapacityExhausted { needed: usize, available: usize },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
