//! # Dynfact
//!
//! Dynamic incomplete Cholesky / ILU factorization for sparse matrices.
//!
//! Dynfact computes bounded-size approximate triangular factors whose
//! sparsity pattern adapts *during* the factorization: every round trades
//! the weakest stored entries for the fill-in positions with the largest
//! residuals, then re-converges the values with asynchronous fixed-point
//! sweeps. The result is a factor of fixed nonzero budget with markedly
//! better quality than a static-pattern factorization of the same size.
//!
//! ## Quick Start
//!
//! ```rust
//! use dynfact::prelude::*;
//!
//! // SPD tridiagonal test matrix.
//! let n = 8;
//! let mut t = Vec::new();
//! for i in 0..n {
//!     t.push((i, i, 4.0));
//!     if i > 0 {
//!         t.push((i, i - 1, -1.0));
//!         t.push((i - 1, i, -1.0));
//!     }
//! }
//! let a = CsrMatrix::from_triplets(n, &t).unwrap();
//!
//! let mut factor = IcFactor::build(&a, 32, InitialPattern::FullTriangle).unwrap();
//! factor.round(&a, 0, 8).unwrap();
//! assert!(factor.residual_norm(&a) < 1e-8);
//! ```
//!
//! Downstream triangular solves walk the factor rows through
//! [`LinkedCsr::row_entries`]; entries arrive in ascending column order with
//! the diagonal last.

// Re-export the member crates.
pub use dynfact_core as core;
pub use dynfact_engine as engine;

// ============================================================================
// Convenient re-exports from dynfact_core
// ============================================================================

pub use dynfact_core::{
    // Stores
    CsrMatrix,
    // Errors
    Error as CoreError,
    InitialPattern,
    LinkedCsr,
    // Selection
    SelectMode,
    select,
    select_by,
};

// ============================================================================
// Convenient re-exports from dynfact_engine
// ============================================================================

pub use dynfact_engine::{
    Candidate,
    CandidateSet,
    // Errors
    Error as EngineError,
    FreedSlots,
    // Factor drivers
    IcFactor,
    IluFactor,
    RoundReport,
    RowLocks,
    // Kernels
    discover_candidates,
    evaluate_residuals,
    insert_candidates,
    remove_below,
    set_threshold,
    sweep,
    sweep_lu,
};

/// Prelude module containing commonly used types.
///
/// ```rust
/// use dynfact::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CandidateSet, CsrMatrix, IcFactor, IluFactor, InitialPattern, LinkedCsr, RoundReport,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_covers_the_basic_flow() {
        let a = CsrMatrix::from_triplets(3, &[(0, 0, 2.0), (1, 1, 2.0), (2, 2, 2.0)]).unwrap();
        let mut factor = IcFactor::build(&a, 8, InitialPattern::Diagonal).unwrap();
        factor.sweep(&a).unwrap();
        assert_eq!(factor.residual_norm(&a), 0.0);
    }

    #[test]
    fn kernel_functions_are_reachable_at_the_root() {
        let a = CsrMatrix::from_triplets(2, &[(0, 0, 2.0), (1, 1, 2.0)]).unwrap();
        let l = LinkedCsr::from_csr(&a, 4, InitialPattern::Diagonal).unwrap();
        assert!(crate::discover_candidates(&l).is_empty());
    }
}
