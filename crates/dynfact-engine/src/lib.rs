//! Pattern-adaptive incomplete factorization kernels.
//!
//! Classical incomplete factorizations fix their sparsity pattern up front
//! (level-based ILU(k)) or prune it once (threshold ILUT). This crate keeps
//! the pattern *live*: each round discovers fill-in candidates outside the
//! current pattern, scores them by residual, swaps them against the weakest
//! current entries under a fixed nonzero budget, and re-converges the values
//! with asynchronous fixed-point sweeps.
//!
//! # Kernels
//!
//! One round chains five data-parallel kernels over the linked factor store:
//!
//! - [`discover_candidates`] - symbolic fill-in positions outside the pattern
//! - [`evaluate_residuals`] - |A − L·Lᵀ| at the candidate positions
//! - [`set_threshold`] / [`remove_below`] - drop the smallest entries,
//!   recycling their slots
//! - [`insert_candidates`] - graft the strongest candidates under row locks
//! - [`sweep`] - one fixed-point pass over all current values
//!
//! [`IcFactor::round`] runs the whole chain; the caller decides the swap
//! size and when to stop. [`IluFactor`] applies the same machinery to a
//! coupled L / Uᵀ pair for nonsymmetric systems.
//!
//! # Example
//!
//! ```rust
//! use dynfact_core::{CsrMatrix, InitialPattern};
//! use dynfact_engine::IcFactor;
//!
//! // 1D Laplacian-like SPD matrix.
//! let n = 16;
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
//! // Factor on A's own lower triangle within a 64-slot budget; rounds
//! // would swap pattern positions if the residual ranked any candidate
//! // above a current entry.
//! let mut factor = IcFactor::build(&a, 64, InitialPattern::FullTriangle).unwrap();
//! for _ in 0..10 {
//!     factor.sweep(&a).unwrap();
//! }
//! assert!(factor.residual_norm(&a) < 1e-8);
//!
//! let report = factor.round(&a, 1, 2).unwrap();
//! assert_eq!(report.inserted, report.removed);
//! ```
//!
//! # Concurrency
//!
//! Kernels run on rayon's global pool (`RAYON_NUM_THREADS` configures the
//! width) with a barrier between kernels. The sweep tolerates stale value
//! reads (repeated application converges regardless of read order), so
//! results are deterministic in pattern but not bit-identical across thread
//! counts.

pub mod candidates;
pub mod error;
pub mod factor;
pub mod insert;
pub mod parallel;
pub mod residuals;
pub mod sweep;
pub mod threshold;

pub use candidates::{discover_candidates, Candidate, CandidateSet};
pub use error::{Error, Result};
pub use factor::{IcFactor, IluFactor, RoundReport};
pub use insert::insert_candidates;
pub use parallel::RowLocks;
pub use residuals::{
    evaluate_residuals, evaluate_residuals_lu_lower, evaluate_residuals_lu_upper,
};
pub use sweep::{sweep, sweep_lu};
pub use threshold::{remove_below, set_threshold, FreedSlots};
