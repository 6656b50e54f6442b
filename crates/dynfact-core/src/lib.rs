//! Sparse matrix stores for the dynamic incomplete factorization engine.
//!
//! This crate provides the data structures the factorization kernels run on:
//!
//! - [`CsrMatrix`] - immutable, validated CSR input matrices
//! - [`LinkedCsr`] - the factor store: a slot arena with per-row linked
//!   chains, supporting O(1) insertion/deletion at sorted positions and
//!   free-slot recycling
//! - [`select`]/[`select_by`] - order-statistics selection by magnitude,
//!   shared by threshold picking and candidate ranking
//!
//! The algorithms that mutate the factor live in `dynfact-engine`; this
//! crate deliberately knows nothing about parallelism.
//!
//! # Example: seeding a factor from a matrix
//!
//! ```rust
//! use dynfact_core::{CsrMatrix, InitialPattern, LinkedCsr};
//!
//! let a = CsrMatrix::from_triplets(
//!     3,
//!     &[
//!         (0, 0, 4.0),
//!         (1, 0, -1.0), (1, 1, 4.0),
//!         (0, 1, -1.0), (2, 2, 4.0),
//!     ],
//! )
//! .unwrap();
//!
//! let l = LinkedCsr::from_csr(&a, 16, InitialPattern::FullTriangle).unwrap();
//! assert_eq!(l.nnz, 4);
//! let row1: Vec<_> = l.row_entries(1).collect();
//! assert_eq!(row1, vec![(0, -1.0), (1, 4.0)]);
//! ```

pub mod csr;
pub mod error;
pub mod linked;
pub mod select;

pub use csr::CsrMatrix;
pub use error::{Error, Result};
pub use linked::{InitialPattern, LinkedCsr, RowIter, END, FREE};
pub use select::{select, select_by, SelectMode};
