//! Residual evaluation at candidate positions.
//!
//! For a proposed position the kernel computes how much of A is currently
//! unexplained there: A\[r,c\] minus the factor product restricted to the
//! stored pattern. Both row chains are merge-walked simultaneously; equal
//! columns contribute a product term, the lagging side advances otherwise.
//! Since the candidate itself is absent from the pattern, the walk only ever
//! accumulates strictly sub-diagonal terms and no correction is needed.
//!
//! Candidate-parallel, read-only on the factor.

use dynfact_core::{CsrMatrix, LinkedCsr, END};
use rayon::prelude::*;

use crate::candidates::CandidateSet;

/// Incomplete-Cholesky residuals: val ← A\[r,c\] − Σₖ L\[r,k\]·L\[c,k\].
pub fn evaluate_residuals(a: &CsrMatrix, l: &LinkedCsr, cands: &mut CandidateSet) {
    eval(a, l, l, cands, false);
}

/// ILU residuals for candidates in the L triangle: uses L's row and Uᵀ's.
pub fn evaluate_residuals_lu_lower(
    a: &CsrMatrix,
    l: &LinkedCsr,
    ut: &LinkedCsr,
    cands: &mut CandidateSet,
) {
    eval(a, l, ut, cands, false);
}

/// ILU residuals for candidates in the Uᵀ store.
///
/// A Uᵀ candidate (i, k) stands for U\[k,i\]; the walk pairs L's row k with
/// Uᵀ's row i and the A lookup is transposed accordingly.
pub fn evaluate_residuals_lu_upper(
    a: &CsrMatrix,
    l: &LinkedCsr,
    ut: &LinkedCsr,
    cands: &mut CandidateSet,
) {
    eval(a, l, ut, cands, true);
}

fn eval(
    a: &CsrMatrix,
    rows: &LinkedCsr,
    cols: &LinkedCsr,
    cands: &mut CandidateSet,
    transposed: bool,
) {
    cands.entries.par_iter_mut().for_each(|e| {
        let (r, c) = if transposed {
            (e.col, e.row)
        } else {
            (e.row, e.col)
        };
        let a_e = a.get(r, c);

        let mut i = rows.head[r];
        let mut j = cols.head[c];
        let mut sum = 0.0;
        while i != END && j != END {
            let ci = rows.col[i];
            let cj = cols.col[j];
            if ci == cj {
                sum += rows.val[i] * cols.val[j];
                i = rows.next[i];
                j = cols.next[j];
            } else if ci < cj {
                i = rows.next[i];
            } else {
                j = cols.next[j];
            }
        }
        e.val = a_e - sum;
    });
}
