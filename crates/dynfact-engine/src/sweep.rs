//! Asynchronous fixed-point value sweeps.
//!
//! One sweep recomputes every live entry from the current values of its two
//! row chains, in parallel over slots. Each slot is written by exactly one
//! task; reads of other slots may observe values from before or after their
//! update within the same pass. The iteration is a fixed point of the
//! factorization equations, so stale reads cost convergence rate, never
//! correctness: callers just run more sweeps.
//!
//! The merge-walk tracks the product term of its final matched column and
//! the last slot visited on the column-chain side. Subtracting that final
//! term restricts the accumulated sum to strictly sub-diagonal columns, and
//! the tracked slot is the column row's trailing entry, its diagonal, which
//! serves as the division pivot.

use dynfact_core::{CsrMatrix, LinkedCsr, END, FREE};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::parallel::SharedVals;

/// Division pivots below this magnitude abort an ILU sweep.
const PIVOT_FLOOR: f64 = 1e-30;

struct Merge {
    /// Product sum over all matched columns.
    sum: f64,
    /// Product term of the final matched column (0.0 if the walk ended on a
    /// mismatch).
    last: f64,
    /// Last slot visited on the column-chain side.
    tail: usize,
}

#[allow(clippy::too_many_arguments)]
#[inline]
fn merge_dot(
    mut i: usize,
    next_i: &[usize],
    col_i: &[usize],
    val_i: SharedVals<'_>,
    mut j: usize,
    next_j: &[usize],
    col_j: &[usize],
    val_j: SharedVals<'_>,
) -> Merge {
    let mut sum = 0.0;
    let mut last = 0.0;
    let mut tail = j;
    while i != END && j != END {
        last = 0.0;
        tail = j;
        let ci = col_i[i];
        let cj = col_j[j];
        if ci == cj {
            last = val_i.get(i) * val_j.get(j);
            sum += last;
            i = next_i[i];
            j = next_j[j];
        } else if ci < cj {
            i = next_i[i];
        } else {
            j = next_j[j];
        }
    }
    Merge { sum, last, tail }
}

/// One incomplete-Cholesky sweep: update every live entry of L in place.
///
/// Diagonal entries become `sqrt(A[r,r] − Σ L[r,k]²)`, off-diagonals
/// `(A[r,c] − Σ L[r,k]·L[c,k]) / L[c,c]`, sums over stored k < c.
///
/// # Errors
///
/// [`Error::NonPositiveDiagonal`] when a diagonal update would take the
/// square root of a non-positive value. The entry keeps its previous value
/// and the pass completes; the error reports one offending row so the
/// driver can retry with more sweeps or give up.
pub fn sweep(a: &CsrMatrix, l: &mut LinkedCsr) -> Result<()> {
    let vals = SharedVals::new(&mut l.val);
    let head = &l.head;
    let next = &l.next;
    let col = &l.col;
    let rowidx = &l.rowidx;

    let err = (1..l.cap)
        .into_par_iter()
        .filter(|&e| next[e] != FREE)
        .fold(
            || None,
            |acc: Option<Error>, e| {
                let r = rowidx[e];
                let c = col[e];
                let a_e = a.get(r, c);
                let m = merge_dot(
                    head[r], next, col, vals, head[c], next, col, vals,
                );
                let sum = m.sum - m.last;
                if r == c {
                    let d = a_e - sum;
                    if d <= 0.0 {
                        return acc.or(Some(Error::NonPositiveDiagonal { row: r, value: d }));
                    }
                    vals.set(e, d.sqrt());
                } else {
                    vals.set(e, (a_e - sum) / vals.get(m.tail));
                }
                acc
            },
        )
        .reduce(|| None, |x, y| x.or(y));

    err.map_or(Ok(()), Err)
}

/// One ILU sweep over the coupled L / Uᵀ pair.
///
/// Runs the Uᵀ phase first (no divisions; L's unit diagonal makes the final
/// matched term the entry's own stale value), then the L phase, which
/// divides by U's freshly updated diagonals. L's diagonal is pinned at 1.
///
/// # Errors
///
/// [`Error::ZeroPivot`] when a division pivot falls below 1e-30 in
/// magnitude; the entry keeps its previous value and the pass completes.
pub fn sweep_lu(a: &CsrMatrix, l: &mut LinkedCsr, ut: &mut LinkedCsr) -> Result<()> {
    // Uᵀ phase: u[k,i] ← A[k,i] − Σ_{m<k} l[k,m]·u[m,i].
    {
        let uvals = SharedVals::new(&mut ut.val);
        let lvals = SharedVals::new(&mut l.val);
        let (lhead, lnext, lcol) = (&l.head, &l.next, &l.col);
        let (uhead, unext, ucol, urow) = (&ut.head, &ut.next, &ut.col, &ut.rowidx);

        (1..ut.cap)
            .into_par_iter()
            .filter(|&e| unext[e] != FREE)
            .for_each(|e| {
                let i = urow[e];
                let k = ucol[e];
                let a_e = a.get(k, i);
                let m = merge_dot(
                    lhead[k], lnext, lcol, lvals, uhead[i], unext, ucol, uvals,
                );
                uvals.set(e, a_e - (m.sum - m.last));
            });
    }

    // L phase: l[r,c] ← (A[r,c] − Σ_{k<c} l[r,k]·u[k,c]) / u[c,c].
    let lvals = SharedVals::new(&mut l.val);
    let uvals = SharedVals::new(&mut ut.val);
    let (lhead, lnext, lcol, lrow) = (&l.head, &l.next, &l.col, &l.rowidx);
    let (uhead, unext, ucol) = (&ut.head, &ut.next, &ut.col);

    let err = (1..l.cap)
        .into_par_iter()
        .filter(|&e| lnext[e] != FREE)
        .fold(
            || None,
            |acc: Option<Error>, e| {
                let r = lrow[e];
                let c = lcol[e];
                if r == c {
                    lvals.set(e, 1.0);
                    return acc;
                }
                let a_e = a.get(r, c);
                let m = merge_dot(
                    lhead[r], lnext, lcol, lvals, uhead[c], unext, ucol, uvals,
                );
                let piv = uvals.get(m.tail);
                if piv.abs() < PIVOT_FLOOR {
                    return acc.or(Some(Error::ZeroPivot { row: c }));
                }
                lvals.set(e, (a_e - (m.sum - m.last)) / piv);
                acc
            },
        )
        .reduce(|| None, |x, y| x.or(y));

    err.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynfact_core::InitialPattern;

    #[test]
    fn identity_is_a_fixed_point() {
        let t: Vec<_> = (0..4).map(|i| (i, i, 1.0)).collect();
        let a = CsrMatrix::from_triplets(4, &t).unwrap();
        let mut l = LinkedCsr::from_csr(&a, 8, InitialPattern::Diagonal).unwrap();
        sweep(&a, &mut l).unwrap();
        for i in 0..4 {
            assert_eq!(l.get(i, i), 1.0);
        }
    }

    #[test]
    fn two_by_two_spd_reaches_exact_cholesky() {
        // A = [[4, 1], [1, 3]]: L = [[2, 0], [0.5, sqrt(2.75)]].
        let a = CsrMatrix::from_triplets(2, &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)])
            .unwrap();
        let mut l = LinkedCsr::from_csr(&a, 8, InitialPattern::FullTriangle).unwrap();
        // Seed the diagonals at their Cholesky values.
        let d0 = l.find(0, 0).unwrap();
        let d1 = l.find(1, 1).unwrap();
        l.val[d0] = 2.0;
        l.val[d1] = 3.0_f64.sqrt();
        let s10 = l.find(1, 0).unwrap();
        l.val[s10] = 0.0;

        sweep(&a, &mut l).unwrap();
        assert!((l.get(1, 0) - 0.5).abs() < 1e-15);
        sweep(&a, &mut l).unwrap();
        assert!((l.get(1, 0) - 0.5).abs() < 1e-15);
        assert!((l.get(1, 1) - 2.75_f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn sweeps_converge_on_tridiagonal_pattern() {
        let n = 6;
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 4.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
                t.push((i - 1, i, -1.0));
            }
        }
        let a = CsrMatrix::from_triplets(n, &t).unwrap();
        let mut l = LinkedCsr::from_csr(&a, 32, InitialPattern::FullTriangle).unwrap();
        for _ in 0..30 {
            sweep(&a, &mut l).unwrap();
        }
        // The tridiagonal pattern admits the exact factor: check L·Lᵀ = A.
        for i in 0..n {
            for j in 0..=i {
                let mut dot = 0.0;
                for k in 0..n {
                    dot += l.get(i, k) * l.get(j, k);
                }
                assert!(
                    (dot - a.get(i, j)).abs() < 1e-12,
                    "L·Lᵀ mismatch at ({}, {}): {} vs {}",
                    i,
                    j,
                    dot,
                    a.get(i, j)
                );
            }
        }
    }

    #[test]
    fn non_positive_diagonal_is_reported_and_skipped() {
        // A[1,1] far too small for the stored coupling: the diagonal update
        // argument goes negative once L[1,0] is in place.
        let a = CsrMatrix::from_triplets(
            2,
            &[(0, 0, 1.0), (0, 1, 4.0), (1, 0, 4.0), (1, 1, 1.0)],
        )
        .unwrap();
        let mut l = LinkedCsr::from_csr(&a, 8, InitialPattern::FullTriangle).unwrap();
        for _ in 0..4 {
            let _ = sweep(&a, &mut l);
        }
        let err = sweep(&a, &mut l);
        assert!(matches!(err, Err(Error::NonPositiveDiagonal { row: 1, .. })));
        // The offending diagonal kept its previous (finite) value.
        assert!(l.get(1, 1).is_finite());
    }

    #[test]
    fn ilu_sweep_factors_a_tridiagonal_exactly() {
        let n = 5;
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 4.0));
            if i > 0 {
                t.push((i, i - 1, -2.0));
                t.push((i - 1, i, -1.0));
            }
        }
        let a = CsrMatrix::from_triplets(n, &t).unwrap();
        let mut l = LinkedCsr::from_csr(&a, 32, InitialPattern::FullTriangle).unwrap();
        let mut ut =
            LinkedCsr::from_csr_upper_transposed(&a, 32, InitialPattern::FullTriangle).unwrap();
        for i in 0..n {
            let d = l.find(i, i).unwrap();
            l.val[d] = 1.0;
        }
        for _ in 0..30 {
            sweep_lu(&a, &mut l, &mut ut).unwrap();
        }
        // Tridiagonal pattern again admits the exact LU: check L·U = A,
        // reading U[k,j] from the transposed store.
        for i in 0..n {
            for j in 0..n {
                let mut dot = 0.0;
                for k in 0..n {
                    dot += l.get(i, k) * ut.get(j, k);
                }
                assert!(
                    (dot - a.get(i, j)).abs() < 1e-12,
                    "L·U mismatch at ({}, {})",
                    i,
                    j
                );
            }
        }
    }
}
