//! Factor drivers: owned factor state plus one-round orchestration.
//!
//! [`IcFactor`] bundles the lower-triangular store with its row-lock bank
//! and exposes every kernel as a method, so a caller that does not need
//! custom scheduling can run rounds directly:
//!
//! ```text
//! discover -> evaluate -> threshold -> remove -> insert -> sweep*
//! ```
//!
//! [`IluFactor`] keeps the coupled L / Uᵀ pair and applies the same swap
//! machinery to each triangle. How many entries to swap per round and when
//! to stop stays with the caller.

use dynfact_core::{CsrMatrix, InitialPattern, LinkedCsr, END};
use rayon::prelude::*;

use crate::candidates::{discover_candidates, CandidateSet};
use crate::error::Result;
use crate::insert::insert_candidates;
use crate::parallel::RowLocks;
use crate::residuals::{
    evaluate_residuals, evaluate_residuals_lu_lower, evaluate_residuals_lu_upper,
};
use crate::sweep::{sweep, sweep_lu};
use crate::threshold::{remove_below, set_threshold, FreedSlots};

/// What one adaptive round did.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundReport {
    /// Candidates discovered outside the pattern.
    pub candidates: usize,
    /// Removal cutoff used, 0.0 when the swap was skipped.
    pub threshold: f64,
    /// Entries removed.
    pub removed: usize,
    /// Candidates grafted.
    pub inserted: usize,
    /// True when the pattern swap was skipped (zero swap size or too few
    /// candidates); sweeps still ran.
    pub swap_skipped: bool,
}

/// Adaptive incomplete Cholesky factor L with L·Lᵀ ≈ A.
#[derive(Debug)]
pub struct IcFactor {
    l: LinkedCsr,
    locks: RowLocks,
}

impl IcFactor {
    /// Seed the factor from A's diagonal or lower triangle.
    ///
    /// `capacity` is the slot budget (one slot is reserved) and bounds the
    /// factor's nonzero count for its whole life.
    pub fn build(a: &CsrMatrix, capacity: usize, pattern: InitialPattern) -> Result<Self> {
        let l = LinkedCsr::from_csr(a, capacity, pattern)?;
        Ok(Self {
            locks: RowLocks::new(a.n()),
            l,
        })
    }

    /// The factor store.
    pub fn matrix(&self) -> &LinkedCsr {
        &self.l
    }

    /// Mutable access for callers managing the store directly.
    pub fn matrix_mut(&mut self) -> &mut LinkedCsr {
        &mut self.l
    }

    /// Enumerate fill-in candidates outside the current pattern.
    pub fn discover_candidates(&self) -> CandidateSet {
        discover_candidates(&self.l)
    }

    /// Evaluate residuals at the candidate positions.
    pub fn evaluate_residuals(&self, a: &CsrMatrix, cands: &mut CandidateSet) {
        evaluate_residuals(a, &self.l, cands);
    }

    /// Removal cutoff that drops the `num_rm` smallest entries.
    pub fn set_threshold(&self, num_rm: usize) -> Result<f64> {
        set_threshold(&self.l, num_rm)
    }

    /// Drop off-diagonal entries below the cutoff.
    pub fn remove_below(&mut self, threshold: f64) -> FreedSlots {
        remove_below(&mut self.l, threshold)
    }

    /// Graft the strongest candidates into the freed slots.
    pub fn insert_candidates(
        &mut self,
        cands: &mut CandidateSet,
        freed: &FreedSlots,
        num_rm: usize,
    ) -> Result<usize> {
        insert_candidates(&mut self.l, &self.locks, cands, freed, num_rm)
    }

    /// One fixed-point value sweep.
    pub fn sweep(&mut self, a: &CsrMatrix) -> Result<()> {
        sweep(a, &mut self.l)
    }

    /// Run one adaptive round: swap `num_rm` entries, then `sweeps` sweeps.
    ///
    /// The swap is skipped (and reported as such) when `num_rm` is zero,
    /// when fewer than `num_rm` candidates exist, or when the factor has no
    /// `num_rm + 1` live entries to choose a cutoff from. Sweep errors are
    /// tolerated while further sweeps remain, since later sweeps repair
    /// transient states; only the final sweep's verdict is surfaced.
    pub fn round(&mut self, a: &CsrMatrix, num_rm: usize, sweeps: usize) -> Result<RoundReport> {
        let mut report = RoundReport {
            swap_skipped: true,
            ..RoundReport::default()
        };

        if num_rm > 0 {
            let mut cands = self.discover_candidates();
            report.candidates = cands.len();
            if num_rm <= cands.len() && num_rm < self.l.nnz {
                self.evaluate_residuals(a, &mut cands);
                let threshold = self.set_threshold(num_rm)?;
                let freed = self.remove_below(threshold);
                let inserted = self.insert_candidates(&mut cands, &freed, freed.len())?;
                report.threshold = threshold;
                report.removed = freed.len();
                report.inserted = inserted;
                report.swap_skipped = false;
            } else {
                log::debug!(
                    "swap of {} skipped: {} candidates, {} live entries",
                    num_rm,
                    cands.len(),
                    self.l.nnz
                );
            }
        }

        let mut last = Ok(());
        for _ in 0..sweeps {
            last = self.sweep(a);
        }
        last.map(|_| report)
    }

    /// Frobenius norm of A − L·Lᵀ restricted to the factor's pattern.
    pub fn residual_norm(&self, a: &CsrMatrix) -> f64 {
        let l = &self.l;
        let sq: f64 = (1..l.cap)
            .into_par_iter()
            .filter(|&e| l.is_live(e))
            .map(|e| {
                let r = l.rowidx[e];
                let c = l.col[e];
                let res = a.get(r, c) - dot_rows(l, r, l, c);
                res * res
            })
            .sum();
        sq.sqrt()
    }
}

/// Adaptive incomplete LU pair: unit-diagonal L and U stored transposed,
/// with L·U ≈ A.
#[derive(Debug)]
pub struct IluFactor {
    l: LinkedCsr,
    ut: LinkedCsr,
    l_locks: RowLocks,
    ut_locks: RowLocks,
}

impl IluFactor {
    /// Seed both triangles from A; `capacity` is the slot budget of each.
    ///
    /// L takes A's strict lower values with its diagonal pinned at 1; Uᵀ
    /// takes the upper triangle, diagonal included.
    pub fn build(a: &CsrMatrix, capacity: usize, pattern: InitialPattern) -> Result<Self> {
        let mut l = LinkedCsr::from_csr(a, capacity, pattern)?;
        let ut = LinkedCsr::from_csr_upper_transposed(a, capacity, pattern)?;
        for i in 0..l.n {
            let mut s = l.head[i];
            while s != END {
                if l.col[s] == i {
                    l.val[s] = 1.0;
                }
                s = l.next[s];
            }
        }
        Ok(Self {
            l_locks: RowLocks::new(a.n()),
            ut_locks: RowLocks::new(a.n()),
            l,
            ut,
        })
    }

    /// The unit-diagonal lower factor.
    pub fn lower(&self) -> &LinkedCsr {
        &self.l
    }

    /// The upper factor, stored transposed (row i holds column i of U).
    pub fn upper_t(&self) -> &LinkedCsr {
        &self.ut
    }

    /// One coupled fixed-point sweep over both factors.
    pub fn sweep(&mut self, a: &CsrMatrix) -> Result<()> {
        sweep_lu(a, &mut self.l, &mut self.ut)
    }

    /// Run one adaptive round: swap `num_rm` entries in each triangle, then
    /// `sweeps` coupled sweeps. Reports (lower, upper) swap outcomes.
    pub fn round(
        &mut self,
        a: &CsrMatrix,
        num_rm: usize,
        sweeps: usize,
    ) -> Result<(RoundReport, RoundReport)> {
        let mut lower = RoundReport {
            swap_skipped: true,
            ..RoundReport::default()
        };
        let mut upper = lower;

        if num_rm > 0 {
            let mut cands = discover_candidates(&self.l);
            lower.candidates = cands.len();
            if num_rm <= cands.len() && num_rm < self.l.nnz {
                evaluate_residuals_lu_lower(a, &self.l, &self.ut, &mut cands);
                let threshold = set_threshold(&self.l, num_rm)?;
                let freed = remove_below(&mut self.l, threshold);
                lower.inserted =
                    insert_candidates(&mut self.l, &self.l_locks, &mut cands, &freed, freed.len())?;
                lower.threshold = threshold;
                lower.removed = freed.len();
                lower.swap_skipped = false;
            }

            let mut cands = discover_candidates(&self.ut);
            upper.candidates = cands.len();
            if num_rm <= cands.len() && num_rm < self.ut.nnz {
                evaluate_residuals_lu_upper(a, &self.l, &self.ut, &mut cands);
                let threshold = set_threshold(&self.ut, num_rm)?;
                let freed = remove_below(&mut self.ut, threshold);
                upper.inserted = insert_candidates(
                    &mut self.ut,
                    &self.ut_locks,
                    &mut cands,
                    &freed,
                    freed.len(),
                )?;
                upper.threshold = threshold;
                upper.removed = freed.len();
                upper.swap_skipped = false;
            }
        }

        let mut last = Ok(());
        for _ in 0..sweeps {
            last = self.sweep(a);
        }
        last.map(|_| (lower, upper))
    }

    /// Frobenius norm of A − L·U restricted to the stored pattern.
    ///
    /// L's pinned unit diagonal is not an approximation target; the
    /// diagonal equations are accounted through Uᵀ's entries.
    pub fn residual_norm(&self, a: &CsrMatrix) -> f64 {
        let (l, ut) = (&self.l, &self.ut);
        let lower: f64 = (1..l.cap)
            .into_par_iter()
            .filter(|&e| l.is_live(e) && l.rowidx[e] != l.col[e])
            .map(|e| {
                let r = l.rowidx[e];
                let c = l.col[e];
                let res = a.get(r, c) - dot_rows(l, r, ut, c);
                res * res
            })
            .sum();
        let upper: f64 = (1..ut.cap)
            .into_par_iter()
            .filter(|&e| ut.is_live(e))
            .map(|e| {
                let i = ut.rowidx[e];
                let k = ut.col[e];
                let res = a.get(k, i) - dot_rows(l, k, ut, i);
                res * res
            })
            .sum();
        (lower + upper).sqrt()
    }
}

/// Full merge-product of two row chains (no sub-diagonal correction).
fn dot_rows(rows: &LinkedCsr, r: usize, cols: &LinkedCsr, c: usize) -> f64 {
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
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiag(n: usize, diag: f64, off: f64) -> CsrMatrix {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, diag));
            if i > 0 {
                t.push((i, i - 1, off));
                t.push((i - 1, i, off));
            }
        }
        CsrMatrix::from_triplets(n, &t).unwrap()
    }

    #[test]
    fn round_on_identity_skips_and_converges() {
        let a = CsrMatrix::from_triplets(4, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0), (3, 3, 1.0)])
            .unwrap();
        let mut f = IcFactor::build(&a, 8, InitialPattern::Diagonal).unwrap();
        let report = f.round(&a, 2, 1).unwrap();
        assert!(report.swap_skipped);
        assert_eq!(report.candidates, 0);
        assert_eq!(f.residual_norm(&a), 0.0);
    }

    #[test]
    fn round_report_balances_removals_and_insertions() {
        // Arrow matrix: last row couples to everything, so the diagonal
        // seed discovers plenty of candidates.
        let n = 8;
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 8.0));
        }
        for j in 0..n - 1 {
            t.push((n - 1, j, 1.0));
            t.push((j, n - 1, 1.0));
        }
        let a = CsrMatrix::from_triplets(n, &t).unwrap();
        let mut f = IcFactor::build(&a, 64, InitialPattern::FullTriangle).unwrap();
        for _ in 0..3 {
            f.sweep(&a).unwrap();
        }
        let before = f.matrix().nnz;
        let report = f.round(&a, 2, 2).unwrap();
        f.matrix().validate().unwrap();
        if !report.swap_skipped {
            assert_eq!(report.removed, report.inserted);
        }
        assert_eq!(f.matrix().nnz, before);
    }

    #[test]
    fn sweeping_drives_down_the_pattern_residual() {
        let a = tridiag(12, 4.0, -1.0);
        let mut f = IcFactor::build(&a, 64, InitialPattern::FullTriangle).unwrap();
        let start = f.residual_norm(&a);
        for _ in 0..20 {
            f.sweep(&a).unwrap();
        }
        let end = f.residual_norm(&a);
        assert!(end < 1e-10, "pattern residual {} did not vanish", end);
        assert!(end < start);
    }

    #[test]
    fn ilu_round_trips_both_triangles() {
        let n = 8;
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 6.0));
        }
        for j in 0..n - 1 {
            t.push((n - 1, j, 1.5));
            t.push((j, n - 1, -1.0));
        }
        let a = CsrMatrix::from_triplets(n, &t).unwrap();
        let mut f = IluFactor::build(&a, 64, InitialPattern::FullTriangle).unwrap();
        for _ in 0..3 {
            f.sweep(&a).unwrap();
        }
        let (l_before, u_before) = (f.lower().nnz, f.upper_t().nnz);
        let (lower, upper) = f.round(&a, 1, 2).unwrap();
        f.lower().validate().unwrap();
        f.upper_t().validate().unwrap();
        if !lower.swap_skipped {
            assert_eq!(lower.removed, lower.inserted);
        }
        if !upper.swap_skipped {
            assert_eq!(upper.removed, upper.inserted);
        }
        assert_eq!(f.lower().nnz, l_before);
        assert_eq!(f.upper_t().nnz, u_before);
        // L's diagonal stays pinned.
        for i in 0..n {
            assert_eq!(f.lower().get(i, i), 1.0);
        }
    }

    #[test]
    fn ilu_residual_vanishes_on_closed_pattern() {
        let a = tridiag(8, 4.0, -1.0);
        let mut f = IluFactor::build(&a, 64, InitialPattern::FullTriangle).unwrap();
        for _ in 0..25 {
            f.sweep(&a).unwrap();
        }
        assert!(f.residual_norm(&a) < 1e-10);
    }
}
