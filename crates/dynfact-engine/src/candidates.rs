//! Fill-in candidate discovery.
//!
//! A position (r, c) with r > c outside the current pattern is worth
//! considering when some row carries nonzeros in both columns r and c: the
//! product of those two entries feeds the (r, c) update of the Gram product,
//! so the factorization is discarding mass there. Discovery enumerates, for
//! every row, all pairs of sub-diagonal entries and keeps the pairs whose
//! target position is not yet stored.
//!
//! The kernel is read-only and runs in two row-parallel passes: count per
//! enumerating row, exclusive-scan the counts into write offsets, then emit
//! into disjoint per-row output slices. The same target can be emitted from
//! different enumerating rows; the insertion protocol resolves duplicates.

use dynfact_core::{LinkedCsr, END};
use rayon::prelude::*;

/// One proposed fill-in position, strictly below the diagonal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Candidate {
    /// Target row (the larger index of the pair).
    pub row: usize,
    /// Target column.
    pub col: usize,
    /// Residual value, filled in by evaluation; 0.0 until then.
    pub val: f64,
}

/// Flat, unsorted set of proposed fill-in positions.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub entries: Vec<Candidate>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Enumerate fill-in candidates outside the current pattern of `m`.
///
/// Every emitted position (r, c) satisfies r > c and is absent from `m` at
/// the time of the call; positions may repeat across enumerating rows.
/// Intended to run between mutation kernels, on a quiescent store.
pub fn discover_candidates(m: &LinkedCsr) -> CandidateSet {
    // Pass A: how many candidates does each enumerating row produce?
    let counts: Vec<usize> = (0..m.n)
        .into_par_iter()
        .map(|r| {
            let mut count = 0usize;
            for_each_pair(m, r, |_, _| count += 1);
            count
        })
        .collect();

    let total: usize = counts.iter().sum();
    let mut entries = vec![Candidate::default(); total];

    // Pass B: re-enumerate into disjoint per-row slices. Carving the output
    // row by row is the exclusive scan of the counts, with the offsets
    // materialized as slice boundaries.
    let mut slices: Vec<&mut [Candidate]> = Vec::with_capacity(m.n);
    let mut rest: &mut [Candidate] = &mut entries;
    for r in 0..m.n {
        let tail = std::mem::take(&mut rest);
        let (head, tail) = tail.split_at_mut(counts[r]);
        slices.push(head);
        rest = tail;
    }

    slices.into_par_iter().enumerate().for_each(|(r, out)| {
        let mut k = 0usize;
        for_each_pair(m, r, |row, col| {
            out[k] = Candidate { row, col, val: 0.0 };
            k += 1;
        });
        debug_assert_eq!(k, out.len());
    });

    CandidateSet { entries }
}

/// Visit the missing targets produced by row r's sub-diagonal entry pairs.
///
/// For entries a, b of row r with col(b) < col(a) < r, the target is
/// (col(a), col(b)); it is reported when row col(a) lacks column col(b).
fn for_each_pair(m: &LinkedCsr, r: usize, mut emit: impl FnMut(usize, usize)) {
    let mut sa = m.head[r];
    while sa != END {
        let c1 = m.col[sa];
        if c1 == r {
            // The diagonal closes every row; nothing sub-diagonal follows.
            break;
        }
        let mut sb = m.head[r];
        while sb != sa {
            let c2 = m.col[sb];
            if !m.contains(c1, c2) {
                emit(c1, c2);
            }
            sb = m.next[sb];
        }
        sa = m.next[sa];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynfact_core::{CsrMatrix, InitialPattern};

    fn factor_from(triplets: &[(usize, usize, f64)], n: usize, cap: usize) -> LinkedCsr {
        let a = CsrMatrix::from_triplets(n, triplets).unwrap();
        LinkedCsr::from_csr(&a, cap, InitialPattern::FullTriangle).unwrap()
    }

    #[test]
    fn diagonal_pattern_yields_nothing() {
        let a = CsrMatrix::from_triplets(4, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0), (3, 3, 1.0)])
            .unwrap();
        let l = LinkedCsr::from_csr(&a, 8, InitialPattern::Diagonal).unwrap();
        assert!(discover_candidates(&l).is_empty());
    }

    #[test]
    fn arrow_row_proposes_pair_targets() {
        // Row 3 holds columns 0 and 1; (1, 0) is absent, so exactly that
        // position must be proposed.
        let l = factor_from(
            &[
                (0, 0, 2.0),
                (1, 1, 2.0),
                (2, 2, 2.0),
                (3, 0, 1.0),
                (3, 1, 1.0),
                (3, 3, 2.0),
            ],
            4,
            16,
        );
        let cands = discover_candidates(&l);
        assert_eq!(cands.len(), 1);
        assert_eq!((cands.entries[0].row, cands.entries[0].col), (1, 0));
    }

    #[test]
    fn present_targets_are_not_proposed() {
        // Same arrow, but (1, 0) already stored: nothing to propose.
        let l = factor_from(
            &[
                (0, 0, 2.0),
                (1, 0, 1.0),
                (1, 1, 2.0),
                (2, 2, 2.0),
                (3, 0, 1.0),
                (3, 1, 1.0),
                (3, 3, 2.0),
            ],
            4,
            16,
        );
        assert!(discover_candidates(&l).is_empty());
    }

    #[test]
    fn three_subdiagonal_entries_propose_all_pairs() {
        let l = factor_from(
            &[
                (0, 0, 2.0),
                (1, 1, 2.0),
                (2, 2, 2.0),
                (3, 3, 2.0),
                (4, 0, 1.0),
                (4, 1, 1.0),
                (4, 2, 1.0),
                (4, 4, 2.0),
            ],
            5,
            16,
        );
        let mut targets: Vec<(usize, usize)> = discover_candidates(&l)
            .entries
            .iter()
            .map(|c| (c.row, c.col))
            .collect();
        targets.sort_unstable();
        assert_eq!(targets, vec![(1, 0), (2, 0), (2, 1)]);
    }

    #[test]
    fn all_targets_are_strictly_lower_and_absent() {
        let l = factor_from(
            &[
                (0, 0, 4.0),
                (1, 0, -1.0),
                (1, 1, 4.0),
                (2, 1, -1.0),
                (2, 2, 4.0),
                (3, 0, -1.0),
                (3, 2, -1.0),
                (3, 3, 4.0),
                (4, 1, -1.0),
                (4, 3, -1.0),
                (4, 4, 4.0),
            ],
            5,
            32,
        );
        let cands = discover_candidates(&l);
        assert!(!cands.is_empty());
        for c in &cands.entries {
            assert!(c.row > c.col, "target ({}, {}) not strictly lower", c.row, c.col);
            assert!(!l.contains(c.row, c.col));
        }
    }
}
