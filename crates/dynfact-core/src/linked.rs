//! Linked-CSR factor storage.
//!
//! The adaptive factor needs O(1) insertion and deletion inside a row while
//! keeping ascending column order, so rows are singly-linked chains threaded
//! through a pre-allocated slot arena:
//!
//! - `head[i]` points at the first slot of row i (or [`END`]),
//! - `next[s]` points at the following slot of the same row; [`END`]
//!   terminates the chain, [`FREE`] marks a recycled slot,
//! - slot 0 is reserved as the chain terminator and never carries data.
//!
//! All links are slot *indices*, never references, which keeps the structure
//! trivially serializable and the concurrent kernels honest about what they
//! touch.
//!
//! # Invariants
//!
//! For every row i the chain starting at `head[i]` reaches [`END`] after
//! finitely many hops, visits strictly increasing columns, and (for factor
//! matrices) ends at the diagonal slot `col == i`. Live slots plus
//! `FREE`-marked slots account for every slot except the reserved slot 0.
//! [`LinkedCsr::validate`] checks all of this.

use crate::csr::CsrMatrix;
use crate::error::{Error, Result};

/// Chain terminator. Slot 0 is reserved and never carries data.
pub const END: usize = 0;

/// Marker for a recycled slot (`next[s] == FREE`).
pub const FREE: usize = usize::MAX;

/// Which positions of the input matrix seed the factor pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialPattern {
    /// Diagonal entries only; the pattern is grown entirely by the engine.
    Diagonal,
    /// The input's full triangle (lower for L, upper for Uᵀ).
    FullTriangle,
}

/// Sparse matrix with per-row linked chains over a slot arena.
///
/// Fields are public: the factorization kernels are free functions that walk
/// and splice the chains directly, in the same spirit as the raw index
/// juggling the structure exists for. Code that wants safety nets should go
/// through the methods.
#[derive(Debug, Clone)]
pub struct LinkedCsr {
    /// Row count.
    pub n: usize,
    /// Allocated slot count (including the reserved slot 0).
    pub cap: usize,
    /// Live entry count.
    pub nnz: usize,
    /// First slot of each row, `END` if the row is empty.
    pub head: Vec<usize>,
    /// Column index per slot.
    pub col: Vec<usize>,
    /// Row index per slot (constant-time back-lookup from a slot).
    pub rowidx: Vec<usize>,
    /// Value per slot.
    pub val: Vec<f64>,
    /// Next slot in the row; `END` terminates, `FREE` marks recycled.
    pub next: Vec<usize>,
    /// Recycled slots available to [`LinkedCsr::alloc`].
    pub free_list: Vec<usize>,
}

impl LinkedCsr {
    /// Create an empty store with `capacity` slots (slot 0 reserved).
    ///
    /// Every usable slot starts on the free list. Rows are empty, which
    /// violates the diagonal invariant expected by the factorization
    /// kernels; callers are expected to link a diagonal into each row (the
    /// `from_csr*` builders do) before handing the store to the engine.
    pub fn with_capacity(n: usize, capacity: usize) -> Result<Self> {
        if capacity < 1 {
            return Err(Error::InvalidMatrix(
                "capacity must reserve at least slot 0".into(),
            ));
        }
        Ok(Self {
            n,
            cap: capacity,
            nnz: 0,
            head: vec![END; n],
            col: vec![0; capacity],
            rowidx: vec![0; capacity],
            val: vec![0.0; capacity],
            next: {
                let mut next = vec![FREE; capacity];
                next[0] = END;
                next
            },
            // Popped from the back: low slots go out first.
            free_list: (1..capacity).rev().collect(),
        })
    }

    /// Build the lower-triangular factor pattern from A.
    ///
    /// Seeds the pattern with A's diagonal or its full lower triangle
    /// (including the diagonal), values copied from A.
    ///
    /// # Errors
    ///
    /// [`Error::MissingDiagonal`] if a row of A has no diagonal entry;
    /// [`Error::CapacityExhausted`] if `capacity` cannot hold the seed
    /// pattern plus the reserved slot.
    pub fn from_csr(a: &CsrMatrix, capacity: usize, pattern: InitialPattern) -> Result<Self> {
        let n = a.n();
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for i in 0..n {
            let (cols, vals) = a.row(i);
            let mut has_diag = false;
            for (k, &c) in cols.iter().enumerate() {
                if c > i {
                    break;
                }
                if c == i {
                    has_diag = true;
                }
                if c == i || pattern == InitialPattern::FullTriangle {
                    rows[i].push((c, vals[k]));
                }
            }
            if !has_diag {
                return Err(Error::MissingDiagonal(i));
            }
        }
        Self::from_sorted_rows(n, capacity, rows)
    }

    /// Build the transposed upper-triangular factor pattern from A.
    ///
    /// Row i of the result holds column i of A's upper triangle: entries
    /// (k, i) with k ≤ i appear under column index k, the diagonal last.
    /// This gives U the same lower-triangular chain layout as L, so every
    /// kernel works on either store unchanged.
    pub fn from_csr_upper_transposed(
        a: &CsrMatrix,
        capacity: usize,
        pattern: InitialPattern,
    ) -> Result<Self> {
        let n = a.n();
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for k in 0..n {
            let (cols, vals) = a.row(k);
            for (e, &j) in cols.iter().enumerate() {
                if j < k {
                    continue;
                }
                if j == k || pattern == InitialPattern::FullTriangle {
                    rows[j].push((k, vals[e]));
                }
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.last().map(|&(c, _)| c) != Some(i) {
                return Err(Error::MissingDiagonal(i));
            }
        }
        Self::from_sorted_rows(n, capacity, rows)
    }

    fn from_sorted_rows(
        n: usize,
        capacity: usize,
        rows: Vec<Vec<(usize, f64)>>,
    ) -> Result<Self> {
        let nnz: usize = rows.iter().map(Vec::len).sum();
        if capacity < nnz + 1 {
            return Err(Error::CapacityExhausted {
                needed: nnz + 1,
                available: capacity,
            });
        }
        let mut m = Self::with_capacity(n, capacity)?;
        m.free_list.truncate(capacity - 1 - nnz);
        m.nnz = nnz;

        let mut slot = 1;
        for (i, row) in rows.into_iter().enumerate() {
            let mut prev = END;
            for (c, v) in row {
                m.col[slot] = c;
                m.rowidx[slot] = i;
                m.val[slot] = v;
                m.next[slot] = END;
                if prev == END {
                    m.head[i] = slot;
                } else {
                    m.next[prev] = slot;
                }
                prev = slot;
                slot += 1;
            }
        }
        Ok(m)
    }

    /// First slot of row i, `END` if the row is empty.
    #[inline]
    pub fn first(&self, i: usize) -> usize {
        self.head[i]
    }

    /// Slot following s in its row.
    #[inline]
    pub fn next(&self, s: usize) -> usize {
        self.next[s]
    }

    /// Whether s currently carries a live entry.
    #[inline]
    pub fn is_live(&self, s: usize) -> bool {
        s != END && self.next[s] != FREE
    }

    /// Live slots of row i in ascending column order.
    pub fn iter_row(&self, i: usize) -> RowIter<'_> {
        RowIter {
            next: &self.next,
            s: self.head[i],
        }
    }

    /// (column, value) pairs of row i in ascending column order.
    pub fn row_entries(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.iter_row(i).map(move |s| (self.col[s], self.val[s]))
    }

    /// Find the slot holding (i, j), if present.
    pub fn find(&self, i: usize, j: usize) -> Option<usize> {
        let mut s = self.head[i];
        while s != END {
            let c = self.col[s];
            if c == j {
                return Some(s);
            }
            if c > j {
                return None;
            }
            s = self.next[s];
        }
        None
    }

    /// Whether row i contains column j. Early-exits on the sorted chain.
    #[inline]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.find(i, j).is_some()
    }

    /// Value at (i, j), 0.0 if the position is not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.find(i, j).map_or(0.0, |s| self.val[s])
    }

    /// Pop a recycled slot.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExhausted`] when the free pool is empty. Insertion
    /// callers are expected to guarantee their slot budget up front.
    pub fn alloc(&mut self) -> Result<usize> {
        self.free_list.pop().ok_or(Error::CapacityExhausted {
            needed: 1,
            available: 0,
        })
    }

    /// Recycle an already-unlinked slot.
    ///
    /// The caller must have spliced s out of its chain; this zeroes the
    /// value, marks the slot `FREE` and returns it to the pool.
    pub fn free(&mut self, s: usize) {
        debug_assert_ne!(s, END, "slot 0 is reserved");
        self.val[s] = 0.0;
        self.next[s] = FREE;
        self.free_list.push(s);
        self.nnz -= 1;
    }

    /// Check structural invariants; test and debugging aid.
    ///
    /// Verifies chain termination, strict column order, diagonal placement,
    /// slot back-pointers, and slot accounting (live + recycled = cap − 1).
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::InvariantViolation(msg));

        if self.next[END] != END {
            return fail("slot 0 must stay terminal".into());
        }
        let mut live = 0usize;
        for i in 0..self.n {
            let mut s = self.head[i];
            let mut hops = 0usize;
            let mut last_col = None;
            let mut last_slot = END;
            while s != END {
                hops += 1;
                if hops > self.cap {
                    return fail(format!("row {} chain does not terminate", i));
                }
                if self.next[s] == FREE {
                    return fail(format!("row {} links freed slot {}", i, s));
                }
                if self.rowidx[s] != i {
                    return fail(format!(
                        "slot {} is chained in row {} but rowidx says {}",
                        s, i, self.rowidx[s]
                    ));
                }
                if let Some(prev) = last_col {
                    if self.col[s] <= prev {
                        return fail(format!("row {} columns not strictly increasing", i));
                    }
                }
                last_col = Some(self.col[s]);
                last_slot = s;
                s = self.next[s];
            }
            if last_slot != END && self.col[last_slot] != i {
                return fail(format!("row {} does not end at its diagonal", i));
            }
            live += hops;
        }
        if live != self.nnz {
            return fail(format!("nnz is {} but chains hold {}", self.nnz, live));
        }
        let recycled = (1..self.cap).filter(|&s| self.next[s] == FREE).count();
        if live + recycled != self.cap - 1 {
            return fail(format!(
                "slot accounting broken: {} live + {} recycled != {}",
                live,
                recycled,
                self.cap - 1
            ));
        }
        for &s in &self.free_list {
            if s == END || self.next[s] != FREE {
                return fail(format!("free list holds non-recycled slot {}", s));
            }
        }
        Ok(())
    }
}

/// Iterator over the live slots of one row.
pub struct RowIter<'a> {
    next: &'a [usize],
    s: usize,
}

impl Iterator for RowIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.s == END {
            return None;
        }
        let s = self.s;
        self.s = self.next[s];
        Some(s)
    }
}
