//! Immutable CSR input matrices.
//!
//! The factorization kernels treat the system matrix A as read-only and only
//! ever ask two things of it: "walk row i" and "what is A\[i,j\]". A stays in
//! classic contiguous CSR; the adaptive factor lives in the linked store
//! ([`crate::LinkedCsr`]).

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Square sparse matrix in compressed sparse row format.
///
/// # Construction
///
/// - `row_ptr[i]` gives the starting index in `col_idx`/`values` for row i
/// - `col_idx[k]` gives the column index for entry k
/// - `values[k]` gives the value for entry k
///
/// Columns must be strictly increasing within each row; `from_parts`
/// validates this so every consumer can rely on sorted rows.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    /// Row pointers (length n + 1).
    row_ptr: Vec<usize>,
    /// Column indices for each non-zero.
    col_idx: Vec<usize>,
    /// Non-zero values.
    values: Vec<f64>,
    /// Matrix dimension.
    n: usize,
}

impl CsrMatrix {
    /// Create from raw CSR arrays.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMatrix`] if the array lengths are
    /// inconsistent, a column index is out of range, or a row's columns are
    /// not strictly increasing.
    pub fn from_parts(
        n: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if row_ptr.len() != n + 1 {
            return Err(Error::InvalidMatrix(
                "row_ptr length must be n + 1".into(),
            ));
        }
        let nnz = row_ptr[n];
        if col_idx.len() != nnz || values.len() != nnz {
            return Err(Error::InvalidMatrix(
                "col_idx and values length must match nnz".into(),
            ));
        }
        for i in 0..n {
            if row_ptr[i] > row_ptr[i + 1] {
                return Err(Error::InvalidMatrix(format!(
                    "row_ptr not monotone at row {}",
                    i
                )));
            }
            let row = &col_idx[row_ptr[i]..row_ptr[i + 1]];
            for (k, &c) in row.iter().enumerate() {
                if c >= n {
                    return Err(Error::InvalidMatrix(format!(
                        "column {} out of range in row {}",
                        c, i
                    )));
                }
                if k > 0 && row[k - 1] >= c {
                    return Err(Error::InvalidMatrix(format!(
                        "columns not strictly increasing in row {}",
                        i
                    )));
                }
            }
        }
        Ok(Self {
            row_ptr,
            col_idx,
            values,
            n,
        })
    }

    /// Create from matrix triplets. Duplicate entries at the same position
    /// are summed.
    pub fn from_triplets(n: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(row, col, val) in triplets {
            if row >= n || col >= n {
                return Err(Error::InvalidMatrix(format!(
                    "triplet ({}, {}) out of range for n = {}",
                    row, col, n
                )));
            }
            *entries.entry((row, col)).or_insert(0.0) += val;
        }

        let mut row_ptr = vec![0; n + 1];
        let mut col_idx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());

        let mut current_row = 0;
        for (&(row, col), &val) in &entries {
            while current_row <= row {
                row_ptr[current_row] = col_idx.len();
                current_row += 1;
            }
            col_idx.push(col);
            values.push(val);
        }
        while current_row <= n {
            row_ptr[current_row] = col_idx.len();
            current_row += 1;
        }

        Ok(Self {
            row_ptr,
            col_idx,
            values,
            n,
        })
    }

    /// Matrix dimension.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and values of row i.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let span = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[span.clone()], &self.values[span])
    }

    /// Look up A\[i,j\] by scanning row i, 0.0 if the position is not stored.
    ///
    /// Rows of typical input matrices are short, so a linear scan beats
    /// binary search bookkeeping here.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (cols, vals) = self.row(i);
        for (k, &c) in cols.iter().enumerate() {
            if c == j {
                return vals[k];
            }
            if c > j {
                break;
            }
        }
        0.0
    }

    /// Whether the position (i, j) is stored.
    pub fn contains(&self, i: usize, j: usize) -> bool {
        let (cols, _) = self.row(i);
        cols.binary_search(&j).is_ok()
    }
}
