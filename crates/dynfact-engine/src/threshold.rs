//! Magnitude-threshold entry removal.
//!
//! A round drops its smallest current entries to make room for the admitted
//! candidates. The cutoff comes from the order-statistics selector over the
//! live values; removal then walks every row in parallel, unlinking and
//! recycling each off-diagonal slot whose magnitude falls strictly below the
//! cutoff. Diagonals are never dropped.
//!
//! Each worker owns a disjoint set of rows and a row's chain never shares
//! slots with another row's, so the chain surgery needs no locks; freed slot
//! indices are collected in per-thread buffers and merged at the end.

use dynfact_core::select::{select, SelectMode};
use dynfact_core::{LinkedCsr, END, FREE};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::parallel::{SharedIdx, SharedVals};

/// Slots recycled by [`remove_below`], in hand-off order for insertion.
#[derive(Debug, Clone, Default)]
pub struct FreedSlots {
    pub slots: Vec<usize>,
}

impl FreedSlots {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Compute the removal cutoff for dropping `num_rm` entries.
///
/// Returns the magnitude of the smallest entry that survives, i.e. the
/// (num_rm + 1)-th smallest live magnitude: removing everything strictly
/// below it drops exactly the `num_rm` smallest when magnitudes are
/// distinct. Diagonal values take part in the selection but are protected by
/// [`remove_below`], so the actual removal count can come out lower; the
/// emitted [`FreedSlots`] is authoritative.
///
/// # Errors
///
/// [`Error::SelectorOutOfRange`] when `num_rm` is not smaller than the live
/// entry count.
pub fn set_threshold(m: &LinkedCsr, num_rm: usize) -> Result<f64> {
    let mut scratch: Vec<f64> = (1..m.cap)
        .filter(|&s| m.next[s] != FREE)
        .map(|s| m.val[s])
        .collect();
    debug_assert_eq!(scratch.len(), m.nnz);
    if num_rm >= scratch.len() {
        return Err(Error::SelectorOutOfRange {
            k: num_rm,
            len: scratch.len(),
        });
    }
    Ok(select(&mut scratch, num_rm, SelectMode::Smallest))
}

/// Unlink and recycle every off-diagonal entry with |val| < `threshold`.
///
/// Returns the freed slot list for the insertion protocol; the slots are
/// `FREE`-marked but intentionally left off the store's free stack until
/// insertion decides which ones it consumes.
pub fn remove_below(m: &mut LinkedCsr, threshold: f64) -> FreedSlots {
    let n = m.n;
    let heads = SharedIdx::new(&mut m.head);
    let nexts = SharedIdx::new(&mut m.next);
    let vals = SharedVals::new(&mut m.val);
    let cols = &m.col;

    let slots: Vec<usize> = (0..n)
        .into_par_iter()
        .fold(Vec::new, |mut freed: Vec<usize>, r| {
            let mut prev = END;
            let mut s = heads.get(r);
            while s != END {
                let nx = nexts.get(s);
                if cols[s] != r && vals.get(s).abs() < threshold {
                    vals.set(s, 0.0);
                    nexts.set(s, FREE);
                    // Head pointer if s led the row, predecessor link otherwise.
                    if prev == END {
                        heads.set(r, nx);
                    } else {
                        nexts.set(prev, nx);
                    }
                    freed.push(s);
                } else {
                    prev = s;
                }
                s = nx;
            }
            freed
        })
        .reduce(Vec::new, |mut a, mut b| {
            a.append(&mut b);
            a
        });

    m.nnz -= slots.len();
    FreedSlots { slots }
}
