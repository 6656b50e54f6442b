//! Candidate insertion protocol.
//!
//! Grafts the strongest evaluated candidates into the factor using the slots
//! recycled by threshold removal. Ranking brings the largest-magnitude
//! residuals to the front of the candidate list; the graft loop then walks
//! two cursors: `i` over ranked candidates and `num_insert` over the freed
//! slots. A candidate that turns out to be a duplicate (the same target can
//! be proposed by several enumerating rows) is skipped without consuming its
//! slot, so the next candidate gets it instead.
//!
//! Each graft happens under the target row's lock: the chain splice is
//! strictly positional, which keeps column order intact, and new entries are
//! written with value 0 for the next sweep to fill in.

use dynfact_core::select::{select_by, SelectMode};
use dynfact_core::{LinkedCsr, END};

use crate::candidates::CandidateSet;
use crate::error::{Error, Result};
use crate::parallel::RowLocks;
use crate::threshold::FreedSlots;

/// Insert up to `num_rm` ranked candidates into recycled slots.
///
/// Returns the number actually grafted. Exhausting the candidate list before
/// the quota is met is soft: remaining freed slots go back on the store's
/// free stack, as do slots left over when `num_rm` is smaller than the freed
/// count.
///
/// # Errors
///
/// [`Error::InsufficientCandidates`] when `num_rm` exceeds the candidate
/// count; the caller is expected to skip the round.
pub fn insert_candidates(
    m: &mut LinkedCsr,
    locks: &RowLocks,
    cands: &mut CandidateSet,
    freed: &FreedSlots,
    num_rm: usize,
) -> Result<usize> {
    let available = cands.len();
    if num_rm > available {
        return Err(Error::InsufficientCandidates {
            requested: num_rm,
            available,
        });
    }
    let quota = num_rm.min(freed.len());

    // Bring the strongest residuals to the front; with the quota equal to
    // the candidate count there is nothing to rank.
    if quota > 0 && quota < available {
        select_by(&mut cands.entries, quota, SelectMode::Largest, |c| {
            c.val.abs()
        });
    }

    let mut num_insert = 0;
    let mut i = 0;
    while num_insert < quota {
        if i >= cands.len() {
            log::debug!(
                "candidate list exhausted after {} of {} insertions",
                num_insert,
                quota
            );
            break;
        }
        let cand = cands.entries[i];
        let loc = freed.slots[num_insert];

        let _row = locks.lock(cand.row);
        let head = m.head[cand.row];
        if head == END || cand.col < m.col[head] {
            // New row minimum: prepend.
            m.next[loc] = head;
            m.head[cand.row] = loc;
            m.rowidx[loc] = cand.row;
            m.col[loc] = cand.col;
            m.val[loc] = 0.0;
            num_insert += 1;
        } else if m.col[head] == cand.col {
            // Duplicate at the head; the slot stays with the next candidate.
        } else {
            let mut prev = head;
            let mut curr = m.next[prev];
            loop {
                if m.col[prev] == cand.col || (curr != END && m.col[curr] == cand.col) {
                    break;
                }
                if curr == END || m.col[curr] > cand.col {
                    m.next[loc] = curr;
                    m.next[prev] = loc;
                    m.rowidx[loc] = cand.row;
                    m.col[loc] = cand.col;
                    m.val[loc] = 0.0;
                    num_insert += 1;
                    break;
                }
                prev = curr;
                curr = m.next[curr];
            }
        }
        drop(_row);
        i += 1;
    }

    m.nnz += num_insert;
    // Whatever the graft loop did not consume returns to the pool.
    for &s in &freed.slots[num_insert..] {
        m.free_list.push(s);
    }
    Ok(num_insert)
}
