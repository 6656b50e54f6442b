//! Shared-mutation primitives for the parallel kernels.
//!
//! The factor's arrays are mutated concurrently under three different
//! regimes: per-row exclusive ownership (threshold removal), per-row locking
//! (insertion), and benign value races (the fixed-point sweep). All three go
//! through [`SharedVals`]/[`SharedIdx`]: relaxed-atomic views constructed
//! from an exclusive borrow, so every concurrent access during a kernel is
//! atomic and the racy sweep reads stay defined behavior. Freshness is not
//! required anywhere a race exists; the sweep converges on stale reads.
//!
//! Requires targets with native 64-bit atomics (every mainstream 64-bit
//! platform).

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Relaxed-atomic view of an `f64` slice.
///
/// Copyable so data-parallel closures can capture it by value.
///
/// # Safety contract
///
/// Construction takes `&mut`, so for the view's lifetime all access to the
/// slice funnels through atomic loads/stores. Writers must still not
/// overlap: each kernel guarantees a slot is written by at most one task
/// (row ownership, a row lock, or slot-per-task assignment).
#[derive(Clone, Copy)]
pub struct SharedVals<'a> {
    ptr: *mut f64,
    len: usize,
    _marker: PhantomData<&'a mut [f64]>,
}

unsafe impl Send for SharedVals<'_> {}
unsafe impl Sync for SharedVals<'_> {}

impl<'a> SharedVals<'a> {
    pub fn new(slice: &'a mut [f64]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        debug_assert!(i < self.len);
        // Valid and 8-aligned for the borrowed slice; atomic because every
        // access in scope is.
        let cell = unsafe { AtomicU64::from_ptr(self.ptr.add(i) as *mut u64) };
        f64::from_bits(cell.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, i: usize, v: f64) {
        debug_assert!(i < self.len);
        let cell = unsafe { AtomicU64::from_ptr(self.ptr.add(i) as *mut u64) };
        cell.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Relaxed-atomic view of a `usize` slice; see [`SharedVals`].
#[derive(Clone, Copy)]
pub struct SharedIdx<'a> {
    ptr: *mut usize,
    len: usize,
    _marker: PhantomData<&'a mut [usize]>,
}

unsafe impl Send for SharedIdx<'_> {}
unsafe impl Sync for SharedIdx<'_> {}

impl<'a> SharedIdx<'a> {
    pub fn new(slice: &'a mut [usize]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> usize {
        debug_assert!(i < self.len);
        let cell = unsafe { AtomicUsize::from_ptr(self.ptr.add(i)) };
        cell.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, i: usize, v: usize) {
        debug_assert!(i < self.len);
        let cell = unsafe { AtomicUsize::from_ptr(self.ptr.add(i)) };
        cell.store(v, Ordering::Relaxed);
    }
}

/// One mutex per matrix row.
///
/// Held only around a single chain-traversal insertion; threads take at most
/// one row lock at a time and never nest them.
#[derive(Debug)]
pub struct RowLocks {
    locks: Vec<Mutex<()>>,
}

impl RowLocks {
    pub fn new(n: usize) -> Self {
        Self {
            locks: (0..n).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Block until row `r` is exclusively held.
    pub fn lock(&self, r: usize) -> MutexGuard<'_, ()> {
        self.locks[r].lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn shared_vals_disjoint_parallel_writes() {
        let mut data = vec![0.0f64; 256];
        let view = SharedVals::new(&mut data);
        (0..256usize).into_par_iter().for_each(|i| {
            view.set(i, i as f64 * 0.5);
        });
        assert_eq!(data[0], 0.0);
        assert_eq!(data[100], 50.0);
        assert_eq!(data[255], 127.5);
    }

    #[test]
    fn shared_idx_roundtrip() {
        let mut data = vec![usize::MAX; 8];
        let view = SharedIdx::new(&mut data);
        view.set(3, 7);
        assert_eq!(view.get(3), 7);
        assert_eq!(view.get(0), usize::MAX);
        drop(view);
        assert_eq!(data[3], 7);
    }

    #[test]
    fn row_locks_serialize_a_row() {
        let locks = RowLocks::new(4);
        let counter = AtomicU64::new(0);
        (0..64u64).into_par_iter().for_each(|_| {
            let _row = locks.lock(2);
            counter.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(counter.load(Ordering::Relaxed), 64);
    }
}
