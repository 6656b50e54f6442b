//! Order-statistics selection by magnitude.
//!
//! The engine ranks candidate residuals and picks drop thresholds with the
//! same primitive: bring the k extremal magnitudes to the front of an array
//! and report the magnitude at position k. Introselect keeps the expected
//! cost linear and caps the worst case at O(N log N) by falling back to a
//! sort when quickselect partitions stop making progress.

/// Selection direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// Extremal = smallest magnitude (threshold selection).
    Smallest,
    /// Extremal = largest magnitude (candidate ranking).
    Largest,
}

/// Select on raw values, keyed by absolute value.
///
/// See [`select_by`] for the contract.
pub fn select(values: &mut [f64], k: usize, mode: SelectMode) -> f64 {
    select_by(values, k, mode, |v| v.abs())
}

/// Partially reorder `items` around the k-th extremal magnitude.
///
/// On return, position k holds the element that would sit at index k if the
/// slice were fully sorted by `magnitude` (ascending for
/// [`SelectMode::Smallest`], descending for [`SelectMode::Largest`]); every
/// earlier position holds an element at least as extremal, in no particular
/// order. Returns the magnitude at position k.
///
/// Callers lean on both halves of the contract: threshold selection reads
/// the pivot (the smallest magnitude that survives a removal of k entries),
/// candidate ranking consumes the prefix `items[..k]` as the admitted set.
///
/// Panics if `k >= items.len()`.
pub fn select_by<T, F>(items: &mut [T], k: usize, mode: SelectMode, magnitude: F) -> f64
where
    F: Fn(&T) -> f64,
{
    assert!(
        k < items.len(),
        "selection index {} out of range for {} items",
        k,
        items.len()
    );

    let mut lo = 0;
    let mut hi = items.len();
    // Quickselect halts on the partition containing k; after about
    // 2·log2(N) partitions without hitting it, degenerate pivots are likely
    // and sorting the remaining range is cheaper than risking O(N²).
    let mut budget = 2 * (usize::BITS - items.len().leading_zeros()) as usize;

    loop {
        if hi - lo <= 8 || budget == 0 {
            sort_range(&mut items[lo..hi], mode, &magnitude);
            return magnitude(&items[k]);
        }
        budget -= 1;
        let p = partition(items, lo, hi, mode, &magnitude);
        match p {
            _ if p == k => return magnitude(&items[k]),
            _ if k < p => hi = p,
            _ => lo = p + 1,
        }
    }
}

/// Whether magnitude `a` is strictly more extremal than `b` under `mode`.
#[inline]
fn precedes(a: f64, b: f64, mode: SelectMode) -> bool {
    match mode {
        SelectMode::Smallest => a < b,
        SelectMode::Largest => a > b,
    }
}

fn sort_range<T, F>(items: &mut [T], mode: SelectMode, magnitude: &F)
where
    F: Fn(&T) -> f64,
{
    match mode {
        SelectMode::Smallest => {
            items.sort_unstable_by(|a, b| magnitude(a).total_cmp(&magnitude(b)))
        }
        SelectMode::Largest => {
            items.sort_unstable_by(|a, b| magnitude(b).total_cmp(&magnitude(a)))
        }
    }
}

/// Lomuto partition of `items[lo..hi]` with a median-of-three pivot.
///
/// Returns the pivot's final index; everything before it is at least as
/// extremal as the pivot, everything after at most.
fn partition<T, F>(items: &mut [T], lo: usize, hi: usize, mode: SelectMode, magnitude: &F) -> usize
where
    F: Fn(&T) -> f64,
{
    let mid = lo + (hi - lo) / 2;
    let last = hi - 1;

    // Median of three, moved to the end as the pivot.
    let (a, b, c) = (
        magnitude(&items[lo]),
        magnitude(&items[mid]),
        magnitude(&items[last]),
    );
    let median = if precedes(a, b, mode) {
        if precedes(b, c, mode) {
            mid
        } else if precedes(a, c, mode) {
            last
        } else {
            lo
        }
    } else if precedes(a, c, mode) {
        lo
    } else if precedes(b, c, mode) {
        last
    } else {
        mid
    };
    items.swap(median, last);

    let pivot = magnitude(&items[last]);
    let mut store = lo;
    for j in lo..last {
        if precedes(magnitude(&items[j]), pivot, mode) {
            items.swap(j, store);
            store += 1;
        }
    }
    items.swap(store, last);
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn check_contract(values: &[f64], k: usize, mode: SelectMode) {
        let mut work = values.to_vec();
        let pivot = select(&mut work, k, mode);

        let mut sorted: Vec<f64> = values.iter().map(|v| v.abs()).collect();
        sorted.sort_by(f64::total_cmp);
        if mode == SelectMode::Largest {
            sorted.reverse();
        }
        assert_eq!(pivot, sorted[k], "pivot mismatch for k={k} {mode:?}");
        for v in &work[..k] {
            assert!(
                !precedes(pivot, v.abs(), mode),
                "prefix element {} less extremal than pivot {}",
                v,
                pivot
            );
        }
        for v in &work[k + 1..] {
            assert!(
                !precedes(v.abs(), pivot, mode),
                "suffix element {} more extremal than pivot {}",
                v,
                pivot
            );
        }
    }

    #[test]
    fn small_arrays_both_modes() {
        let values = [3.0, -1.0, 4.0, -1.5, 9.0, 2.0, -6.0];
        for k in 0..values.len() {
            check_contract(&values, k, SelectMode::Smallest);
            check_contract(&values, k, SelectMode::Largest);
        }
    }

    #[test]
    fn duplicates_are_handled() {
        let values = [2.0, -2.0, 2.0, 1.0, -2.0, 3.0];
        for k in 0..values.len() {
            check_contract(&values, k, SelectMode::Smallest);
            check_contract(&values, k, SelectMode::Largest);
        }
    }

    #[test]
    fn random_arrays() {
        let mut rng = StdRng::seed_from_u64(0x5e1ec7);
        for _ in 0..20 {
            let len = rng.gen_range(1..200);
            let values: Vec<f64> = (0..len).map(|_| rng.gen_range(-10.0..10.0)).collect();
            let k = rng.gen_range(0..len);
            check_contract(&values, k, SelectMode::Smallest);
            check_contract(&values, k, SelectMode::Largest);
        }
    }

    #[test]
    fn keyed_selection_reorders_whole_elements() {
        let mut items: Vec<(usize, f64)> = vec![(0usize, 5.0), (1, -0.5), (2, 3.0), (3, -8.0), (4, 1.0)];
        let pivot = select_by(&mut items, 2, SelectMode::Largest, |e| e.1.abs());
        assert_eq!(pivot, 3.0);
        let mut prefix: Vec<usize> = items[..2].iter().map(|e| e.0).collect();
        prefix.sort_unstable();
        assert_eq!(prefix, vec![0, 3]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_k_panics() {
        let mut values = [1.0, 2.0];
        select(&mut values, 2, SelectMode::Smallest);
    }
}
