//! Subset-sum search that reconstructs which items compose a deposit.

use ramburs_core::{Money, Parcel};

/// Split of a pool into the items attributed to a target amount and the rest.
/// Both halves keep the pool's original order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetMatch<T> {
    pub matched: Vec<T>,
    pub remaining: Vec<T>,
    /// The pool was too large for the exhaustive search, which was skipped.
    pub cap_hit: bool,
}

impl<T> SubsetMatch<T> {
    pub fn is_match(&self) -> bool {
        !self.matched.is_empty()
    }

    fn none(pool: Vec<T>, cap_hit: bool) -> Self {
        Self {
            matched: Vec::new(),
            remaining: pool,
            cap_hit,
        }
    }
}

/// Parcel form of [`find_subset_by`], keyed on the COD amount.
pub fn find_subset(
    pool: Vec<Parcel>,
    target: Money,
    tolerance: Money,
    max_pool_size: usize,
) -> SubsetMatch<Parcel> {
    find_subset_by(pool, |p| p.cod_amount, target, tolerance, max_pool_size)
}

/// Finds the largest subset of `pool` whose amounts sum to `target` within
/// `tolerance`.
///
/// The whole pool is tried first, then a pool that cannot reach the target is
/// rejected outright. Otherwise subsets are examined from size `n - 1` down to
/// `1` in lexicographic index order and the first hit wins, so the result
/// drops as few items as possible. Pools above `max_pool_size` never enter the
/// exhaustive search and come back unmatched with `cap_hit` set.
pub fn find_subset_by<T>(
    pool: Vec<T>,
    amount: impl Fn(&T) -> Money,
    target: Money,
    tolerance: Money,
    max_pool_size: usize,
) -> SubsetMatch<T> {
    let amounts: Vec<Money> = pool.iter().map(&amount).collect();
    let total: Money = amounts.iter().sum();

    if total.within(target, tolerance) {
        return SubsetMatch {
            matched: pool,
            remaining: Vec::new(),
            cap_hit: false,
        };
    }
    if total < target - tolerance {
        return SubsetMatch::none(pool, false);
    }
    if pool.len() > max_pool_size {
        tracing::debug!(
            pool_size = pool.len(),
            max_pool_size,
            "pool above search cap, skipping combination search"
        );
        return SubsetMatch::none(pool, true);
    }

    let n = pool.len();
    for size in (1..n).rev() {
        if let Some(chosen) = first_combination(&amounts, size, target, tolerance) {
            return split(pool, &chosen);
        }
    }

    SubsetMatch::none(pool, false)
}

/// Walks the `size`-combinations of `0..amounts.len()` in lexicographic order.
fn first_combination(amounts: &[Money], size: usize, target: Money, tolerance: Money) -> Option<Vec<usize>> {
    let n = amounts.len();
    let mut idx: Vec<usize> = (0..size).collect();

    loop {
        let sum: Money = idx.iter().map(|&i| amounts[i]).sum();
        if sum.within(target, tolerance) {
            return Some(idx);
        }

        // Rightmost position that can still move forward.
        let mut pos = size;
        while pos > 0 && idx[pos - 1] == n - size + pos - 1 {
            pos -= 1;
        }
        if pos == 0 {
            return None;
        }
        idx[pos - 1] += 1;
        for j in pos..size {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

fn split<T>(pool: Vec<T>, chosen: &[usize]) -> SubsetMatch<T> {
    let mut matched = Vec::with_capacity(chosen.len());
    let mut remaining = Vec::with_capacity(pool.len() - chosen.len());
    for (i, item) in pool.into_iter().enumerate() {
        if chosen.binary_search(&i).is_ok() {
            matched.push(item);
        } else {
            remaining.push(item);
        }
    }
    SubsetMatch {
        matched,
        remaining,
        cap_hit: false,
    }
}
