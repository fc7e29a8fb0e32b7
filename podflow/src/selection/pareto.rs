//! Pareto dominance filtering.
//!
//! The frontier is computed by all-pairs comparison, O(n² · |metrics|).
//! That is fine for catalogs in the hundreds to low thousands; much larger
//! inputs would need a sort-based skyline pass instead.

use super::{Candidate, MetricPolicy};
use std::cmp::Ordering;

/// True if `a` dominates `b`: at least as good on every metric and strictly
/// better on at least one.
///
/// Missing values compare as the worst value for their direction, so an
/// absent attribute can neither earn a dominance nor escape one.
#[must_use]
pub fn dominates(a: &Candidate, b: &Candidate, policy: &MetricPolicy) -> bool {
    let mut strictly_better = false;

    for (metric, direction) in policy.iter() {
        let va = a.comparable(metric, direction);
        let vb = b.comparable(metric, direction);

        if !direction.at_least_as_good(va, vb) {
            return false;
        }
        if direction.strictly_better(va, vb) {
            strictly_better = true;
        }
    }

    strictly_better
}

/// Returns a flag per candidate, `true` where no other candidate dominates it.
///
/// An empty input yields an empty output.
#[must_use]
pub fn pareto_frontier(candidates: &[Candidate], policy: &MetricPolicy) -> Vec<bool> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            !candidates
                .iter()
                .enumerate()
                .any(|(j, other)| i != j && dominates(other, candidate, policy))
        })
        .collect()
}

fn price_order(
    candidates: &[Candidate],
    policy: &MetricPolicy,
    a: usize,
    b: usize,
) -> Ordering {
    let by_price = policy.primary_minimized().map_or(Ordering::Equal, |metric| {
        let direction = super::Direction::Minimize;
        candidates[a]
            .comparable(metric, direction)
            .total_cmp(&candidates[b].comparable(metric, direction))
    });
    by_price.then(a.cmp(&b))
}

/// Picks one candidate index for automatic selection.
///
/// Among Pareto-optimal candidates the one with the lowest value of the
/// policy's minimized metric wins, ties going to the earlier input position.
/// Falls back to the first candidate if no flag is set. `None` only for an
/// empty input.
#[must_use]
pub fn pick_best(candidates: &[Candidate], policy: &MetricPolicy, flags: &[bool]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    let best = (0..candidates.len())
        .filter(|&i| flags.get(i).copied().unwrap_or(false))
        .min_by(|&a, &b| price_order(candidates, policy, a, b));

    Some(best.unwrap_or(0))
}

/// Orders candidate indices Pareto-optimal first, then by ascending price,
/// then by input position. Returns `(index, is_optimal)` pairs.
#[must_use]
pub fn rank_candidates(candidates: &[Candidate], policy: &MetricPolicy) -> Vec<(usize, bool)> {
    let flags = pareto_frontier(candidates, policy);
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        flags[b]
            .cmp(&flags[a])
            .then_with(|| price_order(candidates, policy, a, b))
    });
    order.into_iter().map(|i| (i, flags[i])).collect()
}
