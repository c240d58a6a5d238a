// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Quadratic funding arithmetic.
//!
//! A project's ideal match is `(Σ √cᵢ)² − Σ cᵢ`. When the ideal matches of all
//! projects exceed the pool, every match is scaled down by the same factor
//! `alpha`, a fixed-point value where [`ALPHA_ONE`] is `1.0`.

use crate::primitives::{Balance, Contribution, ALPHA_ONE};
use std::collections::{BTreeMap, BTreeSet};

/// Integer square root, rounded down.
#[must_use]
pub fn isqrt(x: u128) -> u128 {
    if x == 0 {
        return 0;
    }

    let mut result = x;
    let mut temp = x / 2 + x % 2;
    while temp < result {
        result = temp;
        temp = (x / temp + temp) / 2;
    }

    result
}

/// Ideal match for a single project given its contribution amounts.
#[must_use]
pub fn ideal_match<I: IntoIterator<Item = Balance>>(contributions: I) -> Balance {
    let (sum_sqrt, sum) = contributions
        .into_iter()
        .fold((0u128, 0u128), |(sqrt_acc, acc), c| {
            (sqrt_acc.saturating_add(isqrt(c)), acc.saturating_add(c))
        });

    sum_sqrt.saturating_mul(sum_sqrt).saturating_sub(sum)
}

/// Scale factor such that all scaled matches fit inside `pool`.
#[must_use]
pub fn alpha(pool: Balance, total_ideal: Balance) -> u32 {
    if total_ideal <= pool {
        return ALPHA_ONE;
    }

    // `pool < total_ideal` so the quotient is below `ALPHA_ONE`
    let scaled = pool.saturating_mul(Balance::from(ALPHA_ONE)) / total_ideal;
    u32::try_from(scaled).unwrap_or(ALPHA_ONE)
}

#[must_use]
pub fn scaled_match(ideal: Balance, alpha: u32) -> Balance {
    ideal.saturating_mul(Balance::from(alpha)) / Balance::from(ALPHA_ONE)
}

/// Matching outcome for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub project_id: u32,
    pub contributed: Balance,
    pub ideal: Balance,
    pub scaled: Balance,
}

/// Matching outcome for a whole round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundMatches {
    pub alpha: u32,
    pub total_ideal: Balance,
    pub matches: Vec<MatchResult>,
}

impl RoundMatches {
    #[must_use]
    pub fn get(&self, project_id: u32) -> Option<&MatchResult> {
        self.matches.iter().find(|m| m.project_id == project_id)
    }

    /// Sum of all scaled matches. Never exceeds the pool.
    #[must_use]
    pub fn total_scaled(&self) -> Balance {
        self.matches
            .iter()
            .map(|m| m.scaled)
            .fold(0, Balance::saturating_add)
    }
}

/// Computes the matches of every eligible project of a round.
///
/// Contributions to projects outside `eligible` are ignored. A project listed
/// more than once in `eligible` is matched once.
#[must_use]
pub fn compute_matches(pool: Balance, eligible: &[u32], contributions: &[Contribution]) -> RoundMatches {
    let mut seen = BTreeSet::new();
    let eligible: Vec<u32> = eligible.iter().copied().filter(|id| seen.insert(*id)).collect();

    let mut per_project: BTreeMap<u32, Vec<Balance>> =
        eligible.iter().map(|id| (*id, Vec::new())).collect();

    for contribution in contributions {
        if let Some(amounts) = per_project.get_mut(&contribution.project_id) {
            amounts.push(contribution.amount);
        }
    }

    let ideals: Vec<(u32, Balance, Balance)> = eligible
        .iter()
        .map(|id| {
            let amounts = per_project.get(id).cloned().unwrap_or_default();
            let contributed = amounts.iter().copied().fold(0, Balance::saturating_add);
            (*id, contributed, ideal_match(amounts))
        })
        .collect();

    let total_ideal = ideals
        .iter()
        .fold(0u128, |acc, (_, _, ideal)| acc.saturating_add(*ideal));
    let alpha = alpha(pool, total_ideal);

    RoundMatches {
        alpha,
        total_ideal,
        matches: ideals
            .into_iter()
            .map(|(project_id, contributed, ideal)| MatchResult {
                project_id,
                contributed,
                ideal,
                scaled: scaled_match(ideal, alpha),
            })
            .collect(),
    }
}

/// Estimated additional matching a project receives if `amount` is added to
/// its `existing` contributions, assuming the round's current `alpha` holds.
#[must_use]
pub fn estimate_impact(existing: &[Balance], amount: Balance, alpha: u32) -> Balance {
    let current = scaled_match(ideal_match(existing.iter().copied()), alpha);
    let with_new = scaled_match(
        ideal_match(existing.iter().copied().chain(std::iter::once(amount))),
        alpha,
    );

    with_new.saturating_sub(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::AccountId;
    use quickcheck_macros::quickcheck;

    fn contribution(project_id: u32, amount: Balance, who: u8) -> Contribution {
        Contribution {
            amount,
            contributor: AccountId([who; 32]),
            project_id,
            round_id: 1,
            timestamp: 0,
        }
    }

    #[test]
    fn isqrt_small_values() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(2), 1);
        assert_eq!(isqrt(3), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(99), 9);
        assert_eq!(isqrt(100), 10);
        assert_eq!(isqrt(u128::MAX), u128::from(u64::MAX));
    }

    #[quickcheck]
    fn isqrt_is_floor_sqrt(x: u64) -> bool {
        let x = u128::from(x);
        let r = isqrt(x);
        r * r <= x && (r + 1) * (r + 1) > x
    }

    #[test]
    fn single_contributor_gets_no_match() {
        assert_eq!(ideal_match([100]), 0);
    }

    #[test]
    fn many_small_contributions_beat_one_large() {
        // 4 x 25: (4 * 5)^2 - 100 = 300
        assert_eq!(ideal_match([25, 25, 25, 25]), 300);
        assert_eq!(ideal_match([100]), 0);
    }

    #[test]
    fn alpha_is_one_when_pool_suffices() {
        assert_eq!(alpha(1_000, 1_000), ALPHA_ONE);
        assert_eq!(alpha(1_000, 0), ALPHA_ONE);
        assert_eq!(alpha(500, 1_000), 5_000);
        assert_eq!(scaled_match(300, 5_000), 150);
    }

    #[test]
    fn matches_fit_inside_the_pool() {
        let contributions = vec![
            contribution(1, 25, 1),
            contribution(1, 25, 2),
            contribution(1, 25, 3),
            contribution(1, 25, 4),
            contribution(2, 100, 5),
            contribution(2, 100, 6),
            contribution(3, 50, 7),
        ];

        let matches = compute_matches(200, &[1, 2], &contributions);

        // Project 1 ideal 300, project 2 ideal (2*10)^2 - 200 = 200
        assert_eq!(matches.total_ideal, 500);
        assert_eq!(matches.alpha, 4_000);
        assert_eq!(matches.get(1).unwrap().scaled, 120);
        assert_eq!(matches.get(2).unwrap().scaled, 80);
        assert!(matches.get(3).is_none());
        assert!(matches.total_scaled() <= 200);
    }

    #[test]
    fn eligible_project_without_contributions_is_listed() {
        let matches = compute_matches(100, &[1, 2], &[contribution(1, 4, 1)]);
        assert_eq!(matches.get(2).unwrap().ideal, 0);
        assert_eq!(matches.get(2).unwrap().contributed, 0);
    }

    #[test]
    fn duplicate_eligible_ids_are_matched_once() {
        let contributions = vec![contribution(1, 25, 1), contribution(1, 25, 2)];

        let matches = compute_matches(1_000, &[1, 1, 2, 1], &contributions);
        assert_eq!(matches.matches.len(), 2);
        assert_eq!(matches.matches[0].project_id, 1);
        assert_eq!(matches.matches[1].project_id, 2);

        // (2 * 5)^2 - 50 = 50, counted once
        assert_eq!(matches.total_ideal, 50);
        assert_eq!(matches.total_scaled(), 50);
    }

    #[test]
    fn huge_contributions_saturate() {
        let contributions = vec![
            contribution(1, Balance::MAX, 1),
            contribution(1, 1, 2),
            contribution(2, Balance::MAX / 2, 3),
            contribution(2, Balance::MAX / 2, 4),
            contribution(2, Balance::MAX / 2, 5),
        ];

        let matches = compute_matches(Balance::MAX, &[1, 2], &contributions);
        assert_eq!(matches.get(1).unwrap().contributed, Balance::MAX);
        assert_eq!(matches.get(2).unwrap().contributed, Balance::MAX);
        assert!(matches.total_scaled() <= Balance::MAX);
        assert!(matches.alpha <= ALPHA_ONE);
    }

    #[test]
    fn impact_of_a_new_contributor() {
        // (3 * 5)^2 - 75 = 150 before, (4 * 5)^2 - 100 = 300 after
        assert_eq!(estimate_impact(&[25, 25, 25], 25, ALPHA_ONE), 150);
        assert_eq!(estimate_impact(&[25, 25, 25], 25, 5_000), 75);
        assert_eq!(estimate_impact(&[], 100, ALPHA_ONE), 0);
    }

    #[quickcheck]
    fn scaled_total_never_exceeds_pool(pool: u32, amounts: Vec<(u8, u32)>) -> bool {
        let contributions: Vec<_> = amounts
            .iter()
            .enumerate()
            .map(|(i, (project, amount))| {
                contribution(u32::from(project % 4), Balance::from(*amount), i as u8)
            })
            .collect();

        let matches = compute_matches(Balance::from(pool), &[0, 1, 2, 3], &contributions);
        matches.total_scaled() <= Balance::from(pool)
    }
}
