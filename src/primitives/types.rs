// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::{AccountId, Balance};
use scale::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point representation of `1.0` used by the matching scale factor.
pub const ALPHA_ONE: u32 = 10_000;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// A time-boxed funding period with a fixed matching pool.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Round {
    pub round_id: u32,
    pub matching_pool: Balance,
    pub eligible_projects: Vec<u32>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub active: bool,

    /// Matching scale factor, `10_000 = 1.0`. Set on finalization.
    pub final_alpha: Option<u32>,
    pub is_finalized: bool,
}

impl Round {
    /// Classifies the round relative to `now`.
    ///
    /// A finalized round is always `Finalized`, and a round past its end time
    /// is never `Active` regardless of its `active` flag.
    #[must_use]
    pub fn status(&self, now: Timestamp) -> RoundStatus {
        if self.is_finalized {
            RoundStatus::Finalized
        } else if now > self.end_time {
            RoundStatus::Ended
        } else if now >= self.start_time {
            RoundStatus::Active
        } else {
            RoundStatus::Upcoming
        }
    }

    #[must_use]
    pub fn time_remaining(&self, now: Timestamp) -> u64 {
        self.end_time.saturating_sub(now)
    }

    #[must_use]
    pub fn is_eligible(&self, project_id: u32) -> bool {
        self.eligible_projects.contains(&project_id)
    }

    /// Returns the matching factor as a float for display, if finalized.
    #[must_use]
    pub fn alpha_ratio(&self) -> Option<f64> {
        self.final_alpha
            .map(|alpha| f64::from(alpha) / f64::from(ALPHA_ONE))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Upcoming,
    Active,
    Ended,
    Finalized,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Finalized => "finalized",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Project {
    pub project_id: u32,

    /// Payout destination for contributions and matching funds.
    pub wallet_address: AccountId,
    pub total_contributions: Balance,
    pub contributor_count: u32,
}

/// A project as reported inside round data, with its matching figures.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ProjectMatch {
    pub project: Project,
    pub ideal_match: Option<Balance>,
    pub scaled_match: Option<Balance>,
    pub total_funding: Option<Balance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Contribution {
    pub amount: Balance,
    pub contributor: AccountId,
    pub project_id: u32,
    pub round_id: u32,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct RoundData {
    pub round_info: Round,
    pub projects: Vec<ProjectMatch>,
    pub contributions: Vec<Contribution>,
    pub current_alpha: Option<u32>,
    pub total_matching_available: Option<Balance>,
}

impl RoundData {
    /// Sum of all contributions made in the round.
    #[must_use]
    pub fn total_contributed(&self) -> Balance {
        self.contributions
            .iter()
            .map(|c| c.amount)
            .fold(0, Balance::saturating_add)
    }

    /// Number of distinct accounts which contributed in the round.
    #[must_use]
    pub fn unique_contributors(&self) -> usize {
        let mut seen: Vec<&AccountId> = self.contributions.iter().map(|c| &c.contributor).collect();
        seen.sort();
        seen.dedup();
        seen.len()
    }

    /// Contributions for a single project, in submission order.
    pub fn contributions_for(&self, project_id: u32) -> impl Iterator<Item = &Contribution> {
        self.contributions
            .iter()
            .filter(move |c| c.project_id == project_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct UserStats {
    pub total_contributed: Balance,
    pub projects_supported: Vec<u32>,
    pub rounds_participated: Vec<u32>,
}

/// Formats a duration in seconds as `"{d}d {h}h"`, `"{h}h {m}m"` or `"{m}m"`.
#[must_use]
pub fn format_time_remaining(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
