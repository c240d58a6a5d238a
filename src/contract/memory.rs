// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::contract::qf::compute_matches;
use crate::contract::{ContractErr, QfContract};
use crate::primitives::{
    AccountId, Balance, Contribution, Project, ProjectMatch, Round, RoundData, Timestamp,
    UserStats,
};
use crate::wallet::Signer;
use async_trait::async_trait;
use log::*;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Source of the current unix time in seconds.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

#[must_use]
pub fn system_clock() -> Clock {
    Arc::new(|| u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0))
}

#[derive(Debug, Default)]
struct State {
    projects: BTreeMap<u32, Project>,
    rounds: BTreeMap<u32, Round>,
    contributions: Vec<Contribution>,
    payouts: BTreeMap<AccountId, Balance>,
    next_project_id: u32,
    next_round_id: u32,
}

impl State {
    fn round_contributions(&self, round_id: u32) -> Vec<Contribution> {
        self.contributions
            .iter()
            .filter(|c| c.round_id == round_id)
            .cloned()
            .collect()
    }
}

/// In-process funding contract enforcing the same rules as the deployed one.
pub struct MemoryContract {
    admin: AccountId,
    min_contribution: Balance,
    clock: Clock,
    state: Mutex<State>,
}

impl MemoryContract {
    #[must_use]
    pub fn new(admin: AccountId, min_contribution: Balance, clock: Clock) -> Self {
        Self {
            admin,
            min_contribution,
            clock,
            state: Mutex::new(State {
                next_project_id: 1,
                next_round_id: 1,
                ..State::default()
            }),
        }
    }

    #[must_use]
    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    /// Loads existing state as is, bypassing the contract rules.
    pub fn seed(&self, projects: Vec<Project>, rounds: Vec<Round>, contributions: Vec<Contribution>) {
        let mut state = self.state.lock();

        for project in projects {
            state.next_project_id = state.next_project_id.max(project.project_id + 1);
            state.projects.insert(project.project_id, project);
        }

        for round in rounds {
            state.next_round_id = state.next_round_id.max(round.round_id + 1);
            state.rounds.insert(round.round_id, round);
        }

        state.contributions.extend(contributions);
        debug!(
            "Seeded {} projects, {} rounds and {} contributions",
            state.projects.len(),
            state.rounds.len(),
            state.contributions.len()
        );
    }

    /// Matching funds paid out to `wallet` so far.
    #[must_use]
    pub fn payout(&self, wallet: &AccountId) -> Balance {
        self.state.lock().payouts.get(wallet).copied().unwrap_or(0)
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    fn authorize(origin: &AccountId, signer: &dyn Signer) -> Result<(), ContractErr> {
        if signer.public() == *origin {
            Ok(())
        } else {
            Err(ContractErr::Rejected(
                "Signer does not match the calling account".to_owned(),
            ))
        }
    }

    fn ensure_admin(&self, origin: &AccountId) -> Result<(), ContractErr> {
        if *origin == self.admin {
            Ok(())
        } else {
            Err(ContractErr::NotAdmin)
        }
    }

    fn round_data(state: &State, round: &Round) -> RoundData {
        let contributions = state.round_contributions(round.round_id);
        let matches = compute_matches(round.matching_pool, &round.eligible_projects, &contributions);
        let alpha = round.final_alpha.unwrap_or(matches.alpha);

        let projects: Vec<ProjectMatch> = round
            .eligible_projects
            .iter()
            .filter_map(|id| state.projects.get(id))
            .map(|project| {
                let result = matches.get(project.project_id);
                let ideal = result.map_or(0, |m| m.ideal);
                let contributed = result.map_or(0, |m| m.contributed);
                let scaled = crate::contract::qf::scaled_match(ideal, alpha);

                ProjectMatch {
                    project: project.clone(),
                    ideal_match: Some(ideal),
                    scaled_match: Some(scaled),
                    total_funding: Some(contributed.saturating_add(scaled)),
                }
            })
            .collect();

        let distributed = projects
            .iter()
            .filter_map(|p| p.scaled_match)
            .fold(0, Balance::saturating_add);

        RoundData {
            round_info: round.clone(),
            projects,
            contributions,
            current_alpha: Some(alpha),
            total_matching_available: Some(round.matching_pool.saturating_sub(distributed)),
        }
    }
}

#[async_trait]
impl QfContract for MemoryContract {
    async fn check_compatibility(&self) -> Result<(), ContractErr> {
        Ok(())
    }

    async fn add_project(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        wallet: &AccountId,
    ) -> Result<u32, ContractErr> {
        Self::authorize(origin, signer)?;
        self.ensure_admin(origin)?;

        let mut state = self.state.lock();
        let project_id = state.next_project_id;
        state.projects.insert(
            project_id,
            Project {
                project_id,
                wallet_address: *wallet,
                total_contributions: 0,
                contributor_count: 0,
            },
        );
        state.next_project_id += 1;

        info!("Added project {project_id} paying out to {wallet}");
        Ok(project_id)
    }

    async fn create_round(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        matching_pool: Balance,
        eligible_projects: &[u32],
        duration_hours: u64,
    ) -> Result<u32, ContractErr> {
        Self::authorize(origin, signer)?;
        self.ensure_admin(origin)?;

        let mut state = self.state.lock();
        if eligible_projects
            .iter()
            .any(|id| !state.projects.contains_key(id))
        {
            return Err(ContractErr::ProjectNotFound);
        }

        let start_time = self.now();
        let round_id = state.next_round_id;
        state.rounds.insert(
            round_id,
            Round {
                round_id,
                matching_pool,
                eligible_projects: eligible_projects.to_vec(),
                start_time,
                end_time: start_time.saturating_add(duration_hours.saturating_mul(3_600)),
                active: true,
                final_alpha: None,
                is_finalized: false,
            },
        );
        state.next_round_id += 1;

        info!("Created round {round_id} with {} projects", eligible_projects.len());
        Ok(round_id)
    }

    async fn contribute(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        round_id: u32,
        project_id: u32,
        value: Balance,
    ) -> Result<(), ContractErr> {
        Self::authorize(origin, signer)?;

        if value < self.min_contribution {
            return Err(ContractErr::BelowMinimum);
        }

        let now = self.now();
        let mut state = self.state.lock();
        let round = state.rounds.get(&round_id).ok_or(ContractErr::RoundNotFound)?;

        if !round.active {
            return Err(ContractErr::RoundInactive);
        }

        if now < round.start_time || now > round.end_time {
            return Err(ContractErr::OutsideRoundWindow);
        }

        if !round.is_eligible(project_id) {
            return Err(ContractErr::NotEligible);
        }

        let is_new_contributor = !state
            .contributions
            .iter()
            .any(|c| c.contributor == *origin && c.project_id == project_id);

        let project = state
            .projects
            .get_mut(&project_id)
            .ok_or(ContractErr::ProjectNotFound)?;

        if is_new_contributor {
            project.contributor_count += 1;
        }
        project.total_contributions = project.total_contributions.saturating_add(value);

        state.contributions.push(Contribution {
            amount: value,
            contributor: *origin,
            project_id,
            round_id,
            timestamp: now,
        });

        debug!("{origin} contributed {value} to project {project_id} in round {round_id}");
        Ok(())
    }

    async fn distribute_matching_funds(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        round_id: u32,
    ) -> Result<(), ContractErr> {
        Self::authorize(origin, signer)?;
        self.ensure_admin(origin)?;

        let now = self.now();
        let mut state = self.state.lock();
        let round = state
            .rounds
            .get(&round_id)
            .cloned()
            .ok_or(ContractErr::RoundNotFound)?;

        if round.is_finalized {
            return Err(ContractErr::AlreadyFinalized);
        }

        if now <= round.end_time {
            return Err(ContractErr::RoundStillOpen);
        }

        let contributions = state.round_contributions(round_id);
        let matches = compute_matches(round.matching_pool, &round.eligible_projects, &contributions);

        for result in &matches.matches {
            let wallet = match state.projects.get(&result.project_id) {
                Some(project) => project.wallet_address,
                None => continue,
            };

            let payout = state.payouts.entry(wallet).or_insert(0);
            *payout = payout.saturating_add(result.scaled);
        }

        if let Some(round) = state.rounds.get_mut(&round_id) {
            round.final_alpha = Some(matches.alpha);
            round.is_finalized = true;
            round.active = false;
        }

        info!(
            "Finalized round {round_id} with alpha {} distributing {}",
            matches.alpha,
            matches.total_scaled()
        );
        Ok(())
    }

    async fn get_round_data(
        &self,
        _origin: &AccountId,
        round_id: u32,
    ) -> Result<RoundData, ContractErr> {
        let state = self.state.lock();
        let round = state.rounds.get(&round_id).ok_or(ContractErr::RoundNotFound)?;
        Ok(Self::round_data(&state, round))
    }

    async fn get_project(
        &self,
        _origin: &AccountId,
        project_id: u32,
    ) -> Result<Option<Project>, ContractErr> {
        Ok(self.state.lock().projects.get(&project_id).cloned())
    }

    async fn get_user_stats(
        &self,
        _origin: &AccountId,
        user: &AccountId,
    ) -> Result<UserStats, ContractErr> {
        let state = self.state.lock();
        let mut stats = UserStats::default();

        for contribution in state.contributions.iter().filter(|c| c.contributor == *user) {
            stats.total_contributed = stats.total_contributed.saturating_add(contribution.amount);

            if !stats.projects_supported.contains(&contribution.project_id) {
                stats.projects_supported.push(contribution.project_id);
            }

            if !stats.rounds_participated.contains(&contribution.round_id) {
                stats.rounds_participated.push(contribution.round_id);
            }
        }

        Ok(stats)
    }

    async fn get_user_contributions(
        &self,
        _origin: &AccountId,
        user: &AccountId,
    ) -> Result<Vec<Contribution>, ContractErr> {
        Ok(self
            .state
            .lock()
            .contributions
            .iter()
            .filter(|c| c.contributor == *user)
            .cloned()
            .collect())
    }
}
