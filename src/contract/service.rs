// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::contract::{ContractErr, QfContract};
use crate::primitives::{
    AccountId, Balance, Contribution, Project, Round, RoundData, RoundStatus, Timestamp,
    UserStats,
};
use crate::wallet::Signer;
use log::*;
use std::sync::Arc;

/// Highest round and project id scanned when listing.
pub const MAX_SCANNED_ID: u32 = 20;

/// Front door to the funding contract used by the views and the CLI.
#[derive(Clone)]
pub struct QfContractService {
    contract: Arc<dyn QfContract>,
    admin: AccountId,
}

impl QfContractService {
    #[must_use]
    pub fn new(contract: Arc<dyn QfContract>, admin: AccountId) -> Self {
        Self { contract, admin }
    }

    /// Verifies the contract is reachable and compatible.
    pub async fn initialize(&self) -> Result<(), ContractErr> {
        self.contract.check_compatibility().await?;
        info!("Contract compatibility check passed");
        Ok(())
    }

    #[must_use]
    pub fn is_admin(&self, account: &AccountId) -> bool {
        *account == self.admin
    }

    #[must_use]
    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    pub async fn add_project(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        wallet: &AccountId,
    ) -> Result<u32, ContractErr> {
        let id = self.contract.add_project(origin, signer, wallet).await?;
        info!("Project {id} added");
        Ok(id)
    }

    pub async fn create_round(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        matching_pool: Balance,
        eligible_projects: &[u32],
        duration_hours: u64,
    ) -> Result<u32, ContractErr> {
        let id = self
            .contract
            .create_round(origin, signer, matching_pool, eligible_projects, duration_hours)
            .await?;
        info!("Round {id} created");
        Ok(id)
    }

    pub async fn contribute(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        round_id: u32,
        project_id: u32,
        value: Balance,
    ) -> Result<(), ContractErr> {
        self.contract
            .contribute(origin, signer, round_id, project_id, value)
            .await
    }

    pub async fn distribute_matching_funds(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        round_id: u32,
    ) -> Result<(), ContractErr> {
        self.contract
            .distribute_matching_funds(origin, signer, round_id)
            .await?;
        info!("Matching funds of round {round_id} distributed");
        Ok(())
    }

    pub async fn get_round_data(
        &self,
        origin: &AccountId,
        round_id: u32,
    ) -> Result<RoundData, ContractErr> {
        self.contract.get_round_data(origin, round_id).await
    }

    pub async fn get_project(
        &self,
        origin: &AccountId,
        project_id: u32,
    ) -> Result<Option<Project>, ContractErr> {
        self.contract.get_project(origin, project_id).await
    }

    pub async fn get_user_stats(
        &self,
        origin: &AccountId,
        user: &AccountId,
    ) -> Result<UserStats, ContractErr> {
        self.contract.get_user_stats(origin, user).await
    }

    pub async fn get_user_contributions(
        &self,
        origin: &AccountId,
        user: &AccountId,
    ) -> Result<Vec<Contribution>, ContractErr> {
        self.contract.get_user_contributions(origin, user).await
    }

    /// Every round, scanning ids from 1 upwards until the first id which
    /// does not exist.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn all_rounds(&self, origin: &AccountId) -> Result<Vec<Round>, ContractErr> {
        let mut rounds = Vec::new();

        for round_id in 1..=MAX_SCANNED_ID {
            match self.contract.get_round_data(origin, round_id).await {
                Ok(data) => rounds.push(data.round_info),
                Err(ContractErr::RoundNotFound) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(rounds)
    }

    /// Rounds currently open for contributions.
    pub async fn all_active_rounds(
        &self,
        origin: &AccountId,
        now: Timestamp,
    ) -> Result<Vec<Round>, ContractErr> {
        let rounds: Vec<_> = self
            .all_rounds(origin)
            .await?
            .into_iter()
            .filter(|round| round.active && round.status(now) == RoundStatus::Active)
            .collect();

        debug!("Found {} active rounds", rounds.len());
        Ok(rounds)
    }

    /// Projects registered in the contract, scanning ids from 1 until the
    /// first missing one.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn load_projects(&self, origin: &AccountId) -> Result<Vec<Project>, ContractErr> {
        let mut projects = Vec::new();

        for project_id in 1..=MAX_SCANNED_ID {
            match self.contract.get_project(origin, project_id).await? {
                Some(project) => projects.push(project),
                None => break,
            }
        }

        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MemoryContract;
    use crate::wallet::Sr25519Signer;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn service() -> (Arc<AtomicU64>, Sr25519Signer, QfContractService) {
        let time = Arc::new(AtomicU64::new(10_000));
        let clock_time = time.clone();
        let admin = Sr25519Signer::generate();
        let contract = MemoryContract::new(
            admin.public(),
            1,
            Arc::new(move || clock_time.load(Ordering::SeqCst)),
        );
        let service = QfContractService::new(Arc::new(contract), admin.public());
        (time, admin, service)
    }

    #[tokio::test]
    async fn admin_is_recognised() {
        let (_, admin, service) = service();
        assert!(service.is_admin(&admin.public()));
        assert!(!service.is_admin(&AccountId([0; 32])));
        assert!(service.initialize().await.is_ok());
    }

    #[tokio::test]
    async fn active_rounds_skip_ended_ones() {
        let (time, admin, service) = service();
        let origin = admin.public();
        let project = service.add_project(&origin, &admin, &origin).await.unwrap();

        service.create_round(&origin, &admin, 10, &[project], 1).await.unwrap();
        time.fetch_add(7_200, Ordering::SeqCst);
        service.create_round(&origin, &admin, 10, &[project], 24).await.unwrap();

        let now = time.load(Ordering::SeqCst);
        let rounds = service.all_active_rounds(&origin, now).await.unwrap();
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].round_id, 2);
        assert_eq!(service.all_rounds(&origin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_rounds_is_empty() {
        let (_, admin, service) = service();
        let rounds = service.all_active_rounds(&admin.public(), 0).await.unwrap();
        assert!(rounds.is_empty());
    }

    #[tokio::test]
    async fn projects_are_loaded_in_order() {
        let (_, admin, service) = service();
        let origin = admin.public();
        for _ in 0..3 {
            service.add_project(&origin, &admin, &origin).await.unwrap();
        }

        let ids: Vec<_> = service
            .load_projects(&origin)
            .await
            .unwrap()
            .iter()
            .map(|p| p.project_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
