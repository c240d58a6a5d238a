// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::context::ChainContext;
use crate::contract::{ContractErr, QfContractService};
use crate::primitives::balance::to_base_units;
use crate::primitives::{AccountId, Balance, Project, Round};
use crate::views::{connected_signer, BannerSlot, CONNECT_WALLET_FIRST};
use crate::wallet::Signer;
use log::*;
use std::sync::Arc;

pub const DEFAULT_ROUND_HOURS: u64 = 168;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminMessage {
    ProjectWalletChanged(String),
    MatchingPoolChanged(String),
    DurationChanged(String),
    ProjectToggled(u32),
}

/// Validated input of the create-round form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRound {
    pub matching_pool: Balance,
    pub eligible_projects: Vec<u32>,
    pub duration_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AdminView {
    project_wallet: String,
    matching_pool: String,
    duration_hours: String,
    eligible_projects: Vec<u32>,
    projects: Vec<Project>,
    rounds: Vec<Round>,
    initialized: bool,
    busy: bool,
    pub banner: BannerSlot,
}

impl Default for AdminView {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminView {
    #[must_use]
    pub fn new() -> Self {
        Self {
            project_wallet: String::new(),
            matching_pool: String::new(),
            duration_hours: DEFAULT_ROUND_HOURS.to_string(),
            eligible_projects: Vec::new(),
            projects: Vec::new(),
            rounds: Vec::new(),
            initialized: false,
            busy: false,
            banner: BannerSlot::default(),
        }
    }

    /// The panel is only shown to the contract admin.
    #[must_use]
    pub fn is_visible(context: &ChainContext) -> bool {
        context.is_admin()
    }

    pub fn update(&mut self, message: AdminMessage) {
        match message {
            AdminMessage::ProjectWalletChanged(wallet) => self.project_wallet = wallet,
            AdminMessage::MatchingPoolChanged(pool) => self.matching_pool = pool,
            AdminMessage::DurationChanged(hours) => self.duration_hours = hours,
            AdminMessage::ProjectToggled(project_id) => {
                if let Some(pos) = self.eligible_projects.iter().position(|id| *id == project_id) {
                    self.eligible_projects.remove(pos);
                } else {
                    self.eligible_projects.push(project_id);
                }
            }
        }
    }

    fn admin_signer(&mut self, context: &ChainContext) -> Option<(AccountId, Arc<dyn Signer>)> {
        if !context.is_admin() {
            self.banner.error(ContractErr::NotAdmin.to_string());
            return None;
        }

        let wallet = connected_signer(context);
        if wallet.is_none() {
            self.banner.error(CONNECT_WALLET_FIRST);
        }
        wallet
    }

    /// Checks the contract once and loads projects and rounds.
    pub async fn load(&mut self, context: &ChainContext, service: &QfContractService) -> Result<(), ContractErr> {
        let origin = match context.selected_account() {
            Some(account) if context.is_admin() => account.address,
            _ => return Ok(()),
        };

        if !self.initialized {
            if let Err(err) = service.initialize().await {
                self.banner.error(err.to_string());
                return Err(err);
            }
            self.initialized = true;
            self.banner.success("Contract ready for use");
        }

        self.busy = true;
        let projects = service.load_projects(&origin).await;
        let rounds = match projects {
            Ok(_) => service.all_rounds(&origin).await,
            Err(ref err) => Err(err.clone()),
        };
        self.busy = false;

        match (projects, rounds) {
            (Ok(projects), Ok(rounds)) => {
                self.projects = projects;
                self.rounds = rounds;
                Ok(())
            }
            (Err(err), _) | (_, Err(err)) => {
                self.banner.error(err.to_string());
                Err(err)
            }
        }
    }

    /// Validates the add-project form.
    pub fn project_wallet(&self) -> Result<AccountId, String> {
        let wallet = self.project_wallet.trim();
        if wallet.is_empty() {
            return Err("Please enter a project wallet address".to_owned());
        }

        wallet
            .parse()
            .map_err(|_| format!("Invalid wallet address: {wallet}"))
    }

    /// Validates the create-round form for a network with `decimals`.
    pub fn new_round(&self, decimals: u32) -> Result<NewRound, String> {
        let matching_pool = match to_base_units(&self.matching_pool, decimals) {
            Ok(0) => return Err("Matching pool must be greater than zero".to_owned()),
            Ok(pool) => pool,
            Err(err) => return Err(err.to_string()),
        };

        if self.eligible_projects.is_empty() {
            return Err("Select at least one eligible project".to_owned());
        }

        let duration_hours = match self.duration_hours.trim().parse::<u64>() {
            Ok(hours) if hours > 0 => hours,
            _ => return Err("Duration must be a positive number of hours".to_owned()),
        };

        let mut eligible_projects = self.eligible_projects.clone();
        eligible_projects.sort_unstable();

        Ok(NewRound {
            matching_pool,
            eligible_projects,
            duration_hours,
        })
    }

    pub async fn add_project(&mut self, context: &ChainContext, service: &QfContractService) -> Result<u32, String> {
        let (origin, signer) = self.admin_signer(context).ok_or_else(|| "Not authorized".to_owned())?;
        let wallet = self.project_wallet().map_err(|err| {
            self.banner.error(err.clone());
            err
        })?;

        self.busy = true;
        let result = service.add_project(&origin, signer.as_ref(), &wallet).await;
        self.busy = false;

        match result {
            Ok(project_id) => {
                self.banner
                    .success(format!("Project added successfully with ID: {project_id}"));
                self.project_wallet.clear();
                self.reload_projects(&origin, service).await;
                Ok(project_id)
            }
            Err(err) => {
                error!("Failed to add project: {err}");
                self.banner.error(err.to_string());
                Err(err.to_string())
            }
        }
    }

    pub async fn create_round(&mut self, context: &ChainContext, service: &QfContractService) -> Result<u32, String> {
        let (origin, signer) = self.admin_signer(context).ok_or_else(|| "Not authorized".to_owned())?;
        let round = self.new_round(context.network().decimals).map_err(|err| {
            self.banner.error(err.clone());
            err
        })?;

        self.busy = true;
        let result = service
            .create_round(
                &origin,
                signer.as_ref(),
                round.matching_pool,
                &round.eligible_projects,
                round.duration_hours,
            )
            .await;
        self.busy = false;

        match result {
            Ok(round_id) => {
                self.banner
                    .success(format!("Round created successfully with ID: {round_id}"));
                self.matching_pool.clear();
                self.eligible_projects.clear();
                self.duration_hours = DEFAULT_ROUND_HOURS.to_string();
                self.reload_rounds(&origin, service).await;
                Ok(round_id)
            }
            Err(err) => {
                error!("Failed to create round: {err}");
                self.banner.error(err.to_string());
                Err(err.to_string())
            }
        }
    }

    pub async fn distribute(
        &mut self,
        context: &ChainContext,
        service: &QfContractService,
        round_id: u32,
    ) -> Result<(), String> {
        let (origin, signer) = self.admin_signer(context).ok_or_else(|| "Not authorized".to_owned())?;

        self.busy = true;
        let result = service
            .distribute_matching_funds(&origin, signer.as_ref(), round_id)
            .await;
        self.busy = false;

        match result {
            Ok(()) => {
                self.banner
                    .success(format!("Matching funds distributed for round {round_id}"));
                self.reload_rounds(&origin, service).await;
                Ok(())
            }
            Err(err) => {
                error!("Failed to distribute round {round_id}: {err}");
                self.banner.error(err.to_string());
                Err(err.to_string())
            }
        }
    }

    async fn reload_projects(&mut self, origin: &AccountId, service: &QfContractService) {
        match service.load_projects(origin).await {
            Ok(projects) => self.projects = projects,
            Err(err) => warn!("Failed to reload projects: {err}"),
        }
    }

    async fn reload_rounds(&mut self, origin: &AccountId, service: &QfContractService) {
        match service.all_rounds(origin).await {
            Ok(rounds) => self.rounds = rounds,
            Err(err) => warn!("Failed to reload rounds: {err}"),
        }
    }

    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    #[must_use]
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    #[must_use]
    pub fn eligible_projects(&self) -> &[u32] {
        &self.eligible_projects
    }

    #[must_use]
    pub fn duration_hours(&self) -> &str {
        &self.duration_hours
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }
}
