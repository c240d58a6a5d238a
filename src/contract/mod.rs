// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! The quadratic funding contract.
//!
//! [`QfContract`] is implemented by [`RpcContract`], which talks to the
//! deployed ink! contract through a [`ChainClient`](crate::chain::ChainClient),
//! and by [`MemoryContract`], which runs the same rules in process.

mod memory;
pub mod messages;
pub mod qf;
mod rpc;
mod service;

pub use crate::contract::memory::*;
pub use crate::contract::rpc::*;
pub use crate::contract::service::*;

use crate::chain::ChainErr;
use crate::primitives::{AccountId, Balance, Contribution, Project, RoundData, UserStats};
use crate::wallet::Signer;
use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractErr {
    /// Only the admin may call this message
    NotAdmin,

    RoundNotFound,

    ProjectNotFound,

    /// The round has been closed
    RoundInactive,

    /// The round has not started yet or has already ended
    OutsideRoundWindow,

    /// The project is not part of the round
    NotEligible,

    BelowMinimum,

    AlreadyFinalized,

    /// Matching funds can only be distributed after the round ended
    RoundStillOpen,

    /// The contract or runtime refused the call
    Rejected(String),

    /// The contract answered with data we cannot decode
    Decode(String),

    Chain(ChainErr),

    /// No contract is available
    NotConnected,

    /// The account does not hold a compatible contract
    Incompatible(String),
}

impl ContractErr {
    /// Maps an error string returned by the contract to its variant.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        match message {
            m if m.starts_with("Only admin can") => Self::NotAdmin,
            "Round does not exist" => Self::RoundNotFound,
            "Project does not exist" => Self::ProjectNotFound,
            "Round is not active" => Self::RoundInactive,
            "Round is not within active time period" => Self::OutsideRoundWindow,
            "Project is not eligible for this round" => Self::NotEligible,
            "Contribution below minimum amount" => Self::BelowMinimum,
            "Round already finalized" => Self::AlreadyFinalized,
            "Round has not ended yet" => Self::RoundStillOpen,
            other => Self::Rejected(other.to_owned()),
        }
    }
}

impl fmt::Display for ContractErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAdmin => write!(f, "Only admin can perform this action"),
            Self::RoundNotFound => write!(f, "Round does not exist"),
            Self::ProjectNotFound => write!(f, "Project does not exist"),
            Self::RoundInactive => write!(f, "Round is not active"),
            Self::OutsideRoundWindow => write!(f, "Round is not within active time period"),
            Self::NotEligible => write!(f, "Project is not eligible for this round"),
            Self::BelowMinimum => write!(f, "Contribution below minimum amount"),
            Self::AlreadyFinalized => write!(f, "Round already finalized"),
            Self::RoundStillOpen => write!(f, "Round has not ended yet"),
            Self::Rejected(reason) => write!(f, "{reason}"),
            Self::Decode(reason) => write!(f, "Unable to decode contract response: {reason}"),
            Self::Chain(err) => write!(f, "{err}"),
            Self::NotConnected => write!(f, "Contract service error: contract not available"),
            Self::Incompatible(address) => write!(
                f,
                "Contract at {address} is incompatible with the expected interface"
            ),
        }
    }
}

impl std::error::Error for ContractErr {}

impl From<ChainErr> for ContractErr {
    fn from(err: ChainErr) -> Self {
        match err {
            ChainErr::NotConnected => Self::NotConnected,
            other => Self::Chain(other),
        }
    }
}

impl From<scale::Error> for ContractErr {
    fn from(err: scale::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Messages of the funding contract.
///
/// State changing calls are signed by `signer`, which must hold the key of
/// `origin`. Queries only use `origin` as the caller of a dry-run.
#[async_trait]
pub trait QfContract: Send + Sync {
    /// Checks that the contract exists and speaks the expected interface.
    async fn check_compatibility(&self) -> Result<(), ContractErr>;

    /// Registers a project paying out to `wallet`. Returns its id.
    async fn add_project(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        wallet: &AccountId,
    ) -> Result<u32, ContractErr>;

    /// Opens a round starting now. Returns its id.
    async fn create_round(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        matching_pool: Balance,
        eligible_projects: &[u32],
        duration_hours: u64,
    ) -> Result<u32, ContractErr>;

    async fn contribute(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        round_id: u32,
        project_id: u32,
        value: Balance,
    ) -> Result<(), ContractErr>;

    /// Finalizes an ended round and pays out the scaled matches.
    async fn distribute_matching_funds(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        round_id: u32,
    ) -> Result<(), ContractErr>;

    async fn get_round_data(&self, origin: &AccountId, round_id: u32)
        -> Result<RoundData, ContractErr>;

    async fn get_project(
        &self,
        origin: &AccountId,
        project_id: u32,
    ) -> Result<Option<Project>, ContractErr>;

    async fn get_user_stats(
        &self,
        origin: &AccountId,
        user: &AccountId,
    ) -> Result<UserStats, ContractErr>;

    async fn get_user_contributions(
        &self,
        origin: &AccountId,
        user: &AccountId,
    ) -> Result<Vec<Contribution>, ContractErr>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_messages_map_to_variants() {
        assert_eq!(
            ContractErr::from_message("Only admin can add projects"),
            ContractErr::NotAdmin
        );
        assert_eq!(
            ContractErr::from_message("Round is not within active time period"),
            ContractErr::OutsideRoundWindow
        );
        assert_eq!(
            ContractErr::from_message("Something else"),
            ContractErr::Rejected("Something else".to_owned())
        );
    }

    #[test]
    fn display_reproduces_contract_messages() {
        for message in [
            "Round does not exist",
            "Project does not exist",
            "Round is not active",
            "Round is not within active time period",
            "Project is not eligible for this round",
            "Contribution below minimum amount",
            "Round already finalized",
        ] {
            assert_eq!(ContractErr::from_message(message).to_string(), message);
        }
    }

    #[test]
    fn disconnected_chain_means_no_contract() {
        assert_eq!(ContractErr::from(ChainErr::NotConnected), ContractErr::NotConnected);
        assert_eq!(
            ContractErr::from(ChainErr::Timeout),
            ContractErr::Chain(ChainErr::Timeout)
        );
    }
}
