// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::{
    build_signed_extrinsic, encode_hex, ChainClient, ContractCallRequest, ContractsCall,
    ExtrinsicParams, Weight,
};
use crate::contract::messages::{decode_fallible, decode_return, Message};
use crate::contract::{ContractErr, QfContract};
use crate::primitives::{AccountId, Balance, Contribution, Project, RoundData, UserStats};
use crate::settings::Contract as ContractSettings;
use crate::wallet::Signer;
use async_trait::async_trait;
use log::*;
use scale::{Decode, Encode, Input};
use std::sync::Arc;

/// Set in `ExecReturnValue::flags` when the contract reverted.
const REVERT_FLAG: u32 = 0x1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum StorageDeposit {
    Refund(Balance),
    Charge(Balance),
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ExecReturnValue {
    pub flags: u32,
    pub data: Vec<u8>,
}

impl ExecReturnValue {
    #[must_use]
    pub fn did_revert(&self) -> bool {
        self.flags & REVERT_FLAG != 0
    }
}

/// Outcome of a `ContractsApi_call` dry-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRun {
    pub gas_consumed: Weight,
    pub gas_required: Weight,
    pub storage_deposit: StorageDeposit,
    pub debug_message: Vec<u8>,

    /// Return value, or the name of the dispatch error.
    pub result: Result<ExecReturnValue, String>,
}

/// Reads a `DispatchError` and returns a readable name for it.
fn decode_dispatch_error<I: Input>(input: &mut I) -> Result<String, scale::Error> {
    const NAMES: [&str; 14] = [
        "Other",
        "CannotLookup",
        "BadOrigin",
        "Module",
        "ConsumerRemaining",
        "NoProviders",
        "TooManyConsumers",
        "Token",
        "Arithmetic",
        "Transactional",
        "Exhausted",
        "Corruption",
        "Unavailable",
        "RootNotAllowed",
    ];

    let index = input.read_byte()?;
    let name = NAMES
        .get(usize::from(index))
        .ok_or_else(|| scale::Error::from("unknown DispatchError variant"))?;

    match index {
        // Module { index, error }
        3 => {
            let pallet = input.read_byte()?;
            let mut error = [0u8; 4];
            input.read(&mut error)?;
            Ok(format!("Module {{ index: {pallet}, error: {} }}", error[0]))
        }

        // Token, Arithmetic and Transactional carry a fieldless enum
        7..=9 => {
            let inner = input.read_byte()?;
            Ok(format!("{name}({inner})"))
        }

        _ => Ok((*name).to_owned()),
    }
}

impl Decode for DryRun {
    fn decode<I: Input>(input: &mut I) -> Result<Self, scale::Error> {
        let gas_consumed = Weight::decode(input)?;
        let gas_required = Weight::decode(input)?;
        let storage_deposit = StorageDeposit::decode(input)?;
        let debug_message = Vec::<u8>::decode(input)?;

        let result = match input.read_byte()? {
            0 => Ok(ExecReturnValue::decode(input)?),
            1 => Err(decode_dispatch_error(input)?),
            _ => return Err("invalid result variant".into()),
        };

        // Trailing events are not needed
        Ok(Self {
            gas_consumed,
            gas_required,
            storage_deposit,
            debug_message,
            result,
        })
    }
}

/// The deployed contract, reached through a chain client.
pub struct RpcContract {
    client: Arc<dyn ChainClient>,
    address: AccountId,
    gas_limit: Weight,
    params: ExtrinsicParams,
}

impl RpcContract {
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>, address: AccountId, settings: &ContractSettings) -> Self {
        Self {
            client,
            address,
            gas_limit: Weight::new(settings.gas_ref_time, settings.gas_proof_size),
            params: ExtrinsicParams::from_settings(settings),
        }
    }

    #[must_use]
    pub fn address(&self) -> &AccountId {
        &self.address
    }

    /// Executes `message` without persisting any state change.
    pub async fn dry_run(
        &self,
        origin: &AccountId,
        value: Balance,
        message: &Message,
    ) -> Result<DryRun, ContractErr> {
        let request = ContractCallRequest {
            origin: *origin,
            dest: self.address,
            value,
            gas_limit: Some(self.gas_limit),
            storage_deposit_limit: None,
            input_data: message.encode(),
        };

        let raw = self.client.contract_call(&request).await?;
        let dry_run = DryRun::decode(&mut raw.as_slice())?;

        if !dry_run.debug_message.is_empty() {
            debug!(
                "{}: {}",
                message.label(),
                String::from_utf8_lossy(&dry_run.debug_message)
            );
        }

        Ok(dry_run)
    }

    fn return_data<'a>(message: &Message, dry_run: &'a DryRun) -> Result<&'a [u8], ContractErr> {
        match &dry_run.result {
            Ok(value) => {
                if value.did_revert() {
                    debug!("{} reverted", message.label());
                }
                Ok(&value.data)
            }
            Err(dispatch) => Err(ContractErr::Rejected(format!(
                "Failed to call {}: {dispatch}",
                message.label()
            ))),
        }
    }

    async fn query<T: Decode>(&self, origin: &AccountId, message: Message) -> Result<T, ContractErr> {
        let dry_run = self.dry_run(origin, 0, &message).await?;
        decode_return(Self::return_data(&message, &dry_run)?)
    }

    async fn query_fallible<T: Decode>(
        &self,
        origin: &AccountId,
        message: Message,
    ) -> Result<T, ContractErr> {
        let dry_run = self.dry_run(origin, 0, &message).await?;
        decode_fallible(Self::return_data(&message, &dry_run)?)
    }

    /// Dry-runs `message` and, when it succeeds, submits it signed by `signer`
    /// with the gas the dry-run required. Returns the dry-run's return value.
    async fn submit<T: Decode>(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        value: Balance,
        message: Message,
    ) -> Result<T, ContractErr> {
        if signer.public() != *origin {
            return Err(ContractErr::Rejected(
                "Signer does not match the calling account".to_owned(),
            ));
        }

        let dry_run = self.dry_run(origin, value, &message).await?;
        let returned = decode_fallible::<T>(Self::return_data(&message, &dry_run)?)?;

        let storage_deposit_limit = match dry_run.storage_deposit {
            StorageDeposit::Charge(amount) => Some(amount),
            StorageDeposit::Refund(_) => None,
        };

        let call = ContractsCall {
            dest: self.address,
            value,
            gas_limit: dry_run.gas_required,
            storage_deposit_limit,
            data: message.encode(),
        };

        let ctx = self.client.runtime_context(origin).await?;
        let extrinsic =
            build_signed_extrinsic(&call.encode_call(&self.params), signer, &ctx, &self.params);
        let hash = self.client.submit_extrinsic(&extrinsic).await?;

        info!("Submitted {} in {}", message.label(), encode_hex(&hash));
        Ok(returned)
    }
}

#[async_trait]
impl QfContract for RpcContract {
    async fn check_compatibility(&self) -> Result<(), ContractErr> {
        let message = Message::GetProject { project_id: 0 };

        match self.query::<Option<Project>>(&self.address, message).await {
            Ok(_) => Ok(()),
            Err(ContractErr::Chain(err)) => Err(ContractErr::Chain(err)),
            Err(ContractErr::NotConnected) => Err(ContractErr::NotConnected),
            Err(err) => {
                warn!("Compatibility check failed: {err}");
                Err(ContractErr::Incompatible(self.address.to_string()))
            }
        }
    }

    async fn add_project(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        wallet: &AccountId,
    ) -> Result<u32, ContractErr> {
        let message = Message::AddProject {
            project_wallet: *wallet,
        };
        self.submit(origin, signer, 0, message).await
    }

    async fn create_round(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        matching_pool: Balance,
        eligible_projects: &[u32],
        duration_hours: u64,
    ) -> Result<u32, ContractErr> {
        let message = Message::CreateRound {
            matching_pool,
            eligible_projects: eligible_projects.to_vec(),
            duration_hours,
        };
        self.submit(origin, signer, 0, message).await
    }

    async fn contribute(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        round_id: u32,
        project_id: u32,
        value: Balance,
    ) -> Result<(), ContractErr> {
        let message = Message::Contribute {
            round_id,
            project_id,
        };
        self.submit(origin, signer, value, message).await
    }

    async fn distribute_matching_funds(
        &self,
        origin: &AccountId,
        signer: &dyn Signer,
        round_id: u32,
    ) -> Result<(), ContractErr> {
        let message = Message::DistributeMatchingFunds { round_id };
        self.submit(origin, signer, 0, message).await
    }

    async fn get_round_data(
        &self,
        origin: &AccountId,
        round_id: u32,
    ) -> Result<RoundData, ContractErr> {
        self.query_fallible(origin, Message::GetRoundData { round_id })
            .await
    }

    async fn get_project(
        &self,
        origin: &AccountId,
        project_id: u32,
    ) -> Result<Option<Project>, ContractErr> {
        self.query(origin, Message::GetProject { project_id }).await
    }

    async fn get_user_stats(
        &self,
        origin: &AccountId,
        user: &AccountId,
    ) -> Result<UserStats, ContractErr> {
        self.query(origin, Message::GetUserStats { user_address: *user })
            .await
    }

    async fn get_user_contributions(
        &self,
        origin: &AccountId,
        user: &AccountId,
    ) -> Result<Vec<Contribution>, ContractErr> {
        self.query(origin, Message::GetUserContributions { user_address: *user })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainErr, MemoryChain};
    use crate::contract::messages::LangError;
    use crate::network::{network_by_id, WESTEND};
    use crate::primitives::Round;
    use crate::wallet::Sr25519Signer;

    fn dry_run_bytes(flags: u32, data: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::new();
        Weight::new(10, 20).encode_to(&mut out);
        Weight::new(30, 40).encode_to(&mut out);
        StorageDeposit::Charge(500).encode_to(&mut out);
        b"hello".to_vec().encode_to(&mut out);
        0u8.encode_to(&mut out);
        ExecReturnValue { flags, data }.encode_to(&mut out);

        // events: None
        0u8.encode_to(&mut out);
        out
    }

    fn contract() -> (Arc<MemoryChain>, RpcContract) {
        let chain = Arc::new(MemoryChain::new(network_by_id(WESTEND).unwrap()));
        let contract = RpcContract::new(chain.clone(), AccountId([7; 32]), &ContractSettings::default());
        (chain, contract)
    }

    #[test]
    fn it_decodes_dispatch_errors() {
        let mut out = Vec::new();
        Weight::default().encode_to(&mut out);
        Weight::default().encode_to(&mut out);
        StorageDeposit::Refund(0).encode_to(&mut out);
        Vec::<u8>::new().encode_to(&mut out);
        out.extend_from_slice(&[1, 3, 40, 9, 0, 0, 0]);

        let dry_run = DryRun::decode(&mut out.as_slice()).unwrap();
        assert_eq!(dry_run.result, Err("Module { index: 40, error: 9 }".to_owned()));
    }

    #[tokio::test]
    async fn queries_decode_the_return_value() {
        let (chain, contract) = contract();
        let stats = UserStats {
            total_contributed: 5,
            projects_supported: vec![1],
            rounds_participated: vec![2],
        };
        let ret: Result<UserStats, LangError> = Ok(stats.clone());
        chain.push_call_response(Ok(dry_run_bytes(0, ret.encode())));

        let origin = AccountId([1; 32]);
        let user = AccountId([2; 32]);
        assert_eq!(contract.get_user_stats(&origin, &user).await.unwrap(), stats);

        let calls = chain.calls();
        assert_eq!(calls[0].origin, origin);
        assert_eq!(calls[0].dest, AccountId([7; 32]));
        assert_eq!(&calls[0].input_data[..4], &crate::contract::messages::selector("get_user_stats"));
        assert!(chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn reverted_messages_surface_contract_errors() {
        let (chain, contract) = contract();
        let ret: Result<Result<RoundData, String>, LangError> =
            Ok(Err("Round does not exist".to_owned()));
        chain.push_call_response(Ok(dry_run_bytes(REVERT_FLAG, ret.encode())));

        assert_eq!(
            contract.get_round_data(&AccountId([1; 32]), 9).await,
            Err(ContractErr::RoundNotFound)
        );
    }

    #[tokio::test]
    async fn submissions_use_dry_run_results() {
        let (chain, contract) = contract();
        let signer = Sr25519Signer::generate();
        let ret: Result<Result<u32, String>, LangError> = Ok(Ok(4));
        chain.push_call_response(Ok(dry_run_bytes(0, ret.encode())));

        let id = contract
            .add_project(&signer.public(), &signer, &AccountId([3; 32]))
            .await
            .unwrap();
        assert_eq!(id, 4);
        assert_eq!(chain.submitted().len(), 1);
    }

    #[tokio::test]
    async fn matching_pool_is_sent_in_base_units() {
        let (chain, contract) = contract();
        let signer = Sr25519Signer::generate();
        let ret: Result<Result<u32, String>, LangError> = Ok(Ok(1));
        chain.push_call_response(Ok(dry_run_bytes(0, ret.encode())));

        let pool: Balance = 12_345_678_900;
        contract
            .create_round(&signer.public(), &signer, pool, &[1, 2], 24)
            .await
            .unwrap();

        let calls = chain.calls();
        let mut args = &calls[0].input_data[4..];
        assert_eq!(Balance::decode(&mut args).unwrap(), pool);
        assert_eq!(Vec::<u32>::decode(&mut args).unwrap(), vec![1, 2]);
        assert_eq!(u64::decode(&mut args).unwrap(), 24);
    }

    #[tokio::test]
    async fn failing_dry_run_is_not_submitted() {
        let (chain, contract) = contract();
        let signer = Sr25519Signer::generate();
        let ret: Result<Result<(), String>, LangError> =
            Ok(Err("Contribution below minimum amount".to_owned()));
        chain.push_call_response(Ok(dry_run_bytes(REVERT_FLAG, ret.encode())));

        let result = contract
            .contribute(&signer.public(), &signer, 1, 1, 0)
            .await;
        assert_eq!(result, Err(ContractErr::BelowMinimum));
        assert!(chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn signer_must_match_origin() {
        let (_, contract) = contract();
        let signer = Sr25519Signer::generate();
        let result = contract
            .distribute_matching_funds(&AccountId([1; 32]), &signer, 1)
            .await;
        assert!(matches!(result, Err(ContractErr::Rejected(_))));
    }

    #[tokio::test]
    async fn compatibility_requires_a_decodable_answer() {
        let (chain, contract) = contract();
        let ok: Result<Option<Project>, LangError> = Ok(None);
        chain.push_call_response(Ok(dry_run_bytes(0, ok.encode())));
        assert!(contract.check_compatibility().await.is_ok());

        chain.push_call_response(Ok(dry_run_bytes(0, vec![9, 9])));
        assert!(matches!(
            contract.check_compatibility().await,
            Err(ContractErr::Incompatible(_))
        ));

        chain.push_call_response(Err(ChainErr::Timeout));
        assert_eq!(
            contract.check_compatibility().await,
            Err(ContractErr::Chain(ChainErr::Timeout))
        );
    }

    #[test]
    fn round_layout_matches_the_contract() {
        let round = Round {
            round_id: 1,
            matching_pool: 2,
            eligible_projects: vec![3],
            start_time: 4,
            end_time: 5,
            active: true,
            final_alpha: None,
            is_finalized: false,
        };

        // u32, u128, vec, u64, u64, bool, option, bool
        assert_eq!(round.encode().len(), 4 + 16 + 5 + 8 + 8 + 1 + 1 + 1);
    }
}
