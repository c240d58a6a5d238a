// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::{
    blake2_256, ChainClient, ChainErr, ChainInfo, Connector, ContractCallRequest, Hash,
    RuntimeContext,
};
use crate::network::{ChainType, NetworkConfig};
use crate::primitives::{AccountId, Balance};
use async_trait::async_trait;
use log::*;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Node replacement used in demo mode and tests.
pub struct MemoryChain {
    network: &'static NetworkConfig,
    balances: RwLock<HashMap<AccountId, Balance>>,
    nonces: RwLock<HashMap<AccountId, u32>>,
    call_responses: Mutex<VecDeque<Result<Vec<u8>, ChainErr>>>,
    calls: Mutex<Vec<ContractCallRequest>>,
    submitted: Mutex<Vec<Vec<u8>>>,
    connected: AtomicBool,
    failing_balance: AtomicBool,
    live: Arc<AtomicUsize>,
}

impl MemoryChain {
    #[must_use]
    pub fn new(network: &'static NetworkConfig) -> Self {
        Self::with_live_counter(network, Arc::new(AtomicUsize::new(0)))
    }

    fn with_live_counter(network: &'static NetworkConfig, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);

        Self {
            network,
            balances: RwLock::new(HashMap::new()),
            nonces: RwLock::new(HashMap::new()),
            call_responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            failing_balance: AtomicBool::new(false),
            live,
        }
    }

    pub fn set_balance(&self, account: AccountId, balance: Balance) {
        self.balances.write().insert(account, balance);
    }

    /// Makes every following balance query fail.
    pub fn fail_balance_queries(&self, fail: bool) {
        self.failing_balance.store(fail, Ordering::SeqCst);
    }

    /// Queues the raw result of the next `contract_call`.
    pub fn push_call_response(&self, response: Result<Vec<u8>, ChainErr>) {
        self.call_responses.lock().push_back(response);
    }

    /// Dry-run requests received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ContractCallRequest> {
        self.calls.lock().clone()
    }

    /// Extrinsics received so far.
    #[must_use]
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().clone()
    }

    fn ensure_connected(&self) -> Result<(), ChainErr> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChainErr::NotConnected)
        }
    }
}

#[async_trait]
impl ChainClient for MemoryChain {
    async fn chain_info(&self) -> Result<ChainInfo, ChainErr> {
        self.ensure_connected()?;
        let chain_type = match self.network.chain_type {
            ChainType::Testnet => "Development",
            ChainType::Mainnet => "Live",
        };

        Ok(ChainInfo {
            chain: format!("{} (demo)", self.network.name),
            chain_type: chain_type.to_owned(),
            ss58_format: self.network.ss58_format,
        })
    }

    async fn free_balance(&self, account: &AccountId) -> Result<Balance, ChainErr> {
        self.ensure_connected()?;
        if self.failing_balance.load(Ordering::SeqCst) {
            return Err(ChainErr::Timeout);
        }

        Ok(self.balances.read().get(account).copied().unwrap_or(0))
    }

    async fn runtime_context(&self, account: &AccountId) -> Result<RuntimeContext, ChainErr> {
        self.ensure_connected()?;
        Ok(RuntimeContext {
            genesis_hash: blake2_256(self.network.id.as_bytes()),
            spec_version: 1,
            transaction_version: 1,
            nonce: self.nonces.read().get(account).copied().unwrap_or(0),
        })
    }

    async fn contract_call(&self, request: &ContractCallRequest) -> Result<Vec<u8>, ChainErr> {
        self.ensure_connected()?;
        self.calls.lock().push(request.clone());
        self.call_responses.lock().pop_front().unwrap_or_else(|| {
            Err(ChainErr::Rpc {
                code: -32000,
                message: "no contract deployed on the demo chain".to_owned(),
            })
        })
    }

    async fn submit_extrinsic(&self, extrinsic: &[u8]) -> Result<Hash, ChainErr> {
        self.ensure_connected()?;
        self.submitted.lock().push(extrinsic.to_vec());
        Ok(blake2_256(extrinsic))
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.live.fetch_sub(1, Ordering::SeqCst);
            debug!("Disconnected from {}", self.network.name);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Hands out [`MemoryChain`]s and tracks how many are connected at once.
#[derive(Default)]
pub struct MemoryConnector {
    live: Arc<AtomicUsize>,
    peak: AtomicUsize,
    failing: RwLock<Vec<&'static str>>,
    last: RwLock<Option<Arc<MemoryChain>>>,
    balances: RwLock<HashMap<AccountId, Balance>>,
}

impl MemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections to `network_id` fail from now on.
    pub fn fail_network(&self, network_id: &'static str) {
        self.failing.write().push(network_id);
    }

    /// Balance given to `account` on every chain created afterwards.
    pub fn set_balance(&self, account: AccountId, balance: Balance) {
        self.balances.write().insert(account, balance);
    }

    /// Number of chains currently connected.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of chains ever connected at the same time.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// The most recently created chain.
    #[must_use]
    pub fn last(&self) -> Option<Arc<MemoryChain>> {
        self.last.read().clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        network: &'static NetworkConfig,
    ) -> Result<Arc<dyn ChainClient>, ChainErr> {
        if self.failing.read().contains(&network.id) {
            return Err(ChainErr::Transport(format!(
                "unable to reach {}",
                network.endpoint
            )));
        }

        let chain = Arc::new(MemoryChain::with_live_counter(network, self.live.clone()));
        for (account, balance) in self.balances.read().iter() {
            chain.set_balance(*account, *balance);
        }

        self.peak.fetch_max(self.live(), Ordering::SeqCst);
        *self.last.write() = Some(chain.clone());
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{network_by_id, KUSAMA};

    #[tokio::test]
    async fn it_serves_balances() {
        let chain = MemoryChain::new(network_by_id(KUSAMA).unwrap());
        let alice = AccountId([1; 32]);
        chain.set_balance(alice, 42);
        assert_eq!(chain.free_balance(&alice).await.unwrap(), 42);
        assert_eq!(chain.free_balance(&AccountId([2; 32])).await.unwrap(), 0);

        chain.fail_balance_queries(true);
        assert_eq!(chain.free_balance(&alice).await, Err(ChainErr::Timeout));
    }

    #[tokio::test]
    async fn it_replays_queued_call_responses() {
        let chain = MemoryChain::new(network_by_id(KUSAMA).unwrap());
        chain.push_call_response(Ok(vec![1, 2, 3]));
        let request = ContractCallRequest {
            origin: AccountId([1; 32]),
            dest: AccountId([2; 32]),
            value: 0,
            gas_limit: None,
            storage_deposit_limit: None,
            input_data: vec![],
        };

        assert_eq!(chain.contract_call(&request).await.unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            chain.contract_call(&request).await,
            Err(ChainErr::Rpc { .. })
        ));
        assert_eq!(chain.calls().len(), 2);
    }

    #[tokio::test]
    async fn disconnect_is_counted_once() {
        let connector = MemoryConnector::new();
        let client = connector.connect(network_by_id(KUSAMA).unwrap()).await.unwrap();
        assert_eq!(connector.live(), 1);

        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(connector.live(), 0);
        assert!(!client.is_connected());
        assert_eq!(client.chain_info().await, Err(ChainErr::NotConnected));
    }

    #[tokio::test]
    async fn failing_networks_refuse_connections() {
        let connector = MemoryConnector::new();
        connector.fail_network(KUSAMA);
        assert!(connector.connect(network_by_id(KUSAMA).unwrap()).await.is_err());
        assert_eq!(connector.live(), 0);
    }
}
