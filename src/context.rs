// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Network and account state shared by the views.
//!
//! [`ChainContext`] is the only writer of the chain connection, the wallet
//! selection and the persisted user choices.

use crate::chain::{ChainClient, ChainErr, ChainInfo, ConnectionManager, Connector};
use crate::contract::{ContractErr, QfContractService, RpcContract};
use crate::network::{default_network, network_by_id, NetworkConfig};
use crate::primitives::{format_balance, AccountId};
use crate::settings::{Contract as ContractSettings, SETTINGS};
use crate::storage::{KeyValueStore, SELECTED_ACCOUNT_KEY, SELECTED_NETWORK_KEY};
use crate::wallet::{
    Account, ConnectionWizard, ExtensionRegistry, Signer, WalletErr, WizardMessage, WizardState,
};
use log::*;
use std::fmt;
use std::sync::Arc;

/// Shown when a balance query fails.
pub const ZERO_BALANCE: &str = "0.0000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextErr {
    UnknownNetwork(String),
    Chain(ChainErr),
    Wallet(WalletErr),
}

impl fmt::Display for ContextErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNetwork(_) => write!(f, "Invalid network selected"),
            Self::Chain(err) => write!(f, "{err}"),
            Self::Wallet(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ContextErr {}

impl From<ChainErr> for ContextErr {
    fn from(other: ChainErr) -> Self {
        Self::Chain(other)
    }
}

impl From<WalletErr> for ContextErr {
    fn from(other: WalletErr) -> Self {
        Self::Wallet(other)
    }
}

pub struct ChainContext {
    connections: triomphe::Arc<ConnectionManager>,
    wallets: ExtensionRegistry,
    store: Arc<dyn KeyValueStore>,
    app_name: String,
    admin: Option<AccountId>,

    network: &'static NetworkConfig,
    chain_info: Option<ChainInfo>,
    accounts: Vec<Account>,
    selected: Option<Account>,
    signer: Option<Arc<dyn Signer>>,
    is_wallet_connected: bool,
    balance: Option<String>,
    error: Option<String>,
}

impl ChainContext {
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        wallets: ExtensionRegistry,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let admin = SETTINGS.contract.admin_address.parse().ok();

        Self {
            connections: triomphe::Arc::new(ConnectionManager::new(connector)),
            wallets,
            store,
            app_name: SETTINGS.app.app_name.clone(),
            admin,
            network: default_network(),
            chain_info: None,
            accounts: Vec::new(),
            selected: None,
            signer: None,
            is_wallet_connected: false,
            balance: None,
            error: None,
        }
    }

    /// Overrides the configured admin account.
    #[must_use]
    pub fn with_admin(mut self, admin: AccountId) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Restores the saved network and connects to it.
    pub async fn init(&mut self) -> Result<(), ContextErr> {
        if let Some(saved) = self.store.get(SELECTED_NETWORK_KEY) {
            match network_by_id(&saved) {
                Some(network) => self.network = network,
                None => warn!("Ignoring unknown saved network {saved}"),
            }
        }

        self.connect().await
    }

    async fn connect(&mut self) -> Result<(), ContextErr> {
        let network = self.network;

        match self.connections.switch_network(network).await {
            Ok(connection) => {
                self.chain_info = Some(connection.info.clone());
                self.error = None;
                Ok(())
            }
            Err(err) => {
                error!("Failed to connect to {}: {err}", network.name);
                self.chain_info = None;
                self.error = Some(format!("Failed to connect to {}: {err}", network.name));
                Err(err.into())
            }
        }
    }

    /// Enables the installed wallets and selects an account.
    ///
    /// The previously selected account is restored when the wallet still
    /// exposes it, otherwise the first account is selected.
    pub async fn connect_wallet(&mut self, preferred_source: Option<&str>) -> Result<(), ContextErr> {
        let result = self.load_accounts(preferred_source).await;

        match result {
            Ok(accounts) => {
                self.accounts = accounts;
                self.is_wallet_connected = true;
                self.error = None;
            }
            Err(err) => {
                error!("Failed to connect wallet: {err}");
                self.reset_wallet_state();
                self.error = Some(err.to_string());
                return Err(err.into());
            }
        }

        let saved = self
            .store
            .get(SELECTED_ACCOUNT_KEY)
            .and_then(|address| address.parse::<AccountId>().ok());

        let target = saved
            .and_then(|address| self.accounts.iter().find(|a| a.address == address))
            .or_else(|| self.accounts.first())
            .map(|a| a.address);

        if let Some(address) = target {
            self.select_account(&address).await?;
        }

        Ok(())
    }

    /// Connects `wallet` by walking `wizard` through its steps without user
    /// input, then selects `account` or the restored selection.
    ///
    /// Any failure closes the wizard and leaves the wallet disconnected.
    pub async fn connect_through(
        &mut self,
        wizard: &mut ConnectionWizard,
        wallet: &str,
        account: Option<&AccountId>,
    ) -> Result<(), ContextErr> {
        wizard.update(WizardMessage::Open(self.wallets.detected()));
        wizard.update(WizardMessage::WalletChosen(wallet.to_owned()));
        if !matches!(wizard.state(), WizardState::Connecting { .. }) {
            return Err(self.abort_wizard(wizard, WalletErr::NotInstalled(wallet.to_owned())));
        }

        if let Err(err) = self.connect_wallet(Some(wallet)).await {
            if let ContextErr::Wallet(wallet_err) = &err {
                wizard.update(WizardMessage::ConnectFailed(wallet_err.clone()));
            }
            wizard.update(WizardMessage::Close);
            return Err(err);
        }
        wizard.update(WizardMessage::ConnectSucceeded(self.accounts.clone()));

        let wanted = account
            .copied()
            .or_else(|| self.selected.as_ref().map(|a| a.address));
        if let WizardState::SelectingAccount { accounts, .. } = wizard.state() {
            let picked = wanted.and_then(|w| accounts.iter().find(|a| a.address == w).cloned());
            if let Some(picked) = picked {
                wizard.update(WizardMessage::AccountChosen(picked));
            }
        }

        let chosen = match wizard.state() {
            WizardState::Connected { account: chosen } if wanted.map_or(true, |w| w == chosen.address) => {
                chosen.address
            }
            _ => {
                let reason = match wanted {
                    Some(address) => format!("account {address} is not available"),
                    None => "no account selected".to_owned(),
                };
                return Err(self.abort_wizard(wizard, WalletErr::Rejected(reason)));
            }
        };

        if self.selected.as_ref().map(|a| a.address) != Some(chosen) {
            if let Err(err) = self.select_account(&chosen).await {
                wizard.update(WizardMessage::Close);
                self.reset_wallet_state();
                return Err(err);
            }
        }

        Ok(())
    }

    fn abort_wizard(&mut self, wizard: &mut ConnectionWizard, err: WalletErr) -> ContextErr {
        warn!("Wallet connection aborted: {err}");
        wizard.update(WizardMessage::Close);
        self.reset_wallet_state();
        self.error = Some(err.to_string());
        err.into()
    }

    async fn load_accounts(&self, preferred_source: Option<&str>) -> Result<Vec<Account>, WalletErr> {
        let granted = self.wallets.enable_all(&self.app_name).await?;
        debug!("{granted} wallet extensions granted access");
        self.wallets.accounts(preferred_source).await
    }

    fn reset_wallet_state(&mut self) {
        self.accounts.clear();
        self.selected = None;
        self.signer = None;
        self.is_wallet_connected = false;
        self.balance = None;
    }

    pub fn disconnect_wallet(&mut self) {
        self.reset_wallet_state();
        self.wallets.reset();

        if let Err(err) = self.store.remove(SELECTED_ACCOUNT_KEY) {
            warn!("Could not forget the selected account: {err}");
        }

        info!("Wallet disconnected");
    }

    /// Makes `address` the active account and persists the choice.
    pub async fn select_account(&mut self, address: &AccountId) -> Result<(), ContextErr> {
        let account = self
            .accounts
            .iter()
            .find(|a| a.address == *address)
            .cloned()
            .ok_or_else(|| WalletErr::Rejected(format!("account {address} is not available")))?;

        let signer = match self.wallets.signer_for(&account).await {
            Ok(signer) => signer,
            Err(err) => {
                self.error = Some(err.to_string());
                return Err(err.into());
            }
        };

        if let Err(err) = self.store.set(SELECTED_ACCOUNT_KEY, &account.address.to_string()) {
            warn!("Could not persist the selected account: {err}");
        }

        info!("Selected account {}", account.display_name());
        self.selected = Some(account);
        self.signer = Some(signer);
        self.refresh_balance().await;
        Ok(())
    }

    /// Tears down the current connection and connects to `network_id`.
    pub async fn switch_network(&mut self, network_id: &str) -> Result<(), ContextErr> {
        let network = match network_by_id(network_id) {
            Some(network) => network,
            None => {
                let err = ContextErr::UnknownNetwork(network_id.to_owned());
                self.error = Some(err.to_string());
                return Err(err);
            }
        };

        self.connections.disconnect().await;
        self.chain_info = None;
        self.balance = None;
        self.network = network;

        if let Err(err) = self.store.set(SELECTED_NETWORK_KEY, network.id) {
            warn!("Could not persist the selected network: {err}");
        }

        self.connect().await?;
        self.refresh_balance().await;
        Ok(())
    }

    /// Re-reads the free balance of the selected account.
    pub async fn refresh_balance(&mut self) -> Option<String> {
        let (account, connection) = match (&self.selected, self.connections.current()) {
            (Some(account), Some(connection)) => (account.address, connection),
            _ => {
                self.balance = None;
                return None;
            }
        };

        let balance = match connection.client.free_balance(&account).await {
            Ok(free) => format_balance(free, connection.network.decimals),
            Err(err) => {
                warn!("Failed to fetch balance of {account}: {err}");
                ZERO_BALANCE.to_owned()
            }
        };

        // The network may have changed while the query was in flight
        if !self.connections.is_current(connection.generation) {
            debug!("Dropping balance from a stale connection");
            return self.balance.clone();
        }

        self.balance = Some(balance);
        self.balance.clone()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        match (&self.selected, &self.admin) {
            (Some(account), Some(admin)) => account.address == *admin,
            _ => false,
        }
    }

    /// Contract service backed by the live connection.
    pub fn live_contract(&self, settings: &ContractSettings) -> Result<QfContractService, ContractErr> {
        let client = self.client().ok_or(ContractErr::NotConnected)?;
        let address: AccountId = settings
            .address
            .parse()
            .map_err(|_| ContractErr::Incompatible(settings.address.clone()))?;
        let admin = self.admin.unwrap_or_else(AccountId::zero);

        let contract = RpcContract::new(client, address, settings);
        Ok(QfContractService::new(Arc::new(contract), admin))
    }

    #[must_use]
    pub fn client(&self) -> Option<Arc<dyn ChainClient>> {
        self.connections.current().map(|c| c.client.clone())
    }

    #[must_use]
    pub fn connections(&self) -> triomphe::Arc<ConnectionManager> {
        self.connections.clone()
    }

    #[must_use]
    pub fn network(&self) -> &'static NetworkConfig {
        self.network
    }

    #[must_use]
    pub fn chain_info(&self) -> Option<&ChainInfo> {
        self.chain_info.as_ref()
    }

    #[must_use]
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    #[must_use]
    pub fn selected_account(&self) -> Option<&Account> {
        self.selected.as_ref()
    }

    /// Selected address encoded for the current network.
    #[must_use]
    pub fn selected_address(&self) -> Option<String> {
        self.selected
            .as_ref()
            .map(|a| a.address.to_ss58(self.network.ss58_format))
    }

    #[must_use]
    pub fn signer(&self) -> Option<Arc<dyn Signer>> {
        self.signer.clone()
    }

    #[must_use]
    pub fn is_wallet_connected(&self) -> bool {
        self.is_wallet_connected
    }

    #[must_use]
    pub fn balance(&self) -> Option<&str> {
        self.balance.as_deref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MemoryConnector;
    use crate::network::{ASSET_HUB, KUSAMA, WESTEND};
    use crate::storage::MemoryStore;
    use crate::wallet::tests::StaticExtension;
    use crate::wallet::Sr25519Signer;

    struct Fixture {
        connector: Arc<MemoryConnector>,
        store: Arc<MemoryStore>,
        keys: Vec<(Option<String>, Arc<Sr25519Signer>)>,
        accounts: Vec<AccountId>,
        context: ChainContext,
    }

    impl Fixture {
        /// A fresh context over the same store, connector and wallet keys.
        fn reopen(&self) -> ChainContext {
            let mut wallets = ExtensionRegistry::new();
            wallets.register(Arc::new(StaticExtension {
                id: "talisman".to_owned(),
                refuse: false,
                keys: self.keys.clone(),
            }));
            ChainContext::new(self.connector.clone(), wallets, self.store.clone())
        }
    }

    fn fixture(wallet_accounts: usize) -> Fixture {
        let connector = Arc::new(MemoryConnector::new());
        let store = Arc::new(MemoryStore::new());
        let extension = StaticExtension::new("talisman", wallet_accounts);
        let accounts: Vec<_> = extension.keys.iter().map(|(_, s)| s.public()).collect();
        let keys = extension.keys.clone();

        for account in &accounts {
            connector.set_balance(*account, 12_345_678_901_234);
        }

        let mut wallets = ExtensionRegistry::new();
        wallets.register(Arc::new(extension));

        let context = ChainContext::new(connector.clone(), wallets, store.clone());
        Fixture {
            connector,
            store,
            keys,
            accounts,
            context,
        }
    }

    #[tokio::test]
    async fn init_restores_the_saved_network() {
        let mut f = fixture(1);
        f.store.set(SELECTED_NETWORK_KEY, KUSAMA).unwrap();
        f.context.init().await.unwrap();

        assert_eq!(f.context.network().id, KUSAMA);
        assert_eq!(f.context.chain_info().unwrap().ss58_format, 2);
        assert!(f.context.error().is_none());
    }

    #[tokio::test]
    async fn init_ignores_unknown_saved_network() {
        let mut f = fixture(1);
        f.store.set(SELECTED_NETWORK_KEY, "popNetwork").unwrap();
        f.context.init().await.unwrap();
        assert_eq!(f.context.network().id, default_network().id);
    }

    #[tokio::test]
    async fn connection_failures_raise_a_banner() {
        let mut f = fixture(1);
        f.connector.fail_network(WESTEND);
        f.store.set(SELECTED_NETWORK_KEY, WESTEND).unwrap();

        assert!(f.context.init().await.is_err());
        let banner = f.context.error().unwrap();
        assert!(banner.starts_with("Failed to connect to Westend Testnet: "));
        assert!(f.context.chain_info().is_none());
    }

    #[tokio::test]
    async fn wallet_selects_first_account_and_fetches_balance() {
        let mut f = fixture(2);
        f.context.init().await.unwrap();
        f.context.connect_wallet(None).await.unwrap();

        assert!(f.context.is_wallet_connected());
        assert_eq!(f.context.accounts().len(), 2);
        assert_eq!(f.context.selected_account().unwrap().address, f.accounts[0]);
        assert!(f.context.signer().is_some());
        assert_eq!(f.context.balance(), Some("1234.5678"));
        assert_eq!(
            f.store.get(SELECTED_ACCOUNT_KEY),
            Some(f.accounts[0].to_string())
        );
    }

    #[tokio::test]
    async fn wallet_restores_the_saved_account() {
        let mut f = fixture(3);
        f.store
            .set(SELECTED_ACCOUNT_KEY, &f.accounts[2].to_string())
            .unwrap();
        f.context.init().await.unwrap();
        f.context.connect_wallet(Some("talisman")).await.unwrap();

        assert_eq!(f.context.selected_account().unwrap().address, f.accounts[2]);
    }

    #[tokio::test]
    async fn selecting_another_account_is_persisted() {
        let mut f = fixture(3);
        f.context.init().await.unwrap();
        f.context.connect_wallet(None).await.unwrap();
        f.context.select_account(&f.accounts[1]).await.unwrap();

        assert_eq!(f.context.selected_account().unwrap().address, f.accounts[1]);
        assert_eq!(
            f.store.get(SELECTED_ACCOUNT_KEY),
            Some(f.accounts[1].to_string())
        );

        let mut restarted = f.reopen();
        restarted.init().await.unwrap();
        restarted.connect_wallet(None).await.unwrap();
        assert_eq!(restarted.selected_account().unwrap().address, f.accounts[1]);
    }

    #[tokio::test]
    async fn wizard_connects_the_requested_account() {
        let mut f = fixture(3);
        f.context.init().await.unwrap();

        let mut wizard = ConnectionWizard::new();
        f.context
            .connect_through(&mut wizard, "talisman", Some(&f.accounts[2]))
            .await
            .unwrap();

        match wizard.state() {
            WizardState::Connected { account } => assert_eq!(account.address, f.accounts[2]),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(f.context.selected_account().unwrap().address, f.accounts[2]);
        assert_eq!(
            f.store.get(SELECTED_ACCOUNT_KEY),
            Some(f.accounts[2].to_string())
        );
    }

    #[tokio::test]
    async fn wizard_closes_on_missing_wallet_or_account() {
        let mut f = fixture(2);
        f.context.init().await.unwrap();

        let mut wizard = ConnectionWizard::new();
        let result = f.context.connect_through(&mut wizard, "subwallet-js", None).await;
        assert!(matches!(result, Err(ContextErr::Wallet(WalletErr::NotInstalled(_)))));
        assert_eq!(wizard.state(), &WizardState::Idle);
        assert!(!f.context.is_wallet_connected());

        let stranger = AccountId([9; 32]);
        let result = f
            .context
            .connect_through(&mut wizard, "talisman", Some(&stranger))
            .await;
        assert!(matches!(result, Err(ContextErr::Wallet(WalletErr::Rejected(_)))));
        assert_eq!(wizard.state(), &WizardState::Idle);
        assert!(!f.context.is_wallet_connected());
        assert!(f.context.selected_account().is_none());
    }

    #[tokio::test]
    async fn wizard_closes_when_the_wallet_refuses() {
        let mut extension = StaticExtension::new("talisman", 1);
        extension.refuse = true;
        let mut wallets = ExtensionRegistry::new();
        wallets.register(Arc::new(extension));
        let mut context = ChainContext::new(
            Arc::new(MemoryConnector::new()),
            wallets,
            Arc::new(MemoryStore::new()),
        );

        let mut wizard = ConnectionWizard::new();
        assert!(context.connect_through(&mut wizard, "talisman", None).await.is_err());
        assert_eq!(wizard.state(), &WizardState::Idle);
        assert!(!context.is_wallet_connected());
        assert!(context.error().is_some());
    }

    #[tokio::test]
    async fn wallet_without_extensions_stays_disconnected() {
        let connector = Arc::new(MemoryConnector::new());
        let mut context = ChainContext::new(
            connector,
            ExtensionRegistry::new(),
            Arc::new(MemoryStore::new()),
        );

        let result = context.connect_wallet(None).await;
        assert_eq!(result, Err(ContextErr::Wallet(WalletErr::NoExtension)));
        assert!(!context.is_wallet_connected());
        assert!(context.error().unwrap().starts_with("No wallet extension found"));
    }

    #[tokio::test]
    async fn disconnect_forgets_the_account() {
        let mut f = fixture(1);
        f.context.init().await.unwrap();
        f.context.connect_wallet(None).await.unwrap();
        f.context.disconnect_wallet();

        assert!(!f.context.is_wallet_connected());
        assert!(f.context.selected_account().is_none());
        assert!(f.context.balance().is_none());
        assert!(f.store.get(SELECTED_ACCOUNT_KEY).is_none());
    }

    #[tokio::test]
    async fn unknown_network_is_refused() {
        let mut f = fixture(1);
        f.context.init().await.unwrap();

        let result = f.context.switch_network("moonbeam").await;
        assert!(matches!(result, Err(ContextErr::UnknownNetwork(_))));
        assert_eq!(f.context.error(), Some("Invalid network selected"));
        assert_eq!(f.context.network().id, default_network().id);
    }

    #[tokio::test]
    async fn switching_networks_keeps_one_connection() {
        let mut f = fixture(1);
        f.context.init().await.unwrap();
        f.context.connect_wallet(None).await.unwrap();

        f.context.switch_network(KUSAMA).await.unwrap();
        f.context.switch_network(ASSET_HUB).await.unwrap();
        f.context.switch_network(KUSAMA).await.unwrap();

        assert_eq!(f.connector.live(), 1);
        assert_eq!(f.connector.peak(), 1);
        assert_eq!(f.store.get(SELECTED_NETWORK_KEY).as_deref(), Some(KUSAMA));
        // 12 decimals on Kusama
        assert_eq!(f.context.balance(), Some("12.3456"));
    }

    #[tokio::test]
    async fn failed_balance_query_shows_zero() {
        let mut f = fixture(1);
        f.context.init().await.unwrap();
        f.context.connect_wallet(None).await.unwrap();

        f.connector.last().unwrap().fail_balance_queries(true);
        assert_eq!(f.context.refresh_balance().await.as_deref(), Some(ZERO_BALANCE));
    }

    #[tokio::test]
    async fn admin_is_the_configured_account() {
        let f = fixture(2);
        let admin = f.accounts[1];
        let mut context = f.context.with_admin(admin);
        assert!(!context.is_admin());

        context.init().await.unwrap();
        context.connect_wallet(None).await.unwrap();
        assert!(!context.is_admin());

        context.select_account(&admin).await.unwrap();
        assert!(context.is_admin());
    }
}
