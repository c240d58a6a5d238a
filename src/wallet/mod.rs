// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Wallet extensions, accounts and signing.
//!
//! A wallet extension is anything which can grant access, list accounts and
//! hand out a [`Signer`] for one of them. The [`ExtensionRegistry`] fans out
//! over all installed extensions the same way a browser exposes every
//! injected wallet at once.

mod keystore;
mod wizard;

pub use crate::wallet::keystore::*;
pub use crate::wallet::wizard::*;

use crate::primitives::{format_address, AccountId};
use async_trait::async_trait;
use log::*;
use parking_lot::RwLock;
use schnorrkel::keys::{ExpansionMode, MiniSecretKey};
use schnorrkel::{signing_context, Keypair, PublicKey, Signature};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Signing context used by substrate for sr25519.
const SIGNING_CTX: &[u8] = b"substrate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletErr {
    /// No extension is installed at all
    NoExtension,

    /// Extensions are installed but expose no accounts
    NoAccounts,

    /// The requested extension is not installed
    NotInstalled(String),

    /// The extension has not been enabled yet
    NotEnabled(String),

    /// The user or the extension refused access
    Rejected(String),

    /// Passphrase did not decrypt the keystore
    InvalidPassphrase,

    /// Keys have not been unlocked yet
    Locked,

    /// Keystore could not be read or written
    Keystore(String),
}

impl fmt::Display for WalletErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoExtension => write!(
                f,
                "No wallet extension found. Please install Talisman, Polkadot.js, or another compatible wallet."
            ),
            Self::NoAccounts => write!(
                f,
                "No accounts found. Please create an account in your wallet and try again."
            ),
            Self::NotInstalled(id) => write!(f, "Wallet {id} is not installed"),
            Self::NotEnabled(id) => write!(f, "Wallet {id} has not been enabled"),
            Self::Rejected(reason) => write!(f, "Wallet access rejected: {reason}"),
            Self::InvalidPassphrase => write!(f, "Invalid passphrase"),
            Self::Locked => write!(f, "Keystore is locked, unlock it with your passphrase"),
            Self::Keystore(reason) => write!(f, "Keystore error: {reason}"),
        }
    }
}

impl std::error::Error for WalletErr {}

/// Account exposed by a wallet extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub address: AccountId,
    pub name: Option<String>,

    /// Identifier of the extension holding the key.
    pub source: String,
}

impl Account {
    /// Account name, or the shortened address for unnamed accounts.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format_address(&self.address.to_string(), 8),
        }
    }
}

pub trait Signer: Send + Sync {
    fn public(&self) -> AccountId;

    /// sr25519 signature over `payload`.
    fn sign(&self, payload: &[u8]) -> [u8; 64];
}

pub struct Sr25519Signer {
    keypair: Keypair,
}

impl Sr25519Signer {
    #[must_use]
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    /// Expands a 32 byte mini secret the way substrate does.
    pub fn from_seed(seed: &[u8]) -> Result<Self, WalletErr> {
        let mini = MiniSecretKey::from_bytes(seed)
            .map_err(|err| WalletErr::Keystore(format!("invalid seed: {err}")))?;

        Ok(Self {
            keypair: mini.expand_to_keypair(ExpansionMode::Ed25519),
        })
    }

    #[must_use]
    pub fn verify(public: &AccountId, payload: &[u8], signature: &[u8; 64]) -> bool {
        let public = match PublicKey::from_bytes(public.as_bytes()) {
            Ok(public) => public,
            Err(_) => return false,
        };

        let signature = match Signature::from_bytes(signature) {
            Ok(signature) => signature,
            Err(_) => return false,
        };

        public
            .verify_simple(SIGNING_CTX, payload, &signature)
            .is_ok()
    }
}

impl Signer for Sr25519Signer {
    fn public(&self) -> AccountId {
        AccountId(self.keypair.public.to_bytes())
    }

    fn sign(&self, payload: &[u8]) -> [u8; 64] {
        self.keypair
            .sign(signing_context(SIGNING_CTX).bytes(payload))
            .to_bytes()
    }
}

impl fmt::Debug for Sr25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sr25519Signer")
            .field("public", &self.public())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
pub trait WalletExtension: Send + Sync {
    /// Source identifier reported on accounts, e.g. `talisman`.
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Requests access on behalf of `app_name`.
    async fn enable(&self, app_name: &str) -> Result<(), WalletErr>;

    async fn accounts(&self) -> Result<Vec<Account>, WalletErr>;

    async fn signer(&self, account: &Account) -> Result<Arc<dyn Signer>, WalletErr>;
}

/// A wallet the application knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalletInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub download_url: &'static str,
    pub recommended: bool,
}

pub static SUPPORTED_WALLETS: [WalletInfo; 3] = [
    WalletInfo {
        id: "talisman",
        name: "Talisman",
        description: "Polkadot wallet with built-in staking and cross-chain support",
        download_url: "https://talisman.xyz/",
        recommended: true,
    },
    WalletInfo {
        id: "polkadot-js",
        name: "Polkadot.js",
        description: "Official Polkadot wallet extension",
        download_url: "https://polkadot.js.org/extension/",
        recommended: false,
    },
    WalletInfo {
        id: "subwallet-js",
        name: "SubWallet",
        description: "Wallet with a modern interface and earning features",
        download_url: "https://subwallet.app/",
        recommended: false,
    },
];

#[must_use]
pub fn wallet_info(id: &str) -> Option<&'static WalletInfo> {
    SUPPORTED_WALLETS.iter().find(|w| w.id == id)
}

/// Installed wallet extensions and which of them granted access.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Arc<dyn WalletExtension>>,
    enabled: RwLock<Vec<String>>,
}

impl ExtensionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extension: Arc<dyn WalletExtension>) {
        debug!("Registered wallet extension {}", extension.id());
        self.extensions.push(extension);
    }

    /// Identifiers of all installed extensions.
    #[must_use]
    pub fn detected(&self) -> Vec<String> {
        self.extensions.iter().map(|e| e.id().to_owned()).collect()
    }

    #[must_use]
    pub fn is_installed(&self, id: &str) -> bool {
        self.extensions.iter().any(|e| e.id() == id)
    }

    fn extension(&self, id: &str) -> Option<&Arc<dyn WalletExtension>> {
        self.extensions.iter().find(|e| e.id() == id)
    }

    /// Requests access from every installed extension. Returns how many
    /// granted it.
    pub async fn enable_all(&self, app_name: &str) -> Result<usize, WalletErr> {
        if self.extensions.is_empty() {
            return Err(WalletErr::NoExtension);
        }

        let mut granted = Vec::new();
        let mut last_err = None;
        for extension in &self.extensions {
            match extension.enable(app_name).await {
                Ok(()) => granted.push(extension.id().to_owned()),
                Err(err) => {
                    warn!("Wallet {} refused access: {err}", extension.id());
                    last_err = Some(err);
                }
            }
        }

        if granted.is_empty() {
            return Err(last_err.unwrap_or(WalletErr::NoExtension));
        }

        let count = granted.len();
        *self.enabled.write() = granted;
        Ok(count)
    }

    /// Accounts from all enabled extensions. When `preferred_source` is given
    /// and has accounts, only those are returned.
    pub async fn accounts(&self, preferred_source: Option<&str>) -> Result<Vec<Account>, WalletErr> {
        let enabled = self.enabled.read().clone();
        let mut all = Vec::new();

        for id in &enabled {
            if let Some(extension) = self.extension(id) {
                all.extend(extension.accounts().await?);
            }
        }

        if all.is_empty() {
            return Err(WalletErr::NoAccounts);
        }

        if let Some(source) = preferred_source {
            let preferred: Vec<_> = all.iter().filter(|a| a.source == source).cloned().collect();
            if preferred.is_empty() {
                info!("No accounts found for {source}, using all available accounts");
            } else {
                info!("Connected to {source} with {} accounts", preferred.len());
                return Ok(preferred);
            }
        }

        Ok(all)
    }

    pub async fn signer_for(&self, account: &Account) -> Result<Arc<dyn Signer>, WalletErr> {
        let extension = self
            .extension(&account.source)
            .ok_or_else(|| WalletErr::NotInstalled(account.source.clone()))?;

        if !self.enabled.read().iter().any(|id| id == &account.source) {
            return Err(WalletErr::NotEnabled(account.source.clone()));
        }

        extension.signer(account).await
    }

    pub fn reset(&self) {
        self.enabled.write().clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory extension holding generated keys.
    pub struct StaticExtension {
        pub id: String,
        pub refuse: bool,
        pub keys: Vec<(Option<String>, Arc<Sr25519Signer>)>,
    }

    impl StaticExtension {
        pub fn new(id: &str, count: usize) -> Self {
            Self {
                id: id.to_owned(),
                refuse: false,
                keys: (0..count)
                    .map(|i| (Some(format!("{id} {i}")), Arc::new(Sr25519Signer::generate())))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl WalletExtension for StaticExtension {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            &self.id
        }

        async fn enable(&self, _app_name: &str) -> Result<(), WalletErr> {
            if self.refuse {
                Err(WalletErr::Rejected("user declined".to_owned()))
            } else {
                Ok(())
            }
        }

        async fn accounts(&self) -> Result<Vec<Account>, WalletErr> {
            Ok(self
                .keys
                .iter()
                .map(|(name, signer)| Account {
                    address: signer.public(),
                    name: name.clone(),
                    source: self.id.clone(),
                })
                .collect())
        }

        async fn signer(&self, account: &Account) -> Result<Arc<dyn Signer>, WalletErr> {
            let by_address: HashMap<_, _> =
                self.keys.iter().map(|(_, s)| (s.public(), s.clone())).collect();
            by_address
                .get(&account.address)
                .map(|s| s.clone() as Arc<dyn Signer>)
                .ok_or_else(|| WalletErr::Rejected("unknown account".to_owned()))
        }
    }

    #[test]
    fn signatures_verify() {
        let signer = Sr25519Signer::generate();
        let sig = signer.sign(b"payload");
        assert!(Sr25519Signer::verify(&signer.public(), b"payload", &sig));
        assert!(!Sr25519Signer::verify(&signer.public(), b"other", &sig));
    }

    #[test]
    fn seeded_signer_is_deterministic() {
        let a = Sr25519Signer::from_seed(&[3; 32]).unwrap();
        let b = Sr25519Signer::from_seed(&[3; 32]).unwrap();
        assert_eq!(a.public(), b.public());
        assert!(Sr25519Signer::from_seed(&[3; 31]).is_err());
    }

    #[test]
    fn display_name_falls_back_to_address() {
        let address = AccountId([1; 32]);
        let mut account = Account {
            address,
            name: Some("Alice".to_owned()),
            source: "talisman".to_owned(),
        };
        assert_eq!(account.display_name(), "Alice");
        account.name = None;
        assert_eq!(
            account.display_name(),
            format_address(&address.to_string(), 8)
        );
    }

    #[test]
    fn talisman_is_recommended() {
        let recommended: Vec<_> = SUPPORTED_WALLETS.iter().filter(|w| w.recommended).collect();
        assert_eq!(recommended.len(), 1);
        assert_eq!(recommended[0].id, "talisman");
        assert!(wallet_info("subwallet-js").is_some());
    }

    #[tokio::test]
    async fn empty_registry_has_no_extension() {
        let registry = ExtensionRegistry::new();
        assert_eq!(registry.enable_all("test").await, Err(WalletErr::NoExtension));
    }

    #[tokio::test]
    async fn preferred_source_filters_with_fallback() {
        let mut registry = ExtensionRegistry::new();
        registry.register(Arc::new(StaticExtension::new("talisman", 2)));
        registry.register(Arc::new(StaticExtension::new("polkadot-js", 1)));
        assert_eq!(registry.enable_all("test").await.unwrap(), 2);

        let talisman = registry.accounts(Some("talisman")).await.unwrap();
        assert_eq!(talisman.len(), 2);
        assert!(talisman.iter().all(|a| a.source == "talisman"));

        let fallback = registry.accounts(Some("subwallet-js")).await.unwrap();
        assert_eq!(fallback.len(), 3);
    }

    #[tokio::test]
    async fn signer_requires_enabled_extension() {
        let mut registry = ExtensionRegistry::new();
        registry.register(Arc::new(StaticExtension::new("talisman", 1)));
        registry.enable_all("test").await.unwrap();
        let account = registry.accounts(None).await.unwrap().remove(0);

        let signer = registry.signer_for(&account).await.unwrap();
        assert_eq!(signer.public(), account.address);

        registry.reset();
        assert_eq!(
            registry.signer_for(&account).await.err(),
            Some(WalletErr::NotEnabled("talisman".to_owned()))
        );
    }

    #[tokio::test]
    async fn all_refusing_extensions_fail() {
        let mut ext = StaticExtension::new("talisman", 1);
        ext.refuse = true;
        let mut registry = ExtensionRegistry::new();
        registry.register(Arc::new(ext));
        assert!(matches!(
            registry.enable_all("test").await,
            Err(WalletErr::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn no_accounts_is_an_error() {
        let mut registry = ExtensionRegistry::new();
        registry.register(Arc::new(StaticExtension::new("talisman", 0)));
        registry.enable_all("test").await.unwrap();
        assert_eq!(registry.accounts(None).await, Err(WalletErr::NoAccounts));
    }
}
