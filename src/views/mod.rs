// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! View state for the application screens.
//!
//! Views hold loading flags, form fields and banners, and change only through
//! their `update` functions or the async actions which talk to the contract.
//! Nothing here renders.

mod admin;
mod catalogue;
mod dashboard;
mod rounds;

pub use crate::views::admin::*;
pub use crate::views::catalogue::*;
pub use crate::views::dashboard::*;
pub use crate::views::rounds::*;

use crate::context::ChainContext;
use crate::primitives::AccountId;
use crate::settings::SETTINGS;
use crate::wallet::Signer;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shown when an action needs a wallet and none is connected.
pub const CONNECT_WALLET_FIRST: &str = "Please connect your wallet first";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub text: String,
    shown_at: Instant,
}

/// Holds at most one banner and clears it after a timeout.
#[derive(Debug, Clone)]
pub struct BannerSlot {
    current: Option<Banner>,
    timeout: Duration,
}

impl Default for BannerSlot {
    fn default() -> Self {
        Self::new(Duration::from_secs(SETTINGS.app.banner_timeout_secs))
    }
}

impl BannerSlot {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            current: None,
            timeout,
        }
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.show(BannerKind::Success, text.into(), Instant::now());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.show(BannerKind::Error, text.into(), Instant::now());
    }

    pub fn show(&mut self, kind: BannerKind, text: String, now: Instant) {
        self.current = Some(Banner {
            kind,
            text,
            shown_at: now,
        });
    }

    /// Drops the banner once it has been shown for longer than the timeout.
    pub fn tick(&mut self, now: Instant) {
        let expired = self
            .current
            .as_ref()
            .map_or(false, |b| now.saturating_duration_since(b.shown_at) >= self.timeout);

        if expired {
            self.current = None;
        }
    }

    /// The banner still on screen at `now`, expiring it first.
    pub fn visible(&mut self, now: Instant) -> Option<&Banner> {
        self.tick(now);
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    #[must_use]
    pub fn current(&self) -> Option<&Banner> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|b| b.kind == BannerKind::Error)
            .map(|b| b.text.as_str())
    }

    #[must_use]
    pub fn success_text(&self) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|b| b.kind == BannerKind::Success)
            .map(|b| b.text.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Projects,
    Rounds,
    Dashboard,
    Admin,
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Projects => "Projects",
            Self::Rounds => "Funding Rounds",
            Self::Dashboard => "Dashboard",
            Self::Admin => "Admin",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMessage {
    TabSelected(Tab),
    AdminChanged(bool),
}

/// Top level navigation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppView {
    active: Tab,
    is_admin: bool,
}

impl Default for AppView {
    fn default() -> Self {
        Self::new()
    }
}

impl AppView {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Tab::Projects,
            is_admin: false,
        }
    }

    /// Navigation for the account selected in `context`.
    #[must_use]
    pub fn for_context(context: &ChainContext) -> Self {
        let mut view = Self::new();
        view.update(AppMessage::AdminChanged(context.is_admin()));
        view
    }

    #[must_use]
    pub fn tabs(&self) -> Vec<Tab> {
        let mut tabs = vec![Tab::Projects, Tab::Rounds, Tab::Dashboard];
        if self.is_admin {
            tabs.push(Tab::Admin);
        }
        tabs
    }

    #[must_use]
    pub fn active(&self) -> Tab {
        self.active
    }

    pub fn update(&mut self, message: AppMessage) {
        match message {
            AppMessage::TabSelected(tab) => {
                if self.tabs().contains(&tab) {
                    self.active = tab;
                }
            }
            AppMessage::AdminChanged(is_admin) => {
                self.is_admin = is_admin;
                if !is_admin && self.active == Tab::Admin {
                    self.active = Tab::Projects;
                }
            }
        }
    }
}

/// Selected account and its signer, if a wallet is connected.
pub(crate) fn connected_signer(context: &ChainContext) -> Option<(AccountId, Arc<dyn Signer>)> {
    if !context.is_wallet_connected() {
        return None;
    }

    let account = context.selected_account()?;
    let signer = context.signer()?;
    Some((account.address, signer))
}

/// Account used as the caller of read-only queries.
pub(crate) fn query_origin(context: &ChainContext, fallback: &AccountId) -> AccountId {
    context
        .selected_account()
        .map_or(*fallback, |account| account.address)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chain::MemoryConnector;
    use crate::contract::{MemoryContract, QfContractService};
    use crate::storage::MemoryStore;
    use crate::wallet::tests::StaticExtension;
    use crate::wallet::ExtensionRegistry;
    use std::sync::atomic::{AtomicU64, Ordering};

    pub struct Harness {
        pub time: Arc<AtomicU64>,
        pub accounts: Vec<AccountId>,
        pub context: ChainContext,
        pub contract: Arc<MemoryContract>,
        pub service: QfContractService,
    }

    impl Harness {
        pub fn now(&self) -> u64 {
            self.time.load(Ordering::SeqCst)
        }

        pub fn advance(&self, secs: u64) {
            self.time.fetch_add(secs, Ordering::SeqCst);
        }
    }

    /// Context with `count` wallet accounts, the first of which administers
    /// an empty in-memory contract.
    pub async fn harness(count: usize, connect: bool) -> Harness {
        let extension = StaticExtension::new("talisman", count);
        let accounts: Vec<_> = extension.keys.iter().map(|(_, s)| s.public()).collect();
        let mut wallets = ExtensionRegistry::new();
        wallets.register(Arc::new(extension));

        let admin = accounts[0];
        let mut context = ChainContext::new(
            Arc::new(MemoryConnector::new()),
            wallets,
            Arc::new(MemoryStore::new()),
        )
        .with_admin(admin);
        context.init().await.unwrap();
        if connect {
            context.connect_wallet(None).await.unwrap();
        }

        let time = Arc::new(AtomicU64::new(1_000_000));
        let clock_time = time.clone();
        let contract = Arc::new(MemoryContract::new(
            admin,
            1,
            Arc::new(move || clock_time.load(Ordering::SeqCst)),
        ));
        let service = QfContractService::new(contract.clone(), admin);

        Harness {
            time,
            accounts,
            context,
            contract,
            service,
        }
    }

    #[test]
    fn banners_expire() {
        let mut slot = BannerSlot::new(Duration::from_secs(5));
        let start = Instant::now();
        slot.show(BannerKind::Error, "boom".to_owned(), start);
        assert_eq!(slot.error_text(), Some("boom"));
        assert_eq!(slot.success_text(), None);

        slot.tick(start + Duration::from_secs(4));
        assert!(slot.current().is_some());
        slot.tick(start + Duration::from_secs(5));
        assert!(slot.current().is_none());
    }

    #[test]
    fn visible_banner_expires_before_it_is_read() {
        let mut slot = BannerSlot::new(Duration::from_secs(5));
        let start = Instant::now();
        slot.show(BannerKind::Success, "saved".to_owned(), start);

        let banner = slot.visible(start + Duration::from_secs(1)).unwrap();
        assert_eq!(banner.kind, BannerKind::Success);
        assert_eq!(banner.text, "saved");
        assert!(slot.visible(start + Duration::from_secs(6)).is_none());
        assert!(slot.current().is_none());
    }

    #[tokio::test]
    async fn navigation_follows_the_selected_account() {
        let mut h = harness(2, true).await;
        assert!(AppView::for_context(&h.context).tabs().contains(&Tab::Admin));

        let other = h.accounts[1];
        h.context.select_account(&other).await.unwrap();
        let mut app = AppView::for_context(&h.context);
        app.update(AppMessage::TabSelected(Tab::Admin));
        assert!(!app.tabs().contains(&Tab::Admin));
        assert_eq!(app.active(), Tab::Projects);
    }

    #[test]
    fn admin_tab_requires_admin() {
        let mut app = AppView::new();
        assert_eq!(app.tabs().len(), 3);

        app.update(AppMessage::TabSelected(Tab::Admin));
        assert_eq!(app.active(), Tab::Projects);

        app.update(AppMessage::AdminChanged(true));
        app.update(AppMessage::TabSelected(Tab::Admin));
        assert_eq!(app.active(), Tab::Admin);
        assert_eq!(app.tabs().last(), Some(&Tab::Admin));

        app.update(AppMessage::AdminChanged(false));
        assert_eq!(app.active(), Tab::Projects);
    }

    #[tokio::test]
    async fn signer_needs_a_connected_wallet() {
        let h = harness(1, false).await;
        assert!(connected_signer(&h.context).is_none());
        assert_eq!(query_origin(&h.context, &h.accounts[0]), h.accounts[0]);

        let h = harness(1, true).await;
        let (origin, signer) = connected_signer(&h.context).unwrap();
        assert_eq!(origin, h.accounts[0]);
        assert_eq!(signer.public(), origin);
    }
}
