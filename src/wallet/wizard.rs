// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::wallet::{wallet_info, Account, WalletErr, WalletInfo, SUPPORTED_WALLETS};
use log::*;

/// Steps of the wallet connection flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardState {
    Idle,

    SelectingWallet {
        /// Installed extension ids.
        detected: Vec<String>,

        /// Message shown above the wallet list.
        notice: Option<String>,
    },

    Connecting {
        wallet: String,
    },

    SelectingAccount {
        wallet: String,
        accounts: Vec<Account>,
    },

    Connected {
        account: Account,
    },
}

#[derive(Debug, Clone)]
pub enum WizardMessage {
    Open(Vec<String>),
    WalletChosen(String),
    ConnectSucceeded(Vec<Account>),
    ConnectFailed(WalletErr),
    AccountChosen(Account),
    Close,
}

/// Drives the connect dialog. Side effects happen outside, the wizard
/// only decides which step comes next.
#[derive(Debug, Clone)]
pub struct ConnectionWizard {
    state: WizardState,
    detected: Vec<String>,
}

impl Default for ConnectionWizard {
    fn default() -> Self {
        Self {
            state: WizardState::Idle,
            detected: Vec::new(),
        }
    }
}

impl ConnectionWizard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Wallet list in display order, installed ones marked.
    #[must_use]
    pub fn wallet_options(&self) -> Vec<(&'static WalletInfo, bool)> {
        let detected = match &self.state {
            WizardState::SelectingWallet { detected, .. } => detected.as_slice(),
            _ => &[],
        };

        SUPPORTED_WALLETS
            .iter()
            .map(|info| (info, detected.iter().any(|id| id == info.id)))
            .collect()
    }

    pub fn update(&mut self, message: WizardMessage) {
        let next = match (&self.state, message) {
            (_, WizardMessage::Close) => WizardState::Idle,

            (_, WizardMessage::Open(detected)) => {
                self.detected = detected.clone();
                let notice = if detected.is_empty() {
                    Some(WalletErr::NoExtension.to_string())
                } else {
                    None
                };
                WizardState::SelectingWallet { detected, notice }
            }

            (WizardState::SelectingWallet { detected, .. }, WizardMessage::WalletChosen(id)) => {
                if detected.iter().any(|d| d == &id) {
                    WizardState::Connecting { wallet: id }
                } else {
                    let notice = match wallet_info(&id) {
                        Some(info) => format!(
                            "{} is not installed. Download it from {}",
                            info.name, info.download_url
                        ),
                        None => WalletErr::NotInstalled(id).to_string(),
                    };

                    WizardState::SelectingWallet {
                        detected: detected.clone(),
                        notice: Some(notice),
                    }
                }
            }

            (WizardState::Connecting { wallet }, WizardMessage::ConnectSucceeded(mut accounts)) => {
                match accounts.len() {
                    0 => WizardState::SelectingWallet {
                        detected: self.detected.clone(),
                        notice: Some(WalletErr::NoAccounts.to_string()),
                    },
                    1 => WizardState::Connected {
                        account: accounts.remove(0),
                    },
                    _ => WizardState::SelectingAccount {
                        wallet: wallet.clone(),
                        accounts,
                    },
                }
            }

            (WizardState::Connecting { wallet }, WizardMessage::ConnectFailed(err)) => {
                warn!("Failed to connect to {wallet}: {err}");
                WizardState::SelectingWallet {
                    detected: self.detected.clone(),
                    notice: Some(err.to_string()),
                }
            }

            (WizardState::SelectingAccount { accounts, .. }, WizardMessage::AccountChosen(account))
                if accounts.contains(&account) =>
            {
                WizardState::Connected { account }
            }

            (state, message) => {
                debug!("Ignoring {message:?} in {state:?}");
                state.clone()
            }
        };

        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::AccountId;

    fn account(byte: u8) -> Account {
        Account {
            address: AccountId([byte; 32]),
            name: None,
            source: "talisman".to_owned(),
        }
    }

    fn opened(detected: &[&str]) -> ConnectionWizard {
        let mut wizard = ConnectionWizard::new();
        wizard.update(WizardMessage::Open(
            detected.iter().map(|s| (*s).to_owned()).collect(),
        ));
        wizard
    }

    #[test]
    fn missing_wallet_shows_download_hint() {
        let mut wizard = opened(&["polkadot-js"]);
        wizard.update(WizardMessage::WalletChosen("talisman".to_owned()));

        match wizard.state() {
            WizardState::SelectingWallet { notice: Some(notice), .. } => {
                assert!(notice.contains("https://talisman.xyz/"));
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn single_account_connects_directly() {
        let mut wizard = opened(&["talisman"]);
        wizard.update(WizardMessage::WalletChosen("talisman".to_owned()));
        assert_eq!(
            wizard.state(),
            &WizardState::Connecting {
                wallet: "talisman".to_owned()
            }
        );

        wizard.update(WizardMessage::ConnectSucceeded(vec![account(1)]));
        assert_eq!(wizard.state(), &WizardState::Connected { account: account(1) });
    }

    #[test]
    fn several_accounts_ask_for_a_choice() {
        let mut wizard = opened(&["talisman"]);
        wizard.update(WizardMessage::WalletChosen("talisman".to_owned()));
        wizard.update(WizardMessage::ConnectSucceeded(vec![account(1), account(2)]));
        assert!(matches!(wizard.state(), WizardState::SelectingAccount { .. }));

        // Unknown accounts are ignored
        wizard.update(WizardMessage::AccountChosen(account(3)));
        assert!(matches!(wizard.state(), WizardState::SelectingAccount { .. }));

        wizard.update(WizardMessage::AccountChosen(account(2)));
        assert_eq!(wizard.state(), &WizardState::Connected { account: account(2) });
    }

    #[test]
    fn failure_returns_to_wallet_selection() {
        let mut wizard = opened(&["talisman"]);
        wizard.update(WizardMessage::WalletChosen("talisman".to_owned()));
        wizard.update(WizardMessage::ConnectFailed(WalletErr::Rejected(
            "user declined".to_owned(),
        )));

        match wizard.state() {
            WizardState::SelectingWallet { notice: Some(notice), .. } => {
                assert_eq!(notice, "Wallet access rejected: user declined");
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn close_resets() {
        let mut wizard = opened(&["talisman"]);
        wizard.update(WizardMessage::WalletChosen("talisman".to_owned()));
        wizard.update(WizardMessage::Close);
        assert_eq!(wizard.state(), &WizardState::Idle);
    }

    #[test]
    fn options_mark_installed_wallets() {
        let wizard = opened(&["subwallet-js"]);
        let options = wizard.wallet_options();
        assert_eq!(options.len(), 3);
        assert!(options.iter().any(|(w, installed)| w.id == "subwallet-js" && *installed));
        assert!(options.iter().any(|(w, installed)| w.id == "talisman" && !*installed));
    }
}
