// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::context::ChainContext;
use crate::contract::qf::estimate_impact;
use crate::contract::{ContractErr, QfContractService};
use crate::primitives::balance::to_base_units;
use crate::primitives::{AccountId, Balance, Round, RoundData, Timestamp, ALPHA_ONE};
use crate::views::{connected_signer, query_origin, BannerSlot, CONNECT_WALLET_FIRST};
use log::*;

/// Amounts offered by the contribution form, in whole tokens.
pub const PRESET_AMOUNTS: [u64; 6] = [1, 5, 10, 25, 50, 100];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountChoice {
    None,
    Preset(u64),
    Custom(String),
}

impl AmountChoice {
    /// The amount as typed, if any.
    #[must_use]
    pub fn as_display(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Preset(amount) => Some(amount.to_string()),
            Self::Custom(amount) if amount.trim().is_empty() => None,
            Self::Custom(amount) => Some(amount.trim().to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundsMessage {
    ProjectChosen(u32),
    PresetChosen(u64),
    CustomChosen,
    CustomAmountChanged(String),
    FormClosed,
}

/// Contribution form of a single project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionForm {
    pub project_id: u32,
    pub amount: AmountChoice,
}

impl ContributionForm {
    /// Validated amount in base units of a network with `decimals`.
    pub fn amount_in_base_units(&self, decimals: u32) -> Result<Balance, String> {
        let display = self
            .amount
            .as_display()
            .ok_or_else(|| "Please enter a valid amount".to_owned())?;

        match to_base_units(&display, decimals) {
            Ok(0) => Err("Please enter a valid amount".to_owned()),
            Ok(amount) => Ok(amount),
            Err(err) => Err(err.to_string()),
        }
    }
}

/// Active funding rounds and the contribution form.
#[derive(Debug, Clone, Default)]
pub struct RoundsView {
    rounds: Vec<Round>,
    selected: Option<RoundData>,
    form: Option<ContributionForm>,
    loading: bool,
    submitting: bool,
    pub banner: BannerSlot,
}

impl RoundsView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, message: RoundsMessage) {
        match message {
            RoundsMessage::ProjectChosen(project_id) => {
                self.form = Some(ContributionForm {
                    project_id,
                    amount: AmountChoice::None,
                });
            }
            RoundsMessage::PresetChosen(amount) => {
                if let Some(form) = &mut self.form {
                    form.amount = AmountChoice::Preset(amount);
                }
            }
            RoundsMessage::CustomChosen => {
                if let Some(form) = &mut self.form {
                    form.amount = AmountChoice::Custom(String::new());
                }
            }
            RoundsMessage::CustomAmountChanged(amount) => {
                if let Some(form) = &mut self.form {
                    form.amount = AmountChoice::Custom(amount);
                }
            }
            RoundsMessage::FormClosed => self.form = None,
        }
    }

    /// Loads the active rounds and selects the first one when nothing is
    /// selected yet.
    pub async fn load(
        &mut self,
        context: &ChainContext,
        service: &QfContractService,
        now: Timestamp,
    ) -> Result<(), ContractErr> {
        let origin = query_origin(context, service.admin());
        self.loading = true;

        let result = service.all_active_rounds(&origin, now).await;
        self.loading = false;

        match result {
            Ok(rounds) => self.rounds = rounds,
            Err(err) => {
                error!("Failed to load active rounds: {err}");
                self.banner.error(err.to_string());
                return Err(err);
            }
        }

        if self.selected.is_none() {
            if let Some(first) = self.rounds.first().map(|r| r.round_id) {
                self.select_round(&origin, service, first).await?;
            }
        }

        Ok(())
    }

    pub async fn select_round(
        &mut self,
        origin: &AccountId,
        service: &QfContractService,
        round_id: u32,
    ) -> Result<(), ContractErr> {
        self.loading = true;
        let result = service.get_round_data(origin, round_id).await;
        self.loading = false;

        match result {
            Ok(data) => {
                self.selected = Some(data);
                Ok(())
            }
            Err(err) => {
                self.banner.error(err.to_string());
                Err(err)
            }
        }
    }

    /// Opens the form for `project_id`, refusing when no wallet is connected.
    pub fn open_form(&mut self, context: &ChainContext, project_id: u32) -> bool {
        if connected_signer(context).is_none() {
            self.banner.error(CONNECT_WALLET_FIRST);
            return false;
        }

        self.update(RoundsMessage::ProjectChosen(project_id));
        true
    }

    /// Submits the open contribution form and reloads the round.
    pub async fn contribute(
        &mut self,
        context: &ChainContext,
        service: &QfContractService,
    ) -> Result<(), String> {
        let (origin, signer) = match connected_signer(context) {
            Some(wallet) => wallet,
            None => {
                self.banner.error(CONNECT_WALLET_FIRST);
                return Err(CONNECT_WALLET_FIRST.to_owned());
            }
        };

        let (round_id, form) = match (&self.selected, &self.form) {
            (Some(data), Some(form)) => (data.round_info.round_id, form.clone()),
            _ => return Err("No project selected".to_owned()),
        };

        let amount = form
            .amount_in_base_units(context.network().decimals)
            .map_err(|err| {
                self.banner.error(err.clone());
                err
            })?;

        self.submitting = true;
        let result = service
            .contribute(&origin, signer.as_ref(), round_id, form.project_id, amount)
            .await;
        self.submitting = false;

        if let Err(err) = result {
            error!("Contribution failed: {err}");
            self.banner.error(err.to_string());
            return Err(err.to_string());
        }

        info!("Contributed {amount} to project {} in round {round_id}", form.project_id);
        self.banner.success("Contribution successful!");
        self.form = None;

        // A failed reload leaves the banner error in place of the success text
        let _ = self.select_round(&origin, service, round_id).await;
        Ok(())
    }

    /// Extra matching the open form's amount would attract for its project.
    #[must_use]
    pub fn impact_estimate(&self, decimals: u32) -> Option<Balance> {
        let form = self.form.as_ref()?;
        let data = self.selected.as_ref()?;
        let amount = form.amount_in_base_units(decimals).ok()?;

        let existing: Vec<Balance> = data
            .contributions_for(form.project_id)
            .map(|c| c.amount)
            .collect();
        let alpha = data.current_alpha.unwrap_or(ALPHA_ONE);

        Some(estimate_impact(&existing, amount, alpha))
    }

    #[must_use]
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    #[must_use]
    pub fn selected(&self) -> Option<&RoundData> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn form(&self) -> Option<&ContributionForm> {
        self.form.as_ref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::tests::{harness, Harness};

    async fn with_round(connect: bool) -> Harness {
        let mut h = harness(2, true).await;
        let admin = h.accounts[0];
        let signer = h.context.signer().unwrap();
        for _ in 0..2 {
            h.service.add_project(&admin, signer.as_ref(), &admin).await.unwrap();
        }
        h.service
            .create_round(&admin, signer.as_ref(), 1_000_000_000_000, &[1, 2], 168)
            .await
            .unwrap();

        if !connect {
            h.context.disconnect_wallet();
        }
        h
    }

    #[test]
    fn amounts_are_validated() {
        let form = |amount| ContributionForm {
            project_id: 1,
            amount,
        };

        assert_eq!(form(AmountChoice::Preset(5)).amount_in_base_units(10), Ok(50_000_000_000));
        assert_eq!(
            form(AmountChoice::Custom("0.5".to_owned())).amount_in_base_units(12),
            Ok(500_000_000_000)
        );
        assert!(form(AmountChoice::None).amount_in_base_units(10).is_err());
        assert!(form(AmountChoice::Custom("  ".to_owned())).amount_in_base_units(10).is_err());
        assert!(form(AmountChoice::Custom("0".to_owned())).amount_in_base_units(10).is_err());
        assert!(form(AmountChoice::Custom("-3".to_owned())).amount_in_base_units(10).is_err());
        assert!(form(AmountChoice::Custom("abc".to_owned())).amount_in_base_units(10).is_err());
    }

    #[tokio::test]
    async fn first_round_is_selected() {
        let h = with_round(false).await;
        let mut view = RoundsView::new();
        view.load(&h.context, &h.service, h.now()).await.unwrap();

        assert_eq!(view.rounds().len(), 1);
        assert_eq!(view.selected().unwrap().round_info.round_id, 1);
        assert!(!view.is_loading());
    }

    #[tokio::test]
    async fn contributing_needs_a_wallet() {
        let h = with_round(false).await;
        let mut view = RoundsView::new();
        view.load(&h.context, &h.service, h.now()).await.unwrap();

        assert!(!view.open_form(&h.context, 1));
        assert_eq!(view.banner.error_text(), Some(CONNECT_WALLET_FIRST));
        assert!(view.contribute(&h.context, &h.service).await.is_err());
    }

    #[tokio::test]
    async fn contribution_reloads_the_round() {
        let h = with_round(true).await;
        let mut view = RoundsView::new();
        view.load(&h.context, &h.service, h.now()).await.unwrap();

        assert!(view.open_form(&h.context, 2));
        view.update(RoundsMessage::CustomChosen);
        view.update(RoundsMessage::CustomAmountChanged("0".to_owned()));
        assert!(view.contribute(&h.context, &h.service).await.is_err());
        assert_eq!(view.banner.error_text(), Some("Please enter a valid amount"));

        view.update(RoundsMessage::PresetChosen(10));
        assert!(view.impact_estimate(h.context.network().decimals).is_some());
        view.contribute(&h.context, &h.service).await.unwrap();

        assert_eq!(view.banner.success_text(), Some("Contribution successful!"));
        assert!(view.form().is_none());
        let data = view.selected().unwrap();
        assert_eq!(data.contributions.len(), 1);
        assert_eq!(data.contributions[0].project_id, 2);
    }

    #[tokio::test]
    async fn contract_errors_surface_as_banners() {
        let h = with_round(true).await;
        let mut view = RoundsView::new();
        view.load(&h.context, &h.service, h.now()).await.unwrap();

        h.advance(169 * 3_600);
        view.open_form(&h.context, 1);
        view.update(RoundsMessage::PresetChosen(1));
        assert!(view.contribute(&h.context, &h.service).await.is_err());
        assert_eq!(
            view.banner.error_text(),
            Some("Round is not within active time period")
        );

        let rounds = h.service.all_active_rounds(&h.accounts[0], h.now()).await.unwrap();
        assert!(rounds.is_empty());
    }
}
