// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::context::ChainContext;
use crate::contract::{ContractErr, QfContractService};
use crate::mock::{project_meta, ProjectMeta};
use crate::primitives::{Balance, Contribution, UserStats};
use crate::views::BannerSlot;
use log::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardTab {
    #[default]
    Overview,
    History,
    Impact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardMessage {
    TabSelected(DashboardTab),
}

/// What one account gave to one project across all rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectImpact {
    pub project_id: u32,
    pub meta: Option<&'static ProjectMeta>,
    pub contributed: Balance,
    pub contributions: usize,
}

/// Personal overview of the connected account.
#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    tab: DashboardTab,
    stats: Option<UserStats>,
    contributions: Vec<Contribution>,
    loading: bool,
    disconnected: bool,
    pub banner: BannerSlot,
}

impl DashboardView {
    #[must_use]
    pub fn new() -> Self {
        Self {
            disconnected: true,
            ..Self::default()
        }
    }

    pub fn update(&mut self, message: DashboardMessage) {
        match message {
            DashboardMessage::TabSelected(tab) => self.tab = tab,
        }
    }

    /// Loads stats and history of the selected account.
    pub async fn load(&mut self, context: &ChainContext, service: &QfContractService) -> Result<(), ContractErr> {
        let user = match context.selected_account() {
            Some(account) if context.is_wallet_connected() => account.address,
            _ => {
                self.disconnected = true;
                self.stats = None;
                self.contributions.clear();
                return Ok(());
            }
        };

        self.disconnected = false;
        self.loading = true;
        let stats = service.get_user_stats(&user, &user).await;
        let contributions = match stats {
            Ok(_) => service.get_user_contributions(&user, &user).await,
            Err(ref err) => Err(err.clone()),
        };
        self.loading = false;

        match (stats, contributions) {
            (Ok(stats), Ok(mut contributions)) => {
                contributions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                debug!("Loaded {} contributions of {user}", contributions.len());
                self.stats = Some(stats);
                self.contributions = contributions;
                Ok(())
            }
            (Err(err), _) | (_, Err(err)) => {
                error!("Failed to load dashboard of {user}: {err}");
                self.banner.error(err.to_string());
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn tab(&self) -> DashboardTab {
        self.tab
    }

    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn stats(&self) -> Option<&UserStats> {
        self.stats.as_ref()
    }

    /// Contributions, newest first.
    #[must_use]
    pub fn history(&self) -> &[Contribution] {
        &self.contributions
    }

    /// Per project totals, largest first.
    #[must_use]
    pub fn impact(&self) -> Vec<ProjectImpact> {
        let mut by_project: BTreeMap<u32, ProjectImpact> = BTreeMap::new();

        for contribution in &self.contributions {
            let entry = by_project
                .entry(contribution.project_id)
                .or_insert_with(|| ProjectImpact {
                    project_id: contribution.project_id,
                    meta: project_meta(contribution.project_id),
                    contributed: 0,
                    contributions: 0,
                });
            entry.contributed = entry.contributed.saturating_add(contribution.amount);
            entry.contributions += 1;
        }

        let mut impact: Vec<_> = by_project.into_values().collect();
        impact.sort_by(|a, b| b.contributed.cmp(&a.contributed));
        impact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::tests::harness;

    #[tokio::test]
    async fn disconnected_wallet_shows_nothing() {
        let h = harness(1, false).await;
        let mut view = DashboardView::new();
        view.load(&h.context, &h.service).await.unwrap();

        assert!(view.is_disconnected());
        assert!(view.stats().is_none());
        assert!(view.history().is_empty());
    }

    #[tokio::test]
    async fn it_aggregates_contributions() {
        let h = harness(1, true).await;
        let user = h.accounts[0];
        let signer = h.context.signer().unwrap();
        for _ in 0..2 {
            h.service.add_project(&user, signer.as_ref(), &user).await.unwrap();
        }
        h.service
            .create_round(&user, signer.as_ref(), 1_000, &[1, 2], 24)
            .await
            .unwrap();

        h.service.contribute(&user, signer.as_ref(), 1, 1, 10).await.unwrap();
        h.advance(60);
        h.service.contribute(&user, signer.as_ref(), 1, 2, 50).await.unwrap();
        h.advance(60);
        h.service.contribute(&user, signer.as_ref(), 1, 1, 15).await.unwrap();

        let mut view = DashboardView::new();
        view.load(&h.context, &h.service).await.unwrap();
        view.update(DashboardMessage::TabSelected(DashboardTab::Impact));

        assert!(!view.is_disconnected());
        assert_eq!(view.tab(), DashboardTab::Impact);
        assert_eq!(view.stats().unwrap().total_contributed, 75);
        assert_eq!(view.history()[0].amount, 15);

        let impact = view.impact();
        assert_eq!(impact[0].project_id, 2);
        assert_eq!(impact[0].contributed, 50);
        assert_eq!(impact[1].contributed, 25);
        assert_eq!(impact[1].contributions, 2);
        assert_eq!(impact[1].meta.unwrap().title, "Aachener Baumschutzbund");
    }
}
