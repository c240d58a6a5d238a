// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::contract::{ContractErr, QfContractService};
use crate::mock::{Category, EnrichedProject, FundingStats};
use crate::primitives::{AccountId, Balance};
use futures::future::try_join_all;
use log::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Recent,
    Popular,
    Funded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogueMessage {
    SearchChanged(String),
    CategorySelected(Option<Category>),
    SortChanged(SortBy),
    ActiveOnlyToggled(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogueTotals {
    pub projects: usize,
    pub contributors: u32,
    pub total_raised: Balance,
}

/// Project catalogue of a city with search, filter and sort state.
#[derive(Debug, Clone)]
pub struct CatalogueView {
    projects: Vec<EnrichedProject>,
    search: String,
    category: Option<Category>,
    sort: SortBy,
    active_only: bool,
    loading: bool,
}

impl CatalogueView {
    #[must_use]
    pub fn new(projects: Vec<EnrichedProject>) -> Self {
        Self {
            projects,
            search: String::new(),
            category: None,
            sort: SortBy::default(),
            active_only: true,
            loading: false,
        }
    }

    pub fn update(&mut self, message: CatalogueMessage) {
        match message {
            CatalogueMessage::SearchChanged(search) => self.search = search,
            CatalogueMessage::CategorySelected(category) => self.category = category,
            CatalogueMessage::SortChanged(sort) => self.sort = sort,
            CatalogueMessage::ActiveOnlyToggled(active_only) => self.active_only = active_only,
        }
    }

    /// Refreshes the on-chain figures of every listed project.
    pub async fn load(&mut self, service: &QfContractService, origin: &AccountId) -> Result<(), ContractErr> {
        self.loading = true;
        let queries = self
            .projects
            .iter()
            .map(|p| service.get_project(origin, p.meta.contract_project_id));
        let result = try_join_all(queries).await;
        self.loading = false;

        let contracts = result.map_err(|err| {
            warn!("Failed to load catalogue projects: {err}");
            err
        })?;

        for (project, contract) in self.projects.iter_mut().zip(contracts) {
            project.funding = contract.as_ref().map(|p| FundingStats {
                total_raised: p.total_contributions,
                contributor_count: p.contributor_count,
                matching_estimate: p.total_contributions * 3 / 10,
            });
            project.contract = contract;
        }

        Ok(())
    }

    fn matches(&self, project: &EnrichedProject) -> bool {
        let needle = self.search.to_lowercase();
        let meta = &project.meta;

        let matches_search = needle.is_empty()
            || meta.title.to_lowercase().contains(&needle)
            || meta.description.to_lowercase().contains(&needle)
            || meta.creator_name.to_lowercase().contains(&needle);

        let matches_category = self.category.map_or(true, |c| c == meta.category);

        matches_search && matches_category && (!self.active_only || meta.is_active)
    }

    /// Projects passing the current filters, in the selected order.
    #[must_use]
    pub fn visible(&self) -> Vec<&EnrichedProject> {
        let mut visible: Vec<_> = self.projects.iter().filter(|p| self.matches(p)).collect();

        let contributors = |p: &EnrichedProject| p.funding.as_ref().map_or(0, |f| f.contributor_count);
        let raised = |p: &EnrichedProject| p.funding.as_ref().map_or(0, |f| f.total_raised);

        match self.sort {
            SortBy::Recent => visible.sort_by_key(|p| std::cmp::Reverse(p.meta.created_at_ts())),
            SortBy::Popular => visible.sort_by_key(|p| std::cmp::Reverse(contributors(*p))),
            SortBy::Funded => visible.sort_by_key(|p| std::cmp::Reverse(raised(*p))),
        }

        visible
    }

    /// Figures over the whole catalogue regardless of filters.
    #[must_use]
    pub fn totals(&self) -> CatalogueTotals {
        self.projects
            .iter()
            .filter_map(|p| p.funding.as_ref())
            .fold(
                CatalogueTotals {
                    projects: self.projects.len(),
                    ..CatalogueTotals::default()
                },
                |mut totals, funding| {
                    totals.contributors += funding.contributor_count;
                    totals.total_raised = totals.total_raised.saturating_add(funding.total_raised);
                    totals
                },
            )
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn sort(&self) -> SortBy {
        self.sort
    }
}
