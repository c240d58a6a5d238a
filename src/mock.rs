// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Fixture data for demo mode.
//!
//! Amounts in the fixtures are whole tokens and are converted to base units
//! with [`DEMO_DECIMALS`]. Timestamps are anchored in early 2024 and shifted by
//! [`demo_contract`] so that round 2 is live relative to the given clock.

use crate::contract::{Clock, MemoryContract};
use crate::primitives::{AccountId, Balance, Contribution, Project, Round, RoundStatus, Timestamp, UserStats};
use crate::settings::SETTINGS;
use chrono::DateTime;
use log::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Decimals used to turn fixture token amounts into base units.
pub const DEMO_DECIMALS: u32 = 10;

/// Fixture time at which round 2 has been running for a week.
pub const DEMO_ANCHOR: Timestamp = 1_709_240_400;

const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";
const CHARLIE: &str = "5FLSigC9HGRKVhB9FiEo4Y3koPsNmBmLJbpXg2mp1hXcS59Y";
const DAVE: &str = "5DAAnrj7VHTznn2AWBemMuyBwZWs6FNFjdyVXUeYum3PTXFy";
const EVE: &str = "5HGjWAeFDfFCWPsjFQdVV2Msvz2XtMktvgocEZcCj68kUMaw";
const FERDIE: &str = "5CiPPseXPECbkjWCa6MnjNokrgYjMqmKndv2rSnekmSK2DjL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Environmental,
    Community,
    Mobility,
    Fashion,
    Education,
    Technology,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Environmental,
        Category::Community,
        Category::Mobility,
        Category::Fashion,
        Category::Education,
        Category::Technology,
        Category::Other,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Unknown category: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct City {
    pub id: &'static str,
    pub name: &'static str,
    pub slug: &'static str,
    pub is_active: bool,
    pub contract_address: Option<&'static str>,
    pub created_at: &'static str,
}

/// Catalogue information kept next to the on-chain project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectMeta {
    pub contract_project_id: u32,
    pub city_id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub image_url: &'static str,
    pub creator_name: &'static str,
    pub creator_address: &'static str,
    pub category: Category,
    pub tags: &'static [&'static str],
    pub is_active: bool,
    pub created_at: &'static str,
}

impl ProjectMeta {
    /// Creation time as unix seconds.
    #[must_use]
    pub fn created_at_ts(&self) -> Timestamp {
        DateTime::parse_from_rfc3339(self.created_at)
            .ok()
            .and_then(|t| u64::try_from(t.timestamp()).ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub wallet_address: &'static str,
    pub display_name: &'static str,
    pub avatar_url: &'static str,
    pub created_at: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingStats {
    pub total_raised: Balance,
    pub contributor_count: u32,
    pub matching_estimate: Balance,
}

/// Catalogue entry joined with its contract state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedProject {
    pub meta: ProjectMeta,
    pub contract: Option<Project>,
    pub funding: Option<FundingStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRound {
    pub round: Round,
    pub projects: Vec<EnrichedProject>,
    pub total_contributions: Balance,
    pub unique_contributors: usize,
    pub time_remaining: Option<u64>,
    pub status: RoundStatus,
}

pub static CITIES: [City; 6] = [
    City {
        id: "00000000-0000-0000-0000-000000000001",
        name: "Aachen",
        slug: "aachen",
        is_active: true,
        contract_address: Some(BOB),
        created_at: "2024-01-15T10:00:00Z",
    },
    City {
        id: "00000000-0000-0000-0000-000000000002",
        name: "Berlin",
        slug: "berlin",
        is_active: false,
        contract_address: None,
        created_at: "2024-01-15T10:00:00Z",
    },
    City {
        id: "00000000-0000-0000-0000-000000000003",
        name: "Munich",
        slug: "munich",
        is_active: false,
        contract_address: None,
        created_at: "2024-01-15T10:00:00Z",
    },
    City {
        id: "00000000-0000-0000-0000-000000000004",
        name: "Hamburg",
        slug: "hamburg",
        is_active: false,
        contract_address: None,
        created_at: "2024-01-15T10:00:00Z",
    },
    City {
        id: "00000000-0000-0000-0000-000000000005",
        name: "Cologne",
        slug: "cologne",
        is_active: false,
        contract_address: None,
        created_at: "2024-01-15T10:00:00Z",
    },
    City {
        id: "00000000-0000-0000-0000-000000000006",
        name: "Stuttgart",
        slug: "stuttgart",
        is_active: false,
        contract_address: None,
        created_at: "2024-01-15T10:00:00Z",
    },
];

const AACHEN: &str = "00000000-0000-0000-0000-000000000001";

pub static PROJECTS: [ProjectMeta; 6] = [
    ProjectMeta {
        contract_project_id: 1,
        city_id: AACHEN,
        title: "Aachener Baumschutzbund",
        description: "Dedicated to the preservation and expansion of urban tree canopy in Aachen. Our mission is to protect existing trees, plant new ones, and educate the community about the vital role trees play in urban ecosystems.",
        image_url: "https://images.unsplash.com/photo-1542601906990-b4d3fb778b09?w=800&h=600&fit=crop",
        creator_name: "Johannes Müller",
        creator_address: ALICE,
        category: Category::Environmental,
        tags: &["Environmental Protection", "Urban Forestry", "Climate Action"],
        is_active: true,
        created_at: "2024-01-20T09:00:00Z",
    },
    ProjectMeta {
        contract_project_id: 2,
        city_id: AACHEN,
        title: "Aachen, was geht?!",
        description: "A platform for educational work and community development in Aachen. We focus on youth engagement, cultural events, and building bridges between different communities in our diverse city.",
        image_url: "https://images.unsplash.com/photo-1560439513-74b037a25d84?w=800&h=600&fit=crop",
        creator_name: "Ja Pfeiffer",
        creator_address: CHARLIE,
        category: Category::Community,
        tags: &["Community Development", "Education", "Youth Engagement"],
        is_active: true,
        created_at: "2024-01-22T14:30:00Z",
    },
    ProjectMeta {
        contract_project_id: 3,
        city_id: AACHEN,
        title: "Uni.Urban.Mobil. e.V.",
        description: "A volunteer-driven initiative focused on sustainable mobility and urban gardening. We promote bike culture, public transport advocacy, and create green spaces throughout Aachen.",
        image_url: "https://images.unsplash.com/photo-1507035895480-2b3156c31fc8?w=800&h=600&fit=crop",
        creator_name: "Sebastian Lukas",
        creator_address: DAVE,
        category: Category::Mobility,
        tags: &["Sustainable Mobility", "Urban Gardening", "Bike Culture"],
        is_active: true,
        created_at: "2024-01-25T11:15:00Z",
    },
    ProjectMeta {
        contract_project_id: 4,
        city_id: AACHEN,
        title: "nAChhaltig angezogen",
        description: "An initiative focused on sustainable fashion and waste reduction. We organize clothing swaps, repair cafes, and educate about fast fashion's environmental impact.",
        image_url: "https://images.unsplash.com/photo-1489987707025-afc232f7ea0f?w=800&h=600&fit=crop",
        creator_name: "Julia Schmidt",
        creator_address: EVE,
        category: Category::Fashion,
        tags: &["Sustainable Fashion", "Waste Reduction", "Circular Economy"],
        is_active: true,
        created_at: "2024-01-28T16:45:00Z",
    },
    ProjectMeta {
        contract_project_id: 5,
        city_id: AACHEN,
        title: "Aachen Energy Collective",
        description: "Community-driven renewable energy initiatives. We help residents organize solar panel cooperatives and energy-saving programs.",
        image_url: "https://images.unsplash.com/photo-1558804462-1ab0abe5a8ea?w=800&h=600&fit=crop",
        creator_name: "Michael Weber",
        creator_address: FERDIE,
        category: Category::Environmental,
        tags: &["Renewable Energy", "Community Solar", "Energy Efficiency"],
        is_active: true,
        created_at: "2024-02-01T08:30:00Z",
    },
    ProjectMeta {
        contract_project_id: 6,
        city_id: AACHEN,
        title: "Digital Skills for Seniors",
        description: "Bridging the digital divide by teaching technology skills to elderly residents, fostering intergenerational connections.",
        image_url: "https://images.unsplash.com/photo-1531482615713-2afd69097998?w=800&h=600&fit=crop",
        creator_name: "Anna Hoffmann",
        creator_address: BOB,
        category: Category::Education,
        tags: &["Digital Literacy", "Senior Care", "Intergenerational"],
        is_active: true,
        created_at: "2024-02-03T13:20:00Z",
    },
];

/// `(project_id, total_contributions, contributor_count)` as held by the contract.
const CONTRACT_TOTALS: [(u32, u64, u32); 6] = [
    (1, 2450, 18),
    (2, 1890, 23),
    (3, 3200, 31),
    (4, 1650, 15),
    (5, 2800, 19),
    (6, 1200, 12),
];

/// `(amount, contributor, project_id, round_id, timestamp)`
const CONTRIBUTIONS: [(u64, &str, u32, u32, Timestamp); 9] = [
    (250, ALICE, 1, 1, 1_706_097_600),
    (150, CHARLIE, 1, 1, 1_706_184_000),
    (300, DAVE, 2, 1, 1_706_270_400),
    (200, EVE, 3, 1, 1_706_356_800),
    (100, FERDIE, 1, 1, 1_706_443_200),
    (175, BOB, 4, 1, 1_706_529_600),
    (320, ALICE, 5, 2, 1_708_635_600),
    (180, CHARLIE, 6, 2, 1_708_722_000),
    (275, DAVE, 5, 2, 1_708_808_400),
];

pub static USER_PROFILES: [UserProfile; 2] = [
    UserProfile {
        wallet_address: ALICE,
        display_name: "Alex Chen",
        avatar_url: "https://api.dicebear.com/7.x/avataaars/svg?seed=alex",
        created_at: "2024-01-15T10:00:00Z",
    },
    UserProfile {
        wallet_address: CHARLIE,
        display_name: "Sarah Miller",
        avatar_url: "https://api.dicebear.com/7.x/avataaars/svg?seed=sarah",
        created_at: "2024-01-18T14:30:00Z",
    },
];

fn account(address: &str) -> AccountId {
    address.parse().unwrap_or_else(|err| {
        warn!("Invalid fixture address {address}: {err}");
        AccountId::zero()
    })
}

/// Whole demo tokens in base units.
#[must_use]
pub fn tokens(amount: u64) -> Balance {
    Balance::from(amount) * 10u128.pow(DEMO_DECIMALS)
}

#[must_use]
pub fn contract_projects() -> Vec<Project> {
    CONTRACT_TOTALS
        .iter()
        .map(|(project_id, total, count)| {
            let wallet = PROJECTS
                .iter()
                .find(|p| p.contract_project_id == *project_id)
                .map_or_else(AccountId::zero, |p| account(p.creator_address));

            Project {
                project_id: *project_id,
                wallet_address: wallet,
                total_contributions: tokens(*total),
                contributor_count: *count,
            }
        })
        .collect()
}

#[must_use]
pub fn contributions() -> Vec<Contribution> {
    CONTRIBUTIONS
        .iter()
        .map(|(amount, who, project_id, round_id, timestamp)| Contribution {
            amount: tokens(*amount),
            contributor: account(who),
            project_id: *project_id,
            round_id: *round_id,
            timestamp: *timestamp,
        })
        .collect()
}

#[must_use]
pub fn rounds() -> Vec<Round> {
    vec![
        Round {
            round_id: 1,
            matching_pool: tokens(10_000),
            eligible_projects: vec![1, 2, 3, 4],
            start_time: 1_706_097_600,
            end_time: 1_707_912_000,
            active: false,
            final_alpha: Some(8_500),
            is_finalized: true,
        },
        Round {
            round_id: 2,
            matching_pool: tokens(15_000),
            eligible_projects: vec![3, 4, 5, 6],
            start_time: 1_708_635_600,
            end_time: 1_710_450_000,
            active: true,
            final_alpha: None,
            is_finalized: false,
        },
        Round {
            round_id: 3,
            matching_pool: tokens(20_000),
            eligible_projects: vec![1, 2, 5, 6],
            start_time: 1_711_659_600,
            end_time: 1_713_474_000,
            active: false,
            final_alpha: None,
            is_finalized: false,
        },
    ]
}

#[must_use]
pub fn user_stats() -> UserStats {
    UserStats {
        total_contributed: tokens(1_275),
        projects_supported: vec![1, 3, 4, 5],
        rounds_participated: vec![1, 2],
    }
}

/// The active city, or the first one if none is active.
#[must_use]
pub fn active_city() -> &'static City {
    CITIES.iter().find(|c| c.is_active).unwrap_or(&CITIES[0])
}

fn enrich(meta: &ProjectMeta, contract: &[Project]) -> EnrichedProject {
    let contract = contract
        .iter()
        .find(|p| p.project_id == meta.contract_project_id)
        .cloned();

    // Rough estimate shown before a round is finalized
    let funding = contract.as_ref().map(|p| FundingStats {
        total_raised: p.total_contributions,
        contributor_count: p.contributor_count,
        matching_estimate: p.total_contributions * 3 / 10,
    });

    EnrichedProject {
        meta: meta.clone(),
        contract,
        funding,
    }
}

#[must_use]
pub fn enriched_projects() -> Vec<EnrichedProject> {
    let contract = contract_projects();
    PROJECTS.iter().map(|meta| enrich(meta, &contract)).collect()
}

#[must_use]
pub fn projects_by_city(city_id: &str) -> Vec<EnrichedProject> {
    enriched_projects()
        .into_iter()
        .filter(|p| p.meta.city_id == city_id)
        .collect()
}

#[must_use]
pub fn enriched_rounds(now: Timestamp) -> Vec<EnrichedRound> {
    let projects = enriched_projects();
    let contributions = contributions();

    rounds()
        .into_iter()
        .map(|round| {
            let round_projects = projects
                .iter()
                .filter(|p| round.is_eligible(p.meta.contract_project_id))
                .cloned()
                .collect();

            let round_contributions: Vec<_> = contributions
                .iter()
                .filter(|c| c.round_id == round.round_id)
                .collect();

            let mut contributors: Vec<_> = round_contributions.iter().map(|c| c.contributor).collect();
            contributors.sort();
            contributors.dedup();

            let status = round.status(now);
            let time_remaining = (status == RoundStatus::Active).then(|| round.time_remaining(now));

            EnrichedRound {
                total_contributions: round_contributions
                    .iter()
                    .map(|c| c.amount)
                    .fold(0, Balance::saturating_add),
                unique_contributors: contributors.len(),
                projects: round_projects,
                time_remaining,
                status,
                round,
            }
        })
        .collect()
}

#[must_use]
pub fn round_by_id(round_id: u32, now: Timestamp) -> Option<EnrichedRound> {
    enriched_rounds(now)
        .into_iter()
        .find(|r| r.round.round_id == round_id)
}

#[must_use]
pub fn active_rounds(now: Timestamp) -> Vec<EnrichedRound> {
    enriched_rounds(now)
        .into_iter()
        .filter(|r| r.status == RoundStatus::Active)
        .collect()
}

#[must_use]
pub fn project_meta(project_id: u32) -> Option<&'static ProjectMeta> {
    PROJECTS.iter().find(|p| p.contract_project_id == project_id)
}

/// Demo contract seeded with the fixtures, administered by the configured admin.
#[must_use]
pub fn demo_contract(clock: Clock) -> MemoryContract {
    let admin = account(&SETTINGS.contract.admin_address);
    demo_contract_with(clock, admin, Balance::from(SETTINGS.contract.min_contribution))
}

/// Demo contract seeded with the fixtures, with every timestamp shifted so
/// that the clock's current time corresponds to [`DEMO_ANCHOR`].
#[must_use]
pub fn demo_contract_with(clock: Clock, admin: AccountId, min_contribution: Balance) -> MemoryContract {
    let now = clock();
    let shift = |t: Timestamp| -> Timestamp {
        if now >= DEMO_ANCHOR {
            t.saturating_add(now - DEMO_ANCHOR)
        } else {
            t.saturating_sub(DEMO_ANCHOR - now)
        }
    };

    let rounds = rounds()
        .into_iter()
        .map(|mut round| {
            round.start_time = shift(round.start_time);
            round.end_time = shift(round.end_time);
            round
        })
        .collect();

    let contributions = contributions()
        .into_iter()
        .map(|mut c| {
            c.timestamp = shift(c.timestamp);
            c
        })
        .collect();

    let contract = MemoryContract::new(admin, min_contribution, clock);
    contract.seed(contract_projects(), rounds, contributions);
    contract
}
