// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! # Sustained
//! Client library and CLI for city scale quadratic funding on Substrate chains.
//!
//! Citizens contribute to local sustainability projects during time-boxed
//! funding rounds. When a round ends its matching pool is split between the
//! projects in proportion to `(Σ√cᵢ)² − Σcᵢ`, so projects backed by many small
//! contributors receive more matching than projects backed by a few large ones.
//!
//! ## Layout
//! * [`primitives`]: accounts, balances and the round, project and contribution types.
//! * [`network`]: the built-in network registry.
//! * [`chain`]: JSON-RPC client, extrinsic encoding and the single live connection.
//! * [`wallet`]: wallet extensions, the local keystore and the connection wizard.
//! * [`contract`]: the funding contract, on chain or in memory, and the matching maths.
//! * [`context`]: selected network, account and balance.
//! * [`views`]: screen state for catalogue, rounds, dashboard and admin panel.
//! * [`mock`]: fixture data used in demo mode.

pub mod chain;
pub mod context;
pub mod contract;
pub mod mock;
pub mod network;
pub mod primitives;
pub mod settings;
pub mod storage;
pub mod views;
pub mod wallet;
