// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Built-in registry of the chains the application can connect to.

use crate::settings::SETTINGS;
use log::*;
use serde::Serialize;
use std::fmt;

pub const ASSET_HUB: &str = "assetHub";
pub const POLKADOT: &str = "polkadot";
pub const KUSAMA: &str = "kusama";
pub const WESTEND: &str = "westend";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Testnet,
    Mainnet,
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Testnet => write!(f, "testnet"),
            Self::Mainnet => write!(f, "mainnet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfig {
    pub id: &'static str,
    pub name: &'static str,
    pub endpoint: &'static str,
    pub symbol: &'static str,
    pub decimals: u32,
    pub ss58_format: u16,
    pub chain_type: ChainType,
}

impl NetworkConfig {
    /// JSON-RPC endpoint for the network.
    ///
    /// Substrate nodes serve websocket and http JSON-RPC on the same port, so
    /// the websocket scheme is swapped for its http counterpart.
    #[must_use]
    pub fn http_endpoint(&self) -> String {
        if let Some(rest) = self.endpoint.strip_prefix("wss://") {
            format!("https://{rest}")
        } else if let Some(rest) = self.endpoint.strip_prefix("ws://") {
            format!("http://{rest}")
        } else {
            self.endpoint.to_owned()
        }
    }

    #[must_use]
    pub fn is_testnet(&self) -> bool {
        self.chain_type == ChainType::Testnet
    }
}

pub static NETWORKS: [NetworkConfig; 4] = [
    NetworkConfig {
        id: ASSET_HUB,
        name: "Asset Hub Testnet",
        endpoint: "wss://testnet-passet-hub.polkadot.io",
        symbol: "DOT",
        decimals: 10,
        ss58_format: 42,
        chain_type: ChainType::Testnet,
    },
    NetworkConfig {
        id: POLKADOT,
        name: "Polkadot",
        endpoint: "wss://rpc.polkadot.io",
        symbol: "DOT",
        decimals: 10,
        ss58_format: 0,
        chain_type: ChainType::Mainnet,
    },
    NetworkConfig {
        id: KUSAMA,
        name: "Kusama",
        endpoint: "wss://kusama-rpc.polkadot.io",
        symbol: "KSM",
        decimals: 12,
        ss58_format: 2,
        chain_type: ChainType::Mainnet,
    },
    NetworkConfig {
        id: WESTEND,
        name: "Westend Testnet",
        endpoint: "wss://westend-rpc.polkadot.io",
        symbol: "WND",
        decimals: 12,
        ss58_format: 42,
        chain_type: ChainType::Testnet,
    },
];

#[must_use]
pub fn network_by_id(id: &str) -> Option<&'static NetworkConfig> {
    NETWORKS.iter().find(|n| n.id == id)
}

#[must_use]
pub fn all_networks() -> &'static [NetworkConfig] {
    &NETWORKS
}

/// Network configured in settings, falling back to Asset Hub.
#[must_use]
pub fn default_network() -> &'static NetworkConfig {
    configured_or_fallback(&SETTINGS.network.default_network)
}

pub(crate) fn configured_or_fallback(id: &str) -> &'static NetworkConfig {
    match network_by_id(id) {
        Some(network) => network,
        None => {
            warn!("Unknown network {id} in settings, falling back to {ASSET_HUB}");
            &NETWORKS[0]
        }
    }
}
