// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::network::network_by_id;
use crate::primitives::AccountId;
use anyhow::bail;
use config::{Config, ConfigError, File};
use lazy_static::*;
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, metadata, File as FsFile};
use std::io::Write;
use std::path::{Path, PathBuf};
use struct_field_names_as_array::FieldNamesAsArray;

const ENV_PREFIX: &str = "sustained";

lazy_static! {
    pub static ref SETTINGS: Settings = Settings::new().unwrap_or_else(|err| {
        error!("Failed to load configuration, using defaults! Reason: {err}");
        Settings::default()
    });
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, FieldNamesAsArray)]
pub struct Settings {
    /// Network settings.
    pub network: Network,

    /// Deployed funding contract settings.
    pub contract: Contract,

    /// Application settings.
    pub app: App,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(&config_path())
    }

    /// Loads settings from the given file layered over defaults and
    /// environment overrides. The file is created with defaults if missing.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let default_settings = Settings::default();

        if metadata(config_path).is_err() {
            write_default_config(config_path, &default_settings);
        }

        let env_source: Vec<_> = std::env::vars().collect();
        let mut s = Config::builder()
            .add_source(File::from(config_path.to_path_buf()).required(false));

        // Set defaults
        let defaults_value = serde_yaml::to_value(&default_settings)
            .map_err(|err| ConfigError::Message(err.to_string()))?;
        let defaults: HashMap<String, HashMap<String, DynamicConfVal>> =
            serde_yaml::from_value(defaults_value)
                .map_err(|err| ConfigError::Message(err.to_string()))?;

        for (k1, inner) in &defaults {
            for (k2, v) in inner {
                let key = format!("{k1}.{k2}");
                match v {
                    DynamicConfVal::String(v) => {
                        s = s.set_default(key, v.as_str())?;
                    }

                    DynamicConfVal::Bool(v) => {
                        s = s.set_default(key, *v)?;
                    }

                    DynamicConfVal::U64(v) => {
                        s = s.set_default(key, *v)?;
                    }

                    DynamicConfVal::Sequence(v) => {
                        s = s.set_default(key, v.clone())?;
                    }

                    DynamicConfVal::Option(v) => {
                        if let Some(v) = v {
                            s = s.set_default(key, v.as_str())?;
                        }
                    }
                }
            }
        }

        // Make sure to list these in order
        let settings_modules: Vec<_> = vec![
            Network::FIELD_NAMES_AS_ARRAY,
            Contract::FIELD_NAMES_AS_ARRAY,
            App::FIELD_NAMES_AS_ARRAY,
        ];

        // Gather all possible settings keys
        let possible_keys: HashMap<String, &str> = Settings::FIELD_NAMES_AS_ARRAY
            .iter()
            .enumerate()
            .flat_map(|(i, field)| {
                settings_modules[i].iter().map(move |nested| {
                    (
                        format!("{}_{}_{}", ENV_PREFIX, field, nested.replace('_', "")),
                        *nested,
                    )
                })
            })
            .collect();

        // Parse env vars manually, `config::Environment` cannot tell
        // separators apart from underscores inside key names.
        for (k, v) in &env_source {
            let k = k.to_lowercase();

            if let Some(k_postfix) = possible_keys.get(&k) {
                // Filter empty values
                if v.is_empty() {
                    continue;
                }

                let mut parts: Vec<_> = k.split('_').filter(|x| x != &ENV_PREFIX).collect();
                if let Some(last) = parts.last_mut() {
                    *last = k_postfix;
                }

                s = s.set_override(parts.join("."), v.as_str())?;
            }
        }

        s.build()?.try_deserialize()
    }

    /// Checks values which cannot be expressed through types alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        if network_by_id(&self.network.default_network).is_none() {
            bail!("Unknown default network: {}", self.network.default_network);
        }

        if self.contract.admin_address.parse::<AccountId>().is_err() {
            bail!("Invalid admin address: {}", self.contract.admin_address);
        }

        if !self.contract.address.is_empty() && self.contract.address.parse::<AccountId>().is_err()
        {
            bail!("Invalid contract address: {}", self.contract.address);
        }

        if self.network.rpc_timeout_secs == 0 {
            bail!("RPC timeout must be positive");
        }

        if self.app.banner_timeout_secs == 0 {
            bail!("Banner timeout must be positive");
        }

        Ok(())
    }

    /// Directory holding persisted selections and the local keystore.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.app.data_dir)
    }
}

fn config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("Sustained");
    path.push("config.toml");
    path
}

fn write_default_config(config_path: &Path, defaults: &Settings) {
    let settings_str = match toml::ser::to_string_pretty(defaults) {
        Ok(s) => s,
        Err(err) => {
            error!("Failed to serialize default configuration! Reason: {err}");
            return;
        }
    };

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).unwrap_or(());
    }

    // If this fails, fall back to defaults and environment variables
    match FsFile::create(config_path) {
        Ok(mut file) => {
            file.write_all(settings_str.as_bytes()).unwrap_or(());
        }
        Err(err) => {
            error!("Failed to create configuration! Reason: {err:#?}");
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FieldNamesAsArray)]
pub struct Network {
    /// Network used when nothing has been persisted yet.
    #[serde(alias = "defaultnetwork")]
    pub default_network: String,

    /// Timeout in seconds for a single JSON-RPC request.
    #[serde(alias = "rpctimeoutsecs")]
    pub rpc_timeout_secs: u64,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            default_network: crate::network::ASSET_HUB.to_owned(),
            rpc_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FieldNamesAsArray)]
pub struct Contract {
    /// SS58 address of the deployed funding contract. Empty when not deployed.
    pub address: String,

    /// The only account allowed to add projects, create rounds and distribute funds.
    #[serde(alias = "adminaddress")]
    pub admin_address: String,

    /// Minimum contribution in base units, enforced by the demo contract.
    #[serde(alias = "mincontribution")]
    pub min_contribution: u64,

    /// Upper bound for the `ref_time` weight of a dry-run.
    #[serde(alias = "gasreftime")]
    pub gas_ref_time: u64,

    /// Upper bound for the `proof_size` weight of a dry-run.
    #[serde(alias = "gasproofsize")]
    pub gas_proof_size: u64,

    /// Index of `pallet-contracts` in the runtime.
    #[serde(alias = "palletindex")]
    pub pallet_index: u8,

    /// The runtime pays fees through `ChargeAssetTxPayment`.
    #[serde(alias = "chargeassettxpayment")]
    pub charge_asset_tx_payment: bool,

    /// The runtime carries the `CheckMetadataHash` signed extension.
    #[serde(alias = "checkmetadatahash")]
    pub check_metadata_hash: bool,
}

impl Default for Contract {
    fn default() -> Self {
        Self {
            address: String::new(),
            admin_address: "5G9G6KPc1h2f2npsRBj4Y97JVvJSGHKuuLnhJCCdHVH8der1".to_owned(),
            min_contribution: 1,
            gas_ref_time: 50_000_000_000,
            gas_proof_size: 1_048_576,
            pallet_index: 40,
            charge_asset_tx_payment: true,
            check_metadata_hash: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FieldNamesAsArray)]
pub struct App {
    /// Name presented to wallet extensions when requesting access.
    #[serde(alias = "appname")]
    pub app_name: String,

    /// Data directory
    #[serde(alias = "datadir")]
    pub data_dir: String,

    /// Seconds after which success and error banners clear.
    #[serde(alias = "bannertimeoutsecs")]
    pub banner_timeout_secs: u64,

    /// Use the seeded in-memory contract instead of a live node.
    #[serde(alias = "demomode")]
    pub demo_mode: bool,

    /// Wallet source to prefer when connecting.
    #[serde(alias = "preferredwallet")]
    pub preferred_wallet: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("Sustained");

        Self {
            app_name: "Sustained QF Platform".to_owned(),
            data_dir: path.to_string_lossy().into_owned(),
            banner_timeout_secs: 5,
            demo_mode: false,
            preferred_wallet: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DynamicConfVal {
    String(String),
    Sequence(Vec<String>),
    Option(Option<String>),
    Bool(bool),
    U64(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn temp_config(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("sustained-settings-{name}-{}", std::process::id()));
        fs::create_dir_all(&path).unwrap();
        path.push("config.toml");
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    #[serial]
    fn it_creates_default_config() {
        let path = temp_config("defaults");
        let settings = Settings::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings.network.default_network, "assetHub");
        assert_eq!(settings.app.banner_timeout_secs, 5);
        assert_eq!(settings.app.app_name, "Sustained QF Platform");
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn env_overrides_take_precedence() {
        let path = temp_config("env");
        std::env::set_var("SUSTAINED_APP_BANNERTIMEOUTSECS", "9");
        std::env::set_var("SUSTAINED_NETWORK_DEFAULTNETWORK", "kusama");
        let settings = Settings::load(&path);
        std::env::remove_var("SUSTAINED_APP_BANNERTIMEOUTSECS");
        std::env::remove_var("SUSTAINED_NETWORK_DEFAULTNETWORK");

        let settings = settings.unwrap();
        assert_eq!(settings.app.banner_timeout_secs, 9);
        assert_eq!(settings.network.default_network, "kusama");
    }

    #[test]
    #[serial]
    fn file_values_override_defaults() {
        let path = temp_config("file");
        fs::write(
            &path,
            "[network]\ndefault_network = \"westend\"\nrpc_timeout_secs = 3\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.network.default_network, "westend");
        assert_eq!(settings.network.rpc_timeout_secs, 3);
        assert_eq!(settings.app.banner_timeout_secs, 5);
    }

    #[test]
    #[serial]
    fn out_of_range_pallet_index_fails_to_load() {
        let path = temp_config("pallet");
        fs::write(&path, "[contract]\npallet_index = 300\n").unwrap();
        assert!(Settings::load(&path).is_err());

        fs::write(&path, "[contract]\npallet_index = 52\n").unwrap();
        assert_eq!(Settings::load(&path).unwrap().contract.pallet_index, 52);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.network.default_network = "popNetwork".to_owned();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.contract.admin_address = "nope".to_owned();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.network.rpc_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }
}
