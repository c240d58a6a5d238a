// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::{
    decode_hex, encode_hex, system_account_key, AccountInfo, ChainClient, ChainErr, ChainInfo,
    ContractCallRequest, Hash, RuntimeContext,
};
use crate::network::NetworkConfig;
use crate::primitives::{AccountId, Balance};
use async_trait::async_trait;
use log::*;
use reqwest::Client;
use scale::{Decode, Encode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeVersion {
    spec_version: u32,
    transaction_version: u32,
}

/// JSON-RPC 2.0 client for a Substrate node over HTTP.
pub struct RpcClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
    connected: AtomicBool,

    /// Address format used when the node does not report one.
    fallback_ss58_format: u16,
}

impl RpcClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        fallback_ss58_format: u16,
    ) -> Result<Self, ChainErr> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ChainErr::Transport(err.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            fallback_ss58_format,
        })
    }

    /// Client for the http endpoint of `network`.
    pub fn for_network(network: &NetworkConfig, timeout: Duration) -> Result<Self, ChainErr> {
        Self::new(network.http_endpoint(), timeout, network.ss58_format)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainErr> {
        if !self.is_connected() {
            return Err(ChainErr::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!("rpc request {id} {method}");
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let status = resp.status();
        if !status.is_success() {
            let t = resp.text().await.unwrap_or_default();
            return Err(ChainErr::Transport(format!("{method} failed {status} {t}")));
        }

        let resp = resp.json::<RpcResponse>().await.map_err(map_reqwest_err)?;

        if let Some(err) = resp.error {
            return Err(ChainErr::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = resp.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|err| ChainErr::InvalidResponse(format!("{method}: {err}")))
    }

    pub async fn genesis_hash(&self) -> Result<Hash, ChainErr> {
        let hash: String = self.request("chain_getBlockHash", json!([0])).await?;
        let bytes = decode_hex(&hash)?;
        let mut out = [0; 32];
        if bytes.len() != out.len() {
            return Err(ChainErr::InvalidResponse("genesis hash length".to_owned()));
        }
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    pub async fn account_info(&self, account: &AccountId) -> Result<AccountInfo, ChainErr> {
        let key = encode_hex(&system_account_key(account));
        let data: Option<String> = self.request("state_getStorage", json!([key])).await?;

        match data {
            None => Ok(AccountInfo::default()),
            Some(data) => {
                let bytes = decode_hex(&data)?;
                AccountInfo::decode(&mut bytes.as_slice())
                    .map_err(|err| ChainErr::InvalidResponse(format!("account info: {err}")))
            }
        }
    }
}

fn map_reqwest_err(err: reqwest::Error) -> ChainErr {
    if err.is_timeout() {
        ChainErr::Timeout
    } else if err.is_decode() {
        ChainErr::InvalidResponse(err.to_string())
    } else {
        ChainErr::Transport(err.to_string())
    }
}

fn chain_type_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        // `{"custom": "..."}`
        Value::Object(map) => map
            .values()
            .next()
            .and_then(Value::as_str)
            .unwrap_or("Custom")
            .to_owned(),
        _ => "Live".to_owned(),
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn chain_info(&self) -> Result<ChainInfo, ChainErr> {
        let chain: String = self.request("system_chain", json!([])).await?;

        // Older nodes do not expose the chain type
        let chain_type = match self.request::<Value>("system_chainType", json!([])).await {
            Ok(value) => chain_type_name(&value),
            Err(ChainErr::Rpc { .. }) => "Live".to_owned(),
            Err(err) => return Err(err),
        };

        let properties: Value = self.request("system_properties", json!([])).await?;
        let ss58_format = properties
            .get("ss58Format")
            .and_then(Value::as_u64)
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(self.fallback_ss58_format);

        Ok(ChainInfo {
            chain,
            chain_type,
            ss58_format,
        })
    }

    async fn free_balance(&self, account: &AccountId) -> Result<Balance, ChainErr> {
        Ok(self.account_info(account).await?.data.free)
    }

    async fn runtime_context(&self, account: &AccountId) -> Result<RuntimeContext, ChainErr> {
        let genesis_hash = self.genesis_hash().await?;
        let version: RuntimeVersion = self.request("state_getRuntimeVersion", json!([])).await?;
        let nonce: u32 = self
            .request(
                "system_accountNextIndex",
                json!([account.to_ss58(self.fallback_ss58_format)]),
            )
            .await?;

        Ok(RuntimeContext {
            genesis_hash,
            spec_version: version.spec_version,
            transaction_version: version.transaction_version,
            nonce,
        })
    }

    async fn contract_call(&self, request: &ContractCallRequest) -> Result<Vec<u8>, ChainErr> {
        let params = json!(["ContractsApi_call", encode_hex(&request.encode())]);
        let result: String = self.request("state_call", params).await?;
        decode_hex(&result)
    }

    async fn submit_extrinsic(&self, extrinsic: &[u8]) -> Result<Hash, ChainErr> {
        let hash: String = self
            .request("author_submitExtrinsic", json!([encode_hex(extrinsic)]))
            .await?;
        let bytes = decode_hex(&hash)?;
        let mut out = [0; 32];
        if bytes.len() != out.len() {
            return Err(ChainErr::InvalidResponse("extrinsic hash length".to_owned()));
        }
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Disconnected from {}", self.url);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
