// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Access to a Substrate node.
//!
//! The [`ChainClient`] trait is the boundary between the application and a
//! node. [`RpcClient`] talks JSON-RPC to a real node while [`MemoryChain`]
//! serves demo mode and tests. A [`ConnectionManager`] owns whichever client
//! is currently live.

mod connection;
mod extrinsic;
mod memory;
mod rpc;

pub use crate::chain::connection::*;
pub use crate::chain::extrinsic::*;
pub use crate::chain::memory::*;
pub use crate::chain::rpc::*;

use crate::primitives::{AccountId, Balance};
use async_trait::async_trait;
use blake2::digest::consts::{U16, U32};
use blake2::{Blake2b, Digest};
use scale::{Decode, Encode};
use serde::Serialize;
use std::fmt;

type Blake2b128 = Blake2b<U16>;
type Blake2b256 = Blake2b<U32>;

pub type Hash = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainErr {
    /// The request could not be delivered
    Transport(String),

    /// The node did not answer in time
    Timeout,

    /// The node answered with a JSON-RPC error
    Rpc { code: i64, message: String },

    /// The node answered with something we cannot interpret
    InvalidResponse(String),

    /// The client has been disconnected
    NotConnected,
}

impl fmt::Display for ChainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "{msg}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Rpc { code, message } => write!(f, "rpc error {code}: {message}"),
            Self::InvalidResponse(msg) => write!(f, "invalid response from node: {msg}"),
            Self::NotConnected => write!(f, "not connected to a node"),
        }
    }
}

impl std::error::Error for ChainErr {}

/// Chain metadata shown next to the selected network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    pub chain: String,
    pub chain_type: String,
    pub ss58_format: u16,
}

/// Everything needed to sign an extrinsic for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContext {
    pub genesis_hash: Hash,
    pub spec_version: u32,
    pub transaction_version: u32,
    pub nonce: u32,
}

/// Two dimensional weight as used by `pallet-contracts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode, Serialize)]
pub struct Weight {
    #[codec(compact)]
    pub ref_time: u64,
    #[codec(compact)]
    pub proof_size: u64,
}

impl Weight {
    #[must_use]
    pub fn new(ref_time: u64, proof_size: u64) -> Self {
        Self {
            ref_time,
            proof_size,
        }
    }
}

/// Arguments of the `ContractsApi_call` runtime API, in encoding order.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ContractCallRequest {
    pub origin: AccountId,
    pub dest: AccountId,
    pub value: Balance,
    pub gas_limit: Option<Weight>,
    pub storage_deposit_limit: Option<Balance>,
    pub input_data: Vec<u8>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_info(&self) -> Result<ChainInfo, ChainErr>;

    /// Free balance of `account` in base units. Missing accounts have zero.
    async fn free_balance(&self, account: &AccountId) -> Result<Balance, ChainErr>;

    async fn runtime_context(&self, account: &AccountId) -> Result<RuntimeContext, ChainErr>;

    /// Dry-runs a contract call, returning the SCALE encoded `ContractExecResult`.
    async fn contract_call(&self, request: &ContractCallRequest) -> Result<Vec<u8>, ChainErr>;

    /// Submits a signed extrinsic, returning its hash.
    async fn submit_extrinsic(&self, extrinsic: &[u8]) -> Result<Hash, ChainErr>;

    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}

#[must_use]
pub fn twox_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0; 16];
    out[..8].copy_from_slice(&xxhash_rust::xxh64::xxh64(data, 0).to_le_bytes());
    out[8..].copy_from_slice(&xxhash_rust::xxh64::xxh64(data, 1).to_le_bytes());
    out
}

#[must_use]
pub fn blake2_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0; 16];
    out.copy_from_slice(&Blake2b128::digest(data));
    out
}

#[must_use]
pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0; 32];
    out.copy_from_slice(&Blake2b256::digest(data));
    out
}

/// Storage key of `System.Account` for `account`, a `Blake2_128Concat` map.
#[must_use]
pub fn system_account_key(account: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + 16 + 16 + 32);
    key.extend_from_slice(&twox_128(b"System"));
    key.extend_from_slice(&twox_128(b"Account"));
    key.extend_from_slice(&blake2_128(account.as_bytes()));
    key.extend_from_slice(account.as_bytes());
    key
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct AccountData {
    pub free: Balance,
    pub reserved: Balance,
    pub frozen: Balance,
    pub flags: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct AccountInfo {
    pub nonce: u32,
    pub consumers: u32,
    pub providers: u32,
    pub sufficients: u32,
    pub data: AccountData,
}

/// Decodes a `0x` prefixed hex string returned by the node.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, ChainErr> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).map_err(|err| ChainErr::InvalidResponse(format!("bad hex: {err}")))
}

#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
