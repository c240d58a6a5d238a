// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Signed `Contracts.call` extrinsics in the v4 transaction format.

use crate::chain::{blake2_256, RuntimeContext, Weight};
use crate::primitives::{AccountId, Balance};
use crate::settings::Contract as ContractSettings;
use crate::wallet::Signer;
use scale::{Compact, Encode};

const EXTRINSIC_VERSION: u8 = 4;
const SIGNED_FLAG: u8 = 0b1000_0000;

/// Call index of `call` inside `pallet-contracts`.
pub const CONTRACTS_CALL_INDEX: u8 = 6;

/// `MultiAddress::Id`
const MULTI_ADDRESS_ID: u8 = 0;

/// `MultiSignature::Sr25519`
const MULTI_SIGNATURE_SR25519: u8 = 1;

/// Payloads longer than this are hashed before signing.
const MAX_UNHASHED_PAYLOAD: usize = 256;

/// Runtime specific layout of the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtrinsicParams {
    pub pallet_index: u8,
    pub call_index: u8,
    pub charge_asset_tx_payment: bool,
    pub check_metadata_hash: bool,
}

impl ExtrinsicParams {
    #[must_use]
    pub fn from_settings(settings: &ContractSettings) -> Self {
        Self {
            pallet_index: settings.pallet_index,
            call_index: CONTRACTS_CALL_INDEX,
            charge_asset_tx_payment: settings.charge_asset_tx_payment,
            check_metadata_hash: settings.check_metadata_hash,
        }
    }
}

/// Arguments of `Contracts.call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractsCall {
    pub dest: AccountId,
    pub value: Balance,
    pub gas_limit: Weight,
    pub storage_deposit_limit: Option<Balance>,
    pub data: Vec<u8>,
}

impl ContractsCall {
    #[must_use]
    pub fn encode_call(&self, params: &ExtrinsicParams) -> Vec<u8> {
        let mut out = vec![params.pallet_index, params.call_index];
        out.push(MULTI_ADDRESS_ID);
        self.dest.encode_to(&mut out);
        Compact(self.value).encode_to(&mut out);
        self.gas_limit.encode_to(&mut out);
        self.storage_deposit_limit.map(Compact).encode_to(&mut out);
        self.data.encode_to(&mut out);
        out
    }
}

/// Signed extension data included in the transaction body.
fn encode_extra(ctx: &RuntimeContext, params: &ExtrinsicParams) -> Vec<u8> {
    let mut out = Vec::new();

    // Immortal era
    out.push(0);
    Compact(ctx.nonce).encode_to(&mut out);

    // Tip
    Compact(0u128).encode_to(&mut out);
    if params.charge_asset_tx_payment {
        // Pay fees in the native asset
        None::<u32>.encode_to(&mut out);
    }

    if params.check_metadata_hash {
        // Disabled mode
        out.push(0);
    }

    out
}

/// Signed extension data which is only part of the signing payload.
fn encode_additional(ctx: &RuntimeContext, params: &ExtrinsicParams) -> Vec<u8> {
    let mut out = Vec::new();
    ctx.spec_version.encode_to(&mut out);
    ctx.transaction_version.encode_to(&mut out);
    ctx.genesis_hash.encode_to(&mut out);

    // Immortal transactions are checked against the genesis block
    ctx.genesis_hash.encode_to(&mut out);

    if params.check_metadata_hash {
        None::<[u8; 32]>.encode_to(&mut out);
    }

    out
}

/// Payload the signer commits to.
#[must_use]
pub fn signing_payload(call: &[u8], ctx: &RuntimeContext, params: &ExtrinsicParams) -> Vec<u8> {
    let mut payload = call.to_vec();
    payload.extend(encode_extra(ctx, params));
    payload.extend(encode_additional(ctx, params));

    if payload.len() > MAX_UNHASHED_PAYLOAD {
        blake2_256(&payload).to_vec()
    } else {
        payload
    }
}

/// Builds a length prefixed signed extrinsic ready for submission.
#[must_use]
pub fn build_signed_extrinsic(
    call: &[u8],
    signer: &dyn Signer,
    ctx: &RuntimeContext,
    params: &ExtrinsicParams,
) -> Vec<u8> {
    let payload = signing_payload(call, ctx, params);
    let signature = signer.sign(&payload);

    let mut body = vec![SIGNED_FLAG | EXTRINSIC_VERSION];
    body.push(MULTI_ADDRESS_ID);
    signer.public().encode_to(&mut body);
    body.push(MULTI_SIGNATURE_SR25519);
    body.extend_from_slice(&signature);
    body.extend(encode_extra(ctx, params));
    body.extend_from_slice(call);

    // `Vec<u8>` encodes with a compact length prefix
    body.encode()
}
