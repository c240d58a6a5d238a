// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use blake2::{Blake2b512, Digest};
use scale::{Decode, Encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const ACCOUNT_ID_BYTES: usize = 32;

/// Generic substrate format, used when no network is known.
pub const GENERIC_SS58_FORMAT: u16 = 42;

const SS58_PREFIX: &[u8] = b"SS58PRE";
const CHECKSUM_BYTES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressErr {
    /// Not valid base58
    InvalidEncoding,

    /// Decoded payload has the wrong size
    InvalidLength,

    /// Checksum does not match
    InvalidChecksum,

    /// Address format is reserved or out of range
    InvalidFormat,
}

impl fmt::Display for AddressErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding => write!(f, "address is not valid base58"),
            Self::InvalidLength => write!(f, "address has an invalid length"),
            Self::InvalidChecksum => write!(f, "address checksum mismatch"),
            Self::InvalidFormat => write!(f, "address uses an unsupported format"),
        }
    }
}

impl std::error::Error for AddressErr {}

/// 32 byte account identifier, displayed as SS58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct AccountId(pub [u8; ACCOUNT_ID_BYTES]);

impl AccountId {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn zero() -> Self {
        Self([0; ACCOUNT_ID_BYTES])
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressErr> {
        if bytes.len() != ACCOUNT_ID_BYTES {
            return Err(AddressErr::InvalidLength);
        }

        let mut out = Self::zero();
        out.0.copy_from_slice(bytes);
        Ok(out)
    }

    /// Encodes the account with the given address format.
    #[must_use]
    pub fn to_ss58(&self, format: u16) -> String {
        let mut buf = Vec::with_capacity(2 + ACCOUNT_ID_BYTES + CHECKSUM_BYTES);
        buf.extend_from_slice(&encode_prefix(format));
        buf.extend_from_slice(&self.0);
        let checksum = ss58_checksum(&buf);
        buf.extend_from_slice(&checksum[..CHECKSUM_BYTES]);
        bs58::encode(buf).into_string()
    }

    /// Decodes an SS58 address, returning the account and its format.
    pub fn from_ss58(encoded: &str) -> Result<(Self, u16), AddressErr> {
        let data = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| AddressErr::InvalidEncoding)?;

        if data.is_empty() {
            return Err(AddressErr::InvalidLength);
        }

        let (format, prefix_len) = match data[0] {
            0..=63 => (u16::from(data[0]), 1),
            64..=127 => {
                if data.len() < 2 {
                    return Err(AddressErr::InvalidLength);
                }
                let lower = (data[0] << 2) | (data[1] >> 6);
                let upper = data[1] & 0b0011_1111;
                (u16::from(lower) | (u16::from(upper) << 8), 2)
            }
            _ => return Err(AddressErr::InvalidFormat),
        };

        if data.len() != prefix_len + ACCOUNT_ID_BYTES + CHECKSUM_BYTES {
            return Err(AddressErr::InvalidLength);
        }

        let body_len = prefix_len + ACCOUNT_ID_BYTES;
        let checksum = ss58_checksum(&data[..body_len]);
        if checksum[..CHECKSUM_BYTES] != data[body_len..] {
            return Err(AddressErr::InvalidChecksum);
        }

        Ok((Self::from_slice(&data[prefix_len..body_len])?, format))
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

fn encode_prefix(format: u16) -> Vec<u8> {
    // Only the lower 14 bits are meaningful
    let format = format & 0b0011_1111_1111_1111;

    if format < 64 {
        return vec![format as u8];
    }

    let first = ((format & 0b0000_0000_1111_1100) as u8) >> 2;
    let second = ((format >> 8) as u8) | (((format & 0b0000_0000_0000_0011) as u8) << 6);
    vec![first | 0b0100_0000, second]
}

fn ss58_checksum(data: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PREFIX);
    hasher.update(data);
    let mut out = [0; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

impl FromStr for AccountId {
    type Err = AddressErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Some(hexstr) = trimmed.strip_prefix("0x") {
            let bytes = hex::decode(hexstr).map_err(|_| AddressErr::InvalidEncoding)?;
            return Self::from_slice(&bytes);
        }

        Self::from_ss58(trimmed).map(|(account, _)| account)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ss58(GENERIC_SS58_FORMAT))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccountId")
            .field(&self.to_ss58(GENERIC_SS58_FORMAT))
            .finish()
    }
}

impl Serialize for AccountId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        String::serialize(&self.to_ss58(GENERIC_SS58_FORMAT), serializer)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D>(deserializer: D) -> Result<AccountId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        AccountId::from_str(&string).map_err(serde::de::Error::custom)
    }
}

/// Shortens an address for display, e.g. `5GrwvaEF...KutQY`.
#[must_use]
pub fn format_address(address: &str, length: usize) -> String {
    if address.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= length * 2 {
        return address.to_owned();
    }

    let head: String = chars[..length].iter().collect();
    let tail: String = chars[chars.len() - length..].iter().collect();
    format!("{head}...{tail}")
}
