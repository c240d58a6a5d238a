// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! ink! message encoding.
//!
//! Call data is the 4 byte selector of the message followed by its SCALE
//! encoded arguments. Every message returns `Result<T, LangError>`, where
//! fallible messages use `T = Result<U, String>`.

use crate::chain::blake2_256;
use crate::contract::ContractErr;
use crate::primitives::{AccountId, Balance};
use scale::{Decode, Encode};

/// Errors raised by the ink! dispatcher before the message runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum LangError {
    #[codec(index = 1)]
    CouldNotReadInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    AddProject {
        project_wallet: AccountId,
    },
    CreateRound {
        matching_pool: Balance,
        eligible_projects: Vec<u32>,
        duration_hours: u64,
    },
    Contribute {
        round_id: u32,
        project_id: u32,
    },
    DistributeMatchingFunds {
        round_id: u32,
    },
    GetRoundData {
        round_id: u32,
    },
    GetProject {
        project_id: u32,
    },
    GetUserStats {
        user_address: AccountId,
    },
    GetUserContributions {
        user_address: AccountId,
    },
}

impl Message {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::AddProject { .. } => "add_project",
            Self::CreateRound { .. } => "create_round",
            Self::Contribute { .. } => "contribute",
            Self::DistributeMatchingFunds { .. } => "distribute_matching_funds",
            Self::GetRoundData { .. } => "get_round_data",
            Self::GetProject { .. } => "get_project",
            Self::GetUserStats { .. } => "get_user_stats",
            Self::GetUserContributions { .. } => "get_user_contributions",
        }
    }

    /// Whether the message mutates contract state.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::AddProject { .. }
                | Self::CreateRound { .. }
                | Self::Contribute { .. }
                | Self::DistributeMatchingFunds { .. }
        )
    }

    #[must_use]
    pub fn selector(&self) -> [u8; 4] {
        selector(self.label())
    }

    /// Selector followed by the encoded arguments.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.selector().to_vec();

        match self {
            Self::AddProject { project_wallet } => project_wallet.encode_to(&mut out),
            Self::CreateRound {
                matching_pool,
                eligible_projects,
                duration_hours,
            } => {
                matching_pool.encode_to(&mut out);
                eligible_projects.encode_to(&mut out);
                duration_hours.encode_to(&mut out);
            }
            Self::Contribute {
                round_id,
                project_id,
            } => {
                round_id.encode_to(&mut out);
                project_id.encode_to(&mut out);
            }
            Self::DistributeMatchingFunds { round_id } | Self::GetRoundData { round_id } => {
                round_id.encode_to(&mut out);
            }
            Self::GetProject { project_id } => project_id.encode_to(&mut out),
            Self::GetUserStats { user_address } | Self::GetUserContributions { user_address } => {
                user_address.encode_to(&mut out);
            }
        }

        out
    }
}

/// Selector of an ink! message: the first four bytes of `blake2b_256(label)`.
#[must_use]
pub fn selector(label: &str) -> [u8; 4] {
    let hash = blake2_256(label.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn decode_all<T: Decode>(data: &[u8]) -> Result<T, ContractErr> {
    let mut input = data;
    let value = T::decode(&mut input)?;

    if !input.is_empty() {
        return Err(ContractErr::Decode(format!(
            "{} trailing bytes in return value",
            input.len()
        )));
    }

    Ok(value)
}

/// Decodes the return value of an infallible message.
pub fn decode_return<T: Decode>(data: &[u8]) -> Result<T, ContractErr> {
    match decode_all::<Result<T, LangError>>(data)? {
        Ok(value) => Ok(value),
        Err(LangError::CouldNotReadInput) => Err(ContractErr::Rejected(
            "Contract could not read the call input".to_owned(),
        )),
    }
}

/// Decodes the return value of a message returning `Result<T, String>`.
pub fn decode_fallible<T: Decode>(data: &[u8]) -> Result<T, ContractErr> {
    decode_return::<Result<T, String>>(data)?.map_err(|message| ContractErr::from_message(&message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Project, RoundData};

    #[test]
    fn selectors_are_blake2_prefixes() {
        let hash = blake2_256(b"contribute");
        assert_eq!(selector("contribute"), [hash[0], hash[1], hash[2], hash[3]]);
        assert_ne!(selector("add_project"), selector("create_round"));
    }

    #[test]
    fn arguments_follow_the_selector() {
        let message = Message::Contribute {
            round_id: 2,
            project_id: 7,
        };
        let encoded = message.encode();
        assert_eq!(&encoded[..4], &selector("contribute"));
        assert_eq!(&encoded[4..], &[2, 0, 0, 0, 7, 0, 0, 0]);

        let message = Message::CreateRound {
            matching_pool: 1,
            eligible_projects: vec![1, 2],
            duration_hours: 168,
        };
        let encoded = message.encode();
        // u128 pool, compact length 2, two u32 ids, u64 duration
        assert_eq!(encoded.len(), 4 + 16 + 1 + 8 + 8);
        assert!(message.is_mutating());
        assert!(!Message::GetProject { project_id: 1 }.is_mutating());
    }

    #[test]
    fn it_decodes_fallible_results() {
        let ok: Result<Result<u32, String>, LangError> = Ok(Ok(3));
        assert_eq!(decode_fallible::<u32>(&ok.encode()), Ok(3));

        let err: Result<Result<u32, String>, LangError> =
            Ok(Err("Round does not exist".to_owned()));
        assert_eq!(
            decode_fallible::<u32>(&err.encode()),
            Err(ContractErr::RoundNotFound)
        );

        let lang: Result<Result<u32, String>, LangError> = Err(LangError::CouldNotReadInput);
        assert_eq!(lang.encode(), vec![1, 1]);
        assert!(matches!(
            decode_fallible::<u32>(&lang.encode()),
            Err(ContractErr::Rejected(_))
        ));
    }

    #[test]
    fn it_decodes_plain_results() {
        let none: Result<Option<Project>, LangError> = Ok(None);
        assert_eq!(decode_return::<Option<Project>>(&none.encode()), Ok(None));

        // Garbage is a decode error, not a panic
        assert!(matches!(
            decode_fallible::<RoundData>(&[0, 0, 1]),
            Err(ContractErr::Decode(_))
        ));
        assert!(matches!(
            decode_return::<u32>(&[0, 1, 0, 0, 0, 9]),
            Err(ContractErr::Decode(_))
        ));
    }
}
