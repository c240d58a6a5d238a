// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

mod address;
pub mod balance;
mod types;

pub use crate::primitives::address::*;
pub use crate::primitives::balance::{format_balance, format_compact, AmountErr, Balance};
pub use crate::primitives::types::*;
