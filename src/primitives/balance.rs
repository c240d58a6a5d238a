// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Conversions between display units and on-chain base units.
//!
//! Amounts cross the contract boundary as base-unit integers scaled by
//! `10^decimals` of the connected network. Presentation code works with
//! [`Decimal`] values and only converts at the edges.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;

/// Base-unit amount, as stored by the chain.
pub type Balance = u128;

/// Fractional digits shown for account balances.
pub const BALANCE_DISPLAY_DIGITS: u32 = 4;

/// Largest number of decimals a network may declare.
pub const MAX_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountErr {
    /// Input was empty
    Empty,

    /// Input could not be parsed as a decimal number
    Invalid(String),

    /// Input was negative
    Negative,

    /// Input has more fractional digits than the network supports
    TooPrecise { decimals: u32 },

    /// Value does not fit into the target representation
    Overflow,
}

impl fmt::Display for AmountErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Please enter an amount"),
            Self::Invalid(input) => write!(f, "Invalid amount: {input}"),
            Self::Negative => write!(f, "Amount must not be negative"),
            Self::TooPrecise { decimals } => {
                write!(f, "Amount supports at most {decimals} decimal places")
            }
            Self::Overflow => write!(f, "Amount is too large"),
        }
    }
}

impl std::error::Error for AmountErr {}

/// Parses a display amount such as `"12.5"` into base units.
pub fn to_base_units(display: &str, decimals: u32) -> Result<Balance, AmountErr> {
    let trimmed = display.trim();

    if trimmed.is_empty() {
        return Err(AmountErr::Empty);
    }

    if decimals > MAX_DECIMALS {
        return Err(AmountErr::Overflow);
    }

    let value = Decimal::from_str(trimmed).map_err(|_| AmountErr::Invalid(trimmed.to_owned()))?;
    to_base_units_decimal(value, decimals)
}

/// Converts a display [`Decimal`] into base units.
pub fn to_base_units_decimal(value: Decimal, decimals: u32) -> Result<Balance, AmountErr> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountErr::Negative);
    }

    let value = value.normalize();
    if value.scale() > decimals {
        return Err(AmountErr::TooPrecise { decimals });
    }

    // Split into integer and fractional parts so large values never need a
    // decimal with more than 28 significant digits.
    let int_part = value.trunc();
    let frac_part = value - int_part;
    let unit = 10u128.checked_pow(decimals).ok_or(AmountErr::Overflow)?;

    let int_units = int_part
        .to_u128()
        .ok_or(AmountErr::Overflow)?
        .checked_mul(unit)
        .ok_or(AmountErr::Overflow)?;

    let frac_units = if frac_part.is_zero() {
        0
    } else {
        let mantissa = frac_part.mantissa().unsigned_abs();
        let shift = decimals - frac_part.scale();
        mantissa
            .checked_mul(10u128.pow(shift))
            .ok_or(AmountErr::Overflow)?
    };

    int_units.checked_add(frac_units).ok_or(AmountErr::Overflow)
}

/// Converts base units into a display [`Decimal`].
///
/// Values beyond the range of [`Decimal`] saturate at [`Decimal::MAX`].
#[must_use]
pub fn from_base_units(amount: Balance, decimals: u32) -> Decimal {
    let decimals = decimals.min(MAX_DECIMALS);
    let unit = 10u128.pow(decimals);
    let int_part = amount / unit;
    let frac_part = amount % unit;

    let int_dec = match Decimal::from_u128(int_part) {
        Some(v) => v,
        None => return Decimal::MAX,
    };

    // `frac_part < 10^18`, always representable
    let frac_dec = Decimal::from_i128_with_scale(frac_part as i128, decimals);
    int_dec
        .checked_add(frac_dec)
        .unwrap_or(Decimal::MAX)
        .normalize()
}

/// Formats a balance with four fractional digits, truncating.
#[must_use]
pub fn format_balance(amount: Balance, decimals: u32) -> String {
    let value = from_base_units(amount, decimals)
        .round_dp_with_strategy(BALANCE_DISPLAY_DIGITS, RoundingStrategy::ToZero);
    format!("{:.*}", BALANCE_DISPLAY_DIGITS as usize, value)
}

/// Formats a balance followed by the network symbol, e.g. `1.2500 DOT`.
#[must_use]
pub fn format_balance_with_symbol(amount: Balance, decimals: u32, symbol: &str) -> String {
    format!("{} {symbol}", format_balance(amount, decimals))
}

/// Compact display used on cards and round summaries: `1.5M`, `2.3K`, `12.50`.
#[must_use]
pub fn format_compact(value: Decimal) -> String {
    let million = dec!(1_000_000);
    let thousand = dec!(1_000);

    if value >= million {
        format!("{:.1}M", (value / million).round_dp(1))
    } else if value >= thousand {
        format!("{:.1}K", (value / thousand).round_dp(1))
    } else {
        format!("{:.2}", value.round_dp(2))
    }
}
