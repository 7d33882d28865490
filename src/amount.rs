// Copyright 2025 chenjjiaa
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Conversion between human-readable decimal amounts and the integer
//! fixed-point amounts used on-chain.

use ethers::types::U256;
use rust_decimal::Decimal;

use crate::error::SwapError;
use crate::token::Token;

/// Quantity in a token's smallest unit (e.g. wei).
pub type RawAmount = U256;

/// Fractional digits kept by [`to_display_amount`].
pub const MAX_DISPLAY_DECIMALS: usize = 4;

/// Number of digits after the decimal point, ignoring trailing zeros.
pub fn count_decimals(amount: &Decimal) -> u32 {
    amount.normalize().scale()
}

/// Parses a human-readable amount. Input that does not fit a `Decimal`
/// without rounding is rejected.
pub fn parse_amount(amount: &str) -> Result<Decimal, SwapError> {
    Decimal::from_str_exact(amount.trim())
        .map_err(|e| SwapError::InvalidAmount(format!("cannot parse {:?}: {}", amount, e)))
}

/// Converts `amount` to raw units of a token with `decimals` decimals.
///
/// The decimal point is removed first (`amount * 10^k` where `k` is the
/// number of fractional digits present), the integer is scaled to full
/// precision and the `10^k` factor is divided back out, all in U256. Amounts
/// that are negative or more precise than the token are rejected.
pub fn to_raw_amount(amount: Decimal, decimals: u8) -> Result<RawAmount, SwapError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(SwapError::InvalidAmount(format!(
            "{} is negative",
            amount
        )));
    }

    let normalized = amount.normalize();
    let extra_digits = normalized.scale();
    if extra_digits > u32::from(decimals) {
        return Err(SwapError::InvalidAmount(format!(
            "{} has {} decimal places but the token supports {}",
            amount, extra_digits, decimals
        )));
    }

    let adjusted = U256::from(normalized.mantissa().unsigned_abs());
    let scale = pow10(u32::from(decimals))?;
    let extra = pow10(extra_digits)?;

    let scaled = adjusted.checked_mul(scale).ok_or_else(|| {
        SwapError::InvalidAmount(format!("{} overflows 256 bits at {} decimals", amount, decimals))
    })?;

    Ok(scaled / extra)
}

/// Formats a raw amount for display, truncated to [`MAX_DISPLAY_DECIMALS`]
/// fractional digits. Never feed the result back into on-chain calls.
pub fn to_display_amount(raw_amount: RawAmount, decimals: u8) -> String {
    let digits = raw_amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (integer, fraction) = padded.split_at(padded.len() - decimals);

    let truncated = &fraction[..fraction.len().min(MAX_DISPLAY_DECIMALS)];
    let trimmed = truncated.trim_end_matches('0');
    let fraction = if trimmed.is_empty() { "0" } else { trimmed };

    format!("{}.{}", integer, fraction)
}

/// Renders a trade as `"1.0 USDC for 0.0003 WETH"`.
pub fn display_trade(
    amount_in: RawAmount,
    token_in: &Token,
    amount_out: RawAmount,
    token_out: &Token,
) -> String {
    format!(
        "{} {} for {} {}",
        to_display_amount(amount_in, token_in.decimals),
        token_in.symbol,
        to_display_amount(amount_out, token_out.decimals),
        token_out.symbol
    )
}

fn pow10(exponent: u32) -> Result<U256, SwapError> {
    U256::from(10u8)
        .checked_pow(U256::from(exponent))
        .ok_or_else(|| SwapError::InvalidAmount(format!("10^{} overflows 256 bits", exponent)))
}
