//! Fixed-Point Math for the vault-manager protocol
//!
//! Stored values are `u128`; every product that can exceed that range is
//! computed in `U256` and narrowed back with an explicit overflow check.

use primitive_types::U256;

use crate::constants::base::{BASE_INTEREST, BASE_PARAMS};
use crate::errors::{VaultError, VaultResult};

/// Widen a `u128` for intermediate products
#[inline]
pub fn wide(value: u128) -> U256 {
    U256::from(value)
}

/// Narrow a `U256` back to `u128`
pub fn narrow(value: U256) -> VaultResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(VaultError::Overflow);
    }
    Ok(value.low_u128())
}

/// Checked U256 multiplication
pub fn checked_mul(a: U256, b: U256) -> VaultResult<U256> {
    a.checked_mul(b).ok_or(VaultError::Overflow)
}

/// Checked U256 division
pub fn checked_div(a: U256, b: U256) -> VaultResult<U256> {
    if b.is_zero() {
        return Err(VaultError::DivisionByZero);
    }
    Ok(a / b)
}

/// `a * b / denominator`, rounded down
pub fn mul_div(a: u128, b: u128, denominator: u128) -> VaultResult<u128> {
    if denominator == 0 {
        return Err(VaultError::DivisionByZero);
    }
    narrow(wide(a) * wide(b) / wide(denominator))
}

/// `a * b / denominator`, rounded up
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> VaultResult<u128> {
    if denominator == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let numerator = wide(a) * wide(b);
    let denominator = wide(denominator);
    let mut result = numerator / denominator;
    if !(numerator % denominator).is_zero() {
        result += U256::one();
    }
    narrow(result)
}

/// Safe addition
pub fn safe_add(a: u128, b: u128) -> VaultResult<u128> {
    a.checked_add(b).ok_or(VaultError::Overflow)
}

/// Safe subtraction
pub fn safe_sub(a: u128, b: u128) -> VaultResult<u128> {
    a.checked_sub(b).ok_or(VaultError::Underflow)
}

/// `10^decimals` as a `u128`
pub fn pow10(decimals: u8) -> VaultResult<u128> {
    10u128.checked_pow(decimals as u32).ok_or(VaultError::Overflow)
}

// ============ Interest ============

/// `(1 + rate)^elapsed` in `BASE_INTEREST`, exact up to per-step rounding
///
/// Exponentiation by squaring; each multiplication rounds half up.
pub fn compound_factor(rate: u64, elapsed: u64) -> VaultResult<U256> {
    let one = wide(BASE_INTEREST);
    if rate == 0 || elapsed == 0 {
        return Ok(one);
    }
    let half = one / 2;
    let mut base = one + U256::from(rate);
    let mut result = if elapsed % 2 == 1 { base } else { one };
    let mut n = elapsed / 2;

    while n > 0 {
        base = (checked_mul(base, base)? + half) / one;
        if n % 2 == 1 {
            result = (checked_mul(result, base)? + half) / one;
        }
        n /= 2;
    }

    Ok(result)
}

/// Accumulator after `elapsed` seconds at `rate`
pub fn accumulate(accumulator: u128, rate: u64, elapsed: u64) -> VaultResult<u128> {
    let factor = compound_factor(rate, elapsed)?;
    narrow(checked_mul(wide(accumulator), factor)? / wide(BASE_INTEREST))
}

/// Actual debt of a normalized amount, rounded down
pub fn normalized_to_debt(normalized: u128, accumulator: u128) -> VaultResult<u128> {
    mul_div(normalized, accumulator, BASE_INTEREST)
}

/// Actual debt of a normalized amount, rounded up
pub fn normalized_to_debt_up(normalized: u128, accumulator: u128) -> VaultResult<u128> {
    mul_div_up(normalized, accumulator, BASE_INTEREST)
}

/// Normalized amount of an actual debt, rounded down
pub fn debt_to_normalized(amount: u128, accumulator: u128) -> VaultResult<u128> {
    mul_div(amount, BASE_INTEREST, accumulator)
}

/// Non-zero normalized debt worth less than `dust`
///
/// Compared on the unrounded product so that rounding never hides dust.
pub fn is_dusty(normalized: u128, accumulator: u128, dust: u128) -> bool {
    normalized > 0 && wide(normalized) * wide(accumulator) < wide(dust) * wide(BASE_INTEREST)
}

// ============ Solvency ============

/// Collateral value in stablecoin terms
///
/// `price` is the value of one whole collateral unit with 18 decimals,
/// `collat_base` is `10^collateral_decimals`.
pub fn collateral_in_stable(collateral: u128, price: u128, collat_base: u128) -> VaultResult<u128> {
    mul_div(collateral, price, collat_base)
}

/// Health factor in `BASE_PARAMS`
///
/// `u128::MAX` for a vault without debt. Below `BASE_PARAMS` the vault is
/// liquidatable.
pub fn health_factor(collateral_in_stable: u128, collateral_factor: u64, debt: u128) -> VaultResult<u128> {
    if debt == 0 {
        return Ok(u128::MAX);
    }
    mul_div(collateral_in_stable, collateral_factor as u128, debt)
}

/// A health factor at or above one
pub fn is_solvent(health_factor: u128) -> bool {
    health_factor >= BASE_PARAMS
}

/// Apply a fee in `BASE_PARAMS` to an amount, rounded down
pub fn fee_of(amount: u128, fee: u64) -> VaultResult<u128> {
    mul_div(amount, fee as u128, BASE_PARAMS)
}
