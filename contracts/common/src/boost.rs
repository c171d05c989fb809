//! Liquidation Boost Curve
//!
//! Piecewise-linear mapping from a liquidator's boost balance to a multiplier
//! (in `BASE_PARAMS`) on the base liquidation discount.
//!
//! ## Key Features
//!
//! - **Checked at write time**: strictly increasing `x`, non-decreasing `y`,
//!   positive first multiplier
//! - **Binary-search lookup**: segment found with `partition_point`
//! - **Clamped ends**: balances outside the curve take the nearest end value

use borsh::{BorshDeserialize, BorshSerialize};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::constants::limits::MAX_BOOST_POINTS;
use crate::errors::{VaultError, VaultResult};
use crate::types::Address;
use crate::Vec;

/// Source of the balance a liquidator's boost is looked up with
pub trait BoostSource {
    /// Boost balance of `account`
    fn boost_balance(&self, account: &Address) -> u128;
}

/// Sorted `(x, y)` points stored as parallel arrays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BoostCurve {
    x_boost: Vec<u128>,
    y_boost: Vec<u64>,
}

impl BoostCurve {
    /// Validate and build a curve
    ///
    /// # Errors
    /// `InvalidSetOfParameters` when the arrays differ in length, are empty or
    /// too long, when `y[0]` is zero, or when the points are not sorted.
    pub fn new(x_boost: Vec<u128>, y_boost: Vec<u64>) -> VaultResult<Self> {
        if x_boost.len() != y_boost.len() {
            return Err(VaultError::InvalidSetOfParameters { reason: "boost arrays differ in length" });
        }
        if x_boost.is_empty() || x_boost.len() > MAX_BOOST_POINTS {
            return Err(VaultError::InvalidSetOfParameters { reason: "boost point count out of range" });
        }
        if y_boost[0] == 0 {
            return Err(VaultError::InvalidSetOfParameters { reason: "base boost is zero" });
        }
        for i in 1..x_boost.len() {
            if x_boost[i] <= x_boost[i - 1] {
                return Err(VaultError::InvalidSetOfParameters { reason: "boost thresholds not increasing" });
            }
            if y_boost[i] < y_boost[i - 1] {
                return Err(VaultError::InvalidSetOfParameters { reason: "boost multipliers decreasing" });
            }
        }
        Ok(Self { x_boost, y_boost })
    }

    /// Single-point curve applying `base_boost` to everyone
    pub fn flat(base_boost: u64) -> VaultResult<Self> {
        let mut x_boost = Vec::new();
        x_boost.push(0);
        let mut y_boost = Vec::new();
        y_boost.push(base_boost);
        Self::new(x_boost, y_boost)
    }

    pub fn x_boost(&self) -> &[u128] {
        &self.x_boost
    }

    pub fn y_boost(&self) -> &[u64] {
        &self.y_boost
    }

    /// Multiplier of the first point
    pub fn base_boost(&self) -> u64 {
        self.y_boost.first().copied().unwrap_or_default()
    }

    /// Multiplier for a boost balance
    pub fn boost_at(&self, balance: u128) -> u64 {
        let (first_x, last_x) = match (self.x_boost.first(), self.x_boost.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0,
        };
        if balance <= first_x {
            return self.base_boost();
        }
        if balance >= last_x {
            return self.y_boost.last().copied().unwrap_or_default();
        }

        // first_x < balance < last_x, so 1 <= upper <= len - 1
        let upper = self.x_boost.partition_point(|x| *x <= balance);
        let lower = upper - 1;
        interpolate_linear_segment(
            self.x_boost[lower],
            self.x_boost[upper],
            self.y_boost[lower],
            self.y_boost[upper],
            balance,
        )
    }
}

/// `f(x)` on the segment `(x0, y0)`-`(x1, y1)`; assumes `x0 <= x <= x1`, `x0 < x1`, `y0 <= y1`
fn interpolate_linear_segment(x0: u128, x1: u128, y0: u64, y1: u64, x: u128) -> u64 {
    if x <= x0 || x1 <= x0 {
        return y0;
    }
    if x >= x1 {
        return y1;
    }
    let delta = U256::from(y1.saturating_sub(y0)) * U256::from(x - x0) / U256::from(x1 - x0);
    y0.saturating_add(delta.low_u64())
}
