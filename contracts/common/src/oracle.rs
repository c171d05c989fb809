//! Oracle Interface
//!
//! The engine consumes prices through the `Oracle` trait only. A price is
//! the value of one whole collateral unit in stablecoin terms, with 18
//! decimals. Any failure to produce a fresh price makes solvency impossible
//! to evaluate, so the calling action is rejected.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{VaultError, VaultResult};

/// Read-only price source
pub trait Oracle {
    /// Current price at timestamp `now`
    ///
    /// # Errors
    /// `OracleStale` or `OracleUnavailable` when no usable price exists.
    fn read(&self, now: u64) -> VaultResult<u128>;
}

/// A price and the time it was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceData {
    /// Price with 18 decimals
    pub price: u128,
    /// Timestamp of the observation
    pub updated_at: u64,
}

impl PriceData {
    pub fn new(price: u128, updated_at: u64) -> Self {
        Self { price, updated_at }
    }

    /// Age of the observation at `now` (0 for observations from the future)
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.updated_at)
    }

    /// Check if price is stale
    pub fn is_stale(&self, now: u64, max_age: u64) -> bool {
        self.age(now) > max_age
    }

    /// The price if it is usable at `now`
    pub fn fresh_price(&self, now: u64, max_age: u64) -> VaultResult<u128> {
        if self.price == 0 {
            return Err(VaultError::OracleUnavailable);
        }
        if self.is_stale(now, max_age) {
            return Err(VaultError::OracleStale {
                last_update: self.updated_at,
                now,
                max_age,
            });
        }
        Ok(self.price)
    }
}
