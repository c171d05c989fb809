//! Price Oracle
//!
//! Operator-updated price feed for one collateral. Vault managers read it
//! through the `Oracle` trait; a price is the value of one whole collateral
//! unit in stablecoin, with 18 decimals.
//!
//! ## Rules
//!
//! - Only the operator updates the price, only the admin changes the operator
//! - An update may not move the price by more than `MAX_PRICE_DEVIATION_BPS`
//! - Reads fail once the last update is older than `max_age`
//!
//! `SharedPriceFeed` wraps the state behind `Arc<RwLock<_>>` so tests and
//! keepers can move the price while a manager holds a handle to the feed.

use std::sync::{Arc, RwLock};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vaultkit_common::{
    constants::oracle::{BPS_DENOMINATOR, MAX_PRICE_AGE_SECONDS, MAX_PRICE_DEVIATION_BPS},
    errors::{AmountErrorReason, VaultError, VaultResult},
    events::{EventLog, VaultEvent},
    oracle::{Oracle, PriceData},
    types::{Address, ZERO_ADDRESS},
};

const LOG_TARGET: &str = "price-oracle";

// ============ Oracle State ============

/// Price feed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceFeedState {
    /// Current price data
    pub price: PriceData,
    /// Authorized operator (can update price)
    pub operator: Address,
    /// Admin (can change operator)
    pub admin: Address,
    /// Maximum age of a usable price, in seconds
    pub max_age: u64,
    /// Whether oracle is active
    pub is_active: bool,
    /// Maximum move per update; 0 disables the check
    pub max_deviation_bps: u64,
}

impl PriceFeedState {
    pub fn new(admin: Address, operator: Address, initial_price: u128, now: u64) -> Self {
        Self {
            price: PriceData::new(initial_price, now),
            operator,
            admin,
            max_age: MAX_PRICE_AGE_SECONDS,
            is_active: true,
            max_deviation_bps: MAX_PRICE_DEVIATION_BPS,
        }
    }

    /// Apply a price update from `caller`
    pub fn update_price(&mut self, caller: &Address, new_price: u128, now: u64, events: &mut EventLog) -> VaultResult<()> {
        if *caller != self.operator {
            return Err(VaultError::Unauthorized {
                expected: self.operator,
                actual: *caller,
            });
        }
        if !self.is_active {
            return Err(VaultError::OracleUnavailable);
        }
        if new_price == 0 {
            return Err(VaultError::InvalidAmount {
                amount: new_price,
                reason: AmountErrorReason::Zero,
            });
        }

        let old_price = self.price.price;
        // The first price is free, later ones are bounded
        if old_price != 0 && self.max_deviation_bps != 0 {
            let deviation = calculate_price_deviation(old_price, new_price);
            if deviation > self.max_deviation_bps {
                return Err(VaultError::OraclePriceDeviation {
                    old_price,
                    new_price,
                    max_deviation_bps: self.max_deviation_bps,
                });
            }
        }

        self.price = PriceData::new(new_price, now);
        events.emit(VaultEvent::PriceUpdated {
            old_price,
            new_price,
            timestamp: now,
        });
        log::debug!(target: LOG_TARGET, "price updated from {} to {}", old_price, new_price);
        Ok(())
    }

    /// Replace the operator (admin only)
    pub fn set_operator(&mut self, caller: &Address, new_operator: Address, now: u64, events: &mut EventLog) -> VaultResult<()> {
        if *caller != self.admin {
            return Err(VaultError::Unauthorized {
                expected: self.admin,
                actual: *caller,
            });
        }
        if new_operator == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        if new_operator == self.operator {
            return Err(VaultError::InvalidParameterValue { parameter: "operator" });
        }

        events.emit(VaultEvent::OracleOperatorChanged {
            old_operator: self.operator,
            new_operator,
            timestamp: now,
        });
        log::info!(target: LOG_TARGET, "oracle operator changed");
        self.operator = new_operator;
        Ok(())
    }

    /// Current price if usable at `now`
    pub fn get_price(&self, now: u64) -> VaultResult<u128> {
        if !self.is_active {
            return Err(VaultError::OracleUnavailable);
        }
        self.price.fresh_price(now, self.max_age)
    }

    /// Check if price is fresh (not stale)
    pub fn is_price_fresh(&self, now: u64) -> bool {
        self.is_active && !self.price.is_stale(now, self.max_age)
    }
}

// ============ Shared Feed ============

#[derive(Debug, Default)]
struct FeedInner {
    state: Option<PriceFeedState>,
    events: EventLog,
}

/// Cloneable handle to a price feed
#[derive(Debug, Clone, Default)]
pub struct SharedPriceFeed {
    inner: Arc<RwLock<FeedInner>>,
}

impl SharedPriceFeed {
    pub fn new(state: PriceFeedState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(FeedInner {
                state: Some(state),
                events: EventLog::new(),
            })),
        }
    }

    /// Feed with `operator` as both admin and operator
    pub fn with_price(operator: Address, price: u128, now: u64) -> Self {
        Self::new(PriceFeedState::new(operator, operator, price, now))
    }

    pub fn update_price(&self, caller: &Address, price: u128, now: u64) -> VaultResult<()> {
        let mut inner = self.inner.write().map_err(|_| VaultError::OracleUnavailable)?;
        let FeedInner { state, events } = &mut *inner;
        state
            .as_mut()
            .ok_or(VaultError::OracleUnavailable)?
            .update_price(caller, price, now, events)
    }

    pub fn set_operator(&self, caller: &Address, operator: Address, now: u64) -> VaultResult<()> {
        let mut inner = self.inner.write().map_err(|_| VaultError::OracleUnavailable)?;
        let FeedInner { state, events } = &mut *inner;
        state
            .as_mut()
            .ok_or(VaultError::OracleUnavailable)?
            .set_operator(caller, operator, now, events)
    }

    /// Turn the feed on or off (admin only)
    pub fn set_active(&self, caller: &Address, active: bool) -> VaultResult<()> {
        let mut inner = self.inner.write().map_err(|_| VaultError::OracleUnavailable)?;
        let state = inner.state.as_mut().ok_or(VaultError::OracleUnavailable)?;
        if *caller != state.admin {
            return Err(VaultError::Unauthorized {
                expected: state.admin,
                actual: *caller,
            });
        }
        state.is_active = active;
        Ok(())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Option<PriceFeedState> {
        self.inner.read().ok().and_then(|inner| inner.state.clone())
    }

    /// Number of events emitted by the feed
    pub fn event_count(&self) -> usize {
        self.inner.read().map(|inner| inner.events.len()).unwrap_or_default()
    }
}

impl Oracle for SharedPriceFeed {
    fn read(&self, now: u64) -> VaultResult<u128> {
        let inner = self.inner.read().map_err(|_| VaultError::OracleUnavailable)?;
        inner
            .state
            .as_ref()
            .ok_or(VaultError::OracleUnavailable)?
            .get_price(now)
    }
}

// ============ Helper Functions ============

/// Price deviation in basis points
///
/// 100 bps = 1%, 10000 bps = 100%
pub fn calculate_price_deviation(old_price: u128, new_price: u128) -> u64 {
    if old_price == 0 {
        return BPS_DENOMINATOR;
    }

    let diff = old_price.abs_diff(new_price);
    let deviation = primitive_types::U256::from(diff) * primitive_types::U256::from(BPS_DENOMINATOR)
        / primitive_types::U256::from(old_price);
    if deviation > primitive_types::U256::from(u64::MAX) {
        u64::MAX
    } else {
        deviation.low_u64()
    }
}

/// Convert price to different decimal precision
pub fn convert_price_decimals(price: u128, from_decimals: u8, to_decimals: u8) -> u128 {
    if from_decimals >= to_decimals {
        let divisor = 10u128.saturating_pow((from_decimals - to_decimals) as u32);
        price / divisor
    } else {
        let multiplier = 10u128.saturating_pow((to_decimals - from_decimals) as u32);
        price.saturating_mul(multiplier)
    }
}

// ============ Tests ============
