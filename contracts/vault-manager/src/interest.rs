//! Interest Accumulator
//!
//! Debt is stored normalized: a vault's actual debt is its normalized debt
//! times the accumulator. The accumulator compounds the per-second rate
//! lazily, on the first mutating call of each instant, and the interest it
//! adds to outstanding debt becomes surplus.

use vaultkit_common::{
    constants::base::BASE_INTEREST,
    errors::VaultResult,
    events::VaultEvent,
    math::{accumulate, mul_div, normalized_to_debt, safe_add},
    types::VaultId,
};

use crate::{VaultManager, LOG_TARGET};

impl VaultManager {
    /// Accumulator value at `now`, without storing it
    ///
    /// Timestamps before the last refresh count as no elapsed time.
    pub fn current_accumulator(&self, now: u64) -> VaultResult<u128> {
        let elapsed = now.saturating_sub(self.state.last_interest_accumulator_updated);
        accumulate(
            self.state.interest_accumulator,
            self.state.params.interest_rate,
            elapsed,
        )
    }

    /// Store the accumulator at `now` and book the interest as surplus
    pub(crate) fn accrue_interest(&mut self, now: u64) -> VaultResult<u128> {
        let previous = self.state.interest_accumulator;
        let accumulator = self.current_accumulator(now)?;

        if accumulator > previous {
            let interest = mul_div(
                self.state.total_normalized_debt,
                accumulator - previous,
                BASE_INTEREST,
            )?;
            self.state.surplus = safe_add(self.state.surplus, interest)?;
            self.state.interest_accumulator = accumulator;
            self.events.emit(VaultEvent::InterestAccumulatorUpdated {
                value: accumulator,
                timestamp: now,
            });
            log::debug!(
                target: LOG_TARGET,
                "accumulator {} -> {}, interest {}",
                previous,
                accumulator,
                interest
            );
        }
        if now > self.state.last_interest_accumulator_updated {
            self.state.last_interest_accumulator_updated = now;
        }
        Ok(accumulator)
    }

    /// Debt of a vault at `now`; 0 for unknown ids
    pub fn get_vault_debt(&self, vault_id: VaultId, now: u64) -> VaultResult<u128> {
        let normalized = self
            .state
            .registry
            .vault(vault_id)
            .map(|vault| vault.normalized_debt)
            .unwrap_or_default();
        normalized_to_debt(normalized, self.current_accumulator(now)?)
    }

    /// Debt of every vault at `now`
    pub fn get_total_debt(&self, now: u64) -> VaultResult<u128> {
        normalized_to_debt(self.state.total_normalized_debt, self.current_accumulator(now)?)
    }
}
