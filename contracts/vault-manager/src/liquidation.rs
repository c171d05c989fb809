//! Liquidation Engine
//!
//! A vault with a health factor below one can be liquidated: the liquidator
//! repays stablecoins and receives collateral at a discount. The discount
//! grows with how far the vault is below one, is scaled by the liquidator's
//! boost and is capped twice: by `max_liquidation_discount`, and so that
//! `collateral_factor <= liquidation_surcharge * (1 - discount)`.
//!
//! ## Repay bounds
//!
//! Two regimes:
//! - the vault can be brought back to `target_health_factor`: the max repay
//!   is the amount that does so, unless what remains would be below
//!   `dust_liquidation`, in which case the whole debt must go
//! - it cannot: the max repay buys all of the collateral, and partial
//!   liquidations must leave at least `dust_collateral` of value
//!
//! A threshold of 0 means any amount up to the max is accepted; otherwise
//! amounts strictly between the threshold and the max are rejected.
//!
//! Each vault of a call is processed independently: failing vaults are
//! reported and skipped. Debt a fully liquidated vault could not cover
//! becomes bad debt.

use primitive_types::U256;

use vaultkit_common::{
    constants::{
        base::{BASE_INTEREST, BASE_PARAMS},
        limits::MAX_LIQUIDATION_BATCH,
    },
    errors::{AmountErrorReason, VaultError, VaultResult},
    events::VaultEvent,
    ledger::{AssetLedger, Swapper},
    math::{
        checked_div, checked_mul, collateral_in_stable, debt_to_normalized, health_factor, is_solvent,
        mul_div, mul_div_up, narrow, normalized_to_debt, safe_add, safe_sub, wide,
    },
    types::{Address, CallContext, LiquidationOpportunity, LiquidationRequest, LiquidatorData, Vault, VaultId},
};

use crate::{VaultManager, LOG_TARGET};

/// What one vault's liquidation produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VaultLiquidation {
    repaid: u128,
    collateral_released: u128,
    bad_debt: u128,
}

fn sub_wide(a: U256, b: U256) -> VaultResult<U256> {
    a.checked_sub(b).ok_or(VaultError::Underflow)
}

impl VaultManager {
    /// Liquidation terms of a vault for `liquidator` at `now`
    ///
    /// # Errors
    /// `NonexistentVault`, `HealthyVault`, or an oracle error.
    pub fn check_liquidation(
        &self,
        vault_id: VaultId,
        liquidator: &Address,
        now: u64,
    ) -> VaultResult<LiquidationOpportunity> {
        let vault = self.existing_vault(vault_id)?;
        let price = self.oracle.read(now)?;
        let accumulator = self.current_accumulator(now)?;
        self.liquidation_opportunity(vault_id, &vault, liquidator, price, accumulator)
    }

    /// Boost multiplier of `liquidator`
    pub fn liquidation_boost(&self, liquidator: &Address) -> u64 {
        match &self.boost_source {
            Some(source) => self.state.boost_curve.boost_at(source.boost_balance(liquidator)),
            None => self.state.boost_curve.base_boost(),
        }
    }

    /// Liquidate several vaults
    ///
    /// The caller is the liquidator whose boost applies. Stablecoins are
    /// burnt from `request.from`, collateral goes to `request.to`.
    ///
    /// # Errors
    /// `PausedCollateral`, `IncompatibleLengths`, `BatchTooLarge`,
    /// `NoLiquidatableVaults` when every vault is skipped, or a ledger error.
    pub fn liquidate<L>(
        &mut self,
        ctx: &CallContext,
        request: &LiquidationRequest,
        ledger: &mut L,
        swapper: Option<&mut dyn Swapper>,
    ) -> VaultResult<LiquidatorData>
    where
        L: AssetLedger + Clone,
    {
        self.atomically(ledger, &mut [], |manager, ledger, _| {
            manager.process_liquidation(ctx, request, ledger, swapper)
        })
    }

    fn process_liquidation<L: AssetLedger>(
        &mut self,
        ctx: &CallContext,
        request: &LiquidationRequest,
        ledger: &mut L,
        swapper: Option<&mut dyn Swapper>,
    ) -> VaultResult<LiquidatorData> {
        self.require_unpaused()?;
        if request.vault_ids.len() != request.amounts.len() || request.vault_ids.is_empty() {
            return Err(VaultError::IncompatibleLengths {
                left: request.vault_ids.len(),
                right: request.amounts.len(),
            });
        }
        if request.vault_ids.len() > MAX_LIQUIDATION_BATCH {
            return Err(VaultError::BatchTooLarge {
                size: request.vault_ids.len(),
                maximum: MAX_LIQUIDATION_BATCH,
            });
        }

        let accumulator = self.accrue_interest(ctx.timestamp)?;
        let price = self.oracle.read(ctx.timestamp)?;
        let mut data = LiquidatorData {
            oracle_value: price,
            new_interest_accumulator: accumulator,
            ..Default::default()
        };

        for (vault_id, amount) in request.vault_ids.iter().zip(request.amounts.iter()) {
            match self.liquidate_vault(ctx, *vault_id, *amount, price, accumulator) {
                Ok(outcome) => {
                    data.stablecoin_amount_to_receive = safe_add(data.stablecoin_amount_to_receive, outcome.repaid)?;
                    data.collateral_amount_to_give =
                        safe_add(data.collateral_amount_to_give, outcome.collateral_released)?;
                    data.bad_debt_from_liquidation = safe_add(data.bad_debt_from_liquidation, outcome.bad_debt)?;
                    data.liquidated.push(*vault_id);
                }
                Err(error) => {
                    log::warn!(target: LOG_TARGET, "vault {} skipped: {}", vault_id, error.code());
                    data.skipped.push((*vault_id, error));
                }
            }
        }
        if data.liquidated.is_empty() {
            return Err(VaultError::NoLiquidatableVaults);
        }

        let protocol_share = mul_div(
            data.stablecoin_amount_to_receive,
            BASE_PARAMS - self.state.params.liquidation_surcharge as u128,
            BASE_PARAMS,
        )?;
        self.state.surplus = safe_add(self.state.surplus, protocol_share)?;
        if data.bad_debt_from_liquidation > 0 {
            self.state.bad_debt = safe_add(self.state.bad_debt, data.bad_debt_from_liquidation)?;
            log::warn!(
                target: LOG_TARGET,
                "liquidation left {} of bad debt, total {}",
                data.bad_debt_from_liquidation,
                self.state.bad_debt
            );
        }

        self.handle_repay(
            ctx,
            data.collateral_amount_to_give,
            data.stablecoin_amount_to_receive,
            &request.from,
            &request.to,
            &request.data,
            ledger,
            swapper,
        )?;

        log::info!(
            target: LOG_TARGET,
            "liquidated {} vaults for {} stablecoins, {} collateral released",
            data.liquidated.len(),
            data.stablecoin_amount_to_receive,
            data.collateral_amount_to_give
        );
        Ok(data)
    }

    /// Check the amount against the vault's terms, then apply it
    fn liquidate_vault(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u128,
        price: u128,
        accumulator: u128,
    ) -> VaultResult<VaultLiquidation> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount {
                amount,
                reason: AmountErrorReason::Zero,
            });
        }
        let vault = self.existing_vault(vault_id)?;
        let opportunity = self.liquidation_opportunity(vault_id, &vault, &ctx.caller, price, accumulator)?;
        if amount > opportunity.max_stablecoin_amount_to_repay {
            return Err(VaultError::TooHighAmount {
                requested: amount,
                maximum: opportunity.max_stablecoin_amount_to_repay,
            });
        }
        if opportunity.threshold_repay_amount > 0
            && amount > opportunity.threshold_repay_amount
            && amount < opportunity.max_stablecoin_amount_to_repay
        {
            return Err(VaultError::DustyLeftoverAmount { vault_id });
        }

        let released = checked_div(
            checked_mul(
                checked_mul(wide(amount), wide(BASE_PARAMS))?,
                wide(self.state.collat_base),
            )?,
            checked_mul(wide(opportunity.discount as u128), wide(price))?,
        )?;
        let debt_repaid = mul_div(amount, self.state.params.liquidation_surcharge as u128, BASE_PARAMS)?;

        let outcome = if released >= wide(vault.collateral_amount) {
            // Collateral exhausted: the vault is emptied, the id is kept
            self.state.total_normalized_debt = safe_sub(self.state.total_normalized_debt, vault.normalized_debt)?;
            let slot = self.state.registry.vault_mut(vault_id)?;
            *slot = Vault::default();
            if vault.normalized_debt > 0 {
                self.emit_debt_update(ctx, vault_id, vault.normalized_debt, false);
            }
            self.emit_collateral_update(ctx, vault_id, vault.collateral_amount, false);
            VaultLiquidation {
                repaid: amount,
                collateral_released: vault.collateral_amount,
                bad_debt: opportunity.current_debt.saturating_sub(debt_repaid),
            }
        } else {
            let collateral_released = narrow(released)?;
            let change = debt_to_normalized(debt_repaid, accumulator)?.min(vault.normalized_debt);
            let slot = self.state.registry.vault_mut(vault_id)?;
            slot.collateral_amount -= collateral_released;
            slot.normalized_debt -= change;
            self.state.total_normalized_debt = safe_sub(self.state.total_normalized_debt, change)?;
            self.emit_collateral_update(ctx, vault_id, collateral_released, false);
            self.emit_debt_update(ctx, vault_id, change, false);
            VaultLiquidation {
                repaid: amount,
                collateral_released,
                bad_debt: 0,
            }
        };

        self.events.emit(VaultEvent::VaultLiquidated {
            vault_id,
            liquidator: ctx.caller,
            amount_repaid: outcome.repaid,
            collateral_released: outcome.collateral_released,
            bad_debt: outcome.bad_debt,
            timestamp: ctx.timestamp,
        });
        Ok(outcome)
    }

    /// Terms of a liquidatable vault
    pub(crate) fn liquidation_opportunity(
        &self,
        vault_id: VaultId,
        vault: &Vault,
        liquidator: &Address,
        price: u128,
        accumulator: u128,
    ) -> VaultResult<LiquidationOpportunity> {
        let params = &self.state.params;
        let collat_base = self.state.collat_base;
        let collateral_factor = params.collateral_factor as u128;
        let surcharge = params.liquidation_surcharge as u128;
        let target = params.target_health_factor as u128;

        let current_debt = normalized_to_debt(vault.normalized_debt, accumulator)?;
        let collateral_value = collateral_in_stable(vault.collateral_amount, price, collat_base)?;
        let health = health_factor(collateral_value, params.collateral_factor, current_debt)?;
        if is_solvent(health) {
            return Err(VaultError::HealthyVault {
                vault_id,
                health_factor: health,
            });
        }

        // Stored as `1 - discount`
        let raw_discount = mul_div(self.liquidation_boost(liquidator) as u128, BASE_PARAMS - health, BASE_PARAMS)?;
        let discount = raw_discount.min(params.max_liquidation_discount as u128);
        let min_one_minus_discount = mul_div_up(collateral_factor, BASE_PARAMS, surcharge)?;
        let one_minus_discount = (BASE_PARAMS - discount).max(min_one_minus_discount);

        let base_params = wide(BASE_PARAMS);
        let d = wide(one_minus_discount);
        let mut threshold = 0u128;

        let max_repay = if wide(health) * d * wide(surcharge) >= wide(collateral_factor) * base_params * base_params {
            // Enough collateral to reach the target health factor
            let numerator = checked_mul(
                sub_wide(
                    wide(target) * wide(current_debt),
                    wide(collateral_value) * wide(collateral_factor),
                )? * base_params,
                d,
            )?;
            let denominator = sub_wide(
                wide(surcharge) * wide(target) * d,
                base_params * base_params * wide(collateral_factor),
            )?;
            let mut max_repay = narrow(checked_div(numerator, denominator)?)?;

            let remaining_is_dust = wide(current_debt) * base_params
                <= wide(max_repay) * wide(surcharge) + wide(params.dust_liquidation) * base_params;
            if remaining_is_dust {
                max_repay = safe_add(
                    narrow(checked_div(
                        checked_mul(checked_mul(wide(vault.normalized_debt), wide(accumulator))?, base_params)?,
                        wide(surcharge) * wide(BASE_INTEREST),
                    )?)?,
                    1,
                )?;
                threshold = if current_debt > params.dust_liquidation {
                    mul_div(current_debt - params.dust_liquidation, BASE_PARAMS, surcharge)?
                } else {
                    // Only the full max
                    1
                };
            }
            max_repay
        } else {
            // The collateral runs out before the target is reached
            let max_repay = safe_add(
                narrow(checked_div(
                    checked_mul(wide(vault.collateral_amount) * d, wide(price))?,
                    base_params * wide(collat_base),
                )?)?,
                1,
            )?;
            threshold = if collateral_value > params.dust_collateral {
                mul_div(collateral_value - params.dust_collateral, one_minus_discount, BASE_PARAMS)?
            } else {
                // Only the full max
                1
            };
            max_repay
        };

        let max_collateral = checked_div(
            checked_mul(wide(max_repay) * base_params, wide(collat_base))?,
            wide(price) * d,
        )?;
        let max_collateral_amount_given = if max_collateral > wide(vault.collateral_amount) {
            vault.collateral_amount
        } else {
            narrow(max_collateral)?
        };

        Ok(LiquidationOpportunity {
            max_stablecoin_amount_to_repay: max_repay,
            max_collateral_amount_given,
            threshold_repay_amount: threshold,
            discount: one_minus_discount as u64,
            current_debt,
        })
    }
}
