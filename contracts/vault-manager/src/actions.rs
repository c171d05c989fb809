//! Action Processor
//!
//! `angle` runs an ordered batch of vault actions, then one solvency pass
//! over the vaults the batch weakened, then the debt ceiling check, then a
//! single netted settlement with the ledger. Any failure rolls back the
//! whole batch, including remote engines touched by `GetDebtIn`.
//!
//! ## Vault id 0
//!
//! Inside a batch, id 0 designates the last vault created by this engine so
//! that `CreateVault` can be followed by actions on the new vault.

use std::collections::BTreeSet;

use vaultkit_common::{
    constants::{
        base::{BASE_INTEREST, BASE_PARAMS},
        limits::MAX_BATCH_ACTIONS,
    },
    errors::{AmountErrorReason, VaultError, VaultResult},
    events::VaultEvent,
    ledger::{AssetLedger, Swapper},
    math::{
        debt_to_normalized, fee_of, is_dusty, is_solvent, mul_div, mul_div_up, normalized_to_debt,
        normalized_to_debt_up, safe_add, safe_sub, wide,
    },
    types::{decode_actions, Action, ActionType, Address, BatchRequest, CallContext, PaymentData, VaultId},
};

use crate::{VaultManager, LOG_TARGET};

/// Batch in wire form: parallel action types and borsh payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub action_types: Vec<ActionType>,
    pub payloads: Vec<Vec<u8>>,
    pub from: Address,
    pub to: Address,
    pub repay_data: Vec<u8>,
}

impl EncodedBatch {
    pub fn decode(&self) -> VaultResult<BatchRequest> {
        Ok(BatchRequest {
            actions: decode_actions(&self.action_types, &self.payloads)?,
            from: self.from,
            to: self.to,
            repay_data: self.repay_data.clone(),
        })
    }
}

fn require_amount(amount: u128) -> VaultResult<()> {
    if amount == 0 {
        return Err(VaultError::InvalidAmount {
            amount,
            reason: AmountErrorReason::Zero,
        });
    }
    Ok(())
}

/// Per-batch bookkeeping
#[derive(Debug, Default)]
struct BatchState {
    payment: PaymentData,
    /// Vaults whose health may have dropped
    touched: BTreeSet<VaultId>,
    price: Option<u128>,
}

impl VaultManager {
    /// Execute a batch of actions atomically
    ///
    /// `remotes` are the other engines a `GetDebtIn` may reach; `swapper`, if
    /// supplied, is called during settlement with `request.repay_data`.
    ///
    /// # Errors
    /// The first failing action's error, `InsolventAfterAction` or
    /// `DebtCeilingExceeded` from the post-batch pass, or a ledger error from
    /// settlement. Nothing is applied in that case.
    pub fn angle<L>(
        &mut self,
        ctx: &CallContext,
        request: &BatchRequest,
        ledger: &mut L,
        remotes: &mut [&mut VaultManager],
        swapper: Option<&mut dyn Swapper>,
    ) -> VaultResult<PaymentData>
    where
        L: AssetLedger + Clone,
    {
        self.atomically(ledger, remotes, |manager, ledger, remotes| {
            manager.process_batch(ctx, request, ledger, remotes, swapper)
        })
    }

    /// `angle` on a batch in wire form
    pub fn angle_encoded<L>(
        &mut self,
        ctx: &CallContext,
        batch: &EncodedBatch,
        ledger: &mut L,
        remotes: &mut [&mut VaultManager],
        swapper: Option<&mut dyn Swapper>,
    ) -> VaultResult<PaymentData>
    where
        L: AssetLedger + Clone,
    {
        let request = batch.decode()?;
        self.angle(ctx, &request, ledger, remotes, swapper)
    }

    /// Repay debt of one of this engine's vaults on behalf of another engine
    ///
    /// Called by the engine executing a `GetDebtIn`; `ctx.caller` is that
    /// engine. The positive difference between the fees of the two engines
    /// is kept here as surplus.
    ///
    /// Returns the debt the calling engine must take on: `amount`, or less
    /// when the vault owed less than `amount` net of the fee delta.
    ///
    /// # Errors
    /// `NotVaultManager` when the caller is not an engine of the treasury,
    /// `PausedCollateral`, `NonexistentVault`, `DustyLeftoverAmount`.
    pub fn get_debt_out(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u128,
        sender_borrow_fee: u64,
        sender_repay_fee: u64,
    ) -> VaultResult<u128> {
        if !self.treasury.is_vault_manager(&ctx.caller) {
            return Err(VaultError::NotVaultManager { manager: ctx.caller });
        }
        self.require_unpaused()?;
        require_amount(amount)?;

        let checkpoint = self.checkpoint();
        let result = self.apply_debt_out(ctx, vault_id, amount, sender_borrow_fee, sender_repay_fee);
        if result.is_err() {
            self.restore(checkpoint);
        }
        result
    }

    fn apply_debt_out(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u128,
        sender_borrow_fee: u64,
        sender_repay_fee: u64,
    ) -> VaultResult<u128> {
        let accumulator = self.accrue_interest(ctx.timestamp)?;

        // Moving debt here from a cheaper engine must not dodge the fees
        let repay_fee_delta = self.state.params.repay_fee.saturating_sub(sender_repay_fee) as u128;
        let borrow_fee_delta = sender_borrow_fee.saturating_sub(self.state.params.borrow_fee) as u128;
        let kept = fee_kept(repay_fee_delta, borrow_fee_delta)?;
        let less_fee = mul_div(amount, kept, BASE_PARAMS)?;

        let repaid = self.decrease_debt(ctx, vault_id, less_fee, accumulator)?;
        let taken = if repaid >= less_fee {
            amount
        } else {
            // The vault owed less: scale the fee-inclusive amount down to it
            mul_div_up(repaid, BASE_PARAMS, kept)?.min(amount)
        };
        self.state.surplus = safe_add(self.state.surplus, taken.saturating_sub(repaid))?;
        Ok(taken)
    }

    fn process_batch<L: AssetLedger>(
        &mut self,
        ctx: &CallContext,
        request: &BatchRequest,
        ledger: &mut L,
        remotes: &mut [&mut VaultManager],
        swapper: Option<&mut dyn Swapper>,
    ) -> VaultResult<PaymentData> {
        self.require_unpaused()?;
        if request.actions.is_empty() {
            return Err(VaultError::IncompatibleLengths { left: 0, right: 0 });
        }
        if request.actions.len() > MAX_BATCH_ACTIONS {
            return Err(VaultError::BatchTooLarge {
                size: request.actions.len(),
                maximum: MAX_BATCH_ACTIONS,
            });
        }

        let accumulator = self.accrue_interest(ctx.timestamp)?;
        let initial_total = self.state.total_normalized_debt;
        let mut batch = BatchState::default();

        for action in &request.actions {
            self.apply_action(ctx, action, accumulator, ledger, remotes, &mut batch)?;
        }

        self.check_touched_vaults(ctx, accumulator, &mut batch)?;
        if self.state.total_normalized_debt > initial_total {
            self.check_debt_ceiling(accumulator)?;
        }

        self.settle(ctx, &batch.payment, &request.from, &request.to, &request.repay_data, ledger, swapper)?;

        log::debug!(
            target: LOG_TARGET,
            "batch of {} actions executed, payment {:?}",
            request.actions.len(),
            batch.payment
        );
        Ok(batch.payment)
    }

    fn apply_action<L: AssetLedger>(
        &mut self,
        ctx: &CallContext,
        action: &Action,
        accumulator: u128,
        ledger: &mut L,
        remotes: &mut [&mut VaultManager],
        batch: &mut BatchState,
    ) -> VaultResult<()> {
        let payment = &mut batch.payment;
        match action {
            Action::CreateVault { to } => {
                self.mint_vault(ctx, *to)?;
            }
            Action::CloseVault { vault_id } => {
                let vault_id = self.resolve_vault_id(*vault_id);
                let (stablecoin_owed, collateral) = self.close_vault(ctx, vault_id, accumulator, &mut batch.price)?;
                payment.stablecoin_amount_to_receive = safe_add(payment.stablecoin_amount_to_receive, stablecoin_owed)?;
                payment.collateral_amount_to_give = safe_add(payment.collateral_amount_to_give, collateral)?;
            }
            Action::AddCollateral { vault_id, amount } => {
                let vault_id = self.resolve_vault_id(*vault_id);
                self.add_collateral(ctx, vault_id, *amount)?;
                payment.collateral_amount_to_receive = safe_add(payment.collateral_amount_to_receive, *amount)?;
            }
            Action::RemoveCollateral { vault_id, amount } => {
                let vault_id = self.resolve_vault_id(*vault_id);
                self.remove_collateral(ctx, vault_id, *amount)?;
                batch.touched.insert(vault_id);
                payment.collateral_amount_to_give = safe_add(payment.collateral_amount_to_give, *amount)?;
            }
            Action::RepayDebt { vault_id, amount } => {
                let vault_id = self.resolve_vault_id(*vault_id);
                let charged = self.repay_debt(ctx, vault_id, *amount, accumulator)?;
                payment.stablecoin_amount_to_receive = safe_add(payment.stablecoin_amount_to_receive, charged)?;
            }
            Action::Borrow { vault_id, amount } => {
                let vault_id = self.resolve_vault_id(*vault_id);
                let minted = self.borrow(ctx, vault_id, *amount, accumulator)?;
                batch.touched.insert(vault_id);
                payment.stablecoin_amount_to_give = safe_add(payment.stablecoin_amount_to_give, minted)?;
            }
            Action::GetDebtIn {
                src_vault_id,
                dst_manager,
                dst_vault_id,
                amount,
            } => {
                let src_vault_id = self.resolve_vault_id(*src_vault_id);
                self.get_debt_in(ctx, src_vault_id, dst_manager, *dst_vault_id, *amount, accumulator, remotes)?;
                batch.touched.insert(src_vault_id);
            }
            Action::Permit(permit) => {
                ledger.permit(permit, ctx.timestamp)?;
            }
        }
        Ok(())
    }

    fn resolve_vault_id(&self, vault_id: VaultId) -> VaultId {
        if vault_id == 0 {
            self.state.registry.vault_id_count()
        } else {
            vault_id
        }
    }

    // ============ Individual Actions ============

    fn add_collateral(&mut self, ctx: &CallContext, vault_id: VaultId, amount: u128) -> VaultResult<()> {
        require_amount(amount)?;
        let vault = self.state.registry.vault_mut(vault_id)?;
        vault.collateral_amount = safe_add(vault.collateral_amount, amount)?;
        self.emit_collateral_update(ctx, vault_id, amount, true);
        Ok(())
    }

    fn remove_collateral(&mut self, ctx: &CallContext, vault_id: VaultId, amount: u128) -> VaultResult<()> {
        require_amount(amount)?;
        self.require_approved_or_owner(&ctx.caller, vault_id)?;
        let vault = self.state.registry.vault_mut(vault_id)?;
        if amount > vault.collateral_amount {
            return Err(VaultError::InsufficientBalance {
                available: vault.collateral_amount,
                requested: amount,
            });
        }
        vault.collateral_amount -= amount;
        self.emit_collateral_update(ctx, vault_id, amount, false);
        Ok(())
    }

    /// Returns the stablecoin amount to mint after the borrow fee
    fn borrow(&mut self, ctx: &CallContext, vault_id: VaultId, amount: u128, accumulator: u128) -> VaultResult<u128> {
        require_amount(amount)?;
        self.require_approved_or_owner(&ctx.caller, vault_id)?;
        self.increase_debt(ctx, vault_id, amount, accumulator)?;

        let fee = fee_of(amount, self.state.params.borrow_fee)?;
        self.state.surplus = safe_add(self.state.surplus, fee)?;
        Ok(amount - fee)
    }

    /// Returns the stablecoin amount to burn, repay fee included
    fn repay_debt(&mut self, ctx: &CallContext, vault_id: VaultId, amount: u128, accumulator: u128) -> VaultResult<u128> {
        require_amount(amount)?;
        let repaid = self.decrease_debt(ctx, vault_id, amount, accumulator)?;
        self.charge_repay_fee(repaid)
    }

    /// Returns the stablecoin owed and the collateral released
    fn close_vault(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        accumulator: u128,
        price: &mut Option<u128>,
    ) -> VaultResult<(u128, u128)> {
        self.require_approved_or_owner(&ctx.caller, vault_id)?;
        let vault = self.existing_vault(vault_id)?;

        let mut owed = 0;
        if vault.normalized_debt > 0 {
            let price = self.cached_price(price, ctx.timestamp)?;
            if !is_solvent(self.health_factor_at(&vault, price, accumulator)?) {
                return Err(VaultError::InsolventVault { vault_id });
            }
            let debt = normalized_to_debt_up(vault.normalized_debt, accumulator)?;
            owed = self.charge_repay_fee(debt)?;
            self.state.total_normalized_debt = safe_sub(self.state.total_normalized_debt, vault.normalized_debt)?;
            self.emit_debt_update(ctx, vault_id, vault.normalized_debt, false);
        }

        self.burn_vault(ctx, vault_id)?;
        Ok((owed, vault.collateral_amount))
    }

    /// Take `amount` of debt into `src_vault_id` out of `dst_vault_id` of `dst_manager`
    #[allow(clippy::too_many_arguments)]
    fn get_debt_in(
        &mut self,
        ctx: &CallContext,
        src_vault_id: VaultId,
        dst_manager: &Address,
        dst_vault_id: VaultId,
        amount: u128,
        accumulator: u128,
        remotes: &mut [&mut VaultManager],
    ) -> VaultResult<()> {
        require_amount(amount)?;
        self.require_approved_or_owner(&ctx.caller, src_vault_id)?;

        let transferred = if *dst_manager == self.state.address {
            // Same engine: the same normalized units change hands, no fees
            let requested = debt_to_normalized(amount, accumulator)?;
            let owed = self.existing_vault(dst_vault_id)?.normalized_debt;
            let moved = requested.min(owed);
            self.remove_normalized_debt(ctx, dst_vault_id, moved, accumulator)?;
            self.add_normalized_debt(ctx, src_vault_id, moved, accumulator)?;
            if moved < requested {
                normalized_to_debt_up(moved, accumulator)?
            } else {
                amount
            }
        } else {
            if !self.treasury.is_vault_manager(dst_manager) {
                return Err(VaultError::NotVaultManager { manager: *dst_manager });
            }
            let remote = remotes
                .iter_mut()
                .find(|remote| remote.address() == *dst_manager)
                .ok_or(VaultError::NotVaultManager { manager: *dst_manager })?;
            let remote_ctx = CallContext::new(self.state.address, ctx.timestamp);
            let taken = remote.get_debt_out(
                &remote_ctx,
                dst_vault_id,
                amount,
                self.state.params.borrow_fee,
                self.state.params.repay_fee,
            )?;
            self.increase_debt(ctx, src_vault_id, taken, accumulator)?;
            taken
        };

        self.events.emit(VaultEvent::DebtTransferred {
            src_vault_id,
            dst_vault_id,
            dst_manager: *dst_manager,
            requested_amount: amount,
            amount: transferred,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    // ============ Debt Bookkeeping ============

    /// Add `amount` of actual debt to a vault
    pub(crate) fn increase_debt(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u128,
        accumulator: u128,
    ) -> VaultResult<()> {
        let change = debt_to_normalized(amount, accumulator)?;
        self.add_normalized_debt(ctx, vault_id, change, accumulator)
    }

    fn add_normalized_debt(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        change: u128,
        accumulator: u128,
    ) -> VaultResult<()> {
        let dust = self.state.params.dust;
        let vault = self.state.registry.vault_mut(vault_id)?;
        let normalized = safe_add(vault.normalized_debt, change)?;
        if normalized == 0 || is_dusty(normalized, accumulator, dust) {
            return Err(VaultError::DustyLeftoverAmount { vault_id });
        }
        vault.normalized_debt = normalized;
        self.state.total_normalized_debt = safe_add(self.state.total_normalized_debt, change)?;
        self.emit_debt_update(ctx, vault_id, change, true);
        Ok(())
    }

    /// Remove up to `amount` of actual debt from a vault
    ///
    /// Returns the debt actually removed: `amount`, or the whole vault debt
    /// rounded up when `amount` covers it.
    pub(crate) fn decrease_debt(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u128,
        accumulator: u128,
    ) -> VaultResult<u128> {
        let vault = self.existing_vault(vault_id)?;
        let change = debt_to_normalized(amount, accumulator)?;
        if change >= vault.normalized_debt {
            let repaid = normalized_to_debt_up(vault.normalized_debt, accumulator)?;
            self.remove_normalized_debt(ctx, vault_id, vault.normalized_debt, accumulator)?;
            Ok(repaid)
        } else {
            self.remove_normalized_debt(ctx, vault_id, change, accumulator)?;
            Ok(amount)
        }
    }

    fn remove_normalized_debt(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        change: u128,
        accumulator: u128,
    ) -> VaultResult<()> {
        let dust = self.state.params.dust;
        let vault = self.state.registry.vault_mut(vault_id)?;
        let normalized = safe_sub(vault.normalized_debt, change)?;
        if is_dusty(normalized, accumulator, dust) {
            return Err(VaultError::DustyLeftoverAmount { vault_id });
        }
        vault.normalized_debt = normalized;
        self.state.total_normalized_debt = safe_sub(self.state.total_normalized_debt, change)?;
        if change > 0 {
            self.emit_debt_update(ctx, vault_id, change, false);
        }
        Ok(())
    }

    /// Stablecoin charged for `repaid` of debt; the fee becomes surplus
    fn charge_repay_fee(&mut self, repaid: u128) -> VaultResult<u128> {
        let net = BASE_PARAMS - self.state.params.repay_fee as u128;
        let charged = mul_div_up(repaid, BASE_PARAMS, net)?;
        self.state.surplus = safe_add(self.state.surplus, charged - repaid)?;
        Ok(charged)
    }

    // ============ Post-Batch Checks ============

    fn check_touched_vaults(&self, ctx: &CallContext, accumulator: u128, batch: &mut BatchState) -> VaultResult<()> {
        for vault_id in &batch.touched {
            let vault = match self.state.registry.vault(*vault_id) {
                Some(vault) if vault.normalized_debt > 0 => *vault,
                // Closed in the same batch, or without debt
                _ => continue,
            };
            let price = self.cached_price(&mut batch.price, ctx.timestamp)?;
            let health_factor = self.health_factor_at(&vault, price, accumulator)?;
            if !is_solvent(health_factor) {
                return Err(VaultError::InsolventAfterAction {
                    vault_id: *vault_id,
                    health_factor,
                });
            }
        }
        Ok(())
    }

    fn check_debt_ceiling(&self, accumulator: u128) -> VaultResult<()> {
        let ceiling = self.state.params.debt_ceiling;
        if wide(self.state.total_normalized_debt) * wide(accumulator) > wide(ceiling) * wide(BASE_INTEREST) {
            return Err(VaultError::DebtCeilingExceeded {
                total_debt: normalized_to_debt(self.state.total_normalized_debt, accumulator)?,
                debt_ceiling: ceiling,
            });
        }
        Ok(())
    }

    // ============ Events ============

    pub(crate) fn emit_collateral_update(&mut self, ctx: &CallContext, vault_id: VaultId, amount: u128, increase: bool) {
        self.events.emit(VaultEvent::CollateralAmountUpdated {
            vault_id,
            amount,
            increase,
            timestamp: ctx.timestamp,
        });
    }

    pub(crate) fn emit_debt_update(&mut self, ctx: &CallContext, vault_id: VaultId, internal_amount: u128, increase: bool) {
        self.events.emit(VaultEvent::InternalDebtUpdated {
            vault_id,
            internal_amount,
            increase,
            timestamp: ctx.timestamp,
        });
    }
}

/// `amount * (1 - repay_fee_delta) * (1 - borrow_fee_delta)`, rounded down
/// Share of a transferred amount left after both fee deltas, in `BASE_PARAMS`
fn fee_kept(repay_fee_delta: u128, borrow_fee_delta: u128) -> VaultResult<u128> {
    mul_div(
        BASE_PARAMS - repay_fee_delta.min(BASE_PARAMS),
        BASE_PARAMS - borrow_fee_delta.min(BASE_PARAMS),
        BASE_PARAMS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use vaultkit_common::types::{encode_actions, VaultParameters};

    #[test]
    fn test_create_add_borrow_in_one_batch() {
        let mut env = TestEnv::new(default_test_params());
        let payment = env
            .angle(
                ALICE,
                vec![
                    Action::CreateVault { to: ALICE },
                    Action::AddCollateral { vault_id: 0, amount: 10 * ONE },
                    Action::Borrow { vault_id: 0, amount: 5 * ONE },
                ],
                ALICE,
                ALICE,
            )
            .unwrap();

        assert_eq!(payment.collateral_amount_to_receive, 10 * ONE);
        assert_eq!(payment.stablecoin_amount_to_give, 5 * ONE);
        assert_eq!(env.manager.vault_data(1).unwrap().collateral_amount, 10 * ONE);
        assert_eq!(env.manager.get_vault_debt(1, env.now).unwrap(), 5 * ONE);
        assert_eq!(env.stable_balance(&ALICE), 5 * ONE);
        assert_eq!(env.collateral_balance(&env.manager.address()), 10 * ONE);
    }

    #[test]
    fn test_borrow_fee_goes_to_surplus() {
        let params = VaultParameters { borrow_fee: 10_000_000, ..default_test_params() };
        let mut env = TestEnv::new(params);
        env.open_vault(ALICE, 10 * ONE, 5 * ONE);

        // 1% of 5
        assert_eq!(env.manager.surplus(), ONE / 20);
        assert_eq!(env.stable_balance(&ALICE), 5 * ONE - ONE / 20);
        assert_eq!(env.manager.get_vault_debt(1, env.now).unwrap(), 5 * ONE);
    }

    #[test]
    fn test_repay_fee_charged_on_top() {
        let params = VaultParameters { repay_fee: 50_000_000, ..default_test_params() };
        let mut env = TestEnv::new(params);
        let vault_id = env.open_vault(ALICE, 10 * ONE, 5 * ONE);

        let payment = env
            .angle(ALICE, vec![Action::RepayDebt { vault_id, amount: 2 * ONE }], ALICE, ALICE)
            .unwrap();
        // 2 / 0.95, rounded up
        let charged = (2 * ONE * 1_000_000_000).div_ceil(950_000_000);
        assert_eq!(payment.stablecoin_amount_to_receive, charged);
        assert_eq!(env.manager.surplus(), charged - 2 * ONE);
        assert_eq!(env.manager.get_vault_debt(vault_id, env.now).unwrap(), 3 * ONE);
    }

    #[test]
    fn test_repay_more_than_debt_clamps_to_debt() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 5 * ONE);
        // BOB funds ALICE's excess with his own stablecoins
        env.open_vault(BOB, 100 * ONE, 20 * ONE);

        let payment = env
            .angle(BOB, vec![Action::RepayDebt { vault_id, amount: 8 * ONE }], BOB, BOB)
            .unwrap();
        assert_eq!(payment.stablecoin_amount_to_receive, 5 * ONE);
        assert_eq!(env.manager.vault_data(vault_id).unwrap().normalized_debt, 0);
        assert_eq!(env.stable_balance(&BOB), 15 * ONE);
    }

    #[test]
    fn test_remove_collateral_requires_owner_and_balance() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 0);

        let result = env.angle(BOB, vec![Action::RemoveCollateral { vault_id, amount: ONE }], BOB, BOB);
        assert!(matches!(result, Err(VaultError::NotApprovedOrOwner { .. })));

        let result = env.angle(ALICE, vec![Action::RemoveCollateral { vault_id, amount: 11 * ONE }], ALICE, ALICE);
        assert!(matches!(result, Err(VaultError::InsufficientBalance { .. })));

        env.angle(ALICE, vec![Action::RemoveCollateral { vault_id, amount: 4 * ONE }], ALICE, BOB)
            .unwrap();
        assert_eq!(env.collateral_balance(&BOB), USER_COLLATERAL + 4 * ONE);
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 2 * ONE);

        for action in [
            Action::AddCollateral { vault_id, amount: 0 },
            Action::RemoveCollateral { vault_id, amount: 0 },
            Action::Borrow { vault_id, amount: 0 },
            Action::RepayDebt { vault_id, amount: 0 },
        ] {
            let result = env.angle(ALICE, vec![action], ALICE, ALICE);
            assert!(matches!(result, Err(VaultError::InvalidAmount { reason: AmountErrorReason::Zero, .. })));
        }
    }

    #[test]
    fn test_borrow_below_dust_rejected() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 0);

        let result = env.angle(ALICE, vec![Action::Borrow { vault_id, amount: DUST / 2 }], ALICE, ALICE);
        assert!(matches!(result, Err(VaultError::DustyLeftoverAmount { .. })));
    }

    #[test]
    fn test_paused_engine_rejects_batches() {
        let mut env = TestEnv::new_paused(default_test_params());
        let result = env.angle(ALICE, vec![Action::CreateVault { to: ALICE }], ALICE, ALICE);
        assert!(matches!(result, Err(VaultError::PausedCollateral)));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut env = TestEnv::new(default_test_params());
        let result = env.angle(ALICE, vec![], ALICE, ALICE);
        assert!(matches!(result, Err(VaultError::IncompatibleLengths { .. })));
    }

    #[test]
    fn test_create_vault_to_zero_rejected() {
        let mut env = TestEnv::new(default_test_params());
        let result = env.angle(ALICE, vec![Action::CreateVault { to: [0u8; 32] }], ALICE, ALICE);
        assert!(matches!(result, Err(VaultError::ZeroAddress)));
    }

    #[test]
    fn test_encoded_batch() {
        let mut env = TestEnv::new(default_test_params());
        let (action_types, payloads) = encode_actions(&[
            Action::CreateVault { to: ALICE },
            Action::AddCollateral { vault_id: 0, amount: 3 * ONE },
        ]);
        let batch = EncodedBatch {
            action_types,
            payloads,
            from: ALICE,
            to: ALICE,
            repay_data: Vec::new(),
        };
        let ctx = env.ctx(ALICE);
        env.manager
            .angle_encoded(&ctx, &batch, &mut env.ledger, &mut [], None)
            .unwrap();
        assert_eq!(env.manager.vault_data(1).unwrap().collateral_amount, 3 * ONE);

        let broken = EncodedBatch {
            payloads: vec![vec![1, 2]],
            ..batch
        };
        let result = env.manager.angle_encoded(&ctx, &broken, &mut env.ledger, &mut [], None);
        assert!(matches!(result, Err(VaultError::IncompatibleLengths { .. })));
    }

    #[test]
    fn test_fee_kept() {
        assert_eq!(fee_kept(0, 0).unwrap(), BASE_PARAMS);
        // 10% then 50%
        assert_eq!(fee_kept(100_000_000, 500_000_000).unwrap(), 450_000_000);
        assert_eq!(fee_kept(BASE_PARAMS, 0).unwrap(), 0);
    }
}
