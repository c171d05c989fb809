//! Vault Manager - collateralized debt engine for one collateral market
//!
//! Users lock collateral into vaults, borrow the stablecoin against it and
//! pay interest that accrues continuously through a global accumulator.
//! Vaults whose health factor falls below one can be liquidated by anyone
//! at a bounded discount.
//!
//! ## Core Operations
//!
//! - **angle**: batched vault actions (create, close, add/remove collateral,
//!   borrow, repay, cross-vault debt transfer, permit) applied atomically and
//!   followed by a single solvency pass
//! - **liquidate**: per-vault liquidation with discount, boost curve and dust
//!   completion; shortfalls are recorded as bad debt
//! - **Parameter store**: governor/guardian setters validated against each other
//! - **accrue_interest_to_treasury**: nets surplus against bad debt and pays
//!   the treasury
//!
//! ## Execution Model
//!
//! One `VaultManager` per collateral. Every entry point takes a
//! `CallContext` and either applies all of its effects or none: engine state,
//! the asset ledger, remote managers and the event log are restored when a
//! call is rejected.

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod actions;
pub mod interest;
pub mod liquidation;
pub mod parameters;
pub mod registry;
pub mod settlement;

#[cfg(test)]
mod test_utils;

pub use actions::EncodedBatch;
pub use registry::VaultRegistry;

use vaultkit_common::{
    constants::base::{BASE_INTEREST, BASE_PARAMS, MAX_COLLATERAL_DECIMALS},
    errors::{VaultError, VaultResult},
    events::EventLog,
    ledger::AssetLedger,
    math::{collateral_in_stable, health_factor, normalized_to_debt, pow10},
    types::{derive_address, Address, Vault, VaultId, VaultParameters, ZERO_ADDRESS},
    BoostCurve, BoostSource, Oracle, Treasury,
};

/// Log target of every engine message
pub const LOG_TARGET: &str = "vault-manager";

/// Domain separator of engine addresses
const MANAGER_DOMAIN: &[u8] = b"vaultkit.vault-manager.v1";

// ============ Vault Manager State ============

/// Persisted state of one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultManagerState {
    /// Engine address; also the custody account of the collateral
    pub address: Address,
    pub name: String,
    pub collateral: Address,
    pub stablecoin: Address,
    pub treasury: Address,
    pub collateral_decimals: u8,
    /// `10^collateral_decimals`
    pub collat_base: u128,
    pub params: VaultParameters,
    pub boost_curve: BoostCurve,
    /// Starts at `BASE_INTEREST`, never decreases
    pub interest_accumulator: u128,
    pub last_interest_accumulator_updated: u64,
    /// Sum of the normalized debt of every vault
    pub total_normalized_debt: u128,
    /// Fees and interest not yet paid to the treasury
    pub surplus: u128,
    /// Losses from liquidations not yet netted with the treasury
    pub bad_debt: u128,
    pub paused: bool,
    pub registry: VaultRegistry,
}

/// Initialization arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Market name, part of the engine address
    pub name: String,
    pub collateral: Address,
    pub collateral_decimals: u8,
    pub params: VaultParameters,
}

/// Engine state plus its collaborators
pub struct VaultManager {
    pub(crate) state: VaultManagerState,
    pub(crate) oracle: Box<dyn Oracle>,
    pub(crate) treasury: Arc<dyn Treasury>,
    pub(crate) boost_source: Option<Box<dyn BoostSource>>,
    pub(crate) events: EventLog,
}

/// Restore point taken before a call body runs
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    state: VaultManagerState,
    events: usize,
}

/// Address of the engine named `name` for `collateral` under `treasury`
pub fn manager_address(treasury: &Address, collateral: &Address, name: &str) -> Address {
    derive_address(MANAGER_DOMAIN, &[&treasury[..], &collateral[..], name.as_bytes()])
}

impl VaultManager {
    /// Create an engine, paused
    ///
    /// Registers the engine as a stablecoin minter through the treasury.
    ///
    /// # Errors
    /// `InvalidSetOfParameters` when the parameters are inconsistent,
    /// `ZeroAddress` for a zero collateral.
    pub fn initialize(
        config: ManagerConfig,
        treasury: Arc<dyn Treasury>,
        oracle: Box<dyn Oracle>,
        ledger: &mut dyn AssetLedger,
        now: u64,
    ) -> VaultResult<Self> {
        if config.collateral == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        if config.collateral_decimals > MAX_COLLATERAL_DECIMALS {
            return Err(VaultError::InvalidSetOfParameters { reason: "collateral decimals above 27" });
        }
        validate_parameters(&config.params)?;
        let boost_curve = BoostCurve::flat(config.params.base_boost)?;

        let treasury_address = treasury.address();
        let address = manager_address(&treasury_address, &config.collateral, &config.name);
        treasury.add_minter(ledger, &address, now)?;

        log::info!(
            target: LOG_TARGET,
            "vault manager {} initialized for collateral {:?}",
            config.name,
            &config.collateral[..4]
        );

        Ok(Self {
            state: VaultManagerState {
                address,
                name: config.name,
                collateral: config.collateral,
                stablecoin: treasury.stablecoin(),
                treasury: treasury_address,
                collateral_decimals: config.collateral_decimals,
                collat_base: pow10(config.collateral_decimals)?,
                params: config.params,
                boost_curve,
                interest_accumulator: BASE_INTEREST,
                last_interest_accumulator_updated: now,
                total_normalized_debt: 0,
                surplus: 0,
                bad_debt: 0,
                paused: true,
                registry: VaultRegistry::default(),
            },
            oracle,
            treasury,
            boost_source: None,
            events: EventLog::new(),
        })
    }

    // ============ Getters ============

    pub fn address(&self) -> Address {
        self.state.address
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn collateral(&self) -> Address {
        self.state.collateral
    }

    pub fn stablecoin(&self) -> Address {
        self.state.stablecoin
    }

    pub fn treasury_address(&self) -> Address {
        self.state.treasury
    }

    pub fn state(&self) -> &VaultManagerState {
        &self.state
    }

    pub fn params(&self) -> &VaultParameters {
        &self.state.params
    }

    pub fn debt_ceiling(&self) -> u128 {
        self.state.params.debt_ceiling
    }

    pub fn boost_curve(&self) -> &BoostCurve {
        &self.state.boost_curve
    }

    pub fn interest_accumulator(&self) -> u128 {
        self.state.interest_accumulator
    }

    pub fn last_interest_accumulator_updated(&self) -> u64 {
        self.state.last_interest_accumulator_updated
    }

    pub fn total_normalized_debt(&self) -> u128 {
        self.state.total_normalized_debt
    }

    pub fn surplus(&self) -> u128 {
        self.state.surplus
    }

    pub fn bad_debt(&self) -> u128 {
        self.state.bad_debt
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Balances of a vault (zeroed after a full liquidation)
    pub fn vault_data(&self, vault_id: VaultId) -> Option<Vault> {
        self.state.registry.vault(vault_id).copied()
    }

    /// Digest of the borsh-encoded state
    pub fn state_root(&self) -> [u8; 32] {
        let encoded = borsh::to_vec(&self.state).unwrap_or_default();
        Sha256::digest(&encoded).into()
    }

    /// Health factor of a vault at the current price, `u128::MAX` without debt
    pub fn vault_health_factor(&self, vault_id: VaultId, now: u64) -> VaultResult<u128> {
        let vault = self.existing_vault(vault_id)?;
        if vault.normalized_debt == 0 {
            return Ok(u128::MAX);
        }
        let price = self.oracle.read(now)?;
        let accumulator = self.current_accumulator(now)?;
        self.health_factor_at(&vault, price, accumulator)
    }

    // ============ Internal Helpers ============

    pub(crate) fn existing_vault(&self, vault_id: VaultId) -> VaultResult<Vault> {
        self.state
            .registry
            .vault(vault_id)
            .copied()
            .ok_or(VaultError::NonexistentVault { vault_id })
    }

    pub(crate) fn health_factor_at(&self, vault: &Vault, price: u128, accumulator: u128) -> VaultResult<u128> {
        let debt = normalized_to_debt(vault.normalized_debt, accumulator)?;
        let value = collateral_in_stable(vault.collateral_amount, price, self.state.collat_base)?;
        health_factor(value, self.state.params.collateral_factor, debt)
    }

    /// Price read at most once per call
    pub(crate) fn cached_price(&self, cache: &mut Option<u128>, now: u64) -> VaultResult<u128> {
        if let Some(price) = cache {
            return Ok(*price);
        }
        let price = self.oracle.read(now)?;
        *cache = Some(price);
        Ok(price)
    }

    pub(crate) fn require_governor(&self, caller: &Address) -> VaultResult<()> {
        if !self.treasury.is_governor(caller) {
            return Err(VaultError::NotGovernor { caller: *caller });
        }
        Ok(())
    }

    pub(crate) fn require_governor_or_guardian(&self, caller: &Address) -> VaultResult<()> {
        if !self.treasury.is_governor_or_guardian(caller) {
            return Err(VaultError::NotGovernorOrGuardian { caller: *caller });
        }
        Ok(())
    }

    pub(crate) fn require_treasury(&self, caller: &Address) -> VaultResult<()> {
        if *caller != self.state.treasury {
            return Err(VaultError::NotTreasury { caller: *caller });
        }
        Ok(())
    }

    pub(crate) fn require_unpaused(&self) -> VaultResult<()> {
        if self.state.paused {
            return Err(VaultError::PausedCollateral);
        }
        Ok(())
    }

    // ============ Atomicity ============

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            state: self.state.clone(),
            events: self.events.len(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.state = checkpoint.state;
        self.events.truncate(checkpoint.events);
    }

    /// Run `body`, undoing its effects on this engine, the ledger and the
    /// remote engines if it fails
    pub(crate) fn atomically<L, T, F>(
        &mut self,
        ledger: &mut L,
        remotes: &mut [&mut VaultManager],
        body: F,
    ) -> VaultResult<T>
    where
        L: AssetLedger + Clone,
        F: FnOnce(&mut Self, &mut L, &mut [&mut VaultManager]) -> VaultResult<T>,
    {
        let checkpoint = self.checkpoint();
        let ledger_snapshot = ledger.clone();
        let remote_checkpoints: Vec<Checkpoint> = remotes.iter().map(|remote| remote.checkpoint()).collect();

        let result = body(self, ledger, &mut *remotes);

        if result.is_err() {
            self.restore(checkpoint);
            *ledger = ledger_snapshot;
            for (remote, checkpoint) in remotes.iter_mut().zip(remote_checkpoints) {
                remote.restore(checkpoint);
            }
        }
        result
    }
}

/// Check a parameter set as a whole
pub fn validate_parameters(params: &VaultParameters) -> VaultResult<()> {
    let base = BASE_PARAMS as u64;
    if params.liquidation_surcharge == 0 || params.liquidation_surcharge > base {
        return Err(VaultError::InvalidSetOfParameters { reason: "liquidation surcharge out of range" });
    }
    if params.collateral_factor > params.liquidation_surcharge {
        return Err(VaultError::InvalidSetOfParameters { reason: "collateral factor above liquidation surcharge" });
    }
    if params.target_health_factor < base {
        return Err(VaultError::InvalidSetOfParameters { reason: "target health factor below one" });
    }
    if params.max_liquidation_discount >= base {
        return Err(VaultError::InvalidSetOfParameters { reason: "max liquidation discount not below one" });
    }
    if params.base_boost == 0 {
        return Err(VaultError::InvalidSetOfParameters { reason: "base boost is zero" });
    }
    if params.borrow_fee > base {
        return Err(VaultError::InvalidSetOfParameters { reason: "borrow fee above one" });
    }
    if params.repay_fee as u128 + params.liquidation_surcharge as u128 > BASE_PARAMS {
        return Err(VaultError::InvalidSetOfParameters { reason: "repay fee and surcharge above one" });
    }
    if params.dust > params.dust_liquidation {
        return Err(VaultError::InvalidSetOfParameters { reason: "dust above liquidation dust" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_initialize_starts_paused_and_registers_minter() {
        let env = TestEnv::new_paused(default_test_params());

        assert!(env.manager.is_paused());
        assert_eq!(env.manager.interest_accumulator(), BASE_INTEREST);
        assert_eq!(env.manager.stablecoin(), STABLECOIN);
        assert!(env.ledger.is_minter(&STABLECOIN, &env.manager.address()));
        assert_eq!(
            env.manager.address(),
            manager_address(&TREASURY, &COLLATERAL, MARKET_NAME)
        );
    }

    #[test]
    fn test_initialize_rejects_inconsistent_parameters() {
        let cases = [
            VaultParameters { collateral_factor: 950_000_000, ..default_test_params() },
            VaultParameters { target_health_factor: 999_999_999, ..default_test_params() },
            VaultParameters { max_liquidation_discount: 1_000_000_000, ..default_test_params() },
            VaultParameters { base_boost: 0, ..default_test_params() },
            VaultParameters { borrow_fee: 1_000_000_001, ..default_test_params() },
            VaultParameters { repay_fee: 200_000_000, ..default_test_params() },
            VaultParameters { dust: 2 * ONE, dust_liquidation: ONE, ..default_test_params() },
        ];
        for params in cases {
            assert!(matches!(
                validate_parameters(&params),
                Err(VaultError::InvalidSetOfParameters { .. })
            ));
        }
        assert!(validate_parameters(&default_test_params()).is_ok());
    }

    #[test]
    fn test_initialize_rejects_wide_decimals() {
        let mut ledger = base_ledger();
        let config = ManagerConfig {
            name: MARKET_NAME.into(),
            collateral: COLLATERAL,
            collateral_decimals: 28,
            params: default_test_params(),
        };
        let result = VaultManager::initialize(
            config,
            Arc::new(treasury_roles()),
            Box::new(test_feed()),
            &mut ledger,
            START,
        );
        assert!(matches!(result, Err(VaultError::InvalidSetOfParameters { .. })));
    }

    #[test]
    fn test_state_root_tracks_changes() {
        let mut env = TestEnv::new(default_test_params());
        let before = env.manager.state_root();
        env.open_vault(ALICE, 10 * ONE, 0);
        assert_ne!(before, env.manager.state_root());
    }
}
