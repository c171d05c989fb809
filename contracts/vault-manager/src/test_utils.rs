//! Shared fixtures for the vault-manager tests

use std::sync::Arc;

use vaultkit_common::{
    constants::{defaults, stablecoin},
    errors::VaultResult,
    ledger::AssetLedger,
    types::{
        Action, Address, BatchRequest, CallContext, LiquidationRequest, LiquidatorData, PaymentData, VaultId,
        VaultParameters,
    },
    Role, TreasuryRoles,
};
use vaultkit_price_oracle::{PriceFeedState, SharedPriceFeed};
use vaultkit_token::MultiAssetLedger;

use crate::{manager_address, ManagerConfig, VaultManager};

// ============ Accounts ============

pub const ALICE: Address = [0xA1; 32];
pub const BOB: Address = [0xB0; 32];
pub const CAROL: Address = [0xC0; 32];
pub const LIQUIDATOR: Address = [0x11; 32];
pub const GOVERNOR: Address = [0x60; 32];
pub const GUARDIAN: Address = [0x61; 32];
pub const TREASURY: Address = [0x70; 32];
pub const ORACLE_OPERATOR: Address = [0x0F; 32];
pub const COLLATERAL_ISSUER: Address = [0xC1; 32];

// ============ Assets ============

pub const STABLECOIN: Address = [0x5D; 32];
pub const COLLATERAL: Address = [0xE7; 32];
/// Collateral of the second market used by cross-engine tests
pub const SECOND_COLLATERAL: Address = [0xE8; 32];

pub const MARKET_NAME: &str = "vaultkit WETH";
pub const SECOND_MARKET_NAME: &str = "vaultkit WBTC";

// ============ Amounts ============

pub const ONE: u128 = stablecoin::ONE;
pub const DUST: u128 = ONE / 10;
pub const START: u64 = 1_700_000_000;
pub const DEFAULT_RATE: u64 = defaults::INTEREST_RATE;
/// Collateral each user starts with, on both collaterals
pub const USER_COLLATERAL: u128 = 1_000 * ONE;

/// CF 0.8, LS 0.9, THF 1.1, MLD 0.1, boost 1.5, no fees, no interest
pub fn default_test_params() -> VaultParameters {
    VaultParameters {
        debt_ceiling: 1_000_000 * ONE,
        collateral_factor: 800_000_000,
        target_health_factor: 1_100_000_000,
        interest_rate: 0,
        liquidation_surcharge: 900_000_000,
        max_liquidation_discount: 100_000_000,
        borrow_fee: 0,
        repay_fee: 0,
        dust: DUST,
        dust_liquidation: DUST,
        dust_collateral: DUST,
        whitelisting_activated: false,
        base_boost: 1_500_000_000,
    }
}

/// Ledger with both collaterals and the stablecoin, users funded
pub fn base_ledger() -> MultiAssetLedger {
    let mut ledger = MultiAssetLedger::new();
    ledger.create_asset(STABLECOIN, TREASURY, 18).unwrap();
    for collateral in [COLLATERAL, SECOND_COLLATERAL] {
        ledger.create_asset(collateral, COLLATERAL_ISSUER, 18).unwrap();
        ledger
            .register_minter(&collateral, &COLLATERAL_ISSUER, &COLLATERAL_ISSUER, START)
            .unwrap();
        for user in [ALICE, BOB, CAROL, LIQUIDATOR] {
            ledger
                .mint(&collateral, &COLLATERAL_ISSUER, &user, USER_COLLATERAL, START)
                .unwrap();
        }
    }
    ledger
}

/// Treasury with GOVERNOR, GUARDIAN and both test markets registered
pub fn treasury_roles() -> TreasuryRoles {
    let mut roles = TreasuryRoles::new(TREASURY, STABLECOIN, GOVERNOR).unwrap();
    roles.grant_role(&GOVERNOR, GUARDIAN, Role::Guardian).unwrap();
    for (collateral, name) in [(COLLATERAL, MARKET_NAME), (SECOND_COLLATERAL, SECOND_MARKET_NAME)] {
        roles
            .add_vault_manager(&GOVERNOR, manager_address(&TREASURY, &collateral, name))
            .unwrap();
    }
    roles
}

/// Feed at 2 that never goes stale and accepts any move
pub fn test_feed() -> SharedPriceFeed {
    let mut state = PriceFeedState::new(ORACLE_OPERATOR, ORACLE_OPERATOR, 2 * ONE, START);
    state.max_age = u64::MAX;
    state.max_deviation_bps = 0;
    SharedPriceFeed::new(state)
}

pub fn create_test_manager(
    ledger: &mut MultiAssetLedger,
    treasury: Arc<TreasuryRoles>,
    feed: &SharedPriceFeed,
    collateral: Address,
    name: &str,
    params: VaultParameters,
) -> VaultManager {
    let config = ManagerConfig {
        name: name.into(),
        collateral,
        collateral_decimals: 18,
        params,
    };
    let mut manager = VaultManager::initialize(config, treasury, Box::new(feed.clone()), ledger, START).unwrap();
    manager.toggle_pause(&CallContext::new(GOVERNOR, START)).unwrap();
    manager
}

// ============ Test Environment ============

/// One unpaused engine with its ledger, feed and clock
pub struct TestEnv {
    pub manager: VaultManager,
    pub ledger: MultiAssetLedger,
    pub feed: SharedPriceFeed,
    pub treasury: Arc<TreasuryRoles>,
    pub now: u64,
}

impl TestEnv {
    pub fn new(params: VaultParameters) -> Self {
        let mut ledger = base_ledger();
        let treasury = Arc::new(treasury_roles());
        let feed = test_feed();
        let manager = create_test_manager(&mut ledger, treasury.clone(), &feed, COLLATERAL, MARKET_NAME, params);
        Self {
            manager,
            ledger,
            feed,
            treasury,
            now: START,
        }
    }

    /// Engine as left by `initialize`
    pub fn new_paused(params: VaultParameters) -> Self {
        let mut env = Self::new(params);
        env.manager.toggle_pause(&CallContext::new(GOVERNOR, START)).unwrap();
        env
    }

    pub fn ctx(&self, caller: Address) -> CallContext {
        CallContext::new(caller, self.now)
    }

    pub fn angle(&mut self, caller: Address, actions: Vec<Action>, from: Address, to: Address) -> VaultResult<PaymentData> {
        let ctx = self.ctx(caller);
        let request = BatchRequest::new(actions, from, to);
        self.manager.angle(&ctx, &request, &mut self.ledger, &mut [], None)
    }

    pub fn liquidate(&mut self, caller: Address, vault_ids: Vec<VaultId>, amounts: Vec<u128>) -> VaultResult<LiquidatorData> {
        let ctx = self.ctx(caller);
        let request = LiquidationRequest {
            vault_ids,
            amounts,
            from: caller,
            to: caller,
            data: Vec::new(),
        };
        self.manager.liquidate(&ctx, &request, &mut self.ledger, None)
    }

    /// Create a vault for `owner` with `collateral` and borrow `debt`
    pub fn open_vault(&mut self, owner: Address, collateral: u128, debt: u128) -> VaultId {
        let mut actions = vec![
            Action::CreateVault { to: owner },
            Action::AddCollateral { vault_id: 0, amount: collateral },
        ];
        if debt > 0 {
            actions.push(Action::Borrow { vault_id: 0, amount: debt });
        }
        self.angle(owner, actions, owner, owner).unwrap();
        self.manager.registry().vault_id_count()
    }

    pub fn advance(&mut self, seconds: u64) {
        self.now += seconds;
    }

    pub fn set_price(&mut self, price: u128) {
        self.feed.update_price(&ORACLE_OPERATOR, price, self.now).unwrap();
    }

    pub fn stable_balance(&self, account: &Address) -> u128 {
        self.ledger.balance_of(&STABLECOIN, account)
    }

    pub fn collateral_balance(&self, account: &Address) -> u128 {
        self.ledger.balance_of(&COLLATERAL, account)
    }

    pub fn approve_collateral(&mut self, owner: Address, spender: Address, amount: u128) {
        self.ledger.approve(&COLLATERAL, &owner, &spender, amount, self.now).unwrap();
    }

    pub fn transfer_stable(&mut self, from: Address, to: Address, amount: u128) {
        self.ledger.transfer(&STABLECOIN, &from, &to, amount, self.now).unwrap();
    }
}
