//! vaultkit Token Ledger
//!
//! In-memory multi-asset ledger holding the stablecoin and every collateral
//! asset. Vault managers settle batches and liquidations against it through
//! the `AssetLedger` trait.
//!
//! ## Rules
//!
//! - **Controlled assets**: each asset has a controller that decides who may
//!   mint and burn it
//! - **Minters**: only registered minters mint or burn
//! - **Allowances**: moving someone else's funds consumes their allowance
//! - **Permits**: signed allowances bound to a per-owner nonce and a deadline
//!
//! The ledger is `Clone`, so callers can snapshot it before a composite
//! operation and restore the snapshot if the operation is rejected.

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vaultkit_common::{
    errors::{AmountErrorReason, VaultError, VaultResult},
    events::{EventLog, VaultEvent},
    ledger::{permit_digest, sign_permit, AssetLedger},
    types::{Address, PermitData, ZERO_ADDRESS},
};

// ============ Ledger State ============

/// Per-asset metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AssetInfo {
    /// Account allowed to register minters
    pub controller: Address,
    /// Decimal places
    pub decimals: u8,
    /// Total supply tracking
    pub total_supply: u128,
    /// Accounts allowed to mint and burn
    pub minters: BTreeSet<Address>,
}

/// Persistent part of the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LedgerState {
    pub assets: BTreeMap<Address, AssetInfo>,
    /// (asset, account) -> balance
    pub balances: BTreeMap<(Address, Address), u128>,
    /// (asset, owner, spender) -> allowance
    pub allowances: BTreeMap<(Address, Address, Address), u128>,
    /// Permit signing keys
    pub signing_keys: BTreeMap<Address, [u8; 32]>,
    /// (asset, owner) -> next permit nonce
    pub nonces: BTreeMap<(Address, Address), u64>,
}

/// Multi-asset ledger with an event log
#[derive(Debug, Clone, Default)]
pub struct MultiAssetLedger {
    state: LedgerState,
    events: EventLog,
}

impl MultiAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new asset
    pub fn create_asset(&mut self, asset: Address, controller: Address, decimals: u8) -> VaultResult<()> {
        if asset == ZERO_ADDRESS || controller == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        if self.state.assets.contains_key(&asset) {
            return Err(VaultError::InvalidParameterValue { parameter: "asset" });
        }
        self.state.assets.insert(
            asset,
            AssetInfo {
                controller,
                decimals,
                total_supply: 0,
                minters: BTreeSet::new(),
            },
        );
        Ok(())
    }

    /// Set `spender`'s allowance on `owner`'s balance
    pub fn approve(
        &mut self,
        asset: &Address,
        owner: &Address,
        spender: &Address,
        amount: u128,
        now: u64,
    ) -> VaultResult<()> {
        self.asset(asset)?;
        if *spender == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        self.state.allowances.insert((*asset, *owner, *spender), amount);
        self.events.emit(VaultEvent::TokenApproval {
            asset: *asset,
            owner: *owner,
            spender: *spender,
            amount,
            timestamp: now,
        });
        Ok(())
    }

    /// Register the key `owner` signs permits with
    pub fn register_signing_key(&mut self, owner: Address, key: [u8; 32]) {
        self.state.signing_keys.insert(owner, key);
    }

    /// Next permit nonce of `owner` on `asset`
    pub fn nonce(&self, asset: &Address, owner: &Address) -> u64 {
        self.state.nonces.get(&(*asset, *owner)).copied().unwrap_or_default()
    }

    pub fn total_supply(&self, asset: &Address) -> u128 {
        self.state.assets.get(asset).map(|a| a.total_supply).unwrap_or_default()
    }

    pub fn decimals(&self, asset: &Address) -> VaultResult<u8> {
        Ok(self.asset(asset)?.decimals)
    }

    pub fn is_minter(&self, asset: &Address, account: &Address) -> bool {
        self.state
            .assets
            .get(asset)
            .map(|a| a.minters.contains(account))
            .unwrap_or(false)
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ============ Internal Helpers ============

    fn asset(&self, asset: &Address) -> VaultResult<&AssetInfo> {
        self.state
            .assets
            .get(asset)
            .ok_or(VaultError::UnknownAsset { asset: *asset })
    }

    fn asset_mut(&mut self, asset: &Address) -> VaultResult<&mut AssetInfo> {
        self.state
            .assets
            .get_mut(asset)
            .ok_or(VaultError::UnknownAsset { asset: *asset })
    }

    fn require_minter(&self, asset: &Address, minter: &Address) -> VaultResult<()> {
        if !self.asset(asset)?.minters.contains(minter) {
            return Err(VaultError::MintUnauthorized { asset: *asset, caller: *minter });
        }
        Ok(())
    }

    fn spend_allowance(&mut self, asset: &Address, owner: &Address, spender: &Address, amount: u128) -> VaultResult<()> {
        if owner == spender {
            return Ok(());
        }
        let key = (*asset, *owner, *spender);
        let available = self.state.allowances.get(&key).copied().unwrap_or_default();
        if available < amount {
            return Err(VaultError::InsufficientAllowance { available, requested: amount });
        }
        if available != u128::MAX {
            self.state.allowances.insert(key, available - amount);
        }
        Ok(())
    }

    fn debit(&mut self, asset: &Address, account: &Address, amount: u128) -> VaultResult<()> {
        let key = (*asset, *account);
        let available = self.state.balances.get(&key).copied().unwrap_or_default();
        if available < amount {
            return Err(VaultError::InsufficientBalance { available, requested: amount });
        }
        self.state.balances.insert(key, available - amount);
        Ok(())
    }

    fn credit(&mut self, asset: &Address, account: &Address, amount: u128) -> VaultResult<()> {
        let balance = self.state.balances.entry((*asset, *account)).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(VaultError::Overflow)?;
        Ok(())
    }

    fn move_funds(&mut self, asset: &Address, from: &Address, to: &Address, amount: u128, now: u64) -> VaultResult<()> {
        self.asset(asset)?;
        if *to == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        if amount == 0 {
            return Ok(());
        }
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)?;
        self.events.emit(VaultEvent::TokenTransfer {
            asset: *asset,
            from: *from,
            to: *to,
            amount,
            timestamp: now,
        });
        Ok(())
    }
}

impl AssetLedger for MultiAssetLedger {
    fn balance_of(&self, asset: &Address, account: &Address) -> u128 {
        self.state.balances.get(&(*asset, *account)).copied().unwrap_or_default()
    }

    fn allowance(&self, asset: &Address, owner: &Address, spender: &Address) -> u128 {
        self.state
            .allowances
            .get(&(*asset, *owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    fn transfer(&mut self, asset: &Address, from: &Address, to: &Address, amount: u128, now: u64) -> VaultResult<()> {
        self.move_funds(asset, from, to, amount, now)
    }

    fn transfer_from(
        &mut self,
        asset: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
        now: u64,
    ) -> VaultResult<()> {
        self.asset(asset)?;
        self.spend_allowance(asset, from, spender, amount)?;
        self.move_funds(asset, from, to, amount, now)
    }

    fn mint(&mut self, asset: &Address, minter: &Address, to: &Address, amount: u128, now: u64) -> VaultResult<()> {
        self.require_minter(asset, minter)?;
        if *to == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        if amount == 0 {
            return Err(VaultError::InvalidAmount { amount, reason: AmountErrorReason::Zero });
        }
        let info = self.asset_mut(asset)?;
        info.total_supply = info.total_supply.checked_add(amount).ok_or(VaultError::Overflow)?;
        self.credit(asset, to, amount)?;
        self.events.emit(VaultEvent::TokenMint {
            asset: *asset,
            to: *to,
            amount,
            timestamp: now,
        });
        Ok(())
    }

    fn burn_from(
        &mut self,
        asset: &Address,
        minter: &Address,
        from: &Address,
        sender: &Address,
        amount: u128,
        now: u64,
    ) -> VaultResult<()> {
        self.require_minter(asset, minter)?;
        if amount == 0 {
            return Err(VaultError::InvalidAmount { amount, reason: AmountErrorReason::Zero });
        }
        self.spend_allowance(asset, from, sender, amount)?;
        self.debit(asset, from, amount)?;
        let info = self.asset_mut(asset)?;
        info.total_supply = info.total_supply.checked_sub(amount).ok_or(VaultError::Underflow)?;
        self.events.emit(VaultEvent::TokenBurn {
            asset: *asset,
            from: *from,
            amount,
            timestamp: now,
        });
        Ok(())
    }

    fn register_minter(&mut self, asset: &Address, controller: &Address, minter: &Address, now: u64) -> VaultResult<()> {
        let info = self.asset_mut(asset)?;
        if info.controller != *controller {
            return Err(VaultError::Unauthorized {
                expected: info.controller,
                actual: *controller,
            });
        }
        if *minter == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        info.minters.insert(*minter);
        self.events.emit(VaultEvent::MinterRegistered {
            asset: *asset,
            minter: *minter,
            timestamp: now,
        });
        Ok(())
    }

    fn permit(&mut self, permit: &PermitData, now: u64) -> VaultResult<()> {
        self.asset(&permit.asset)?;
        if now > permit.deadline {
            return Err(VaultError::ExpiredPermit { deadline: permit.deadline, now });
        }
        let key = self
            .state
            .signing_keys
            .get(&permit.owner)
            .copied()
            .ok_or(VaultError::InvalidSignature)?;
        let nonce = self.nonce(&permit.asset, &permit.owner);
        let digest = permit_digest(
            &permit.asset,
            &permit.owner,
            &permit.spender,
            permit.value,
            nonce,
            permit.deadline,
        );
        if sign_permit(&key, &digest) != permit.signature {
            return Err(VaultError::InvalidSignature);
        }

        self.state.nonces.insert((permit.asset, permit.owner), nonce + 1);
        self.approve(&permit.asset, &permit.owner, &permit.spender, permit.value, now)
    }
}

// ============ Helper Functions ============

/// Build a signed permit for `owner` using its current nonce on `ledger`
pub fn signed_permit(
    ledger: &MultiAssetLedger,
    signing_key: &[u8; 32],
    asset: Address,
    owner: Address,
    spender: Address,
    value: u128,
    deadline: u64,
) -> PermitData {
    let nonce = ledger.nonce(&asset, &owner);
    let digest = permit_digest(&asset, &owner, &spender, value, nonce, deadline);
    PermitData {
        asset,
        owner,
        spender,
        value,
        deadline,
        signature: sign_permit(signing_key, &digest),
    }
}

/// Split an amount into whole units and the fractional remainder
pub fn format_amount(amount: u128, decimals: u8) -> (u128, u128) {
    let one = 10u128.saturating_pow(decimals as u32);
    (amount / one, amount % one)
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;

    const STABLE: Address = [10u8; 32];
    const TREASURY: Address = [11u8; 32];
    const MANAGER: Address = [12u8; 32];
    const ALICE: Address = [1u8; 32];
    const BOB: Address = [2u8; 32];

    fn create_test_ledger() -> MultiAssetLedger {
        let mut ledger = MultiAssetLedger::new();
        ledger.create_asset(STABLE, TREASURY, 18).unwrap();
        ledger.register_minter(&STABLE, &TREASURY, &MANAGER, 0).unwrap();
        ledger
    }

    #[test]
    fn test_mint_and_transfer() {
        let mut ledger = create_test_ledger();
        ledger.mint(&STABLE, &MANAGER, &ALICE, 1000, 1).unwrap();
        ledger.transfer(&STABLE, &ALICE, &BOB, 600, 1).unwrap();

        assert_eq!(ledger.balance_of(&STABLE, &ALICE), 400);
        assert_eq!(ledger.balance_of(&STABLE, &BOB), 600);
        assert_eq!(ledger.total_supply(&STABLE), 1000);
        assert_eq!(ledger.events().len(), 3);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut ledger = create_test_ledger();
        ledger.mint(&STABLE, &MANAGER, &ALICE, 500, 1).unwrap();

        let result = ledger.transfer(&STABLE, &ALICE, &BOB, 1000, 1);
        assert!(matches!(result, Err(VaultError::InsufficientBalance { .. })));
    }

    #[test]
    fn test_mint_unauthorized() {
        let mut ledger = create_test_ledger();
        let attacker = [99u8; 32];

        let result = ledger.mint(&STABLE, &attacker, &attacker, 1000, 1);
        assert!(matches!(result, Err(VaultError::MintUnauthorized { .. })));
    }

    #[test]
    fn test_only_controller_registers_minters() {
        let mut ledger = create_test_ledger();
        let result = ledger.register_minter(&STABLE, &ALICE, &ALICE, 1);
        assert!(matches!(result, Err(VaultError::Unauthorized { .. })));
    }

    #[test]
    fn test_burn_from_consumes_allowance() {
        let mut ledger = create_test_ledger();
        ledger.mint(&STABLE, &MANAGER, &ALICE, 1000, 1).unwrap();

        // BOB cannot burn ALICE's tokens without allowance
        let result = ledger.burn_from(&STABLE, &MANAGER, &ALICE, &BOB, 100, 1);
        assert!(matches!(result, Err(VaultError::InsufficientAllowance { .. })));

        ledger.approve(&STABLE, &ALICE, &BOB, 300, 1).unwrap();
        ledger.burn_from(&STABLE, &MANAGER, &ALICE, &BOB, 100, 1).unwrap();
        assert_eq!(ledger.allowance(&STABLE, &ALICE, &BOB), 200);
        assert_eq!(ledger.balance_of(&STABLE, &ALICE), 900);
        assert_eq!(ledger.total_supply(&STABLE), 900);

        // Self-burn needs no allowance
        ledger.burn_from(&STABLE, &MANAGER, &ALICE, &ALICE, 900, 1).unwrap();
        assert_eq!(ledger.total_supply(&STABLE), 0);
    }

    #[test]
    fn test_permit() {
        let mut ledger = create_test_ledger();
        let key = [42u8; 32];
        ledger.register_signing_key(ALICE, key);

        let permit = signed_permit(&ledger, &key, STABLE, ALICE, BOB, 500, 100);
        ledger.permit(&permit, 50).unwrap();
        assert_eq!(ledger.allowance(&STABLE, &ALICE, &BOB), 500);
        assert_eq!(ledger.nonce(&STABLE, &ALICE), 1);

        // Replay fails: nonce moved on
        let result = ledger.permit(&permit, 50);
        assert!(matches!(result, Err(VaultError::InvalidSignature)));
    }

    #[test]
    fn test_permit_expired_and_forged() {
        let mut ledger = create_test_ledger();
        let key = [42u8; 32];
        ledger.register_signing_key(ALICE, key);

        let permit = signed_permit(&ledger, &key, STABLE, ALICE, BOB, 500, 100);
        let result = ledger.permit(&permit, 101);
        assert!(matches!(result, Err(VaultError::ExpiredPermit { deadline: 100, now: 101 })));

        let forged = signed_permit(&ledger, &[7u8; 32], STABLE, ALICE, BOB, 500, 100);
        let result = ledger.permit(&forged, 50);
        assert!(matches!(result, Err(VaultError::InvalidSignature)));
    }

    #[test]
    fn test_unknown_asset() {
        let mut ledger = create_test_ledger();
        let result = ledger.transfer(&[77u8; 32], &ALICE, &BOB, 1, 1);
        assert!(matches!(result, Err(VaultError::UnknownAsset { .. })));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_500_000_000_000_000_000, 18), (1, 500_000_000_000_000_000));
    }
}
