//! Vault Registry
//!
//! Vault balances and NFT-like ownership: each vault id has one owner, an
//! optional single approved spender, and owners can approve operators for
//! all of their vaults. Ids are assigned sequentially from 1 and never
//! reused.

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vaultkit_common::{
    errors::{VaultError, VaultResult},
    events::VaultEvent,
    types::{Address, CallContext, Vault, VaultId, ZERO_ADDRESS},
};

use crate::{VaultManager, LOG_TARGET};

// ============ Registry State ============

/// Ownership tables and vault balances
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultRegistry {
    /// Last id handed out
    vault_id_count: VaultId,
    vaults: BTreeMap<VaultId, Vault>,
    owners: BTreeMap<VaultId, Address>,
    /// Enumeration per owner
    owned: BTreeMap<Address, BTreeSet<VaultId>>,
    approvals: BTreeMap<VaultId, Address>,
    /// (owner, operator)
    operator_approvals: BTreeSet<(Address, Address)>,
    whitelist: BTreeSet<Address>,
}

impl VaultRegistry {
    pub fn vault_id_count(&self) -> VaultId {
        self.vault_id_count
    }

    pub fn vault(&self, vault_id: VaultId) -> Option<&Vault> {
        self.vaults.get(&vault_id)
    }

    pub(crate) fn vault_mut(&mut self, vault_id: VaultId) -> VaultResult<&mut Vault> {
        self.vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NonexistentVault { vault_id })
    }

    pub fn exists(&self, vault_id: VaultId) -> bool {
        self.owners.contains_key(&vault_id)
    }

    pub fn owner_of(&self, vault_id: VaultId) -> VaultResult<Address> {
        self.owners
            .get(&vault_id)
            .copied()
            .ok_or(VaultError::NonexistentVault { vault_id })
    }

    pub fn balance_of(&self, owner: &Address) -> usize {
        self.owned.get(owner).map(BTreeSet::len).unwrap_or_default()
    }

    pub fn vaults_of(&self, owner: &Address) -> Vec<VaultId> {
        self.owned
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn get_approved(&self, vault_id: VaultId) -> VaultResult<Address> {
        self.owner_of(vault_id)?;
        Ok(self.approvals.get(&vault_id).copied().unwrap_or(ZERO_ADDRESS))
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.operator_approvals.contains(&(*owner, *operator))
    }

    /// `spender` may act on the vault
    pub fn is_approved_or_owner(&self, spender: &Address, vault_id: VaultId) -> VaultResult<bool> {
        let owner = self.owner_of(vault_id)?;
        Ok(*spender == owner
            || self.approvals.get(&vault_id) == Some(spender)
            || self.is_approved_for_all(&owner, spender))
    }

    pub fn is_whitelisted(&self, account: &Address) -> bool {
        self.whitelist.contains(account)
    }

    /// Flip a whitelist entry, returning the new membership
    pub(crate) fn toggle_whitelisted(&mut self, account: Address) -> bool {
        if self.whitelist.remove(&account) {
            false
        } else {
            self.whitelist.insert(account);
            true
        }
    }

    pub(crate) fn mint(&mut self, to: Address) -> VaultResult<VaultId> {
        let vault_id = self.vault_id_count.checked_add(1).ok_or(VaultError::Overflow)?;
        self.vault_id_count = vault_id;
        self.vaults.insert(vault_id, Vault::default());
        self.owners.insert(vault_id, to);
        self.owned.entry(to).or_default().insert(vault_id);
        Ok(vault_id)
    }

    pub(crate) fn burn(&mut self, vault_id: VaultId) -> VaultResult<Address> {
        let owner = self
            .owners
            .remove(&vault_id)
            .ok_or(VaultError::NonexistentVault { vault_id })?;
        self.vaults.remove(&vault_id);
        self.approvals.remove(&vault_id);
        self.remove_owned(&owner, vault_id);
        Ok(owner)
    }

    fn remove_owned(&mut self, owner: &Address, vault_id: VaultId) {
        if let Some(ids) = self.owned.get_mut(owner) {
            ids.remove(&vault_id);
            if ids.is_empty() {
                self.owned.remove(owner);
            }
        }
    }

    fn move_vault(&mut self, from: &Address, to: Address, vault_id: VaultId) {
        self.approvals.remove(&vault_id);
        self.remove_owned(from, vault_id);
        self.owned.entry(to).or_default().insert(vault_id);
        self.owners.insert(vault_id, to);
    }
}

// ============ Ownership Operations ============

impl VaultManager {
    pub fn registry(&self) -> &crate::VaultRegistry {
        &self.state.registry
    }

    pub fn owner_of(&self, vault_id: VaultId) -> VaultResult<Address> {
        self.state.registry.owner_of(vault_id)
    }

    /// Number of vaults owned by `owner`
    pub fn balance_of(&self, owner: &Address) -> VaultResult<usize> {
        if *owner == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        Ok(self.state.registry.balance_of(owner))
    }

    pub fn vaults_of(&self, owner: &Address) -> Vec<VaultId> {
        self.state.registry.vaults_of(owner)
    }

    pub fn get_approved(&self, vault_id: VaultId) -> VaultResult<Address> {
        self.state.registry.get_approved(vault_id)
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.state.registry.is_approved_for_all(owner, operator)
    }

    pub fn is_approved_or_owner(&self, spender: &Address, vault_id: VaultId) -> VaultResult<bool> {
        self.state.registry.is_approved_or_owner(spender, vault_id)
    }

    pub fn is_whitelisted(&self, account: &Address) -> bool {
        self.state.registry.is_whitelisted(account)
    }

    /// Approve `to` on one vault; `ZERO_ADDRESS` clears the approval
    pub fn approve(&mut self, ctx: &CallContext, to: Address, vault_id: VaultId) -> VaultResult<()> {
        let owner = self.state.registry.owner_of(vault_id)?;
        if to == owner {
            return Err(VaultError::ApprovalToOwner);
        }
        if ctx.caller != owner && !self.state.registry.is_approved_for_all(&owner, &ctx.caller) {
            return Err(VaultError::NotApprovedOrOwner { vault_id, caller: ctx.caller });
        }

        if to == ZERO_ADDRESS {
            self.state.registry.approvals.remove(&vault_id);
        } else {
            self.state.registry.approvals.insert(vault_id, to);
        }
        self.events.emit(VaultEvent::Approval {
            owner,
            approved: to,
            vault_id,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Approve or revoke `operator` on every vault of the caller
    pub fn set_approval_for_all(&mut self, ctx: &CallContext, operator: Address, approved: bool) -> VaultResult<()> {
        if operator == ctx.caller {
            return Err(VaultError::ApprovalToCaller);
        }
        if operator == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        let key = (ctx.caller, operator);
        if approved {
            self.state.registry.operator_approvals.insert(key);
        } else {
            self.state.registry.operator_approvals.remove(&key);
        }
        self.events.emit(VaultEvent::ApprovalForAll {
            owner: ctx.caller,
            operator,
            approved,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Move a vault; clears its single approval
    ///
    /// # Errors
    /// `NotApprovedOrOwner` when the caller may not move the vault or `from`
    /// is not its owner, `ZeroAddress` for a zero recipient, `NotWhitelisted`
    /// when whitelisting is active and caller or recipient is not listed.
    pub fn transfer_from(&mut self, ctx: &CallContext, from: Address, to: Address, vault_id: VaultId) -> VaultResult<()> {
        if !self.state.registry.is_approved_or_owner(&ctx.caller, vault_id)? {
            return Err(VaultError::NotApprovedOrOwner { vault_id, caller: ctx.caller });
        }
        if self.state.registry.owner_of(vault_id)? != from {
            return Err(VaultError::NotApprovedOrOwner { vault_id, caller: ctx.caller });
        }
        if to == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        self.require_whitelisted(&ctx.caller, &to)?;

        self.state.registry.move_vault(&from, to, vault_id);
        self.events.emit(VaultEvent::Transfer {
            from,
            to,
            vault_id,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    // ============ Internal Helpers ============

    pub(crate) fn require_whitelisted(&self, caller: &Address, to: &Address) -> VaultResult<()> {
        if !self.state.params.whitelisting_activated {
            return Ok(());
        }
        for account in [caller, to] {
            if !self.state.registry.is_whitelisted(account) {
                return Err(VaultError::NotWhitelisted { account: *account });
            }
        }
        Ok(())
    }

    pub(crate) fn require_approved_or_owner(&self, caller: &Address, vault_id: VaultId) -> VaultResult<()> {
        if !self.state.registry.is_approved_or_owner(caller, vault_id)? {
            return Err(VaultError::NotApprovedOrOwner { vault_id, caller: *caller });
        }
        Ok(())
    }

    /// Mint a vault to `to`
    pub(crate) fn mint_vault(&mut self, ctx: &CallContext, to: Address) -> VaultResult<VaultId> {
        if to == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        self.require_whitelisted(&ctx.caller, &to)?;
        let vault_id = self.state.registry.mint(to)?;
        self.events.emit(VaultEvent::Transfer {
            from: ZERO_ADDRESS,
            to,
            vault_id,
            timestamp: ctx.timestamp,
        });
        log::debug!(target: LOG_TARGET, "vault {} created", vault_id);
        Ok(vault_id)
    }

    pub(crate) fn burn_vault(&mut self, ctx: &CallContext, vault_id: VaultId) -> VaultResult<()> {
        let owner = self.state.registry.burn(vault_id)?;
        self.events.emit(VaultEvent::Transfer {
            from: owner,
            to: ZERO_ADDRESS,
            vault_id,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_mint_assigns_sequential_ids() {
        let mut registry = VaultRegistry::default();
        assert_eq!(registry.mint(ALICE).unwrap(), 1);
        assert_eq!(registry.mint(BOB).unwrap(), 2);
        assert_eq!(registry.mint(ALICE).unwrap(), 3);

        assert_eq!(registry.vaults_of(&ALICE), vec![1, 3]);
        assert_eq!(registry.balance_of(&BOB), 1);

        // Burnt ids are not reused
        registry.burn(3).unwrap();
        assert_eq!(registry.mint(BOB).unwrap(), 4);
        assert!(!registry.exists(3));
    }

    #[test]
    fn test_approve_and_transfer() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 0);

        // BOB cannot move ALICE's vault yet
        let result = env.manager.transfer_from(&env.ctx(BOB), ALICE, BOB, vault_id);
        assert!(matches!(result, Err(VaultError::NotApprovedOrOwner { .. })));

        env.manager.approve(&env.ctx(ALICE), BOB, vault_id).unwrap();
        assert_eq!(env.manager.get_approved(vault_id).unwrap(), BOB);

        env.manager.transfer_from(&env.ctx(BOB), ALICE, CAROL, vault_id).unwrap();
        assert_eq!(env.manager.owner_of(vault_id).unwrap(), CAROL);
        // Transfer clears the single approval
        assert_eq!(env.manager.get_approved(vault_id).unwrap(), ZERO_ADDRESS);
        assert_eq!(env.manager.balance_of(&ALICE).unwrap(), 0);
        assert_eq!(env.manager.vaults_of(&CAROL), vec![vault_id]);
    }

    #[test]
    fn test_approval_errors() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 0);

        assert!(matches!(
            env.manager.approve(&env.ctx(ALICE), ALICE, vault_id),
            Err(VaultError::ApprovalToOwner)
        ));
        assert!(matches!(
            env.manager.approve(&env.ctx(BOB), BOB, vault_id),
            Err(VaultError::NotApprovedOrOwner { .. })
        ));
        assert!(matches!(
            env.manager.set_approval_for_all(&env.ctx(ALICE), ALICE, true),
            Err(VaultError::ApprovalToCaller)
        ));
        assert!(matches!(env.manager.approve(&env.ctx(ALICE), BOB, 99), Err(VaultError::NonexistentVault { vault_id: 99 })));
        assert!(matches!(env.manager.balance_of(&ZERO_ADDRESS), Err(VaultError::ZeroAddress)));
    }

    #[test]
    fn test_operator_approval() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 0);

        env.manager.set_approval_for_all(&env.ctx(ALICE), BOB, true).unwrap();
        assert!(env.manager.is_approved_or_owner(&BOB, vault_id).unwrap());

        // An operator may set single approvals
        env.manager.approve(&env.ctx(BOB), CAROL, vault_id).unwrap();
        assert!(env.manager.is_approved_or_owner(&CAROL, vault_id).unwrap());

        env.manager.set_approval_for_all(&env.ctx(ALICE), BOB, false).unwrap();
        assert!(!env.manager.is_approved_or_owner(&BOB, vault_id).unwrap());
    }

    #[test]
    fn test_transfer_to_zero_and_wrong_from() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 0);

        assert!(matches!(
            env.manager.transfer_from(&env.ctx(ALICE), ALICE, ZERO_ADDRESS, vault_id),
            Err(VaultError::ZeroAddress)
        ));
        assert!(matches!(
            env.manager.transfer_from(&env.ctx(ALICE), BOB, CAROL, vault_id),
            Err(VaultError::NotApprovedOrOwner { .. })
        ));
    }
}
