//! Access Control Module
//!
//! Treasury interface consumed by vault managers, and the role registry
//! that backs it.
//!
//! ## Key Features
//!
//! - **Governor / Guardian roles**: governors administer everything, guardians
//!   can act on the faster risk levers (pause, debt ceiling, risk parameters)
//! - **Vault-manager registry**: cross-manager debt transfers only accept
//!   managers registered here
//! - **Minter registration**: the treasury authorizes engines on the stablecoin

use crate::errors::{VaultError, VaultResult};
use crate::ledger::AssetLedger;
use crate::types::{Address, ZERO_ADDRESS};
use crate::{BTreeSet, Vec};

// ============================================================================
// Types
// ============================================================================

/// Protocol roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    /// Can do anything, including granting roles
    Governor,
    /// Can adjust risk levers and pause
    Guardian,
}

/// What an engine needs to know about its treasury
pub trait Treasury {
    /// Treasury address (receives accrued surplus)
    fn address(&self) -> Address;

    /// Stablecoin the engine mints
    fn stablecoin(&self) -> Address;

    fn is_governor(&self, account: &Address) -> bool;

    fn is_governor_or_guardian(&self, account: &Address) -> bool;

    /// `manager` is a vault manager of this treasury
    fn is_vault_manager(&self, manager: &Address) -> bool;

    /// Authorize `minter` on the stablecoin
    fn add_minter(&self, ledger: &mut dyn AssetLedger, minter: &Address, now: u64) -> VaultResult<()>;
}

/// Role registry implementing `Treasury`
#[derive(Debug, Clone)]
pub struct TreasuryRoles {
    address: Address,
    stablecoin: Address,
    roles: BTreeSet<(Address, Role)>,
    vault_managers: BTreeSet<Address>,
}

impl TreasuryRoles {
    /// Create a registry with an initial governor
    pub fn new(address: Address, stablecoin: Address, governor: Address) -> VaultResult<Self> {
        if address == ZERO_ADDRESS || stablecoin == ZERO_ADDRESS || governor == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        let mut roles = BTreeSet::new();
        roles.insert((governor, Role::Governor));
        Ok(Self {
            address,
            stablecoin,
            roles,
            vault_managers: BTreeSet::new(),
        })
    }

    /// Check if address has a specific role
    pub fn has_role(&self, account: &Address, role: Role) -> bool {
        self.roles.contains(&(*account, role))
    }

    /// Grant a role (governor only)
    pub fn grant_role(&mut self, granter: &Address, grantee: Address, role: Role) -> VaultResult<()> {
        if !self.has_role(granter, Role::Governor) {
            return Err(VaultError::NotGovernor { caller: *granter });
        }
        if grantee == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        self.roles.insert((grantee, role));
        Ok(())
    }

    /// Revoke a role (governor only); the last governor cannot be removed
    pub fn revoke_role(&mut self, revoker: &Address, target: &Address, role: Role) -> VaultResult<()> {
        if !self.has_role(revoker, Role::Governor) {
            return Err(VaultError::NotGovernor { caller: *revoker });
        }
        if role == Role::Governor && self.governors().len() == 1 && self.has_role(target, Role::Governor) {
            return Err(VaultError::InvalidParameterValue { parameter: "governor" });
        }
        self.roles.remove(&(*target, role));
        Ok(())
    }

    /// Register a vault manager (governor only)
    pub fn add_vault_manager(&mut self, caller: &Address, manager: Address) -> VaultResult<()> {
        if !self.has_role(caller, Role::Governor) {
            return Err(VaultError::NotGovernor { caller: *caller });
        }
        if manager == ZERO_ADDRESS {
            return Err(VaultError::ZeroAddress);
        }
        self.vault_managers.insert(manager);
        Ok(())
    }

    /// Unregister a vault manager (governor only)
    pub fn remove_vault_manager(&mut self, caller: &Address, manager: &Address) -> VaultResult<()> {
        if !self.has_role(caller, Role::Governor) {
            return Err(VaultError::NotGovernor { caller: *caller });
        }
        if !self.vault_managers.remove(manager) {
            return Err(VaultError::NotVaultManager { manager: *manager });
        }
        Ok(())
    }

    /// All governors
    pub fn governors(&self) -> Vec<Address> {
        self.roles
            .iter()
            .filter(|(_, role)| *role == Role::Governor)
            .map(|(account, _)| *account)
            .collect()
    }
}

impl Treasury for TreasuryRoles {
    fn address(&self) -> Address {
        self.address
    }

    fn stablecoin(&self) -> Address {
        self.stablecoin
    }

    fn is_governor(&self, account: &Address) -> bool {
        self.has_role(account, Role::Governor)
    }

    fn is_governor_or_guardian(&self, account: &Address) -> bool {
        self.has_role(account, Role::Governor) || self.has_role(account, Role::Guardian)
    }

    fn is_vault_manager(&self, manager: &Address) -> bool {
        self.vault_managers.contains(manager)
    }

    fn add_minter(&self, ledger: &mut dyn AssetLedger, minter: &Address, now: u64) -> VaultResult<()> {
        ledger.register_minter(&self.stablecoin, &self.address, minter, now)
    }
}

// ============================================================================
// Tests
// ============================================================================
