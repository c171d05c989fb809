//! Asset Ledger and Swapper Interfaces
//!
//! The engine moves stablecoins and collateral through an `AssetLedger`:
//! mint and burn for the stablecoin it is a registered minter of, plain
//! and delegated transfers for collateral, and signed permits. Optional
//! swappers are called back during settlement so that a batch can repay
//! debt with collateral it releases (or lever up with stablecoins it mints).
//!
//! Permit signatures are keyed SHA-256 digests: the owner's signing key is
//! registered with the ledger and the signature is `H(key || digest)`.

use sha2::{Digest, Sha256};

use crate::errors::VaultResult;
use crate::types::{Address, PermitData};

/// Domain tag of permit digests
pub const PERMIT_DOMAIN: &[u8] = b"vaultkit.permit.v1";

/// Token bookkeeping the engine settles against
pub trait AssetLedger {
    /// Balance of `account` in `asset`
    fn balance_of(&self, asset: &Address, account: &Address) -> u128;

    /// Amount `spender` may move out of `owner`'s balance
    fn allowance(&self, asset: &Address, owner: &Address, spender: &Address) -> u128;

    /// Move `amount` owned by `from`
    fn transfer(&mut self, asset: &Address, from: &Address, to: &Address, amount: u128, now: u64) -> VaultResult<()>;

    /// Move `amount` out of `from` on behalf of `spender`
    ///
    /// Consumes allowance unless `spender == from`.
    fn transfer_from(
        &mut self,
        asset: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
        now: u64,
    ) -> VaultResult<()>;

    /// Create `amount` for `to`; `minter` must be registered for `asset`
    fn mint(&mut self, asset: &Address, minter: &Address, to: &Address, amount: u128, now: u64) -> VaultResult<()>;

    /// Destroy `amount` held by `from`; `minter` must be registered for `asset`
    ///
    /// Consumes `from`'s allowance to `sender` unless `sender == from`.
    fn burn_from(
        &mut self,
        asset: &Address,
        minter: &Address,
        from: &Address,
        sender: &Address,
        amount: u128,
        now: u64,
    ) -> VaultResult<()>;

    /// Authorize `minter` on `asset`; `controller` must control the asset
    fn register_minter(&mut self, asset: &Address, controller: &Address, minter: &Address, now: u64) -> VaultResult<()>;

    /// Apply a signed allowance
    ///
    /// # Errors
    /// `ExpiredPermit` after the deadline, `InvalidSignature` when the
    /// signature does not match the owner's key and current nonce.
    fn permit(&mut self, permit: &PermitData, now: u64) -> VaultResult<()>;
}

/// Callback request handed to a swapper during settlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest<'a> {
    /// Caller of the engine entry point
    pub initiator: Address,
    /// Token the recipient was just given by the engine
    pub in_token: Address,
    /// Token the engine is about to pull
    pub out_token: Address,
    /// Account that must hold `out_token_owed` when the swap returns
    pub out_token_recipient: Address,
    pub out_token_owed: u128,
    pub in_token_obtained: u128,
    pub data: &'a [u8],
    pub timestamp: u64,
}

/// Settlement callback
pub trait Swapper {
    /// Convert what the batch released into what it still owes
    fn swap(&mut self, ledger: &mut dyn AssetLedger, request: &SwapRequest<'_>) -> VaultResult<()>;
}

/// Digest a permit signature commits to
pub fn permit_digest(
    asset: &Address,
    owner: &Address,
    spender: &Address,
    value: u128,
    nonce: u64,
    deadline: u64,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(PERMIT_DOMAIN);
    hasher.update(asset);
    hasher.update(owner);
    hasher.update(spender);
    hasher.update(value.to_le_bytes());
    hasher.update(nonce.to_le_bytes());
    hasher.update(deadline.to_le_bytes());
    hasher.finalize().into()
}

/// Sign a permit digest with an owner's key
pub fn sign_permit(signing_key: &[u8; 32], digest: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(signing_key);
    hasher.update(digest);
    hasher.finalize().into()
}
