//! Core Types for the vault-manager protocol
//!
//! Vault records, market parameters, typed batch actions and the value
//! objects returned by the read endpoints.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::defaults;
use crate::errors::{VaultError, VaultResult};
use crate::Vec;

/// Account, asset or engine identifier
pub type Address = [u8; 32];

/// Sequential vault identifier (ids start at 1, 0 means "last created" in batches)
pub type VaultId = u64;

/// The zero address
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Derive a deterministic address from a domain tag and a list of parts
pub fn derive_address(domain: &[u8], parts: &[&[u8]]) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut address = [0u8; 32];
    address.copy_from_slice(&result);
    address
}

// ============ Vault ============

/// A collateral/debt position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Vault {
    /// Collateral in the collateral's native precision
    pub collateral_amount: u128,
    /// Debt divided by the interest accumulator at borrowing time
    pub normalized_debt: u128,
}

impl Vault {
    /// Both balances are zero (fresh or fully liquidated vault)
    pub fn is_empty(&self) -> bool {
        self.collateral_amount == 0 && self.normalized_debt == 0
    }
}

// ============ Parameters ============

/// Risk parameters of one collateral market
///
/// Ratios are in `BASE_PARAMS`, the interest rate is per second in
/// `BASE_INTEREST`, amounts are in stablecoin precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultParameters {
    /// Maximum actual debt the engine may have outstanding
    pub debt_ceiling: u128,
    /// Maximum loan-to-value
    pub collateral_factor: u64,
    /// Health factor liquidations bring vaults back to
    pub target_health_factor: u64,
    /// Per-second interest rate
    pub interest_rate: u64,
    /// `1 - fee` taken by the protocol on liquidated amounts
    pub liquidation_surcharge: u64,
    /// Cap on the liquidation discount
    pub max_liquidation_discount: u64,
    /// Fee retained when borrowing
    pub borrow_fee: u64,
    /// Fee charged on top of repaid debt
    pub repay_fee: u64,
    /// Minimum non-zero vault debt
    pub dust: u128,
    /// Minimum debt a partial liquidation may leave
    pub dust_liquidation: u128,
    /// Minimum collateral value a partial liquidation may leave
    pub dust_collateral: u128,
    /// Vault creation restricted to whitelisted accounts
    pub whitelisting_activated: bool,
    /// Boost applied to liquidators when no boost source is configured
    pub base_boost: u64,
}

impl Default for VaultParameters {
    fn default() -> Self {
        Self {
            debt_ceiling: defaults::DEBT_CEILING,
            collateral_factor: defaults::COLLATERAL_FACTOR,
            target_health_factor: defaults::TARGET_HEALTH_FACTOR,
            interest_rate: defaults::INTEREST_RATE,
            liquidation_surcharge: defaults::LIQUIDATION_SURCHARGE,
            max_liquidation_discount: defaults::MAX_LIQUIDATION_DISCOUNT,
            borrow_fee: 0,
            repay_fee: 0,
            dust: defaults::DUST,
            dust_liquidation: defaults::DUST_LIQUIDATION,
            dust_collateral: defaults::DUST_COLLATERAL,
            whitelisting_activated: false,
            base_boost: defaults::BASE_BOOST,
        }
    }
}

/// Parameters settable through `set_uint64`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum ParameterType {
    CollateralFactor = 0,
    TargetHealthFactor = 1,
    BorrowFee = 2,
    RepayFee = 3,
    InterestRate = 4,
    LiquidationSurcharge = 5,
    MaxLiquidationDiscount = 6,
}

impl ParameterType {
    /// Short code used by `set_uint64`
    pub fn code(&self) -> &'static str {
        match self {
            Self::CollateralFactor => "CF",
            Self::TargetHealthFactor => "THF",
            Self::BorrowFee => "BF",
            Self::RepayFee => "RF",
            Self::InterestRate => "IR",
            Self::LiquidationSurcharge => "LS",
            Self::MaxLiquidationDiscount => "MLD",
        }
    }

    /// Parse a short code
    pub fn from_code(code: &str) -> VaultResult<Self> {
        match code {
            "CF" => Ok(Self::CollateralFactor),
            "THF" => Ok(Self::TargetHealthFactor),
            "BF" => Ok(Self::BorrowFee),
            "RF" => Ok(Self::RepayFee),
            "IR" => Ok(Self::InterestRate),
            "LS" => Ok(Self::LiquidationSurcharge),
            "MLD" => Ok(Self::MaxLiquidationDiscount),
            _ => Err(VaultError::InvalidParameterType),
        }
    }
}

// ============ Call Context ============

/// Who is calling and when
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Caller address
    pub caller: Address,
    /// Current timestamp (seconds)
    pub timestamp: u64,
}

impl CallContext {
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self { caller, timestamp }
    }
}

// ============ Batch Actions ============

/// Wire discriminant of a batched action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum ActionType {
    CreateVault = 0,
    CloseVault = 1,
    AddCollateral = 2,
    RemoveCollateral = 3,
    RepayDebt = 4,
    Borrow = 5,
    GetDebtIn = 6,
    Permit = 7,
}

/// Signed allowance forwarded to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PermitData {
    /// Asset the allowance is granted on
    pub asset: Address,
    pub owner: Address,
    pub spender: Address,
    pub value: u128,
    /// Last valid timestamp
    pub deadline: u64,
    pub signature: [u8; 32],
}

/// One instruction of an `angle` batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum Action {
    /// Mint a new vault owned by `to`
    CreateVault { to: Address },
    /// Repay all debt, release all collateral and burn the id
    CloseVault { vault_id: VaultId },
    AddCollateral { vault_id: VaultId, amount: u128 },
    RemoveCollateral { vault_id: VaultId, amount: u128 },
    RepayDebt { vault_id: VaultId, amount: u128 },
    Borrow { vault_id: VaultId, amount: u128 },
    /// Take `amount` of debt into `src_vault_id` out of `dst_vault_id` of `dst_manager`
    GetDebtIn {
        src_vault_id: VaultId,
        dst_manager: Address,
        dst_vault_id: VaultId,
        amount: u128,
    },
    Permit(PermitData),
}

impl Action {
    /// Wire discriminant
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::CreateVault { .. } => ActionType::CreateVault,
            Self::CloseVault { .. } => ActionType::CloseVault,
            Self::AddCollateral { .. } => ActionType::AddCollateral,
            Self::RemoveCollateral { .. } => ActionType::RemoveCollateral,
            Self::RepayDebt { .. } => ActionType::RepayDebt,
            Self::Borrow { .. } => ActionType::Borrow,
            Self::GetDebtIn { .. } => ActionType::GetDebtIn,
            Self::Permit(_) => ActionType::Permit,
        }
    }

    /// Encode the payload (without discriminant)
    pub fn encode_payload(&self) -> Vec<u8> {
        let encoded = match self {
            Self::CreateVault { to } => borsh::to_vec(to),
            Self::CloseVault { vault_id } => borsh::to_vec(vault_id),
            Self::AddCollateral { vault_id, amount }
            | Self::RemoveCollateral { vault_id, amount }
            | Self::RepayDebt { vault_id, amount }
            | Self::Borrow { vault_id, amount } => borsh::to_vec(&(*vault_id, *amount)),
            Self::GetDebtIn { src_vault_id, dst_manager, dst_vault_id, amount } => {
                borsh::to_vec(&(*src_vault_id, *dst_manager, *dst_vault_id, *amount))
            }
            Self::Permit(permit) => borsh::to_vec(permit),
        };
        encoded.unwrap_or_default()
    }

    /// Decode the payload of action number `index` of a batch
    pub fn decode(action_type: ActionType, payload: &[u8], index: usize) -> VaultResult<Self> {
        let invalid = |_: borsh::io::Error| VaultError::InvalidActionPayload { index };
        let action = match action_type {
            ActionType::CreateVault => Self::CreateVault {
                to: borsh::from_slice(payload).map_err(invalid)?,
            },
            ActionType::CloseVault => Self::CloseVault {
                vault_id: borsh::from_slice(payload).map_err(invalid)?,
            },
            ActionType::AddCollateral => {
                let (vault_id, amount) = borsh::from_slice(payload).map_err(invalid)?;
                Self::AddCollateral { vault_id, amount }
            }
            ActionType::RemoveCollateral => {
                let (vault_id, amount) = borsh::from_slice(payload).map_err(invalid)?;
                Self::RemoveCollateral { vault_id, amount }
            }
            ActionType::RepayDebt => {
                let (vault_id, amount) = borsh::from_slice(payload).map_err(invalid)?;
                Self::RepayDebt { vault_id, amount }
            }
            ActionType::Borrow => {
                let (vault_id, amount) = borsh::from_slice(payload).map_err(invalid)?;
                Self::Borrow { vault_id, amount }
            }
            ActionType::GetDebtIn => {
                let (src_vault_id, dst_manager, dst_vault_id, amount) =
                    borsh::from_slice(payload).map_err(invalid)?;
                Self::GetDebtIn { src_vault_id, dst_manager, dst_vault_id, amount }
            }
            ActionType::Permit => Self::Permit(borsh::from_slice(payload).map_err(invalid)?),
        };
        Ok(action)
    }
}

/// Decode parallel arrays of action types and payloads
pub fn decode_actions(action_types: &[ActionType], payloads: &[Vec<u8>]) -> VaultResult<Vec<Action>> {
    if action_types.len() != payloads.len() || action_types.is_empty() {
        return Err(VaultError::IncompatibleLengths {
            left: action_types.len(),
            right: payloads.len(),
        });
    }
    action_types
        .iter()
        .zip(payloads.iter())
        .enumerate()
        .map(|(index, (action_type, payload))| Action::decode(*action_type, payload, index))
        .collect()
}

/// Encode actions into parallel arrays of types and payloads
pub fn encode_actions(actions: &[Action]) -> (Vec<ActionType>, Vec<Vec<u8>>) {
    actions.iter().map(|a| (a.action_type(), a.encode_payload())).unzip()
}

/// Batched call to the action processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub actions: Vec<Action>,
    /// Account stablecoins are burnt from and collateral is pulled from
    pub from: Address,
    /// Account receiving minted stablecoins and released collateral
    pub to: Address,
    /// Data forwarded to the swapper, if one is supplied
    pub repay_data: Vec<u8>,
}

impl BatchRequest {
    pub fn new(actions: Vec<Action>, from: Address, to: Address) -> Self {
        Self { actions, from, to, repay_data: Vec::new() }
    }
}

/// Liquidation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationRequest {
    pub vault_ids: Vec<VaultId>,
    /// Stablecoin amounts to repay, one per vault
    pub amounts: Vec<u128>,
    /// Account stablecoins are burnt from
    pub from: Address,
    /// Account receiving the collateral
    pub to: Address,
    /// Data forwarded to the swapper, if one is supplied
    pub data: Vec<u8>,
}

// ============ Results ============

/// Net token flows of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentData {
    pub stablecoin_amount_to_give: u128,
    pub stablecoin_amount_to_receive: u128,
    pub collateral_amount_to_give: u128,
    pub collateral_amount_to_receive: u128,
}

/// Liquidation terms of one vault at the current price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOpportunity {
    /// Largest stablecoin amount the liquidator may repay
    pub max_stablecoin_amount_to_repay: u128,
    /// Collateral obtained for the maximum repay
    pub max_collateral_amount_given: u128,
    /// Dust boundary on the repay amount
    ///
    /// `0` means no constraint: any amount up to the max is accepted.
    /// Any other value `t` rejects amounts strictly between `t` and the max
    /// because they would leave dust; `1` therefore means only the full max
    /// is accepted. This is the inverse of reading `1` as "any amount".
    pub threshold_repay_amount: u128,
    /// `1 - discount` in `BASE_PARAMS`
    pub discount: u64,
    /// Current debt of the vault
    pub current_debt: u128,
}

/// Outcome of a liquidation call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidatorData {
    pub oracle_value: u128,
    pub new_interest_accumulator: u128,
    pub stablecoin_amount_to_receive: u128,
    pub collateral_amount_to_give: u128,
    pub bad_debt_from_liquidation: u128,
    /// Vaults actually liquidated
    pub liquidated: Vec<VaultId>,
    /// Vaults skipped with the reason
    pub skipped: Vec<(VaultId, VaultError)>,
}

/// Outcome of `accrue_interest_to_treasury`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreasuryAccrual {
    /// Stablecoins minted to the treasury
    pub surplus: u128,
    /// Bad debt the surplus could not cover
    pub bad_debt: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_payload_decoding() {
        let actions = vec![
            Action::CreateVault { to: [7u8; 32] },
            Action::AddCollateral { vault_id: 0, amount: 5 },
            Action::GetDebtIn { src_vault_id: 1, dst_manager: [9u8; 32], dst_vault_id: 2, amount: 3 },
        ];
        let (types, payloads) = encode_actions(&actions);
        assert_eq!(types[1], ActionType::AddCollateral);
        assert_eq!(decode_actions(&types, &payloads).unwrap(), actions);
    }

    #[test]
    fn test_decode_rejects_mismatched_lengths() {
        let result = decode_actions(&[ActionType::CreateVault], &[]);
        assert!(matches!(result, Err(VaultError::IncompatibleLengths { left: 1, right: 0 })));

        let result = decode_actions(&[], &[]);
        assert!(matches!(result, Err(VaultError::IncompatibleLengths { .. })));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let payloads = vec![vec![1u8, 2, 3]];
        let result = decode_actions(&[ActionType::Borrow], &payloads);
        assert!(matches!(result, Err(VaultError::InvalidActionPayload { index: 0 })));
    }

    #[test]
    fn test_parameter_codes() {
        for parameter in [
            ParameterType::CollateralFactor,
            ParameterType::TargetHealthFactor,
            ParameterType::BorrowFee,
            ParameterType::RepayFee,
            ParameterType::InterestRate,
            ParameterType::LiquidationSurcharge,
            ParameterType::MaxLiquidationDiscount,
        ] {
            assert_eq!(ParameterType::from_code(parameter.code()), Ok(parameter));
        }
        assert_eq!(ParameterType::from_code("XX"), Err(VaultError::InvalidParameterType));
    }

    #[test]
    fn test_derive_address_is_deterministic() {
        let a = derive_address(b"manager", &[&[1u8; 32], &7u64.to_le_bytes()]);
        let b = derive_address(b"manager", &[&[1u8; 32], &7u64.to_le_bytes()]);
        let c = derive_address(b"manager", &[&[1u8; 32], &8u64.to_le_bytes()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
