//! Error Types for the vault-manager protocol
//!
//! Every failure of an entry point surfaces as one `VaultError`. Variants
//! carry the context needed to understand the rejection, `code()` gives a
//! stable identifier for logs, and `category()` maps each variant onto the
//! protocol's error taxonomy.

use crate::types::{Address, VaultId};

/// Result type alias for vault-manager operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Main error enum for all protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    // ============ Access-Control Errors ============
    /// Caller is not a governor of the treasury
    NotGovernor { caller: Address },

    /// Caller is neither governor nor guardian
    NotGovernorOrGuardian { caller: Address },

    /// Caller is neither owner nor approved for the vault
    NotApprovedOrOwner { vault_id: VaultId, caller: Address },

    /// Caller is not the treasury
    NotTreasury { caller: Address },

    /// Address is not a vault manager registered with the treasury
    NotVaultManager { manager: Address },

    /// Whitelisting is active and the account is not whitelisted
    NotWhitelisted { account: Address },

    /// Caller is not the expected operator
    Unauthorized { expected: Address, actual: Address },

    /// Caller may not mint or burn the asset
    MintUnauthorized { asset: Address, caller: Address },

    // ============ Parameter-Validation Errors ============
    /// Parameter value above its bound
    TooHighParameterValue { parameter: &'static str, value: u128 },

    /// Parameter value below its bound
    TooSmallParameterValue { parameter: &'static str, value: u128 },

    /// Parameter value inconsistent with the other parameters
    InvalidParameterValue { parameter: &'static str },

    /// Unknown parameter code
    InvalidParameterType,

    /// Set of parameters is inconsistent as a whole
    InvalidSetOfParameters { reason: &'static str },

    // ============ Solvency and Dust Errors ============
    /// Operation would leave a non-zero debt below the dust threshold
    DustyLeftoverAmount { vault_id: VaultId },

    /// Total engine debt would exceed the debt ceiling
    DebtCeilingExceeded { total_debt: u128, debt_ceiling: u128 },

    /// A vault touched by the batch is below the required health factor
    InsolventAfterAction { vault_id: VaultId, health_factor: u128 },

    /// Vault is liquidatable and cannot be closed
    InsolventVault { vault_id: VaultId },

    /// Vault is healthy and cannot be liquidated
    HealthyVault { vault_id: VaultId, health_factor: u128 },

    /// Liquidation amount above the maximum repayable amount
    TooHighAmount { requested: u128, maximum: u128 },

    /// No vault of a liquidation batch could be liquidated
    NoLiquidatableVaults,

    // ============ Arithmetic and Precondition Errors ============
    /// Invalid amount provided
    InvalidAmount { amount: u128, reason: AmountErrorReason },

    /// Insufficient balance for operation
    InsufficientBalance { available: u128, requested: u128 },

    /// Insufficient allowance for operation
    InsufficientAllowance { available: u128, requested: u128 },

    /// The zero address cannot be used here
    ZeroAddress,

    /// Vault id was never minted or has been closed
    NonexistentVault { vault_id: VaultId },

    /// Parallel arrays have different lengths or are empty
    IncompatibleLengths { left: usize, right: usize },

    /// Batch holds more entries than allowed
    BatchTooLarge { size: usize, maximum: usize },

    /// Action payload could not be decoded
    InvalidActionPayload { index: usize },

    /// Approval target is the vault owner
    ApprovalToOwner,

    /// Operator approval target is the caller
    ApprovalToCaller,

    /// Engine is paused
    PausedCollateral,

    /// Permit deadline has passed
    ExpiredPermit { deadline: u64, now: u64 },

    /// Permit signature does not match
    InvalidSignature,

    /// Asset is unknown to the ledger
    UnknownAsset { asset: Address },

    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ External Collaborator Errors ============
    /// Oracle price is stale
    OracleStale {
        last_update: u64,
        now: u64,
        max_age: u64,
    },

    /// Oracle price deviation too large
    OraclePriceDeviation {
        old_price: u128,
        new_price: u128,
        max_deviation_bps: u64,
    },

    /// Oracle has no usable price
    OracleUnavailable,
}

/// Reasons for amount-related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountErrorReason {
    /// Amount is zero when non-zero required
    Zero,
}

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller lacks the role or the vault approval
    AccessControl,
    /// Administrative call with out-of-bounds values
    ParameterValidation,
    /// Action or batch breaks a solvency, dust or ceiling rule
    SolvencyOrDust,
    /// Bad input or arithmetic failure
    ArithmeticOrPrecondition,
    /// Oracle failure
    External,
}

impl VaultError {
    /// Returns a human-readable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotGovernor { .. } => "E001_NOT_GOVERNOR",
            Self::NotGovernorOrGuardian { .. } => "E002_NOT_GOVERNOR_OR_GUARDIAN",
            Self::NotApprovedOrOwner { .. } => "E003_NOT_APPROVED_OR_OWNER",
            Self::NotTreasury { .. } => "E004_NOT_TREASURY",
            Self::NotVaultManager { .. } => "E005_NOT_VAULT_MANAGER",
            Self::NotWhitelisted { .. } => "E006_NOT_WHITELISTED",
            Self::Unauthorized { .. } => "E007_UNAUTHORIZED",
            Self::MintUnauthorized { .. } => "E008_MINT_UNAUTH",
            Self::TooHighParameterValue { .. } => "E010_TOO_HIGH_PARAM",
            Self::TooSmallParameterValue { .. } => "E011_TOO_SMALL_PARAM",
            Self::InvalidParameterValue { .. } => "E012_INVALID_PARAM_VALUE",
            Self::InvalidParameterType => "E013_INVALID_PARAM_TYPE",
            Self::InvalidSetOfParameters { .. } => "E014_INVALID_PARAM_SET",
            Self::DustyLeftoverAmount { .. } => "E020_DUSTY_LEFTOVER",
            Self::DebtCeilingExceeded { .. } => "E021_DEBT_CEILING",
            Self::InsolventAfterAction { .. } => "E022_INSOLVENT_AFTER_ACTION",
            Self::InsolventVault { .. } => "E023_INSOLVENT_VAULT",
            Self::HealthyVault { .. } => "E024_HEALTHY_VAULT",
            Self::TooHighAmount { .. } => "E025_TOO_HIGH_AMOUNT",
            Self::NoLiquidatableVaults => "E026_NO_LIQ_VAULTS",
            Self::InvalidAmount { .. } => "E030_INVALID_AMOUNT",
            Self::InsufficientBalance { .. } => "E031_INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "E032_INSUFFICIENT_ALLOWANCE",
            Self::ZeroAddress => "E033_ZERO_ADDRESS",
            Self::NonexistentVault { .. } => "E034_NONEXISTENT_VAULT",
            Self::IncompatibleLengths { .. } => "E035_INCOMPATIBLE_LENGTHS",
            Self::BatchTooLarge { .. } => "E036_BATCH_TOO_LARGE",
            Self::InvalidActionPayload { .. } => "E037_INVALID_PAYLOAD",
            Self::ApprovalToOwner => "E038_APPROVAL_TO_OWNER",
            Self::ApprovalToCaller => "E039_APPROVAL_TO_CALLER",
            Self::PausedCollateral => "E040_PAUSED",
            Self::ExpiredPermit { .. } => "E041_EXPIRED_PERMIT",
            Self::InvalidSignature => "E042_INVALID_SIGNATURE",
            Self::UnknownAsset { .. } => "E043_UNKNOWN_ASSET",
            Self::Overflow => "E050_OVERFLOW",
            Self::Underflow => "E051_UNDERFLOW",
            Self::DivisionByZero => "E052_DIV_ZERO",
            Self::OracleStale { .. } => "E060_ORACLE_STALE",
            Self::OraclePriceDeviation { .. } => "E061_ORACLE_DEVIATION",
            Self::OracleUnavailable => "E062_ORACLE_UNAVAILABLE",
        }
    }

    /// Position of the error in the protocol's error taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotGovernor { .. }
            | Self::NotGovernorOrGuardian { .. }
            | Self::NotApprovedOrOwner { .. }
            | Self::NotTreasury { .. }
            | Self::NotVaultManager { .. }
            | Self::NotWhitelisted { .. }
            | Self::Unauthorized { .. }
            | Self::MintUnauthorized { .. }
            | Self::ApprovalToOwner
            | Self::ApprovalToCaller => ErrorCategory::AccessControl,

            Self::TooHighParameterValue { .. }
            | Self::TooSmallParameterValue { .. }
            | Self::InvalidParameterValue { .. }
            | Self::InvalidParameterType
            | Self::InvalidSetOfParameters { .. } => ErrorCategory::ParameterValidation,

            Self::DustyLeftoverAmount { .. }
            | Self::DebtCeilingExceeded { .. }
            | Self::InsolventAfterAction { .. }
            | Self::InsolventVault { .. }
            | Self::HealthyVault { .. }
            | Self::TooHighAmount { .. }
            | Self::NoLiquidatableVaults => ErrorCategory::SolvencyOrDust,

            Self::OracleStale { .. }
            | Self::OraclePriceDeviation { .. }
            | Self::OracleUnavailable => ErrorCategory::External,

            _ => ErrorCategory::ArithmeticOrPrecondition,
        }
    }

    /// Returns true if this error is recoverable (user can fix it)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InsolventAfterAction { .. } => true, // Add more collateral
            Self::InsufficientBalance { .. } => true,  // Get more funds
            Self::InsufficientAllowance { .. } => true,
            Self::DustyLeftoverAmount { .. } => true, // Repay all or less
            Self::TooHighAmount { .. } => true,
            Self::OracleStale { .. } => true, // Wait for update
            Self::PausedCollateral => true,
            _ => false,
        }
    }
}
