//! Protocol Constants
//!
//! Fixed-point bases, batch limits and the default risk parameters of a
//! vault-manager market.
//!
//! All ratios (collateral factor, fees, surcharge, discounts, boosts) are
//! expressed in `BASE_PARAMS` (1e9). The interest accumulator and the
//! per-second interest rate use `BASE_INTEREST` (1e27). Stablecoin amounts
//! and oracle prices carry 18 decimals.

/// Fixed-point bases
pub mod base {
    /// Base for collateral factor, fees, surcharge, discounts and boosts
    pub const BASE_PARAMS: u128 = 1_000_000_000;

    /// Base for the interest accumulator and the per-second interest rate
    pub const BASE_INTEREST: u128 = 1_000_000_000_000_000_000_000_000_000;

    /// Base of the stablecoin and of oracle prices (18 decimals)
    pub const BASE_TOKENS: u128 = 1_000_000_000_000_000_000;

    /// Largest supported collateral precision (10^27 still fits every product in U256)
    pub const MAX_COLLATERAL_DECIMALS: u8 = 27;
}

/// Stablecoin metadata
pub mod stablecoin {
    /// Decimal places of the pegged asset
    pub const DECIMALS: u8 = 18;
    /// One unit with decimals
    pub const ONE: u128 = 1_000_000_000_000_000_000;
}

/// Operation Limits
pub mod limits {
    /// Maximum actions in one `angle` batch
    pub const MAX_BATCH_ACTIONS: usize = 64;

    /// Maximum vaults in one liquidation call
    pub const MAX_LIQUIDATION_BATCH: usize = 50;

    /// Maximum points on a liquidation boost curve
    pub const MAX_BOOST_POINTS: usize = 16;
}

/// Oracle Configuration
pub mod oracle {
    /// Maximum age of a price before it is considered stale (seconds)
    pub const MAX_PRICE_AGE_SECONDS: u64 = 3_600;

    /// Maximum price change per update (basis points, 5000 = 50%)
    pub const MAX_PRICE_DEVIATION_BPS: u64 = 5_000;

    /// Basis points denominator
    pub const BPS_DENOMINATOR: u64 = 10_000;
}

/// Default market parameters
///
/// Values used by `VaultParameters::default()`; every field can be changed
/// afterwards through the parameter setters.
pub mod defaults {
    /// 1e9 * 0.8
    pub const COLLATERAL_FACTOR: u64 = 800_000_000;
    /// 1e9 * 1.1
    pub const TARGET_HEALTH_FACTOR: u64 = 1_100_000_000;
    /// 1e9 * 0.9 (10% of liquidated amounts go to the protocol)
    pub const LIQUIDATION_SURCHARGE: u64 = 900_000_000;
    /// 1e9 * 0.1
    pub const MAX_LIQUIDATION_DISCOUNT: u64 = 100_000_000;
    /// ~0.5% per year, scaled by 1e27 per second
    pub const INTEREST_RATE: u64 = 158_153_934_393_112_649;
    /// 1e9 * 1.5
    pub const BASE_BOOST: u64 = 1_500_000_000;
    /// 10M stablecoins
    pub const DEBT_CEILING: u128 = 10_000_000 * super::stablecoin::ONE;
    /// 1 stablecoin
    pub const DUST: u128 = super::stablecoin::ONE;
    /// 1 stablecoin
    pub const DUST_LIQUIDATION: u128 = super::stablecoin::ONE;
    /// 0.1 stablecoin worth of collateral
    pub const DUST_COLLATERAL: u128 = super::stablecoin::ONE / 10;
}

// Re-export commonly used constants at the crate root
pub use base::{BASE_INTEREST, BASE_PARAMS, BASE_TOKENS};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_form_valid_set() {
        assert!(defaults::COLLATERAL_FACTOR <= defaults::LIQUIDATION_SURCHARGE);
        assert!(defaults::TARGET_HEALTH_FACTOR as u128 >= BASE_PARAMS);
        assert!((defaults::MAX_LIQUIDATION_DISCOUNT as u128) < BASE_PARAMS);
        assert!(defaults::DUST <= defaults::DUST_LIQUIDATION);
    }

    #[test]
    fn test_bases() {
        assert_eq!(BASE_INTEREST, BASE_PARAMS * BASE_TOKENS);
        assert_eq!(stablecoin::ONE, BASE_TOKENS);
        assert_eq!(10u128.pow(stablecoin::DECIMALS as u32), BASE_TOKENS);
    }
}
