//! vaultkit Common Library
//!
//! Shared types, constants, and utilities for the vaultkit contracts:
//! a collateralized-debt protocol where each collateral market is run by
//! its own vault manager.
//!
//! ## Contents
//!
//! - **Constants**: fixed-point bases, batch limits, default parameters
//! - **Errors**: one error enum with stable codes and a category per variant
//! - **Types**: vaults, market parameters, typed batch actions, results
//! - **Math**: U256-backed fixed-point helpers, interest compounding, health factor
//! - **Events**: typed protocol events and the per-engine event log
//! - **Boost**: piecewise-linear liquidation boost curve
//! - **Oracle / Treasury / Ledger**: the collaborator interfaces an engine
//!   consumes, with a role registry implementing the treasury
//!
//! This crate is `no_std` compatible when built without the `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export collections for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};
#[cfg(feature = "std")]
pub use std::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod boost;
pub mod oracle;
pub mod ledger;
pub mod access_control;

// Re-exports for convenience
pub use constants::{BASE_INTEREST, BASE_PARAMS, BASE_TOKENS};
pub use errors::*;
pub use types::*;
pub use events::*;
pub use boost::{BoostCurve, BoostSource};
pub use oracle::{Oracle, PriceData};
pub use ledger::{AssetLedger, SwapRequest, Swapper};
pub use access_control::{Role, Treasury, TreasuryRoles};
