//! Protocol Events
//!
//! Events are emitted during execution and can be indexed off-chain for
//! building UIs, analytics, and notifications. Every engine owns an
//! `EventLog`; a rejected call truncates the log back to its length at
//! call entry, so only events of accepted calls remain.

use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use crate::types::{Address, ParameterType, VaultId};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Vault Registry Events (0x01 - 0x0F)
    Transfer = 0x01,
    Approval = 0x02,
    ApprovalForAll = 0x03,
    WhitelistToggled = 0x04,

    // Vault Accounting Events (0x10 - 0x2F)
    CollateralAmountUpdated = 0x10,
    InternalDebtUpdated = 0x11,
    DebtTransferred = 0x12,
    InterestAccumulatorUpdated = 0x13,
    VaultLiquidated = 0x14,
    AccruedToTreasury = 0x15,

    // Parameter Events (0x30 - 0x4F)
    ParameterUpdated = 0x30,
    DebtCeilingUpdated = 0x31,
    DustUpdated = 0x32,
    LiquidationBoostParametersUpdated = 0x33,
    PauseToggled = 0x34,
    OracleUpdated = 0x35,
    TreasuryUpdated = 0x36,

    // Token Events (0x50 - 0x5F)
    TokenTransfer = 0x50,
    TokenMint = 0x51,
    TokenBurn = 0x52,
    TokenApproval = 0x53,
    MinterRegistered = 0x54,

    // Oracle Events (0x60 - 0x6F)
    PriceUpdated = 0x60,
    OracleOperatorChanged = 0x61,
}

/// Main event enum containing all possible protocol events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum VaultEvent {
    // ============ Vault Registry Events ============

    /// Vault ownership moved (`from` zero on creation, `to` zero on close)
    Transfer {
        from: Address,
        to: Address,
        vault_id: VaultId,
        timestamp: u64,
    },

    /// Single-vault approval set or cleared
    Approval {
        owner: Address,
        approved: Address,
        vault_id: VaultId,
        timestamp: u64,
    },

    /// Operator approval toggled
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
        timestamp: u64,
    },

    /// Whitelist entry toggled (the zero address toggles the whitelist itself)
    WhitelistToggled {
        account: Address,
        whitelisted: bool,
        timestamp: u64,
    },

    // ============ Vault Accounting Events ============

    /// Vault collateral changed by `amount`
    CollateralAmountUpdated {
        vault_id: VaultId,
        amount: u128,
        increase: bool,
        timestamp: u64,
    },

    /// Vault normalized debt changed by `internal_amount`
    InternalDebtUpdated {
        vault_id: VaultId,
        internal_amount: u128,
        increase: bool,
        timestamp: u64,
    },

    /// Debt moved into a vault of this engine out of another vault
    ///
    /// `amount` is the debt taken on by `src_vault_id`; it is below
    /// `requested_amount` when the giving vault owed less.
    DebtTransferred {
        src_vault_id: VaultId,
        dst_vault_id: VaultId,
        dst_manager: Address,
        requested_amount: u128,
        amount: u128,
        timestamp: u64,
    },

    /// Interest accumulator refreshed
    InterestAccumulatorUpdated {
        value: u128,
        timestamp: u64,
    },

    /// One vault of a liquidation call processed
    VaultLiquidated {
        vault_id: VaultId,
        liquidator: Address,
        amount_repaid: u128,
        collateral_released: u128,
        bad_debt: u128,
        timestamp: u64,
    },

    /// Surplus and bad debt settled with the treasury
    AccruedToTreasury {
        surplus: u128,
        bad_debt: u128,
        timestamp: u64,
    },

    // ============ Parameter Events ============

    ParameterUpdated {
        parameter: ParameterType,
        value: u64,
        timestamp: u64,
    },

    DebtCeilingUpdated {
        debt_ceiling: u128,
        timestamp: u64,
    },

    DustUpdated {
        dust: u128,
        dust_liquidation: u128,
        dust_collateral: u128,
        timestamp: u64,
    },

    LiquidationBoostParametersUpdated {
        boost_source_set: bool,
        x_boost: Vec<u128>,
        y_boost: Vec<u64>,
        timestamp: u64,
    },

    PauseToggled {
        paused: bool,
        timestamp: u64,
    },

    OracleUpdated {
        timestamp: u64,
    },

    TreasuryUpdated {
        treasury: Address,
        timestamp: u64,
    },

    // ============ Token Events ============

    TokenTransfer {
        asset: Address,
        from: Address,
        to: Address,
        amount: u128,
        timestamp: u64,
    },

    TokenMint {
        asset: Address,
        to: Address,
        amount: u128,
        timestamp: u64,
    },

    TokenBurn {
        asset: Address,
        from: Address,
        amount: u128,
        timestamp: u64,
    },

    TokenApproval {
        asset: Address,
        owner: Address,
        spender: Address,
        amount: u128,
        timestamp: u64,
    },

    MinterRegistered {
        asset: Address,
        minter: Address,
        timestamp: u64,
    },

    // ============ Oracle Events ============

    PriceUpdated {
        old_price: u128,
        new_price: u128,
        timestamp: u64,
    },

    OracleOperatorChanged {
        old_operator: Address,
        new_operator: Address,
        timestamp: u64,
    },
}

impl VaultEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Transfer { .. } => EventType::Transfer,
            Self::Approval { .. } => EventType::Approval,
            Self::ApprovalForAll { .. } => EventType::ApprovalForAll,
            Self::WhitelistToggled { .. } => EventType::WhitelistToggled,
            Self::CollateralAmountUpdated { .. } => EventType::CollateralAmountUpdated,
            Self::InternalDebtUpdated { .. } => EventType::InternalDebtUpdated,
            Self::DebtTransferred { .. } => EventType::DebtTransferred,
            Self::InterestAccumulatorUpdated { .. } => EventType::InterestAccumulatorUpdated,
            Self::VaultLiquidated { .. } => EventType::VaultLiquidated,
            Self::AccruedToTreasury { .. } => EventType::AccruedToTreasury,
            Self::ParameterUpdated { .. } => EventType::ParameterUpdated,
            Self::DebtCeilingUpdated { .. } => EventType::DebtCeilingUpdated,
            Self::DustUpdated { .. } => EventType::DustUpdated,
            Self::LiquidationBoostParametersUpdated { .. } => EventType::LiquidationBoostParametersUpdated,
            Self::PauseToggled { .. } => EventType::PauseToggled,
            Self::OracleUpdated { .. } => EventType::OracleUpdated,
            Self::TreasuryUpdated { .. } => EventType::TreasuryUpdated,
            Self::TokenTransfer { .. } => EventType::TokenTransfer,
            Self::TokenMint { .. } => EventType::TokenMint,
            Self::TokenBurn { .. } => EventType::TokenBurn,
            Self::TokenApproval { .. } => EventType::TokenApproval,
            Self::MinterRegistered { .. } => EventType::MinterRegistered,
            Self::PriceUpdated { .. } => EventType::PriceUpdated,
            Self::OracleOperatorChanged { .. } => EventType::OracleOperatorChanged,
        }
    }

    /// Get the timestamp when the event occurred
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Transfer { timestamp, .. }
            | Self::Approval { timestamp, .. }
            | Self::ApprovalForAll { timestamp, .. }
            | Self::WhitelistToggled { timestamp, .. }
            | Self::CollateralAmountUpdated { timestamp, .. }
            | Self::InternalDebtUpdated { timestamp, .. }
            | Self::DebtTransferred { timestamp, .. }
            | Self::InterestAccumulatorUpdated { timestamp, .. }
            | Self::VaultLiquidated { timestamp, .. }
            | Self::AccruedToTreasury { timestamp, .. }
            | Self::ParameterUpdated { timestamp, .. }
            | Self::DebtCeilingUpdated { timestamp, .. }
            | Self::DustUpdated { timestamp, .. }
            | Self::LiquidationBoostParametersUpdated { timestamp, .. }
            | Self::PauseToggled { timestamp, .. }
            | Self::OracleUpdated { timestamp }
            | Self::TreasuryUpdated { timestamp, .. }
            | Self::TokenTransfer { timestamp, .. }
            | Self::TokenMint { timestamp, .. }
            | Self::TokenBurn { timestamp, .. }
            | Self::TokenApproval { timestamp, .. }
            | Self::MinterRegistered { timestamp, .. }
            | Self::PriceUpdated { timestamp, .. }
            | Self::OracleOperatorChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting multiple events during execution
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<VaultEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: VaultEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Take ownership of all events
    pub fn into_events(self) -> Vec<VaultEvent> {
        self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&VaultEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop every event emitted after the first `len`
    pub fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let event = VaultEvent::Transfer {
            from: [0u8; 32],
            to: [2u8; 32],
            vault_id: 1,
            timestamp: 100,
        };

        assert_eq!(event.event_type(), EventType::Transfer);
        assert_eq!(event.timestamp(), 100);
    }

    #[test]
    fn test_event_serialization() {
        let event = VaultEvent::LiquidationBoostParametersUpdated {
            boost_source_set: true,
            x_boost: vec![0, 1_000],
            y_boost: vec![1_500_000_000, 2_500_000_000],
            timestamp: 200,
        };

        let bytes = event.to_bytes();
        let restored = VaultEvent::from_bytes(&bytes).unwrap();

        assert_eq!(event, restored);
    }

    #[test]
    fn test_event_log_truncate() {
        let mut log = EventLog::new();

        log.emit(VaultEvent::PauseToggled { paused: false, timestamp: 1 });
        let checkpoint = log.len();
        log.emit(VaultEvent::InternalDebtUpdated {
            vault_id: 1,
            internal_amount: 10,
            increase: true,
            timestamp: 2,
        });
        log.emit(VaultEvent::CollateralAmountUpdated {
            vault_id: 1,
            amount: 10,
            increase: true,
            timestamp: 2,
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.filter_by_type(EventType::InternalDebtUpdated).len(), 1);

        log.truncate(checkpoint);
        assert_eq!(log.len(), 1);
        assert!(log.filter_by_type(EventType::InternalDebtUpdated).is_empty());
    }
}
