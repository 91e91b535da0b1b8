//! Ledger Configuration

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wei in one ether.
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// What a transfer moves when the sender's balance is too small.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Move nothing.
    #[default]
    TransferZero,
    /// Move the whole available balance.
    ClampToBalance,
}

impl FromStr for ShortfallPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero" | "transfer_zero" => Ok(Self::TransferZero),
            "clamp" | "clamp_to_balance" => Ok(Self::ClampToBalance),
            other => Err(format!("unknown shortfall policy: {}", other)),
        }
    }
}

/// Ledger parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Token units minted per whole ether paid.
    pub units_per_eth: u64,
    /// Smallest accepted purchase, in wei.
    #[serde(with = "crate::host::u128_str")]
    pub min_purchase_wei: u128,
    /// Transfer shortfall semantics.
    pub shortfall: ShortfallPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            // 1000 tokens at 6 decimals
            units_per_eth: 1_000_000_000,
            // One token unit
            min_purchase_wei: 1_000_000_000,
            shortfall: ShortfallPolicy::TransferZero,
        }
    }
}
