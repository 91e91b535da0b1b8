//! Spin Records
//!
//! One slot per player. A record is created by a spin, optionally revealed,
//! and retired by a claim; retired fields stay in place until the next spin
//! overwrites them.

use serde::{Deserialize, Serialize};

use crate::core::fhe::EncryptedInput;
use crate::core::handle::{Euint64, Euint8};

/// Bet as submitted by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BetInput {
    /// Client-encrypted bet (encrypted mode).
    Encrypted {
        /// Ciphertext and proof bound to the wheel and the player.
        input: EncryptedInput,
    },
    /// Public bet (reveal mode).
    Plain {
        /// Bet in token units.
        amount: u64,
    },
}

/// Bet as recorded, after clamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BetAmount {
    /// Clamped encrypted bet.
    Encrypted {
        /// Handle granted to the wheel and the player.
        handle: Euint64,
    },
    /// Clamped plaintext bet.
    Plain {
        /// Token units.
        amount: u64,
    },
}

/// Where a player's wager stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinPhase {
    /// No outstanding wager.
    Idle,
    /// Spun, awaiting claim (or reveal).
    Pending,
    /// Segment revealed, awaiting claim.
    Revealed,
}

/// Per-player wager state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinRecord {
    /// Clamped bet.
    pub bet: BetAmount,
    /// What the ledger actually moved from the player to the house.
    pub transferred: Euint64,
    /// Encrypted segment index 0..7.
    pub segment: Euint8,
    /// Encrypted winnings (encrypted mode only).
    pub winnings: Option<Euint64>,
    /// Self-reported segment (reveal mode).
    pub revealed_segment: Option<u8>,
    /// Outstanding wager flag.
    pub pending: bool,
    /// Block time of the spin.
    pub created_at: u64,
}

impl SpinRecord {
    /// Current phase.
    pub fn phase(&self) -> SpinPhase {
        match (self.pending, self.revealed_segment) {
            (false, _) => SpinPhase::Idle,
            (true, None) => SpinPhase::Pending,
            (true, Some(_)) => SpinPhase::Revealed,
        }
    }

    /// Whether a reveal has been recorded.
    pub fn is_revealed(&self) -> bool {
        self.revealed_segment.is_some()
    }

    /// Read-only view handed to callers.
    pub fn view(&self) -> SpinResult {
        SpinResult {
            phase: self.phase(),
            bet: self.bet,
            segment: self.segment,
            winnings: self.winnings,
            revealed_segment: self.revealed_segment,
            created_at: self.created_at,
        }
    }
}

/// Caller-facing view of a spin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinResult {
    /// Phase at query time.
    pub phase: SpinPhase,
    /// Clamped bet.
    pub bet: BetAmount,
    /// Segment handle (decryptable by the player).
    pub segment: Euint8,
    /// Winnings handle (encrypted mode).
    pub winnings: Option<Euint64>,
    /// Revealed segment (reveal mode).
    pub revealed_segment: Option<u8>,
    /// Block time of the spin.
    pub created_at: u64,
}

impl SpinResult {
    /// Whether the wager is still outstanding.
    pub fn has_pending_spin(&self) -> bool {
        self.phase != SpinPhase::Idle
    }
}
