//! Wheel Game Module
//!
//! Outcome derivation and the per-player wager state machine.
//!
//! ## Module Structure
//!
//! - `prize`: Segment thresholds and payout multipliers
//! - `outcome`: Oblivious segment, winnings and bet clamping
//! - `spin`: Spin records and caller-facing views
//! - `wheel`: Spin / reveal / claim operations and the admin surface

pub mod outcome;
pub mod prize;
pub mod spin;
pub mod wheel;

// Re-export key types
pub use outcome::{calculate_winnings, clamp_bet, clamp_plain_bet, derive_segment};
pub use prize::{PrizeTable, MULTIPLIER_DENOMINATOR, SEGMENT_COUNT};
pub use spin::{BetAmount, BetInput, SpinPhase, SpinRecord, SpinResult};
pub use wheel::{WheelConfig, WheelError, WheelGame, WheelMode};
