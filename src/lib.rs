//! # Cipher Wheel
//!
//! Confidential token ledger and prize wheel whose outcomes are computed
//! obliviously over ciphertext handles.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CIPHER WHEEL                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Confidential primitives                   │
//! │  ├── address.rs  - 20-byte account / contract identities     │
//! │  ├── handle.rs   - Typed ciphertext handles                  │
//! │  ├── fhe.rs      - Oblivious operation set (FheBackend)      │
//! │  ├── acl.rs      - Per-handle allow-lists                    │
//! │  ├── clear.rs    - Reference backend (plaintext store)       │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  ledger/         - Encrypted balances, operators, treasury   │
//! │  game/           - Segment derivation, winnings, spins       │
//! │                                                              │
//! │  host/           - Execution environment                     │
//! │  ├── context.rs  - Caller, block time, attached value        │
//! │  ├── events.rs   - Observable events                         │
//! │  ├── journal.rs  - Hash-chained transaction log              │
//! │  └── runtime.rs  - Atomic, serialized transactions           │
//! │                                                              │
//! │  network/        - WebSocket server (non-deterministic)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Confidentiality Guarantee
//!
//! Contract code never branches on a secret:
//! - Every data-dependent choice is an oblivious `select`
//! - An insufficient balance moves zero instead of aborting
//! - Every stored handle is granted to the accounts that must read it
//!
//! Given the same seed and transactions, the reference backend reproduces
//! the same handles, outcomes and state hashes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod host;
pub mod ledger;
pub mod network;

// Re-export commonly used types
pub use crate::core::{Address, ClearBackend, EncryptedInput, Euint64, Euint8, FheBackend, Handle};
pub use crate::game::{PrizeTable, WheelGame, WheelMode};
pub use crate::host::{Runtime, RuntimeConfig, Transaction};
pub use crate::ledger::{ConfidentialLedger, ShortfallPolicy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
