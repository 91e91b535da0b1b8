//! Confidential Ledger
//!
//! Encrypted balances and total supply, operator delegation, and the native
//! value treasury fed by token purchases.
//!
//! ## Failure model
//!
//! - Authorization and structural problems abort the call with a
//!   [`LedgerError`]; the runtime discards every effect of the transaction.
//! - Insufficient balance never aborts. The oblivious select turns it into a
//!   zero (or clamped) movement, so success/failure leaks nothing.

pub mod config;
pub mod token;

pub use config::{LedgerConfig, ShortfallPolicy, WEI_PER_ETH};
pub use token::{ConfidentialLedger, LedgerError, OPERATOR_FOREVER};
