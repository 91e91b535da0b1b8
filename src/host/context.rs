//! Call Context and Clocks
//!
//! Who is calling, at what block time, with how much native value attached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::address::Address;

/// Per-call environment, fixed for the whole transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Immediate caller (holder, operator or calling contract).
    pub caller: Address,
    /// Block timestamp (Unix seconds).
    pub timestamp: u64,
    /// Native value attached to the call, in wei.
    #[serde(with = "super::u128_str")]
    pub value: u128,
}

impl CallContext {
    /// Context with no attached value.
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self { caller, timestamp, value: 0 }
    }

    /// Attach native value.
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    /// Context for a nested call made by `contract` within the same transaction.
    pub fn as_contract(&self, contract: Address) -> Self {
        Self { caller: contract, timestamp: self.timestamp, value: 0 }
    }
}

/// Source of block timestamps.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Manually advanced clock for tests and replays.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Start at `now`.
    pub fn new(now: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(now)) }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
