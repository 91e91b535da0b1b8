//! Execution Host
//!
//! The environment contracts run in: the primitive backend, the ACL store,
//! the event sink, call contexts and the serialized transaction runtime.

pub mod context;
pub mod events;
pub mod journal;
pub mod runtime;

pub use context::{CallContext, Clock, ManualClock, SystemClock};
pub use events::{Event, EventData};
pub use journal::{JournalEntry, TransactionJournal, TxStatus};
pub use runtime::{
    Query, QueryResult, Receipt, Runtime, RuntimeConfig, RuntimeError, Transaction, TxOutput,
};

use crate::core::acl::AclManager;
use crate::core::address::Address;
use crate::core::fhe::FheBackend;

/// Shared state every contract operation receives.
///
/// The runtime opens a scope with [`Host::begin`] before each transaction and
/// closes it with [`Host::commit`] or [`Host::rollback`].
#[derive(Clone, Debug)]
pub struct Host<B> {
    /// Homomorphic primitive layer.
    pub backend: B,
    /// Ciphertext allow-lists.
    pub acl: AclManager,
    events: Vec<Event>,
}

impl<B> Host<B> {
    /// Wrap a backend with an empty ACL.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            acl: AclManager::new(),
            events: Vec::new(),
        }
    }

    /// Record an event for the current transaction.
    pub fn emit(&mut self, timestamp: u64, emitter: Address, data: EventData) {
        self.events.push(Event { timestamp, emitter, data });
    }

    /// Events emitted since the last drain.
    pub fn pending_events(&self) -> &[Event] {
        &self.events
    }

    /// Take the events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

impl<B: FheBackend> Host<B> {
    /// Open a transaction scope on the backend and the ACL.
    pub fn begin(&mut self) -> B::Checkpoint {
        self.acl.begin();
        self.backend.checkpoint()
    }

    /// Undo every ciphertext, grant and event since [`Host::begin`].
    pub fn rollback(&mut self, checkpoint: B::Checkpoint) {
        self.backend.rollback(checkpoint);
        self.acl.rollback();
        self.events.clear();
    }

    /// Keep the scope's grants, release ungranted scratch ciphertexts and
    /// take the events.
    pub fn commit(&mut self) -> Vec<Event> {
        self.backend.commit(&self.acl);
        self.acl.commit();
        self.drain_events()
    }
}

/// Serde adapter writing `u128` as a decimal string.
///
/// JSON numbers above 2^53 lose precision in most clients, and tagged enums
/// cannot buffer 128-bit integers.
pub mod u128_str {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as string.
    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
