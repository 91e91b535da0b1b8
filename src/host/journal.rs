//! Transaction Journal
//!
//! Hash-chained record of every submitted transaction, committed or
//! reverted, in execution order. Each entry commits to the post-transaction
//! state hash and to the previous entry, so the log can be checked offline
//! after a bincode export.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::address::Address;
use crate::core::hash::{StateHash, StateHasher};

/// Chain anchor for the first entry.
pub const GENESIS_HASH: StateHash = [0u8; 32];

/// Outcome of a journaled transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Applied.
    Committed,
    /// Aborted with every effect discarded.
    Reverted {
        /// Stable reason identifier.
        reason: String,
    },
}

/// One journal record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the log (0-based).
    pub index: u64,
    /// Transaction identifier.
    pub tx_id: Uuid,
    /// Submitting account.
    pub caller: Address,
    /// Transaction kind (e.g. `"spin"`).
    pub kind: String,
    /// Committed or reverted.
    pub status: TxStatus,
    /// Block time the transaction ran at.
    pub timestamp: u64,
    /// Runtime state hash after the transaction.
    pub state_hash: StateHash,
    /// Hash of the previous entry.
    pub prev_hash: StateHash,
    /// Hash of this entry.
    pub hash: StateHash,
}

impl JournalEntry {
    fn compute_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_journal();
        hasher.update_u64(self.index);
        hasher.update_bytes(self.tx_id.as_bytes());
        hasher.update_address(&self.caller);
        hasher.update_bytes(self.kind.as_bytes());
        match &self.status {
            TxStatus::Committed => hasher.update_u8(0),
            TxStatus::Reverted { reason } => {
                hasher.update_u8(1);
                hasher.update_bytes(reason.as_bytes());
            }
        }
        hasher.update_u64(self.timestamp);
        hasher.update_bytes(&self.state_hash);
        hasher.update_bytes(&self.prev_hash);
        hasher.finalize()
    }

    /// Whether the transaction was applied.
    pub fn is_committed(&self) -> bool {
        self.status == TxStatus::Committed
    }
}

/// Journal errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    /// Entry hash or link does not match.
    #[error("journal chain broken at entry {index}")]
    BrokenChain {
        /// First bad entry.
        index: u64,
    },

    /// Export failed.
    #[error("journal serialization failed: {0}")]
    SerializationFailed(String),

    /// Import failed.
    #[error("journal deserialization failed: {0}")]
    DeserializationFailed(String),
}

/// Append-only transaction log.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionJournal {
    entries: Vec<JournalEntry>,
}

impl TransactionJournal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return it.
    pub fn append(
        &mut self,
        tx_id: Uuid,
        caller: Address,
        kind: &str,
        status: TxStatus,
        timestamp: u64,
        state_hash: StateHash,
    ) -> &JournalEntry {
        let mut entry = JournalEntry {
            index: self.entries.len() as u64,
            tx_id,
            caller,
            kind: kind.to_string(),
            status,
            timestamp,
            state_hash,
            prev_hash: self.head(),
            hash: GENESIS_HASH,
        };
        entry.hash = entry.compute_hash();
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Hash of the latest entry, or [`GENESIS_HASH`].
    pub fn head(&self) -> StateHash {
        self.entries.last().map(|e| e.hash).unwrap_or(GENESIS_HASH)
    }

    /// All entries in order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entry by index.
    pub fn get(&self, index: u64) -> Option<&JournalEntry> {
        self.entries.get(index as usize)
    }

    /// Entries submitted by `caller`.
    pub fn by_caller<'a>(&'a self, caller: &'a Address) -> impl Iterator<Item = &'a JournalEntry> {
        self.entries.iter().filter(move |e| &e.caller == caller)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was journaled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recompute every hash and link.
    pub fn verify_chain(&self) -> Result<(), JournalError> {
        let mut prev = GENESIS_HASH;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.index != i as u64 || entry.prev_hash != prev || entry.hash != entry.compute_hash() {
                return Err(JournalError::BrokenChain { index: i as u64 });
            }
            prev = entry.hash;
        }
        Ok(())
    }

    /// Serialize to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, JournalError> {
        bincode::serialize(self).map_err(|e| JournalError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes and verify the chain.
    pub fn from_bytes(data: &[u8]) -> Result<Self, JournalError> {
        let journal: Self = bincode::deserialize(data)
            .map_err(|e| JournalError::DeserializationFailed(e.to_string()))?;
        journal.verify_chain()?;
        Ok(journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> TransactionJournal {
        let mut journal = TransactionJournal::new();
        let alice = Address::new([1; 20]);
        journal.append(Uuid::new_v4(), alice, "mint", TxStatus::Committed, 10, [1; 32]);
        journal.append(
            Uuid::new_v4(),
            alice,
            "spin",
            TxStatus::Reverted { reason: "PendingSpinExists".into() },
            11,
            [1; 32],
        );
        journal.append(Uuid::new_v4(), alice, "claim_prize", TxStatus::Committed, 12, [2; 32]);
        journal
    }

    #[test]
    fn test_chain_links() {
        let journal = filled();
        assert_eq!(journal.len(), 3);
        assert_eq!(journal.entries()[0].prev_hash, GENESIS_HASH);
        assert_eq!(journal.entries()[1].prev_hash, journal.entries()[0].hash);
        assert_eq!(journal.head(), journal.entries()[2].hash);
        assert!(!journal.entries()[1].is_committed());
        assert!(journal.verify_chain().is_ok());
    }

    #[test]
    fn test_tamper_detected() {
        let mut journal = filled();
        journal.entries[1].status = TxStatus::Committed;
        assert_eq!(journal.verify_chain(), Err(JournalError::BrokenChain { index: 1 }));
    }

    #[test]
    fn test_export_import() {
        let journal = filled();
        let bytes = journal.to_bytes().unwrap();
        let restored = TransactionJournal::from_bytes(&bytes).unwrap();
        assert_eq!(restored.entries(), journal.entries());
        assert!(TransactionJournal::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_by_caller() {
        let journal = filled();
        let alice = Address::new([1; 20]);
        let bob = Address::new([2; 20]);
        assert_eq!(journal.by_caller(&alice).count(), 3);
        assert_eq!(journal.by_caller(&bob).count(), 0);
    }
}
