//! State Hashing
//!
//! Domain-separated SHA-256 used for:
//! - Ciphertext handle derivation
//! - Input proof commitments
//! - Runtime state hashes and the journal chain

use sha2::{Digest, Sha256};

use super::address::Address;
use super::handle::Handle;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher.
///
/// Wraps SHA-256 with helpers for the engine's value types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for committed runtime state.
    pub fn for_runtime_state() -> Self {
        Self::new(b"CIPHER_WHEEL_STATE_V1")
    }

    /// Create hasher for journal entries.
    pub fn for_journal() -> Self {
        Self::new(b"CIPHER_WHEEL_JOURNAL_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u128 value (little-endian).
    #[inline]
    pub fn update_u128(&mut self, value: u128) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with an address.
    #[inline]
    pub fn update_address(&mut self, address: &Address) {
        self.hasher.update(address.as_bytes());
    }

    /// Update with a ciphertext handle.
    #[inline]
    pub fn update_handle(&mut self, handle: &Handle) {
        self.hasher.update(handle.as_bytes());
    }

    /// Update with an optional handle. Absence hashes differently from any handle.
    #[inline]
    pub fn update_opt_handle(&mut self, handle: Option<&Handle>) {
        match handle {
            Some(h) => {
                self.update_u8(1);
                self.update_handle(h);
            }
            None => self.update_u8(0),
        }
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}
