//! Core confidential primitives.
//!
//! Everything the ledger and the wheel build on: identities, opaque
//! ciphertext handles, the oblivious operation set, the ACL store and the
//! reference backend.

pub mod acl;
pub mod address;
pub mod clear;
pub mod fhe;
pub mod handle;
pub mod hash;
pub mod rng;

// Re-export core types
pub use acl::{AclManager, GrantRequirement, MissingGrant};
pub use address::Address;
pub use clear::{ClearBackend, ClearCheckpoint};
pub use fhe::{EncryptedInput, FheBackend, FheError, InputProof};
pub use handle::{CipherType, Ebool, Euint64, Euint8, Handle};
pub use hash::{StateHash, StateHasher};
pub use rng::DeterministicRng;
