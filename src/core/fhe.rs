//! Oblivious Primitive Layer
//!
//! The set of homomorphic operations the engine is allowed to use. There is
//! no operation that yields a plaintext: comparisons return [`Ebool`] and the
//! only way to act on one is [`FheBackend::select`], which evaluates both
//! arms. Control flow can therefore never depend on a secret.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::acl::AclManager;
use super::address::Address;
use super::handle::{CipherType, Ebool, Euint64, Euint8, Handle};

/// Proof that an externally supplied ciphertext was produced for a given
/// `(contract, submitter)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProof(#[serde(with = "hex_array")] pub [u8; 32]);

/// Untrusted ciphertext submitted by a client, plus its proof.
///
/// Must go through [`FheBackend::verify_input`] before use in arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    /// External ciphertext handle.
    pub handle: Handle,
    /// Correctness proof bound to contract and submitter.
    pub proof: InputProof,
}

/// Primitive layer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FheError {
    /// The input proof does not verify for this contract/submitter.
    #[error("input proof rejected for handle {0}")]
    InvalidProof(Handle),

    /// The backend holds no ciphertext under this handle.
    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(Handle),

    /// The handle's type tag does not match the operation.
    #[error("handle {handle} is not of type {expected:?}")]
    TypeMismatch {
        /// Offending handle.
        handle: Handle,
        /// Type the operation needed.
        expected: CipherType,
    },

    /// Decryption requested without an ACL grant.
    #[error("{requester} is not allowed to decrypt {handle}")]
    AccessDenied {
        /// Handle that was requested.
        handle: Handle,
        /// Identity that asked.
        requester: Address,
    },

    /// Division by a zero scalar.
    #[error("division by zero scalar")]
    DivisionByZero,
}

impl FheError {
    /// Stable reason identifier for the wire.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidProof(_) => "InvalidInputProof",
            Self::UnknownHandle(_) => "UnknownHandle",
            Self::TypeMismatch { .. } => "HandleTypeMismatch",
            Self::AccessDenied { .. } => "DecryptionDenied",
            Self::DivisionByZero => "DivisionByZero",
        }
    }
}

/// Homomorphic execution backend.
///
/// Every operation produces a fresh handle with no ACL grants. Callers that
/// store or return the result must grant access explicitly.
///
/// Integer arithmetic wraps modulo 2^64 (or 2^8), as ciphertext arithmetic
/// cannot trap.
pub trait FheBackend {
    /// Restore point returned by [`FheBackend::checkpoint`].
    type Checkpoint;

    /// Encrypt a public constant.
    fn trivial_u64(&mut self, value: u64) -> Euint64;

    /// Encrypt a public 8-bit constant.
    fn trivial_u8(&mut self, value: u8) -> Euint8;

    /// `lhs + rhs` (wrapping).
    fn add(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Euint64, FheError>;

    /// `lhs - rhs` (wrapping).
    fn sub(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Euint64, FheError>;

    /// `lhs * rhs` for a plaintext `rhs` (wrapping).
    fn mul_scalar(&mut self, lhs: Euint64, rhs: u64) -> Result<Euint64, FheError>;

    /// `lhs / rhs` for a plaintext, non-zero `rhs`.
    fn div_scalar(&mut self, lhs: Euint64, rhs: u64) -> Result<Euint64, FheError>;

    /// `lhs >= rhs`.
    fn ge(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Ebool, FheError>;

    /// `lhs > rhs`.
    fn gt(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Ebool, FheError>;

    /// `lhs < rhs`.
    fn lt(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Ebool, FheError>;

    /// `lhs == rhs`.
    fn eq(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Ebool, FheError>;

    /// `lhs >= rhs` for a plaintext 8-bit `rhs`.
    fn ge_scalar_u8(&mut self, lhs: Euint8, rhs: u8) -> Result<Ebool, FheError>;

    /// `lhs == rhs` for a plaintext 8-bit `rhs`.
    fn eq_scalar_u8(&mut self, lhs: Euint8, rhs: u8) -> Result<Ebool, FheError>;

    /// `cond ? if_true : if_false`, both arms already evaluated.
    fn select(&mut self, cond: Ebool, if_true: Euint64, if_false: Euint64) -> Result<Euint64, FheError>;

    /// 8-bit variant of [`FheBackend::select`].
    fn select_u8(&mut self, cond: Ebool, if_true: Euint8, if_false: Euint8) -> Result<Euint8, FheError>;

    /// Draw one uniformly random encrypted byte.
    fn random_u8(&mut self) -> Euint8;

    /// Import an external ciphertext after checking its proof against the
    /// receiving contract and the submitter.
    fn verify_input(
        &mut self,
        input: &EncryptedInput,
        contract: Address,
        submitter: Address,
    ) -> Result<Euint64, FheError>;

    /// Open a transaction scope. Ciphertexts produced or imported until the
    /// matching [`FheBackend::rollback`] or [`FheBackend::commit`] are tracked.
    fn checkpoint(&mut self) -> Self::Checkpoint;

    /// Discard every ciphertext produced since `checkpoint`, hand imported
    /// inputs back and rewind the random stream.
    fn rollback(&mut self, checkpoint: Self::Checkpoint);

    /// Close the scope, releasing ciphertexts it produced or imported that
    /// nobody holds a grant on.
    fn commit(&mut self, acl: &AclManager);
}

mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("proof must be 32 bytes"))
    }
}
