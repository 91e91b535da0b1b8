//! Reference Backend
//!
//! [`ClearBackend`] implements [`FheBackend`] by keeping plaintexts in a
//! private table keyed by handle. The engine cannot tell it apart from a real
//! homomorphic backend: it only ever sees handles.
//!
//! It also plays the two client-side collaborators:
//! - [`ClearBackend::encrypt_input`]: produce a ciphertext plus proof for a
//!   `(contract, submitter)` pair
//! - [`ClearBackend::decrypt`]: the key service, which refuses any requester
//!   without an ACL grant on the handle
//!
//! Issued inputs wait in a bounded pool until a transaction imports them.
//! Ciphertexts a transaction produces or imports are released when it
//! commits unless somebody holds a grant on them.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::acl::AclManager;
use super::address::Address;
use super::fhe::{EncryptedInput, FheBackend, FheError, InputProof};
use super::handle::{CipherType, Ebool, Euint64, Euint8, Handle};
use super::hash::{hash_with_domain, StateHasher};
use super::rng::DeterministicRng;

/// Domain separator for handle derivation.
const HANDLE_DOMAIN: &[u8] = b"CIPHER_WHEEL_HANDLE_V1";

/// Domain separator for input proofs.
const PROOF_DOMAIN: &[u8] = b"CIPHER_WHEEL_INPUT_PROOF_V1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Plaintext {
    Bool(bool),
    U8(u8),
    U64(u64),
}

impl Plaintext {
    fn widen(self) -> u64 {
        match self {
            Self::Bool(b) => b as u64,
            Self::U8(v) => v as u64,
            Self::U64(v) => v,
        }
    }
}

/// Default number of issued inputs kept before the oldest is evicted.
pub const DEFAULT_MAX_PENDING_INPUTS: usize = 4096;

/// Restore point for [`ClearBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClearCheckpoint {
    counter: u64,
    rng: [u64; 2],
}

/// Handles touched by the open transaction.
#[derive(Clone, Debug, Default)]
struct Scope {
    created: Vec<Handle>,
    /// Inputs imported from the pool, with their pool sequence.
    imported: Vec<(u64, Handle)>,
}

/// Plaintext-backed implementation of the primitive layer.
#[derive(Clone, Debug)]
pub struct ClearBackend {
    values: BTreeMap<Handle, Plaintext>,
    counter: u64,
    rng: DeterministicRng,
    /// Secret binding input proofs to this backend.
    proof_key: [u8; 32],
    /// Issued, not yet imported inputs by issue sequence.
    pending_inputs: BTreeMap<u64, Handle>,
    input_seq: BTreeMap<Handle, u64>,
    max_pending_inputs: usize,
    scope: Option<Scope>,
}

impl ClearBackend {
    /// Create a backend whose random stream and proof key derive from `seed`.
    pub fn new(seed: u64) -> Self {
        Self::with_parts(
            DeterministicRng::new(seed),
            hash_with_domain(b"CIPHER_WHEEL_PROOF_KEY_V1", &seed.to_le_bytes()),
        )
    }

    /// Create a backend from 32 bytes of external entropy.
    pub fn from_entropy(entropy: &[u8; 32]) -> Self {
        Self::with_parts(
            DeterministicRng::from_entropy(entropy, b"random_u8"),
            hash_with_domain(b"CIPHER_WHEEL_PROOF_KEY_V1", entropy),
        )
    }

    fn with_parts(rng: DeterministicRng, proof_key: [u8; 32]) -> Self {
        Self {
            values: BTreeMap::new(),
            counter: 0,
            rng,
            proof_key,
            pending_inputs: BTreeMap::new(),
            input_seq: BTreeMap::new(),
            max_pending_inputs: DEFAULT_MAX_PENDING_INPUTS,
            scope: None,
        }
    }

    /// Cap the pool of issued, not yet imported inputs (at least one).
    pub fn with_input_limit(mut self, limit: usize) -> Self {
        self.max_pending_inputs = limit.max(1);
        self
    }

    /// Encrypt a client value for submission to `contract` by `submitter`.
    ///
    /// The ciphertext stays available until a transaction imports it or
    /// newer inputs push it out of the pool.
    pub fn encrypt_input(&mut self, contract: Address, submitter: Address, value: u64) -> EncryptedInput {
        let handle = self.store(Plaintext::U64(value), CipherType::Uint64);
        let proof = self.input_proof(&handle, &contract, &submitter);

        self.pending_inputs.insert(self.counter, handle);
        self.input_seq.insert(handle, self.counter);
        while self.pending_inputs.len() > self.max_pending_inputs {
            if let Some((_, evicted)) = self.pending_inputs.pop_first() {
                self.input_seq.remove(&evicted);
                self.values.remove(&evicted);
                debug!(handle = ?evicted, "input pool full, evicted oldest input");
            }
        }
        EncryptedInput { handle, proof }
    }

    /// Decrypt on behalf of `requester`, who must hold a grant.
    ///
    /// Booleans decrypt to 0/1 and bytes are widened.
    pub fn decrypt(&self, acl: &AclManager, handle: Handle, requester: Address) -> Result<u64, FheError> {
        if !acl.is_allowed(handle, requester) {
            return Err(FheError::AccessDenied { handle, requester });
        }
        self.values
            .get(&handle)
            .map(|p| p.widen())
            .ok_or(FheError::UnknownHandle(handle))
    }

    /// Full-authority view, for test harnesses and invariant checks only.
    pub fn plaintext(&self, handle: Handle) -> Option<u64> {
        self.values.get(&handle).map(|p| p.widen())
    }

    /// Number of ciphertexts held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Number of issued inputs no transaction has imported yet.
    pub fn pending_inputs(&self) -> usize {
        self.pending_inputs.len()
    }

    /// Whether no ciphertext is held.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn input_proof(&self, handle: &Handle, contract: &Address, submitter: &Address) -> InputProof {
        let mut hasher = StateHasher::new(PROOF_DOMAIN);
        hasher.update_bytes(&self.proof_key);
        hasher.update_handle(handle);
        hasher.update_address(contract);
        hasher.update_address(submitter);
        InputProof(hasher.finalize())
    }

    fn store(&mut self, value: Plaintext, kind: CipherType) -> Handle {
        self.counter += 1;
        let mut hasher = StateHasher::new(HANDLE_DOMAIN);
        hasher.update_bytes(&self.proof_key);
        hasher.update_u64(self.counter);
        let handle = Handle::tagged(hasher.finalize(), kind);
        self.values.insert(handle, value);
        if let Some(scope) = self.scope.as_mut() {
            scope.created.push(handle);
        }
        handle
    }

    fn load(&self, handle: Handle, expected: CipherType) -> Result<Plaintext, FheError> {
        if handle.cipher_type() != Some(expected) {
            return Err(FheError::TypeMismatch { handle, expected });
        }
        self.values
            .get(&handle)
            .copied()
            .ok_or(FheError::UnknownHandle(handle))
    }

    fn load_u64(&self, value: Euint64) -> Result<u64, FheError> {
        match self.load(value.handle(), CipherType::Uint64)? {
            Plaintext::U64(v) => Ok(v),
            _ => Err(FheError::TypeMismatch { handle: value.handle(), expected: CipherType::Uint64 }),
        }
    }

    fn load_u8(&self, value: Euint8) -> Result<u8, FheError> {
        match self.load(value.handle(), CipherType::Uint8)? {
            Plaintext::U8(v) => Ok(v),
            _ => Err(FheError::TypeMismatch { handle: value.handle(), expected: CipherType::Uint8 }),
        }
    }

    fn load_bool(&self, value: Ebool) -> Result<bool, FheError> {
        match self.load(value.handle(), CipherType::Bool)? {
            Plaintext::Bool(v) => Ok(v),
            _ => Err(FheError::TypeMismatch { handle: value.handle(), expected: CipherType::Bool }),
        }
    }

    fn new_u64(&mut self, value: u64) -> Euint64 {
        Euint64::from_handle(self.store(Plaintext::U64(value), CipherType::Uint64))
    }

    fn new_u8(&mut self, value: u8) -> Euint8 {
        Euint8::from_handle(self.store(Plaintext::U8(value), CipherType::Uint8))
    }

    fn new_bool(&mut self, value: bool) -> Ebool {
        Ebool::from_handle(self.store(Plaintext::Bool(value), CipherType::Bool))
    }
}

impl FheBackend for ClearBackend {
    type Checkpoint = ClearCheckpoint;

    fn trivial_u64(&mut self, value: u64) -> Euint64 {
        self.new_u64(value)
    }

    fn trivial_u8(&mut self, value: u8) -> Euint8 {
        self.new_u8(value)
    }

    fn add(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Euint64, FheError> {
        let out = self.load_u64(lhs)?.wrapping_add(self.load_u64(rhs)?);
        Ok(self.new_u64(out))
    }

    fn sub(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Euint64, FheError> {
        let out = self.load_u64(lhs)?.wrapping_sub(self.load_u64(rhs)?);
        Ok(self.new_u64(out))
    }

    fn mul_scalar(&mut self, lhs: Euint64, rhs: u64) -> Result<Euint64, FheError> {
        let out = self.load_u64(lhs)?.wrapping_mul(rhs);
        Ok(self.new_u64(out))
    }

    fn div_scalar(&mut self, lhs: Euint64, rhs: u64) -> Result<Euint64, FheError> {
        if rhs == 0 {
            return Err(FheError::DivisionByZero);
        }
        let out = self.load_u64(lhs)? / rhs;
        Ok(self.new_u64(out))
    }

    fn ge(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Ebool, FheError> {
        let out = self.load_u64(lhs)? >= self.load_u64(rhs)?;
        Ok(self.new_bool(out))
    }

    fn gt(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Ebool, FheError> {
        let out = self.load_u64(lhs)? > self.load_u64(rhs)?;
        Ok(self.new_bool(out))
    }

    fn lt(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Ebool, FheError> {
        let out = self.load_u64(lhs)? < self.load_u64(rhs)?;
        Ok(self.new_bool(out))
    }

    fn eq(&mut self, lhs: Euint64, rhs: Euint64) -> Result<Ebool, FheError> {
        let out = self.load_u64(lhs)? == self.load_u64(rhs)?;
        Ok(self.new_bool(out))
    }

    fn ge_scalar_u8(&mut self, lhs: Euint8, rhs: u8) -> Result<Ebool, FheError> {
        let out = self.load_u8(lhs)? >= rhs;
        Ok(self.new_bool(out))
    }

    fn eq_scalar_u8(&mut self, lhs: Euint8, rhs: u8) -> Result<Ebool, FheError> {
        let out = self.load_u8(lhs)? == rhs;
        Ok(self.new_bool(out))
    }

    fn select(&mut self, cond: Ebool, if_true: Euint64, if_false: Euint64) -> Result<Euint64, FheError> {
        // Load both arms so a bad handle fails regardless of the condition
        let (a, b) = (self.load_u64(if_true)?, self.load_u64(if_false)?);
        let out = if self.load_bool(cond)? { a } else { b };
        Ok(self.new_u64(out))
    }

    fn select_u8(&mut self, cond: Ebool, if_true: Euint8, if_false: Euint8) -> Result<Euint8, FheError> {
        let (a, b) = (self.load_u8(if_true)?, self.load_u8(if_false)?);
        let out = if self.load_bool(cond)? { a } else { b };
        Ok(self.new_u8(out))
    }

    fn random_u8(&mut self) -> Euint8 {
        let byte = self.rng.next_u8();
        self.new_u8(byte)
    }

    fn verify_input(
        &mut self,
        input: &EncryptedInput,
        contract: Address,
        submitter: Address,
    ) -> Result<Euint64, FheError> {
        let expected = self.input_proof(&input.handle, &contract, &submitter);
        if expected != input.proof {
            return Err(FheError::InvalidProof(input.handle));
        }
        self.load(input.handle, CipherType::Uint64)?;
        if let Some(scope) = self.scope.as_mut() {
            if let Some(seq) = self.input_seq.remove(&input.handle) {
                self.pending_inputs.remove(&seq);
                scope.imported.push((seq, input.handle));
            }
        }
        Ok(Euint64::from_handle(input.handle))
    }

    fn checkpoint(&mut self) -> ClearCheckpoint {
        self.scope = Some(Scope::default());
        ClearCheckpoint { counter: self.counter, rng: self.rng.state() }
    }

    fn rollback(&mut self, checkpoint: ClearCheckpoint) {
        if let Some(scope) = self.scope.take() {
            for handle in scope.created {
                self.values.remove(&handle);
                if let Some(seq) = self.input_seq.remove(&handle) {
                    self.pending_inputs.remove(&seq);
                }
            }
            for (seq, handle) in scope.imported {
                self.pending_inputs.insert(seq, handle);
                self.input_seq.insert(handle, seq);
            }
        }
        self.counter = checkpoint.counter;
        self.rng.set_state(checkpoint.rng);
    }

    fn commit(&mut self, acl: &AclManager) {
        let Some(scope) = self.scope.take() else {
            return;
        };
        let before = self.values.len();
        let touched = scope.created.into_iter().chain(scope.imported.into_iter().map(|(_, h)| h));
        for handle in touched {
            if !acl.has_grants(handle) && !self.input_seq.contains_key(&handle) {
                self.values.remove(&handle);
            }
        }
        trace!(released = before - self.values.len(), held = self.values.len(), "backend scope committed");
    }
}
