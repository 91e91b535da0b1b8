//! Ciphertext Handles
//!
//! A [`Handle`] is an opaque 32-byte reference to an encrypted value held by
//! the backend. Byte 30 carries the [`CipherType`] so a handle can be
//! type-checked without touching the ciphertext.
//!
//! The typed wrappers ([`Ebool`], [`Euint8`], [`Euint64`]) expose no way to
//! read their content. The only inspection path is the backend's decryption
//! collaborator, gated by the ACL.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Position of the type tag inside a handle.
pub const TYPE_BYTE: usize = 30;

/// Encrypted value type carried in a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CipherType {
    /// Encrypted boolean (comparison result)
    Bool = 0,
    /// Encrypted 8-bit unsigned integer
    Uint8 = 2,
    /// Encrypted 64-bit unsigned integer
    Uint64 = 5,
}

impl CipherType {
    /// Decode the tag byte.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Bool),
            2 => Some(Self::Uint8),
            5 => Some(Self::Uint64),
            _ => None,
        }
    }
}

/// Opaque ciphertext handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Handle(pub [u8; 32]);

impl Handle {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build a handle from a digest, stamping the type tag.
    pub fn tagged(mut digest: [u8; 32], kind: CipherType) -> Self {
        digest[TYPE_BYTE] = kind as u8;
        Self(digest)
    }

    /// Type carried in the tag byte, if it is a known one.
    pub fn cipher_type(&self) -> Option<CipherType> {
        CipherType::from_u8(self.0[TYPE_BYTE])
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without `0x` prefix.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Some(Self(arr))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h:{}", hex::encode(&self.0[..6]))
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Handle::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid handle"))
    }
}

macro_rules! encrypted_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Handle);

        impl $name {
            /// Type tag every handle of this wrapper carries.
            pub const KIND: CipherType = $kind;

            /// Wrap a backend-produced handle. Backends are the only callers.
            pub fn from_handle(handle: Handle) -> Self {
                Self(handle)
            }

            /// Underlying ciphertext handle.
            pub fn handle(&self) -> Handle {
                self.0
            }
        }
    };
}

encrypted_type!(
    /// Encrypted boolean produced by oblivious comparisons.
    Ebool,
    CipherType::Bool
);
encrypted_type!(
    /// Encrypted 8-bit value (random bytes, wheel segments).
    Euint8,
    CipherType::Uint8
);
encrypted_type!(
    /// Encrypted 64-bit value (balances, bets, winnings).
    Euint64,
    CipherType::Uint64
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_roundtrip() {
        let handle = Handle::tagged([0xff; 32], CipherType::Uint64);
        assert_eq!(handle.cipher_type(), Some(CipherType::Uint64));

        let handle = Handle::tagged([0xff; 32], CipherType::Uint8);
        assert_eq!(handle.cipher_type(), Some(CipherType::Uint8));

        assert_eq!(Handle::new([0xff; 32]).cipher_type(), None);
    }

    #[test]
    fn test_hex_roundtrip() {
        let handle = Handle::tagged([0x42; 32], CipherType::Bool);
        assert_eq!(Handle::from_hex(&handle.to_hex()), Some(handle));
        assert!(Handle::from_hex("0x00").is_none());
    }

    #[test]
    fn test_typed_wrapper_serializes_as_handle() {
        let handle = Handle::tagged([3; 32], CipherType::Uint64);
        let value = Euint64::from_handle(handle);

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, serde_json::to_string(&handle).unwrap());

        let parsed: Euint64 = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.handle(), handle);
    }
}
