//! Curve25519 key pairs and symmetric keys.
//!
//! Public keys travel on the wire as Base58 strings; private and symmetric
//! keys never leave the process in cleartext.
//!
//! ## Security Notes
//!
//! - Private and symmetric keys are zeroized on drop
//! - Key generation uses OsRng
//! - Decoders reject inputs that do not decode to exactly 32 bytes

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, Result};

/// Size of a Curve25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a Curve25519 private key in bytes.
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Size of a symmetric secret key in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// A Curve25519 public key.
///
/// This is the address of a shadowfax user: messages are pushed to a
/// recipient's public key, and the relay server is identified by its own.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_SIZE],
}

impl PublicKey {
    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Decode a public key from its Base58 string representation.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid Base58 input or if the decoded value is
    /// not exactly 32 bytes.
    pub fn decode(s: &str) -> Result<Self> {
        let buf = bs58::decode(s)
            .into_vec()
            .map_err(|e| CryptoError::Base58(e.to_string()))?;
        Self::from_bytes(&buf)
    }

    /// Encode the public key to its Base58 string representation.
    pub fn encode(&self) -> String {
        bs58::encode(&self.bytes).into_string()
    }

    /// Get the key as bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.bytes
    }

    /// Convert to owned byte array.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.bytes
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PublicKey({:02x}{:02x}..)",
            self.bytes[0], self.bytes[1]
        )
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// A Curve25519 private key.
///
/// Zeroized on drop. Never logged, displayed, or serialized in cleartext.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    bytes: [u8; PRIVATE_KEY_SIZE],
}

impl PrivateKey {
    /// Create from raw bytes.
    ///
    /// # Security
    ///
    /// Only use bytes from a secure source (key generation or the vault).
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: PRIVATE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; PRIVATE_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        let secret = crypto_box::SecretKey::from(self.bytes);
        PublicKey {
            bytes: *secret.public_key().as_bytes(),
        }
    }

    /// Get the key as bytes.
    ///
    /// # Security
    ///
    /// Handle with care - this exposes the private key.
    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

// Clone intentionally NOT implemented for PrivateKey; secret material should
// not be silently duplicated in memory.

/// A 32-byte symmetric secret key.
///
/// Used by the vault to seal key pairs at rest. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; SECRET_KEY_SIZE],
}

impl SecretKey {
    /// Generate a new random secret key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; SECRET_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the key as bytes.
    ///
    /// # Security
    ///
    /// Handle with care - avoid logging or persisting the returned bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// A Curve25519 key pair.
///
/// Owns one public and one private key together. This is a user identity:
/// the vault stores key pairs, and the current one is the default sending
/// address.
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    /// Generate a new random key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        let secret = crypto_box::SecretKey::generate(&mut OsRng);
        let public = PublicKey {
            bytes: *secret.public_key().as_bytes(),
        };
        let private = PrivateKey {
            bytes: secret.to_bytes(),
        };
        Self { public, private }
    }

    /// Assemble a key pair from its two halves.
    pub fn new(public: PublicKey, private: PrivateKey) -> Self {
        Self { public, private }
    }

    /// Get the public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Get the private key.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &"[REDACTED]")
            .finish()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn public_key_roundtrip(bytes in any::<[u8; PUBLIC_KEY_SIZE]>()) {
            let pk = PublicKey::from_bytes(&bytes).unwrap();
            let decoded = PublicKey::decode(&pk.encode()).unwrap();
            prop_assert_eq!(pk, decoded);
        }

        #[test]
        fn wrong_length_rejected(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assume!(bytes.len() != PUBLIC_KEY_SIZE);
            let encoded = bs58::encode(&bytes).into_string();
            prop_assert!(PublicKey::decode(&encoded).is_err());
        }
    }
}
