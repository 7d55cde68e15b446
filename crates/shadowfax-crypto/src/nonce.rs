//! 24-byte nonces.
//!
//! A nonce must be used at most once per key pair. Nonces double as message
//! identifiers on the wire: `Message.id` is the Base58 encoding of the nonce
//! that sealed the message contents.
//!
//! ## Security Notes
//!
//! - Nonces are drawn from OsRng; NEVER derive them from counters at the
//!   protocol layer
//! - Decoders reject inputs that do not decode to exactly 24 bytes

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{CryptoError, Result};

/// Size of a nonce in bytes.
pub const NONCE_SIZE: usize = 24;

/// A 24-byte nonce.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce {
    bytes: [u8; NONCE_SIZE],
}

impl Nonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a nonce from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 24 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength {
                expected: NONCE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; NONCE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Decode a nonce from its Base58 string representation.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid Base58 input or if the decoded value is
    /// not exactly 24 bytes.
    pub fn decode(s: &str) -> Result<Self> {
        let buf = bs58::decode(s)
            .into_vec()
            .map_err(|e| CryptoError::Base58(e.to_string()))?;
        Self::from_bytes(&buf)
    }

    /// Encode the nonce to its Base58 string representation.
    pub fn encode(&self) -> String {
        bs58::encode(&self.bytes).into_string()
    }

    /// Get the nonce as bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({:02x}{:02x}..)", self.bytes[0], self.bytes[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random() {
        let a = Nonce::generate();
        let b = Nonce::generate();
        // Distinct with overwhelming probability
        assert_ne!(a, b);
    }

    #[test]
    fn test_base58_roundtrip() {
        let nonce = Nonce::generate();
        let decoded = Nonce::decode(&nonce.encode()).unwrap();
        assert_eq!(nonce, decoded);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let short = bs58::encode(&[7u8; 23]).into_string();
        assert!(matches!(
            Nonce::decode(&short),
            Err(CryptoError::InvalidNonceLength {
                expected: NONCE_SIZE,
                actual: 23
            })
        ));

        let long = bs58::encode(&[7u8; 25]).into_string();
        assert!(Nonce::decode(&long).is_err());
    }

    #[test]
    fn test_from_bytes() {
        let bytes = [0x42u8; NONCE_SIZE];
        let nonce = Nonce::from_bytes(&bytes).unwrap();
        assert_eq!(nonce.as_bytes(), &bytes);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn nonce_roundtrip(bytes in any::<[u8; NONCE_SIZE]>()) {
            let nonce = Nonce::from_bytes(&bytes).unwrap();
            let decoded = Nonce::decode(&nonce.encode()).unwrap();
            prop_assert_eq!(nonce, decoded);
        }
    }
}
