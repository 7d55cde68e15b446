//! # shadowfax-crypto
//!
//! Cryptographic primitives for the shadowfax messaging relay.
//!
//! This crate provides:
//!
//! - **Key types**: Curve25519 key pairs and 32-byte symmetric keys
//! - **Nonces**: 24-byte random nonces with Base58 encoding
//! - **PK-box**: authenticated public-key encryption (NaCl `crypto_box`,
//!   Curve25519 + XSalsa20-Poly1305)
//! - **SK-box**: authenticated symmetric encryption (NaCl `secretbox`)
//! - **Vault KDF**: scrypt passphrase derivation with a SHA-384 verifier
//!
//! ## Security
//!
//! All private and symmetric key material is zeroized on drop and redacted
//! from `Debug` output. Randomness comes from the operating system CSPRNG.
//! Opening a box either returns the plaintext or fails authentication; there
//! is no partial output.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boxes;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod nonce;

pub use boxes::{box_open, box_seal, secretbox_open, secretbox_seal};
pub use error::{CryptoError, Result};
pub use kdf::{derive_vault_key, generate_salt, passphrase_verifier, SALT_SIZE, VERIFIER_SIZE};
pub use keys::{KeyPair, PrivateKey, PublicKey, SecretKey, PUBLIC_KEY_SIZE};
pub use nonce::{Nonce, NONCE_SIZE};
