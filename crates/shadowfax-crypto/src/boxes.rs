//! Authenticated encryption: NaCl box and secretbox.
//!
//! Two constructions, both XSalsa20-Poly1305:
//!
//! - **PK-box** (`box_seal` / `box_open`): public-key authenticated
//!   encryption between two Curve25519 key pairs (NaCl `crypto_box`)
//! - **SK-box** (`secretbox_seal` / `secretbox_open`): symmetric
//!   authenticated encryption with a 32-byte key (NaCl `secretbox`)
//!
//! The boxes between (A priv, B pub) and (B priv, A pub) derive the same
//! shared key, so sealing a reply with the request's nonce in the opposite
//! direction is part of the envelope contract, not a nonce reuse.

use crypto_box::aead::Aead;
use crypto_box::SalsaBox;
use crypto_secretbox::aead::KeyInit;
use crypto_secretbox::XSalsa20Poly1305;

use crate::keys::{PrivateKey, PublicKey, SecretKey};
use crate::nonce::Nonce;
use crate::{CryptoError, Result};

/// Seal a plaintext to a peer with the PK-box construction.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if sealing fails.
pub fn box_seal(
    plaintext: &[u8],
    nonce: &Nonce,
    peer_public: &PublicKey,
    own_private: &PrivateKey,
) -> Result<Vec<u8>> {
    let peer = crypto_box::PublicKey::from(peer_public.to_bytes());
    let own = crypto_box::SecretKey::from(*own_private.as_bytes());
    let salsa_box = SalsaBox::new(&peer, &own);
    salsa_box
        .encrypt(nonce.as_bytes().into(), plaintext)
        .map_err(|_| CryptoError::Encryption("box seal failed".into()))
}

/// Open a PK-box ciphertext from a peer.
///
/// # Errors
///
/// Returns `CryptoError::Decryption` if the ciphertext does not authenticate
/// under `(nonce, peer_public, own_private)`. No partial output is produced.
pub fn box_open(
    ciphertext: &[u8],
    nonce: &Nonce,
    peer_public: &PublicKey,
    own_private: &PrivateKey,
) -> Result<Vec<u8>> {
    let peer = crypto_box::PublicKey::from(peer_public.to_bytes());
    let own = crypto_box::SecretKey::from(*own_private.as_bytes());
    let salsa_box = SalsaBox::new(&peer, &own);
    salsa_box
        .decrypt(nonce.as_bytes().into(), ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

/// Seal a plaintext with the SK-box construction.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if sealing fails.
pub fn secretbox_seal(plaintext: &[u8], nonce: &Nonce, key: &SecretKey) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
    cipher
        .encrypt(nonce.as_bytes().into(), plaintext)
        .map_err(|_| CryptoError::Encryption("secretbox seal failed".into()))
}

/// Open an SK-box ciphertext.
///
/// # Errors
///
/// Returns `CryptoError::Decryption` if the ciphertext does not authenticate
/// under `(nonce, key)`.
pub fn secretbox_open(ciphertext: &[u8], nonce: &Nonce, key: &SecretKey) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(nonce.as_bytes().into(), ciphertext)
        .map_err(|_| CryptoError::Decryption)
}
