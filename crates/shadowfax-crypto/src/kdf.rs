//! Passphrase key derivation for the vault.
//!
//! The vault symmetric key is derived from a passphrase with scrypt
//! (`N=16384, r=8, p=1, dkLen=32`), salted by a random 32-byte value stored
//! beside the vault. A separate verifier - SHA-384 of
//! `"v1" || salt || passphrase` - is stored alongside the salt so a wrong
//! passphrase is rejected before any vault I/O.
//!
//! These parameters are part of the on-disk format and must not change.

use rand::rngs::OsRng;
use rand::RngCore;
use scrypt::Params;
use sha2::{Digest, Sha384};
use zeroize::Zeroize;

use crate::keys::SecretKey;
use crate::{CryptoError, Result};

/// Size of the vault salt in bytes.
pub const SALT_SIZE: usize = 32;

/// Size of the passphrase verifier in bytes (SHA-384 digest).
pub const VERIFIER_SIZE: usize = 48;

/// On-disk format version, mixed into the verifier digest.
pub const KDF_VERSION: &[u8; 2] = b"v1";

// scrypt N=16384 expressed as log2
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const SCRYPT_DK_LEN: usize = 32;

/// Generate a fresh random vault salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive the vault symmetric key from a passphrase and salt.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if scrypt fails (should not happen
/// with the fixed parameters).
pub fn derive_vault_key(passphrase: &[u8], salt: &[u8; SALT_SIZE]) -> Result<SecretKey> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, SCRYPT_DK_LEN)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let mut derived = [0u8; SCRYPT_DK_LEN];
    scrypt::scrypt(passphrase, salt, &params, &mut derived)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let key = SecretKey::from_bytes(&derived)?;
    derived.zeroize();
    Ok(key)
}

/// Compute the passphrase verifier: `SHA-384("v1" || salt || passphrase)`.
pub fn passphrase_verifier(passphrase: &[u8], salt: &[u8; SALT_SIZE]) -> [u8; VERIFIER_SIZE] {
    let mut hasher = Sha384::new();
    hasher.update(KDF_VERSION);
    hasher.update(salt);
    hasher.update(passphrase);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_deterministic() {
        let salt = [0x42u8; SALT_SIZE];
        let a = derive_vault_key(b"opensesame", &salt).unwrap();
        let b = derive_vault_key(b"opensesame", &salt).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_different_passphrases_different_keys() {
        let salt = [0x42u8; SALT_SIZE];
        let a = derive_vault_key(b"opensesame", &salt).unwrap();
        let b = derive_vault_key(b"letmein", &salt).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_different_salts_different_keys() {
        let a = derive_vault_key(b"opensesame", &[0x01u8; SALT_SIZE]).unwrap();
        let b = derive_vault_key(b"opensesame", &[0x02u8; SALT_SIZE]).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_verifier_binds_passphrase_and_salt() {
        let salt = [0x42u8; SALT_SIZE];
        let v = passphrase_verifier(b"opensesame", &salt);

        assert_eq!(v, passphrase_verifier(b"opensesame", &salt));
        assert_ne!(v, passphrase_verifier(b"letmein", &salt));
        assert_ne!(v, passphrase_verifier(b"opensesame", &[0x43u8; SALT_SIZE]));
    }

    #[test]
    fn test_generated_salts_distinct() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
