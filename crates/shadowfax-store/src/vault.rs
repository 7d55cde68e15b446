//! The client-side key vault.
//!
//! An encrypted, append-only log of key pairs under two sled trees:
//!
//! - `log`: `seq -> SK-box(public || private, seq_as_nonce, vault_key)`
//! - `keys`: `public_key_bytes -> seq_bytes`
//!
//! The newest log entry is the *current* key pair, the default sending
//! identity. Sequence keys are minimum-width big-endian (see [`crate::seq`])
//! and double as SK-box nonces by zero-extension to 24 bytes; this reuse is
//! safe because the symmetric key is unique per vault and writes are
//! serialized. Concurrent writers to the same vault are not supported -
//! sled's file lock enforces one process at a time.
//!
//! The vault key is derived from a passphrase via the salt file stored
//! beside the database (see [`SaltFile`]); a wrong passphrase is rejected
//! by the verifier before any vault I/O happens.

use std::path::Path;

use sled::transaction::ConflictableTransactionError;
use sled::transaction::Transactional;
use sled::Tree;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use shadowfax_crypto::{
    derive_vault_key, generate_salt, kdf::KDF_VERSION, passphrase_verifier, secretbox_open,
    secretbox_seal, KeyPair, PrivateKey, PublicKey, SecretKey, PUBLIC_KEY_SIZE, SALT_SIZE,
    VERIFIER_SIZE,
};

use crate::{seq, Result, StoreError};

/// Tree name for the append-only key-pair log.
const LOG_TREE: &str = "log";

/// Tree name for the public-key index.
const KEYS_TREE: &str = "keys";

/// Plaintext width of a log entry: public key || private key.
const ENTRY_SIZE: usize = PUBLIC_KEY_SIZE * 2;

/// The encrypted key-pair vault.
pub struct Vault {
    log: Tree,
    keys: Tree,
    key: SecretKey,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}

impl Vault {
    /// Open the vault trees inside a sled database with an unlocked key.
    ///
    /// # Errors
    ///
    /// Returns an error if the trees cannot be opened.
    pub fn open(db: &sled::Db, key: SecretKey) -> Result<Self> {
        let log = db.open_tree(LOG_TREE)?;
        let keys = db.open_tree(KEYS_TREE)?;
        Ok(Self { log, keys, key })
    }

    /// Get the latest key pair.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::VaultEmpty` if nothing has been stored, or
    /// `StoreError::VaultCorrupt` if the entry fails to open.
    pub fn current(&self) -> Result<KeyPair> {
        let (seq_bytes, ciphertext) = self.last_entry()?.ok_or(StoreError::VaultEmpty)?;
        self.open_entry(&seq_bytes, &ciphertext)
    }

    /// Get the key pair for a public key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KeyPairNotFound` if the key is not indexed,
    /// or `StoreError::VaultCorrupt` if the log entry is missing or fails
    /// to open.
    pub fn get(&self, key: &PublicKey) -> Result<KeyPair> {
        let seq_bytes = self
            .keys
            .get(key.as_bytes())?
            .ok_or_else(|| StoreError::KeyPairNotFound(key.encode()))?;
        let ciphertext = self.log.get(&seq_bytes)?.ok_or(StoreError::VaultCorrupt {
            seq: seq::decode(&seq_bytes).unwrap_or(0),
        })?;
        self.open_entry(&seq_bytes, &ciphertext)
    }

    /// Append a key pair, which becomes the new current key pair.
    ///
    /// Writes the log entry and the index entry in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if sealing or the transaction fails.
    pub fn put(&self, keypair: &KeyPair) -> Result<()> {
        let next = match self.last_entry()? {
            Some((seq_bytes, _)) => seq::decode(&seq_bytes)? + 1,
            None => 1,
        };
        let seq_bytes = seq::encode(next);
        let nonce = seq::nonce(&seq_bytes)?;

        let mut plaintext = [0u8; ENTRY_SIZE];
        plaintext[..PUBLIC_KEY_SIZE].copy_from_slice(keypair.public_key().as_bytes());
        plaintext[PUBLIC_KEY_SIZE..].copy_from_slice(keypair.private_key().as_bytes());
        let sealed = secretbox_seal(&plaintext, &nonce, &self.key);
        plaintext.zeroize();
        let ciphertext = sealed?;

        (&self.log, &self.keys)
            .transaction(|(log_tx, keys_tx)| {
                log_tx.insert(seq_bytes.as_slice(), ciphertext.as_slice())?;
                keys_tx.insert(
                    keypair.public_key().as_bytes().as_slice(),
                    seq_bytes.as_slice(),
                )?;
                Ok::<_, ConflictableTransactionError<StoreError>>(())
            })
            .map_err(StoreError::from)?;
        Ok(())
    }

    /// Call `f` with each key pair in the log, in sequence order.
    ///
    /// Iteration stops at the first error from `f`.
    ///
    /// # Errors
    ///
    /// Returns the first error from `f`, or a storage/corruption error.
    pub fn each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&KeyPair) -> Result<()>,
    {
        let mut entries: Vec<(sled::IVec, sled::IVec)> = Vec::new();
        for entry in self.log.iter() {
            entries.push(entry?);
        }
        entries.sort_by(|a, b| seq::cmp(&a.0, &b.0));

        for (seq_bytes, ciphertext) in entries {
            let keypair = self.open_entry(&seq_bytes, &ciphertext)?;
            f(&keypair)?;
        }
        Ok(())
    }

    /// Find the log entry with the numerically largest sequence.
    fn last_entry(&self) -> Result<Option<(sled::IVec, sled::IVec)>> {
        let mut last: Option<(sled::IVec, sled::IVec)> = None;
        for entry in self.log.iter() {
            let (key, value) = entry?;
            let newer = match &last {
                Some((best, _)) => seq::cmp(&key, best).is_gt(),
                None => true,
            };
            if newer {
                last = Some((key, value));
            }
        }
        Ok(last)
    }

    /// Open one sealed log entry into a key pair.
    fn open_entry(&self, seq_bytes: &[u8], ciphertext: &[u8]) -> Result<KeyPair> {
        let corrupt = || StoreError::VaultCorrupt {
            seq: seq::decode(seq_bytes).unwrap_or(0),
        };

        let nonce = seq::nonce(seq_bytes)?;
        let mut plaintext =
            secretbox_open(ciphertext, &nonce, &self.key).map_err(|_| corrupt())?;
        if plaintext.len() != ENTRY_SIZE {
            plaintext.zeroize();
            return Err(corrupt());
        }

        let public = PublicKey::from_bytes(&plaintext[..PUBLIC_KEY_SIZE])?;
        let private = PrivateKey::from_bytes(&plaintext[PUBLIC_KEY_SIZE..])?;
        plaintext.zeroize();
        Ok(KeyPair::new(public, private))
    }
}

/// The salt file stored beside the vault database.
///
/// On-disk layout: `salt (32) || "v1" (2) || SHA-384 verifier (48)`,
/// file mode 0600. The verifier rejects a wrong passphrase before the vault
/// database is touched.
pub struct SaltFile {
    salt: [u8; SALT_SIZE],
    verifier: [u8; VERIFIER_SIZE],
}

impl SaltFile {
    /// Create a salt file for a new vault: fresh salt, verifier bound to
    /// the passphrase.
    pub fn create(passphrase: &[u8]) -> Self {
        let salt = generate_salt();
        let verifier = passphrase_verifier(passphrase, &salt);
        Self { salt, verifier }
    }

    /// Verify the passphrase and derive the vault key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidPassphrase` on a verifier mismatch; the
    /// key is only derived after the verifier matches.
    pub fn unlock(&self, passphrase: &[u8]) -> Result<SecretKey> {
        let check = passphrase_verifier(passphrase, &self.salt);
        if self.verifier.ct_eq(&check).unwrap_u8() != 1 {
            return Err(StoreError::InvalidPassphrase);
        }
        Ok(derive_vault_key(passphrase, &self.salt)?)
    }

    /// Serialize to the on-disk layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SALT_SIZE + KDF_VERSION.len() + VERIFIER_SIZE);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(KDF_VERSION);
        out.extend_from_slice(&self.verifier);
        out
    }

    /// Parse the on-disk layout.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SaltFile` if the file is short or carries an
    /// unknown version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let expected = SALT_SIZE + KDF_VERSION.len() + VERIFIER_SIZE;
        if bytes.len() < expected {
            return Err(StoreError::SaltFile(format!(
                "expected at least {expected} bytes, got {}",
                bytes.len()
            )));
        }
        let version = &bytes[SALT_SIZE..SALT_SIZE + KDF_VERSION.len()];
        if version != KDF_VERSION {
            return Err(StoreError::SaltFile(format!(
                "unknown version {:?}",
                String::from_utf8_lossy(version)
            )));
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[..SALT_SIZE]);
        let mut verifier = [0u8; VERIFIER_SIZE];
        verifier.copy_from_slice(
            &bytes[SALT_SIZE + KDF_VERSION.len()..SALT_SIZE + KDF_VERSION.len() + VERIFIER_SIZE],
        );
        Ok(Self { salt, verifier })
    }

    /// Load a salt file from disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a format error
    /// from [`SaltFile::from_bytes`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Write the salt file to disk with mode 0600.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    pub fn store(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SaltFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaltFile").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_vault() -> (TempDir, Vault) {
        let dir = TempDir::new().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let vault = Vault::open(&db, SecretKey::generate()).unwrap();
        (dir, vault)
    }

    #[test]
    fn test_empty_vault() {
        let (_dir, vault) = temp_vault();
        assert!(matches!(vault.current(), Err(StoreError::VaultEmpty)));
    }

    #[test]
    fn test_put_then_current() {
        let (_dir, vault) = temp_vault();
        let kp = KeyPair::generate();
        vault.put(&kp).unwrap();

        let current = vault.current().unwrap();
        assert_eq!(current.public_key(), kp.public_key());
        assert_eq!(
            current.private_key().as_bytes(),
            kp.private_key().as_bytes()
        );
    }

    #[test]
    fn test_latest_put_becomes_current() {
        let (_dir, vault) = temp_vault();
        let first = KeyPair::generate();
        let second = KeyPair::generate();

        vault.put(&first).unwrap();
        vault.put(&second).unwrap();

        assert_eq!(vault.current().unwrap().public_key(), second.public_key());
        // The first key pair is still reachable through the index
        assert_eq!(
            vault.get(first.public_key()).unwrap().public_key(),
            first.public_key()
        );
    }

    #[test]
    fn test_get_unknown_key() {
        let (_dir, vault) = temp_vault();
        vault.put(&KeyPair::generate()).unwrap();

        let stranger = KeyPair::generate();
        assert!(matches!(
            vault.get(stranger.public_key()),
            Err(StoreError::KeyPairNotFound(_))
        ));
    }

    #[test]
    fn test_each_in_seq_order() {
        let (_dir, vault) = temp_vault();
        let pairs: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate()).collect();
        for kp in &pairs {
            vault.put(kp).unwrap();
        }

        let mut seen = Vec::new();
        vault
            .each(|kp| {
                seen.push(kp.public_key().encode());
                Ok(())
            })
            .unwrap();
        let expected: Vec<String> = pairs.iter().map(|kp| kp.public_key().encode()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_each_stops_on_error() {
        let (_dir, vault) = temp_vault();
        for _ in 0..3 {
            vault.put(&KeyPair::generate()).unwrap();
        }

        let mut calls = 0;
        let result = vault.each(|_| {
            calls += 1;
            Err(StoreError::InvalidName)
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_wrong_vault_key_is_corruption() {
        let dir = TempDir::new().unwrap();
        let kp = KeyPair::generate();
        {
            let db = sled::open(dir.path()).unwrap();
            let vault = Vault::open(&db, SecretKey::generate()).unwrap();
            vault.put(&kp).unwrap();
            db.flush().unwrap();
        }

        let db = sled::open(dir.path()).unwrap();
        let vault = Vault::open(&db, SecretKey::generate()).unwrap();
        assert!(matches!(
            vault.current(),
            Err(StoreError::VaultCorrupt { seq: 1 })
        ));
    }

    #[test]
    fn test_reopen_with_same_key() {
        let dir = TempDir::new().unwrap();
        let kp = KeyPair::generate();
        let key_bytes = {
            let db = sled::open(dir.path()).unwrap();
            let key = SecretKey::generate();
            let bytes = *key.as_bytes();
            let vault = Vault::open(&db, key).unwrap();
            vault.put(&kp).unwrap();
            db.flush().unwrap();
            bytes
        };

        let db = sled::open(dir.path()).unwrap();
        let vault = Vault::open(&db, SecretKey::from_bytes(&key_bytes).unwrap()).unwrap();
        assert_eq!(vault.current().unwrap().public_key(), kp.public_key());
    }

    #[test]
    fn test_salt_file_roundtrip() {
        let salt_file = SaltFile::create(b"opensesame");
        let parsed = SaltFile::from_bytes(&salt_file.to_bytes()).unwrap();

        assert!(parsed.unlock(b"opensesame").is_ok());
        assert!(matches!(
            parsed.unlock(b"wrong"),
            Err(StoreError::InvalidPassphrase)
        ));
    }

    #[test]
    fn test_salt_file_rejects_short_input() {
        assert!(matches!(
            SaltFile::from_bytes(&[0u8; 10]),
            Err(StoreError::SaltFile(_))
        ));
    }

    #[test]
    fn test_salt_file_rejects_unknown_version() {
        let mut bytes = SaltFile::create(b"x").to_bytes();
        bytes[SALT_SIZE] = b'v';
        bytes[SALT_SIZE + 1] = b'9';
        assert!(matches!(
            SaltFile::from_bytes(&bytes),
            Err(StoreError::SaltFile(_))
        ));
    }

    #[test]
    fn test_salt_file_disk_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.salt");

        let salt_file = SaltFile::create(b"opensesame");
        salt_file.store(&path).unwrap();

        let loaded = SaltFile::load(&path).unwrap();
        let a = salt_file.unlock(b"opensesame").unwrap();
        let b = loaded.unlock(b"opensesame").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_passphrase_lifecycle() {
        let dir = TempDir::new().unwrap();
        let salt_path = dir.path().join("vault.salt");
        let vault_path = dir.path().join("vault");

        let first = KeyPair::generate();
        {
            let salt_file = SaltFile::create(b"opensesame");
            salt_file.store(&salt_path).unwrap();
            let key = salt_file.unlock(b"opensesame").unwrap();

            let db = sled::open(&vault_path).unwrap();
            let vault = Vault::open(&db, key).unwrap();
            vault.put(&first).unwrap();
            db.flush().unwrap();
        }

        // Wrong passphrase is rejected by the verifier, before the vault
        // database is opened at all
        let salt_file = SaltFile::load(&salt_path).unwrap();
        assert!(matches!(
            salt_file.unlock(b"wrong"),
            Err(StoreError::InvalidPassphrase)
        ));

        // Correct passphrase resumes where we left off
        let key = salt_file.unlock(b"opensesame").unwrap();
        let db = sled::open(&vault_path).unwrap();
        let vault = Vault::open(&db, key).unwrap();
        assert_eq!(vault.current().unwrap().public_key(), first.public_key());

        let second = KeyPair::generate();
        vault.put(&second).unwrap();
        assert_eq!(vault.current().unwrap().public_key(), second.public_key());
        assert_eq!(
            vault.get(first.public_key()).unwrap().public_key(),
            first.public_key()
        );
    }

    #[test]
    fn test_unlock_derives_scrypt_key() {
        // The derived key must equal a direct scrypt invocation over the
        // stored salt (fixed parameters are part of the format).
        let salt_file = SaltFile::create(b"opensesame");
        let unlocked = salt_file.unlock(b"opensesame").unwrap();
        let direct = derive_vault_key(b"opensesame", &salt_file.salt).unwrap();
        assert_eq!(unlocked.as_bytes(), direct.as_bytes());
    }
}
