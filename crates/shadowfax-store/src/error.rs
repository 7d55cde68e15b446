//! Error types for storage operations.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Cryptographic error.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] shadowfax_crypto::CryptoError),

    /// The vault has no entries.
    #[error("Empty vault")]
    VaultEmpty,

    /// A vault log entry failed to open.
    #[error("Error opening key pair #{seq}")]
    VaultCorrupt {
        /// Sequence number of the offending log entry.
        seq: u64,
    },

    /// No key pair stored for the given public key.
    #[error("Key pair not found for {0:?}")]
    KeyPairNotFound(String),

    /// No contact entry for the given name or address.
    #[error("Contact not found for {0:?}")]
    ContactNotFound(String),

    /// The passphrase did not match the stored verifier.
    #[error("Invalid passphrase")]
    InvalidPassphrase,

    /// The vault salt file is missing, short, or carries a wrong version.
    #[error("Invalid salt file: {0}")]
    SaltFile(String),

    /// A sequence key could not be decoded.
    #[error("Invalid sequence key")]
    InvalidSequence,

    /// A contact name was empty or otherwise unusable.
    #[error("Invalid contact name")]
    InvalidName,

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sled::transaction::TransactionError<StoreError>> for StoreError {
    fn from(err: sled::transaction::TransactionError<StoreError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => StoreError::Database(e),
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
