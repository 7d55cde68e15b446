//! Error types for protocol operations.

use thiserror::Error;

/// Errors that can occur during protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Cryptographic error (authentication failure, bad key or nonce).
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] shadowfax_crypto::CryptoError),

    /// JSON encoding or decoding failed.
    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
