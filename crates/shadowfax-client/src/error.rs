//! Error types for client operations.

use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Cryptographic error (authentication failure, bad key or nonce).
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] shadowfax_crypto::CryptoError),

    /// Envelope protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] shadowfax_protocol::ProtocolError),

    /// JSON encoding or decoding failed.
    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// Network failure talking to the server.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server error {code}: {message}")]
    Server {
        /// HTTP status code.
        code: u16,
        /// Message from the wire error body, if any.
        message: String,
    },

    /// A push received no matching `ok` receipt.
    #[error("Message not acknowledged by server")]
    NotAcknowledged,

    /// The server key may only be bootstrapped over HTTPS.
    #[error("Insecure server URL (https required): {0}")]
    InsecureUrl(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
