//! # shadowfax-protocol
//!
//! Wire formats and the envelope protocol for the shadowfax messaging relay.
//!
//! This crate provides:
//! - **Wire shapes**: the JSON bodies exchanged between client and server
//!   (`Message`, `PushMessage`, `PopMessage`, `PushReceipt`, ...)
//! - **Envelope**: construction and verification of the outer client-server
//!   boxes and the inner recipient-addressed payload box
//!
//! ## Transport Design
//!
//! Every authenticated request is a single outer [`wire::Message`]: a fresh
//! nonce (Base58 in `id`) and a PK-box ciphertext (`contents`) sealed from
//! the client to the server. The reply is the raw ciphertext of the response
//! JSON sealed back with the *same* nonce in the server-to-client direction.
//! Payloads between users are sealed end to end with the recipient's key;
//! the relay never sees user plaintext.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod error;
pub mod wire;

pub use error::{ProtocolError, Result};
