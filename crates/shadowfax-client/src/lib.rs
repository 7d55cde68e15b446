//! # shadowfax-client
//!
//! The client side of the shadowfax messaging relay: issue encrypted
//! requests, verify push receipts, and drain the inbox end to end.
//!
//! All requests ride the envelope protocol: the client seals each request
//! to the server under a fresh nonce and opens the reply with the same
//! nonce. Message payloads are sealed to their recipients before they ever
//! reach the transport, so the relay only handles ciphertext.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;

pub use client::{Client, Inbox, InboxMessage, PopFailure};
pub use error::{ClientError, Result};
