//! # shadowfax-store
//!
//! Persistent storage for the shadowfax messaging relay, backed by sled.
//!
//! This crate provides:
//! - **MailboxStore**: the server's per-recipient message queues with
//!   transactional push and drain-on-pop
//! - **Vault**: the client's encrypted, append-only key-pair log
//! - **Contacts**: a local name-to-address index with append-only history
//!
//! ## Layout
//!
//! Namespaces are sled trees. The mailbox keeps every entry in one tree
//! under fixed-width composite keys; the vault and contacts use the
//! append-only `seq -> value` log pattern with minimum-width big-endian
//! sequence keys.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contacts;
pub mod error;
pub mod mailbox;
pub mod seq;
pub mod vault;

pub use contacts::{ContactInfo, Contacts};
pub use error::{Result, StoreError};
pub use mailbox::{AddressedMessage, MailboxStore};
pub use vault::{SaltFile, Vault};
