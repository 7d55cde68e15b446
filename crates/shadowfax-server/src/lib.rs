//! # shadowfax-server
//!
//! The relay side of the shadowfax messaging protocol: an axum handler
//! that authenticates envelope requests, routes the three endpoints, and
//! stores messages in the mailbox store until their recipients drain them.
//!
//! The `sfd` binary in this crate wires the handler to a listener; TLS
//! termination is a deployment concern in front of it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod handler;

pub use handler::{router, ServerState, SharedState};
