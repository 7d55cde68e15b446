//! Request routing and envelope authentication.
//!
//! Three endpoints:
//!
//! - `GET /publickey` - unauthenticated bootstrap of the server key
//! - `POST /outbox/:sender` - push a batch of addressed messages
//! - `DELETE /inbox/:recipient` - drain the caller's inbox
//!
//! Authenticated endpoints carry a single outer [`wire::Message`]; opening
//! its box against the URL's public key is the entire authentication check.
//! Replies are sealed under the request nonce and written as raw ciphertext
//! bodies. Parse and authentication failures are 400s with a
//! [`wire::WireError`] JSON body; storage failures are 500s.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tracing::{debug, warn};

use shadowfax_crypto::KeyPair;
use shadowfax_protocol::envelope::{self, AuthenticatedRequest};
use shadowfax_protocol::wire;
use shadowfax_store::{AddressedMessage, MailboxStore};

/// Shared state handed to every handler: the relay's long-term key pair
/// and the mailbox store. The key pair is read-only after startup.
pub struct ServerState {
    keypair: KeyPair,
    store: MailboxStore,
}

impl ServerState {
    /// Bundle a key pair and a mailbox store into handler state.
    pub fn new(keypair: KeyPair, store: MailboxStore) -> Self {
        Self { keypair, store }
    }
}

/// Reference-counted [`ServerState`].
pub type SharedState = Arc<ServerState>;

/// Build the relay's router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/publickey", get(public_key))
        .route("/outbox/:sender", post(push))
        .route("/inbox/:recipient", delete(pop))
        .with_state(state)
}

/// `GET /publickey`
async fn public_key(State(state): State<SharedState>) -> Json<wire::PublicKeyResponse> {
    Json(wire::PublicKeyResponse {
        public_key: state.keypair.public_key().encode(),
    })
}

/// `POST /outbox/:sender`
async fn push(
    State(state): State<SharedState>,
    Path(sender): Path<String>,
    body: Bytes,
) -> Response {
    let auth = match authenticate(&state, &sender, &body) {
        Ok(auth) => auth,
        Err(resp) => return resp,
    };

    let batch: Vec<wire::PushMessage> = match serde_json::from_slice(&auth.payload) {
        Ok(batch) => batch,
        Err(err) => {
            warn!(error = %err, "malformed push batch");
            return wire_error(StatusCode::BAD_REQUEST);
        }
    };

    let sender_key = auth.client_key.encode();
    let messages: Vec<AddressedMessage> = batch
        .into_iter()
        .filter(|m| !m.recipient.is_empty())
        .map(|m| AddressedMessage {
            recipient: m.recipient,
            sender: sender_key.clone(),
            id: m.id,
            contents: m.contents,
        })
        .collect();

    // One receipt per unique id, preferring a prior ok=true.
    let mut order: Vec<String> = Vec::new();
    let mut outcome: HashMap<String, bool> = HashMap::new();
    for message in &messages {
        if outcome.get(&message.id) == Some(&true) {
            continue;
        }
        let ok = match state.store.push(message) {
            Ok(()) => true,
            Err(err) => {
                warn!(id = %message.id, error = %err, "push failed");
                false
            }
        };
        if !outcome.contains_key(&message.id) {
            order.push(message.id.clone());
        }
        outcome.insert(message.id.clone(), ok);
    }
    let receipts: Vec<wire::PushReceipt> = order
        .into_iter()
        .map(|id| {
            let ok = outcome[&id];
            wire::PushReceipt { id, ok }
        })
        .collect();

    debug!(sender = %sender_key, receipts = receipts.len(), "push");
    seal_response(&state, &auth, &receipts)
}

/// `DELETE /inbox/:recipient`
async fn pop(
    State(state): State<SharedState>,
    Path(recipient): Path<String>,
    body: Bytes,
) -> Response {
    let auth = match authenticate(&state, &recipient, &body) {
        Ok(auth) => auth,
        Err(resp) => return resp,
    };

    let drained = match state.store.pop(&auth.client_key.encode()) {
        Ok(drained) => drained,
        Err(err) => {
            warn!(error = %err, "pop failed");
            return wire_error(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let messages: Vec<wire::PopMessage> = drained
        .into_iter()
        .map(|m| wire::PopMessage {
            id: m.id,
            contents: m.contents,
            sender: m.sender,
        })
        .collect();

    debug!(recipient = %auth.client_key, messages = messages.len(), "pop");
    seal_response(&state, &auth, &messages)
}

/// Parse the outer envelope and authenticate it against the URL key.
fn authenticate(
    state: &ServerState,
    client_key_b58: &str,
    body: &[u8],
) -> Result<AuthenticatedRequest, Response> {
    let message: wire::Message = serde_json::from_slice(body).map_err(|err| {
        warn!(error = %err, "malformed envelope");
        wire_error(StatusCode::BAD_REQUEST)
    })?;

    envelope::open_request(&message, client_key_b58, &state.keypair).map_err(|err| {
        warn!(client = %client_key_b58, error = %err, "authentication failed");
        wire_error(StatusCode::BAD_REQUEST)
    })
}

/// Encode a response as JSON and seal it under the request nonce.
fn seal_response<T: serde::Serialize>(
    state: &ServerState,
    auth: &AuthenticatedRequest,
    response: &T,
) -> Response {
    let json = match serde_json::to_vec(response) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "response encoding failed");
            return wire_error(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    match envelope::seal_reply(&json, auth, &state.keypair) {
        Ok(sealed) => (StatusCode::OK, sealed).into_response(),
        Err(err) => {
            warn!(error = %err, "response sealing failed");
            wire_error(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// A status code paired with its [`wire::Error`] JSON body.
fn wire_error(status: StatusCode) -> Response {
    (status, Json(wire::WireError::from_code(status.as_u16()))).into_response()
}
