//! The relay client.
//!
//! A [`Client`] owns a key pair, the server URL, and the server's public
//! key. Pushes are acknowledged by receipt; pops are lenient at the inner
//! box only - a message that fails to decode or authenticate is reported in
//! [`Inbox::failures`] without hiding the rest of the drain.
//!
//! A pop that succeeds on the server but whose response is lost in transit
//! has already deleted the messages; this at-most-once behavior is
//! deliberate and the client does not retry pops.

use tracing::debug;

use shadowfax_crypto::{KeyPair, PublicKey};
use shadowfax_protocol::{envelope, wire};

use crate::{ClientError, Result};

/// A message drained from the inbox and decrypted end to end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboxMessage {
    /// Base58 nonce / message id.
    pub id: String,
    /// Base58 sender public key.
    pub sender: String,
    /// The decrypted payload.
    pub contents: Vec<u8>,
}

/// A drained message that failed to decode or authenticate.
#[derive(Debug)]
pub struct PopFailure {
    /// Base58 message id as received.
    pub id: String,
    /// Base58 sender as received.
    pub sender: String,
    /// Why the message was dropped.
    pub error: ClientError,
}

/// The outcome of an inbox drain: surviving messages plus per-message
/// failures. One poison message never hides the rest of the inbox.
#[derive(Debug, Default)]
pub struct Inbox {
    /// Successfully decrypted messages.
    pub messages: Vec<InboxMessage>,
    /// Messages dropped with their reasons.
    pub failures: Vec<PopFailure>,
}

/// A shadowfax relay client.
pub struct Client {
    keypair: KeyPair,
    server_url: String,
    server_key: PublicKey,
    http: reqwest::Client,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_url", &self.server_url)
            .field("server_key", &self.server_key)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client with a default HTTP client.
    pub fn new(keypair: KeyPair, server_url: impl Into<String>, server_key: PublicKey) -> Self {
        Self::with_http_client(keypair, server_url, server_key, reqwest::Client::new())
    }

    /// Create a client with a caller-supplied HTTP client.
    pub fn with_http_client(
        keypair: KeyPair,
        server_url: impl Into<String>,
        server_key: PublicKey,
        http: reqwest::Client,
    ) -> Self {
        let mut server_url = server_url.into();
        while server_url.ends_with('/') {
            server_url.pop();
        }
        Self {
            keypair,
            server_url,
            server_key,
            http,
        }
    }

    /// Fetch a server's public key from its `/publickey` endpoint.
    ///
    /// This single value bootstraps the whole envelope protocol, so it may
    /// only travel over a confidential channel: any non-HTTPS URL is
    /// rejected before a network call is issued.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsecureUrl` for a non-HTTPS URL, a transport
    /// error if the fetch fails, or a decode error for a malformed reply.
    pub async fn fetch_server_key(server_url: &str, http: &reqwest::Client) -> Result<PublicKey> {
        if !server_url.to_ascii_lowercase().starts_with("https://") {
            return Err(ClientError::InsecureUrl(server_url.to_string()));
        }
        let url = format!("{}/publickey", server_url.trim_end_matches('/'));
        let response = http.get(url).send().await?;
        let body = read_success(response).await?;
        let parsed: wire::PublicKeyResponse = serde_json::from_slice(&body)?;
        Ok(PublicKey::decode(&parsed.public_key)?)
    }

    /// Push a message to a recipient.
    ///
    /// Seals the plaintext end to end, submits it as a one-element batch,
    /// and succeeds only when a receipt with the matching id reports `ok`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotAcknowledged` if the receipt is missing or
    /// negative, plus the usual crypto/transport/decode errors.
    pub async fn push(&self, recipient: &str, plaintext: &[u8]) -> Result<()> {
        let recipient_key = PublicKey::decode(recipient)?;
        let (nonce, contents) =
            envelope::seal_payload(plaintext, &recipient_key, &self.keypair)?;
        let id = nonce.encode();

        let batch = vec![wire::PushMessage {
            id: id.clone(),
            contents,
            recipient: recipient.to_string(),
        }];
        let payload = serde_json::to_vec(&batch)?;

        let (outer_nonce, message) =
            envelope::seal_request(&payload, &self.server_key, &self.keypair)?;
        let url = format!(
            "{}/outbox/{}",
            self.server_url,
            self.keypair.public_key().encode()
        );
        let response = self.http.post(url).json(&message).send().await?;
        let body = read_success(response).await?;

        let reply = envelope::open_reply(&body, &outer_nonce, &self.server_key, &self.keypair)?;
        let receipts: Vec<wire::PushReceipt> = serde_json::from_slice(&reply)?;

        debug!(id = %id, receipts = receipts.len(), "push acknowledged");
        if receipts.iter().any(|r| r.ok && r.id == id) {
            Ok(())
        } else {
            Err(ClientError::NotAcknowledged)
        }
    }

    /// Drain the inbox.
    ///
    /// Issues an outer-boxed DELETE, opens the reply, and decrypts each
    /// drained message with the sender key and nonce it carries. Messages
    /// failing any decode or authentication step land in
    /// [`Inbox::failures`]; the rest are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the request itself fails; per-message decrypt
    /// failures are non-fatal.
    pub async fn pop(&self) -> Result<Inbox> {
        let (outer_nonce, message) =
            envelope::seal_request(b"", &self.server_key, &self.keypair)?;
        let url = format!(
            "{}/inbox/{}",
            self.server_url,
            self.keypair.public_key().encode()
        );
        let response = self.http.delete(url).json(&message).send().await?;
        let body = read_success(response).await?;

        let reply = envelope::open_reply(&body, &outer_nonce, &self.server_key, &self.keypair)?;
        let popped: Vec<wire::PopMessage> = serde_json::from_slice(&reply)?;

        let mut inbox = Inbox::default();
        for msg in popped {
            match envelope::open_payload(
                &msg.contents,
                &msg.id,
                &msg.sender,
                self.keypair.private_key(),
            ) {
                Ok(contents) => inbox.messages.push(InboxMessage {
                    id: msg.id,
                    sender: msg.sender,
                    contents,
                }),
                Err(err) => {
                    debug!(id = %msg.id, error = %err, "dropping undecryptable message");
                    inbox.failures.push(PopFailure {
                        id: msg.id,
                        sender: msg.sender,
                        error: err.into(),
                    });
                }
            }
        }
        debug!(
            messages = inbox.messages.len(),
            failures = inbox.failures.len(),
            "pop"
        );
        Ok(inbox)
    }

    /// The client's own public key.
    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public_key()
    }
}

/// Read a response body, mapping non-success statuses to `ClientError::Server`.
async fn read_success(response: reqwest::Response) -> Result<Vec<u8>> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        let message = serde_json::from_slice::<wire::WireError>(&body)
            .map(|e| e.message)
            .unwrap_or_default();
        return Err(ClientError::Server {
            code: status.as_u16(),
            message,
        });
    }
    Ok(body.to_vec())
}
