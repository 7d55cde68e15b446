//! The envelope protocol: outer transport boxes and inner payload boxes.
//!
//! ## Outer envelope (client <-> server)
//!
//! A request seals its payload from the client's key pair to the server's
//! public key under a fresh nonce, and ships as a [`wire::Message`] whose
//! `id` is the Base58 nonce. The server authenticates the caller by opening
//! the box against the public key named in the URL path; the reply is sealed
//! with the *same* nonce in the server-to-client direction and written as a
//! raw ciphertext body. The two directions derive distinct shared-key usage,
//! so the reply is not a nonce reuse - but the contract must be preserved
//! verbatim or clients cannot open replies.
//!
//! ## Inner payload (sender <-> recipient)
//!
//! A pushed message's contents are sealed end to end from the sender's key
//! pair to the recipient's public key; the nonce doubles as the message id.
//! The relay only ever handles this ciphertext.

use shadowfax_crypto::{box_open, box_seal, KeyPair, Nonce, PrivateKey, PublicKey};

use crate::wire;
use crate::Result;

/// An outer envelope opened and authenticated by the server.
///
/// Holds everything a handler needs: the authenticated caller key, the
/// request nonce (reused to seal the reply), and the decrypted payload.
#[derive(Debug)]
pub struct AuthenticatedRequest {
    /// The caller's public key, proven by the successful box open.
    pub client_key: PublicKey,
    /// The request nonce.
    pub nonce: Nonce,
    /// The decrypted request payload (may be empty).
    pub payload: Vec<u8>,
}

/// Seal a request payload into an outer [`wire::Message`].
///
/// Generates a fresh nonce and returns it together with the message; the
/// caller keeps the nonce to open the reply.
///
/// # Errors
///
/// Returns an error if sealing fails.
pub fn seal_request(
    payload: &[u8],
    server_key: &PublicKey,
    client: &KeyPair,
) -> Result<(Nonce, wire::Message)> {
    let nonce = Nonce::generate();
    let contents = box_seal(payload, &nonce, server_key, client.private_key())?;
    let message = wire::Message {
        id: nonce.encode(),
        contents,
    };
    Ok((nonce, message))
}

/// Open a raw reply body sealed by the server under the request nonce.
///
/// # Errors
///
/// Returns an authentication error if the body was not sealed by the server
/// for this client under `nonce`.
pub fn open_reply(
    body: &[u8],
    nonce: &Nonce,
    server_key: &PublicKey,
    client: &KeyPair,
) -> Result<Vec<u8>> {
    Ok(box_open(body, nonce, server_key, client.private_key())?)
}

/// Authenticate an outer envelope on the server side.
///
/// Decodes the caller key from its Base58 URL form and the nonce from the
/// message id, then opens the box with the server's private key. A
/// successful open is the authentication check: it proves the caller holds
/// the private half of the URL key.
///
/// # Errors
///
/// Returns an error on a malformed key or nonce, or if the box fails to
/// authenticate.
pub fn open_request(
    message: &wire::Message,
    client_key_b58: &str,
    server: &KeyPair,
) -> Result<AuthenticatedRequest> {
    let client_key = PublicKey::decode(client_key_b58)?;
    let nonce = Nonce::decode(&message.id)?;
    let payload = box_open(&message.contents, &nonce, &client_key, server.private_key())?;
    Ok(AuthenticatedRequest {
        client_key,
        nonce,
        payload,
    })
}

/// Seal a reply to an authenticated request.
///
/// Reuses the request nonce in the server-to-client direction; the result is
/// written as the raw response body.
///
/// # Errors
///
/// Returns an error if sealing fails.
pub fn seal_reply(
    response: &[u8],
    request: &AuthenticatedRequest,
    server: &KeyPair,
) -> Result<Vec<u8>> {
    Ok(box_seal(
        response,
        &request.nonce,
        &request.client_key,
        server.private_key(),
    )?)
}

/// Seal a user payload end to end for a recipient.
///
/// Returns the nonce (whose Base58 form is the message id) and the
/// ciphertext.
///
/// # Errors
///
/// Returns an error if sealing fails.
pub fn seal_payload(
    plaintext: &[u8],
    recipient: &PublicKey,
    sender: &KeyPair,
) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::generate();
    let contents = box_seal(plaintext, &nonce, recipient, sender.private_key())?;
    Ok((nonce, contents))
}

/// Open an end-to-end payload from a drained inbox message.
///
/// `id` and `sender` are the Base58 forms carried by the [`wire::PopMessage`].
///
/// # Errors
///
/// Returns an error on a malformed id or sender key, or if the ciphertext
/// does not authenticate.
pub fn open_payload(
    ciphertext: &[u8],
    id: &str,
    sender_b58: &str,
    own_private: &PrivateKey,
) -> Result<Vec<u8>> {
    let nonce = Nonce::decode(id)?;
    let sender_key = PublicKey::decode(sender_b58)?;
    Ok(box_open(ciphertext, &nonce, &sender_key, own_private)?)
}
