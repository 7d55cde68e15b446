//! End-to-end tests: a real client against a real relay listener.

use std::sync::Arc;

use tempfile::TempDir;

use shadowfax_client::{Client, ClientError};
use shadowfax_crypto::{KeyPair, Nonce, PublicKey};
use shadowfax_server::{router, ServerState};
use shadowfax_store::{AddressedMessage, MailboxStore};

/// Spin up a relay on an ephemeral port, returning its URL, public key,
/// and a handle on the backing store.
async fn spawn_relay() -> (String, PublicKey, MailboxStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = sled::open(dir.path()).unwrap();
    let store = MailboxStore::open(&db).unwrap();

    let keypair = KeyPair::generate();
    let server_key = keypair.public_key().clone();
    let state = Arc::new(ServerState::new(keypair, store.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    (format!("http://{addr}"), server_key, store, dir)
}

#[tokio::test]
async fn round_trip() {
    let (url, server_key, _store, _dir) = spawn_relay().await;

    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let bob_addr = bob.public_key().encode();
    let alice_addr = alice.public_key().encode();

    let alice_client = Client::new(alice, &url, server_key.clone());
    let bob_client = Client::new(bob, &url, server_key);

    alice_client.push(&bob_addr, b"hello world").await.unwrap();

    let inbox = bob_client.pop().await.unwrap();
    assert!(inbox.failures.is_empty());
    assert_eq!(inbox.messages.len(), 1);
    assert_eq!(inbox.messages[0].sender, alice_addr);
    assert_eq!(inbox.messages[0].contents, b"hello world");
    // The id is the Base58 nonce of the inner box
    assert!(Nonce::decode(&inbox.messages[0].id).is_ok());

    // A second drain is empty
    let inbox = bob_client.pop().await.unwrap();
    assert!(inbox.messages.is_empty());
    assert!(inbox.failures.is_empty());
}

#[tokio::test]
async fn poison_message_does_not_hide_inbox() {
    let (url, server_key, store, _dir) = spawn_relay().await;

    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let bob_addr = bob.public_key().encode();

    let alice_client = Client::new(alice, &url, server_key.clone());
    alice_client.push(&bob_addr, b"the real message").await.unwrap();

    // Plant a message whose contents will not authenticate
    let stranger = KeyPair::generate();
    store
        .push(&AddressedMessage {
            recipient: bob_addr.clone(),
            sender: stranger.public_key().encode(),
            id: Nonce::generate().encode(),
            contents: b"garbage that is not a box".to_vec(),
        })
        .unwrap();

    let bob_client = Client::new(bob, &url, server_key);
    let inbox = bob_client.pop().await.unwrap();

    assert_eq!(inbox.messages.len(), 1);
    assert_eq!(inbox.messages[0].contents, b"the real message");
    assert_eq!(inbox.failures.len(), 1);
    assert!(matches!(
        inbox.failures[0].error,
        ClientError::Protocol(_) | ClientError::Crypto(_)
    ));
}

#[tokio::test]
async fn push_to_malformed_recipient_fails_client_side() {
    let (url, server_key, _store, _dir) = spawn_relay().await;

    let alice = KeyPair::generate();
    let client = Client::new(alice, &url, server_key);

    let result = client.push("not-a-valid-address", b"x").await;
    assert!(matches!(result, Err(ClientError::Crypto(_))));
}

#[tokio::test]
async fn push_with_wrong_server_key_is_rejected() {
    let (url, _server_key, _store, _dir) = spawn_relay().await;

    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let imposter = KeyPair::generate();

    // Alice was handed the wrong server key; the relay cannot open her
    // envelope and answers 400.
    let client = Client::new(alice, &url, imposter.public_key().clone());
    let result = client.push(&bob.public_key().encode(), b"x").await;
    assert!(matches!(result, Err(ClientError::Server { code: 400, .. })));
}

#[tokio::test]
async fn mailboxes_are_isolated() {
    let (url, server_key, _store, _dir) = spawn_relay().await;

    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let carol = KeyPair::generate();
    let bob_addr = bob.public_key().encode();

    let alice_client = Client::new(alice, &url, server_key.clone());
    alice_client.push(&bob_addr, b"for bob only").await.unwrap();

    let carol_client = Client::new(carol, &url, server_key.clone());
    let inbox = carol_client.pop().await.unwrap();
    assert!(inbox.messages.is_empty());

    let bob_client = Client::new(bob, &url, server_key);
    let inbox = bob_client.pop().await.unwrap();
    assert_eq!(inbox.messages.len(), 1);
}
