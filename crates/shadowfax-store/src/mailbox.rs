//! The server-side mailbox store.
//!
//! Every stored message lives in one `messages` tree under a fixed-width
//! composite key:
//!
//! ```text
//! recipient public key (32) || sender public key (32) || nonce (24)
//! ```
//!
//! Lexicographic order over the composite key gives the drain order the
//! protocol promises: across senders by sender key bytes, within a sender
//! by nonce bytes (effectively random). A pop collects the recipient's
//! prefix and deletes every collected entry in one transaction, so a drain
//! either commits fully or leaves the mailbox untouched.
//!
//! Pushes and pops for the same recipient serialize on a sharded
//! per-recipient lock held for the whole operation, so a concurrent push
//! lands entirely before or entirely after a pop's scan-and-delete - it
//! can never split a pop's view of the mailbox.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shadowfax_crypto::{Nonce, PublicKey, NONCE_SIZE, PUBLIC_KEY_SIZE};
use sled::transaction::ConflictableTransactionError;
use sled::Tree;

use crate::{Result, StoreError};

/// Tree name for stored messages.
const MESSAGES_TREE: &str = "messages";

/// Width of a composite mailbox key.
const KEY_SIZE: usize = PUBLIC_KEY_SIZE + PUBLIC_KEY_SIZE + NONCE_SIZE;

/// Number of recipient lock shards.
const LOCK_SHARDS: usize = 16;

/// A message queued for a recipient, tagged with its sender.
///
/// `recipient` and `sender` are Base58 public keys; `id` is the Base58
/// nonce that sealed `contents` end to end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressedMessage {
    /// Base58 recipient public key.
    pub recipient: String,
    /// Base58 sender public key.
    pub sender: String,
    /// Base58 nonce / message id.
    pub id: String,
    /// End-to-end ciphertext; opaque to the store.
    pub contents: Vec<u8>,
}

/// The relay's message store.
///
/// Push and pop are the only operations; messages live from push commit
/// until the matching pop commits. Operations on the same recipient are
/// linearized by the recipient's lock shard.
#[derive(Clone)]
pub struct MailboxStore {
    tree: Tree,
    locks: Arc<Vec<Mutex<()>>>,
}

impl std::fmt::Debug for MailboxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxStore").finish_non_exhaustive()
    }
}

impl MailboxStore {
    /// Open the mailbox store inside a sled database.
    ///
    /// # Errors
    ///
    /// Returns an error if the messages tree cannot be opened.
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree(MESSAGES_TREE)?;
        let locks: Arc<Vec<Mutex<()>>> =
            Arc::new((0..LOCK_SHARDS).map(|_| Mutex::new(())).collect());
        Ok(Self { tree, locks })
    }

    /// Acquire the lock shard guarding a recipient's mailbox.
    ///
    /// Recipient keys are uniformly random curve points, so the first key
    /// byte distributes recipients evenly across shards.
    fn lock_recipient(&self, recipient: &PublicKey) -> MutexGuard<'_, ()> {
        let shard = recipient.as_bytes()[0] as usize % LOCK_SHARDS;
        self.locks[shard]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a message for its recipient.
    ///
    /// # Errors
    ///
    /// Returns an encoding error if the recipient, sender, or id are not
    /// valid Base58 forms of a key or nonce, or a database error if the
    /// write fails. The write is atomic and serializes with any pop that
    /// is draining the same recipient.
    pub fn push(&self, msg: &AddressedMessage) -> Result<()> {
        let recipient = PublicKey::decode(&msg.recipient)?;
        let sender = PublicKey::decode(&msg.sender)?;
        let nonce = Nonce::decode(&msg.id)?;

        let key = compose_key(&recipient, &sender, &nonce);
        let _guard = self.lock_recipient(&recipient);
        self.tree.insert(&key[..], msg.contents.as_slice())?;
        Ok(())
    }

    /// Drain every message addressed to a recipient.
    ///
    /// Messages are returned across senders in sender-key order and within
    /// a sender in nonce order, then deleted in a single transaction.
    /// Stray entries of the wrong width under the recipient's prefix are
    /// cleaned up and skipped. The recipient's lock is held from scan
    /// through deletion, so a concurrent push to this recipient lands
    /// entirely before or entirely after the drain. On error the
    /// transaction rolls back and the pop can be retried.
    ///
    /// # Errors
    ///
    /// Returns an encoding error for an invalid recipient key, or a
    /// database error if the scan or the deletion transaction fails.
    pub fn pop(&self, recipient: &str) -> Result<Vec<AddressedMessage>> {
        let recipient_key = PublicKey::decode(recipient)?;
        let _guard = self.lock_recipient(&recipient_key);

        let mut messages = Vec::new();
        let mut doomed: Vec<sled::IVec> = Vec::new();

        for entry in self.tree.scan_prefix(recipient_key.as_bytes()) {
            let (key, value) = entry?;
            doomed.push(key.clone());
            if key.len() != KEY_SIZE {
                // Stray entry where a sender/nonce pair was expected
                continue;
            }
            let sender = &key[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE * 2];
            let nonce = &key[PUBLIC_KEY_SIZE * 2..];
            messages.push(AddressedMessage {
                recipient: recipient.to_string(),
                sender: PublicKey::from_bytes(sender)?.encode(),
                id: Nonce::from_bytes(nonce)?.encode(),
                contents: value.to_vec(),
            });
        }

        self.tree
            .transaction(|tx| {
                for key in &doomed {
                    tx.remove(key.clone())?;
                }
                Ok::<_, ConflictableTransactionError<StoreError>>(())
            })
            .map_err(StoreError::from)?;

        Ok(messages)
    }
}

fn compose_key(recipient: &PublicKey, sender: &PublicKey, nonce: &Nonce) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    key[..PUBLIC_KEY_SIZE].copy_from_slice(recipient.as_bytes());
    key[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE * 2].copy_from_slice(sender.as_bytes());
    key[PUBLIC_KEY_SIZE * 2..].copy_from_slice(nonce.as_bytes());
    key
}
