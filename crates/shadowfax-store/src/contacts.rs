//! The local contact book: names for public keys.
//!
//! Two kinds of namespaces:
//!
//! - `contacts`: `public_key_bytes -> latest_name_bytes`
//! - `contact_log:<name>`: `seq -> public_key_bytes`, the append-only
//!   history of addresses assigned to a name
//!
//! Readers only consult the latest history entry; the history itself is
//! kept for forward compatibility. Re-assigning a name appends rather than
//! overwrites.

use sled::transaction::{ConflictableTransactionError, Transactional};
use sled::Tree;

use shadowfax_crypto::PublicKey;

use crate::{seq, Result, StoreError};

/// Tree name for the latest-name index.
const CONTACTS_TREE: &str = "contacts";

/// Tree-name prefix for per-name history namespaces.
const CONTACT_LOG_PREFIX: &str = "contact_log:";

/// A named address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactInfo {
    /// The locally assigned name.
    pub name: String,
    /// The address the name currently points at.
    pub address: PublicKey,
}

/// The contact book.
#[derive(Clone)]
pub struct Contacts {
    db: sled::Db,
    names: Tree,
}

impl std::fmt::Debug for Contacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contacts").finish_non_exhaustive()
    }
}

impl Contacts {
    /// Open the contact book inside a sled database.
    ///
    /// # Errors
    ///
    /// Returns an error if the index tree cannot be opened.
    pub fn open(db: &sled::Db) -> Result<Self> {
        let names = db.open_tree(CONTACTS_TREE)?;
        Ok(Self {
            db: db.clone(),
            names,
        })
    }

    /// Assign a public key to a name, superseding any prior assignment.
    ///
    /// # Errors
    ///
    /// Rejects an empty name; otherwise fails only on database errors.
    pub fn put(&self, name: &str, key: &PublicKey) -> Result<()> {
        if name.is_empty() {
            return Err(StoreError::InvalidName);
        }

        let history = self.history_tree(name)?;
        let next = match last_history_entry(&history)? {
            Some((seq_bytes, _)) => seq::decode(&seq_bytes)? + 1,
            None => 1,
        };
        let seq_bytes = seq::encode(next);

        (&self.names, &history)
            .transaction(|(names_tx, history_tx)| {
                names_tx.insert(key.as_bytes().as_slice(), name.as_bytes())?;
                history_tx.insert(seq_bytes.as_slice(), key.as_bytes().as_slice())?;
                Ok::<_, ConflictableTransactionError<StoreError>>(())
            })
            .map_err(StoreError::from)?;
        Ok(())
    }

    /// Get the latest public key assigned to a name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ContactNotFound` if the name has no history.
    pub fn key(&self, name: &str) -> Result<PublicKey> {
        let history = self.history_tree(name)?;
        let (_, key_bytes) = last_history_entry(&history)?
            .ok_or_else(|| StoreError::ContactNotFound(name.to_string()))?;
        Ok(PublicKey::from_bytes(&key_bytes)?)
    }

    /// Get the latest name assigned to a public key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ContactNotFound` if the key has no name.
    pub fn name(&self, key: &PublicKey) -> Result<String> {
        let name = self
            .names
            .get(key.as_bytes())?
            .ok_or_else(|| StoreError::ContactNotFound(key.encode()))?;
        Ok(String::from_utf8_lossy(&name).into_owned())
    }

    /// List the current name assignments, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns a database error if a history namespace cannot be read.
    pub fn current(&self) -> Result<Vec<ContactInfo>> {
        let mut result = Vec::new();
        for tree_name in self.db.tree_names() {
            let Some(name) = tree_name
                .strip_prefix(CONTACT_LOG_PREFIX.as_bytes())
                .map(|n| String::from_utf8_lossy(n).into_owned())
            else {
                continue;
            };
            let history = self.db.open_tree(&tree_name)?;
            let Some((_, key_bytes)) = last_history_entry(&history)? else {
                continue;
            };
            result.push(ContactInfo {
                name,
                address: PublicKey::from_bytes(&key_bytes)?,
            });
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn history_tree(&self, name: &str) -> Result<Tree> {
        Ok(self
            .db
            .open_tree(format!("{CONTACT_LOG_PREFIX}{name}").as_bytes())?)
    }
}

/// Find the history entry with the numerically largest sequence.
fn last_history_entry(tree: &Tree) -> Result<Option<(sled::IVec, sled::IVec)>> {
    let mut last: Option<(sled::IVec, sled::IVec)> = None;
    for entry in tree.iter() {
        let (key, value) = entry?;
        let newer = match &last {
            Some((best, _)) => seq::cmp(&key, best).is_gt(),
            None => true,
        };
        if newer {
            last = Some((key, value));
        }
    }
    Ok(last)
}
