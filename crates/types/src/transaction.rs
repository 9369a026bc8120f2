//! Signed key/value transactions.

use crate::signing::transaction_message;
use crate::{Hash, KeyPair, Signature, ValidatorId, ValidatorSet};
use serde::Serialize;

/// Replay-protection identity of a transaction.
///
/// A sender may write the same key any number of times, but each nonce can
/// only ever be executed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TransactionId {
    pub sender: ValidatorId,
    pub nonce: u64,
}

/// A signed write of `value` to `key`.
///
/// Invariant enforced at execution time: `key` must live under the
/// sender's namespace (`"<sender>/"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub sender: ValidatorId,
    pub key: String,
    pub value: String,
    pub nonce: u64,
    pub signature: Signature,
}

impl Transaction {
    /// Create and sign a transaction.
    pub fn new(
        sender: ValidatorId,
        key: impl Into<String>,
        value: impl Into<String>,
        nonce: u64,
        signing_key: &KeyPair,
    ) -> Self {
        let key = key.into();
        let value = value.into();
        let signature = signing_key.sign(&transaction_message(sender, &key, &value, nonce));
        Self {
            sender,
            key,
            value,
            nonce,
            signature,
        }
    }

    pub fn id(&self) -> TransactionId {
        TransactionId {
            sender: self.sender,
            nonce: self.nonce,
        }
    }

    /// Content hash over the signed fields.
    pub fn hash(&self) -> Hash {
        Hash::from_bytes(&transaction_message(
            self.sender,
            &self.key,
            &self.value,
            self.nonce,
        ))
    }

    /// Whether the key is inside the sender's namespace.
    pub fn is_owned_write(&self) -> bool {
        self.key.starts_with(&self.sender.namespace())
    }

    /// Check the signature against the sender's registered key.
    ///
    /// Unknown senders fail closed.
    pub fn verify_signature(&self, directory: &ValidatorSet) -> bool {
        match directory.public_key(self.sender) {
            Some(pk) => pk.verify(
                &transaction_message(self.sender, &self.key, &self.value, self.nonce),
                &self.signature,
            ),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_directory;

    #[test]
    fn test_signed_transaction_verifies() {
        let (keys, directory) = test_directory(2);
        let tx = Transaction::new(ValidatorId(0), "N0/data", "v", 1, &keys[0]);
        assert!(tx.verify_signature(&directory));
        assert!(tx.is_owned_write());
    }

    #[test]
    fn test_wrong_key_fails() {
        let (keys, directory) = test_directory(2);
        // Signed by N1's key but claims to be from N0.
        let tx = Transaction::new(ValidatorId(0), "N0/data", "v", 1, &keys[1]);
        assert!(!tx.verify_signature(&directory));
    }

    #[test]
    fn test_unknown_sender_fails_closed() {
        let (keys, directory) = test_directory(2);
        let tx = Transaction::new(ValidatorId(9), "N9/data", "v", 1, &keys[0]);
        assert!(!tx.verify_signature(&directory));
    }

    #[test]
    fn test_tampered_value_fails() {
        let (keys, directory) = test_directory(1);
        let mut tx = Transaction::new(ValidatorId(0), "N0/data", "v", 1, &keys[0]);
        tx.value = "w".to_string();
        assert!(!tx.verify_signature(&directory));
    }

    #[test]
    fn test_namespace_prefix_must_include_separator() {
        let (keys, _) = test_directory(1);
        let tx = Transaction::new(ValidatorId(0), "N01/data", "v", 1, &keys[0]);
        assert!(!tx.is_owned_write());
    }

    #[test]
    fn test_identity_is_sender_and_nonce() {
        let (keys, _) = test_directory(1);
        let a = Transaction::new(ValidatorId(0), "N0/a", "1", 5, &keys[0]);
        let b = Transaction::new(ValidatorId(0), "N0/b", "2", 5, &keys[0]);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.hash(), b.hash());
    }
}
