//! Replay-protected key/value application state.

use std::collections::{BTreeMap, BTreeSet};
use tendersim_types::{Hash, Transaction, TransactionId, ValidatorSet};
use thiserror::Error;
use tracing::trace;

/// Why a transaction had no effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("invalid signature from {0}")]
    InvalidSignature(tendersim_types::ValidatorId),

    #[error("replayed transaction {}:{}", .0.sender, .0.nonce)]
    Replay(TransactionId),

    #[error("{sender} may not write key {key}")]
    OwnershipViolation {
        sender: tendersim_types::ValidatorId,
        key: String,
    },
}

/// Outcome of executing a batch of transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Key/value store plus the set of executed transaction identities.
///
/// Each replica owns its own instance; replicas converge by replaying the
/// same transactions in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    kv: BTreeMap<String, String>,
    executed: BTreeSet<TransactionId>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a transaction whose signature has already been checked.
    ///
    /// Returns `false` (and changes nothing) on replay or ownership violation.
    pub fn apply(&mut self, tx: &Transaction) -> bool {
        self.try_apply(tx).is_ok()
    }

    /// Like [`apply`](Self::apply), reporting the rejection reason.
    pub fn try_apply(&mut self, tx: &Transaction) -> Result<(), TransactionError> {
        if !tx.is_owned_write() {
            return Err(TransactionError::OwnershipViolation {
                sender: tx.sender,
                key: tx.key.clone(),
            });
        }
        if !self.executed.insert(tx.id()) {
            return Err(TransactionError::Replay(tx.id()));
        }
        self.kv.insert(tx.key.clone(), tx.value.clone());
        Ok(())
    }

    /// Verify the signature, then apply.
    pub fn execute(
        &mut self,
        tx: &Transaction,
        directory: &ValidatorSet,
    ) -> Result<(), TransactionError> {
        if !tx.verify_signature(directory) {
            return Err(TransactionError::InvalidSignature(tx.sender));
        }
        self.try_apply(tx)
    }

    /// Execute transactions in order, skipping the invalid ones.
    pub fn execute_all(
        &mut self,
        transactions: &[Transaction],
        directory: &ValidatorSet,
    ) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();
        for tx in transactions {
            match self.execute(tx, directory) {
                Ok(()) => summary.applied += 1,
                Err(e) => {
                    trace!(error = %e, "Skipping transaction");
                    summary.rejected += 1;
                }
            }
        }
        summary
    }

    /// Deterministic commitment to the current key/value contents.
    pub fn commit(&self) -> Hash {
        Hash::from_bytes(&encode_kv_state(
            self.kv.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.kv.get(key).map(String::as_str)
    }

    pub fn has_executed(&self, id: &TransactionId) -> bool {
        self.executed.contains(id)
    }

    pub fn len(&self) -> usize {
        self.kv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kv.is_empty()
    }
}

/// Canonical encoding of a key/value map.
///
/// Keys are sorted before encoding, so insertion order never affects the
/// output. Each key and value is `u32` BE length-prefixed.
pub fn encode_kv_state<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<u8> {
    let mut sorted: Vec<(&str, &str)> = entries.into_iter().collect();
    sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut out = Vec::new();
    for (k, v) in sorted {
        out.extend_from_slice(&(k.len() as u32).to_be_bytes());
        out.extend_from_slice(k.as_bytes());
        out.extend_from_slice(&(v.len() as u32).to_be_bytes());
        out.extend_from_slice(v.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tendersim_types::test_utils::test_directory;
    use tendersim_types::ValidatorId;

    #[test]
    fn test_apply_and_commit() {
        let (keys, directory) = test_directory(1);
        let mut state = AppState::new();
        let tx = Transaction::new(ValidatorId(0), "N0/balance", "100", 1, &keys[0]);

        assert!(state.execute(&tx, &directory).is_ok());
        assert_eq!(state.get("N0/balance"), Some("100"));
        let commit1 = state.commit();

        // Same identity again is a replay.
        assert_eq!(
            state.execute(&tx, &directory),
            Err(TransactionError::Replay(tx.id()))
        );
        assert_eq!(state.commit(), commit1);
    }

    #[test]
    fn test_same_key_new_nonce_is_accepted() {
        let (keys, directory) = test_directory(1);
        let mut state = AppState::new();
        let first = Transaction::new(ValidatorId(0), "N0/counter", "1", 1, &keys[0]);
        let second = Transaction::new(ValidatorId(0), "N0/counter", "2", 2, &keys[0]);

        assert!(state.execute(&first, &directory).is_ok());
        assert!(state.execute(&second, &directory).is_ok());
        assert_eq!(state.get("N0/counter"), Some("2"));
    }

    #[test]
    fn test_ownership_rejected_even_with_valid_signature() {
        let (keys, directory) = test_directory(2);
        let mut state = AppState::new();
        let tx = Transaction::new(ValidatorId(0), "N1/balance", "100", 1, &keys[0]);

        assert!(tx.verify_signature(&directory));
        assert!(!state.apply(&tx));
        assert!(matches!(
            state.execute(&tx, &directory),
            Err(TransactionError::OwnershipViolation { .. })
        ));
        assert!(state.is_empty());
        // A rejected transaction does not consume its nonce.
        assert!(!state.has_executed(&tx.id()));
    }

    #[test]
    fn test_bad_signature_rejected() {
        let (keys, directory) = test_directory(2);
        let mut state = AppState::new();
        let tx = Transaction::new(ValidatorId(0), "N0/x", "1", 1, &keys[1]);

        assert_eq!(
            state.execute(&tx, &directory),
            Err(TransactionError::InvalidSignature(ValidatorId(0)))
        );
        assert!(state.is_empty());
    }

    #[test]
    fn test_execute_all_skips_invalid() {
        let (keys, directory) = test_directory(2);
        let mut state = AppState::new();
        let txs = vec![
            Transaction::new(ValidatorId(0), "N0/a", "1", 1, &keys[0]),
            Transaction::new(ValidatorId(0), "N1/a", "1", 2, &keys[0]),
            Transaction::new(ValidatorId(1), "N1/a", "1", 1, &keys[1]),
            Transaction::new(ValidatorId(0), "N0/b", "1", 1, &keys[0]),
        ];

        let summary = state.execute_all(&txs, &directory);
        assert_eq!(summary, ExecutionSummary { applied: 2, rejected: 2 });
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_encoding_is_order_independent() {
        let forward = encode_kv_state([("a", "1"), ("b", "2")]);
        let backward = encode_kv_state([("b", "2"), ("a", "1")]);
        assert_eq!(forward, backward);

        let mut map = HashMap::new();
        map.insert("b".to_string(), "2".to_string());
        map.insert("a".to_string(), "1".to_string());
        let from_map = encode_kv_state(map.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        assert_eq!(forward, from_map);
        assert_eq!(Hash::from_bytes(&forward), Hash::from_bytes(&from_map));
    }

    #[test]
    fn test_commit_independent_of_insertion_order() {
        let (keys, directory) = test_directory(1);
        let a = Transaction::new(ValidatorId(0), "N0/a", "1", 1, &keys[0]);
        let b = Transaction::new(ValidatorId(0), "N0/b", "2", 2, &keys[0]);

        let mut s1 = AppState::new();
        s1.execute_all(&[a.clone(), b.clone()], &directory);
        let mut s2 = AppState::new();
        s2.execute_all(&[b, a], &directory);

        assert_eq!(s1.commit(), s2.commit());
    }
}
