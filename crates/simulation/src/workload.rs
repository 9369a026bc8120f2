//! Deterministic transaction workload.

use std::collections::BTreeMap;
use tendersim_types::{KeyPair, Transaction, ValidatorId};

/// Generates the transaction batch for each proposed block.
///
/// Transaction `i` of the batch at height `h` is sent by validator
/// `(h + i) mod n` and writes `N<sender>/k<i>` inside the sender's own
/// namespace. Nonces increase per sender across the whole run, so no
/// generated transaction is ever a replay.
#[derive(Debug, Clone, Default)]
pub struct Workload {
    txs_per_block: usize,
    next_nonce: BTreeMap<ValidatorId, u64>,
}

impl Workload {
    pub fn new(txs_per_block: usize) -> Self {
        Self {
            txs_per_block,
            next_nonce: BTreeMap::new(),
        }
    }

    /// Sign the batch for `height`. `keys[i]` belongs to `ValidatorId(i)`.
    pub fn next_batch(&mut self, height: u64, keys: &[KeyPair]) -> Vec<Transaction> {
        if keys.is_empty() {
            return Vec::new();
        }
        (0..self.txs_per_block)
            .map(|i| {
                let index = (height as usize + i) % keys.len();
                let sender = ValidatorId(index as u64);
                let nonce = self.next_nonce.entry(sender).or_insert(0);
                let tx = Transaction::new(
                    sender,
                    format!("{sender}/k{i}"),
                    format!("h{height}-n{nonce}"),
                    *nonce,
                    &keys[index],
                );
                *nonce += 1;
                tx
            })
            .collect()
    }
}
