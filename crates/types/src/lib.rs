//! Core types for the tendersim finality simulator.
//!
//! This crate provides the foundational types used throughout the workspace:
//!
//! - **Primitives**: Hash, Ed25519 keys and signatures
//! - **Signing**: Domain-separated, length-prefixed field encoding
//! - **Identifiers**: ValidatorId, VotePhase
//! - **Consensus types**: Transaction, BlockHeader, Block, Vote, LedgerEntry
//!
//! # Design Philosophy
//!
//! This crate does not depend on any other workspace crates, making it the
//! foundation layer.

mod block;
mod crypto;
mod hash;
mod identifiers;
mod transaction;
mod validator;

pub mod signing;

pub use block::{Block, BlockHeader};
pub use crypto::{KeyPair, PublicKey, Signature};
pub use hash::Hash;
pub use identifiers::{ValidatorId, VotePhase};
pub use signing::{DOMAIN_HEADER, DOMAIN_TRANSACTION, DOMAIN_VOTE};
pub use transaction::{Transaction, TransactionId};
pub use validator::{quorum_threshold, ValidatorInfo, ValidatorSet};

use serde::Serialize;

/// A PREVOTE or PRECOMMIT for a candidate block at a height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// Validator who cast this vote.
    pub validator: ValidatorId,
    /// Height of the candidate block.
    pub height: u64,
    /// Hash of the candidate block.
    pub block_hash: Hash,
    /// Voting phase.
    pub phase: VotePhase,
    /// Signature over (validator, height, block_hash, phase).
    pub signature: Signature,
}

impl Vote {
    /// Create and sign a vote.
    pub fn new(
        validator: ValidatorId,
        height: u64,
        block_hash: Hash,
        phase: VotePhase,
        signing_key: &KeyPair,
    ) -> Self {
        let signature =
            signing_key.sign(&signing::vote_message(validator, height, &block_hash, phase));
        Self {
            validator,
            height,
            block_hash,
            phase,
            signature,
        }
    }

    /// Verify against the directory. Unknown validators fail closed.
    pub fn verify(&self, directory: &ValidatorSet) -> bool {
        match directory.public_key(self.validator) {
            Some(pk) => pk.verify(
                &signing::vote_message(self.validator, self.height, &self.block_hash, self.phase),
                &self.signature,
            ),
            None => false,
        }
    }
}

/// One finalized height in a replica's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub height: u64,
    pub block_hash: Hash,
    pub state_commitment: Hash,
}

/// Derive the key seed for validator `index` from a run seed.
///
/// Every run with the same seed produces the same keys, and therefore the
/// same signatures.
pub fn validator_key_seed(run_seed: u64, index: u64) -> [u8; 32] {
    let mut seed_bytes = [0u8; 32];
    let key_seed = run_seed.wrapping_add(index).wrapping_mul(0x517cc1b727220a95);
    seed_bytes[..8].copy_from_slice(&key_seed.to_le_bytes());
    seed_bytes[8..16].copy_from_slice(&index.to_le_bytes());
    seed_bytes
}

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Deterministic keys and a directory for validators `N0..N{n-1}`.
    pub fn test_directory(n: u64) -> (Vec<KeyPair>, ValidatorSet) {
        let keys: Vec<KeyPair> = (0..n)
            .map(|i| KeyPair::from_seed(&validator_key_seed(42, i)))
            .collect();
        let set = ValidatorSet::new(
            keys.iter()
                .enumerate()
                .map(|(i, k)| ValidatorInfo {
                    validator_id: ValidatorId(i as u64),
                    public_key: k.public_key(),
                })
                .collect(),
        );
        (keys, set)
    }
}
