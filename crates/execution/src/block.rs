//! Block construction and structural verification.

use crate::state::AppState;
use tendersim_types::{Block, BlockHeader, Hash, KeyPair, Transaction, ValidatorId, ValidatorSet};
use thiserror::Error;

/// Why a block failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("unknown proposer {0}")]
    UnknownProposer(ValidatorId),

    #[error("invalid header signature from {0}")]
    InvalidSignature(ValidatorId),

    #[error("state commitment mismatch: header {declared}, recomputed {computed}")]
    CommitmentMismatch { declared: Hash, computed: Hash },
}

/// Build and sign a block on top of `parent_state`.
///
/// The transactions are executed against a copy of `parent_state`; invalid
/// ones are still included in the block but have no effect on the
/// commitment.
pub fn build_block(
    parent_hash: Hash,
    height: u64,
    transactions: Vec<Transaction>,
    proposer: ValidatorId,
    signing_key: &KeyPair,
    directory: &ValidatorSet,
    parent_state: &AppState,
) -> Block {
    let commitment = commitment_after(parent_state, &transactions, directory);
    let header = BlockHeader::new(parent_hash, height, commitment, proposer, signing_key);
    Block::from_parts(header, transactions)
}

/// Verify proposer, header signature and state commitment.
pub fn check_block(
    block: &Block,
    directory: &ValidatorSet,
    parent_state: &AppState,
) -> Result<(), BlockError> {
    let header = block.header();
    let public_key = directory
        .public_key(header.proposer)
        .ok_or(BlockError::UnknownProposer(header.proposer))?;

    if !header.verify_signature(public_key) {
        return Err(BlockError::InvalidSignature(header.proposer));
    }

    let computed = commitment_after(parent_state, block.transactions(), directory);
    if computed != header.state_commitment {
        return Err(BlockError::CommitmentMismatch {
            declared: header.state_commitment,
            computed,
        });
    }
    Ok(())
}

/// Boolean form of [`check_block`].
pub fn verify_block(block: &Block, directory: &ValidatorSet, parent_state: &AppState) -> bool {
    check_block(block, directory, parent_state).is_ok()
}

fn commitment_after(
    parent_state: &AppState,
    transactions: &[Transaction],
    directory: &ValidatorSet,
) -> Hash {
    let mut scratch = parent_state.clone();
    scratch.execute_all(transactions, directory);
    scratch.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tendersim_types::test_utils::test_directory;

    #[test]
    fn test_block_build_verify() {
        let (keys, directory) = test_directory(1);
        let state = AppState::new();
        let tx = Transaction::new(ValidatorId(0), "N0/data", "v", 1, &keys[0]);
        let block = build_block(Hash::ZERO, 1, vec![tx], ValidatorId(0), &keys[0], &directory, &state);

        assert!(verify_block(&block, &directory, &state));
        assert_ne!(block.header().state_commitment, state.commit());
    }

    #[test]
    fn test_reject_wrong_proposer_key() {
        let (keys, directory) = test_directory(2);
        let state = AppState::new();
        // Claims N0 as proposer but signs with N1's key.
        let block = build_block(Hash::ZERO, 1, vec![], ValidatorId(0), &keys[1], &directory, &state);

        assert_eq!(
            check_block(&block, &directory, &state),
            Err(BlockError::InvalidSignature(ValidatorId(0)))
        );
    }

    #[test]
    fn test_reject_unknown_proposer() {
        let (keys, directory) = test_directory(1);
        let state = AppState::new();
        let block = build_block(Hash::ZERO, 1, vec![], ValidatorId(7), &keys[0], &directory, &state);

        assert_eq!(
            check_block(&block, &directory, &state),
            Err(BlockError::UnknownProposer(ValidatorId(7)))
        );
    }

    #[test]
    fn test_reject_tampered_header() {
        let (keys, directory) = test_directory(1);
        let state = AppState::new();
        let tx = Transaction::new(ValidatorId(0), "N0/data", "v", 1, &keys[0]);
        let block = build_block(Hash::ZERO, 1, vec![tx], ValidatorId(0), &keys[0], &directory, &state);

        let (mut header, txs) = block.into_parts();
        header.height = 2;
        let tampered = Block::from_parts(header, txs);

        assert!(!verify_block(&tampered, &directory, &state));
    }

    #[test]
    fn test_reject_swapped_transactions() {
        let (keys, directory) = test_directory(1);
        let state = AppState::new();
        let tx = Transaction::new(ValidatorId(0), "N0/data", "v", 1, &keys[0]);
        let block = build_block(Hash::ZERO, 1, vec![tx], ValidatorId(0), &keys[0], &directory, &state);

        let (header, _) = block.into_parts();
        let other = Transaction::new(ValidatorId(0), "N0/data", "w", 1, &keys[0]);
        let tampered = Block::from_parts(header, vec![other]);

        assert!(matches!(
            check_block(&tampered, &directory, &state),
            Err(BlockError::CommitmentMismatch { .. })
        ));
    }

    #[test]
    fn test_commitment_depends_on_parent_state() {
        let (keys, directory) = test_directory(1);
        let empty = AppState::new();
        let mut advanced = AppState::new();
        advanced.execute(
            &Transaction::new(ValidatorId(0), "N0/x", "1", 1, &keys[0]),
            &directory,
        )
        .unwrap();

        let block = build_block(Hash::ZERO, 1, vec![], ValidatorId(0), &keys[0], &directory, &empty);
        assert!(verify_block(&block, &directory, &empty));
        assert!(!verify_block(&block, &directory, &advanced));
    }
}
