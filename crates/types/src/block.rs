//! Block and block header.

use crate::signing::{block_id, header_message};
use crate::{Hash, KeyPair, PublicKey, Signature, Transaction, ValidatorId};

/// Block header: consensus metadata signed by the proposer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Hash of the parent block (`Hash::ZERO` for the first height).
    pub parent_hash: Hash,
    /// Position in the chain, starting at 1.
    pub height: u64,
    /// Commitment to the key/value state after executing the block.
    pub state_commitment: Hash,
    /// Validator who proposed this block.
    pub proposer: ValidatorId,
    /// Proposer signature over (parent_hash, height, state_commitment, proposer).
    pub signature: Signature,
}

impl BlockHeader {
    /// Create and sign a header.
    pub fn new(
        parent_hash: Hash,
        height: u64,
        state_commitment: Hash,
        proposer: ValidatorId,
        signing_key: &KeyPair,
    ) -> Self {
        let signature =
            signing_key.sign(&header_message(&parent_hash, height, &state_commitment, proposer));
        Self {
            parent_hash,
            height,
            state_commitment,
            proposer,
            signature,
        }
    }

    /// Block identity derived from (parent_hash, height, state_commitment).
    pub fn hash(&self) -> Hash {
        block_id(&self.parent_hash, self.height, &self.state_commitment)
    }

    /// Verify the header signature against a public key.
    pub fn verify_signature(&self, public_key: &PublicKey) -> bool {
        public_key.verify(
            &header_message(
                &self.parent_hash,
                self.height,
                &self.state_commitment,
                self.proposer,
            ),
            &self.signature,
        )
    }
}

/// A complete block: header plus ordered transactions.
///
/// Immutable once constructed. The hash is computed from the header at
/// construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    hash: Hash,
}

impl Block {
    /// Assemble a block from a header and its transactions.
    pub fn from_parts(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        let hash = header.hash();
        Self {
            header,
            transactions,
            hash,
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn proposer(&self) -> ValidatorId {
        self.header.proposer
    }

    /// Split back into header and transactions.
    pub fn into_parts(self) -> (BlockHeader, Vec<Transaction>) {
        (self.header, self.transactions)
    }
}
