//! Gossip payloads.
//!
//! A block travels as two messages: the signed header, and a body carrying
//! the ordered transactions. Both carry the block hash so a receiver can
//! match them up regardless of arrival order.

use tendersim_types::{Block, BlockHeader, Hash, Transaction, Vote};

/// Announces a block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderGossip {
    /// Hash of the announced block.
    pub block_hash: Hash,
    pub header: BlockHeader,
}

impl HeaderGossip {
    pub fn new(header: BlockHeader) -> Self {
        Self {
            block_hash: header.hash(),
            header,
        }
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }
}

/// Carries the transactions of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyGossip {
    /// Hash of the block these transactions belong to.
    pub block_hash: Hash,
    pub height: u64,
    pub transactions: Vec<Transaction>,
}

/// Carries a single prevote or precommit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteGossip {
    pub vote: Vote,
}

impl VoteGossip {
    pub fn new(vote: Vote) -> Self {
        Self { vote }
    }
}

/// Split a block into its header and body messages.
pub fn split_block(block: &Block) -> (HeaderGossip, BodyGossip) {
    let header = HeaderGossip::new(block.header().clone());
    let body = BodyGossip {
        block_hash: block.hash(),
        height: block.height(),
        transactions: block.transactions().to_vec(),
    };
    (header, body)
}

/// Reassemble a block from a header and a body.
///
/// Returns `None` if the body does not belong to the header.
pub fn assemble_block(header: &HeaderGossip, body: BodyGossip) -> Option<Block> {
    if header.block_hash != body.block_hash || header.header.hash() != body.block_hash {
        return None;
    }
    Some(Block::from_parts(header.header.clone(), body.transactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tendersim_types::test_utils::test_directory;
    use tendersim_types::ValidatorId;

    fn sample_block() -> Block {
        let (keys, _) = test_directory(1);
        let header = BlockHeader::new(
            Hash::ZERO,
            1,
            Hash::from_bytes(b"state"),
            ValidatorId(0),
            &keys[0],
        );
        let tx = Transaction::new(ValidatorId(0), "N0/k", "v", 1, &keys[0]);
        Block::from_parts(header, vec![tx])
    }

    #[test]
    fn test_split_and_assemble() {
        let block = sample_block();
        let (header, body) = split_block(&block);

        assert_eq!(header.block_hash, block.hash());
        assert_eq!(body.height, 1);

        let rebuilt = assemble_block(&header, body).unwrap();
        assert_eq!(rebuilt, block);
    }

    #[test]
    fn test_mismatched_body_is_rejected() {
        let block = sample_block();
        let (header, mut body) = split_block(&block);
        body.block_hash = Hash::from_bytes(b"other");

        assert!(assemble_block(&header, body).is_none());
    }

    #[test]
    fn test_forged_header_hash_is_rejected() {
        let block = sample_block();
        let (mut header, mut body) = split_block(&block);
        let forged = Hash::from_bytes(b"forged");
        header.block_hash = forged;
        body.block_hash = forged;

        assert!(assemble_block(&header, body).is_none());
    }
}
