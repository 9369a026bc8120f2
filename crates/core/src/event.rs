//! Event types for the deterministic state machine.

use tendersim_messages::NetworkMessage;
use tendersim_types::{Block, BlockHeader, Hash, Transaction, Vote};

/// All possible events a replica can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Network Messages
    // ═══════════════════════════════════════════════════════════════════════
    /// Received a block header from the proposer.
    BlockHeaderReceived { block_hash: Hash, header: BlockHeader },

    /// Received the transactions of a block.
    ///
    /// The network only delivers a body once the matching header has been
    /// delivered to the same replica.
    BlockBodyReceived {
        block_hash: Hash,
        height: u64,
        transactions: Vec<Transaction>,
    },

    /// Received a prevote or precommit.
    ///
    /// Sender identity comes from vote.validator.
    VoteReceived { vote: Vote },

    // ═══════════════════════════════════════════════════════════════════════
    // Local
    // ═══════════════════════════════════════════════════════════════════════
    /// A complete block handed over directly, bypassing the network.
    ///
    /// Used for the proposer's own block.
    BlockReceived { block: Block },
}

impl Event {
    /// Get the event type name for tracing.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::BlockHeaderReceived { .. } => "BlockHeaderReceived",
            Event::BlockBodyReceived { .. } => "BlockBodyReceived",
            Event::VoteReceived { .. } => "VoteReceived",
            Event::BlockReceived { .. } => "BlockReceived",
        }
    }

    /// Check if this event arrived over the network.
    pub fn is_network(&self) -> bool {
        !matches!(self, Event::BlockReceived { .. })
    }
}

impl From<NetworkMessage> for Event {
    fn from(message: NetworkMessage) -> Self {
        match message {
            NetworkMessage::Header(gossip) => Event::BlockHeaderReceived {
                block_hash: gossip.block_hash,
                header: gossip.header,
            },
            NetworkMessage::Body(gossip) => Event::BlockBodyReceived {
                block_hash: gossip.block_hash,
                height: gossip.height,
                transactions: gossip.transactions,
            },
            NetworkMessage::Vote(gossip) => Event::VoteReceived { vote: gossip.vote },
        }
    }
}
