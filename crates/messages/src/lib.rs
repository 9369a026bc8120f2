//! Network messages exchanged between simulated replicas.

pub mod gossip;

pub use gossip::{assemble_block, split_block, BodyGossip, HeaderGossip, VoteGossip};

use serde::Serialize;
use std::fmt;
use tendersim_types::Hash;

/// Every message that can travel over the simulated network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMessage {
    /// Signed block header.
    Header(HeaderGossip),
    /// Block transactions. Only delivered after the matching header.
    Body(BodyGossip),
    /// Prevote or precommit.
    Vote(VoteGossip),
}

impl NetworkMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            NetworkMessage::Header(_) => MessageKind::Header,
            NetworkMessage::Body(_) => MessageKind::Body,
            NetworkMessage::Vote(_) => MessageKind::Vote,
        }
    }

    pub fn height(&self) -> u64 {
        match self {
            NetworkMessage::Header(h) => h.height(),
            NetworkMessage::Body(b) => b.height,
            NetworkMessage::Vote(v) => v.vote.height,
        }
    }

    /// Hash of the block the message refers to.
    pub fn block_hash(&self) -> Hash {
        match self {
            NetworkMessage::Header(h) => h.block_hash,
            NetworkMessage::Body(b) => b.block_hash,
            NetworkMessage::Vote(v) => v.vote.block_hash,
        }
    }
}

impl From<HeaderGossip> for NetworkMessage {
    fn from(gossip: HeaderGossip) -> Self {
        NetworkMessage::Header(gossip)
    }
}

impl From<BodyGossip> for NetworkMessage {
    fn from(gossip: BodyGossip) -> Self {
        NetworkMessage::Body(gossip)
    }
}

impl From<VoteGossip> for NetworkMessage {
    fn from(gossip: VoteGossip) -> Self {
        NetworkMessage::Vote(gossip)
    }
}

/// Message discriminant as it appears in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Header,
    Body,
    Vote,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Header => "HEADER",
            MessageKind::Body => "BODY",
            MessageKind::Vote => "VOTE",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
