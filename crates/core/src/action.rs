//! Action types for the deterministic state machine.

use tendersim_messages::{NetworkMessage, VoteGossip};
use tendersim_types::{LedgerEntry, Vote};

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send one of our own votes to every other replica.
    BroadcastVote { vote: Vote },

    /// A height was finalized and appended to the local ledger.
    ///
    /// Informational; the runner uses it for logging and termination checks.
    BlockFinalized { entry: LedgerEntry },
}

impl Action {
    /// Get the action type name for tracing.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::BroadcastVote { .. } => "BroadcastVote",
            Action::BlockFinalized { .. } => "BlockFinalized",
        }
    }

    /// The network message to broadcast, if this action sends one.
    pub fn outbound_message(&self) -> Option<NetworkMessage> {
        match self {
            Action::BroadcastVote { vote } => {
                Some(NetworkMessage::Vote(VoteGossip::new(vote.clone())))
            }
            Action::BlockFinalized { .. } => None,
        }
    }
}
