//! Per-replica prevote/precommit tally.

use std::collections::{BTreeMap, BTreeSet};
use tendersim_types::{quorum_threshold, Hash, ValidatorId, Vote, VotePhase};
use thiserror::Error;

/// A second supermajority at an already-finalized height.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "conflicting finalization attempt at height {height}: finalized {finalized}, attempted {attempted}"
)]
pub struct SafetyViolation {
    pub height: u64,
    pub finalized: Hash,
    pub attempted: Hash,
}

/// What recording a vote did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizationOutcome {
    /// Vote recorded; no new decision.
    Recorded,
    /// This vote finalized the height.
    Finalized,
    /// The height was already finalized with this hash.
    AlreadyFinalized,
    /// A supermajority formed for a hash other than the finalized one.
    Conflict { finalized: Hash },
}

/// Result of [`VoteBook::add_vote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizationResult {
    pub height: u64,
    pub block_hash: Hash,
    pub outcome: FinalizationOutcome,
}

impl FinalizationResult {
    /// True only for the vote that finalized the height.
    pub fn success(&self) -> bool {
        self.outcome == FinalizationOutcome::Finalized
    }

    /// The safety violation, if this result reports one.
    pub fn reason(&self) -> Option<SafetyViolation> {
        match self.outcome {
            FinalizationOutcome::Conflict { finalized } => Some(SafetyViolation {
                height: self.height,
                finalized,
                attempted: self.block_hash,
            }),
            _ => None,
        }
    }
}

type Tally = BTreeMap<u64, BTreeMap<Hash, BTreeSet<ValidatorId>>>;

/// Tally of prevotes and precommits by height and candidate block.
///
/// Vote sets are idempotent. The book does not verify signatures; callers
/// only record votes they have already checked.
#[derive(Debug, Clone)]
pub struct VoteBook {
    majority: usize,
    prevotes: Tally,
    precommits: Tally,
    finalized: BTreeMap<u64, Hash>,
}

impl VoteBook {
    /// Create a book for a validator set of `num_validators`.
    pub fn new(num_validators: usize) -> Self {
        Self {
            majority: quorum_threshold(num_validators),
            prevotes: BTreeMap::new(),
            precommits: BTreeMap::new(),
            finalized: BTreeMap::new(),
        }
    }

    /// Votes required for a supermajority: `floor(2n/3) + 1`.
    pub fn majority(&self) -> usize {
        self.majority
    }

    /// Record a vote.
    pub fn add_vote(&mut self, vote: &Vote) -> FinalizationResult {
        let tally = match vote.phase {
            VotePhase::Prevote => &mut self.prevotes,
            VotePhase::Precommit => &mut self.precommits,
        };
        let voters = tally
            .entry(vote.height)
            .or_default()
            .entry(vote.block_hash)
            .or_default();
        voters.insert(vote.validator);
        let count = voters.len();

        let outcome = if vote.phase == VotePhase::Precommit && count >= self.majority {
            self.decide(vote.height, vote.block_hash)
        } else {
            FinalizationOutcome::Recorded
        };

        FinalizationResult {
            height: vote.height,
            block_hash: vote.block_hash,
            outcome,
        }
    }

    fn decide(&mut self, height: u64, block_hash: Hash) -> FinalizationOutcome {
        match self.finalized.get(&height) {
            Some(existing) if *existing == block_hash => FinalizationOutcome::AlreadyFinalized,
            Some(existing) => FinalizationOutcome::Conflict {
                finalized: *existing,
            },
            None => {
                self.finalized.insert(height, block_hash);
                FinalizationOutcome::Finalized
            }
        }
    }

    pub fn prevote_count(&self, height: u64, block_hash: &Hash) -> usize {
        count(&self.prevotes, height, block_hash)
    }

    pub fn precommit_count(&self, height: u64, block_hash: &Hash) -> usize {
        count(&self.precommits, height, block_hash)
    }

    pub fn has_prevote_majority(&self, height: u64, block_hash: &Hash) -> bool {
        self.prevote_count(height, block_hash) >= self.majority
    }

    /// Finalized hash at `height`, if decided.
    pub fn finalized(&self, height: u64) -> Option<Hash> {
        self.finalized.get(&height).copied()
    }
}

fn count(tally: &Tally, height: u64, block_hash: &Hash) -> usize {
    tally
        .get(&height)
        .and_then(|by_hash| by_hash.get(block_hash))
        .map_or(0, BTreeSet::len)
}
