//! Node state machine.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tendersim_bft::{FinalizationOutcome, VoteBook};
use tendersim_core::{Action, Event, StateMachine};
use tendersim_execution::{check_block, AppState};
use tendersim_messages::{assemble_block, BodyGossip, HeaderGossip};
use tendersim_types::{
    Block, BlockHeader, Hash, KeyPair, LedgerEntry, Transaction, ValidatorId, ValidatorSet, Vote,
    VotePhase,
};
use tracing::{debug, info, trace, warn};

/// Index type for simulation-only node routing.
/// Consensus identity is the `ValidatorId`.
pub type NodeIndex = u32;

/// Counters for a single replica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub blocks_accepted: u64,
    pub blocks_rejected: u64,
    pub votes_received: u64,
    pub votes_rejected: u64,
    pub prevotes_sent: u64,
    pub precommits_sent: u64,
    pub heights_finalized: u64,
    /// Supermajorities observed for a hash other than the finalized one.
    pub safety_violations: u64,
}

/// One simulated replica.
///
/// Owns its vote tally, application state, received blocks and ledger.
/// Nothing here is shared with other replicas except the read-only key
/// directory.
pub struct NodeStateMachine {
    node_index: NodeIndex,
    validator_id: ValidatorId,
    signing_key: KeyPair,
    directory: Arc<ValidatorSet>,
    is_validator: bool,

    vote_book: VoteBook,
    state: AppState,

    /// Accepted blocks by height. First-seen wins.
    blocks: BTreeMap<u64, Block>,

    /// Headers waiting for their body, keyed by block hash.
    pending_headers: BTreeMap<Hash, HeaderGossip>,

    /// (height, block hash) pairs this replica has precommitted.
    precommitted: BTreeSet<(u64, Hash)>,

    ledger: BTreeMap<u64, LedgerEntry>,

    /// Finalized block hash to height. The block itself stays in `blocks`.
    finalized_index: BTreeMap<Hash, u64>,

    stats: NodeStats,
    now: u64,
}

impl std::fmt::Debug for NodeStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStateMachine")
            .field("node_index", &self.node_index)
            .field("validator_id", &self.validator_id)
            .field("finalized", &self.ledger.len())
            .field("now", &self.now)
            .finish()
    }
}

impl NodeStateMachine {
    /// Create a replica.
    ///
    /// The replica votes only if `validator_id` is in `directory`.
    pub fn new(
        node_index: NodeIndex,
        validator_id: ValidatorId,
        signing_key: KeyPair,
        directory: Arc<ValidatorSet>,
    ) -> Self {
        let is_validator = directory.contains(validator_id);
        Self {
            node_index,
            validator_id,
            signing_key,
            vote_book: VoteBook::new(directory.len()),
            directory,
            is_validator,
            state: AppState::new(),
            blocks: BTreeMap::new(),
            pending_headers: BTreeMap::new(),
            precommitted: BTreeSet::new(),
            ledger: BTreeMap::new(),
            finalized_index: BTreeMap::new(),
            stats: NodeStats::default(),
            now: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn node_index(&self) -> NodeIndex {
        self.node_index
    }

    pub fn validator_id(&self) -> ValidatorId {
        self.validator_id
    }

    pub fn is_validator(&self) -> bool {
        self.is_validator
    }

    /// Finalized entries in height order.
    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.ledger.values().copied().collect()
    }

    pub fn ledger_entry(&self, height: u64) -> Option<&LedgerEntry> {
        self.ledger.get(&height)
    }

    pub fn has_finalized(&self, height: u64) -> bool {
        self.ledger.contains_key(&height)
    }

    /// Accepted block at `height`, finalized or not.
    pub fn block_at(&self, height: u64) -> Option<&Block> {
        self.blocks.get(&height)
    }

    /// Finalized block at `height`.
    pub fn finalized_at(&self, height: u64) -> Option<&Block> {
        if !self.ledger.contains_key(&height) {
            return None;
        }
        self.blocks.get(&height)
    }

    /// Finalized block with the given hash.
    pub fn finalized_block(&self, block_hash: &Hash) -> Option<&Block> {
        self.finalized_index
            .get(block_hash)
            .and_then(|height| self.blocks.get(height))
    }

    /// Finalized block at the highest finalized height.
    pub fn latest_finalized(&self) -> Option<&Block> {
        self.ledger
            .keys()
            .next_back()
            .and_then(|height| self.blocks.get(height))
    }

    /// Highest finalized height, 0 before the first finalization.
    pub fn chain_height(&self) -> u64 {
        self.ledger.keys().next_back().copied().unwrap_or(0)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn vote_book(&self) -> &VoteBook {
        &self.vote_book
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Blocks
    // ═══════════════════════════════════════════════════════════════════════

    fn on_block_header(&mut self, block_hash: Hash, header: BlockHeader) -> Vec<Action> {
        if header.hash() != block_hash {
            debug!(
                node = self.node_index,
                block_hash = ?block_hash,
                "Header does not match announced hash"
            );
            return vec![];
        }
        if self.blocks.contains_key(&header.height) {
            trace!(node = self.node_index, height = header.height, "Already have block");
            return vec![];
        }
        self.pending_headers
            .entry(block_hash)
            .or_insert(HeaderGossip { block_hash, header });
        vec![]
    }

    fn on_block_body(
        &mut self,
        block_hash: Hash,
        height: u64,
        transactions: Vec<Transaction>,
    ) -> Vec<Action> {
        let Some(header) = self.pending_headers.get(&block_hash) else {
            trace!(
                node = self.node_index,
                block_hash = ?block_hash,
                "Body without pending header"
            );
            return vec![];
        };
        let body = BodyGossip {
            block_hash,
            height,
            transactions,
        };
        match assemble_block(header, body) {
            Some(block) => self.receive_block(block),
            None => {
                debug!(node = self.node_index, height, "Body does not match header");
                vec![]
            }
        }
    }

    /// Verify and store a block, then prevote for it.
    ///
    /// Invalid blocks and blocks at an already-filled height are ignored.
    pub fn receive_block(&mut self, block: Block) -> Vec<Action> {
        let height = block.height();
        let block_hash = block.hash();

        if self.blocks.contains_key(&height) {
            trace!(node = self.node_index, height, "Ignoring second block at height");
            return vec![];
        }

        if let Err(e) = check_block(&block, &self.directory, &self.state) {
            debug!(
                node = self.node_index,
                height,
                block_hash = ?block_hash,
                error = %e,
                "Rejected block"
            );
            self.stats.blocks_rejected += 1;
            return vec![];
        }

        debug!(
            node = self.node_index,
            height,
            block_hash = ?block_hash,
            proposer = %block.proposer(),
            "Accepted block"
        );
        self.blocks.insert(height, block);
        self.pending_headers.retain(|_, h| h.header.height != height);
        self.stats.blocks_accepted += 1;

        let mut actions = Vec::new();
        if self.is_validator {
            let prevote = self.cast_vote(height, block_hash, VotePhase::Prevote);
            actions.push(Action::BroadcastVote {
                vote: prevote.clone(),
            });
            actions.extend(self.process_votes(prevote));
        }

        // Precommits may have outrun the block.
        if self.vote_book.finalized(height) == Some(block_hash) {
            actions.extend(self.finalize(height, block_hash));
        }
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Votes
    // ═══════════════════════════════════════════════════════════════════════

    /// Verify and record a vote received from another replica.
    pub fn receive_vote(&mut self, vote: Vote) -> Vec<Action> {
        if !vote.verify(&self.directory) {
            debug!(
                node = self.node_index,
                voter = %vote.validator,
                height = vote.height,
                "Rejected vote"
            );
            self.stats.votes_rejected += 1;
            return vec![];
        }
        self.stats.votes_received += 1;
        self.process_votes(vote)
    }

    fn cast_vote(&mut self, height: u64, block_hash: Hash, phase: VotePhase) -> Vote {
        match phase {
            VotePhase::Prevote => self.stats.prevotes_sent += 1,
            VotePhase::Precommit => self.stats.precommits_sent += 1,
        }
        trace!(
            node = self.node_index,
            height,
            block_hash = ?block_hash,
            phase = %phase,
            "Casting vote"
        );
        Vote::new(self.validator_id, height, block_hash, phase, &self.signing_key)
    }

    /// Record a verified vote and everything it triggers.
    ///
    /// Own votes produced along the way are queued rather than recursed into.
    fn process_votes(&mut self, first: Vote) -> Vec<Action> {
        let mut actions = Vec::new();
        let mut queue = VecDeque::from([first]);

        while let Some(vote) = queue.pop_front() {
            let result = self.vote_book.add_vote(&vote);
            let (height, block_hash) = (vote.height, vote.block_hash);

            if vote.phase == VotePhase::Prevote
                && self.is_validator
                && self.vote_book.has_prevote_majority(height, &block_hash)
                && self.precommitted.insert((height, block_hash))
            {
                let precommit = self.cast_vote(height, block_hash, VotePhase::Precommit);
                actions.push(Action::BroadcastVote {
                    vote: precommit.clone(),
                });
                queue.push_back(precommit);
            }

            match result.outcome {
                FinalizationOutcome::Finalized => {
                    actions.extend(self.finalize(height, block_hash));
                }
                FinalizationOutcome::Conflict { .. } => {
                    self.stats.safety_violations += 1;
                    if let Some(reason) = result.reason() {
                        warn!(node = self.node_index, error = %reason, "Safety violation");
                    }
                }
                FinalizationOutcome::Recorded | FinalizationOutcome::AlreadyFinalized => {}
            }
        }
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Finalization
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply the stored block at `height` and append it to the ledger.
    ///
    /// No-op if the stored block is missing or has a different hash, or if
    /// the height is already in the ledger.
    pub fn finalize(&mut self, height: u64, block_hash: Hash) -> Vec<Action> {
        if self.ledger.contains_key(&height) {
            return vec![];
        }
        let Some(block) = self.blocks.get(&height) else {
            trace!(node = self.node_index, height, "Finalized before block arrived");
            return vec![];
        };
        if block.hash() != block_hash {
            debug!(
                node = self.node_index,
                height,
                stored = ?block.hash(),
                decided = ?block_hash,
                "Stored block differs from decision"
            );
            return vec![];
        }

        let summary = self.state.execute_all(block.transactions(), &self.directory);
        let entry = LedgerEntry {
            height,
            block_hash,
            state_commitment: self.state.commit(),
        };
        self.ledger.insert(height, entry);
        self.finalized_index.insert(block_hash, height);
        self.stats.heights_finalized += 1;

        // Headers at or below a finalized height will never be assembled.
        self.pending_headers
            .retain(|_, pending| pending.header.height > height);

        info!(
            node = self.node_index,
            height,
            block_hash = ?block_hash,
            applied = summary.applied,
            rejected = summary.rejected,
            "Finalized block"
        );
        vec![Action::BlockFinalized { entry }]
    }
}

impl StateMachine for NodeStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::BlockHeaderReceived { block_hash, header } => {
                self.on_block_header(block_hash, header)
            }
            Event::BlockBodyReceived {
                block_hash,
                height,
                transactions,
            } => self.on_block_body(block_hash, height, transactions),
            Event::BlockReceived { block } => self.receive_block(block),
            Event::VoteReceived { vote } => self.receive_vote(vote),
        }
    }

    fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    fn now(&self) -> u64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tendersim_execution::build_block;
    use tendersim_messages::split_block;
    use tendersim_types::test_utils::test_directory;
    use tracing_test::traced_test;

    fn make_nodes(n: u64) -> (Vec<NodeStateMachine>, Vec<KeyPair>, Arc<ValidatorSet>) {
        let (keys, directory) = test_directory(n);
        let directory = Arc::new(directory);
        let nodes = (0..n)
            .map(|i| {
                NodeStateMachine::new(
                    i as NodeIndex,
                    ValidatorId(i),
                    keys[i as usize].clone(),
                    Arc::clone(&directory),
                )
            })
            .collect();
        (nodes, keys, directory)
    }

    fn make_block(keys: &[KeyPair], directory: &ValidatorSet, proposer: u64, height: u64) -> Block {
        build_block(
            Hash::ZERO,
            height,
            vec![],
            ValidatorId(proposer),
            &keys[proposer as usize],
            directory,
            &AppState::new(),
        )
    }

    fn votes_of(actions: &[Action]) -> Vec<Vote> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::BroadcastVote { vote } => Some(vote.clone()),
                _ => None,
            })
            .collect()
    }

    /// Deliver every broadcast vote to every other node until quiescent.
    fn run_perfect_network(nodes: &mut [NodeStateMachine], initial: Vec<(usize, Vec<Action>)>) {
        let mut queue: VecDeque<(usize, Vote)> = initial
            .into_iter()
            .flat_map(|(from, actions)| votes_of(&actions).into_iter().map(move |v| (from, v)))
            .collect();
        while let Some((from, vote)) = queue.pop_front() {
            for to in 0..nodes.len() {
                if to == from {
                    continue;
                }
                let actions = nodes[to].handle(Event::VoteReceived { vote: vote.clone() });
                queue.extend(votes_of(&actions).into_iter().map(|v| (to, v)));
            }
        }
    }

    #[traced_test]
    #[test]
    fn test_four_nodes_finalize() {
        let (mut nodes, keys, directory) = make_nodes(4);
        let block = make_block(&keys, &directory, 1, 1);

        let initial: Vec<_> = (0..4)
            .map(|i| {
                (
                    i,
                    nodes[i].handle(Event::BlockReceived {
                        block: block.clone(),
                    }),
                )
            })
            .collect();
        run_perfect_network(&mut nodes, initial);

        for node in &nodes {
            let entry = node.ledger_entry(1).unwrap();
            assert_eq!(entry.block_hash, block.hash());
            assert_eq!(node.stats().prevotes_sent, 1);
            assert_eq!(node.stats().precommits_sent, 1);
            assert_eq!(node.stats().safety_violations, 0);
        }
    }

    #[traced_test]
    #[test]
    fn test_header_then_body_assembles_block() {
        let (mut nodes, keys, directory) = make_nodes(4);
        let block = make_block(&keys, &directory, 0, 1);
        let (header, body) = split_block(&block);

        let actions = nodes[1].handle(Event::BlockHeaderReceived {
            block_hash: header.block_hash,
            header: header.header,
        });
        assert!(actions.is_empty());
        assert!(nodes[1].block_at(1).is_none());

        let actions = nodes[1].handle(Event::BlockBodyReceived {
            block_hash: body.block_hash,
            height: body.height,
            transactions: body.transactions,
        });
        assert_eq!(votes_of(&actions).len(), 1);
        assert_eq!(nodes[1].block_at(1).map(Block::hash), Some(block.hash()));
    }

    #[traced_test]
    #[test]
    fn test_body_without_header_is_ignored() {
        let (mut nodes, keys, directory) = make_nodes(4);
        let block = make_block(&keys, &directory, 0, 1);
        let (_, body) = split_block(&block);

        let actions = nodes[1].handle(Event::BlockBodyReceived {
            block_hash: body.block_hash,
            height: body.height,
            transactions: body.transactions,
        });
        assert!(actions.is_empty());
        assert!(nodes[1].block_at(1).is_none());
    }

    #[traced_test]
    #[test]
    fn test_invalid_blocks_are_ignored() {
        let (mut nodes, keys, directory) = make_nodes(4);

        // Signed with the wrong key.
        let forged = build_block(
            Hash::ZERO,
            1,
            vec![],
            ValidatorId(0),
            &keys[1],
            &directory,
            &AppState::new(),
        );
        assert!(nodes[2].receive_block(forged).is_empty());

        // Tampered after signing.
        let (mut header, txs) = make_block(&keys, &directory, 0, 1).into_parts();
        header.height = 2;
        assert!(nodes[2].receive_block(Block::from_parts(header, txs)).is_empty());

        // Unknown proposer.
        let (stranger, _) = test_directory(9);
        let unknown = build_block(
            Hash::ZERO,
            1,
            vec![],
            ValidatorId(8),
            &stranger[8],
            &directory,
            &AppState::new(),
        );
        assert!(nodes[2].receive_block(unknown).is_empty());

        assert!(nodes[2].block_at(1).is_none());
        assert_eq!(nodes[2].stats().blocks_rejected, 3);
        assert_eq!(nodes[2].stats().prevotes_sent, 0);
    }

    #[traced_test]
    #[test]
    fn test_first_block_at_height_wins() {
        let (mut nodes, keys, directory) = make_nodes(4);
        let first = make_block(&keys, &directory, 0, 1);
        let second = build_block(
            Hash::from_bytes(b"other parent"),
            1,
            vec![],
            ValidatorId(1),
            &keys[1],
            &directory,
            &AppState::new(),
        );

        assert_eq!(votes_of(&nodes[3].receive_block(first.clone())).len(), 1);
        assert!(nodes[3].receive_block(second).is_empty());
        assert_eq!(nodes[3].block_at(1).map(Block::hash), Some(first.hash()));
    }

    #[traced_test]
    #[test]
    fn test_bad_vote_has_no_effect() {
        let (mut nodes, keys, _) = make_nodes(4);
        let hash = Hash::from_bytes(b"block");

        let mut forged = Vote::new(ValidatorId(1), 1, hash, VotePhase::Prevote, &keys[2]);
        assert!(nodes[0].receive_vote(forged.clone()).is_empty());
        forged.validator = ValidatorId(42);
        assert!(nodes[0].receive_vote(forged).is_empty());

        assert_eq!(nodes[0].vote_book().prevote_count(1, &hash), 0);
        assert_eq!(nodes[0].stats().votes_rejected, 2);
    }

    #[traced_test]
    #[test]
    fn test_precommit_cast_once() {
        let (mut nodes, keys, _) = make_nodes(4);
        let hash = Hash::from_bytes(b"block");

        let mut precommits = 0;
        for v in 1..4 {
            let vote = Vote::new(ValidatorId(v), 1, hash, VotePhase::Prevote, &keys[v as usize]);
            let actions = nodes[0].receive_vote(vote.clone());
            precommits += votes_of(&actions)
                .iter()
                .filter(|v| v.phase == VotePhase::Precommit)
                .count();
            // Duplicate delivery.
            nodes[0].receive_vote(vote);
        }
        assert_eq!(precommits, 1);
        assert_eq!(nodes[0].stats().precommits_sent, 1);
    }

    #[traced_test]
    #[test]
    fn test_finalize_guards() {
        let (mut nodes, keys, directory) = make_nodes(4);
        let block = make_block(&keys, &directory, 0, 1);

        // No block stored yet.
        assert!(nodes[0].finalize(1, block.hash()).is_empty());

        nodes[0].receive_block(block.clone());
        // Hash differs from stored block.
        assert!(nodes[0].finalize(1, Hash::from_bytes(b"other")).is_empty());
        assert!(!nodes[0].has_finalized(1));

        let actions = nodes[0].finalize(1, block.hash());
        assert!(matches!(actions.as_slice(), [Action::BlockFinalized { .. }]));
        // Idempotent.
        assert!(nodes[0].finalize(1, block.hash()).is_empty());
        assert_eq!(nodes[0].ledger().len(), 1);
    }

    #[traced_test]
    #[test]
    fn test_late_block_catches_up_on_decision() {
        let (mut nodes, keys, directory) = make_nodes(4);
        let block = make_block(&keys, &directory, 0, 1);

        for v in 1..4 {
            let vote = Vote::new(
                ValidatorId(v),
                1,
                block.hash(),
                VotePhase::Precommit,
                &keys[v as usize],
            );
            nodes[0].receive_vote(vote);
        }
        assert_eq!(nodes[0].vote_book().finalized(1), Some(block.hash()));
        assert!(!nodes[0].has_finalized(1));

        let actions = nodes[0].receive_block(block.clone());
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::BlockFinalized { entry } if entry.height == 1)));
        assert_eq!(nodes[0].ledger_entry(1).unwrap().block_hash, block.hash());
    }

    #[traced_test]
    #[test]
    fn test_finalized_chain_lookup() {
        let (mut nodes, keys, directory) = make_nodes(1);
        assert!(nodes[0].latest_finalized().is_none());
        assert_eq!(nodes[0].chain_height(), 0);

        let first = make_block(&keys, &directory, 0, 1);
        let second = build_block(
            first.hash(),
            2,
            vec![],
            ValidatorId(0),
            &keys[0],
            &directory,
            &AppState::new(),
        );
        nodes[0].receive_block(first.clone());
        nodes[0].receive_block(second.clone());

        let node = &nodes[0];
        assert_eq!(node.finalized_block(&first.hash()), Some(&first));
        assert_eq!(node.finalized_at(2), Some(&second));
        assert_eq!(node.latest_finalized(), Some(&second));
        assert_eq!(node.chain_height(), 2);
        assert!(node.finalized_block(&Hash::from_bytes(b"unknown")).is_none());
    }

    #[traced_test]
    #[test]
    fn test_accepted_but_undecided_block_is_not_finalized() {
        let (mut nodes, keys, directory) = make_nodes(4);
        let block = make_block(&keys, &directory, 1, 1);
        nodes[0].receive_block(block.clone());

        assert_eq!(nodes[0].block_at(1), Some(&block));
        assert!(nodes[0].finalized_at(1).is_none());
        assert!(nodes[0].finalized_block(&block.hash()).is_none());
        assert_eq!(nodes[0].chain_height(), 0);
    }

    #[traced_test]
    #[test]
    fn test_finalize_prunes_stale_headers() {
        let (mut nodes, keys, directory) = make_nodes(1);
        let orphan = make_block(&keys, &directory, 0, 1);
        let (header, _) = split_block(&orphan);
        nodes[0].handle(Event::BlockHeaderReceived {
            block_hash: header.block_hash,
            header: header.header,
        });
        let (future_header, _) = split_block(&make_block(&keys, &directory, 0, 3));
        nodes[0].handle(Event::BlockHeaderReceived {
            block_hash: future_header.block_hash,
            header: future_header.header,
        });
        assert_eq!(nodes[0].pending_headers.len(), 2);

        // Body for height 1 never arrives; height 2 is decided directly.
        let block = make_block(&keys, &directory, 0, 2);
        nodes[0].receive_block(block);
        assert!(nodes[0].has_finalized(2));

        assert_eq!(nodes[0].pending_headers.len(), 1);
        assert!(nodes[0].pending_headers.contains_key(&future_header.block_hash));
    }

    #[traced_test]
    #[test]
    fn test_conflicting_precommits_are_counted_not_applied() {
        let (mut nodes, keys, directory) = make_nodes(4);
        let block = make_block(&keys, &directory, 0, 1);
        nodes[0].receive_block(block.clone());

        let other = Hash::from_bytes(b"other");
        for (hash, voters) in [(block.hash(), 1..4), (other, 1..4)] {
            for v in voters {
                let vote = Vote::new(ValidatorId(v), 1, hash, VotePhase::Precommit, &keys[v as usize]);
                nodes[0].receive_vote(vote);
            }
        }

        assert_eq!(nodes[0].stats().safety_violations, 1);
        assert_eq!(nodes[0].ledger_entry(1).unwrap().block_hash, block.hash());
        assert!(logs_contain("conflicting finalization attempt"));
    }

    #[traced_test]
    #[test]
    fn test_transactions_applied_on_finalize() {
        let (mut nodes, keys, directory) = make_nodes(4);
        let txs = vec![
            Transaction::new(ValidatorId(0), "N0/a", "1", 1, &keys[0]),
            Transaction::new(ValidatorId(0), "N1/a", "1", 2, &keys[0]),
        ];
        let block = build_block(
            Hash::ZERO,
            1,
            txs,
            ValidatorId(0),
            &keys[0],
            &directory,
            &AppState::new(),
        );

        let initial: Vec<_> = (0..4)
            .map(|i| {
                (
                    i,
                    nodes[i].handle(Event::BlockReceived {
                        block: block.clone(),
                    }),
                )
            })
            .collect();
        run_perfect_network(&mut nodes, initial);

        for node in &nodes {
            assert_eq!(node.state().get("N0/a"), Some("1"));
            assert_eq!(node.state().get("N1/a"), None);
            assert_eq!(
                node.ledger_entry(1).unwrap().state_commitment,
                block.header().state_commitment
            );
        }
    }
}
