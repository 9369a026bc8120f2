//! Deterministic round driver.
//!
//! Proposes one block per height, gossips it as header and body, and steps
//! the network until every replica has finalized the height or no messages
//! remain in flight.

use crate::config::{ConfigError, SimulationConfig};
use crate::log::{EventLog, LogError, LogEvent, LogRecord};
use crate::network::{NetworkStats, SimulatedNetwork};
use crate::safety::{check_no_fork, ForkError};
use crate::workload::Workload;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tendersim_core::{Action, Event, StateMachine};
use tendersim_execution::{build_block, AppState};
use tendersim_messages::split_block;
use tendersim_node::{NodeIndex, NodeStateMachine};
use tendersim_types::{
    validator_key_seed, Hash, KeyPair, LedgerEntry, ValidatorId, ValidatorInfo, ValidatorSet,
};
use tracing::{debug, info, trace, warn};

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub num_validators: usize,
    pub target_height: u64,
    /// Heights finalized by at least one replica.
    pub finalized_heights: Vec<u64>,
    /// Heights no replica finalized.
    pub stalled_heights: Vec<u64>,
    pub ledgers: BTreeMap<ValidatorId, Vec<LedgerEntry>>,
    pub network: NetworkStats,
    pub final_time: u64,
}

impl SimulationReport {
    /// Check that no two replicas finalized different blocks at one height.
    pub fn check_no_fork(&self) -> Result<(), ForkError> {
        check_no_fork(self.ledgers.iter().map(|(id, ledger)| (*id, ledger.as_slice())))
    }

    /// Highest finalized entry of each replica.
    pub fn ledger_tips(&self) -> BTreeMap<ValidatorId, Option<LedgerEntry>> {
        self.ledgers
            .iter()
            .map(|(id, ledger)| (*id, ledger.last().copied()))
            .collect()
    }
}

/// Drives replicas and the network one height at a time.
///
/// Given the same configuration, produces identical logs and ledgers
/// every run.
pub struct SimulationRunner {
    config: SimulationConfig,
    nodes: Vec<NodeStateMachine>,
    network: SimulatedNetwork,
    /// Signing keys, `keys[i]` belongs to `ValidatorId(i)`.
    keys: Vec<KeyPair>,
    directory: Arc<ValidatorSet>,
    workload: Workload,
    /// State after every decided block; new blocks are built on top of it.
    build_state: AppState,
    parent_hash: Hash,
    next_height: u64,
    finalized_heights: Vec<u64>,
    stalled_heights: Vec<u64>,
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("seed", &self.config.seed)
            .field("nodes", &self.nodes.len())
            .field("next_height", &self.next_height)
            .field("now", &self.network.now())
            .finish()
    }
}

impl SimulationRunner {
    /// Create a runner that keeps its log in memory.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        Self::with_log(config, EventLog::in_memory())
    }

    /// Create a runner that records into `log`.
    pub fn with_log(config: SimulationConfig, log: EventLog) -> Result<Self, ConfigError> {
        config.validate()?;

        let n = config.num_validators as u64;
        let keys: Vec<KeyPair> = (0..n)
            .map(|i| KeyPair::from_seed(&validator_key_seed(config.seed, i)))
            .collect();
        let directory = Arc::new(ValidatorSet::new(
            keys.iter()
                .enumerate()
                .map(|(i, key)| ValidatorInfo {
                    validator_id: ValidatorId(i as u64),
                    public_key: key.public_key(),
                })
                .collect(),
        ));

        let nodes = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                NodeStateMachine::new(
                    i as NodeIndex,
                    ValidatorId(i as u64),
                    key.clone(),
                    Arc::clone(&directory),
                )
            })
            .collect::<Vec<_>>();

        info!(
            num_nodes = nodes.len(),
            seed = config.seed,
            target_height = config.target_height,
            "Created simulation runner"
        );

        Ok(Self {
            network: SimulatedNetwork::with_log(config.network.clone(), config.seed, log),
            workload: Workload::new(config.txs_per_block),
            config,
            nodes,
            keys,
            directory,
            build_state: AppState::new(),
            parent_hash: Hash::ZERO,
            next_height: 1,
            finalized_heights: Vec::new(),
            stalled_heights: Vec::new(),
        })
    }

    // ─── Accessors ───

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn node(&self, index: NodeIndex) -> Option<&NodeStateMachine> {
        self.nodes.get(index as usize)
    }

    pub fn nodes(&self) -> &[NodeStateMachine] {
        &self.nodes
    }

    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    pub fn now(&self) -> u64 {
        self.network.now()
    }

    /// Hash the next proposal will build on.
    pub fn parent_hash(&self) -> Hash {
        self.parent_hash
    }

    pub fn ledgers(&self) -> BTreeMap<ValidatorId, Vec<LedgerEntry>> {
        self.nodes
            .iter()
            .map(|node| (node.validator_id(), node.ledger()))
            .collect()
    }

    /// The structured log so far, one JSON object per line.
    pub fn collect_logs(&self) -> String {
        self.network.log().contents()
    }

    /// Flush the log sink and return the recorded lines.
    pub fn finish(self) -> Result<Vec<String>, LogError> {
        self.network.into_log().finish()
    }

    // ─── Driving ───

    /// Run up to the configured target height.
    pub fn run(&mut self) -> SimulationReport {
        self.run_until(self.config.target_height)
    }

    /// Run every remaining height up to and including `target`.
    pub fn run_until(&mut self, target: u64) -> SimulationReport {
        while self.next_height <= target {
            let height = self.next_height;
            self.run_height(height);
            self.next_height += 1;
        }
        self.report(target)
    }

    fn run_height(&mut self, height: u64) {
        let n = self.nodes.len();
        let proposer_index = (height % n as u64) as usize;
        let proposer = ValidatorId(proposer_index as u64);

        let transactions = self.workload.next_batch(height, &self.keys);
        let block = build_block(
            self.parent_hash,
            height,
            transactions,
            proposer,
            &self.keys[proposer_index],
            &self.directory,
            &self.build_state,
        );
        let block_hash = block.hash();

        info!(
            height,
            proposer = %proposer,
            block_hash = ?block_hash,
            parent_hash = ?self.parent_hash,
            txs = block.transactions().len(),
            "Proposing block"
        );
        self.network.record(
            LogRecord::simulator(LogEvent::ProposeBlock, self.network.now())
                .height(height)
                .block_hash(block_hash)
                .proposer(proposer)
                .parent_hash(self.parent_hash),
        );

        let from = proposer_index as NodeIndex;
        let node = &mut self.nodes[proposer_index];
        node.set_time(self.network.now());
        let actions = node.handle(Event::BlockReceived {
            block: block.clone(),
        });
        dispatch_actions(&mut self.network, n, from, actions);

        let (header, body) = split_block(&block);
        for to in (0..n as NodeIndex).filter(|&to| to != from) {
            self.network.send(from, to, header.clone().into());
            self.network.send(from, to, body.clone().into());
        }

        loop {
            if self.nodes.iter().all(|node| node.has_finalized(height)) {
                debug!(height, "All replicas finalized");
                break;
            }
            if self.network.idle() {
                debug!(height, "Network idle");
                break;
            }
            let nodes = &mut self.nodes;
            self.network.step(|network, delivery| {
                let to = delivery.to;
                trace!(
                    time = delivery.time,
                    from = delivery.from,
                    to,
                    kind = %delivery.message.kind(),
                    "Delivering message"
                );
                let node = &mut nodes[to as usize];
                node.set_time(delivery.time);
                let actions = node.handle(Event::from(delivery.message));
                dispatch_actions(network, n, to, actions);
            });
        }

        let decided = self
            .nodes
            .iter()
            .find_map(|node| node.ledger_entry(height).copied());

        match decided {
            Some(entry) => {
                let finalized_by = self
                    .nodes
                    .iter()
                    .filter(|node| node.has_finalized(height))
                    .count();
                if entry.block_hash == block_hash {
                    self.build_state
                        .execute_all(block.transactions(), &self.directory);
                }
                self.parent_hash = entry.block_hash;
                self.finalized_heights.push(height);
                self.network.record(
                    LogRecord::simulator(LogEvent::HeightFinalized, self.network.now())
                        .height(height)
                        .block_hash(entry.block_hash),
                );
                info!(
                    height,
                    block_hash = ?entry.block_hash,
                    finalized_by,
                    time = self.network.now(),
                    "Height finalized"
                );
            }
            None => {
                self.stalled_heights.push(height);
                self.network.record(
                    LogRecord::simulator(LogEvent::HeightStalled, self.network.now())
                        .height(height)
                        .block_hash(block_hash),
                );
                warn!(height, block_hash = ?block_hash, "Height stalled, keeping parent");
            }
        }
    }

    fn report(&self, target: u64) -> SimulationReport {
        SimulationReport {
            seed: self.config.seed,
            num_validators: self.nodes.len(),
            target_height: target,
            finalized_heights: self.finalized_heights.clone(),
            stalled_heights: self.stalled_heights.clone(),
            ledgers: self.ledgers(),
            network: *self.network.stats(),
            final_time: self.network.now(),
        }
    }
}

/// Route a replica's actions onto the network.
fn dispatch_actions(
    network: &mut SimulatedNetwork,
    num_nodes: usize,
    from: NodeIndex,
    actions: Vec<Action>,
) {
    for action in actions {
        match action.outbound_message() {
            Some(message) => {
                for to in (0..num_nodes as NodeIndex).filter(|&to| to != from) {
                    network.send(from, to, message.clone());
                }
            }
            None => {
                if let Action::BlockFinalized { entry } = &action {
                    trace!(node = from, height = entry.height, "Replica finalized");
                }
            }
        }
    }
}
