//! Deterministic simulation of the finality protocol.
//!
//! A [`SimulationRunner`] owns every replica and a [`SimulatedNetwork`].
//! The network is a discrete-event queue: messages are delayed, dropped,
//! duplicated and rate limited according to [`NetworkConfig`], using a single
//! seeded RNG. Every network and driver event is written to an [`EventLog`],
//! so a seed fully determines the log, the ledgers and the report.
//!
//! ```text
//! run_height(h):
//!   proposer = h mod n ── block ──► proposer.handle(BlockReceived)
//!                       ── HEADER, BODY ──► every other replica
//!   loop until all finalized h or network idle:
//!       network.step(deliver ─► replica.handle ─► BroadcastVote ─► send)
//! ```

mod config;
mod event_queue;
mod log;
mod network;
mod runner;
mod safety;
mod workload;

pub use config::{ConfigError, NetworkConfig, SimulationConfig};
pub use event_queue::EventKey;
pub use log::{Component, DropReason, EventLog, LogError, LogEvent, LogRecord};
pub use network::{Delivery, NetworkStats, SimulatedNetwork, StepOutcome};
pub use runner::{SimulationReport, SimulationRunner};
pub use safety::{check_no_fork, ForkError};
pub use workload::Workload;

pub use tendersim_node::NodeIndex;
