//! Consensus replica.
//!
//! [`NodeStateMachine`] owns one replica's vote tally, application state,
//! received blocks and ledger. It reacts to blocks and votes by casting
//! its own votes and finalizing heights.

mod state;

pub use state::{NodeIndex, NodeStateMachine, NodeStats};
