//! Vote tallying for two-phase BFT finalization.
//!
//! Each replica owns one [`VoteBook`]. Votes reach it either locally (the
//! replica's own votes) or over the network; nothing is shared between
//! replicas.
//!
//! # Protocol
//!
//! - A validator that accepts a block at height H broadcasts a PREVOTE.
//! - Once a supermajority of PREVOTEs for the same block is seen, it
//!   broadcasts a PRECOMMIT.
//! - Once a supermajority of PRECOMMITs for the same block is seen, the
//!   block is finalized.
//!
//! # Safety
//!
//! A height is finalized at most once. A later supermajority for a
//! different block at the same height is reported as a
//! [`SafetyViolation`] and never overwrites the finalized hash.

mod vote_book;

pub use vote_book::{FinalizationOutcome, FinalizationResult, SafetyViolation, VoteBook};
