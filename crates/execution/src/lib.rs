//! Deterministic execution layer.
//!
//! This crate implements the application side of the simulator as pure,
//! synchronous functions. It handles:
//!
//! - Replay-protected key/value state with namespace ownership
//! - Canonical state commitments
//! - Block construction and structural verification

mod block;
mod state;

pub use block::{build_block, check_block, verify_block, BlockError};
pub use state::{encode_kv_state, AppState, ExecutionSummary, TransactionError};
