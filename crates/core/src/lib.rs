//! Core types for the tendersim replica architecture.
//!
//! - [`Event`]: All possible inputs to a replica
//! - [`Action`]: All possible outputs from a replica
//! - [`StateMachine`]: The trait replicas implement
//!
//! # Architecture
//!
//! ```text
//! Events → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: Same state + event = same actions
//! - **Pure-ish**: Mutates self, but performs no I/O
//!
//! The simulation runner delivers events and carries out the returned
//! actions (broadcasting votes, observing finalization).

mod action;
mod event;
mod traits;

pub use action::Action;
pub use event::Event;
pub use traits::StateMachine;
