//! State machine trait.

use crate::{Action, Event};

/// A deterministic, synchronous replica.
pub trait StateMachine {
    /// Process one event and return the resulting actions.
    ///
    /// Must not perform I/O. Given the same state and event, must return
    /// the same actions.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Set the current simulated time (in ticks).
    fn set_time(&mut self, now: u64);

    /// Current simulated time.
    fn now(&self) -> u64;
}
