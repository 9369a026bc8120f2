//! Deterministic event ordering.

use tendersim_node::NodeIndex;

/// Key for the network's event queue.
///
/// Ordered by delivery time, then insertion sequence, then link endpoints.
/// The sequence is unique per scheduled event, so two runs with the same
/// seed pop events in exactly the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub time: u64,
    pub sequence: u64,
    pub from: NodeIndex,
    pub to: NodeIndex,
}

impl EventKey {
    pub fn new(time: u64, sequence: u64, from: NodeIndex, to: NodeIndex) -> Self {
        Self {
            time,
            sequence,
            from,
            to,
        }
    }
}
