//! Identifier newtypes.

use serde::{Serialize, Serializer};
use std::fmt;

/// Consensus identity of a validator or transaction sender.
///
/// Displayed as `N<id>`, which is also the key namespace the identity owns
/// in the application state (`N0/...`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ValidatorId(pub u64);

impl ValidatorId {
    /// Key prefix this identity may write to.
    pub fn namespace(&self) -> String {
        format!("{}/", self)
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

impl Serialize for ValidatorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Voting phase.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum VotePhase {
    /// First phase: the validator has seen a valid block.
    Prevote,
    /// Second phase: the validator has seen a prevote supermajority.
    Precommit,
}

impl VotePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotePhase::Prevote => "PREVOTE",
            VotePhase::Precommit => "PRECOMMIT",
        }
    }
}

impl fmt::Display for VotePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VotePhase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
