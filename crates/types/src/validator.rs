//! Validator set and public key directory.

use crate::{PublicKey, ValidatorId};
use std::collections::BTreeMap;

/// Information about a registered identity.
#[derive(Debug, Clone)]
pub struct ValidatorInfo {
    pub validator_id: ValidatorId,
    pub public_key: PublicKey,
}

/// Ordered set of validators and their public keys.
///
/// Doubles as the public key directory consulted when verifying headers,
/// votes and transactions.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: BTreeMap<ValidatorId, PublicKey>,
}

impl ValidatorSet {
    pub fn new(validators: Vec<ValidatorInfo>) -> Self {
        Self {
            validators: validators
                .into_iter()
                .map(|v| (v.validator_id, v.public_key))
                .collect(),
        }
    }

    pub fn public_key(&self, id: ValidatorId) -> Option<&PublicKey> {
        self.validators.get(&id)
    }

    pub fn contains(&self, id: ValidatorId) -> bool {
        self.validators.contains_key(&id)
    }

    /// Validator ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.validators.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

/// Supermajority threshold for `n` validators: `floor(2n/3) + 1`.
///
/// Tolerates `floor((n - 1) / 3)` silent validators.
pub fn quorum_threshold(n: usize) -> usize {
    (2 * n) / 3 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_directory;

    #[test]
    fn test_quorum_threshold() {
        assert_eq!(quorum_threshold(1), 1);
        assert_eq!(quorum_threshold(3), 3);
        assert_eq!(quorum_threshold(4), 3);
        assert_eq!(quorum_threshold(6), 5);
        assert_eq!(quorum_threshold(7), 5);
    }

    #[test]
    fn test_directory_lookup() {
        let (keys, set) = test_directory(3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.public_key(ValidatorId(1)), Some(&keys[1].public_key()));
        assert!(set.public_key(ValidatorId(3)).is_none());
        assert_eq!(
            set.ids().collect::<Vec<_>>(),
            vec![ValidatorId(0), ValidatorId(1), ValidatorId(2)]
        );
    }
}
