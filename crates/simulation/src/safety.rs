//! Cross-replica safety check.

use std::collections::BTreeMap;
use tendersim_types::{Hash, LedgerEntry, ValidatorId};
use thiserror::Error;

/// Two replicas finalized different blocks at the same height.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "fork at height {height}: {first_validator} finalized {first_hash}, \
     {second_validator} finalized {second_hash}"
)]
pub struct ForkError {
    pub height: u64,
    pub first_validator: ValidatorId,
    pub first_hash: Hash,
    pub second_validator: ValidatorId,
    pub second_hash: Hash,
}

/// Check that no two ledgers disagree at any height.
///
/// Ledgers may be of different lengths or have gaps; only heights present
/// in both are compared.
pub fn check_no_fork<'a>(
    ledgers: impl IntoIterator<Item = (ValidatorId, &'a [LedgerEntry])>,
) -> Result<(), ForkError> {
    let mut decided: BTreeMap<u64, (ValidatorId, Hash)> = BTreeMap::new();
    for (validator, ledger) in ledgers {
        for entry in ledger {
            match decided.get(&entry.height) {
                Some(&(first_validator, first_hash)) if first_hash != entry.block_hash => {
                    return Err(ForkError {
                        height: entry.height,
                        first_validator,
                        first_hash,
                        second_validator: validator,
                        second_hash: entry.block_hash,
                    });
                }
                Some(_) => {}
                None => {
                    decided.insert(entry.height, (validator, entry.block_hash));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(height: u64, tag: &[u8]) -> LedgerEntry {
        LedgerEntry {
            height,
            block_hash: Hash::from_bytes(tag),
            state_commitment: Hash::ZERO,
        }
    }

    #[test]
    fn test_agreeing_ledgers_of_different_length() {
        let a = vec![entry(1, b"a"), entry(2, b"b")];
        let b = vec![entry(1, b"a")];
        let c = vec![entry(2, b"b")];
        let ledgers = [
            (ValidatorId(0), a.as_slice()),
            (ValidatorId(1), b.as_slice()),
            (ValidatorId(2), c.as_slice()),
        ];
        assert!(check_no_fork(ledgers).is_ok());
    }

    #[test]
    fn test_reports_first_conflict() {
        let a = vec![entry(1, b"a"), entry(2, b"b")];
        let b = vec![entry(1, b"a"), entry(2, b"x")];
        let err = check_no_fork([
            (ValidatorId(0), a.as_slice()),
            (ValidatorId(3), b.as_slice()),
        ])
        .unwrap_err();

        assert_eq!(err.height, 2);
        assert_eq!(err.first_validator, ValidatorId(0));
        assert_eq!(err.second_validator, ValidatorId(3));
        assert_eq!(err.second_hash, Hash::from_bytes(b"x"));
        assert!(err.to_string().starts_with("fork at height 2: N0 finalized"));
    }
}
