//! Domain-separated signing messages.
//!
//! Every signed object is encoded as a tuple of fields. The encoding is
//! length-prefixed and order-preserving, so two distinct field tuples never
//! produce the same bytes. The domain tag is prepended so that a signature
//! produced in one context (e.g. a transaction) never verifies in another
//! (e.g. a vote).

use crate::{Hash, KeyPair, PublicKey, Signature, ValidatorId, VotePhase};

/// Domain tag for transaction signatures.
pub const DOMAIN_TRANSACTION: &[u8] = b"TX:tendersim";

/// Domain tag for block header signatures.
pub const DOMAIN_HEADER: &[u8] = b"HEADER:tendersim";

/// Domain tag for vote signatures.
pub const DOMAIN_VOTE: &[u8] = b"VOTE:tendersim";

/// Domain tag for block identities. Not a signing domain.
pub const DOMAIN_BLOCK_ID: &[u8] = b"BLOCK:tendersim";

/// Encode a field tuple: `u16` BE count, then `u32` BE length + bytes per field.
pub fn encode_fields(fields: &[&[u8]]) -> Vec<u8> {
    let total: usize = fields.iter().map(|f| f.len() + 4).sum();
    let mut out = Vec::with_capacity(2 + total);
    out.extend_from_slice(&(fields.len() as u16).to_be_bytes());
    for field in fields {
        out.extend_from_slice(&(field.len() as u32).to_be_bytes());
        out.extend_from_slice(field);
    }
    out
}

/// Build the bytes actually signed: `domain || ':' || encode_fields(fields)`.
pub fn signing_message(domain: &[u8], fields: &[&[u8]]) -> Vec<u8> {
    let encoded = encode_fields(fields);
    let mut msg = Vec::with_capacity(domain.len() + 1 + encoded.len());
    msg.extend_from_slice(domain);
    msg.push(b':');
    msg.extend_from_slice(&encoded);
    msg
}

/// Sign a field tuple under a domain tag.
pub fn sign(domain: &[u8], fields: &[&[u8]], key: &KeyPair) -> Signature {
    key.sign(&signing_message(domain, fields))
}

/// Verify a field tuple signature under a domain tag.
pub fn verify(domain: &[u8], fields: &[&[u8]], key: &PublicKey, signature: &Signature) -> bool {
    key.verify(&signing_message(domain, fields), signature)
}

/// Signing message for a transaction: (sender, key, value, nonce).
pub fn transaction_message(sender: ValidatorId, key: &str, value: &str, nonce: u64) -> Vec<u8> {
    let sender = sender.to_string();
    signing_message(
        DOMAIN_TRANSACTION,
        &[
            sender.as_bytes(),
            key.as_bytes(),
            value.as_bytes(),
            &nonce.to_be_bytes(),
        ],
    )
}

/// Signing message for a block header: (parent hash, height, commitment, proposer).
pub fn header_message(
    parent_hash: &Hash,
    height: u64,
    state_commitment: &Hash,
    proposer: ValidatorId,
) -> Vec<u8> {
    let proposer = proposer.to_string();
    signing_message(
        DOMAIN_HEADER,
        &[
            parent_hash.as_bytes(),
            &height.to_be_bytes(),
            state_commitment.as_bytes(),
            proposer.as_bytes(),
        ],
    )
}

/// Signing message for a vote: (validator, height, block hash, phase).
pub fn vote_message(
    validator: ValidatorId,
    height: u64,
    block_hash: &Hash,
    phase: VotePhase,
) -> Vec<u8> {
    let validator = validator.to_string();
    signing_message(
        DOMAIN_VOTE,
        &[
            validator.as_bytes(),
            &height.to_be_bytes(),
            block_hash.as_bytes(),
            phase.as_str().as_bytes(),
        ],
    )
}

/// Block identity: derived from (parent hash, height, commitment).
///
/// The proposer and signature are not part of the identity.
pub fn block_id(parent_hash: &Hash, height: u64, state_commitment: &Hash) -> Hash {
    Hash::from_bytes(&signing_message(
        DOMAIN_BLOCK_ID,
        &[
            parent_hash.as_bytes(),
            &height.to_be_bytes(),
            state_commitment.as_bytes(),
        ],
    ))
}
