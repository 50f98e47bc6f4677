//! # Merkle Proofs
//!
//! Partial merkle trees and the merkleblock container used for compact
//! transaction-inclusion proofs.
//!
//! ## Components
//! - **Partial**: build a proof from a matched leaf subset, extract and
//!   verify one against an expected root
//! - **Block**: 80-byte block header codec and the merkleblock wire format
//!
//! ## Security
//! - Flag bits and hashes must be consumed exactly; leftovers are corruption
//! - Identical sibling hashes are rejected outright (forged-inclusion vector)
//! - Transaction counts are capped before any allocation

pub mod block;
pub mod partial;

pub use block::{BlockHeader, MerkleBlock};
pub use partial::{Extraction, PartialMerkleTree};

use crate::utils::hash;

/// Root of a full merkle tree over `leaves`, duplicating the last node at
/// odd-width levels. `None` for an empty leaf set.
pub fn merkle_root(leaves: &[[u8; 32]]) -> Option<[u8; 32]> {
    if leaves.is_empty() {
        return None;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(hash::sha256d_pair(left, right));
        }
        level = next;
    }
    Some(level[0])
}
