//! Partial merkle tree build and extraction.
//!
//! A proof over N leaves encodes one flag bit per visited node in a
//! top-down traversal (1 = descend or matched leaf, 0 = pruned) plus the
//! hashes of pruned subtrees, packed LSB-first. Build and extraction walk
//! the same traversal order, so extraction is exact-inverse: every bit and
//! hash must be consumed with nothing left over.
//!
//! Both walks thread an explicit cursor struct through the recursion; no
//! shared mutable state outside it.

use crate::config::MAX_MERKLE_TX_COUNT;
use crate::error::{ProtocolError, Result};
use crate::utils::hash;
use std::collections::HashMap;

/// Compact proof that a matched subset of a block's transactions hashes up
/// to the block's merkle root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialMerkleTree {
    total: u32,
    hashes: Vec<[u8; 32]>,
    flags: Vec<u8>,
}

/// Outcome of a successful extraction: the recomputed root plus the matched
/// leaves in traversal order and their positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub root: [u8; 32],
    pub matches: Vec<[u8; 32]>,
    pub indexes: Vec<u32>,
}

impl Extraction {
    /// Position of a matched transaction hash within the block, if present.
    pub fn index_of(&self, hash: &[u8; 32]) -> Option<u32> {
        self.index_map().get(hash).copied()
    }

    pub fn contains(&self, hash: &[u8; 32]) -> bool {
        self.matches.iter().any(|m| m == hash)
    }

    pub fn index_map(&self) -> HashMap<[u8; 32], u32> {
        self.matches
            .iter()
            .copied()
            .zip(self.indexes.iter().copied())
            .collect()
    }
}

impl PartialMerkleTree {
    pub fn new(total: u32, hashes: Vec<[u8; 32]>, flags: Vec<u8>) -> Self {
        Self {
            total,
            hashes,
            flags,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn hashes(&self) -> &[[u8; 32]] {
        &self.hashes
    }

    pub fn flags(&self) -> &[u8] {
        &self.flags
    }

    /// Build a proof from all leaf hashes and a parallel match vector.
    pub fn from_matches(leaves: &[[u8; 32]], matches: &[bool]) -> Result<Self> {
        if leaves.is_empty() {
            return Err(ProtocolError::InvalidMerkleTree("empty leaf set"));
        }
        if leaves.len() != matches.len() {
            return Err(ProtocolError::InvalidMerkleTree(
                "match vector length does not equal leaf count",
            ));
        }
        if leaves.len() as u64 > MAX_MERKLE_TX_COUNT as u64 {
            return Err(ProtocolError::OversizedAllocation {
                claimed: leaves.len() as u64,
                limit: MAX_MERKLE_TX_COUNT as u64,
            });
        }

        let total = leaves.len() as u32;
        let mut builder = TreeBuilder {
            total,
            leaves,
            matches,
            bits: Vec::new(),
            hashes: Vec::new(),
        };
        builder.descend(tree_height(total), 0);

        let mut flags = vec![0u8; builder.bits.len().div_ceil(8)];
        for (i, bit) in builder.bits.iter().enumerate() {
            if *bit {
                flags[i / 8] |= 1 << (i % 8);
            }
        }

        Ok(Self {
            total,
            hashes: builder.hashes,
            flags,
        })
    }

    /// Verify the proof against `expected_root`, recovering the matched
    /// leaves. Any consistency failure rejects the whole proof.
    pub fn extract(&self, expected_root: &[u8; 32]) -> Result<Extraction> {
        self.extract_with_limit(expected_root, MAX_MERKLE_TX_COUNT)
    }

    pub fn extract_with_limit(
        &self,
        expected_root: &[u8; 32],
        max_tx_count: u32,
    ) -> Result<Extraction> {
        if self.total == 0 {
            return Err(ProtocolError::InvalidMerkleTree("zero transaction count"));
        }
        if self.total > max_tx_count {
            return Err(ProtocolError::OversizedAllocation {
                claimed: self.total as u64,
                limit: max_tx_count as u64,
            });
        }
        if self.hashes.len() as u64 > self.total as u64 {
            return Err(ProtocolError::InvalidMerkleTree(
                "more hashes than transactions",
            ));
        }
        if self.flags.len() * 8 < self.hashes.len() {
            return Err(ProtocolError::InvalidMerkleTree(
                "fewer flag bits than hashes",
            ));
        }

        let mut cursor = TreeExtractor {
            total: self.total,
            hashes: &self.hashes,
            flags: &self.flags,
            bit_pos: 0,
            hash_pos: 0,
            matches: Vec::new(),
            indexes: Vec::new(),
        };
        let root = cursor.ascend(tree_height(self.total), 0)?;

        if cursor.hash_pos != self.hashes.len() {
            return Err(ProtocolError::InvalidMerkleTree("unconsumed hashes"));
        }
        // Only final-byte padding may remain, and it must be zero.
        if cursor.bit_pos.div_ceil(8) != self.flags.len() {
            return Err(ProtocolError::InvalidMerkleTree("unconsumed flag bytes"));
        }
        for i in cursor.bit_pos..self.flags.len() * 8 {
            if self.flags[i / 8] & (1 << (i % 8)) != 0 {
                return Err(ProtocolError::InvalidMerkleTree("nonzero padding bits"));
            }
        }
        if root != *expected_root {
            return Err(ProtocolError::MerkleRootMismatch);
        }

        Ok(Extraction {
            root,
            matches: cursor.matches,
            indexes: cursor.indexes,
        })
    }
}

/// Smallest height at which the tree narrows to a single node.
fn tree_height(total: u32) -> u32 {
    let mut height = 0;
    while level_width(total, height) > 1 {
        height += 1;
    }
    height
}

/// Node count at `height`; height 0 is the leaf level.
fn level_width(total: u32, height: u32) -> u32 {
    (total + (1 << height) - 1) >> height
}

struct TreeBuilder<'a> {
    total: u32,
    leaves: &'a [[u8; 32]],
    matches: &'a [bool],
    bits: Vec<bool>,
    hashes: Vec<[u8; 32]>,
}

impl TreeBuilder<'_> {
    /// Top-down traversal emitting one bit per visited node; pruned
    /// subtrees emit their hash and stop.
    fn descend(&mut self, height: u32, pos: u32) {
        let first = (pos as u64) << height;
        let last = ((pos as u64 + 1) << height).min(self.total as u64);
        let interesting = (first..last).any(|i| self.matches[i as usize]);

        self.bits.push(interesting);

        if height == 0 || !interesting {
            self.hashes.push(self.subtree_hash(height, pos));
        } else {
            self.descend(height - 1, pos * 2);
            if pos * 2 + 1 < level_width(self.total, height - 1) {
                self.descend(height - 1, pos * 2 + 1);
            }
        }
    }

    /// Hash of the full subtree rooted at (height, pos), duplicating the
    /// left child where the level has no right sibling.
    fn subtree_hash(&self, height: u32, pos: u32) -> [u8; 32] {
        if height == 0 {
            return self.leaves[pos as usize];
        }
        let left = self.subtree_hash(height - 1, pos * 2);
        let right = if pos * 2 + 1 < level_width(self.total, height - 1) {
            self.subtree_hash(height - 1, pos * 2 + 1)
        } else {
            left
        };
        hash::sha256d_pair(&left, &right)
    }
}

struct TreeExtractor<'a> {
    total: u32,
    hashes: &'a [[u8; 32]],
    flags: &'a [u8],
    bit_pos: usize,
    hash_pos: usize,
    matches: Vec<[u8; 32]>,
    indexes: Vec<u32>,
}

impl TreeExtractor<'_> {
    fn next_bit(&mut self) -> Result<bool> {
        if self.bit_pos >= self.flags.len() * 8 {
            return Err(ProtocolError::InvalidMerkleTree("flag bits exhausted"));
        }
        let bit = self.flags[self.bit_pos / 8] & (1 << (self.bit_pos % 8)) != 0;
        self.bit_pos += 1;
        Ok(bit)
    }

    fn next_hash(&mut self) -> Result<[u8; 32]> {
        let hash = self
            .hashes
            .get(self.hash_pos)
            .copied()
            .ok_or(ProtocolError::InvalidMerkleTree("hash list exhausted"))?;
        self.hash_pos += 1;
        Ok(hash)
    }

    /// Mirror of the build traversal, reconstructing each subtree root.
    fn ascend(&mut self, height: u32, pos: u32) -> Result<[u8; 32]> {
        let interesting = self.next_bit()?;

        if height == 0 || !interesting {
            let hash = self.next_hash()?;
            if height == 0 && interesting {
                self.matches.push(hash);
                self.indexes.push(pos);
            }
            return Ok(hash);
        }

        let left = self.ascend(height - 1, pos * 2)?;
        let right = if pos * 2 + 1 < level_width(self.total, height - 1) {
            let right = self.ascend(height - 1, pos * 2 + 1)?;
            if right == left {
                return Err(ProtocolError::DuplicateSubtreeHash);
            }
            right
        } else {
            left
        };
        Ok(hash::sha256d_pair(&left, &right))
    }
}
