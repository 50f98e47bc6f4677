//! Block header and merkleblock wire codecs.

use crate::config::MAX_MERKLE_TX_COUNT;
use crate::core::{BufferReader, BufferWriter};
use crate::error::{ProtocolError, Result};
use crate::merkle::partial::{Extraction, PartialMerkleTree};
use crate::utils::hash;
use std::sync::OnceLock;

/// Serialized flag-byte-string ceiling: worst case is one bit per node of a
/// maximally wide tree, which is under 2x the leaf count.
const MAX_FLAG_BYTES: usize = (MAX_MERKLE_TX_COUNT as usize / 8 + 1) * 2;

/// 80-byte block header, all integer fields little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: [u8; 32],
    pub merkle_root: [u8; 32],
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub const SERIALIZED_LEN: usize = 80;

    pub fn write(&self, writer: &mut BufferWriter) {
        writer
            .write_i32(self.version)
            .write_bytes(&self.prev_block)
            .write_bytes(&self.merkle_root)
            .write_u32(self.time)
            .write_u32(self.bits)
            .write_u32(self.nonce);
    }

    pub fn read(reader: &mut BufferReader) -> Result<Self> {
        Ok(Self {
            version: reader.read_i32()?,
            prev_block: reader.read_bytes_array::<32>()?,
            merkle_root: reader.read_bytes_array::<32>()?,
            time: reader.read_u32()?,
            bits: reader.read_u32()?,
            nonce: reader.read_u32()?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = BufferWriter::new();
        self.write(&mut writer);
        writer.render(false)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = BufferReader::new(data);
        Self::read(&mut reader)
    }

    /// Block hash: double-SHA256 of the 80 serialized bytes.
    pub fn hash(&self) -> [u8; 32] {
        hash::sha256d(&self.serialize())
    }
}

/// A block header plus a partial merkle tree proving which of the block's
/// transactions matched a filter.
///
/// Verification is memoized: the result, matched hashes, and index map are
/// populated together on first extraction and never partially visible.
#[derive(Debug)]
pub struct MerkleBlock {
    pub header: BlockHeader,
    pub total_txs: u32,
    pub tree: PartialMerkleTree,
    extraction: OnceLock<Option<Extraction>>,
}

impl Clone for MerkleBlock {
    fn clone(&self) -> Self {
        Self {
            header: self.header,
            total_txs: self.total_txs,
            tree: self.tree.clone(),
            extraction: self.extraction.clone(),
        }
    }
}

impl PartialEq for MerkleBlock {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
            && self.total_txs == other.total_txs
            && self.tree == other.tree
    }
}

impl Eq for MerkleBlock {}

impl MerkleBlock {
    pub fn new(header: BlockHeader, total_txs: u32, tree: PartialMerkleTree) -> Self {
        Self {
            header,
            total_txs,
            tree,
            extraction: OnceLock::new(),
        }
    }

    /// Build a merkleblock for `header` from all leaf hashes and the
    /// matched subset.
    pub fn from_matches(header: BlockHeader, leaves: &[[u8; 32]], matches: &[bool]) -> Result<Self> {
        let tree = PartialMerkleTree::from_matches(leaves, matches)?;
        Ok(Self::new(header, leaves.len() as u32, tree))
    }

    /// Verify the proof against the header's merkle root. The first call
    /// runs the extraction; later calls return the cached outcome.
    pub fn extract(&self) -> Result<&Extraction> {
        if self.extraction.get().is_none() {
            match self.tree.extract(&self.header.merkle_root) {
                Ok(extraction) => {
                    let _ = self.extraction.set(Some(extraction));
                }
                Err(err) => {
                    let _ = self.extraction.set(None);
                    return Err(err);
                }
            }
        }
        match self.extraction.get() {
            Some(Some(extraction)) => Ok(extraction),
            _ => Err(ProtocolError::InvalidMerkleTree(
                "partial tree failed verification",
            )),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.extract().is_ok()
    }

    /// Whether the proof attests inclusion of `tx_hash`.
    pub fn has_tx(&self, tx_hash: &[u8; 32]) -> bool {
        self.extract()
            .map(|extraction| extraction.contains(tx_hash))
            .unwrap_or(false)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = BufferWriter::new();
        self.header.write(&mut writer);
        writer
            .write_u32(self.total_txs)
            .write_varint(self.tree.hashes().len() as u64);
        for hash in self.tree.hashes() {
            writer.write_bytes(hash);
        }
        writer.write_var_bytes(self.tree.flags());
        writer.render(false)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = BufferReader::new(data);
        let header = BlockHeader::read(&mut reader)?;
        let total_txs = reader.read_u32()?;

        let hash_count = reader.read_varint()?;
        if hash_count > MAX_MERKLE_TX_COUNT as u64 {
            return Err(ProtocolError::OversizedAllocation {
                claimed: hash_count,
                limit: MAX_MERKLE_TX_COUNT as u64,
            });
        }
        let mut hashes = Vec::with_capacity(hash_count as usize);
        for _ in 0..hash_count {
            hashes.push(reader.read_bytes_array::<32>()?);
        }
        let flags = reader.read_var_bytes(MAX_FLAG_BYTES)?;

        Ok(Self::new(
            header,
            total_txs,
            PartialMerkleTree::new(total_txs, hashes, flags),
        ))
    }
}
