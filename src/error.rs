//! # Error Types
//!
//! Comprehensive error handling for the wire codec, HD derivation, merkle
//! proofs, and the encrypted transport.
//!
//! ## Error Categories
//! - **Bounds/format errors**: reader underrun, bad varint, malformed paths
//! - **Checksum/integrity errors**: codec checksums, merkle roots, mnemonics
//! - **Protocol-sequencing errors**: handshake steps out of order, AEAD tag mismatch
//! - **Resource-exhaustion guards**: oversized claimed lengths rejected before allocation
//!
//! Programming-contract violations (rendering a writer twice, popping an
//! empty span stack, waiting on an already-completed handshake) are *not*
//! represented here: they indicate caller bugs and panic via assertions.
//!
//! All errors implement `std::error::Error` for interoperability.

use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Handshake sequencing
    pub const ERR_INIT_TWICE: &str = "encinit already sent";
    pub const ERR_INIT_RECEIVED_TWICE: &str = "encinit already received";
    pub const ERR_ACK_TWICE: &str = "encack already sent";
    pub const ERR_ACK_RECEIVED_TWICE: &str = "encack already received";
    pub const ERR_ACK_BEFORE_INIT: &str = "encack received before encinit was sent";
    pub const ERR_ACK_WITHOUT_OUTPUT: &str = "encack requires an initialized output stream";
    pub const ERR_REKEY_BEFORE_HANDSHAKE: &str = "rekey sentinel before handshake completion";
    pub const ERR_STREAM_UNINITIALIZED: &str = "cipher stream not initialized";
}

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Buffer underrun: needed {needed} bytes, {available} available")]
    BufferUnderrun { needed: usize, available: usize },

    #[error("Seek out of bounds: delta {delta} from offset {offset} in {len}-byte buffer")]
    SeekOutOfBounds {
        delta: i64,
        offset: usize,
        len: usize,
    },

    #[error("Length {claimed} exceeds limit {limit}")]
    OversizedAllocation { claimed: u64, limit: u64 },

    #[error("Non-canonical varint encoding")]
    NonCanonicalVarInt,

    #[error("Negative or out-of-range value for varint field")]
    InvalidVarInt,

    #[error("No NUL terminator before end of buffer")]
    NoNullTerminator,

    #[error("Invalid UTF-8 in string field")]
    InvalidString,

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("Derivation depth exceeds 255")]
    DepthExceeded,

    #[error("Hardened derivation requires a private key")]
    HardenedFromPublic,

    #[error("Unknown extended key version prefix: {0:#010x}")]
    UnknownKeyPrefix(u32),

    #[error("Extended key type does not match version prefix")]
    KeyTypeMismatch,

    #[error("Invalid seed length: {0} bytes")]
    InvalidSeed(usize),

    #[error("Base58 decoding failed: {0}")]
    Base58(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Unknown mnemonic language index: {0}")]
    UnknownLanguage(u8),

    #[error("Elliptic curve error: {0}")]
    Secp(#[from] secp256k1::Error),

    #[error("Invalid partial merkle tree: {0}")]
    InvalidMerkleTree(&'static str),

    #[error("Merkle root mismatch")]
    MerkleRootMismatch,

    #[error("Duplicate sibling hash in partial merkle tree")]
    DuplicateSubtreeHash,

    #[error("Handshake failed: {0}")]
    HandshakeError(&'static str),

    #[error("Cipher mismatch: expected {expected}, got {got}")]
    CipherMismatch { expected: u8, got: u8 },

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Session destroyed")]
    SessionDestroyed,

    #[error("Encrypted packet size {0} out of range")]
    BadPacketSize(u32),

    #[error("Packet authentication failed")]
    AuthenticationFailure,

    #[error("Invalid command string")]
    InvalidCommand,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// True for failures that indicate hostile or corrupted remote input
    /// rather than a local bug: the owning connection should be torn down.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::AuthenticationFailure
                | ProtocolError::BadPacketSize(_)
                | ProtocolError::ChecksumMismatch
                | ProtocolError::BufferUnderrun { .. }
                | ProtocolError::OversizedAllocation { .. }
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
