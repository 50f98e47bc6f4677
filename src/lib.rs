//! # Coinwire
//!
//! Encrypted peer transport, binary codec, merkle proofs, and HD key
//! primitives for bitcoin-style p2p networks.
//!
//! ## Subsystems
//! - **Core**: deterministic binary reader/writer with compact varints,
//!   checksum spans, and strict bounds checking
//! - **Transport**: BIP151-style encrypted sessions — ECDH handshake,
//!   ChaCha20-Poly1305 framing, automatic rekeying
//! - **Merkle**: partial merkle trees and the merkleblock codec for
//!   compact inclusion proofs
//! - **HD**: BIP32 key trees and BIP39 mnemonic seeds
//!
//! All parsing of untrusted input is allocation-aware: claimed lengths are
//! validated against configured ceilings before any proportional work.
//!
//! ## Quick Start
//! ```no_run
//! use coinwire::config::{TransportConfig, CIPHER_CHACHA20_POLY1305};
//! use coinwire::transport::EncryptedSession;
//!
//! # fn main() -> coinwire::Result<()> {
//! let mut local = EncryptedSession::new(TransportConfig::default(), CIPHER_CHACHA20_POLY1305);
//! let init = local.to_encinit()?;
//! // send `init` to the peer, apply their messages via encinit()/encack(),
//! // then exchange packets with packet() and feed().
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod hd;
pub mod merkle;
pub mod transport;
pub mod utils;

pub use config::{Network, ProtocolConfig, TransportConfig};
pub use core::{BufferReader, BufferWriter};
pub use error::{ProtocolError, Result};
pub use hd::{DerivationPath, HDPrivateKey, HDPublicKey, Language, Mnemonic};
pub use merkle::{BlockHeader, MerkleBlock, PartialMerkleTree};
pub use transport::{EncryptedSession, PacketEvent};
