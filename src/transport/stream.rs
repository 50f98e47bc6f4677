//! Per-direction cipher state and the key-derivation schedule.
//!
//! One `CipherStream` covers one direction of one connection. Its keys come
//! from an ECDH agreement between the local ephemeral secret for that
//! direction and the peer's ephemeral public key for the mirror direction:
//!
//! ```text
//! PRK = HKDF-Extract(salt = "bitcoinecdh", IKM = secret || cipher_id)
//! k1         = HKDF-Expand(PRK, "BitcoinK1", 32)        length key
//! k2         = HKDF-Expand(PRK, "BitcoinK2", 32)        AEAD key
//! session_id = HKDF-Expand(PRK, "BitcoinSessionID", 32)
//! ```
//!
//! Rekeying replaces k1 and k2 with `SHA256(session_id || old_key)`; the
//! session ID and the running sequence number are never reset, so both
//! sides stay nonce-synchronized across rekeys.

use crate::config::TransportConfig;
use crate::error::{ProtocolError, Result};
use crate::transport::cipher;
use crate::utils::hash;
use hkdf::Hkdf;
use secp256k1::ecdh::SharedSecret;
use secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use sha2::Sha256;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::debug;
use zeroize::Zeroize;

pub(crate) static SECP: LazyLock<Secp256k1<All>> = LazyLock::new(Secp256k1::new);

const HKDF_SALT: &[u8] = b"bitcoinecdh";
const INFO_STREAM_KEY: &[u8] = b"BitcoinK1";
const INFO_AEAD_KEY: &[u8] = b"BitcoinK2";
const INFO_SESSION_ID: &[u8] = b"BitcoinSessionID";

/// Directional cipher state: two keys, a session ID, and packet counters.
pub struct CipherStream {
    stream_key: [u8; 32],
    aead_key: [u8; 32],
    session_id: [u8; 32],
    seq: u32,
    processed: u64,
    last_rekey: Instant,
}

impl Drop for CipherStream {
    fn drop(&mut self) {
        self.stream_key.zeroize();
        self.aead_key.zeroize();
    }
}

impl std::fmt::Debug for CipherStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherStream")
            .field("seq", &self.seq)
            .field("processed", &self.processed)
            .finish_non_exhaustive()
    }
}

impl CipherStream {
    /// Derive directional keys from our ephemeral secret and the peer's
    /// ephemeral public key for the mirror direction.
    pub fn new(secret: &SecretKey, peer: &PublicKey, cipher_id: u8) -> Result<Self> {
        let shared = SharedSecret::new(peer, secret);

        let mut ikm = [0u8; 33];
        ikm[..32].copy_from_slice(&shared.secret_bytes());
        ikm[32] = cipher_id;

        let hkdf = Hkdf::<Sha256>::new(Some(HKDF_SALT), &ikm);
        let mut stream_key = [0u8; 32];
        let mut aead_key = [0u8; 32];
        let mut session_id = [0u8; 32];
        hkdf.expand(INFO_STREAM_KEY, &mut stream_key)
            .map_err(|_| ProtocolError::HandshakeError("key derivation failed"))?;
        hkdf.expand(INFO_AEAD_KEY, &mut aead_key)
            .map_err(|_| ProtocolError::HandshakeError("key derivation failed"))?;
        hkdf.expand(INFO_SESSION_ID, &mut session_id)
            .map_err(|_| ProtocolError::HandshakeError("key derivation failed"))?;
        ikm.zeroize();

        Ok(Self {
            stream_key,
            aead_key,
            session_id,
            seq: 0,
            processed: 0,
            last_rekey: Instant::now(),
        })
    }

    pub fn session_id(&self) -> &[u8; 32] {
        &self.session_id
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Encrypt or decrypt a size prefix in place at the current sequence.
    pub fn crypt_length(&self, buf: &mut [u8]) {
        cipher::crypt_length(&self.stream_key, self.seq, buf);
    }

    /// Seal a packet body in place at the current sequence.
    pub fn seal(&self, buf: &mut [u8]) -> Result<[u8; 16]> {
        cipher::seal(&self.aead_key, self.seq, buf)
    }

    /// Authenticate and decrypt a packet body in place.
    pub fn open(&self, buf: &mut [u8], tag: &[u8; 16]) -> Result<()> {
        cipher::open(&self.aead_key, self.seq, buf, tag)
    }

    /// Advance to the next packet: bump the sequence (wrapping at 2^32)
    /// and charge the packet's wire size against the rekey watermark.
    pub fn advance(&mut self, wire_bytes: usize) {
        self.seq = self.seq.wrapping_add(1);
        self.processed = self.processed.saturating_add(wire_bytes as u64);
    }

    /// Whether the byte or time watermark has been crossed since the last
    /// rekey. Checked on every outbound packet.
    pub fn should_rekey(&self, config: &TransportConfig) -> bool {
        self.processed > config.rekey_max_bytes
            || self.last_rekey.elapsed() >= config.rekey_interval
    }

    /// Replace both keys with `SHA256(session_id || old_key)`. The
    /// sequence number continues uninterrupted.
    pub fn rekey(&mut self) {
        self.stream_key = chained_key(&self.session_id, &self.stream_key);
        self.aead_key = chained_key(&self.session_id, &self.aead_key);
        self.processed = 0;
        self.last_rekey = Instant::now();
        debug!(seq = self.seq, "stream rekeyed");
    }
}

fn chained_key(session_id: &[u8; 32], old_key: &[u8; 32]) -> [u8; 32] {
    let mut material = [0u8; 64];
    material[..32].copy_from_slice(session_id);
    material[32..].copy_from_slice(old_key);
    let next = hash::sha256(&material);
    material.zeroize();
    next
}
