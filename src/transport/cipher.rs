//! Symmetric primitives for the encrypted transport.
//!
//! Each packet direction carries two independent 32-byte keys: a plain
//! ChaCha20 key that hides only the 4-byte length prefix, and a
//! ChaCha20-Poly1305 key that seals the packet body. Both use the same
//! per-packet nonce: all zeros with the low 32 bits replaced by the
//! little-endian sequence number. Keys stay fixed between rekeys; only the
//! nonce changes per packet.

use crate::error::{ProtocolError, Result};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce, Tag};

/// Poly1305 authentication tag width.
pub const TAG_LEN: usize = 16;

/// Encrypted size-prefix width.
pub const LENGTH_LEN: usize = 4;

/// Per-packet nonce: zeros with the sequence number in the low four bytes.
pub fn nonce_for(seq: u32) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..4].copy_from_slice(&seq.to_le_bytes());
    nonce
}

/// XOR `buf` with the ChaCha20 keystream for (`key`, `seq`). Symmetric:
/// used for both encrypting and decrypting the length prefix.
pub fn crypt_length(key: &[u8; 32], seq: u32, buf: &mut [u8]) {
    let nonce = nonce_for(seq);
    let mut cipher = ChaCha20::new(key.into(), (&nonce).into());
    cipher.apply_keystream(buf);
}

/// Encrypt `buf` in place, returning the detached tag.
pub fn seal(key: &[u8; 32], seq: u32, buf: &mut [u8]) -> Result<[u8; 16]> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = nonce_for(seq);
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", buf)
        .map_err(|_| ProtocolError::AuthenticationFailure)?;
    Ok(tag.into())
}

/// Authenticate `buf` against `tag`, then decrypt in place. The tag is
/// computed over the ciphertext, so a forgery is rejected before any
/// attacker-controlled bytes are decrypted.
pub fn open(key: &[u8; 32], seq: u32, buf: &mut [u8], tag: &[u8; 16]) -> Result<()> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = nonce_for(seq);
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(&nonce), b"", buf, Tag::from_slice(tag))
        .map_err(|_| ProtocolError::AuthenticationFailure)
}
