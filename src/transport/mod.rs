//! # Encrypted Transport
//!
//! BIP151-style encrypted peer channel: an ECDH handshake keys two
//! independent cipher streams (one per direction), after which every packet
//! is a stream-encrypted length prefix plus an AEAD-sealed body.
//!
//! ## Components
//! - **Session**: handshake state machine, inbound reframing, rekey policy
//! - **Stream**: per-direction keys, sequence numbers, and the HKDF schedule
//! - **Cipher**: ChaCha20 length masking and ChaCha20-Poly1305 sealing
//!
//! ## Security
//! - Tags are verified before any ciphertext is decrypted
//! - Size prefixes outside `[6, 3 * max_message_size]` kill the connection
//! - Keys rotate automatically by byte volume and wall time
//! - Sequence numbers advance even for rejected packets, keeping both
//!   sides nonce-synchronized

pub mod cipher;
pub mod session;
pub mod stream;

pub use session::{
    EncryptedSession, HandshakeCompletion, Outbound, PacketEvent, ENCACK_COMMAND, REKEY_SENTINEL,
};
pub use stream::CipherStream;
