//! Encrypted session state machine: handshake, framing, and rekeying.
//!
//! ## Handshake
//! Each side holds two ephemeral keypairs, one per direction. `to_encinit`
//! advertises the input keypair; the peer's `encinit` uses it to key their
//! output stream. `to_encack` advertises the output keypair; the peer's
//! `encack` keys their input stream from it. The session is ready once all
//! four steps have happened, and session IDs then match crosswise: our
//! input stream and the peer's output stream share one ID.
//!
//! ## Framing
//! A frame is `enc(len) || aead(inner) || tag`, where `inner` is one or
//! more `(command, length, body)` sub-messages. Inbound bytes accumulate
//! across arbitrary chunk boundaries; the authentication tag is verified
//! before the body is ever decrypted, and the sequence number advances even
//! on a rejected packet so both sides stay nonce-synchronized.
//!
//! ## Rekeying
//! Checked on every outbound packet. The announcement is an `encack`
//! sub-message carrying an all-zero key, sealed under the *old* keys;
//! the output stream switches keys immediately after.

use crate::config::{MAX_COMMAND_LENGTH, TransportConfig};
use crate::core::{BufferReader, BufferWriter};
use crate::error::constants::*;
use crate::error::{ProtocolError, Result};
use crate::transport::cipher::{LENGTH_LEN, TAG_LEN};
use crate::transport::stream::{CipherStream, SECP};
use bytes::BytesMut;
use secp256k1::{PublicKey, SecretKey};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The all-zero public-key slot that marks an `encack` as a rekey
/// notification rather than a handshake step.
pub const REKEY_SENTINEL: [u8; 33] = [0u8; 33];

/// Command string used for handshake acks and rekey announcements.
pub const ENCACK_COMMAND: &str = "encack";

/// One decrypted sub-message handed up to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketEvent {
    pub command: String,
    pub payload: Vec<u8>,
}

/// An outbound packet, possibly preceded by a rekey announcement that must
/// be written to the wire first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub rekey: Option<Vec<u8>>,
    pub frame: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeSignal {
    Pending,
    Ready,
    Destroyed,
}

/// Waiter handle for handshake completion, detached from the session so
/// the session can keep processing messages while a task awaits readiness.
pub struct HandshakeCompletion {
    rx: watch::Receiver<HandshakeSignal>,
    initially_ready: bool,
}

impl HandshakeCompletion {
    /// Block until the handshake completes or `timeout` elapses.
    ///
    /// # Panics
    /// If the handshake had already completed when this handle was
    /// created; waiting on a finished handshake is a caller bug.
    pub async fn wait(mut self, timeout: Duration) -> Result<()> {
        assert!(
            !self.initially_ready,
            "wait() called after handshake already completed"
        );

        let outcome = tokio::time::timeout(timeout, async {
            loop {
                match *self.rx.borrow() {
                    HandshakeSignal::Ready => return Ok(()),
                    HandshakeSignal::Destroyed => return Err(ProtocolError::SessionDestroyed),
                    HandshakeSignal::Pending => {}
                }
                if self.rx.changed().await.is_err() {
                    return Err(ProtocolError::SessionDestroyed);
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::HandshakeTimeout),
        }
    }
}

/// One direction's ephemeral keypair and, once keyed, its cipher state.
struct StreamSlot {
    secret: SecretKey,
    public: PublicKey,
    cipher: Option<CipherStream>,
}

impl StreamSlot {
    fn generate() -> Self {
        let (secret, public) = SECP.generate_keypair(&mut rand::thread_rng());
        Self {
            secret,
            public,
            cipher: None,
        }
    }
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

/// Encrypted connection state for a single peer. Not shareable: confine
/// each session to one task and route messages to it.
pub struct EncryptedSession {
    config: TransportConfig,
    cipher_id: u8,
    input: StreamSlot,
    output: StreamSlot,
    init_sent: bool,
    init_received: bool,
    ack_sent: bool,
    ack_received: bool,
    destroyed: bool,
    state_tx: watch::Sender<HandshakeSignal>,
    accumulator: BytesMut,
    waiting: usize,
    pending_size: Option<usize>,
}

impl EncryptedSession {
    pub fn new(config: TransportConfig, cipher_id: u8) -> Self {
        let (state_tx, _) = watch::channel(HandshakeSignal::Pending);
        Self {
            config,
            cipher_id,
            input: StreamSlot::generate(),
            output: StreamSlot::generate(),
            init_sent: false,
            init_received: false,
            ack_sent: false,
            ack_received: false,
            destroyed: false,
            state_tx,
            accumulator: BytesMut::new(),
            waiting: LENGTH_LEN,
            pending_size: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.init_sent && self.init_received && self.ack_sent && self.ack_received
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn input_public_key(&self) -> [u8; 33] {
        self.input.public.serialize()
    }

    pub fn output_public_key(&self) -> [u8; 33] {
        self.output.public.serialize()
    }

    pub fn input_session_id(&self) -> Option<&[u8; 32]> {
        self.input.cipher.as_ref().map(CipherStream::session_id)
    }

    pub fn output_session_id(&self) -> Option<&[u8; 32]> {
        self.output.cipher.as_ref().map(CipherStream::session_id)
    }

    /// Handle for awaiting handshake completion.
    pub fn completion(&self) -> HandshakeCompletion {
        HandshakeCompletion {
            rx: self.state_tx.subscribe(),
            initially_ready: self.is_ready(),
        }
    }

    /// Produce the outbound `encinit` payload: our input-direction public
    /// key plus the cipher identifier. One-shot.
    pub fn to_encinit(&mut self) -> Result<Vec<u8>> {
        self.guard_alive()?;
        if self.init_sent {
            return Err(ProtocolError::HandshakeError(ERR_INIT_TWICE));
        }
        self.init_sent = true;

        let mut writer = BufferWriter::new();
        writer
            .write_bytes(&self.input.public.serialize())
            .write_u8(self.cipher_id);
        Ok(writer.render(false))
    }

    /// Apply the peer's `encinit`, keying our output stream.
    pub fn encinit(&mut self, payload: &[u8]) -> Result<()> {
        self.guard_alive()?;
        if self.init_received {
            return Err(ProtocolError::HandshakeError(ERR_INIT_RECEIVED_TWICE));
        }

        let mut reader = BufferReader::new(payload);
        let key_bytes = reader.read_bytes_array::<33>()?;
        let cipher = reader.read_u8()?;
        if reader.left() != 0 {
            return Err(ProtocolError::HandshakeError("trailing bytes in encinit"));
        }
        if cipher != self.cipher_id {
            return Err(ProtocolError::CipherMismatch {
                expected: self.cipher_id,
                got: cipher,
            });
        }

        let peer = PublicKey::from_slice(&key_bytes)?;
        self.output.cipher = Some(CipherStream::new(&self.output.secret, &peer, cipher)?);
        self.init_received = true;
        debug!("output stream keyed");
        self.maybe_complete();
        Ok(())
    }

    /// Produce the outbound `encack` payload: our output-direction public
    /// key. Requires the output stream to be keyed already. One-shot.
    pub fn to_encack(&mut self) -> Result<Vec<u8>> {
        self.guard_alive()?;
        if self.ack_sent {
            return Err(ProtocolError::HandshakeError(ERR_ACK_TWICE));
        }
        if self.output.cipher.is_none() {
            return Err(ProtocolError::HandshakeError(ERR_ACK_WITHOUT_OUTPUT));
        }
        self.ack_sent = true;

        let payload = self.output.public.serialize().to_vec();
        self.maybe_complete();
        Ok(payload)
    }

    /// Apply the peer's `encack`. An all-zero key is a rekey notification
    /// for our input stream; anything else completes the input handshake.
    pub fn encack(&mut self, payload: &[u8]) -> Result<()> {
        self.guard_alive()?;
        if payload.len() != 33 {
            return Err(ProtocolError::HandshakeError("bad encack length"));
        }

        if payload == &REKEY_SENTINEL[..] {
            if !self.is_ready() {
                return Err(ProtocolError::HandshakeError(ERR_REKEY_BEFORE_HANDSHAKE));
            }
            let input = self
                .input
                .cipher
                .as_mut()
                .ok_or(ProtocolError::HandshakeError(ERR_STREAM_UNINITIALIZED))?;
            input.rekey();
            return Ok(());
        }

        if !self.init_sent {
            return Err(ProtocolError::HandshakeError(ERR_ACK_BEFORE_INIT));
        }
        if self.ack_received {
            return Err(ProtocolError::HandshakeError(ERR_ACK_RECEIVED_TWICE));
        }

        let mut key_bytes = [0u8; 33];
        key_bytes.copy_from_slice(payload);
        let peer = PublicKey::from_slice(&key_bytes)?;
        self.input.cipher = Some(CipherStream::new(&self.input.secret, &peer, self.cipher_id)?);
        self.ack_received = true;
        debug!("input stream keyed");
        self.maybe_complete();
        Ok(())
    }

    /// Seal `payload` under `command` for the wire. If a rekey watermark
    /// has been crossed, `rekey` carries the announcement frame, which must
    /// be written before `frame`.
    pub fn packet(&mut self, command: &str, payload: &[u8]) -> Result<Outbound> {
        self.guard_ready()?;
        validate_command(command)?;
        if payload.len() > self.config.max_message_size {
            return Err(ProtocolError::OversizedAllocation {
                claimed: payload.len() as u64,
                limit: self.config.max_message_size as u64,
            });
        }

        let rekey = if self
            .output
            .cipher
            .as_ref()
            .is_some_and(|c| c.should_rekey(&self.config))
        {
            Some(self.rekey_output()?)
        } else {
            None
        };

        let frame = self.encrypt_frame(command, payload)?;
        Ok(Outbound { rekey, frame })
    }

    /// Force an immediate output rekey, returning the announcement frame.
    pub fn to_rekey(&mut self) -> Result<Vec<u8>> {
        self.guard_ready()?;
        self.rekey_output()
    }

    /// Ingest raw bytes off the socket, at arbitrary chunk boundaries, and
    /// emit every completed sub-message. Any error invalidates the
    /// connection; the session does not resynchronize.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<PacketEvent>> {
        self.guard_ready()?;
        self.accumulator.extend_from_slice(chunk);

        let mut events = Vec::new();
        while self.accumulator.len() >= self.waiting {
            let mut piece = self.accumulator.split_to(self.waiting);

            match self.pending_size.take() {
                None => {
                    let input = self
                        .input
                        .cipher
                        .as_mut()
                        .ok_or(ProtocolError::HandshakeError(ERR_STREAM_UNINITIALIZED))?;
                    input.crypt_length(&mut piece[..]);
                    let size = u32::from_le_bytes([piece[0], piece[1], piece[2], piece[3]]);

                    let max = 3 * self.config.max_message_size as u64;
                    if (size as u64) < 6 || size as u64 > max {
                        warn!(size, "rejected out-of-range size prefix");
                        return Err(ProtocolError::BadPacketSize(size));
                    }
                    self.pending_size = Some(size as usize);
                    self.waiting = size as usize + TAG_LEN;
                }
                Some(size) => {
                    let wire_bytes = LENGTH_LEN + size + TAG_LEN;
                    let mut tag = [0u8; TAG_LEN];
                    tag.copy_from_slice(&piece[size..]);
                    piece.truncate(size);

                    let input = self
                        .input
                        .cipher
                        .as_mut()
                        .ok_or(ProtocolError::HandshakeError(ERR_STREAM_UNINITIALIZED))?;
                    let opened = input.open(&mut piece[..], &tag);
                    // Advance even on a forged tag so a later handshake
                    // retry sees both sides at the same sequence.
                    input.advance(wire_bytes);
                    opened?;

                    self.parse_inner(&piece, &mut events)?;
                    self.waiting = LENGTH_LEN;
                }
            }
        }

        Ok(events)
    }

    /// Tear down the session: wipe cipher state and fail any waiters.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.input.cipher = None;
        self.output.cipher = None;
        self.input.secret.non_secure_erase();
        self.output.secret.non_secure_erase();
        self.accumulator.clear();
        let _ = self.state_tx.send(HandshakeSignal::Destroyed);
        info!("session destroyed");
    }

    fn guard_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(ProtocolError::SessionDestroyed);
        }
        Ok(())
    }

    fn guard_ready(&self) -> Result<()> {
        self.guard_alive()?;
        if !self.is_ready() {
            return Err(ProtocolError::HandshakeError(ERR_STREAM_UNINITIALIZED));
        }
        Ok(())
    }

    fn maybe_complete(&mut self) {
        if self.is_ready() {
            let _ = self.state_tx.send(HandshakeSignal::Ready);
            info!("handshake complete");
        }
    }

    /// Announce a rekey under the old keys, then switch the output stream.
    fn rekey_output(&mut self) -> Result<Vec<u8>> {
        let announcement = self.encrypt_frame(ENCACK_COMMAND, &REKEY_SENTINEL)?;
        let output = self
            .output
            .cipher
            .as_mut()
            .ok_or(ProtocolError::HandshakeError(ERR_STREAM_UNINITIALIZED))?;
        output.rekey();
        Ok(announcement)
    }

    fn encrypt_frame(&mut self, command: &str, payload: &[u8]) -> Result<Vec<u8>> {
        let output = self
            .output
            .cipher
            .as_mut()
            .ok_or(ProtocolError::HandshakeError(ERR_STREAM_UNINITIALIZED))?;

        let mut writer = BufferWriter::new();
        writer
            .write_var_string(command)
            .write_u32(payload.len() as u32)
            .write_bytes(payload);
        let mut inner = writer.render(false);

        let mut size_bytes = (inner.len() as u32).to_le_bytes();
        output.crypt_length(&mut size_bytes);
        let tag = output.seal(&mut inner)?;

        let mut frame = Vec::with_capacity(LENGTH_LEN + inner.len() + TAG_LEN);
        frame.extend_from_slice(&size_bytes);
        frame.extend_from_slice(&inner);
        frame.extend_from_slice(&tag);
        output.advance(frame.len());
        Ok(frame)
    }

    fn parse_inner(&self, body: &[u8], events: &mut Vec<PacketEvent>) -> Result<()> {
        let mut reader = BufferReader::new(body);
        while reader.left() > 0 {
            let command = reader.read_var_string(MAX_COMMAND_LENGTH)?;
            validate_command(&command)?;
            let len = reader.read_u32()? as usize;
            if len > self.config.max_message_size {
                return Err(ProtocolError::OversizedAllocation {
                    claimed: len as u64,
                    limit: self.config.max_message_size as u64,
                });
            }
            let payload = reader.read_bytes(len)?;
            events.push(PacketEvent { command, payload });
        }
        Ok(())
    }
}

impl Drop for EncryptedSession {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn validate_command(command: &str) -> Result<()> {
    if command.is_empty()
        || command.len() > MAX_COMMAND_LENGTH
        || !command.bytes().all(|b| b.is_ascii_graphic())
    {
        return Err(ProtocolError::InvalidCommand);
    }
    Ok(())
}
