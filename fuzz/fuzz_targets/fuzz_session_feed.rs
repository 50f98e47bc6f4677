#![no_main]

use coinwire::config::{TransportConfig, CIPHER_CHACHA20_POLY1305};
use coinwire::transport::EncryptedSession;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Drive a handshaken session with hostile socket bytes split at
    // arbitrary boundaries; errors are expected, panics are bugs.
    let mut a = EncryptedSession::new(TransportConfig::default(), CIPHER_CHACHA20_POLY1305);
    let mut b = EncryptedSession::new(TransportConfig::default(), CIPHER_CHACHA20_POLY1305);

    let init_a = match a.to_encinit() {
        Ok(payload) => payload,
        Err(_) => return,
    };
    if b.encinit(&init_a).is_err() {
        return;
    }
    let init_b = b.to_encinit().unwrap_or_default();
    if a.encinit(&init_b).is_err() {
        return;
    }
    let ack_a = match a.to_encack() {
        Ok(payload) => payload,
        Err(_) => return,
    };
    if b.encack(&ack_a).is_err() {
        return;
    }
    let ack_b = match b.to_encack() {
        Ok(payload) => payload,
        Err(_) => return,
    };
    if a.encack(&ack_b).is_err() {
        return;
    }

    let mut rest = data;
    while !rest.is_empty() {
        let take = (rest[0] as usize % 32).max(1).min(rest.len());
        if b.feed(&rest[..take]).is_err() {
            return;
        }
        rest = &rest[take..];
    }
});
