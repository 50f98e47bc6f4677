//! Property-based tests using proptest
//!
//! These tests validate codec, merkle, and transport invariants across a
//! wide range of randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use coinwire::config::{TransportConfig, CIPHER_CHACHA20_POLY1305};
use coinwire::core::{varint, BufferReader, BufferWriter};
use coinwire::hd::DerivationPath;
use coinwire::merkle::{merkle_root, PartialMerkleTree};
use coinwire::transport::EncryptedSession;
use proptest::prelude::*;

// Property: varint encoding round-trips and is the canonical width
proptest! {
    #[test]
    fn prop_varint_roundtrip(value in any::<u64>()) {
        let (buf, len) = varint::encode(value);
        prop_assert_eq!(len, varint::size(value));

        let (decoded, consumed) = varint::decode(&buf[..len]).expect("canonical encoding must decode");
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(consumed, len);
    }
}

// Property: the writer's running size counter always matches the rendered length
proptest! {
    #[test]
    fn prop_writer_size_exact(
        bytes in prop::collection::vec(any::<u8>(), 0..512),
        value in any::<u64>(),
        text in "[a-z]{0,40}",
    ) {
        let mut writer = BufferWriter::new();
        writer
            .write_u8(0xfd)
            .write_varint(value)
            .write_var_bytes(&bytes)
            .write_var_string(&text)
            .write_u64(value)
            .write_checksum();

        let predicted = writer.size();
        let rendered = writer.render(false);
        prop_assert_eq!(rendered.len(), predicted);
    }
}

// Property: writer output reads back field-for-field with the checksum intact
proptest! {
    #[test]
    fn prop_writer_reader_roundtrip(
        bytes in prop::collection::vec(any::<u8>(), 0..512),
        value in any::<u64>(),
        small in any::<u16>(),
        text in "[ -~]{0,40}",
    ) {
        let mut writer = BufferWriter::new();
        writer
            .write_u16(small)
            .write_varint(value)
            .write_var_bytes(&bytes)
            .write_var_string(&text)
            .write_checksum();
        let buf = writer.render(false);

        let mut reader = BufferReader::new(&buf);
        reader.start();
        prop_assert_eq!(reader.read_u16().unwrap(), small);
        prop_assert_eq!(reader.read_varint().unwrap(), value);
        prop_assert_eq!(reader.read_var_bytes(1024).unwrap(), bytes);
        prop_assert_eq!(reader.read_var_string(1024).unwrap(), text);
        reader.verify_checksum().expect("rendered checksum must verify");
        prop_assert_eq!(reader.left(), 0);
    }
}

// Property: partial merkle proofs recover exactly the matched subset
proptest! {
    #[test]
    fn prop_merkle_proof_roundtrip(
        n in 1usize..64,
        seed in any::<u64>(),
    ) {
        let leaves: Vec<[u8; 32]> = (0..n)
            .map(|i| {
                let mut leaf = [0u8; 32];
                leaf[..8].copy_from_slice(&(i as u64 ^ seed).to_le_bytes());
                leaf[8] = 1;
                leaf
            })
            .collect();
        let matches: Vec<bool> = (0..n).map(|i| seed.rotate_left(i as u32) & 1 == 1).collect();

        let root = merkle_root(&leaves).unwrap();
        let tree = PartialMerkleTree::from_matches(&leaves, &matches).unwrap();
        let extraction = tree.extract(&root).expect("honest proof must verify");

        let expected: Vec<[u8; 32]> = leaves
            .iter()
            .zip(&matches)
            .filter(|(_, m)| **m)
            .map(|(h, _)| *h)
            .collect();
        prop_assert_eq!(extraction.matches, expected);
        prop_assert_eq!(extraction.root, root);
    }
}

// Property: derivation path parsing and display are inverses
proptest! {
    #[test]
    fn prop_path_display_roundtrip(
        indexes in prop::collection::vec((0u32..0x8000_0000, any::<bool>()), 0..8),
    ) {
        let text = std::iter::once("m".to_string())
            .chain(indexes.iter().map(|(i, hardened)| {
                if *hardened { format!("{i}'") } else { format!("{i}") }
            }))
            .collect::<Vec<_>>()
            .join("/");

        let path: DerivationPath = text.parse().expect("well-formed path must parse");
        prop_assert_eq!(path.to_string(), text);
    }
}

// Property: transport frames survive any chunk fragmentation
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn prop_transport_roundtrip_any_fragmentation(
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        cuts in prop::collection::vec(1usize..64, 0..6),
    ) {
        let mut a = EncryptedSession::new(TransportConfig::default(), CIPHER_CHACHA20_POLY1305);
        let mut b = EncryptedSession::new(TransportConfig::default(), CIPHER_CHACHA20_POLY1305);

        let init_a = a.to_encinit().unwrap();
        b.encinit(&init_a).unwrap();
        let init_b = b.to_encinit().unwrap();
        a.encinit(&init_b).unwrap();
        let ack_a = a.to_encack().unwrap();
        b.encack(&ack_a).unwrap();
        let ack_b = b.to_encack().unwrap();
        a.encack(&ack_b).unwrap();

        let frame = a.packet("tx", &payload).unwrap().frame;

        let mut events = Vec::new();
        let mut rest: &[u8] = &frame;
        for cut in cuts {
            if rest.is_empty() {
                break;
            }
            let take = cut.min(rest.len());
            events.extend(b.feed(&rest[..take]).unwrap());
            rest = &rest[take..];
        }
        events.extend(b.feed(rest).unwrap());

        prop_assert_eq!(events.len(), 1);
        prop_assert_eq!(&events[0].command, "tx");
        prop_assert_eq!(&events[0].payload, &payload);
    }
}
