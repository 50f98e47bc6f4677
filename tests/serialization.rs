#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Byte-exact round-trip tests at the public API boundary: every structure
//! that crosses a wire or a disk must satisfy serialize(deserialize(b)) == b.

use coinwire::config::Network;
use coinwire::core::{BufferReader, BufferWriter};
use coinwire::hd::{DerivationPath, HDPrivateKey, Language, Mnemonic};
use coinwire::merkle::{merkle_root, BlockHeader, MerkleBlock};

#[test]
fn test_writer_reader_all_field_types() {
    let mut writer = BufferWriter::new();
    writer
        .write_u8(0x01)
        .write_u16(0x0203)
        .write_u32(0x0405_0607)
        .write_u64(0x0809_0a0b_0c0d_0e0f)
        .write_u32_be(0x1011_1213)
        .write_i32(-42)
        .write_i64(-1_000_000_000_000)
        .write_f64(1.5)
        .write_varint(0xffff)
        .write_var_string("command")
        .write_null_string("terminated")
        .write_bytes(&[0xde, 0xad]);
    let buf = writer.render(false);

    let mut reader = BufferReader::new(&buf);
    assert_eq!(reader.read_u8().unwrap(), 0x01);
    assert_eq!(reader.read_u16().unwrap(), 0x0203);
    assert_eq!(reader.read_u32().unwrap(), 0x0405_0607);
    assert_eq!(reader.read_u64().unwrap(), 0x0809_0a0b_0c0d_0e0f);
    assert_eq!(reader.read_u32_be().unwrap(), 0x1011_1213);
    assert_eq!(reader.read_i32().unwrap(), -42);
    assert_eq!(reader.read_i64().unwrap(), -1_000_000_000_000);
    assert_eq!(reader.read_f64().unwrap(), 1.5);
    assert_eq!(reader.read_varint().unwrap(), 0xffff);
    assert_eq!(reader.read_var_string(64).unwrap(), "command");
    assert_eq!(reader.read_null_string().unwrap(), "terminated");
    assert_eq!(reader.read_bytes(2).unwrap(), vec![0xde, 0xad]);
    assert_eq!(reader.left(), 0);
}

#[test]
fn test_extended_key_base58_roundtrip_both_networks() {
    for network in [Network::Main, Network::Testnet] {
        let master = HDPrivateKey::from_seed(network, &[0x42; 32]).unwrap();
        let path: DerivationPath = "m/44'/0'/0'/0/7".parse().unwrap();
        let child = master.derive_path(&path).unwrap();

        let restored = HDPrivateKey::from_base58(&child.to_base58()).unwrap();
        assert_eq!(restored, child);
        assert_eq!(restored.to_base58(), child.to_base58());

        let public = child.to_public();
        let restored = coinwire::hd::HDPublicKey::from_base58(&public.to_base58()).unwrap();
        assert_eq!(restored, public);
    }
}

#[test]
fn test_restored_public_key_derives_identically() {
    let master = HDPrivateKey::from_seed(Network::Main, &[0x13; 32]).unwrap();
    let account = master
        .derive_hardened(44)
        .unwrap()
        .derive_hardened(0)
        .unwrap()
        .derive_hardened(0)
        .unwrap();
    let watch_only = coinwire::hd::HDPublicKey::from_base58(&account.to_public().to_base58()).unwrap();

    let spend = account.derive(0).unwrap().derive(3).unwrap();
    let watch = watch_only.derive(0).unwrap().derive(3).unwrap();
    assert_eq!(spend.to_public(), watch);
}

#[test]
fn test_mnemonic_wire_roundtrip_all_entropy_sizes() {
    for bytes in [16usize, 20, 24, 28, 32] {
        let entropy: Vec<u8> = (0..bytes).map(|i| (i * 7 + 3) as u8).collect();
        let mnemonic = Mnemonic::from_entropy(Language::English, &entropy, "pass").unwrap();
        let wire = mnemonic.serialize();
        let decoded = Mnemonic::deserialize(&wire).unwrap();
        assert_eq!(decoded, mnemonic);
        assert_eq!(decoded.serialize(), wire);
        assert_eq!(decoded.seed()[..], mnemonic.seed()[..]);
    }
}

#[test]
fn test_merkleblock_wire_roundtrip() {
    let leaves: Vec<[u8; 32]> = (1..=11u8).map(|i| [i.wrapping_mul(17); 32]).collect();
    let root = merkle_root(&leaves).unwrap();
    let header = BlockHeader {
        version: 0x2000_0000,
        prev_block: [0xaa; 32],
        merkle_root: root,
        time: 1_720_000_000,
        bits: 0x1703_255e,
        nonce: 0x1234_5678,
    };
    let matches: Vec<bool> = (0..11).map(|i| i == 2 || i == 10).collect();

    let block = MerkleBlock::from_matches(header, &leaves, &matches).unwrap();
    let wire = block.serialize();
    let decoded = MerkleBlock::deserialize(&wire).unwrap();
    assert_eq!(decoded, block);
    assert_eq!(decoded.serialize(), wire);

    let extraction = decoded.extract().unwrap();
    assert_eq!(extraction.matches, vec![leaves[2], leaves[10]]);
    assert_eq!(extraction.indexes, vec![2, 10]);
}

#[test]
fn test_header_hash_stable_across_roundtrip() {
    let header = BlockHeader {
        version: 2,
        prev_block: [3; 32],
        merkle_root: [4; 32],
        time: 5,
        bits: 6,
        nonce: 7,
    };
    let decoded = BlockHeader::deserialize(&header.serialize()).unwrap();
    assert_eq!(decoded.hash(), header.hash());
}
