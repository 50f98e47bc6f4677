//! BIP32 extended keys and child derivation.
//!
//! `HDPrivateKey` derives both hardened and non-hardened children;
//! `HDPublicKey` derives non-hardened children only, by tweak-adding the
//! HMAC left half onto the parent point. A tweak outside the curve order
//! (probability ~2^-128, handled anyway) retries with the next index, and
//! the returned child's `child_index` records the index actually used.
//!
//! Derived children are cached globally behind a mutex; cache hits are
//! bit-identical to recomputation.

use crate::config::Network;
use crate::core::{BufferReader, BufferWriter};
use crate::error::{ProtocolError, Result};
use crate::hd::cache::{CacheKey, DerivationCache};
use crate::hd::mnemonic::Mnemonic;
use crate::hd::path::{DerivationPath, HARDENED};
use crate::utils::hash;
use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use std::sync::{LazyLock, Mutex};
use zeroize::Zeroize;

/// Key used to salt the master-key HMAC, fixed by BIP32.
const MASTER_SALT: &[u8] = b"Bitcoin seed";

static SECP: LazyLock<Secp256k1<All>> = LazyLock::new(Secp256k1::new);

static PRIVATE_CACHE: LazyLock<Mutex<DerivationCache<HDPrivateKey>>> =
    LazyLock::new(|| Mutex::new(DerivationCache::new()));

static PUBLIC_CACHE: LazyLock<Mutex<DerivationCache<HDPublicKey>>> =
    LazyLock::new(|| Mutex::new(DerivationCache::new()));

/// Extended private key: can derive hardened and non-hardened children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HDPrivateKey {
    pub network: Network,
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_index: u32,
    chain_code: [u8; 32],
    private_key: SecretKey,
    public_key: PublicKey,
}

/// Extended public key: non-hardened derivation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HDPublicKey {
    pub network: Network,
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_index: u32,
    chain_code: [u8; 32],
    public_key: PublicKey,
}

impl Drop for HDPrivateKey {
    fn drop(&mut self) {
        self.chain_code.zeroize();
        self.private_key.non_secure_erase();
    }
}

impl HDPrivateKey {
    /// Generate a master key from fresh OS entropy.
    pub fn generate(network: Network) -> Self {
        let mut seed = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut seed[..]);
        let key = Self::from_seed(network, &seed).expect("32-byte random seed is always valid");
        seed.zeroize();
        key
    }

    /// Master key from a 16–64 byte seed per BIP32.
    pub fn from_seed(network: Network, seed: &[u8]) -> Result<Self> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(ProtocolError::InvalidSeed(seed.len()));
        }

        let mut digest = hash::hmac_sha512(MASTER_SALT, seed);
        let private_key = SecretKey::from_slice(&digest[..32])?;
        let public_key = PublicKey::from_secret_key(&SECP, &private_key);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        digest.zeroize();

        Ok(Self {
            network,
            depth: 0,
            parent_fingerprint: [0; 4],
            child_index: 0,
            chain_code,
            private_key,
            public_key,
        })
    }

    /// Master key from a validated mnemonic's 64-byte seed.
    pub fn from_mnemonic(network: Network, mnemonic: &Mnemonic) -> Self {
        let seed = mnemonic.seed();
        Self::from_seed(network, &seed[..]).expect("64-byte mnemonic seed is always valid")
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn private_key(&self) -> &SecretKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// First four bytes of hash160 of the compressed public key.
    pub fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.public_key)
    }

    /// Derive the child at `index`; the high bit requests hardened
    /// derivation. An invalid tweak retries with `index + 1` and the child
    /// records the index actually used.
    pub fn derive(&self, index: u32) -> Result<HDPrivateKey> {
        if self.depth == u8::MAX {
            return Err(ProtocolError::DepthExceeded);
        }

        let cache_key = CacheKey {
            version: self.network.key_prefix().xprivkey,
            public_key: self.public_key.serialize(),
            index,
        };
        if let Some(child) = PRIVATE_CACHE
            .lock()
            .expect("derivation cache mutex poisoned")
            .get(&cache_key)
        {
            return Ok(child);
        }

        let hardened = index & HARDENED != 0;
        let mut actual = index;
        let child = loop {
            let mut data = Vec::with_capacity(37);
            if hardened {
                data.push(0x00);
                data.extend_from_slice(&self.private_key.secret_bytes());
            } else {
                data.extend_from_slice(&self.public_key.serialize());
            }
            data.extend_from_slice(&actual.to_be_bytes());

            let mut digest = hash::hmac_sha512(&self.chain_code, &data);
            data.zeroize();

            let tweaked = tweak_scalar(&digest[..32])
                .and_then(|tweak| self.private_key.add_tweak(&tweak).ok());

            match tweaked {
                Some(private_key) => {
                    let public_key = PublicKey::from_secret_key(&SECP, &private_key);
                    let mut chain_code = [0u8; 32];
                    chain_code.copy_from_slice(&digest[32..]);
                    digest.zeroize();
                    break HDPrivateKey {
                        network: self.network,
                        depth: self.depth + 1,
                        parent_fingerprint: self.fingerprint(),
                        child_index: actual,
                        chain_code,
                        private_key,
                        public_key,
                    };
                }
                None => {
                    digest.zeroize();
                    actual = actual
                        .checked_add(1)
                        .ok_or_else(|| ProtocolError::InvalidPath("child index overflow".into()))?;
                }
            }
        };

        PRIVATE_CACHE
            .lock()
            .expect("derivation cache mutex poisoned")
            .insert(cache_key, child.clone());
        Ok(child)
    }

    /// Derive the hardened child at `index` (index below the hardened bit).
    pub fn derive_hardened(&self, index: u32) -> Result<HDPrivateKey> {
        self.derive(index | HARDENED)
    }

    /// Walk a full derivation path.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<HDPrivateKey> {
        let mut key = self.clone();
        for index in path.iter() {
            key = key.derive(index)?;
        }
        Ok(key)
    }

    /// The corresponding extended public key.
    pub fn to_public(&self) -> HDPublicKey {
        HDPublicKey {
            network: self.network,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_index: self.child_index,
            chain_code: self.chain_code,
            public_key: self.public_key,
        }
    }

    pub fn is_master(&self) -> bool {
        self.depth == 0 && self.child_index == 0 && self.parent_fingerprint == [0; 4]
    }

    /// BIP44 account key shape: depth 3, hardened index.
    pub fn is_account44(&self) -> bool {
        self.depth == 3 && self.child_index & HARDENED != 0
    }

    /// BIP45 purpose key shape: depth 1, index 45'.
    pub fn is_purpose45(&self) -> bool {
        self.depth == 1 && self.child_index == (45 | HARDENED)
    }

    /// 82-byte extended-key serialization (78 bytes + 4-byte checksum).
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = BufferWriter::new();
        writer
            .write_u32_be(self.network.key_prefix().xprivkey)
            .write_u8(self.depth)
            .write_bytes(&self.parent_fingerprint)
            .write_u32_be(self.child_index)
            .write_bytes(&self.chain_code)
            .write_u8(0x00)
            .write_bytes(&self.private_key.secret_bytes())
            .write_checksum();
        writer.render(false)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = BufferReader::new(data);
        reader.start();
        let version = reader.read_u32_be()?;
        let (network, is_private) = Network::from_key_prefix(version)?;
        if !is_private {
            return Err(ProtocolError::KeyTypeMismatch);
        }

        let depth = reader.read_u8()?;
        let parent_fingerprint = reader.read_bytes_array::<4>()?;
        let child_index = reader.read_u32_be()?;
        let chain_code = reader.read_bytes_array::<32>()?;
        if reader.read_u8()? != 0x00 {
            return Err(ProtocolError::KeyTypeMismatch);
        }
        let key_bytes = reader.read_bytes_array::<32>()?;
        reader.verify_checksum()?;

        let private_key = SecretKey::from_slice(&key_bytes)?;
        let public_key = PublicKey::from_secret_key(&SECP, &private_key);

        Ok(Self {
            network,
            depth,
            parent_fingerprint,
            child_index,
            chain_code,
            private_key,
            public_key,
        })
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.serialize()).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self> {
        let raw = bs58::decode(s)
            .into_vec()
            .map_err(|e| ProtocolError::Base58(e.to_string()))?;
        Self::deserialize(&raw)
    }

    /// Explicitly wipe the key. Dropping has the same effect; this makes
    /// the intent visible at call sites that shed key material early.
    pub fn destroy(self) {}
}

impl HDPublicKey {
    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.public_key)
    }

    /// Derive a non-hardened child by tweak-adding onto the parent point.
    /// A hardened index is an error: that derivation needs the private key.
    pub fn derive(&self, index: u32) -> Result<HDPublicKey> {
        if index & HARDENED != 0 {
            return Err(ProtocolError::HardenedFromPublic);
        }
        if self.depth == u8::MAX {
            return Err(ProtocolError::DepthExceeded);
        }

        let cache_key = CacheKey {
            version: self.network.key_prefix().xpubkey,
            public_key: self.public_key.serialize(),
            index,
        };
        if let Some(child) = PUBLIC_CACHE
            .lock()
            .expect("derivation cache mutex poisoned")
            .get(&cache_key)
        {
            return Ok(child);
        }

        let mut actual = index;
        let child = loop {
            let mut data = Vec::with_capacity(37);
            data.extend_from_slice(&self.public_key.serialize());
            data.extend_from_slice(&actual.to_be_bytes());

            let digest = hash::hmac_sha512(&self.chain_code, &data);

            let tweaked = tweak_scalar(&digest[..32])
                .and_then(|tweak| self.public_key.add_exp_tweak(&SECP, &tweak).ok());

            match tweaked {
                Some(public_key) => {
                    let mut chain_code = [0u8; 32];
                    chain_code.copy_from_slice(&digest[32..]);
                    break HDPublicKey {
                        network: self.network,
                        depth: self.depth + 1,
                        parent_fingerprint: self.fingerprint(),
                        child_index: actual,
                        chain_code,
                        public_key,
                    };
                }
                None => {
                    actual = actual
                        .checked_add(1)
                        .ok_or_else(|| ProtocolError::InvalidPath("child index overflow".into()))?;
                    if actual & HARDENED != 0 {
                        return Err(ProtocolError::HardenedFromPublic);
                    }
                }
            }
        };

        PUBLIC_CACHE
            .lock()
            .expect("derivation cache mutex poisoned")
            .insert(cache_key, child.clone());
        Ok(child)
    }

    /// Walk a path of non-hardened segments.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<HDPublicKey> {
        let mut key = self.clone();
        for index in path.iter() {
            key = key.derive(index)?;
        }
        Ok(key)
    }

    pub fn is_master(&self) -> bool {
        self.depth == 0 && self.child_index == 0 && self.parent_fingerprint == [0; 4]
    }

    pub fn is_account44(&self) -> bool {
        self.depth == 3 && self.child_index & HARDENED != 0
    }

    pub fn is_purpose45(&self) -> bool {
        self.depth == 1 && self.child_index == (45 | HARDENED)
    }

    /// 82-byte extended-key serialization (78 bytes + 4-byte checksum).
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = BufferWriter::new();
        writer
            .write_u32_be(self.network.key_prefix().xpubkey)
            .write_u8(self.depth)
            .write_bytes(&self.parent_fingerprint)
            .write_u32_be(self.child_index)
            .write_bytes(&self.chain_code)
            .write_bytes(&self.public_key.serialize())
            .write_checksum();
        writer.render(false)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = BufferReader::new(data);
        reader.start();
        let version = reader.read_u32_be()?;
        let (network, is_private) = Network::from_key_prefix(version)?;
        if is_private {
            return Err(ProtocolError::KeyTypeMismatch);
        }

        let depth = reader.read_u8()?;
        let parent_fingerprint = reader.read_bytes_array::<4>()?;
        let child_index = reader.read_u32_be()?;
        let chain_code = reader.read_bytes_array::<32>()?;
        let key_bytes = reader.read_bytes_array::<33>()?;
        reader.verify_checksum()?;

        let public_key = PublicKey::from_slice(&key_bytes)?;

        Ok(Self {
            network,
            depth,
            parent_fingerprint,
            child_index,
            chain_code,
            public_key,
        })
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.serialize()).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self> {
        let raw = bs58::decode(s)
            .into_vec()
            .map_err(|e| ProtocolError::Base58(e.to_string()))?;
        Self::deserialize(&raw)
    }
}

fn fingerprint_of(public_key: &PublicKey) -> [u8; 4] {
    let digest = hash::hash160(&public_key.serialize());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Interpret the HMAC left half as a curve scalar; `None` when it falls
/// outside the order, which signals the caller to retry with the next index.
fn tweak_scalar(bytes: &[u8]) -> Option<Scalar> {
    let mut array = [0u8; 32];
    array.copy_from_slice(bytes);
    let scalar = Scalar::from_be_bytes(array).ok();
    array.zeroize();
    scalar
}

#[cfg(test)]
mod tests {
    use super::*;

    // 78 payload bytes plus the 4-byte checksum.
    const SERIALIZED_LEN: usize = 78;

    // BIP32 test vector 1, seed 000102030405060708090a0b0c0d0e0f.
    const SEED_HEX: &str = "000102030405060708090a0b0c0d0e0f";
    const MASTER_XPRV: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
    const MASTER_XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
    const M0H_XPRV: &str = "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7";
    const M0H_XPUB: &str = "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw";
    const M0H1_XPUB: &str = "xpub6ASuArnXKPbfEwhqN6e3mwBcDTgzisQN1wXN9BJcM47sSikHjJf3UFHKkNAWbWMiGj7Wf5uMash7SyYq527Hqck2AxYysAA7xmALppuCkwQ";

    fn master() -> HDPrivateKey {
        let seed = hex::decode(SEED_HEX).unwrap();
        HDPrivateKey::from_seed(Network::Main, &seed).unwrap()
    }

    #[test]
    fn test_vector1_master() {
        let key = master();
        assert!(key.is_master());
        assert_eq!(key.to_base58(), MASTER_XPRV);
        assert_eq!(key.to_public().to_base58(), MASTER_XPUB);
        assert_eq!(key.fingerprint(), hex::decode("3442193e").unwrap()[..]);
    }

    #[test]
    fn test_vector1_hardened_child() {
        let child = master().derive_hardened(0).unwrap();
        assert_eq!(child.depth, 1);
        assert_eq!(child.child_index, HARDENED);
        assert_eq!(child.to_base58(), M0H_XPRV);
        assert_eq!(child.to_public().to_base58(), M0H_XPUB);
    }

    #[test]
    fn test_private_and_public_derivation_agree() {
        let parent = master().derive_hardened(0).unwrap();
        let via_private = parent.derive(1).unwrap().to_public();
        let via_public = parent.to_public().derive(1).unwrap();
        assert_eq!(via_private, via_public);
        assert_eq!(via_public.to_base58(), M0H1_XPUB);
    }

    #[test]
    fn test_derivation_deterministic() {
        let path: DerivationPath = "m/44'/0'/0'/0/0".parse().unwrap();
        let a = master().derive_path(&path).unwrap();
        let b = master().derive_path(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.serialize(), b.serialize());
    }

    #[test]
    fn test_hardened_from_public_rejected() {
        let public = master().to_public();
        assert!(matches!(
            public.derive(HARDENED),
            Err(ProtocolError::HardenedFromPublic)
        ));
        assert!(matches!(
            public.derive(5 | HARDENED),
            Err(ProtocolError::HardenedFromPublic)
        ));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let key = master().derive_hardened(44).unwrap();
        let bytes = key.serialize();
        assert_eq!(bytes.len(), SERIALIZED_LEN + 4);
        let decoded = HDPrivateKey::deserialize(&bytes).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(decoded.serialize(), bytes);

        let public = key.to_public();
        let decoded = HDPublicKey::from_base58(&public.to_base58()).unwrap();
        assert_eq!(decoded, public);
    }

    #[test]
    fn test_corrupt_serialization_rejected() {
        let mut bytes = master().serialize();
        bytes[40] ^= 0x01;
        assert!(matches!(
            HDPrivateKey::deserialize(&bytes),
            Err(ProtocolError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let xpub_bytes = master().to_public().serialize();
        assert!(matches!(
            HDPrivateKey::deserialize(&xpub_bytes),
            Err(ProtocolError::KeyTypeMismatch)
        ));
    }

    #[test]
    fn test_purpose_shapes() {
        let purpose = master().derive_hardened(45).unwrap();
        assert!(purpose.is_purpose45());
        assert!(!purpose.is_master());

        let account = master()
            .derive_hardened(44)
            .unwrap()
            .derive_hardened(0)
            .unwrap()
            .derive_hardened(0)
            .unwrap();
        assert!(account.is_account44());
    }

    #[test]
    fn test_depth_limit() {
        let mut key = master();
        key.depth = u8::MAX;
        assert!(matches!(
            key.derive(0),
            Err(ProtocolError::DepthExceeded)
        ));
    }

    #[test]
    fn test_seed_length_bounds() {
        assert!(HDPrivateKey::from_seed(Network::Main, &[0u8; 15]).is_err());
        assert!(HDPrivateKey::from_seed(Network::Main, &[1u8; 16]).is_ok());
        assert!(HDPrivateKey::from_seed(Network::Main, &[1u8; 64]).is_ok());
        assert!(HDPrivateKey::from_seed(Network::Main, &[1u8; 65]).is_err());
    }
}
