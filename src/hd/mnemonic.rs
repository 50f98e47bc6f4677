//! BIP39 mnemonic phrases and wallet seeds.
//!
//! Entropy of 128–256 bits (multiple of 32) maps to a checksummed word
//! phrase; the phrase plus an optional passphrase stretches to a 64-byte
//! wallet seed via PBKDF2. Import rejects any phrase whose embedded
//! checksum bits fail to match the recomputed entropy hash.
//!
//! Entropy, phrase, and passphrase are all wiped on drop.

use crate::core::{BufferReader, BufferWriter};
use crate::error::{ProtocolError, Result};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Maximum serialized phrase/passphrase length accepted on deserialize.
const MAX_STRING_LEN: usize = 1024;

/// Wordlist language, encoded as a one-byte index on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
}

impl Language {
    pub fn index(self) -> u8 {
        match self {
            Language::English => 0,
        }
    }

    pub fn from_index(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Language::English),
            other => Err(ProtocolError::UnknownLanguage(other)),
        }
    }

    fn wordlist(self) -> bip39::Language {
        match self {
            Language::English => bip39::Language::English,
        }
    }
}

/// A validated mnemonic: entropy, its phrase rendering, and the passphrase
/// that together determine the wallet seed.
#[derive(Clone, PartialEq, Eq)]
pub struct Mnemonic {
    language: Language,
    entropy: Vec<u8>,
    phrase: String,
    passphrase: String,
}

impl Drop for Mnemonic {
    fn drop(&mut self) {
        self.entropy.zeroize();
        self.phrase.zeroize();
        self.passphrase.zeroize();
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mnemonic")
            .field("language", &self.language)
            .field("entropy_bits", &(self.entropy.len() * 8))
            .field("words", &self.phrase.split(' ').count())
            .finish_non_exhaustive()
    }
}

impl Mnemonic {
    /// Generate a fresh mnemonic from OS entropy. `bits` must be 128–256
    /// and a multiple of 32.
    pub fn generate(language: Language, bits: usize, passphrase: &str) -> Result<Self> {
        if !(128..=256).contains(&bits) || bits % 32 != 0 {
            return Err(ProtocolError::InvalidMnemonic(format!(
                "unsupported entropy size: {bits} bits"
            )));
        }
        let mut entropy = Zeroizing::new(vec![0u8; bits / 8]);
        rand::Rng::fill(&mut rand::thread_rng(), &mut entropy[..]);
        Self::from_entropy(language, &entropy, passphrase)
    }

    /// Build from raw entropy; the checksummed phrase is derived from it.
    pub fn from_entropy(language: Language, entropy: &[u8], passphrase: &str) -> Result<Self> {
        let inner = bip39::Mnemonic::from_entropy_in(language.wordlist(), entropy)
            .map_err(|e| ProtocolError::InvalidMnemonic(e.to_string()))?;
        Ok(Self {
            language,
            entropy: entropy.to_vec(),
            phrase: inner.to_string(),
            passphrase: passphrase.to_string(),
        })
    }

    /// Import a phrase, validating word membership and the checksum bits
    /// against the recomputed hash of the embedded entropy.
    pub fn from_phrase(language: Language, phrase: &str, passphrase: &str) -> Result<Self> {
        let inner = bip39::Mnemonic::parse_in_normalized(language.wordlist(), phrase)
            .map_err(|e| ProtocolError::InvalidMnemonic(e.to_string()))?;
        Ok(Self {
            language,
            entropy: inner.to_entropy(),
            phrase: inner.to_string(),
            passphrase: passphrase.to_string(),
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn entropy(&self) -> &[u8] {
        &self.entropy
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn word_count(&self) -> usize {
        self.phrase.split(' ').count()
    }

    /// Stretch phrase and passphrase into the 64-byte wallet seed.
    pub fn seed(&self) -> Zeroizing<[u8; 64]> {
        let inner = bip39::Mnemonic::parse_in_normalized(self.language.wordlist(), &self.phrase)
            .expect("stored phrase was validated on construction");
        Zeroizing::new(inner.to_seed_normalized(&self.passphrase))
    }

    /// Wire encoding: entropy bit count (u16 LE), language index (u8), raw
    /// entropy, length-prefixed phrase, length-prefixed passphrase.
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = BufferWriter::new();
        writer
            .write_u16((self.entropy.len() * 8) as u16)
            .write_u8(self.language.index())
            .write_bytes(&self.entropy)
            .write_var_string(&self.phrase)
            .write_var_string(&self.passphrase);
        writer.render(false)
    }

    /// Explicitly wipe entropy, phrase, and passphrase. Dropping has the
    /// same effect.
    pub fn destroy(self) {}

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = BufferReader::new(data);
        let bits = reader.read_u16()? as usize;
        if !(128..=256).contains(&bits) || bits % 32 != 0 {
            return Err(ProtocolError::InvalidMnemonic(format!(
                "unsupported entropy size: {bits} bits"
            )));
        }
        let language = Language::from_index(reader.read_u8()?)?;
        let entropy = reader.read_bytes(bits / 8)?;
        let phrase = reader.read_var_string(MAX_STRING_LEN)?;
        let passphrase = reader.read_var_string(MAX_STRING_LEN)?;

        // Revalidate instead of trusting the stored phrase: the entropy is
        // authoritative and the phrase must match it.
        let mnemonic = Self::from_entropy(language, &entropy, &passphrase)?;
        if mnemonic.phrase != phrase {
            return Err(ProtocolError::InvalidMnemonic(
                "stored phrase does not match entropy".into(),
            ));
        }
        Ok(mnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors use the passphrase "TREZOR".
    const VECTOR_PHRASE_128: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const VECTOR_SEED_128: &str =
        "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04";
    const VECTOR_PHRASE_LEGAL: &str =
        "legal winner thank year wave sausage worth useful legal winner thank yellow";
    const VECTOR_SEED_LEGAL: &str =
        "2e8905819b8723fe2c1d161860e5ee1830318dbf49a83bd451cfb8440c28bd6fa457fe1296106559a3c80937a1c1069be3a3a5bd381ee6260e8d9739fce1f607";

    #[test]
    fn test_reference_seed_all_zero_entropy() {
        let mnemonic = Mnemonic::from_entropy(Language::English, &[0u8; 16], "TREZOR").unwrap();
        assert_eq!(mnemonic.phrase(), VECTOR_PHRASE_128);
        assert_eq!(hex::encode(&mnemonic.seed()[..]), VECTOR_SEED_128);
    }

    #[test]
    fn test_reference_seed_legal_winner() {
        let entropy = [0x7f; 16];
        let mnemonic = Mnemonic::from_entropy(Language::English, &entropy, "TREZOR").unwrap();
        assert_eq!(mnemonic.phrase(), VECTOR_PHRASE_LEGAL);
        assert_eq!(hex::encode(&mnemonic.seed()[..]), VECTOR_SEED_LEGAL);
    }

    #[test]
    fn test_phrase_entropy_inverse() {
        for bytes in [16usize, 20, 24, 28, 32] {
            let entropy: Vec<u8> = (0..bytes as u8).collect();
            let mnemonic = Mnemonic::from_entropy(Language::English, &entropy, "").unwrap();
            let recovered =
                Mnemonic::from_phrase(Language::English, mnemonic.phrase(), "").unwrap();
            assert_eq!(recovered.entropy(), &entropy[..]);
            assert_eq!(recovered.word_count(), bytes * 3 / 4);
        }
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // "abandon" x12 has a mismatched checksum word.
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        assert!(matches!(
            Mnemonic::from_phrase(Language::English, phrase, ""),
            Err(ProtocolError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_unknown_word_rejected() {
        let phrase = VECTOR_PHRASE_128.replace("about", "aboutx");
        assert!(Mnemonic::from_phrase(Language::English, &phrase, "").is_err());
    }

    #[test]
    fn test_passphrase_changes_seed() {
        let a = Mnemonic::from_entropy(Language::English, &[3u8; 16], "").unwrap();
        let b = Mnemonic::from_entropy(Language::English, &[3u8; 16], "hunter2").unwrap();
        assert_eq!(a.phrase(), b.phrase());
        assert_ne!(a.seed()[..], b.seed()[..]);
    }

    #[test]
    fn test_generate_bounds() {
        assert!(Mnemonic::generate(Language::English, 128, "").is_ok());
        assert!(Mnemonic::generate(Language::English, 256, "").is_ok());
        assert!(Mnemonic::generate(Language::English, 100, "").is_err());
        assert!(Mnemonic::generate(Language::English, 288, "").is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mnemonic =
            Mnemonic::from_entropy(Language::English, &[0xab; 20], "passphrase").unwrap();
        let bytes = mnemonic.serialize();
        let decoded = Mnemonic::deserialize(&bytes).unwrap();
        assert_eq!(decoded, mnemonic);
        assert_eq!(decoded.serialize(), bytes);
    }

    #[test]
    fn test_deserialize_rejects_phrase_entropy_mismatch() {
        let a = Mnemonic::from_entropy(Language::English, &[1u8; 16], "").unwrap();
        let b = Mnemonic::from_entropy(Language::English, &[2u8; 16], "").unwrap();
        let mut bytes = a.serialize();
        // Splice b's entropy under a's phrase.
        bytes[3..19].copy_from_slice(b.entropy());
        assert!(Mnemonic::deserialize(&bytes).is_err());
    }

    #[test]
    fn test_unknown_language_index() {
        let mnemonic = Mnemonic::from_entropy(Language::English, &[0u8; 16], "").unwrap();
        let mut bytes = mnemonic.serialize();
        bytes[2] = 7;
        assert!(matches!(
            Mnemonic::deserialize(&bytes),
            Err(ProtocolError::UnknownLanguage(7))
        ));
    }
}
