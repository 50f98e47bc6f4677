//! Digest helpers used by the codec, HD keys, and merkle trees.
//!
//! These wrap the RustCrypto digest crates with the fixed-width outputs the
//! wire formats expect.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

/// SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256, the block/checksum hash.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// Double SHA-256 over the concatenation of two 32-byte nodes.
pub fn sha256d_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    Sha256::digest(hasher.finalize()).into()
}

/// First four bytes of the double SHA-256, used as a serialization checksum.
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let digest = sha256d(data);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// RIPEMD160(SHA256(data)), the key-fingerprint hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// HMAC-SHA512 keyed digest, the BIP32 child-derivation primitive.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut mac =
        Hmac::<Sha512>::new_from_slice(key).expect("HMAC-SHA512 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256d_known_vector() {
        // sha256d("hello") from the bitcoin wiki.
        let digest = sha256d(b"hello");
        assert_eq!(
            hex::encode(digest),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_checksum_prefix_of_digest() {
        let data = b"coinwire";
        let digest = sha256d(data);
        assert_eq!(checksum(data), digest[..4]);
    }

    #[test]
    fn test_pair_matches_concatenation() {
        let left = sha256(b"left");
        let right = sha256(b"right");
        let mut joined = Vec::with_capacity(64);
        joined.extend_from_slice(&left);
        joined.extend_from_slice(&right);
        assert_eq!(sha256d_pair(&left, &right), sha256d(&joined));
    }

    #[test]
    fn test_hash160_length() {
        assert_eq!(hash160(b"pubkey").len(), 20);
    }

    #[test]
    fn test_hmac_sha512_key_sensitivity() {
        let a = hmac_sha512(b"key-a", b"data");
        let b = hmac_sha512(b"key-b", b"data");
        assert_ne!(a[..], b[..]);
        assert_eq!(a.len(), 64);
    }
}
