//! Derivation path parsing (`m/44'/0'/0'`).
//!
//! A path is the root token `m` or `M` (optionally apostrophe-suffixed)
//! followed by decimal child indexes; a trailing apostrophe marks a segment
//! hardened. Malformed segments fail immediately with no partial state.

use crate::error::{ProtocolError, Result};
use std::fmt;
use std::str::FromStr;

/// High bit of a child index, denoting hardened derivation.
pub const HARDENED: u32 = 0x8000_0000;

/// A parsed BIP32 derivation path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn new(indexes: Vec<u32>) -> Self {
        Self(indexes)
    }

    pub fn indexes(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromStr for DerivationPath {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('/');

        match parts.next() {
            Some("m") | Some("M") | Some("m'") | Some("M'") => {}
            _ => {
                return Err(ProtocolError::InvalidPath(format!(
                    "bad root token in {s:?}"
                )))
            }
        }

        let mut indexes = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'') {
                Some(stripped) => (stripped, true),
                None => (part, false),
            };

            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ProtocolError::InvalidPath(format!(
                    "non-numeric segment {part:?}"
                )));
            }

            let index: u32 = digits.parse().map_err(|_| {
                ProtocolError::InvalidPath(format!("segment out of range {part:?}"))
            })?;
            if index >= HARDENED {
                return Err(ProtocolError::InvalidPath(format!(
                    "segment out of range {part:?}"
                )));
            }

            indexes.push(if hardened { index | HARDENED } else { index });
        }

        Ok(Self(indexes))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.0 {
            if index & HARDENED != 0 {
                write!(f, "/{}'", index & !HARDENED)?;
            } else {
                write!(f, "/{index}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bip44_account() {
        let path: DerivationPath = "m/44'/0'/0'".parse().unwrap();
        assert_eq!(
            path.indexes(),
            &[44 | HARDENED, HARDENED, HARDENED]
        );
    }

    #[test]
    fn test_parse_mixed_hardening() {
        let path: DerivationPath = "m/44'/0'/0'/1/5".parse().unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.indexes()[3], 1);
        assert_eq!(path.indexes()[4], 5);
    }

    #[test]
    fn test_root_token_variants() {
        for root in ["m", "M", "m'", "M'"] {
            let path: DerivationPath = format!("{root}/0").parse().unwrap();
            assert_eq!(path.indexes(), &[0]);
        }
    }

    #[test]
    fn test_malformed_rejected() {
        for bad in [
            "n/0",
            "m/abc",
            "m/",
            "m//1",
            "m/-1",
            "m/+5",
            "m/2147483648",
            "m/4294967296",
            "m/1''",
            "",
        ] {
            assert!(
                bad.parse::<DerivationPath>().is_err(),
                "accepted malformed path {bad:?}"
            );
        }
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["m", "m/0", "m/44'/0'/0'/1/2"] {
            let path: DerivationPath = text.parse().unwrap();
            assert_eq!(path.to_string(), text);
        }
    }
}
