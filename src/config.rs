//! # Configuration Management
//!
//! Centralized configuration for transport, merkle, and key-serialization
//! limits.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-variable overrides via `from_env()`
//!
//! ## Security Considerations
//! - The inbound size-prefix bound (`3 * max_message_size`) guards against a
//!   corrupted cipher state or hostile peer causing unbounded buffering.
//! - Rekey thresholds (1 GiB / 10 s) limit the data encrypted under one key.
//! - The merkle transaction-count ceiling rejects resource-exhaustion claims
//!   before any proportional allocation happens.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Cipher identifier for ChaCha20-Poly1305, the only negotiable suite.
pub const CIPHER_CHACHA20_POLY1305: u8 = 0;

/// Max allowed decrypted message size (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Bytes processed on a stream before an automatic rekey (1 GiB).
pub const REKEY_MAX_BYTES: u64 = 1 << 30;

/// Seconds elapsed before an automatic rekey.
pub const REKEY_MAX_SECS: u64 = 10;

/// Upper bound on the transaction count a merkle block may claim.
pub const MAX_MERKLE_TX_COUNT: u32 = 1_000_000;

/// Longest accepted command string in an inner transport message.
pub const MAX_COMMAND_LENGTH: usize = 32;

/// Extended-key version prefixes (mainnet `xprv`/`xpub` encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPrefix {
    pub xprivkey: u32,
    pub xpubkey: u32,
}

/// Network parameters relevant to key serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Main,
    Testnet,
}

impl Network {
    pub fn key_prefix(self) -> KeyPrefix {
        match self {
            Network::Main => KeyPrefix {
                xprivkey: 0x0488_ade4,
                xpubkey: 0x0488_b21e,
            },
            Network::Testnet => KeyPrefix {
                xprivkey: 0x0435_8394,
                xpubkey: 0x0435_87cf,
            },
        }
    }

    /// Resolve a serialized version prefix back to a network, and whether
    /// the prefix denotes a private key.
    pub fn from_key_prefix(version: u32) -> Result<(Network, bool)> {
        for network in [Network::Main, Network::Testnet] {
            let prefix = network.key_prefix();
            if version == prefix.xprivkey {
                return Ok((network, true));
            }
            if version == prefix.xpubkey {
                return Ok((network, false));
            }
        }
        Err(ProtocolError::UnknownKeyPrefix(version))
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Transport limits and rekey schedule
    #[serde(default)]
    pub transport: TransportConfig,

    /// Merkle proof limits
    #[serde(default)]
    pub merkle: MerkleConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            merkle: MerkleConfig::default(),
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("COINWIRE_MAX_MESSAGE_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.transport.max_message_size = val;
            }
        }

        if let Ok(bytes) = std::env::var("COINWIRE_REKEY_MAX_BYTES") {
            if let Ok(val) = bytes.parse::<u64>() {
                config.transport.rekey_max_bytes = val;
            }
        }

        if let Ok(timeout) = std::env::var("COINWIRE_HANDSHAKE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.transport.handshake_timeout = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration.
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.transport.validate());
        errors.extend(self.merkle.validate());
        errors
    }

    /// Validate and return Result - convenience method.
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Maximum decrypted message size in bytes
    pub max_message_size: usize,

    /// Bytes processed on one stream before an automatic rekey
    pub rekey_max_bytes: u64,

    /// Wall time between automatic rekeys
    #[serde(with = "duration_serde")]
    pub rekey_interval: Duration,

    /// How long `wait()` blocks for handshake completion
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            rekey_max_bytes: REKEY_MAX_BYTES,
            rekey_interval: Duration::from_secs(REKEY_MAX_SECS),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_message_size < 1024 {
            errors.push("Max message size too small (minimum: 1 KB)".to_string());
        } else if self.max_message_size > 128 * 1024 * 1024 {
            errors.push(format!(
                "Max message size too large: {} bytes (maximum: 128 MB)",
                self.max_message_size
            ));
        }

        if self.rekey_max_bytes < 1024 * 1024 {
            errors.push("Rekey byte threshold too small (minimum: 1 MB)".to_string());
        }

        if self.rekey_interval.as_millis() < 100 {
            errors.push("Rekey interval too short (minimum: 100ms)".to_string());
        }

        if self.handshake_timeout.as_millis() < 100 {
            errors.push("Handshake timeout too short (minimum: 100ms)".to_string());
        } else if self.handshake_timeout.as_secs() > 300 {
            errors.push("Handshake timeout too long (maximum: 300s)".to_string());
        }

        errors
    }
}

/// Merkle proof configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MerkleConfig {
    /// Upper bound on the transaction count a merkle block may claim
    pub max_tx_count: u32,
}

impl Default for MerkleConfig {
    fn default() -> Self {
        Self {
            max_tx_count: MAX_MERKLE_TX_COUNT,
        }
    }
}

impl MerkleConfig {
    /// Validate merkle configuration.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_tx_count == 0 {
            errors.push("Merkle tx-count ceiling must be greater than 0".to_string());
        } else if self.max_tx_count > 16_000_000 {
            errors.push(format!(
                "Merkle tx-count ceiling very high: {} (ensure this is intended)",
                self.max_tx_count
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
