//! # Hierarchical Deterministic Keys
//!
//! BIP32-style deterministic key trees with BIP39 mnemonic seeds.
//!
//! ## Components
//! - **Key**: `HDPrivateKey` / `HDPublicKey` with child derivation and
//!   extended-key serialization
//! - **Path**: `m/44'/0'/0'` path parsing and formatting
//! - **Mnemonic**: phrase/entropy handling and the 64-byte wallet seed
//! - **Cache**: bounded derivation cache shared behind a mutex
//!
//! ## Security
//! - Hardened derivation from a public-only key is an error, never a wrong key
//! - Private scalars, chain codes, and entropy are zeroized on drop
//! - Depth is capped at 255 per the extended-key wire format

pub mod cache;
pub mod key;
pub mod mnemonic;
pub mod path;

pub use key::{HDPrivateKey, HDPublicKey};
pub use mnemonic::{Language, Mnemonic};
pub use path::{DerivationPath, HARDENED};
