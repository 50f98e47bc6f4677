//! # Utility Modules
//!
//! Supporting utilities shared across the codec, key, merkle, and transport
//! layers.
//!
//! ## Components
//! - **Hash**: double-SHA256, hash160, and HMAC-SHA512 digests
//!
//! ## Security
//! - All digests are fixed-output and allocation-free.

pub mod hash;

pub use hash::{checksum, hash160, hmac_sha512, sha256, sha256d};
