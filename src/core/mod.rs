//! # Core Codec Components
//!
//! Deterministic, bounds-checked binary serialization substrate.
//!
//! This module underlies every wire format in the crate: extended keys,
//! merkle blocks, and encrypted transport frames.
//!
//! ## Components
//! - **Writer**: queued-operation writer with exact single-allocation render
//! - **Reader**: sequential bounds-checked decoder with span tracking
//! - **VarInt**: bitcoin CompactSize variable-length integers
//!
//! ## Security
//! - Every read bounds-checks before touching bytes
//! - Length prefixes are validated against caller limits before allocation
//! - Checksums are double-SHA256 over explicitly marked spans

pub mod reader;
pub mod varint;
pub mod writer;

pub use reader::BufferReader;
pub use writer::BufferWriter;
