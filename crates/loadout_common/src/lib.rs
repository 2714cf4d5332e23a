//! Shared foundational types used across the loadout generator.
//!
//! Currently this is the content hash used for environment fingerprints and
//! compiled-artifact checksums.

#![warn(missing_docs)]

pub mod hash;

pub use hash::ContentHash;

/// Version of the loadout toolchain, recorded in stamps and compiled artifacts.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
