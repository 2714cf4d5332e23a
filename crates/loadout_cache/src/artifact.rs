//! The compiled form of an artifact.
//!
//! A compiled artifact holds the artifact's top-level forms in binary form so
//! that loading skips the reader. The file starts with a 4-byte little-endian
//! header length, then a bincode [`CompiledHeader`], then the bincode payload.
//! Reads validate magic bytes, format version and payload checksum, so a
//! truncated or stale file is rejected rather than half-loaded.

use std::path::Path;

use loadout_common::{ContentHash, TOOL_VERSION};
use loadout_reader::Form;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Magic bytes identifying a compiled artifact.
const COMPILED_MAGIC: [u8; 4] = *b"LDOT";

/// Current compiled format version. Increment on breaking changes to
/// the header or payload format.
const COMPILED_FORMAT_VERSION: u32 = 1;

/// Header prepended to every compiled artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledHeader {
    /// Magic bytes: must be `b"LDOT"`.
    pub magic: [u8; 4],

    /// Compiled format version.
    pub format_version: u32,

    /// Tool version that produced this file.
    pub tool_version: String,

    /// Content hash of the payload data.
    pub checksum: ContentHash,
}

/// Writes `forms` to `path` as a compiled artifact.
pub fn write_compiled(path: &Path, forms: &[Form]) -> Result<(), CacheError> {
    let payload = bincode::serde::encode_to_vec(forms, bincode::config::standard()).map_err(
        |e| CacheError::Serialization {
            reason: e.to_string(),
        },
    )?;

    let header = CompiledHeader {
        magic: COMPILED_MAGIC,
        format_version: COMPILED_FORMAT_VERSION,
        tool_version: TOOL_VERSION.to_string(),
        checksum: ContentHash::from_bytes(&payload),
    };

    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);

    std::fs::write(path, &output).map_err(|e| CacheError::io(path, e))
}

/// Reads and validates a compiled artifact.
pub fn read_compiled(path: &Path) -> Result<Vec<Form>, CacheError> {
    let raw = std::fs::read(path).map_err(|e| CacheError::io(path, e))?;
    let invalid = |reason: &str| CacheError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if raw.len() < 4 {
        return Err(invalid("file too short"));
    }
    let header_len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    if raw.len() < 4 + header_len {
        return Err(invalid("truncated header"));
    }

    let (header, _): (CompiledHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?;

    if header.magic != COMPILED_MAGIC {
        return Err(invalid("missing magic bytes"));
    }
    if header.format_version != COMPILED_FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            path: path.to_path_buf(),
            expected: COMPILED_FORMAT_VERSION,
            actual: header.format_version,
        });
    }

    let payload = &raw[4 + header_len..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(CacheError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }

    let (forms, _): (Vec<Form>, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard()).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })?;
    Ok(forms)
}
