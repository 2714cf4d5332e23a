//! Error types for cache and compile operations.

use std::path::PathBuf;

/// Errors that can occur while staging, compiling or loading artifacts.
///
/// Freshness checks and stamp reads are fail-safe and never produce these;
/// a problem there just means the artifact is rebuilt.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing an artifact file.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Artifact text could not be read back as forms.
    #[error("read error in {path} at line {line}: {message}")]
    Read {
        /// The file being read.
        path: PathBuf,
        /// 1-indexed line of the failure.
        line: u32,
        /// What the reader rejected.
        message: String,
    },

    /// A compiled artifact has an invalid or missing header.
    #[error("invalid artifact header in {path}: {reason}")]
    InvalidHeader {
        /// The compiled artifact path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the payload.
    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The compiled artifact path.
        path: PathBuf,
        /// The expected checksum from the header.
        expected: String,
        /// The actual checksum computed from the payload.
        actual: String,
    },

    /// The compiled format version does not match the current version.
    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The compiled artifact path.
        path: PathBuf,
        /// The expected format version.
        expected: u32,
        /// The actual format version found in the file.
        actual: u32,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// Loading an artifact surfaced a top-level error.
    #[error("failed to load {path}: {reason}")]
    LoadFailure {
        /// The file that was being loaded.
        path: PathBuf,
        /// The residual error.
        reason: String,
    },

    /// A freshly assembled artifact failed to compile or load.
    ///
    /// The pre-compile text has been moved to `backup`.
    #[error("failed to compile {artifact}: {reason} (backup saved to {})", .backup.display())]
    CompileFailure {
        /// Short name of the artifact, e.g. `autoloads.el`.
        artifact: String,
        /// Where the pre-compile text was preserved.
        backup: PathBuf,
        /// The underlying failure.
        reason: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
