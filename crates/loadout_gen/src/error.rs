//! Error types for artifact generation.

use std::path::PathBuf;

use loadout_cache::CacheError;
use loadout_config::ConfigError;

/// Errors that can occur while generating an artifact.
///
/// Per-item problems (one declaration, one package) are also described with
/// these variants, but they are reported to the diagnostic sink and the batch
/// continues. Only whole-artifact failures are returned as `Err`.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// The requested target is not one of the known artifacts.
    #[error("unknown target `{0}` (expected `autoloads`, `packages` or `all`)")]
    InvalidTarget(String),

    /// An installed package has no usable descriptor.
    #[error("package `{package}` has no usable descriptor at {path}: {reason}")]
    MissingDescriptor {
        /// The package directory name.
        package: String,
        /// Where the descriptor was expected.
        path: PathBuf,
        /// Why it could not be used.
        reason: String,
    },

    /// A placeholder could not be synthesized for a declaration.
    #[error("cannot synthesize a stub for `{symbol}`: {reason}")]
    StubSynthesis {
        /// The declaration's symbol.
        symbol: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A file or directory could not be read or written.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The project configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Staging, compiling or loading the artifact failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl GenError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn stub(symbol: &str, reason: impl Into<String>) -> Self {
        GenError::StubSynthesis {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}
