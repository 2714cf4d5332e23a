//! Artifact freshness and the compile-with-rollback protocol.
//!
//! This crate decides whether a generated artifact is stale and, when it is
//! regenerated, stages, compiles and loads the new text before letting it
//! replace the previous artifact:
//!
//! - **Invalidation** ([`invalidation`]): force flag, missing artifact,
//!   environment stamp, then config and source mtimes.
//! - **Stamps** ([`stamp`]): the environment fingerprint recorded next to each
//!   artifact after a successful commit.
//! - **Compiled artifacts** ([`artifact`]): the validated binary form of an
//!   artifact's top-level forms.
//! - **Compile guard** ([`guard`]): staged write, compile, load, then rename
//!   into place or back up and roll back.

#![warn(missing_docs)]

pub mod artifact;
pub mod error;
pub mod guard;
pub mod invalidation;
pub mod stamp;

pub use artifact::{read_compiled, write_compiled};
pub use error::CacheError;
pub use guard::{
    append_suffix, Activated, CompileGuard, Compiler, FormCompiler, Loader, RecoveryPolicy,
};
pub use invalidation::{modified_time, needs_rebuild, RebuildReason};
pub use stamp::EnvironmentStamp;
