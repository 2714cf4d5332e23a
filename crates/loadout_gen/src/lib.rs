//! Generation of the consolidated declaration artifacts.
//!
//! The aggregation pipeline turns exported declarations spread over a
//! project's core, module and private directories into one loadable artifact:
//!
//! 1. [`SourceScanner`] finds candidate files and filters them by their
//!    inclusion predicate ([`predicate`]).
//! 2. [`DeclarationExtractor`] reads the tagged forms of each file and lowers
//!    them: declarations of enabled modules become resolved autoloads
//!    ([`PathResolver`]), declarations of disabled modules become inert
//!    placeholders ([`stub`]) or their inline override.
//! 3. [`ArtifactBuffer`] assembles the entries under a fixed header.
//! 4. The compile guard of `loadout_cache` stages, compiles and loads the
//!    text ([`ArtifactLoader`]) before it replaces the previous artifact.
//!
//! The package pipeline ([`PackageBundler`]) concatenates the declaration
//! files of installed packages and caches the [`EnvironmentSnapshot`].
//! [`Generator`] runs both.

#![warn(missing_docs)]

pub mod declaration;
pub mod entry;
pub mod error;
pub mod extract;
pub mod loader;
pub mod origin;
pub mod packages;
pub mod pipeline;
pub mod predicate;
pub mod registry;
pub mod resolver;
pub mod scanner;
pub mod snapshot;
pub mod stub;
pub mod writer;

pub use declaration::{DeclKind, Declaration, ParamError, ParamList};
pub use entry::Entry;
pub use error::GenError;
pub use extract::{extract, DeclarationExtractor, EXPORT_TAG};
pub use loader::{ArtifactImage, ArtifactLoader, CallError, Outcome, Thunk};
pub use origin::ModuleOrigin;
pub use packages::{
    Bundle, DirectoryPackages, InstalledPackage, PackageBundler, PackageDescriptor, PackageSource,
};
pub use pipeline::{
    ArtifactKind, ArtifactOutcome, ArtifactReport, ArtifactStatus, GenerateOptions, Generator,
    Target,
};
pub use registry::{ModuleDir, ModuleRegistry, ProjectModules};
pub use resolver::PathResolver;
pub use scanner::{Scan, ScannedFile, SourceScanner};
pub use snapshot::EnvironmentSnapshot;
pub use stub::synthesize;
pub use writer::{assemble, ArtifactBuffer};
