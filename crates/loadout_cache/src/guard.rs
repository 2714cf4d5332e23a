//! Staged compile-and-load with rollback.
//!
//! A regenerated artifact never overwrites the previous one directly. The
//! [`CompileGuard`] writes the new text next to the target, compiles and loads
//! it there, and only renames it into place once both succeeded. On failure
//! the staged text is kept as a `.bk` backup for inspection.

use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use loadout_common::ContentHash;
use loadout_reader::{line_of, read_all};

use crate::artifact::write_compiled;
use crate::error::CacheError;
use crate::stamp::EnvironmentStamp;

/// Suffix of the staged artifact text.
const STAGED_SUFFIX: &str = ".tmp";

/// Suffix of the backup kept after a failed compile.
const BACKUP_SUFFIX: &str = ".bk";

/// Returns `path` with `suffix` appended to its file name.
///
/// `append_suffix("a/autoloads.el", ".bk")` is `a/autoloads.el.bk`.
pub fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Turns artifact text into its compiled form.
pub trait Compiler {
    /// Compiles the text at `source` into `output`.
    fn compile(&self, source: &Path, output: &Path) -> Result<(), CacheError>;
}

/// Loads an artifact so that residual top-level errors surface.
pub trait Loader {
    /// The loaded result.
    type Image;

    /// Loads a compiled artifact.
    fn load_compiled(&self, compiled: &Path) -> Result<Self::Image, CacheError>;

    /// Loads artifact text directly.
    fn load_source(&self, source: &Path) -> Result<Self::Image, CacheError>;
}

/// The default compiler: reads every top-level form and writes them in the
/// validated binary format of [`crate::artifact`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FormCompiler;

impl Compiler for FormCompiler {
    fn compile(&self, source: &Path, output: &Path) -> Result<(), CacheError> {
        let text = std::fs::read_to_string(source).map_err(|e| CacheError::io(source, e))?;
        let forms = read_all(&text).map_err(|e| CacheError::Read {
            path: source.to_path_buf(),
            line: line_of(&text, e.offset),
            message: e.message.clone(),
        })?;
        write_compiled(output, &forms)
    }
}

/// What happens to the previous artifact when a new one fails to compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Remove the previous artifact and its compiled form, so the next run
    /// starts from an absent artifact.
    #[default]
    DiscardPrevious,
    /// Leave the previous artifact and its compiled form in place.
    KeepPrevious,
}

/// An artifact loaded without regenerating it.
#[derive(Debug)]
pub struct Activated<I> {
    /// The loaded image.
    pub image: I,
    /// Set when the compiled form was unusable and the text was loaded
    /// instead; holds the reason.
    pub fallback: Option<String>,
}

/// Stages, compiles and loads artifacts, replacing the previous artifact only
/// when all three succeed.
pub struct CompileGuard<'a, C, L> {
    compiler: &'a C,
    loader: &'a L,
    compiled_extension: String,
    policy: RecoveryPolicy,
    debug: bool,
}

impl<'a, C: Compiler, L: Loader> CompileGuard<'a, C, L> {
    /// Creates a guard that produces compiled forms with `compiled_extension`.
    pub fn new(compiler: &'a C, loader: &'a L, compiled_extension: &str) -> Self {
        Self {
            compiler,
            loader,
            compiled_extension: compiled_extension.to_string(),
            policy: RecoveryPolicy::default(),
            debug: false,
        }
    }

    /// Sets what happens to the previous artifact on failure.
    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Loads artifact text instead of compiled forms.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Path of the compiled form of `target`.
    pub fn compiled_path(&self, target: &Path) -> PathBuf {
        target.with_extension(&self.compiled_extension)
    }

    /// Path of the backup written when compiling `target` fails.
    pub fn backup_path(target: &Path) -> PathBuf {
        append_suffix(target, BACKUP_SUFFIX)
    }

    /// Replaces `target` with `text`, transactionally.
    ///
    /// The text is staged at `<target>.tmp` and synced, compiled to
    /// `<target>.tmp.<compiled-ext>`, then loaded. On success the previous
    /// artifact and compiled form are removed, the staged files are renamed
    /// into place and a stamp recording `fingerprint` is written. On failure
    /// the staged text becomes `<target>.bk` and a
    /// [`CacheError::CompileFailure`] is returned.
    pub fn commit(
        &self,
        target: &Path,
        text: &str,
        fingerprint: ContentHash,
    ) -> Result<L::Image, CacheError> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        let staged = append_suffix(target, STAGED_SUFFIX);
        let staged_compiled = append_suffix(&staged, &format!(".{}", self.compiled_extension));

        write_synced(&staged, text)?;

        let image = match self.compile_and_load(&staged, &staged_compiled) {
            Ok(image) => image,
            Err(err) => return Err(self.roll_back(target, &staged, &staged_compiled, err)),
        };

        let compiled = self.compiled_path(target);
        remove_if_exists(target)?;
        remove_if_exists(&compiled)?;
        std::fs::rename(&staged, target).map_err(|e| CacheError::io(target, e))?;
        std::fs::rename(&staged_compiled, &compiled).map_err(|e| CacheError::io(&compiled, e))?;
        EnvironmentStamp::new(fingerprint).save(target)?;

        tracing::debug!(artifact = %target.display(), "committed artifact");
        Ok(image)
    }

    /// Loads an up-to-date artifact without regenerating it.
    ///
    /// The compiled form is preferred. If it is missing or fails validation,
    /// the text is loaded instead and the reason is reported in
    /// [`Activated::fallback`].
    pub fn activate(&self, target: &Path) -> Result<Activated<L::Image>, CacheError> {
        if self.debug {
            return Ok(Activated {
                image: self.loader.load_source(target)?,
                fallback: None,
            });
        }
        match self.loader.load_compiled(&self.compiled_path(target)) {
            Ok(image) => Ok(Activated {
                image,
                fallback: None,
            }),
            Err(err) => {
                tracing::debug!(artifact = %target.display(), error = %err, "compiled form unusable");
                Ok(Activated {
                    image: self.loader.load_source(target)?,
                    fallback: Some(err.to_string()),
                })
            }
        }
    }

    fn compile_and_load(&self, staged: &Path, staged_compiled: &Path) -> Result<L::Image, CacheError> {
        self.compiler.compile(staged, staged_compiled)?;
        if self.debug {
            self.loader.load_source(staged)
        } else {
            self.loader.load_compiled(staged_compiled)
        }
    }

    fn roll_back(
        &self,
        target: &Path,
        staged: &Path,
        staged_compiled: &Path,
        cause: CacheError,
    ) -> CacheError {
        let backup = Self::backup_path(target);
        let artifact = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.display().to_string());

        // Cleanup is best effort; the compile failure is the error reported.
        let _ = remove_if_exists(&backup);
        if let Err(e) = std::fs::rename(staged, &backup) {
            tracing::warn!(path = %staged.display(), error = %e, "could not move staged artifact to backup");
        }
        let _ = remove_if_exists(staged_compiled);
        if self.policy == RecoveryPolicy::DiscardPrevious {
            let _ = remove_if_exists(target);
            let _ = remove_if_exists(&self.compiled_path(target));
            let _ = EnvironmentStamp::remove(target);
        }

        tracing::error!(artifact = %artifact, backup = %backup.display(), "compile failed");
        CacheError::CompileFailure {
            artifact,
            backup,
            reason: cause.to_string(),
        }
    }
}

fn write_synced(path: &Path, text: &str) -> Result<(), CacheError> {
    let mut file = File::create(path).map_err(|e| CacheError::io(path, e))?;
    file.write_all(text.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| CacheError::io(path, e))
}

fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io(path, e)),
    }
}
