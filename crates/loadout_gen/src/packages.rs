//! Installed packages and the package bundle.
//!
//! Every directory under the packages root is an installed package described
//! by `<name>-pkg.toml`. Packages ship their own generated declaration file,
//! `<name>-autoloads.<ext>`; the bundle is the concatenation of those files,
//! made independent of their original location.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use loadout_diagnostics::{code, Diagnostic, DiagnosticSink, Location};
use loadout_reader::{line_of, quote_string, Form, FormKind, ReadError, Reader};

use crate::error::GenError;
use crate::registry::sorted_subdirs;

/// Contents of a package's `<name>-pkg.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageDescriptor {
    /// Package name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// One-line summary.
    #[serde(default)]
    pub description: Option<String>,
    /// Names of packages this one needs.
    #[serde(default)]
    pub requires: Vec<String>,
}

/// A package found on disk with a usable descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    /// Package directory name.
    pub name: String,
    /// The package directory.
    pub dir: PathBuf,
    /// Where the descriptor was read from.
    pub descriptor_path: PathBuf,
    /// The parsed descriptor.
    pub descriptor: PackageDescriptor,
}

/// Enumerates installed packages.
pub trait PackageSource {
    /// Every installed package with a usable descriptor. Packages without
    /// one are reported and left out.
    fn installed(&self, sink: &DiagnosticSink) -> Result<Vec<InstalledPackage>, GenError>;

    /// The generated declaration file of `package`.
    fn autoloads_file(&self, package: &InstalledPackage) -> PathBuf;

    /// The directory packages are installed in.
    fn root(&self) -> &Path;
}

/// Packages installed as subdirectories of one directory.
#[derive(Debug, Clone)]
pub struct DirectoryPackages {
    dir: PathBuf,
    extension: String,
}

impl DirectoryPackages {
    /// Creates a source over `dir` whose declaration files use `extension`.
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.to_string(),
        }
    }

    fn descriptor(&self, name: &str, dir: &Path) -> Result<InstalledPackage, GenError> {
        let path = dir.join(format!("{name}-pkg.toml"));
        let missing = |reason: String| GenError::MissingDescriptor {
            package: name.to_string(),
            path: path.clone(),
            reason,
        };
        let text = std::fs::read_to_string(&path).map_err(|e| missing(e.to_string()))?;
        let descriptor: PackageDescriptor =
            toml::from_str(&text).map_err(|e| missing(e.message().to_string()))?;
        if descriptor.name != name {
            return Err(missing(format!("descriptor names `{}`", descriptor.name)));
        }
        Ok(InstalledPackage {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            descriptor_path: path.clone(),
            descriptor,
        })
    }
}

impl PackageSource for DirectoryPackages {
    fn installed(&self, sink: &DiagnosticSink) -> Result<Vec<InstalledPackage>, GenError> {
        let mut packages = Vec::new();
        for dir in sorted_subdirs(&self.dir)? {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            match self.descriptor(name, &dir) {
                Ok(package) => packages.push(package),
                Err(e) => {
                    let path = match &e {
                        GenError::MissingDescriptor { path, .. } => path.clone(),
                        _ => dir.clone(),
                    };
                    sink.emit(
                        Diagnostic::warning(code::MISSING_DESCRIPTOR, e.to_string())
                            .at(Location::file(path))
                            .with_note("the package was skipped"),
                    );
                }
            }
        }
        Ok(packages)
    }

    fn autoloads_file(&self, package: &InstalledPackage) -> PathBuf {
        package
            .dir
            .join(format!("{}-autoloads.{}", package.name, self.extension))
    }

    fn root(&self) -> &Path {
        &self.dir
    }
}

/// Concatenates the declaration files of installed packages.
pub struct PackageBundler<'a> {
    source: &'a dyn PackageSource,
    disabled: &'a [String],
}

/// What the bundler produced for one generation.
#[derive(Debug, Default, Clone)]
pub struct Bundle {
    /// Rewritten declaration text, one chunk per package, in package order.
    pub chunks: Vec<String>,
    /// Name and directory of every bundled package.
    pub activated: Vec<(String, PathBuf)>,
}

impl<'a> PackageBundler<'a> {
    /// Creates a bundler over `source` that leaves out `disabled` packages.
    pub fn new(source: &'a dyn PackageSource, disabled: &'a [String]) -> Self {
        Self { source, disabled }
    }

    /// Returns `true` unless `package` is disabled.
    pub fn is_active(&self, package: &InstalledPackage) -> bool {
        !self.disabled.iter().any(|d| *d == package.name)
    }

    /// Name and directory of every active package.
    pub fn activated(&self, installed: &[InstalledPackage]) -> Vec<(String, PathBuf)> {
        installed
            .iter()
            .filter(|p| self.is_active(p))
            .map(|p| (p.name.clone(), p.dir.clone()))
            .collect()
    }

    /// Files whose modification invalidates the bundle: the packages
    /// directory, then each package's descriptor and declaration file.
    pub fn candidates(&self, installed: &[InstalledPackage]) -> Vec<PathBuf> {
        let mut paths = vec![self.source.root().to_path_buf()];
        for package in installed {
            paths.push(package.dir.clone());
            paths.push(package.descriptor_path.clone());
            paths.push(self.source.autoloads_file(package));
        }
        paths
    }

    /// Builds the bundle from `installed`.
    ///
    /// A declaration file that cannot be read is reported and its package
    /// contributes nothing.
    pub fn bundle(&self, installed: &[InstalledPackage], sink: &DiagnosticSink) -> Bundle {
        let mut bundle = Bundle::default();
        for package in installed {
            if !self.is_active(package) {
                tracing::debug!(package = %package.name, "skipping disabled package");
                continue;
            }
            bundle.activated.push((package.name.clone(), package.dir.clone()));

            let file = self.source.autoloads_file(package);
            if !file.is_file() {
                tracing::debug!(package = %package.name, "package has no declaration file");
                continue;
            }
            let text = match std::fs::read_to_string(&file) {
                Ok(text) => text,
                Err(e) => {
                    sink.emit(
                        Diagnostic::error(code::READ_ERROR, e.to_string()).at(Location::file(&file)),
                    );
                    continue;
                }
            };
            match relocate(&text, &file) {
                Ok(chunk) => bundle.chunks.push(chunk),
                Err(e) => sink.emit(
                    Diagnostic::error(code::READ_ERROR, e.message.clone())
                        .at(Location::line(&file, line_of(&text, e.offset)))
                        .with_note(format!("package `{}` was skipped", package.name)),
                ),
            }
        }
        tracing::info!(packages = bundle.activated.len(), "bundled packages");
        bundle
    }
}

/// Makes a package's declaration text independent of where it was loaded
/// from.
///
/// `load-file-name` and `#$` become the quoted path of `file`, and top-level
/// `(add-to-list 'load-path ...)` forms are removed since the search path is
/// cached separately. Everything else, comments included, is kept as is.
pub fn relocate(text: &str, file: &Path) -> Result<String, ReadError> {
    let quoted_path = quote_string(&file.to_string_lossy());
    let mut edits: Vec<(usize, usize, &str)> = Vec::new();
    let mut reader = Reader::new(text);
    while let Some(form) = reader.read_next()? {
        if extends_search_path(&form) {
            edits.push((form.span.start as usize, form.span.end as usize, ""));
            continue;
        }
        form.walk(&mut |inner: &Form| {
            if let FormKind::Symbol(name) = &inner.kind {
                if (name == "load-file-name" || name == "#$") && !inner.span.is_synthetic() {
                    edits.push((inner.span.start as usize, inner.span.end as usize, &quoted_path));
                }
            }
        });
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end, replacement) in edits {
        out.push_str(&text[cursor..start]);
        out.push_str(replacement);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

fn extends_search_path(form: &Form) -> bool {
    form.head() == Some("add-to-list")
        && form
            .as_list()
            .and_then(|items| items.get(1))
            .is_some_and(|var| var.is_quoted() && var.unquoted().as_symbol() == Some("load-path"))
}
