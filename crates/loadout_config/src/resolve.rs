//! Layout resolution: turning the relative `[paths]` table into absolute paths.

use crate::loader::CONFIG_FILE;
use crate::types::ProjectConfig;
use std::path::{Path, PathBuf};

/// File name of the declaration-aggregation artifact.
pub const AUTOLOADS_FILE_STEM: &str = "autoloads";

/// File name of the package-bundle artifact.
pub const PACKAGES_FILE_STEM: &str = "packages";

/// A project's directories and artifact paths, resolved against its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// The directory containing `loadout.toml`.
    pub root: PathBuf,
    /// Core declarations directory.
    pub core_dir: PathBuf,
    /// Root of the `<category>/<name>` module tree.
    pub modules_dir: PathBuf,
    /// User-override directory.
    pub private_dir: PathBuf,
    /// Installed packages directory.
    pub packages_dir: PathBuf,
    /// Output directory.
    pub output_dir: PathBuf,
    /// Source file extension.
    pub extension: String,
    /// Compiled artifact extension.
    pub compiled_extension: String,
    /// Files whose modification invalidates every artifact.
    pub config_files: Vec<PathBuf>,
    /// Auxiliary documentation directories.
    pub doc_dirs: Vec<PathBuf>,
}

impl ProjectLayout {
    /// Path of the declaration-aggregation artifact.
    pub fn autoloads_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{AUTOLOADS_FILE_STEM}.{}", self.extension))
    }

    /// Path of the package-bundle artifact.
    pub fn packages_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{PACKAGES_FILE_STEM}.{}", self.extension))
    }

    /// Returns `true` if `path` has the configured source extension.
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.extension)
    }
}

/// Resolves the configured layout against the project root.
///
/// Absolute entries in the configuration are kept as they are; relative
/// entries are joined onto `root`.
pub fn resolve_layout(config: &ProjectConfig, root: &Path) -> ProjectLayout {
    let paths = &config.paths;
    let join = |p: &str| -> PathBuf {
        let p = Path::new(p);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            root.join(p)
        }
    };

    let mut config_files = vec![root.join(CONFIG_FILE)];
    config_files.extend(paths.extra_config.iter().map(|p| join(p)));

    ProjectLayout {
        root: root.to_path_buf(),
        core_dir: join(&paths.core),
        modules_dir: join(&paths.modules),
        private_dir: join(&paths.private),
        packages_dir: join(&paths.packages),
        output_dir: join(&paths.output),
        extension: paths.extension.clone(),
        compiled_extension: paths.compiled_extension.clone(),
        config_files,
        doc_dirs: config.packages.doc_dirs.iter().map(|p| join(p)).collect(),
    }
}
