//! The process-wide values cached in the package bundle.

use std::collections::HashMap;
use std::path::PathBuf;

use loadout_common::ContentHash;
use loadout_config::{ProjectConfig, ProjectLayout};
use loadout_reader::{Form, FormKind};

/// Variable holding the search path.
pub const SEARCH_PATH_VAR: &str = "load-path";
/// Variable holding the file-type associations.
pub const ASSOCIATIONS_VAR: &str = "auto-mode-alist";
/// Variable holding the documentation directories.
pub const DOC_DIRS_VAR: &str = "Info-directory-list";
/// Variable holding the disabled package names.
pub const DISABLED_PACKAGES_VAR: &str = "loadout-disabled-packages";
/// Variable holding the activated package names.
pub const ACTIVATED_PACKAGES_VAR: &str = "package-activated-list";

/// Expensive-to-recompute values, captured once per generation and passed
/// explicitly to whatever needs them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSnapshot {
    /// Directories searched when resolving file references, in order.
    pub search_paths: Vec<PathBuf>,
    /// File name pattern to handler, in configuration order.
    pub file_associations: Vec<(String, String)>,
    /// Auxiliary documentation directories.
    pub doc_dirs: Vec<PathBuf>,
    /// Packages that are installed but disabled.
    pub disabled_packages: Vec<String>,
    /// Packages whose declarations are bundled.
    pub activated_packages: Vec<String>,
}

impl EnvironmentSnapshot {
    /// Captures the snapshot for a project.
    ///
    /// The search path is the project root, the core and private directories,
    /// then the directory of every activated package.
    pub fn capture(
        layout: &ProjectLayout,
        config: &ProjectConfig,
        activated: &[(String, PathBuf)],
    ) -> Self {
        let mut search_paths = vec![
            layout.root.clone(),
            layout.core_dir.clone(),
            layout.private_dir.clone(),
        ];
        search_paths.extend(activated.iter().map(|(_, dir)| dir.clone()));

        let mut disabled = config.packages.disabled.clone();
        disabled.sort();
        disabled.dedup();

        Self {
            search_paths,
            file_associations: config
                .associations
                .iter()
                .map(|(pattern, handler)| (pattern.clone(), handler.clone()))
                .collect(),
            doc_dirs: layout.doc_dirs.clone(),
            disabled_packages: disabled,
            activated_packages: activated.iter().map(|(name, _)| name.clone()).collect(),
        }
    }

    /// A hash of every value, recorded in artifact stamps.
    pub fn fingerprint(&self) -> ContentHash {
        let mut fields: Vec<String> = Vec::new();
        let mut section = |name: &str, values: Vec<String>| {
            fields.push(format!("{name}:{}", values.len()));
            fields.extend(values);
        };
        section(
            SEARCH_PATH_VAR,
            self.search_paths.iter().map(|p| p.to_string_lossy().into_owned()).collect(),
        );
        section(
            ASSOCIATIONS_VAR,
            self.file_associations
                .iter()
                .flat_map(|(p, h)| [p.clone(), h.clone()])
                .collect(),
        );
        section(
            DOC_DIRS_VAR,
            self.doc_dirs.iter().map(|p| p.to_string_lossy().into_owned()).collect(),
        );
        section(DISABLED_PACKAGES_VAR, self.disabled_packages.clone());
        section(ACTIVATED_PACKAGES_VAR, self.activated_packages.clone());
        ContentHash::from_fields(&fields)
    }

    /// The `setq` statement that restores this snapshot when the bundle is
    /// loaded.
    pub fn cache_state(&self) -> String {
        let paths = |list: &[PathBuf]| {
            list.iter()
                .map(|p| Form::string(p.to_string_lossy().into_owned()))
                .collect::<Vec<_>>()
        };
        let names = |list: &[String]| list.iter().map(Form::symbol).collect::<Vec<_>>();
        let associations = self
            .file_associations
            .iter()
            .map(|(pattern, handler)| {
                Form::dotted(vec![Form::string(pattern.clone())], Form::symbol(handler.clone()))
            })
            .collect();

        let bindings = [
            (SEARCH_PATH_VAR, paths(&self.search_paths)),
            (ASSOCIATIONS_VAR, associations),
            (DOC_DIRS_VAR, paths(&self.doc_dirs)),
            (DISABLED_PACKAGES_VAR, names(&self.disabled_packages)),
            (ACTIVATED_PACKAGES_VAR, names(&self.activated_packages)),
        ];
        let lines: Vec<String> = bindings
            .into_iter()
            .map(|(var, items)| format!("{var} {}", Form::quote(Form::list(items))))
            .collect();
        format!("(setq {})", lines.join("\n      "))
    }

    /// Rebuilds a snapshot from variable bindings restored by a `setq`.
    ///
    /// Returns `None` if a variable is missing or has an unexpected shape.
    pub fn from_bindings(bindings: &HashMap<String, Form>) -> Option<Self> {
        let list = |var: &str| -> Option<Vec<Form>> {
            Some(bindings.get(var)?.unquoted().as_list()?.to_vec())
        };
        let strings = |var: &str| -> Option<Vec<String>> {
            list(var)?
                .iter()
                .map(|f| f.as_str().map(str::to_string))
                .collect()
        };
        let symbols = |var: &str| -> Option<Vec<String>> {
            list(var)?
                .iter()
                .map(|f| f.as_symbol().map(str::to_string))
                .collect()
        };
        let associations = list(ASSOCIATIONS_VAR)?
            .iter()
            .map(|pair| match &pair.kind {
                FormKind::Dotted(head, tail) if head.len() == 1 => Some((
                    head[0].as_str()?.to_string(),
                    tail.as_symbol()?.to_string(),
                )),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            search_paths: strings(SEARCH_PATH_VAR)?.into_iter().map(PathBuf::from).collect(),
            file_associations: associations,
            doc_dirs: strings(DOC_DIRS_VAR)?.into_iter().map(PathBuf::from).collect(),
            disabled_packages: symbols(DISABLED_PACKAGES_VAR)?,
            activated_packages: symbols(ACTIVATED_PACKAGES_VAR)?,
        })
    }
}
