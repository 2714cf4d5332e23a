//! Module enablement and path classification.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use loadout_config::{ProjectConfig, ProjectLayout};

use crate::error::GenError;
use crate::origin::ModuleOrigin;

/// A feature module directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDir {
    /// The module category.
    pub category: String,
    /// The module name.
    pub name: String,
    /// `modules/<category>/<name>`.
    pub dir: PathBuf,
}

/// Answers which modules exist, which are enabled, and who owns a path.
pub trait ModuleRegistry {
    /// Returns `true` if `category`/`name` is enabled.
    fn is_enabled(&self, category: &str, name: &str) -> bool;

    /// Classifies `path` by the directory it lives in.
    fn classify(&self, path: &Path) -> ModuleOrigin;

    /// Every module directory, enabled or not, in a stable order.
    fn modules(&self) -> &[ModuleDir];

    /// Returns `true` if declarations from `origin` should be real.
    ///
    /// Core and private files are always enabled.
    fn origin_enabled(&self, origin: &ModuleOrigin) -> bool {
        match origin {
            ModuleOrigin::Core | ModuleOrigin::Private => true,
            ModuleOrigin::Module { category, name } => self.is_enabled(category, name),
        }
    }
}

/// The module registry of a project on disk.
///
/// Module directories are discovered under `modules/`; the ones listed in the
/// `[modules]` table of `loadout.toml` are enabled.
#[derive(Debug, Clone)]
pub struct ProjectModules {
    modules_dir: PathBuf,
    private_dir: PathBuf,
    enabled: BTreeSet<(String, String)>,
    modules: Vec<ModuleDir>,
}

impl ProjectModules {
    /// Discovers the module directories of a project.
    pub fn discover(layout: &ProjectLayout, config: &ProjectConfig) -> Result<Self, GenError> {
        let mut modules = Vec::new();
        for category_dir in sorted_subdirs(&layout.modules_dir)? {
            let Some(category) = dir_name(&category_dir) else {
                continue;
            };
            for module_dir in sorted_subdirs(&category_dir)? {
                let Some(name) = dir_name(&module_dir) else {
                    continue;
                };
                modules.push(ModuleDir {
                    category: category.clone(),
                    name,
                    dir: module_dir,
                });
            }
        }

        let registry = Self::new(layout, config.enabled_modules(), modules);
        for (category, name) in &registry.enabled {
            if !registry
                .modules
                .iter()
                .any(|m| &m.category == category && &m.name == name)
            {
                tracing::warn!(module = %format!(":{category} {name}"), "enabled module has no directory");
            }
        }
        Ok(registry)
    }

    /// Creates a registry from an explicit module list.
    pub fn new(
        layout: &ProjectLayout,
        enabled: BTreeSet<(String, String)>,
        modules: Vec<ModuleDir>,
    ) -> Self {
        Self {
            modules_dir: layout.modules_dir.clone(),
            private_dir: layout.private_dir.clone(),
            enabled,
            modules,
        }
    }
}

impl ModuleRegistry for ProjectModules {
    fn is_enabled(&self, category: &str, name: &str) -> bool {
        self.enabled
            .contains(&(category.to_string(), name.to_string()))
    }

    fn classify(&self, path: &Path) -> ModuleOrigin {
        if let Ok(rest) = path.strip_prefix(&self.modules_dir) {
            let mut parts = rest.components().filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            });
            if let (Some(category), Some(name)) = (parts.next(), parts.next()) {
                return ModuleOrigin::module(category, name);
            }
        }
        if path.starts_with(&self.private_dir) {
            return ModuleOrigin::Private;
        }
        ModuleOrigin::Core
    }

    fn modules(&self) -> &[ModuleDir] {
        &self.modules
    }
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.starts_with('.'))
        .map(str::to_string)
}

/// Lists the subdirectories of `dir`, sorted. A missing `dir` has none.
pub(crate) fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, GenError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| GenError::io(dir, e))? {
        let path = entry.map_err(|e| GenError::io(dir, e))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
