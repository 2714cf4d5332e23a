//! Resolution of file references against the search path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Rewrites file references into canonical absolute paths.
///
/// A reference is a path without extension, relative to one of the search
/// directories (`modules/lang/rust/autoload`) or absolute. Results are
/// memoized by reference for the lifetime of the resolver, which is one
/// generation pass.
#[derive(Debug)]
pub struct PathResolver {
    search_paths: Vec<PathBuf>,
    extension: String,
    cache: HashMap<String, String>,
}

impl PathResolver {
    /// Creates a resolver over `search_paths`, looking for files with
    /// `extension`.
    pub fn new(search_paths: Vec<PathBuf>, extension: &str) -> Self {
        Self {
            search_paths,
            extension: extension.to_string(),
            cache: HashMap::new(),
        }
    }

    /// Resolves `reference`.
    ///
    /// Returns the canonical path of the first matching source file, without
    /// its extension, so the host can still prefer a compiled sibling. If no
    /// file matches, `reference` is returned unchanged and resolution is left
    /// to load time.
    pub fn resolve(&mut self, reference: &str) -> String {
        if let Some(hit) = self.cache.get(reference) {
            return hit.clone();
        }
        let resolved = self.lookup(reference).unwrap_or_else(|| {
            tracing::debug!(reference, "reference not found on search path");
            reference.to_string()
        });
        self.cache.insert(reference.to_string(), resolved.clone());
        resolved
    }

    /// Number of distinct references resolved so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn lookup(&self, reference: &str) -> Option<String> {
        let file_name = if Path::new(reference)
            .extension()
            .is_some_and(|e| e == self.extension.as_str())
        {
            reference.to_string()
        } else {
            format!("{reference}.{}", self.extension)
        };

        let candidates: Vec<PathBuf> = if Path::new(reference).is_absolute() {
            vec![PathBuf::from(&file_name)]
        } else {
            self.search_paths.iter().map(|dir| dir.join(&file_name)).collect()
        };

        candidates
            .into_iter()
            .find(|path| path.is_file())
            .and_then(|path| path.canonicalize().ok())
            .map(|path| path.with_extension("").to_string_lossy().into_owned())
    }
}
