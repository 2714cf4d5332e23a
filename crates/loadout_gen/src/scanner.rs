//! Discovery of declaration source files.
//!
//! Candidates are, in order: `core/autoload.<ext>` and `core/autoload/**`,
//! then for every module directory (enabled or not) its `autoload.<ext>` and
//! `autoload/**`, then `private/autoload.<ext>` and `private/autoload/**`.
//! Each candidate's leading bytes are checked for a predicate marker; files
//! whose predicate does not hold are excluded.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use loadout_config::ProjectLayout;
use loadout_diagnostics::{code, Diagnostic, DiagnosticSink, Location};

use crate::error::GenError;
use crate::origin::ModuleOrigin;
use crate::predicate::{evaluate_str, find_marker, PredicateContext};
use crate::registry::ModuleRegistry;

/// Base name of per-directory declaration files and subdirectories.
pub const DECLARATION_STEM: &str = "autoload";

/// How many leading bytes are read when looking for a predicate.
const HEAD_BYTES: u64 = 256;

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Modification time, if it could be read.
    pub modified: Option<SystemTime>,
    /// Who owns the file.
    pub origin: ModuleOrigin,
    /// The raw predicate text from the file's marker, if any.
    pub predicate: Option<String>,
}

/// The result of a scan.
#[derive(Debug, Default, Clone)]
pub struct Scan {
    /// Files that take part in generation, in scan order.
    pub included: Vec<ScannedFile>,
    /// Files whose predicate excluded them.
    pub excluded: Vec<ScannedFile>,
    /// Every directory that was looked in.
    pub directories: Vec<PathBuf>,
}

impl Scan {
    /// Every path whose modification invalidates the artifact built from
    /// this scan: all candidate files plus the directories holding them.
    pub fn candidates(&self) -> Vec<PathBuf> {
        self.included
            .iter()
            .chain(&self.excluded)
            .map(|f| f.path.clone())
            .chain(self.directories.iter().cloned())
            .collect()
    }
}

/// Walks a project's declaration roots.
pub struct SourceScanner<'a> {
    layout: &'a ProjectLayout,
    registry: &'a dyn ModuleRegistry,
}

impl<'a> SourceScanner<'a> {
    /// Creates a scanner over `layout`.
    pub fn new(layout: &'a ProjectLayout, registry: &'a dyn ModuleRegistry) -> Self {
        Self { layout, registry }
    }

    /// Discovers and filters candidate files.
    ///
    /// Excluded files are reported as notes; predicates that fail to read or
    /// interpret exclude their file with a warning.
    pub fn scan(&self, sink: &DiagnosticSink) -> Result<Scan, GenError> {
        let mut scan = Scan::default();
        let mut roots = vec![self.layout.core_dir.clone()];
        if self.layout.modules_dir.is_dir() {
            scan.directories.push(self.layout.modules_dir.clone());
        }
        for module in self.registry.modules() {
            if let Some(category_dir) = module.dir.parent() {
                if !scan.directories.iter().any(|d| d == category_dir) {
                    scan.directories.push(category_dir.to_path_buf());
                }
            }
            roots.push(module.dir.clone());
        }
        roots.push(self.layout.private_dir.clone());

        for root in &roots {
            let mut files = Vec::new();
            self.collect_root(root, &mut files, &mut scan.directories)?;
            for path in files {
                let file = self.inspect(path)?;
                if self.included(&file, sink) {
                    scan.included.push(file);
                } else {
                    scan.excluded.push(file);
                }
            }
        }
        tracing::debug!(
            included = scan.included.len(),
            excluded = scan.excluded.len(),
            "scanned declaration sources"
        );
        Ok(scan)
    }

    fn collect_root(
        &self,
        root: &Path,
        files: &mut Vec<PathBuf>,
        directories: &mut Vec<PathBuf>,
    ) -> Result<(), GenError> {
        if !root.is_dir() {
            return Ok(());
        }
        directories.push(root.to_path_buf());
        let single = root.join(format!("{DECLARATION_STEM}.{}", self.layout.extension));
        if single.is_file() {
            files.push(single);
        }
        let subdir = root.join(DECLARATION_STEM);
        if subdir.is_dir() {
            let mut nested = Vec::new();
            self.walk_dir(&subdir, &mut nested, directories)?;
            nested.sort();
            files.extend(nested);
        }
        Ok(())
    }

    fn walk_dir(
        &self,
        dir: &Path,
        files: &mut Vec<PathBuf>,
        directories: &mut Vec<PathBuf>,
    ) -> Result<(), GenError> {
        directories.push(dir.to_path_buf());
        for entry in std::fs::read_dir(dir).map_err(|e| GenError::io(dir, e))? {
            let entry = entry.map_err(|e| GenError::io(dir, e))?;
            let file_type = entry.file_type().map_err(|e| GenError::io(dir, e))?;
            let path = entry.path();
            if file_type.is_dir() {
                self.walk_dir(&path, files, directories)?;
            } else if file_type.is_symlink() && path.is_dir() {
                tracing::debug!(path = %path.display(), "not following directory symlink");
            } else if self.layout.is_source_file(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    fn inspect(&self, path: PathBuf) -> Result<ScannedFile, GenError> {
        let file = std::fs::File::open(&path).map_err(|e| GenError::io(&path, e))?;
        let modified = file.metadata().and_then(|m| m.modified()).ok();
        let mut head = Vec::new();
        file.take(HEAD_BYTES)
            .read_to_end(&mut head)
            .map_err(|e| GenError::io(&path, e))?;
        let head = String::from_utf8_lossy(&head);
        let predicate = find_marker(&head).map(str::to_string);
        let origin = self.registry.classify(&path);
        Ok(ScannedFile {
            path,
            modified,
            origin,
            predicate,
        })
    }

    fn included(&self, file: &ScannedFile, sink: &DiagnosticSink) -> bool {
        let Some(predicate) = &file.predicate else {
            return true;
        };
        let ctx = PredicateContext::new(&file.path, &file.origin, self.registry);
        match evaluate_str(predicate, &ctx) {
            Ok(true) => true,
            Ok(false) => {
                sink.emit(
                    Diagnostic::note(code::FILE_EXCLUDED, "excluded by its predicate")
                        .at(Location::file(&file.path))
                        .with_note(format!("predicate: {predicate}")),
                );
                false
            }
            Err(e) => {
                sink.emit(
                    Diagnostic::warning(code::PREDICATE_ERROR, e.to_string())
                        .at(Location::line(&file.path, 1))
                        .with_note("the file was excluded"),
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProjectModules;
    use loadout_config::{load_config_from_str, resolve_layout, ProjectConfig};

    struct Project {
        _dir: tempfile::TempDir,
        layout: ProjectLayout,
        config: ProjectConfig,
    }

    impl Project {
        fn new(modules: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = load_config_from_str(&format!(
                "[project]\nname = \"dots\"\nversion = \"0.1.0\"\n\n[modules]\n{modules}"
            ))
            .unwrap();
            let layout = resolve_layout(&config, dir.path());
            Self {
                _dir: dir,
                layout,
                config,
            }
        }

        fn write(&self, rel: &str, text: &str) -> PathBuf {
            let path = self.layout.root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, text).unwrap();
            path
        }

        fn scan(&self, sink: &DiagnosticSink) -> Scan {
            let registry = ProjectModules::discover(&self.layout, &self.config).unwrap();
            SourceScanner::new(&self.layout, &registry).scan(sink).unwrap()
        }
    }

    fn rel(project: &Project, files: &[ScannedFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.path
                    .strip_prefix(&project.layout.root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn scan_order() {
        let p = Project::new("lang = \"rust\"\n");
        p.write("private/autoload.el", "");
        p.write("modules/lang/rust/autoload/z.el", "");
        p.write("modules/lang/rust/autoload/a.el", "");
        p.write("modules/lang/go/autoload.el", "");
        p.write("core/autoload/ui.el", "");
        p.write("core/autoload.el", "");
        p.write("core/autoload/notes.txt", "");
        p.write("modules/lang/rust/config.el", "");

        let sink = DiagnosticSink::new();
        let scan = p.scan(&sink);
        assert_eq!(
            rel(&p, &scan.included),
            vec![
                "core/autoload.el",
                "core/autoload/ui.el",
                "modules/lang/go/autoload.el",
                "modules/lang/rust/autoload/a.el",
                "modules/lang/rust/autoload/z.el",
                "private/autoload.el",
            ]
        );
        assert_eq!(
            scan.included[2].origin,
            ModuleOrigin::module("lang", "go")
        );
        assert!(scan.included[0].modified.is_some());
    }

    #[test]
    fn predicates_filter_files() {
        let p = Project::new("lang = \"rust\"\n");
        p.write(
            "modules/lang/rust/autoload.el",
            ";;; autoload.el\n;;;###if (module-enabled)\n",
        );
        p.write(
            "modules/lang/go/autoload.el",
            ";;;###if (module-enabled)\n(defun go-run ())\n",
        );
        p.write("core/autoload.el", ";;;###if (eval-anything)\n");

        let sink = DiagnosticSink::new();
        let scan = p.scan(&sink);
        assert_eq!(rel(&p, &scan.included), vec!["modules/lang/rust/autoload.el"]);
        assert_eq!(scan.excluded.len(), 2);
        assert_eq!(
            scan.included[0].predicate.as_deref(),
            Some("(module-enabled)")
        );

        let diags = sink.diagnostics();
        assert!(diags.iter().any(|d| d.code == code::FILE_EXCLUDED));
        assert!(diags.iter().any(|d| d.code == code::PREDICATE_ERROR));
        assert_eq!(sink.warning_count(), 1);
    }

    #[test]
    fn marker_beyond_head_is_ignored() {
        let p = Project::new("");
        let padding = ";".repeat(300);
        p.write("core/autoload.el", &format!("{padding}\n;;;###if nil\n"));
        let scan = p.scan(&DiagnosticSink::new());
        assert_eq!(scan.included.len(), 1);
    }

    #[test]
    fn candidates_include_excluded_files_and_dirs() {
        let p = Project::new("");
        let included = p.write("core/autoload.el", "");
        let excluded = p.write("private/autoload.el", ";;;###if nil\n");
        let scan = p.scan(&DiagnosticSink::new());
        let candidates = scan.candidates();
        assert!(candidates.contains(&included));
        assert!(candidates.contains(&excluded));
        assert!(candidates.contains(&p.layout.core_dir));
        assert!(candidates.contains(&p.layout.private_dir));
    }

    #[cfg(unix)]
    #[test]
    fn directory_symlinks_are_not_followed() {
        let p = Project::new("");
        let ui = p.write("core/autoload/ui.el", "");
        let nested = p.layout.core_dir.join("autoload/nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::os::unix::fs::symlink(&p.layout.core_dir, nested.join("loop")).unwrap();
        std::os::unix::fs::symlink(&ui, nested.join("linked.el")).unwrap();

        let scan = p.scan(&DiagnosticSink::new());
        assert_eq!(
            rel(&p, &scan.included),
            vec!["core/autoload/nested/linked.el", "core/autoload/ui.el"]
        );
    }

    #[test]
    fn empty_project_scans_nothing() {
        let p = Project::new("");
        let scan = p.scan(&DiagnosticSink::new());
        assert!(scan.included.is_empty());
        assert!(scan.candidates().is_empty());
    }
}
