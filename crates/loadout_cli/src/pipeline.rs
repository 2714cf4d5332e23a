//! Shared helpers for the CLI commands: project discovery and diagnostic output.

use std::path::{Path, PathBuf};

use loadout_config::CONFIG_FILE;
use loadout_diagnostics::{Diagnostic, DiagnosticRenderer, DiagnosticSink, TerminalRenderer};

use crate::{GlobalArgs, ReportFormat};

/// Walks up from `start` looking for a directory that holds `loadout.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Determines the project root from `--config`, or by searching upward from
/// the current directory.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(config) = &global.config {
        let path = PathBuf::from(config);
        let root = if path.is_file() {
            path.parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            path
        };
        if !root.join(CONFIG_FILE).is_file() {
            return Err(format!("no {CONFIG_FILE} found in {}", root.display()).into());
        }
        return Ok(root.canonicalize()?);
    }

    let cwd = std::env::current_dir()?.canonicalize()?;
    find_project_root(&cwd).ok_or_else(|| {
        format!(
            "no {CONFIG_FILE} found in {} or any parent directory",
            cwd.display()
        )
        .into()
    })
}

/// Renders everything collected in `sink` to stderr and returns the
/// diagnostics that were drained.
pub fn report_diagnostics(
    sink: &DiagnosticSink,
    format: ReportFormat,
    global: &GlobalArgs,
) -> Result<Vec<Diagnostic>, Box<dyn std::error::Error>> {
    let diagnostics = sink.take_all();
    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color);
            for diag in &diagnostics {
                if global.quiet && !diag.severity.is_error() {
                    continue;
                }
                eprint!("{}", renderer.render(diag));
            }
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        }
    }
    Ok(diagnostics)
}

/// Prints the error and warning totals unless `--quiet` is set.
pub fn print_summary(diagnostics: &[Diagnostic], global: &GlobalArgs) {
    if global.quiet {
        return;
    }
    let errors = diagnostics.iter().filter(|d| d.severity.is_error()).count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.severity == loadout_diagnostics::Severity::Warning)
        .count();
    if errors > 0 || warnings > 0 {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config,
        }
    }

    #[test]
    fn finds_root_from_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        let nested = dir.path().join("modules/lang/rust");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        if let Some(found) = find_project_root(&nested) {
            assert!(!found.starts_with(dir.path()));
        }
    }

    #[test]
    fn config_flag_accepts_file_or_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILE);
        std::fs::write(&file, "").unwrap();

        let from_file = resolve_project_root(&global(Some(file.display().to_string()))).unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(from_file, expected);
        let from_dir =
            resolve_project_root(&global(Some(dir.path().display().to_string()))).unwrap();
        assert_eq!(from_dir, expected);
    }

    #[test]
    fn config_flag_without_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_project_root(&global(Some(dir.path().display().to_string())));
        assert!(err.is_err());
    }
}
