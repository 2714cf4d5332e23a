//! The `loadout generate` command.

use loadout_diagnostics::DiagnosticSink;
use loadout_gen::{ArtifactOutcome, ArtifactReport, GenerateOptions, Generator, Target};

use crate::pipeline::{print_summary, report_diagnostics, resolve_project_root};
use crate::{GenerateArgs, GlobalArgs};

/// Regenerates stale artifacts of the selected target and loads them.
///
/// Returns exit code 1 if any artifact failed or an error diagnostic was
/// emitted, 0 otherwise.
pub fn run(args: &GenerateArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let target: Target = args.target.parse()?;
    let root = resolve_project_root(global)?;
    tracing::debug!(root = %root.display(), ?target, "generating");

    let sink = DiagnosticSink::new();
    let generator = Generator::open(&root, &sink)?;
    let options = GenerateOptions {
        target,
        force: args.force,
        debug: args.debug,
    };
    let reports = generator.run(&options);

    if !global.quiet {
        for report in &reports {
            eprintln!("{}", describe(report));
        }
    }

    let diagnostics = report_diagnostics(&sink, args.format, global)?;
    print_summary(&diagnostics, global);

    let failed = reports.iter().any(|r| r.result.is_err())
        || diagnostics.iter().any(|d| d.severity.is_error());
    Ok(if failed { 1 } else { 0 })
}

/// One status line per artifact.
fn describe(report: &ArtifactReport) -> String {
    let path = report.path.display();
    match &report.result {
        Ok(ArtifactOutcome::Regenerated { reason, items, image }) => format!(
            "  Regenerated {} ({reason}): {items} item(s), {} symbol(s) -> {path}",
            report.kind,
            image.symbols().len()
        ),
        Ok(ArtifactOutcome::Activated { image, fallback }) => {
            let mut line = format!(
                "  Up to date {}: {} symbol(s) loaded from {path}",
                report.kind,
                image.symbols().len()
            );
            if fallback.is_some() {
                line.push_str(" (text fallback)");
            }
            line
        }
        Err(e) => format!("  Failed {}: {e}", report.kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReportFormat;

    fn quiet() -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: None,
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("loadout.toml"), "[project]\nname = \"demo\"\nversion = \"0.1.0\"\n").unwrap();
        let core = dir.path().join("core/autoload");
        std::fs::create_dir_all(&core).unwrap();
        std::fs::write(
            core.join("ui.el"),
            ";;;###autoload\n(defun demo-hello (name) \"Greet NAME.\" (message name))\n",
        )
        .unwrap();
        dir
    }

    fn args(target: &str) -> GenerateArgs {
        GenerateArgs {
            target: target.to_string(),
            force: false,
            debug: false,
            format: ReportFormat::Text,
        }
    }

    #[test]
    fn generates_autoloads() {
        let dir = project();
        let global = GlobalArgs {
            config: Some(dir.path().display().to_string()),
            ..quiet()
        };
        let code = run(&args("autoloads"), &global).unwrap();
        assert_eq!(code, 0);
        assert!(dir.path().join(".local/cache/autoloads.el").is_file());
    }

    #[test]
    fn invalid_target_is_an_error() {
        let dir = project();
        let global = GlobalArgs {
            config: Some(dir.path().display().to_string()),
            ..quiet()
        };
        assert!(run(&args("everything"), &global).is_err());
    }
}
