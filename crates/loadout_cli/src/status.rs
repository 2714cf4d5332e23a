//! The `loadout status` command.

use loadout_diagnostics::DiagnosticSink;
use loadout_gen::{ArtifactStatus, Generator, Target};

use crate::pipeline::{print_summary, report_diagnostics, resolve_project_root};
use crate::{GlobalArgs, ReportFormat, StatusArgs};

/// Prints whether each selected artifact is stale.
///
/// Returns exit code 1 if any artifact would be rebuilt, 0 if all are up to date.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let target: Target = args.target.parse()?;
    let root = resolve_project_root(global)?;

    let sink = DiagnosticSink::new();
    let generator = Generator::open(&root, &sink)?;
    let statuses = generator.status(target)?;

    for status in &statuses {
        println!("{}", describe(status));
    }

    let diagnostics = report_diagnostics(&sink, ReportFormat::Text, global)?;
    print_summary(&diagnostics, global);

    Ok(if statuses.iter().any(|s| s.reason.is_some()) {
        1
    } else {
        0
    })
}

fn describe(status: &ArtifactStatus) -> String {
    match &status.reason {
        Some(reason) => format!("{}: stale ({reason})", status.kind),
        None => format!("{}: up to date", status.kind),
    }
}
