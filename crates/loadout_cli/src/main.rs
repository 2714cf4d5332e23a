//! Loadout CLI, the command-line interface of the loadout generator.
//!
//! Provides `loadout generate` to regenerate (or activate) the declaration
//! and package artifacts, and `loadout status` to report whether they are
//! stale without writing anything.

#![warn(missing_docs)]

mod generate;
mod pipeline;
mod status;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Loadout, an incremental generator of consolidated declaration files.
#[derive(Parser, Debug)]
#[command(name = "loadout", version, about = "Loadout declaration generator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `loadout.toml` file or the directory holding it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Regenerate stale artifacts and load them.
    Generate(GenerateArgs),
    /// Report whether artifacts are stale.
    Status(StatusArgs),
}

/// Arguments for the `loadout generate` subcommand.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Which artifacts to generate: `autoloads`, `packages` or `all`.
    #[arg(short, long, default_value = "all")]
    pub target: String,

    /// Regenerate even if the artifacts are up to date.
    #[arg(short, long)]
    pub force: bool,

    /// Load artifact text instead of the compiled form.
    #[arg(long)]
    pub debug: bool,

    /// Output format for diagnostics.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `loadout status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Which artifacts to check: `autoloads`, `packages` or `all`.
    #[arg(short, long, default_value = "all")]
    pub target: String,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to the config file or its directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var("TERM").is_ok_and(|t| t != "dumb"),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Generate(ref args) => generate::run(args, &global),
        Command::Status(ref args) => status::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
