//! Diagnostic creation, severity management, and terminal rendering.
//!
//! Generation never aborts a batch for a per-item problem (one declaration,
//! one package, one excluded file). Those problems are recorded as structured
//! [`Diagnostic`]s in a [`DiagnosticSink`] and rendered by the CLI with a
//! [`TerminalRenderer`] once an artifact has been processed.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::{Diagnostic, Location};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
