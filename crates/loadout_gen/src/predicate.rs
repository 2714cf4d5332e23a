//! File inclusion predicates.
//!
//! A source file may opt out of generation with a marker on one of its first
//! three lines:
//!
//! ```text
//! ;;;###if (and (module-enabled :tools lsp) (platform linux macos))
//! ```
//!
//! The expression is interpreted over a closed set of operators; nothing in
//! it is ever evaluated as code.
//!
//! | expression | true when |
//! |---|---|
//! | `t` / `nil` | always / never |
//! | `(and E...)`, `(or E...)`, `(not E)` | the usual |
//! | `(module-enabled)` | the file's own module is enabled |
//! | `(module-enabled :category name)` | that module is enabled |
//! | `(platform NAME...)` | the host OS is one of `NAME...` |
//! | `(file-exists "path")` | the path exists, relative to the file's directory |

use std::path::Path;

use loadout_reader::{Form, FormKind, ReadError, Reader};

use crate::origin::ModuleOrigin;
use crate::registry::ModuleRegistry;

/// The marker that introduces a predicate.
pub const PREDICATE_MARKER: &str = ";;;###if";

/// How many leading lines are searched for the marker.
const MARKER_LINES: usize = 3;

/// Errors from reading or interpreting a predicate.
#[derive(Debug, thiserror::Error)]
pub enum PredicateError {
    /// The expression text could not be read.
    #[error("unreadable predicate: {0}")]
    Read(#[from] ReadError),

    /// The marker had no expression after it.
    #[error("empty predicate")]
    Empty,

    /// Text followed the expression.
    #[error("unexpected text after predicate")]
    Trailing,

    /// The expression used an operator or variable outside the closed set.
    #[error("unknown predicate `{0}`")]
    Unknown(String),

    /// An operator received the wrong number or kind of arguments.
    #[error("bad arguments to `{operator}`: {reason}")]
    BadArguments {
        /// The operator.
        operator: String,
        /// What was wrong.
        reason: String,
    },
}

/// What a predicate is evaluated against.
pub struct PredicateContext<'a> {
    /// The file the predicate was found in.
    pub file: &'a Path,
    /// The module owning that file.
    pub origin: &'a ModuleOrigin,
    /// Module enablement.
    pub registry: &'a dyn ModuleRegistry,
    /// The host OS name, as in [`std::env::consts::OS`].
    pub platform: &'a str,
}

impl<'a> PredicateContext<'a> {
    /// Creates a context for `file` on the running host.
    pub fn new(file: &'a Path, origin: &'a ModuleOrigin, registry: &'a dyn ModuleRegistry) -> Self {
        Self {
            file,
            origin,
            registry,
            platform: std::env::consts::OS,
        }
    }
}

/// Returns the predicate text from the first lines of a file, if any.
pub fn find_marker(head: &str) -> Option<&str> {
    head.lines()
        .take(MARKER_LINES)
        .find_map(|line| line.strip_prefix(PREDICATE_MARKER))
        .map(str::trim)
}

/// Reads and evaluates predicate text.
pub fn evaluate_str(text: &str, ctx: &PredicateContext<'_>) -> Result<bool, PredicateError> {
    let mut reader = Reader::new(text);
    let expr = reader.read_next()?.ok_or(PredicateError::Empty)?;
    if reader.read_next()?.is_some() {
        return Err(PredicateError::Trailing);
    }
    evaluate(&expr, ctx)
}

/// Evaluates a predicate expression.
pub fn evaluate(expr: &Form, ctx: &PredicateContext<'_>) -> Result<bool, PredicateError> {
    if let Some(symbol) = expr.as_symbol() {
        return match symbol {
            "t" => Ok(true),
            "nil" => Ok(false),
            other => Err(PredicateError::Unknown(other.to_string())),
        };
    }
    let Some(items) = expr.as_list() else {
        return Err(PredicateError::Unknown(expr.to_string()));
    };
    let Some(operator) = items.first().and_then(Form::as_symbol) else {
        return Err(PredicateError::Unknown(expr.to_string()));
    };
    let args = &items[1..];
    let bad = |reason: &str| PredicateError::BadArguments {
        operator: operator.to_string(),
        reason: reason.to_string(),
    };

    match operator {
        "and" => {
            for arg in args {
                if !evaluate(arg, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "or" => {
            for arg in args {
                if evaluate(arg, ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        "not" => match args {
            [arg] => Ok(!evaluate(arg, ctx)?),
            _ => Err(bad("expected one argument")),
        },
        "module-enabled" => match args {
            [] => Ok(ctx.registry.origin_enabled(ctx.origin)),
            [category, name] => {
                let category = category
                    .as_symbol()
                    .and_then(|c| c.strip_prefix(':'))
                    .ok_or_else(|| bad("category must be a keyword"))?;
                let name = name.as_symbol().ok_or_else(|| bad("name must be a symbol"))?;
                Ok(ctx.registry.is_enabled(category, name))
            }
            _ => Err(bad("expected no arguments or `:category name`")),
        },
        "platform" => {
            if args.is_empty() {
                return Err(bad("expected at least one platform name"));
            }
            for arg in args {
                let name = match &arg.kind {
                    FormKind::Symbol(s) | FormKind::Str(s) => s.as_str(),
                    _ => return Err(bad("platform names must be symbols or strings")),
                };
                if name == ctx.platform {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        "file-exists" => match args {
            [path] => {
                let path = path.as_str().ok_or_else(|| bad("expected a string"))?;
                let base = ctx.file.parent().unwrap_or_else(|| Path::new("."));
                Ok(base.join(path).exists())
            }
            _ => Err(bad("expected one argument")),
        },
        other => Err(PredicateError::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModuleDir;

    struct Enabled(Vec<(&'static str, &'static str)>);

    impl ModuleRegistry for Enabled {
        fn is_enabled(&self, category: &str, name: &str) -> bool {
            self.0.iter().any(|(c, n)| *c == category && *n == name)
        }

        fn classify(&self, _path: &Path) -> ModuleOrigin {
            ModuleOrigin::Core
        }

        fn modules(&self) -> &[ModuleDir] {
            &[]
        }
    }

    fn eval(text: &str, origin: &ModuleOrigin) -> Result<bool, PredicateError> {
        let registry = Enabled(vec![("lang", "rust")]);
        let ctx = PredicateContext {
            file: Path::new("/p/modules/lang/rust/autoload.el"),
            origin,
            registry: &registry,
            platform: "linux",
        };
        evaluate_str(text, &ctx)
    }

    #[test]
    fn finds_marker_in_leading_lines() {
        let head = ";;; autoload.el -*- lexical-binding: t; -*-\n;;;###if (platform linux)\n";
        assert_eq!(find_marker(head), Some("(platform linux)"));
        let late = "a\nb\nc\n;;;###if nil\n";
        assert_eq!(find_marker(late), None);
    }

    #[test]
    fn constants_and_connectives() {
        let core = ModuleOrigin::Core;
        assert!(eval("t", &core).unwrap());
        assert!(!eval("nil", &core).unwrap());
        assert!(eval("(and)", &core).unwrap());
        assert!(!eval("(or)", &core).unwrap());
        assert!(eval("(or nil (not nil))", &core).unwrap());
        assert!(!eval("(and t nil)", &core).unwrap());
    }

    #[test]
    fn module_enabled() {
        let rust = ModuleOrigin::module("lang", "rust");
        let go = ModuleOrigin::module("lang", "go");
        assert!(eval("(module-enabled)", &rust).unwrap());
        assert!(!eval("(module-enabled)", &go).unwrap());
        assert!(eval("(module-enabled)", &ModuleOrigin::Private).unwrap());
        assert!(eval("(module-enabled :lang rust)", &go).unwrap());
        assert!(!eval("(module-enabled :tools magit)", &rust).unwrap());
    }

    #[test]
    fn platform() {
        let core = ModuleOrigin::Core;
        assert!(eval("(platform macos linux)", &core).unwrap());
        assert!(eval("(platform \"linux\")", &core).unwrap());
        assert!(!eval("(platform windows)", &core).unwrap());
    }

    #[test]
    fn file_exists_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("autoload.el");
        std::fs::write(dir.path().join("present.el"), "").unwrap();
        let registry = Enabled(vec![]);
        let ctx = PredicateContext::new(&file, &ModuleOrigin::Core, &registry);
        assert!(evaluate_str("(file-exists \"present.el\")", &ctx).unwrap());
        assert!(!evaluate_str("(file-exists \"absent.el\")", &ctx).unwrap());
    }

    #[test]
    fn errors() {
        let core = ModuleOrigin::Core;
        assert!(matches!(
            eval("(shell-command \"rm -rf\")", &core),
            Err(PredicateError::Unknown(_))
        ));
        assert!(matches!(eval("some-var", &core), Err(PredicateError::Unknown(_))));
        assert!(matches!(
            eval("(not t nil)", &core),
            Err(PredicateError::BadArguments { .. })
        ));
        assert!(matches!(
            eval("(module-enabled lang rust)", &core),
            Err(PredicateError::BadArguments { .. })
        ));
        assert!(matches!(eval("(and t", &core), Err(PredicateError::Read(_))));
        assert!(matches!(eval("", &core), Err(PredicateError::Empty)));
        assert!(matches!(eval("t nil", &core), Err(PredicateError::Trailing)));
    }
}
