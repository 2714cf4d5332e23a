//! Loading generated artifacts.
//!
//! Loading interprets an artifact's top-level statements into an
//! [`ArtifactImage`]: a table of callable thunks keyed by symbol, symbol
//! properties, restored variables, and whatever else is left for the host to
//! evaluate. A statement with a malformed shape fails the load, which is how
//! residual top-level errors in a freshly compiled artifact surface.

use std::collections::HashMap;
use std::path::Path;

use loadout_cache::{read_compiled, CacheError, Loader};
use loadout_reader::{line_of, read_all, Form};

use crate::declaration::{DeclKind, ParamList};
use crate::snapshot::EnvironmentSnapshot;

/// What calling a symbol does.
#[derive(Debug, Clone, PartialEq)]
pub enum Thunk {
    /// Loads a file that defines the symbol, then calls it.
    Deferred {
        /// The file to load.
        file: String,
        /// Whether the symbol is an interactive command.
        interactive: bool,
        /// Whether the symbol is a macro.
        is_macro: bool,
    },
    /// Checks the argument count, ignores the arguments and returns nothing.
    Inert(ParamList),
    /// A real definition, left to the host.
    Host(Form),
}

/// The result of calling a thunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing happened.
    Unit,
    /// The host must load this file.
    Load(String),
    /// The host must evaluate this definition.
    Evaluate(Form),
}

/// A call that could not be made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// No thunk for the symbol.
    #[error("`{0}` is not defined")]
    Undefined(String),
    /// The arguments do not fit the parameter list.
    #[error("wrong number of arguments to `{symbol}`: {count}")]
    Arity {
        /// The called symbol.
        symbol: String,
        /// How many arguments were passed.
        count: usize,
    },
}

/// A loaded artifact.
#[derive(Debug, Default, Clone)]
pub struct ArtifactImage {
    thunks: HashMap<String, Thunk>,
    properties: HashMap<(String, String), Form>,
    variables: HashMap<String, Form>,
    host_forms: Vec<Form>,
}

impl ArtifactImage {
    /// Interprets top-level statements.
    pub fn from_forms(forms: &[Form]) -> Result<Self, String> {
        let mut image = ArtifactImage::default();
        for form in forms {
            image.interpret(form)?;
        }
        Ok(image)
    }

    fn interpret(&mut self, form: &Form) -> Result<(), String> {
        let Some(head) = form.head() else {
            self.host_forms.push(form.clone());
            return Ok(());
        };
        let items = form.as_list().unwrap_or_default();
        let malformed = || format!("malformed `{head}`: {form}");

        match head {
            "autoload" => {
                if !(3..=6).contains(&items.len()) {
                    return Err(malformed());
                }
                let symbol = quoted_symbol(&items[1]).ok_or_else(malformed)?;
                let file = items[2].as_str().ok_or_else(malformed)?;
                let interactive = items.get(4).is_some_and(|f| !f.is_nil());
                let is_macro = items
                    .get(5)
                    .is_some_and(|f| f.unquoted().as_symbol() == Some("macro"));
                self.thunks.insert(
                    symbol.to_string(),
                    Thunk::Deferred {
                        file: file.to_string(),
                        interactive,
                        is_macro,
                    },
                );
            }
            "defalias" => {
                if !(3..=4).contains(&items.len()) {
                    return Err(malformed());
                }
                let symbol = quoted_symbol(&items[1]).ok_or_else(malformed)?;
                let thunk = if items[2].unquoted().as_symbol() == Some("ignore") {
                    Thunk::Inert(ParamList::variadic())
                } else {
                    Thunk::Host(form.clone())
                };
                self.thunks.insert(symbol.to_string(), thunk);
            }
            "put" => {
                if items.len() != 4 {
                    return Err(malformed());
                }
                let symbol = quoted_symbol(&items[1]).ok_or_else(malformed)?;
                let property = quoted_symbol(&items[2]).ok_or_else(malformed)?;
                self.properties
                    .insert((symbol.to_string(), property.to_string()), items[3].clone());
            }
            "setq" => {
                if items.len() % 2 == 0 {
                    return Err(malformed());
                }
                for pair in items[1..].chunks(2) {
                    let var = pair[0].as_symbol().ok_or_else(malformed)?;
                    self.variables.insert(var.to_string(), pair[1].clone());
                }
            }
            _ if DeclKind::from_head(head) != DeclKind::Other => {
                let symbol = items.get(1).and_then(Form::as_symbol).ok_or_else(malformed)?;
                let params = items
                    .get(2)
                    .ok_or_else(malformed)
                    .and_then(|p| ParamList::parse(p).map_err(|e| e.to_string()))?;
                let thunk = if is_inert_body(&items[3..]) {
                    Thunk::Inert(params)
                } else {
                    Thunk::Host(form.clone())
                };
                self.thunks.insert(symbol.to_string(), thunk);
            }
            _ => self.host_forms.push(form.clone()),
        }
        Ok(())
    }

    /// The thunk for `symbol`.
    pub fn thunk(&self, symbol: &str) -> Option<&Thunk> {
        self.thunks.get(symbol)
    }

    /// Every symbol with a thunk, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<_> = self.thunks.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    /// Returns `true` if `symbol` is a placeholder.
    pub fn is_inert(&self, symbol: &str) -> bool {
        matches!(self.thunks.get(symbol), Some(Thunk::Inert(_)))
    }

    /// Calls `symbol` with `args`.
    pub fn call(&self, symbol: &str, args: &[Form]) -> Result<Outcome, CallError> {
        match self.thunks.get(symbol) {
            None => Err(CallError::Undefined(symbol.to_string())),
            Some(Thunk::Inert(params)) if !params.accepts(args.len()) => Err(CallError::Arity {
                symbol: symbol.to_string(),
                count: args.len(),
            }),
            Some(Thunk::Inert(_)) => Ok(Outcome::Unit),
            Some(Thunk::Deferred { file, .. }) => Ok(Outcome::Load(file.clone())),
            Some(Thunk::Host(form)) => Ok(Outcome::Evaluate(form.clone())),
        }
    }

    /// A symbol property set with `put`.
    pub fn property(&self, symbol: &str, property: &str) -> Option<&Form> {
        self.properties.get(&(symbol.to_string(), property.to_string()))
    }

    /// A variable set with `setq`.
    pub fn variable(&self, name: &str) -> Option<&Form> {
        self.variables.get(name)
    }

    /// Statements left to the host, in artifact order.
    pub fn host_forms(&self) -> &[Form] {
        &self.host_forms
    }

    /// The environment restored by a package bundle, if this image has one.
    pub fn snapshot(&self) -> Option<EnvironmentSnapshot> {
        EnvironmentSnapshot::from_bindings(&self.variables)
    }
}

fn quoted_symbol(form: &Form) -> Option<&str> {
    if form.is_quoted() {
        form.unquoted().as_symbol()
    } else {
        None
    }
}

/// A body that does nothing: empty, `nil`, or calls to `ignore`, after an
/// optional documentation string.
fn is_inert_body(body: &[Form]) -> bool {
    let body: &[Form] = match body {
        [doc, rest @ ..] if doc.as_str().is_some() && !rest.is_empty() => rest,
        [doc] if doc.as_str().is_some() => &[],
        _ => body,
    };
    body.iter().all(|f| f.is_nil() || f.head() == Some("ignore"))
}

/// Loads artifacts into [`ArtifactImage`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArtifactLoader;

impl Loader for ArtifactLoader {
    type Image = ArtifactImage;

    fn load_compiled(&self, compiled: &Path) -> Result<ArtifactImage, CacheError> {
        let forms = read_compiled(compiled)?;
        ArtifactImage::from_forms(&forms).map_err(|reason| CacheError::LoadFailure {
            path: compiled.to_path_buf(),
            reason,
        })
    }

    fn load_source(&self, source: &Path) -> Result<ArtifactImage, CacheError> {
        let text = std::fs::read_to_string(source).map_err(|e| CacheError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let forms = read_all(&text).map_err(|e| CacheError::Read {
            path: source.to_path_buf(),
            line: line_of(&text, e.offset),
            message: e.message.clone(),
        })?;
        ArtifactImage::from_forms(&forms).map_err(|reason| CacheError::LoadFailure {
            path: source.to_path_buf(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadout_cache::write_compiled;

    fn image(text: &str) -> Result<ArtifactImage, String> {
        ArtifactImage::from_forms(&read_all(text).unwrap())
    }

    fn args(n: usize) -> Vec<Form> {
        (0..n).map(|i| Form::symbol(format!("a{i}"))).collect()
    }

    #[test]
    fn deferred_and_inert_thunks() {
        let img = image(
            "(autoload 'rust-run \"/p/rust\" \"Run.\" t nil)\n\
             (autoload 'with-cargo \"/p/rust\" nil nil 'macro)\n\
             (put 'go-run 'loadout-file \"/p/go.el\")\n\
             (defmacro go-run (cmd &optional args) \"THIS DOES NOTHING\" (ignore cmd args))\n\
             (defmacro go-mode nil \"THIS DOES NOTHING\" nil)\n\
             (defalias 'go-fmt #'ignore \"THIS DOES NOTHING\")\n\
             (add-hook 'x-hook #'y)\n",
        )
        .unwrap();

        assert_eq!(img.symbols(), ["go-fmt", "go-mode", "go-run", "rust-run", "with-cargo"]);
        assert_eq!(
            img.thunk("with-cargo"),
            Some(&Thunk::Deferred {
                file: "/p/rust".to_string(),
                interactive: false,
                is_macro: true,
            })
        );
        assert_eq!(img.call("rust-run", &[]), Ok(Outcome::Load("/p/rust".to_string())));
        assert!(img.is_inert("go-run"));
        assert_eq!(img.call("go-run", &args(1)), Ok(Outcome::Unit));
        assert_eq!(img.call("go-run", &args(2)), Ok(Outcome::Unit));
        assert!(matches!(img.call("go-run", &args(0)), Err(CallError::Arity { count: 0, .. })));
        assert!(matches!(img.call("go-run", &args(3)), Err(CallError::Arity { .. })));
        assert_eq!(img.call("go-mode", &[]), Ok(Outcome::Unit));
        assert_eq!(img.call("go-fmt", &args(5)), Ok(Outcome::Unit));
        assert_eq!(img.call("nope", &[]), Err(CallError::Undefined("nope".to_string())));
        assert_eq!(
            img.property("go-run", "loadout-file"),
            Some(&Form::string("/p/go.el"))
        );
        assert_eq!(img.host_forms().len(), 1);
    }

    #[test]
    fn real_definitions_go_to_the_host() {
        let img = image("(defun f (x) (* x 2))\n(defalias 'g #'f)\n").unwrap();
        assert!(matches!(img.call("f", &args(1)), Ok(Outcome::Evaluate(_))));
        assert!(matches!(img.thunk("g"), Some(Thunk::Host(_))));
    }

    #[test]
    fn malformed_statements_fail() {
        for text in [
            "(autoload rust-run \"/p\")",
            "(autoload 'rust-run)",
            "(put 'x 'y)",
            "(setq a)",
            "(defalias x y)",
            "(defmacro m \"bad\" nil)",
            "(defun)",
        ] {
            assert!(image(text).is_err(), "{text} should fail");
        }
    }

    #[test]
    fn inert_bodies() {
        let forms = read_all("\"doc\" (ignore a)").unwrap();
        assert!(is_inert_body(&forms));
        assert!(is_inert_body(&read_all("\"doc\"").unwrap()));
        assert!(is_inert_body(&[]));
        assert!(!is_inert_body(&read_all("\"doc\" (message \"hi\")").unwrap()));
    }

    #[test]
    fn restores_snapshot_variables() {
        let img = image(
            "(setq load-path '(\"/p\")\n      auto-mode-alist 'nil\n      Info-directory-list 'nil\n      \
             loadout-disabled-packages '(evil)\n      package-activated-list '(magit))",
        )
        .unwrap();
        let snapshot = img.snapshot().unwrap();
        assert_eq!(snapshot.search_paths, [std::path::PathBuf::from("/p")]);
        assert_eq!(snapshot.disabled_packages, ["evil"]);
        assert_eq!(snapshot.activated_packages, ["magit"]);
        assert!(image("(setq x 1)").unwrap().snapshot().is_none());
    }

    #[test]
    fn loader_reads_both_forms() {
        let dir = tempfile::tempdir().unwrap();
        let text_path = dir.path().join("a.el");
        let compiled_path = dir.path().join("a.elc");
        let text = "(autoload 'x \"/p/x\" nil nil nil)\n";
        std::fs::write(&text_path, text).unwrap();
        write_compiled(&compiled_path, &read_all(text).unwrap()).unwrap();

        let loader = ArtifactLoader;
        assert_eq!(loader.load_source(&text_path).unwrap().symbols(), ["x"]);
        assert_eq!(loader.load_compiled(&compiled_path).unwrap().symbols(), ["x"]);

        std::fs::write(&text_path, "(put 'x)\n").unwrap();
        assert!(matches!(
            loader.load_source(&text_path),
            Err(CacheError::LoadFailure { .. })
        ));
    }
}
