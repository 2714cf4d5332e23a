//! Extraction of exported declarations.
//!
//! A declaration is exported by an export tag on the line before it:
//!
//! ```text
//! ;;;###autoload
//! (defun rust-run (&optional args) ...)
//!
//! ;;;###autoload (defalias 'rust-fmt #'ignore)
//! (defalias 'rust-fmt #'rustic-format-buffer)
//! ```
//!
//! Text after the tag is an alternative form used verbatim when the module is
//! disabled. What each declaration turns into:
//!
//! | module | override | function/macro | alias | other |
//! |---|---|---|---|---|
//! | enabled | ignored | resolved autoload | verbatim | verbatim |
//! | disabled | present | override | override | override |
//! | disabled | absent | stub | stub | dropped |

use std::collections::HashMap;
use std::path::Path;

use loadout_diagnostics::{code, Diagnostic, DiagnosticSink, Location};
use loadout_reader::{line_of, quote_string, read_all, Form, Reader};

use crate::declaration::{DeclKind, Declaration};
use crate::entry::Entry;
use crate::error::GenError;
use crate::resolver::PathResolver;
use crate::scanner::ScannedFile;
use crate::stub::synthesize;

/// The comment that marks the next top-level form as exported.
pub const EXPORT_TAG: &str = ";;;###autoload";

/// An export tag found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExportTag<'a> {
    /// Byte offset just past the tag line.
    form_start: usize,
    /// 1-indexed line of the tag.
    line: u32,
    /// Text after the tag on the same line.
    override_text: Option<&'a str>,
}

fn find_tags(text: &str) -> Vec<ExportTag<'_>> {
    let mut tags = Vec::new();
    let mut offset = 0;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        if let Some(rest) = line.strip_prefix(EXPORT_TAG) {
            let rest = rest.trim();
            tags.push(ExportTag {
                form_start: offset + line.len(),
                line: index as u32 + 1,
                override_text: (!rest.is_empty()).then_some(rest),
            });
        }
        offset += line.len();
    }
    tags
}

/// Reads the exported declarations of one file.
///
/// Unreadable forms are reported as errors and shapes that cannot be taken
/// apart as warnings; either way the rest of the file is still processed.
pub fn extract(
    file: &ScannedFile,
    text: &str,
    enabled: bool,
    sink: &DiagnosticSink,
) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    let mut consumed = 0;
    for tag in find_tags(text) {
        if tag.form_start < consumed {
            continue;
        }
        let mut reader = Reader::at(text, tag.form_start);
        let form = match reader.read_next() {
            Ok(Some(form)) => form,
            Ok(None) => {
                sink.emit(
                    Diagnostic::warning(code::MALFORMED_DECLARATION, "export tag with no form after it")
                        .at(Location::line(&file.path, tag.line)),
                );
                continue;
            }
            Err(e) => {
                sink.emit(
                    Diagnostic::error(code::READ_ERROR, e.message.clone())
                        .at(Location::line(&file.path, line_of(text, e.offset))),
                );
                continue;
            }
        };
        consumed = reader.position();

        let line = line_of(text, form.span.start as usize);
        match parse_declaration(form, text) {
            Ok(parts) => declarations.push(Declaration {
                symbol: parts.symbol,
                kind: parts.kind,
                head: parts.head,
                arglist: parts.arglist,
                doc: parts.doc,
                interactive: parts.interactive,
                origin: file.origin.clone(),
                enabled,
                file: file.path.clone(),
                line,
                form: parts.form,
                text: parts.text,
                override_text: tag.override_text.map(str::to_string),
            }),
            Err(reason) => sink.emit(
                Diagnostic::warning(code::MALFORMED_DECLARATION, reason)
                    .at(Location::line(&file.path, line)),
            ),
        }
    }
    tracing::debug!(
        file = %file.path.display(),
        declarations = declarations.len(),
        enabled,
        "extracted declarations"
    );
    declarations
}

struct Parts {
    symbol: String,
    kind: DeclKind,
    head: String,
    arglist: Option<Form>,
    doc: Option<String>,
    interactive: bool,
    form: Form,
    text: String,
}

fn parse_declaration(form: Form, text: &str) -> Result<Parts, String> {
    let source = form.span.slice(text).unwrap_or_default().to_string();
    let head = form.head().unwrap_or_default().to_string();
    let kind = DeclKind::from_head(&head);
    let items = form.as_list().unwrap_or_default();

    let (symbol, arglist, doc, interactive) = match kind {
        DeclKind::Function | DeclKind::Macro => {
            let symbol = items
                .get(1)
                .and_then(Form::as_symbol)
                .ok_or_else(|| format!("`{head}` without a name"))?;
            let arglist = items
                .get(2)
                .ok_or_else(|| format!("`{head} {symbol}` without a parameter list"))?;
            let has_doc = items.len() > 4 && items[3].as_str().is_some();
            let doc = has_doc.then(|| items[3].as_str().unwrap_or_default().to_string());
            let body = &items[if has_doc { 4 } else { 3 }..];
            let interactive = body
                .iter()
                .find(|f| f.head() != Some("declare"))
                .is_some_and(|f| f.head() == Some("interactive"));
            (symbol.to_string(), Some(arglist.clone()), doc, interactive)
        }
        DeclKind::Alias => {
            let name = items.get(1).filter(|f| f.is_quoted());
            let symbol = name
                .and_then(|f| f.unquoted().as_symbol())
                .ok_or_else(|| "`defalias` without a quoted name".to_string())?;
            if items.len() < 3 {
                return Err(format!("`defalias '{symbol}` without a definition"));
            }
            let doc = items.get(3).and_then(Form::as_str).map(str::to_string);
            (symbol.to_string(), None, doc, false)
        }
        DeclKind::Other => {
            let symbol = items
                .get(1)
                .map(Form::unquoted)
                .and_then(Form::as_symbol)
                .unwrap_or(head.as_str())
                .to_string();
            (symbol, None, None, false)
        }
    };

    Ok(Parts {
        symbol,
        kind,
        head,
        arglist,
        doc,
        interactive,
        form,
        text: source,
    })
}

/// The project-relative reference of a file: its path relative to `root`,
/// without extension, with `/` separators.
pub fn file_reference(file: &Path, root: &Path) -> String {
    let stripped = file.with_extension("");
    match stripped.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => stripped.to_string_lossy().into_owned(),
    }
}

/// Which declaration currently owns a symbol.
#[derive(Debug, Clone, Copy)]
struct Claim {
    enabled: bool,
    group: usize,
}

/// Turns declarations into artifact entries, one file at a time.
///
/// Each symbol is defined once. The first declaration of a symbol wins,
/// except that a declaration from an enabled module always replaces a stub or
/// override from a disabled one, wherever the two appear in scan order.
pub struct DeclarationExtractor<'a> {
    root: &'a Path,
    resolver: PathResolver,
    groups: Vec<Vec<Entry>>,
    claims: HashMap<String, Claim>,
}

impl<'a> DeclarationExtractor<'a> {
    /// Creates an extractor for a project rooted at `root`.
    pub fn new(root: &'a Path, resolver: PathResolver) -> Self {
        Self {
            root,
            resolver,
            groups: Vec::new(),
            claims: HashMap::new(),
        }
    }

    /// Extracts and lowers the declarations of one file.
    pub fn process(&mut self, file: &ScannedFile, text: &str, enabled: bool, sink: &DiagnosticSink) {
        for decl in extract(file, text, enabled, sink) {
            let location = Location::line(&decl.file, decl.line);
            let claim = if decl.kind.is_definition() {
                self.claims.get(&decl.symbol).copied()
            } else {
                None
            };
            let superseded = match claim {
                None => None,
                Some(claim) if decl.enabled && !claim.enabled => Some(claim.group),
                Some(claim) if claim.enabled && !decl.enabled => {
                    tracing::debug!(symbol = %decl.symbol, "disabled declaration shadowed by an enabled one");
                    continue;
                }
                Some(_) => {
                    sink.emit(
                        Diagnostic::warning(
                            code::DUPLICATE_SYMBOL,
                            format!("`{}` is already declared", decl.symbol),
                        )
                        .at(location)
                        .for_symbol(&decl.symbol)
                        .with_note("the first declaration wins"),
                    );
                    continue;
                }
            };
            match self.lower(&decl) {
                Ok(lowered) => {
                    if let Some(group) = superseded {
                        tracing::debug!(symbol = %decl.symbol, "enabled declaration replaces a stub");
                        self.groups[group].clear();
                    }
                    if decl.kind.is_definition() {
                        let claim = Claim {
                            enabled: decl.enabled,
                            group: self.groups.len(),
                        };
                        self.claims.insert(decl.symbol.clone(), claim);
                    }
                    self.groups.push(lowered);
                }
                Err(e) => sink.emit(
                    Diagnostic::warning(code::STUB_SYNTHESIS, e.to_string())
                        .at(location)
                        .for_symbol(&decl.symbol)
                        .with_note("the declaration was skipped"),
                ),
            }
        }
    }

    /// The entries of every processed file, in extraction order.
    pub fn into_entries(self) -> Vec<Entry> {
        self.groups.into_iter().flatten().collect()
    }

    /// Lowers one declaration into entries.
    pub fn lower(&mut self, decl: &Declaration) -> Result<Vec<Entry>, GenError> {
        if decl.enabled {
            return Ok(vec![self.promote(decl)]);
        }
        if let Some(text) = &decl.override_text {
            return match read_all(text) {
                Ok(forms) if !forms.is_empty() => Ok(vec![Entry::Verbatim(text.clone())]),
                Ok(_) => Err(GenError::stub(&decl.symbol, "empty override")),
                Err(e) => Err(GenError::stub(&decl.symbol, format!("unreadable override: {e}"))),
            };
        }
        match decl.kind {
            DeclKind::Other => Ok(Vec::new()),
            _ => synthesize(decl),
        }
    }

    fn promote(&mut self, decl: &Declaration) -> Entry {
        match decl.kind {
            DeclKind::Function | DeclKind::Macro => Entry::Autoload {
                symbol: decl.symbol.clone(),
                file: self.resolver.resolve(&file_reference(&decl.file, self.root)),
                doc: decl.doc.clone(),
                interactive: decl.interactive,
                is_macro: decl.kind == DeclKind::Macro,
            },
            DeclKind::Alias => Entry::Verbatim(decl.text.clone()),
            DeclKind::Other => Entry::Verbatim(self.resolve_autoload_form(decl)),
        }
    }

    /// Rewrites the file argument of a verbatim `(autoload 'x "ref" ...)`.
    fn resolve_autoload_form(&mut self, decl: &Declaration) -> String {
        if decl.head != "autoload" {
            return decl.text.clone();
        }
        let Some(reference) = decl.form.as_list().and_then(|items| items.get(2)) else {
            return decl.text.clone();
        };
        let Some(value) = reference.as_str() else {
            return decl.text.clone();
        };
        let start = (reference.span.start - decl.form.span.start) as usize;
        let end = (reference.span.end - decl.form.span.start) as usize;
        let resolved = self.resolver.resolve(value);
        match (decl.text.get(..start), decl.text.get(end..)) {
            (Some(before), Some(after)) => format!("{before}{}{after}", quote_string(&resolved)),
            _ => decl.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::ModuleOrigin;
    use std::path::PathBuf;

    fn file(origin: ModuleOrigin) -> ScannedFile {
        ScannedFile {
            path: PathBuf::from("/p/modules/lang/rust/autoload.el"),
            modified: None,
            origin,
            predicate: None,
        }
    }

    fn rust() -> ScannedFile {
        file(ModuleOrigin::module("lang", "rust"))
    }

    const SOURCE: &str = r#";;; autoload.el -*- lexical-binding: t; -*-

;;;###autoload
(defun rust-run (&optional args)
  "Run the project with ARGS."
  (interactive)
  (compile args))

;;;###autoload (defalias 'rust-fmt #'ignore)
(defalias 'rust-fmt #'rustic-format-buffer "Format.")

;;;###autoload
(defmacro with-cargo (dir &rest body)
  (declare (indent 1))
  `(let ((default-directory ,dir)) ,@body))

(defun not-exported ())

;;;###autoload
(add-hook 'rust-mode-hook #'rust-setup)
"#;

    #[test]
    fn finds_tags_and_overrides() {
        let tags = find_tags(SOURCE);
        assert_eq!(tags.len(), 4);
        assert_eq!(tags[0].line, 3);
        assert_eq!(tags[0].override_text, None);
        assert_eq!(tags[1].override_text, Some("(defalias 'rust-fmt #'ignore)"));
    }

    #[test]
    fn extracts_declarations() {
        let sink = DiagnosticSink::new();
        let decls = extract(&rust(), SOURCE, true, &sink);
        let summary: Vec<_> = decls.iter().map(|d| (d.symbol.as_str(), d.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("rust-run", DeclKind::Function),
                ("rust-fmt", DeclKind::Alias),
                ("with-cargo", DeclKind::Macro),
                ("rust-mode-hook", DeclKind::Other),
            ]
        );
        assert_eq!(decls[0].doc.as_deref(), Some("Run the project with ARGS."));
        assert!(decls[0].interactive);
        assert_eq!(decls[0].line, 4);
        assert_eq!(decls[1].doc.as_deref(), Some("Format."));
        assert!(decls[1].override_text.is_some());
        assert!(!decls[2].interactive);
        assert_eq!(decls[3].text, "(add-hook 'rust-mode-hook #'rust-setup)");
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn lone_string_body_is_not_doc() {
        let sink = DiagnosticSink::new();
        let decls = extract(&rust(), ";;;###autoload\n(defun v () \"1.0\")\n", true, &sink);
        assert_eq!(decls[0].doc, None);
    }

    #[test]
    fn malformed_and_unreadable_forms_are_reported() {
        let text = ";;;###autoload\n(defun)\n;;;###autoload\n(defalias x y)\n;;;###autoload\n";
        let sink = DiagnosticSink::new();
        assert!(extract(&rust(), text, true, &sink).is_empty());
        assert_eq!(sink.warning_count(), 3);

        let sink = DiagnosticSink::new();
        let decls = extract(&rust(), ";;;###autoload\n(defun broken (x)\n", true, &sink);
        assert!(decls.is_empty());
        assert!(sink.has_errors());
    }

    #[test]
    fn file_references() {
        assert_eq!(
            file_reference(Path::new("/p/modules/lang/rust/autoload.el"), Path::new("/p")),
            "modules/lang/rust/autoload"
        );
        assert_eq!(
            file_reference(Path::new("/elsewhere/x.el"), Path::new("/p")),
            "/elsewhere/x"
        );
    }

    fn process(origin: ModuleOrigin, enabled: bool, text: &str) -> (Vec<String>, DiagnosticSink) {
        let sink = DiagnosticSink::new();
        let mut extractor =
            DeclarationExtractor::new(Path::new("/p"), PathResolver::new(vec![], "el"));
        extractor.process(&file(origin), text, enabled, &sink);
        let entries = extractor.into_entries().iter().map(|e| e.to_string()).collect();
        (entries, sink)
    }

    #[test]
    fn enabled_module_promotes_declarations() {
        let (entries, _) = process(ModuleOrigin::module("lang", "rust"), true, SOURCE);
        assert_eq!(
            entries,
            vec![
                "(autoload 'rust-run \"modules/lang/rust/autoload\" \"Run the project with ARGS.\" t nil)",
                "(defalias 'rust-fmt #'rustic-format-buffer \"Format.\")",
                "(autoload 'with-cargo \"modules/lang/rust/autoload\" nil nil 'macro)",
                "(add-hook 'rust-mode-hook #'rust-setup)",
            ]
        );
    }

    #[test]
    fn disabled_module_stubs_and_overrides() {
        let (entries, sink) = process(ModuleOrigin::module("lang", "rust"), false, SOURCE);
        assert_eq!(entries.len(), 7);
        assert_eq!(entries[0], "(put 'rust-run 'loadout-file \"/p/modules/lang/rust/autoload.el\")");
        assert!(entries[2].starts_with("(defmacro rust-run (&optional args) \"THIS DOES NOTHING BECAUSE :lang rust IS DISABLED"));
        assert_eq!(entries[3], "(defalias 'rust-fmt #'ignore)");
        assert!(entries[6].starts_with("(defmacro with-cargo (dir &rest body)"));
        assert!(entries.iter().all(|e| !e.contains("add-hook")));
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn duplicates_keep_the_first() {
        let text = ";;;###autoload\n(defun dup (a))\n;;;###autoload\n(defun dup (a b))\n";
        let (entries, sink) = process(ModuleOrigin::Core, true, text);
        assert_eq!(entries.len(), 1);
        let diags = sink.diagnostics();
        assert_eq!(diags[0].code, code::DUPLICATE_SYMBOL);
        assert_eq!(diags[0].symbol.as_deref(), Some("dup"));
    }

    fn module_file(name: &str) -> ScannedFile {
        ScannedFile {
            path: PathBuf::from(format!("/p/modules/lang/{name}/autoload.el")),
            modified: None,
            origin: ModuleOrigin::module("lang", name),
            predicate: None,
        }
    }

    #[test]
    fn enabled_declaration_replaces_earlier_stub() {
        let text = ";;;###autoload\n(defun shared-run (x) (ignore x))\n";
        let sink = DiagnosticSink::new();
        let mut extractor =
            DeclarationExtractor::new(Path::new("/p"), PathResolver::new(vec![], "el"));
        extractor.process(&module_file("go"), text, false, &sink);
        extractor.process(&module_file("rust"), text, true, &sink);
        extractor.process(&module_file("zig"), text, false, &sink);

        let entries: Vec<String> = extractor.into_entries().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            entries,
            vec!["(autoload 'shared-run \"modules/lang/rust/autoload\" nil nil nil)"]
        );
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn duplicates_between_disabled_modules_keep_the_first() {
        let text = ";;;###autoload\n(defun shared-run (x) (ignore x))\n";
        let sink = DiagnosticSink::new();
        let mut extractor =
            DeclarationExtractor::new(Path::new("/p"), PathResolver::new(vec![], "el"));
        extractor.process(&module_file("go"), text, false, &sink);
        extractor.process(&module_file("zig"), text, false, &sink);

        let entries = extractor.into_entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].to_string().contains("modules/lang/go/autoload.el"));
        assert_eq!(sink.diagnostics()[0].code, code::DUPLICATE_SYMBOL);
    }

    #[test]
    fn stub_failure_skips_only_that_declaration() {
        let text = ";;;###autoload\n(defun bad 7)\n;;;###autoload\n(defun good (x))\n";
        let (entries, sink) = process(ModuleOrigin::module("lang", "rust"), false, text);
        assert_eq!(entries.len(), 3);
        assert!(entries[2].contains("good"));
        let diags = sink.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, code::STUB_SYNTHESIS);
        assert_eq!(diags[0].symbol.as_deref(), Some("bad"));
    }

    #[test]
    fn unreadable_override_is_a_stub_failure() {
        let text = ";;;###autoload (defalias 'x\n(defun x ())\n";
        let (entries, sink) = process(ModuleOrigin::module("lang", "rust"), false, text);
        assert!(entries.is_empty());
        assert_eq!(sink.diagnostics()[0].code, code::STUB_SYNTHESIS);
    }

    #[test]
    fn verbatim_autoload_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("core")).unwrap();
        std::fs::write(root.join("core/lib.el"), "").unwrap();

        let sink = DiagnosticSink::new();
        let mut extractor = DeclarationExtractor::new(&root, PathResolver::new(vec![root.clone()], "el"));
        let text = ";;;###autoload\n(autoload 'lib-fn \"core/lib\" nil t)\n";
        extractor.process(&file(ModuleOrigin::Core), text, true, &sink);
        let entries = extractor.into_entries();
        let expected = format!(
            "(autoload 'lib-fn {} nil t)",
            quote_string(&root.join("core/lib").to_string_lossy())
        );
        assert_eq!(entries[0].to_string(), expected);
    }
}
