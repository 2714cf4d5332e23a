//! Placeholders for declarations of disabled modules.
//!
//! A stub keeps the declared name and parameter list, so call sites read the
//! same whether the module is enabled or not, but does nothing. Functions and
//! macros become inert macros (arguments are never evaluated) and aliases
//! become aliases of `ignore`. Each stub is preceded by two properties that
//! record where the real declaration lives.

use loadout_reader::Form;

use crate::declaration::{DeclKind, Declaration};
use crate::entry::{Entry, FILE_PROPERTY, MODULE_PROPERTY};
use crate::error::GenError;

/// Builds the documentation string of a stub.
pub fn stub_doc(decl: &Declaration) -> String {
    let mut doc = format!("THIS DOES NOTHING BECAUSE {} IS DISABLED", decl.origin);
    if let Some(original) = decl.doc.as_deref().filter(|d| !d.is_empty()) {
        doc.push_str("\n\n");
        doc.push_str(original);
    }
    doc
}

/// Synthesizes the placeholder entries for `decl`.
///
/// Returns the two property entries followed by the stub itself. Fails if
/// the declaration is not a definition or its parameter list is malformed.
pub fn synthesize(decl: &Declaration) -> Result<Vec<Entry>, GenError> {
    let doc = stub_doc(decl);
    let stub = match decl.kind {
        DeclKind::Function | DeclKind::Macro => {
            let params = decl
                .params()
                .map_err(|e| GenError::stub(&decl.symbol, e.to_string()))?;
            Entry::StubMacro {
                symbol: decl.symbol.clone(),
                params,
                doc,
            }
        }
        DeclKind::Alias => Entry::StubAlias {
            symbol: decl.symbol.clone(),
            doc,
        },
        DeclKind::Other => {
            return Err(GenError::stub(&decl.symbol, "not a definition"));
        }
    };

    Ok(vec![
        Entry::Property {
            symbol: decl.symbol.clone(),
            property: FILE_PROPERTY.to_string(),
            value: Form::string(decl.file.to_string_lossy().into_owned()),
        },
        Entry::Property {
            symbol: decl.symbol.clone(),
            property: MODULE_PROPERTY.to_string(),
            value: decl.origin.to_form(),
        },
        stub,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::ModuleOrigin;
    use loadout_reader::read_all;
    use std::path::PathBuf;

    fn decl(text: &str, doc: Option<&str>) -> Declaration {
        let form = read_all(text).unwrap().remove(0);
        let items = form.as_list().unwrap().to_vec();
        let head = items[0].as_symbol().unwrap().to_string();
        let kind = DeclKind::from_head(&head);
        Declaration {
            symbol: items[1].unquoted().as_symbol().unwrap().to_string(),
            kind,
            head,
            arglist: matches!(kind, DeclKind::Function | DeclKind::Macro)
                .then(|| items[2].clone()),
            doc: doc.map(str::to_string),
            interactive: false,
            origin: ModuleOrigin::module("lang", "go"),
            enabled: false,
            file: PathBuf::from("/p/modules/lang/go/autoload.el"),
            line: 1,
            form,
            text: text.to_string(),
            override_text: None,
        }
    }

    #[test]
    fn function_becomes_inert_macro() {
        let d = decl("(defun go-run (cmd &optional args) \"Run CMD.\" (shell cmd))", Some("Run CMD."));
        let entries = synthesize(&d).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0].to_string(),
            "(put 'go-run 'loadout-file \"/p/modules/lang/go/autoload.el\")"
        );
        assert_eq!(
            entries[1].to_string(),
            "(put 'go-run 'loadout-module '(:lang . go))"
        );
        assert_eq!(
            entries[2].to_string(),
            "(defmacro go-run (cmd &optional args) \"THIS DOES NOTHING BECAUSE :lang go IS DISABLED\n\nRun CMD.\" (ignore cmd args))"
        );
    }

    #[test]
    fn stub_keeps_parameter_list() {
        let d = decl("(cl-defmacro go-with ((a b) &key c) (list a b c))", None);
        let entries = synthesize(&d).unwrap();
        match &entries[2] {
            Entry::StubMacro { params, .. } => {
                assert_eq!(params.form(), d.arglist.as_ref().unwrap());
                assert_eq!(params.names(), ["a", "b", "c"]);
            }
            other => panic!("expected stub macro, got {other:?}"),
        }
    }

    #[test]
    fn doc_without_original() {
        let d = decl("(defun go-x ())", None);
        assert_eq!(stub_doc(&d), "THIS DOES NOTHING BECAUSE :lang go IS DISABLED");
    }

    #[test]
    fn alias_becomes_ignore() {
        let d = decl("(defalias 'go-fmt #'gofmt)", None);
        let entries = synthesize(&d).unwrap();
        assert_eq!(
            entries[2].to_string(),
            "(defalias 'go-fmt #'ignore \"THIS DOES NOTHING BECAUSE :lang go IS DISABLED\")"
        );
    }

    #[test]
    fn malformed_parameters_fail() {
        let d = decl("(defun go-bad \"oops\" nil)", None);
        let err = synthesize(&d).unwrap_err();
        assert!(matches!(err, GenError::StubSynthesis { ref symbol, .. } if symbol == "go-bad"));
    }
}
