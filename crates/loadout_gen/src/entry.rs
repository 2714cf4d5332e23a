//! Artifact entries and their serialized forms.

use std::fmt;

use loadout_reader::Form;

use crate::declaration::ParamList;

/// Symbol property recording the file a stub stands in for.
pub const FILE_PROPERTY: &str = "loadout-file";

/// Symbol property recording the module a stub stands in for.
pub const MODULE_PROPERTY: &str = "loadout-module";

/// One top-level statement of a generated artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// `(autoload 'NAME "FILE" DOC INTERACTIVE TYPE)`.
    Autoload {
        /// The declared symbol.
        symbol: String,
        /// The resolved file.
        file: String,
        /// The documentation string.
        doc: Option<String>,
        /// Whether the function is an interactive command.
        interactive: bool,
        /// Whether the symbol is a macro.
        is_macro: bool,
    },
    /// An inert macro with the original parameter list.
    StubMacro {
        /// The declared symbol.
        symbol: String,
        /// The original parameter list.
        params: ParamList,
        /// The rewritten documentation string.
        doc: String,
    },
    /// `(defalias 'NAME #'ignore DOC)`.
    StubAlias {
        /// The declared symbol.
        symbol: String,
        /// The rewritten documentation string.
        doc: String,
    },
    /// `(put 'NAME 'PROPERTY VALUE)`.
    Property {
        /// The symbol the property is set on.
        symbol: String,
        /// The property name.
        property: String,
        /// The property value form.
        value: Form,
    },
    /// Source text emitted as is.
    Verbatim(String),
}

impl Entry {
    /// The symbol this entry defines, if it defines one.
    pub fn defines(&self) -> Option<&str> {
        match self {
            Entry::Autoload { symbol, .. }
            | Entry::StubMacro { symbol, .. }
            | Entry::StubAlias { symbol, .. } => Some(symbol),
            Entry::Property { .. } | Entry::Verbatim(_) => None,
        }
    }

    /// Returns `true` for placeholder definitions.
    pub fn is_stub(&self) -> bool {
        matches!(self, Entry::StubMacro { .. } | Entry::StubAlias { .. })
    }

    /// The entry as a form. Verbatim entries have no synthesized form.
    pub fn to_form(&self) -> Option<Form> {
        let quoted = |name: &str| Form::quote(Form::symbol(name));
        let doc_form = |doc: &Option<String>| match doc {
            Some(doc) => Form::string(doc.clone()),
            None => Form::nil(),
        };
        let form = match self {
            Entry::Autoload {
                symbol,
                file,
                doc,
                interactive,
                is_macro,
            } => Form::list(vec![
                Form::symbol("autoload"),
                quoted(symbol),
                Form::string(file.clone()),
                doc_form(doc),
                if *interactive { Form::t() } else { Form::nil() },
                if *is_macro { quoted("macro") } else { Form::nil() },
            ]),
            Entry::StubMacro {
                symbol,
                params,
                doc,
            } => {
                let head = if params.is_extended() {
                    "cl-defmacro"
                } else {
                    "defmacro"
                };
                let body = if params.names().is_empty() {
                    Form::nil()
                } else {
                    let mut ignore = vec![Form::symbol("ignore")];
                    ignore.extend(params.names().iter().map(|n| Form::symbol(n.clone())));
                    Form::list(ignore)
                };
                Form::list(vec![
                    Form::symbol(head),
                    Form::symbol(symbol.clone()),
                    params.form().clone(),
                    Form::string(doc.clone()),
                    body,
                ])
            }
            Entry::StubAlias { symbol, doc } => Form::list(vec![
                Form::symbol("defalias"),
                quoted(symbol),
                Form::function(Form::symbol("ignore")),
                Form::string(doc.clone()),
            ]),
            Entry::Property {
                symbol,
                property,
                value,
            } => Form::list(vec![
                Form::symbol("put"),
                quoted(symbol),
                quoted(property),
                value.clone(),
            ]),
            Entry::Verbatim(_) => return None,
        };
        Some(form)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.to_form()) {
            (Entry::Verbatim(text), _) => f.write_str(text),
            (_, Some(form)) => write!(f, "{form}"),
            (_, None) => Ok(()),
        }
    }
}
