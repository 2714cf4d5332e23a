//! Exported declarations and their parameter lists.

use std::fmt;
use std::path::PathBuf;

use loadout_reader::{Form, FormKind};

use crate::origin::ModuleOrigin;

/// The shape of an exported declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// `defun`, `cl-defun`, `defsubst`.
    Function,
    /// `defmacro`, `cl-defmacro`.
    Macro,
    /// `defalias`.
    Alias,
    /// Any other top-level form.
    Other,
}

impl DeclKind {
    /// Classifies a form by its head symbol.
    pub fn from_head(head: &str) -> Self {
        match head {
            "defun" | "cl-defun" | "defsubst" => DeclKind::Function,
            "defmacro" | "cl-defmacro" => DeclKind::Macro,
            "defalias" => DeclKind::Alias,
            _ => DeclKind::Other,
        }
    }

    /// Returns `true` for the kinds that are replaced by stubs when disabled.
    pub fn is_definition(self) -> bool {
        !matches!(self, DeclKind::Other)
    }
}

/// A malformed parameter list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed parameter list `{list}`: {reason}")]
pub struct ParamError {
    /// The printed parameter list.
    pub list: String,
    /// What was wrong with it.
    pub reason: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Required,
    Optional,
    Rest,
    Key,
    Aux,
}

/// A parsed parameter list.
///
/// The original form is kept so that stubs reproduce it exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamList {
    form: Form,
    names: Vec<String>,
    min: usize,
    max: Option<usize>,
    extended: bool,
}

impl ParamList {
    /// Parses a parameter list form.
    pub fn parse(form: &Form) -> Result<Self, ParamError> {
        let fail = |reason: &str| ParamError {
            list: form.to_string(),
            reason: reason.to_string(),
        };
        let (items, tail) = match &form.kind {
            FormKind::List(items) => (items.as_slice(), None),
            FormKind::Dotted(items, tail) => (items.as_slice(), Some(tail.as_ref())),
            FormKind::Symbol(s) if s == "nil" => (&[][..], None),
            _ => return Err(fail("expected a list")),
        };

        let mut list = ParamList {
            form: form.clone(),
            names: Vec::new(),
            min: 0,
            max: Some(0),
            extended: false,
        };
        let mut section = Section::Required;
        let mut rest_pending = false;

        for item in items {
            if let Some(keyword) = item.as_symbol().filter(|s| s.starts_with('&')) {
                if rest_pending {
                    return Err(fail("`&rest` needs a parameter"));
                }
                match keyword {
                    "&optional" if section == Section::Required => section = Section::Optional,
                    "&rest" | "&body" if matches!(section, Section::Required | Section::Optional) => {
                        section = Section::Rest;
                        rest_pending = true;
                        list.max = None;
                    }
                    "&key" if section != Section::Aux && section != Section::Key => {
                        section = Section::Key;
                        list.max = None;
                        list.extended = true;
                    }
                    "&allow-other-keys" if section == Section::Key => {}
                    "&aux" if section != Section::Aux => {
                        section = Section::Aux;
                        list.extended = true;
                    }
                    other => return Err(fail(&format!("unexpected `{other}`"))),
                }
                continue;
            }

            match section {
                Section::Rest if !rest_pending => {
                    return Err(fail("only one parameter may follow `&rest`"));
                }
                Section::Rest => rest_pending = false,
                Section::Required => list.min += 1,
                Section::Optional => {}
                Section::Key | Section::Aux => {}
            }
            if matches!(section, Section::Required | Section::Optional) {
                if let Some(max) = list.max.as_mut() {
                    *max += 1;
                }
            }
            list.bind(item, section, &fail)?;
        }

        if rest_pending {
            return Err(fail("`&rest` needs a parameter"));
        }
        if let Some(tail) = tail {
            if section == Section::Rest {
                return Err(fail("dotted tail after `&rest`"));
            }
            let name = tail
                .as_symbol()
                .filter(|s| *s != "nil" && *s != "t" && !s.starts_with('&'))
                .ok_or_else(|| fail("dotted tail must be a symbol"))?;
            list.names.push(name.to_string());
            list.max = None;
        }
        Ok(list)
    }

    fn bind(
        &mut self,
        item: &Form,
        section: Section,
        fail: &dyn Fn(&str) -> ParamError,
    ) -> Result<(), ParamError> {
        match &item.kind {
            FormKind::Symbol(name) if name == "nil" || name == "t" => {
                Err(fail(&format!("`{name}` cannot be a parameter")))
            }
            FormKind::Symbol(name) => {
                self.names.push(name.clone());
                Ok(())
            }
            FormKind::List(parts) if !parts.is_empty() => {
                self.extended = true;
                match section {
                    // Destructuring pattern.
                    Section::Required | Section::Rest => {
                        let inner = ParamList::parse(item)?;
                        self.names.extend(inner.names);
                        Ok(())
                    }
                    // `(name default svar)` and `((:keyword name) default svar)`.
                    Section::Optional | Section::Key | Section::Aux => {
                        let head = &parts[0];
                        match &head.kind {
                            FormKind::Symbol(name) => self.names.push(name.clone()),
                            FormKind::List(kw) if section == Section::Key && kw.len() == 2 => {
                                let name = kw[1]
                                    .as_symbol()
                                    .ok_or_else(|| fail("keyword binding must name a symbol"))?;
                                self.names.push(name.to_string());
                            }
                            _ => return Err(fail("parameter must be a symbol")),
                        }
                        if parts.len() > 3 {
                            return Err(fail("too many elements in parameter"));
                        }
                        if let Some(svar) = parts.get(2) {
                            let svar = svar
                                .as_symbol()
                                .ok_or_else(|| fail("supplied-p variable must be a symbol"))?;
                            self.names.push(svar.to_string());
                        }
                        Ok(())
                    }
                }
            }
            FormKind::Dotted(..) if matches!(section, Section::Required | Section::Rest) => {
                self.extended = true;
                let inner = ParamList::parse(item)?;
                self.names.extend(inner.names);
                Ok(())
            }
            _ => Err(fail(&format!("`{item}` cannot be a parameter"))),
        }
    }

    /// The parameter list form, exactly as declared.
    pub fn form(&self) -> &Form {
        &self.form
    }

    /// Every variable the list binds, in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The minimum number of arguments.
    pub fn min_arity(&self) -> usize {
        self.min
    }

    /// The maximum number of arguments, or `None` if unbounded.
    pub fn max_arity(&self) -> Option<usize> {
        self.max
    }

    /// Returns `true` if `count` arguments are acceptable.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Returns `true` if the list needs `cl-defmacro` rather than `defmacro`:
    /// keyword or auxiliary sections, defaults, or destructuring.
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// A list that accepts any number of arguments.
    pub fn variadic() -> Self {
        ParamList {
            form: Form::list(vec![Form::symbol("&rest"), Form::symbol("_")]),
            names: vec!["_".to_string()],
            min: 0,
            max: None,
            extended: false,
        }
    }
}

impl fmt::Display for ParamList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.form)
    }
}

/// One exported declaration found in a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// The symbol being declared.
    pub symbol: String,
    /// The declaration's shape.
    pub kind: DeclKind,
    /// The head symbol, e.g. `cl-defun`.
    pub head: String,
    /// The parameter list form, for functions and macros.
    pub arglist: Option<Form>,
    /// The documentation string, if any.
    pub doc: Option<String>,
    /// Whether a function is an interactive command.
    pub interactive: bool,
    /// The module the declaration belongs to.
    pub origin: ModuleOrigin,
    /// Whether that module is enabled.
    pub enabled: bool,
    /// The file the declaration was found in.
    pub file: PathBuf,
    /// 1-indexed line of the declaration form.
    pub line: u32,
    /// The declaration form as read.
    pub form: Form,
    /// The declaration's source text.
    pub text: String,
    /// The inline alternative form from the export tag line, if any.
    pub override_text: Option<String>,
}

impl Declaration {
    /// The parsed parameter list.
    pub fn params(&self) -> Result<ParamList, ParamError> {
        match &self.arglist {
            Some(form) => ParamList::parse(form),
            None => Err(ParamError {
                list: "nil".to_string(),
                reason: "declaration has no parameter list".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadout_reader::read_all;

    fn params(text: &str) -> Result<ParamList, ParamError> {
        ParamList::parse(&read_all(text).unwrap()[0])
    }

    #[test]
    fn kinds_from_heads() {
        assert_eq!(DeclKind::from_head("defun"), DeclKind::Function);
        assert_eq!(DeclKind::from_head("cl-defun"), DeclKind::Function);
        assert_eq!(DeclKind::from_head("defsubst"), DeclKind::Function);
        assert_eq!(DeclKind::from_head("cl-defmacro"), DeclKind::Macro);
        assert_eq!(DeclKind::from_head("defalias"), DeclKind::Alias);
        assert_eq!(DeclKind::from_head("defvar"), DeclKind::Other);
        assert!(!DeclKind::Other.is_definition());
    }

    #[test]
    fn empty_lists() {
        for text in ["()", "nil"] {
            let p = params(text).unwrap();
            assert_eq!((p.min_arity(), p.max_arity()), (0, Some(0)));
            assert!(p.names().is_empty());
        }
    }

    #[test]
    fn optional_and_rest() {
        let p = params("(a b &optional c &rest more)").unwrap();
        assert_eq!(p.names(), ["a", "b", "c", "more"]);
        assert_eq!((p.min_arity(), p.max_arity()), (2, None));
        assert!(p.accepts(2));
        assert!(p.accepts(10));
        assert!(!p.accepts(1));
        assert!(!p.is_extended());

        let p = params("(a &optional b)").unwrap();
        assert_eq!((p.min_arity(), p.max_arity()), (1, Some(2)));
        assert!(!p.accepts(3));
    }

    #[test]
    fn body_and_dotted_tail() {
        let p = params("(name &body body)").unwrap();
        assert_eq!(p.max_arity(), None);
        let p = params("(a . rest)").unwrap();
        assert_eq!(p.names(), ["a", "rest"]);
        assert_eq!((p.min_arity(), p.max_arity()), (1, None));
    }

    #[test]
    fn cl_lambda_lists() {
        let p = params("(a &optional (b 1 b-p) &key c ((:dee d) 2) &allow-other-keys &aux (x 3))")
            .unwrap();
        assert_eq!(p.names(), ["a", "b", "b-p", "c", "d", "x"]);
        assert_eq!((p.min_arity(), p.max_arity()), (1, None));
        assert!(p.is_extended());
    }

    #[test]
    fn destructuring() {
        let p = params("((start end) &rest body)").unwrap();
        assert_eq!(p.names(), ["start", "end", "body"]);
        assert_eq!(p.min_arity(), 1);
        assert!(p.is_extended());
    }

    #[test]
    fn malformed_lists() {
        for text in [
            "\"string\"",
            "42",
            "sym",
            "(a 1)",
            "(a \"b\")",
            "(&rest)",
            "(a &rest b c)",
            "(&optional &optional a)",
            "(a &rest b . c)",
            "(t)",
            "(&allow-other-keys)",
        ] {
            assert!(params(text).is_err(), "{text} should be malformed");
        }
    }

    #[test]
    fn keeps_original_form() {
        let p = params("(a  &optional   b)").unwrap();
        assert_eq!(p.to_string(), "(a &optional b)");
    }
}
