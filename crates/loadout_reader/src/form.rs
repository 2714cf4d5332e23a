//! The form tree produced by the reader.

use serde::{Deserialize, Serialize};

/// A byte range in the text a form was read from.
///
/// `start` is inclusive and `end` is exclusive. Synthesized forms carry
/// [`Span::SYNTHETIC`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first byte of the form.
    pub start: u32,
    /// Byte offset one past the last byte of the form.
    pub end: u32,
}

impl Span {
    /// Span used for forms that do not come from any source text.
    pub const SYNTHETIC: Span = Span {
        start: u32::MAX,
        end: u32::MAX,
    };

    /// Creates a span over `start..end`.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    /// Returns `true` for spans of synthesized forms.
    pub fn is_synthetic(&self) -> bool {
        *self == Span::SYNTHETIC
    }

    /// Returns the slice of `text` this span covers, if it is in range.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.is_synthetic() {
            return None;
        }
        text.get(self.start as usize..self.end as usize)
    }
}

/// The prefix syntaxes that wrap a single form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum QuoteKind {
    /// `'form`
    Quote,
    /// `#'form`
    Function,
    /// `` `form ``
    Backquote,
    /// `,form`
    Unquote,
    /// `,@form`
    Splice,
}

impl QuoteKind {
    /// The prefix text for this quote kind.
    pub fn prefix(self) -> &'static str {
        match self {
            QuoteKind::Quote => "'",
            QuoteKind::Function => "#'",
            QuoteKind::Backquote => "`",
            QuoteKind::Unquote => ",",
            QuoteKind::Splice => ",@",
        }
    }
}

/// The shape of a form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FormKind {
    /// A symbol, with reader escapes removed.
    Symbol(String),
    /// A string literal, with escapes decoded.
    Str(String),
    /// An integer literal.
    Int(i64),
    /// A floating point literal.
    Float(f64),
    /// A character literal, kept in its source spelling (`?a`, `?\C-x`).
    Char(String),
    /// A proper list.
    List(Vec<Form>),
    /// An improper list `(a b . c)`.
    Dotted(Vec<Form>, Box<Form>),
    /// A vector `[a b]`.
    Vector(Vec<Form>),
    /// A prefix-quoted form.
    Quoted(QuoteKind, Box<Form>),
}

/// A form read from source text, or synthesized by the generator.
///
/// Equality compares structure only; spans are positional metadata and do
/// not take part.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Form {
    /// The form's shape.
    pub kind: FormKind,
    /// Where the form was read from.
    pub span: Span,
}

impl PartialEq for Form {
    fn eq(&self, other: &Self) -> bool {
        use FormKind::*;
        match (&self.kind, &other.kind) {
            (Symbol(a), Symbol(b)) | (Str(a), Str(b)) | (Char(a), Char(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (List(a), List(b)) | (Vector(a), Vector(b)) => a == b,
            (Dotted(a, at), Dotted(b, bt)) => a == b && at == bt,
            (Quoted(ka, a), Quoted(kb, b)) => ka == kb && a == b,
            // `nil` and `()` read as the same object.
            (Symbol(s), List(l)) | (List(l), Symbol(s)) => s == "nil" && l.is_empty(),
            _ => false,
        }
    }
}

impl Form {
    /// Creates a form at the given span.
    pub fn new(kind: FormKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Creates a synthesized symbol.
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new(FormKind::Symbol(name.into()), Span::SYNTHETIC)
    }

    /// Creates a synthesized string literal.
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(FormKind::Str(value.into()), Span::SYNTHETIC)
    }

    /// Creates a synthesized proper list.
    pub fn list(items: Vec<Form>) -> Self {
        Self::new(FormKind::List(items), Span::SYNTHETIC)
    }

    /// Creates a synthesized improper list.
    pub fn dotted(items: Vec<Form>, tail: Form) -> Self {
        Self::new(FormKind::Dotted(items, Box::new(tail)), Span::SYNTHETIC)
    }

    /// Wraps `inner` in a synthesized `'` quote.
    pub fn quote(inner: Form) -> Self {
        Self::new(FormKind::Quoted(QuoteKind::Quote, Box::new(inner)), Span::SYNTHETIC)
    }

    /// Wraps `inner` in a synthesized `#'` quote.
    pub fn function(inner: Form) -> Self {
        Self::new(
            FormKind::Quoted(QuoteKind::Function, Box::new(inner)),
            Span::SYNTHETIC,
        )
    }

    /// The canonical false/empty value.
    pub fn nil() -> Self {
        Self::symbol("nil")
    }

    /// The canonical true value.
    pub fn t() -> Self {
        Self::symbol("t")
    }

    /// Returns the symbol name if this is a symbol.
    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            FormKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the string value if this is a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            FormKind::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements if this is a proper list. `nil` is the empty list.
    pub fn as_list(&self) -> Option<&[Form]> {
        match &self.kind {
            FormKind::List(items) => Some(items.as_slice()),
            FormKind::Symbol(s) if s == "nil" => Some(&[]),
            _ => None,
        }
    }

    /// Returns `true` for `nil` and `()`.
    pub fn is_nil(&self) -> bool {
        match &self.kind {
            FormKind::Symbol(s) => s == "nil",
            FormKind::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Returns the head symbol of a non-empty list, e.g. `defun` in `(defun ...)`.
    pub fn head(&self) -> Option<&str> {
        match &self.kind {
            FormKind::List(items) => items.first().and_then(Form::as_symbol),
            _ => None,
        }
    }

    /// Strips one level of `'` or `#'` quoting.
    pub fn unquoted(&self) -> &Form {
        match &self.kind {
            FormKind::Quoted(QuoteKind::Quote | QuoteKind::Function, inner) => inner,
            _ => self,
        }
    }

    /// Returns `true` if this is a `'` or `#'` quoted form.
    pub fn is_quoted(&self) -> bool {
        matches!(
            &self.kind,
            FormKind::Quoted(QuoteKind::Quote | QuoteKind::Function, _)
        )
    }

    /// Visits this form and every form nested inside it, depth first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Form)) {
        visit(self);
        match &self.kind {
            FormKind::List(items) | FormKind::Vector(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            FormKind::Dotted(items, tail) => {
                for item in items {
                    item.walk(visit);
                }
                tail.walk(visit);
            }
            FormKind::Quoted(_, inner) => inner.walk(visit),
            _ => {}
        }
    }
}
