//! Printing forms back to source text.
//!
//! Printed output reads back to an equal form: strings are quoted, symbols
//! that would otherwise read as something else are escaped, and the empty
//! list prints as `nil`.

use crate::form::{Form, FormKind};
use crate::reader::parse_number;
use std::fmt::{self, Write};

/// Quotes `value` as a string literal.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn write_symbol(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    // Reader-level tokens that are symbols in the tree.
    if name == "#$" {
        return f.write_str(name);
    }
    if name.is_empty() {
        return f.write_str("##");
    }
    if parse_number(name).is_some() || name == "." {
        f.write_char('\\')?;
    }
    for (i, c) in name.chars().enumerate() {
        let needs_escape = c.is_whitespace()
            || matches!(c, '(' | ')' | '[' | ']' | '"' | '\'' | ';' | '`' | ',' | '\\')
            || (i == 0 && matches!(c, '#' | '?'));
        if needs_escape {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    Ok(())
}

fn write_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        f.write_str("0.0e+NaN")
    } else if value.is_infinite() {
        f.write_str(if value > 0.0 { "1.0e+INF" } else { "-1.0e+INF" })
    } else {
        write!(f, "{value:?}")
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Form]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_char(' ')?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FormKind::Symbol(name) => write_symbol(f, name),
            FormKind::Str(value) => f.write_str(&quote_string(value)),
            FormKind::Int(value) => write!(f, "{value}"),
            FormKind::Float(value) => write_float(f, *value),
            FormKind::Char(raw) => f.write_str(raw),
            FormKind::List(items) if items.is_empty() => f.write_str("nil"),
            FormKind::List(items) => {
                f.write_char('(')?;
                write_items(f, items)?;
                f.write_char(')')
            }
            FormKind::Dotted(items, tail) => {
                f.write_char('(')?;
                write_items(f, items)?;
                write!(f, " . {tail})")
            }
            FormKind::Vector(items) => {
                f.write_char('[')?;
                write_items(f, items)?;
                f.write_char(']')
            }
            FormKind::Quoted(kind, inner) => write!(f, "{}{inner}", kind.prefix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_all;

    fn reprint(text: &str) -> String {
        read_all(text)
            .unwrap()
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn prints_autoload() {
        let form = Form::list(vec![
            Form::symbol("autoload"),
            Form::quote(Form::symbol("do-thing")),
            Form::string("/p/modules/lang/rust/autoload"),
            Form::nil(),
            Form::t(),
            Form::nil(),
        ]);
        assert_eq!(
            form.to_string(),
            "(autoload 'do-thing \"/p/modules/lang/rust/autoload\" nil t nil)"
        );
    }

    #[test]
    fn reprints_normalized_source() {
        assert_eq!(
            reprint("(defalias  'x\n  #'ignore)   ; trailing"),
            "(defalias 'x #'ignore)"
        );
        assert_eq!(reprint("(a . (b c))"), "(a . (b c))");
        assert_eq!(reprint("[1 2.5 ?\\C-x]"), "[1 2.5 ?\\C-x]");
        assert_eq!(reprint("`(a ,b ,@c)"), "`(a ,b ,@c)");
    }

    #[test]
    fn empty_list_prints_nil() {
        assert_eq!(Form::list(vec![]).to_string(), "nil");
    }

    #[test]
    fn string_quoting() {
        assert_eq!(quote_string(r#"say "hi" \ bye"#), r#""say \"hi\" \\ bye""#);
        assert_eq!(quote_string("line\nnext"), "\"line\nnext\"");
    }

    #[test]
    fn symbol_escaping_reads_back() {
        for name in ["1", "a b", "it's", "#hash", "?mark", "x(y)", "1.5"] {
            let printed = Form::symbol(name).to_string();
            let back = read_all(&printed).unwrap();
            assert_eq!(back, vec![Form::symbol(name)], "printed as {printed}");
        }
    }

    #[test]
    fn strings_read_back() {
        let value = "THIS DOES NOTHING\n\n\"quoted\" and \\slashed";
        let printed = Form::string(value).to_string();
        assert_eq!(read_all(&printed).unwrap(), vec![Form::string(value)]);
    }
}
