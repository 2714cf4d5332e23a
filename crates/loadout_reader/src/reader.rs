//! Recursive reader over source bytes.
//!
//! Whitespace and `;` comments are skipped between forms. The reader can be
//! positioned at any byte offset, which is how the extractor reads the single
//! form following an export tag without reading the rest of the file.

use crate::error::ReadError;
use crate::form::{Form, FormKind, QuoteKind, Span};

/// Deepest nesting of lists, vectors and quotes the reader accepts.
pub const MAX_DEPTH: usize = 512;

/// Reads every top-level form in `source`.
pub fn read_all(source: &str) -> Result<Vec<Form>, ReadError> {
    let mut reader = Reader::new(source);
    let mut forms = Vec::new();
    while let Some(form) = reader.read_next()? {
        forms.push(form);
    }
    Ok(forms)
}

/// Returns the 1-indexed line containing byte `offset` of `text`.
pub fn line_of(text: &str, offset: usize) -> u32 {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() as u32 + 1
}

/// A cursor over source text that yields one top-level form at a time.
pub struct Reader<'a> {
    source: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `text`.
    pub fn new(text: &'a str) -> Self {
        Self::at(text, 0)
    }

    /// Creates a reader positioned at byte `offset` of `text`.
    pub fn at(text: &'a str, offset: usize) -> Self {
        Self {
            source: text.as_bytes(),
            pos: offset.min(text.len()),
            depth: 0,
        }
    }

    /// The byte offset the next read starts from.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reads the next form, or `None` at end of input.
    pub fn read_next(&mut self) -> Result<Option<Form>, ReadError> {
        self.skip_whitespace_and_comments();
        if self.at_end() {
            return Ok(None);
        }
        self.read_form().map(Some)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn error<T>(&self, msg: impl Into<String>, offset: usize) -> Result<T, ReadError> {
        Err(ReadError::new(msg, offset))
    }

    fn skip_whitespace_and_comments(&mut self) {
        while !self.at_end() {
            let b = self.peek();
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if b == b';' {
                while !self.at_end() && self.peek() != b'\n' {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn read_form(&mut self) -> Result<Form, ReadError> {
        if self.depth >= MAX_DEPTH {
            return self.error(format!("forms nested deeper than {MAX_DEPTH} levels"), self.pos);
        }
        self.depth += 1;
        let form = self.read_datum();
        self.depth -= 1;
        form
    }

    fn read_datum(&mut self) -> Result<Form, ReadError> {
        let start = self.pos;
        match self.peek() {
            b'(' => {
                self.pos += 1;
                self.read_list(start)
            }
            b'[' => {
                self.pos += 1;
                let items = self.read_sequence(start, b']')?;
                Ok(Form::new(FormKind::Vector(items), self.span_from(start)))
            }
            b')' | b']' => self.error(
                format!("unexpected `{}`", self.peek() as char),
                start,
            ),
            b'\'' => self.read_quoted(start, 1, QuoteKind::Quote),
            b'`' => self.read_quoted(start, 1, QuoteKind::Backquote),
            b',' if self.peek_at(1) == b'@' => self.read_quoted(start, 2, QuoteKind::Splice),
            b',' => self.read_quoted(start, 1, QuoteKind::Unquote),
            b'#' => self.read_dispatch(start),
            b'"' => self.read_string(start),
            b'?' => self.read_char(start),
            _ => self.read_atom(start),
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.pos)
    }

    fn read_quoted(&mut self, start: usize, len: usize, kind: QuoteKind) -> Result<Form, ReadError> {
        self.pos += len;
        self.skip_whitespace_and_comments();
        if self.at_end() {
            return self.error(format!("missing form after `{}`", kind.prefix()), start);
        }
        let inner = self.read_form()?;
        Ok(Form::new(
            FormKind::Quoted(kind, Box::new(inner)),
            self.span_from(start),
        ))
    }

    fn read_dispatch(&mut self, start: usize) -> Result<Form, ReadError> {
        match self.peek_at(1) {
            b'\'' => self.read_quoted(start, 2, QuoteKind::Function),
            b'$' => {
                self.pos += 2;
                Ok(Form::new(
                    FormKind::Symbol("#$".to_string()),
                    self.span_from(start),
                ))
            }
            b'x' | b'X' | b'o' | b'O' | b'b' | b'B' => {
                let radix = match self.peek_at(1).to_ascii_lowercase() {
                    b'x' => 16,
                    b'o' => 8,
                    _ => 2,
                };
                self.pos += 2;
                let digits_start = self.pos;
                while !self.at_end() && !is_delimiter(self.peek()) {
                    self.pos += 1;
                }
                let digits = String::from_utf8_lossy(&self.source[digits_start..self.pos]);
                match i64::from_str_radix(&digits, radix) {
                    Ok(value) => Ok(Form::new(FormKind::Int(value), self.span_from(start))),
                    Err(_) => self.error(format!("invalid radix-{radix} integer"), start),
                }
            }
            other => self.error(
                format!("unsupported reader syntax `#{}`", other as char),
                start,
            ),
        }
    }

    fn read_list(&mut self, start: usize) -> Result<Form, ReadError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.at_end() {
                return self.error("unterminated list", start);
            }
            match self.peek() {
                b')' => {
                    self.pos += 1;
                    return Ok(Form::new(FormKind::List(items), self.span_from(start)));
                }
                b'.' if is_delimiter(self.peek_at(1)) => {
                    let dot = self.pos;
                    if items.is_empty() {
                        return self.error("`.` with nothing before it", dot);
                    }
                    self.pos += 1;
                    self.skip_whitespace_and_comments();
                    if self.at_end() || self.peek() == b')' {
                        return self.error("missing form after `.`", dot);
                    }
                    let tail = self.read_form()?;
                    self.skip_whitespace_and_comments();
                    if self.peek() != b')' {
                        return self.error("expected `)` after dotted tail", self.pos);
                    }
                    self.pos += 1;
                    return Ok(Form::new(
                        FormKind::Dotted(items, Box::new(tail)),
                        self.span_from(start),
                    ));
                }
                _ => items.push(self.read_form()?),
            }
        }
    }

    fn read_sequence(&mut self, start: usize, close: u8) -> Result<Vec<Form>, ReadError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.at_end() {
                return self.error(format!("missing `{}`", close as char), start);
            }
            if self.peek() == close {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.read_form()?);
        }
    }

    fn read_string(&mut self, start: usize) -> Result<Form, ReadError> {
        self.pos += 1;
        let mut bytes = Vec::new();
        loop {
            if self.at_end() {
                return self.error("unterminated string", start);
            }
            let b = self.source[self.pos];
            self.pos += 1;
            match b {
                b'"' => break,
                b'\\' => {
                    if self.at_end() {
                        return self.error("unterminated string", start);
                    }
                    let escaped = self.source[self.pos];
                    self.pos += 1;
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b't' => bytes.push(b'\t'),
                        b'r' => bytes.push(b'\r'),
                        b'e' => bytes.push(0x1b),
                        b'a' => bytes.push(0x07),
                        b'f' => bytes.push(0x0c),
                        // Escaped newline and escaped space are both elided.
                        b'\n' | b' ' => {}
                        other => bytes.push(other),
                    }
                }
                other => bytes.push(other),
            }
        }
        let value = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Form::new(FormKind::Str(value), self.span_from(start)))
    }

    fn read_char(&mut self, start: usize) -> Result<Form, ReadError> {
        self.pos += 1;
        if self.at_end() {
            return self.error("missing character after `?`", start);
        }
        self.read_char_body(start)?;
        let raw = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        Ok(Form::new(FormKind::Char(raw), self.span_from(start)))
    }

    fn read_char_body(&mut self, start: usize) -> Result<(), ReadError> {
        if self.peek() != b'\\' {
            self.advance_char();
            return Ok(());
        }
        self.pos += 1;
        if self.at_end() {
            return self.error("missing character after `?\\`", start);
        }
        let modifier = self.peek();
        self.advance_char();
        // `?\C-x`, `?\M-\C-x` and friends.
        if matches!(modifier, b'C' | b'M' | b'S' | b'H' | b's' | b'A') && self.peek() == b'-' {
            self.pos += 1;
            if self.at_end() {
                return self.error("incomplete modifier character", start);
            }
            return self.read_char_body(start);
        }
        Ok(())
    }

    fn advance_char(&mut self) {
        let len = utf8_len(self.peek());
        self.pos = (self.pos + len).min(self.source.len());
    }

    fn read_atom(&mut self, start: usize) -> Result<Form, ReadError> {
        let mut name = Vec::new();
        let mut escaped = false;
        while !self.at_end() {
            let b = self.peek();
            if b == b'\\' {
                escaped = true;
                self.pos += 1;
                if self.at_end() {
                    return self.error("dangling `\\` in symbol", start);
                }
                let len = utf8_len(self.peek());
                let end = (self.pos + len).min(self.source.len());
                name.extend_from_slice(&self.source[self.pos..end]);
                self.pos = end;
                continue;
            }
            if is_delimiter(b) {
                break;
            }
            name.push(b);
            self.pos += 1;
        }
        if name.is_empty() && !escaped {
            return self.error(format!("unexpected `{}`", self.peek() as char), start);
        }
        let text = String::from_utf8_lossy(&name).into_owned();
        if text == "." && !escaped {
            return self.error("unexpected `.`", start);
        }
        let kind = if escaped {
            FormKind::Symbol(text)
        } else {
            parse_number(&text).unwrap_or(FormKind::Symbol(text))
        };
        Ok(Form::new(kind, self.span_from(start)))
    }
}

/// Bytes that end an atom.
fn is_delimiter(b: u8) -> bool {
    b == 0 || b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'[' | b']' | b'"' | b';')
}

fn utf8_len(lead: u8) -> usize {
    match lead {
        0xF0..=0xF7 => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

/// Interprets an atom as a number, if it looks like one.
///
/// `1.` is an integer, `1.5` and `1e3` are floats, and things like `1+`,
/// `-` and `inf` stay symbols.
pub(crate) fn parse_number(text: &str) -> Option<FormKind> {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let first = body.bytes().next()?;
    let starts_numeric = first.is_ascii_digit()
        || (first == b'.' && body.as_bytes().get(1).is_some_and(u8::is_ascii_digit));
    if !starts_numeric {
        return None;
    }
    let int_text = text.strip_suffix('.').unwrap_or(text);
    if let Ok(value) = int_text.parse::<i64>() {
        return Some(FormKind::Int(value));
    }
    if body.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-')) {
        if let Ok(value) = text.parse::<f64>() {
            return Some(FormKind::Float(value));
        }
    }
    None
}
