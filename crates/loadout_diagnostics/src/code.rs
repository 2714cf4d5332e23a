//! Diagnostic codes with category prefixes for structured error identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Error diagnostics, prefixed with `E`.
    Error,
    /// Warning diagnostics, prefixed with `W`.
    Warning,
    /// Informational diagnostics, prefixed with `N`.
    Note,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Note => 'N',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g. `E201`, `W101`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

/// A source file could not be read as a sequence of forms.
pub const READ_ERROR: DiagnosticCode = DiagnosticCode::new(Category::Error, 101);
/// An assembled artifact failed to compile or load.
pub const COMPILE_FAILURE: DiagnosticCode = DiagnosticCode::new(Category::Error, 201);
/// A stub could not be synthesized for a disabled declaration.
pub const STUB_SYNTHESIS: DiagnosticCode = DiagnosticCode::new(Category::Warning, 101);
/// An installed package has no usable descriptor.
pub const MISSING_DESCRIPTOR: DiagnosticCode = DiagnosticCode::new(Category::Warning, 102);
/// A symbol was exported more than once; the later definition was dropped.
pub const DUPLICATE_SYMBOL: DiagnosticCode = DiagnosticCode::new(Category::Warning, 103);
/// A file's inclusion predicate could not be evaluated.
pub const PREDICATE_ERROR: DiagnosticCode = DiagnosticCode::new(Category::Warning, 104);
/// A tagged form does not have the shape its definer requires.
pub const MALFORMED_DECLARATION: DiagnosticCode = DiagnosticCode::new(Category::Warning, 105);
/// The compiled artifact was unusable and the text form was loaded instead.
pub const COMPILED_FALLBACK: DiagnosticCode = DiagnosticCode::new(Category::Warning, 106);
/// A file was excluded by its own inclusion predicate.
pub const FILE_EXCLUDED: DiagnosticCode = DiagnosticCode::new(Category::Note, 1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Error.prefix(), 'E');
        assert_eq!(Category::Warning.prefix(), 'W');
        assert_eq!(Category::Note.prefix(), 'N');
    }

    #[test]
    fn display_format() {
        assert_eq!(COMPILE_FAILURE.to_string(), "E201");
        assert_eq!(STUB_SYNTHESIS.to_string(), "W101");
        assert_eq!(FILE_EXCLUDED.to_string(), "N001");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&DUPLICATE_SYMBOL).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DUPLICATE_SYMBOL);
    }
}
