//! Reader and printer for the declaration language.
//!
//! Only enough of the language is understood to find top-level forms, take
//! them apart, and print synthesized ones back out:
//!
//! - **Forms** ([`form`]): the [`Form`] tree with byte spans into the source.
//! - **Reader** ([`reader`]): a hand-rolled recursive reader over bytes.
//! - **Printer** ([`print`]): `Display` for forms and string quoting.

#![warn(missing_docs)]

pub mod error;
pub mod form;
pub mod print;
pub mod reader;

pub use error::ReadError;
pub use form::{Form, FormKind, QuoteKind, Span};
pub use print::quote_string;
pub use reader::{line_of, read_all, Reader, MAX_DEPTH};
