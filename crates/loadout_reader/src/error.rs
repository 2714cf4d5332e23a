//! Error type for reading forms.

/// A syntax error encountered while reading source text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at byte {offset}")]
pub struct ReadError {
    /// Description of the problem.
    pub message: String,
    /// Byte offset into the source where the problem was detected.
    pub offset: usize,
}

impl ReadError {
    /// Creates a new read error.
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}
