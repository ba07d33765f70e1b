use thiserror::Error;

/// Errors raised by the editor-side collaboration primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid document name: {0:?}")]
    InvalidDocumentName(String),

    #[error("Failed to decode change: {0}")]
    Decode(String),

    #[error("Failed to apply change: {0}")]
    Apply(String),

    #[error("Range {offset}..{end} is outside a document of length {len}")]
    OutOfBounds { offset: usize, end: usize, len: usize },

    #[error("Offset {offset} is not on a character boundary")]
    InvalidOffset { offset: usize },
}

impl From<yrs::encoding::read::Error> for CoreError {
    fn from(e: yrs::encoding::read::Error) -> Self {
        CoreError::Decode(e.to_string())
    }
}
